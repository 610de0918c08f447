// Licensed under the Apache-2.0 license

use crate::helpers::*;
use swapboot_error::BootError;
use swapboot_loader::{
    set_confirmed, set_pending, swap_state, SwapState, SwapType, UpgradeMode, BOOT_MAGIC,
};

#[test]
fn test_set_pending_writes_request_once() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let mut flash = board.flash.clone();

    set_pending(&mut flash, &config, 0, false).unwrap();
    let secondary = board.secondary(0);
    assert_eq!(secondary[secondary.len() - 16..], BOOT_MAGIC);

    // Repeated and conflicting requests keep the first one
    board.flash.clear_log();
    set_pending(&mut flash, &config, 0, true).unwrap();
    assert_eq!(board.flash.op_count(), 0);
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapStarting(SwapType::Test)
    );
}

#[test]
fn test_set_pending_cleans_partial_trailer() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let size = board.secondary(0).len() as u32;

    // Leftover of an interrupted request without the magic
    board.flash.load(slots(0).secondary, size - 40, &[0x01; 8]);
    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapStarting(SwapType::Perm)
    );
}

#[test]
fn test_set_pending_reports_damaged_trailer() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let mut flash = board.flash.clone();
    let size = board.secondary(0).len() as u32;
    board.flash.load(slots(0).secondary, size - 16, &[0x5a; 16]);

    assert_eq!(
        set_pending(&mut flash, &config, 0, false).unwrap_err(),
        BootError::BOOT_REQUEST_CORRUPT
    );
    assert!(is_erased(&board.secondary(0)[(size - 40) as usize..]));
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );

    // The trailer is clean again; a new request goes through
    set_pending(&mut flash, &config, 0, false).unwrap();
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapStarting(SwapType::Test)
    );
}

#[test]
fn test_bad_image_index() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    assert_eq!(
        set_pending(&mut board.flash.clone(), &config, 1, false).unwrap_err(),
        BootError::BOOT_IMAGE_INDEX_OUT_OF_RANGE
    );
    assert_eq!(
        swap_state(&board.flash, &config, 4).unwrap_err(),
        BootError::BOOT_IMAGE_INDEX_OUT_OF_RANGE
    );
}

#[test]
fn test_set_confirmed_without_swap() {
    let board = TestBoard::new(UpgradeMode::Move);
    let config = board.config();
    board.flash.clear_log();
    set_confirmed(&mut board.flash.clone(), &config, 0).unwrap();
    assert_eq!(board.flash.op_count(), 0);
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );
}

#[test]
fn test_damaged_primary_magic() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    board.load_primary(0, &board.image(V1, 1000, 0x11));
    let size = board.primary(0).len() as u32;
    board.flash.load(slots(0).primary, size - 16, &[0x5a; 16]);

    assert_eq!(
        set_confirmed(&mut board.flash.clone(), &config, 0).unwrap_err(),
        BootError::SWAP_TRAILER_BAD_MAGIC
    );
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap_err(),
        BootError::SWAP_TRAILER_BAD_MAGIC
    );
    assert!(matches!(
        board.boot(),
        swapboot_loader::BootDecision::NoBootableImage(BootError::SWAP_TRAILER_BAD_MAGIC)
    ));
}

#[test]
fn test_damaged_request_is_dropped() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    board.load_primary(0, &board.image(V1, 1000, 0x11));
    board.load_secondary(0, &board.image(V2, 1000, 0x22));
    let size = board.secondary(0).len() as u32;

    // Magic present, image_ok holds a pattern the loader never writes
    board.flash.load(slots(0).secondary, size - 16, &BOOT_MAGIC);
    board.flash.load(slots(0).secondary, size - 24, &[0x77; 8]);

    assert_eq!(booted_version(&board.boot()), V1);
    assert!(is_erased(&board.secondary(0)[(size - 24) as usize..]));
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );
}
