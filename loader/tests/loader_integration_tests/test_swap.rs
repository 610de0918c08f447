// Licensed under the Apache-2.0 license

use crate::helpers::*;
use swapboot_cfi_lib::{CfiCounter, CfiInt};
use swapboot_loader::{set_confirmed, set_pending, swap_state, SwapState, SwapType, UpgradeMode};

fn test_swap_then_revert(mode: UpgradeMode) {
    let board = TestBoard::new(mode);
    let config = board.config();
    let old = board.image(V1, 5000, 0x11);
    let new = board.image(V2, 2500, 0x22);
    board.load_primary(0, &old);
    board.load_secondary(0, &new);

    assert_eq!(booted_version(&board.boot()), V1);
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );

    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapStarting(SwapType::Test)
    );

    let target = boot_target(&board.boot());
    assert_eq!(target.header.ver(), V2);
    assert_eq!(target.flash_device_id, 0);
    assert_eq!(target.image_offset, 0);
    assert_holds(&board.primary(0), &new);
    assert_holds(&board.secondary(0), &old);
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapComplete
    );

    // Not confirmed: the old image comes back and the trailer settles
    assert_eq!(booted_version(&board.boot()), V1);
    assert_holds(&board.primary(0), &old);
    assert_holds(&board.secondary(0), &new);
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );

    // Settled; nothing is written any more
    board.flash.clear_log();
    assert_eq!(booted_version(&board.boot()), V1);
    assert_eq!(board.flash.op_count(), 0);
}

#[test]
fn test_scratch_swap_then_revert() {
    test_swap_then_revert(UpgradeMode::Scratch);
}

#[test]
fn test_move_swap_then_revert() {
    test_swap_then_revert(UpgradeMode::Move);
}

#[test]
fn test_confirmed_test_swap_stays() {
    for mode in [UpgradeMode::Scratch, UpgradeMode::Move] {
        let board = TestBoard::new(mode);
        let config = board.config();
        let new = board.image(V2, 3000, 0x22);
        board.load_primary(0, &board.image(V1, 3000, 0x11));
        board.load_secondary(0, &new);

        set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
        assert_eq!(booted_version(&board.boot()), V2);

        set_confirmed(&mut board.flash.clone(), &config, 0).unwrap();
        assert_eq!(
            swap_state(&board.flash, &config, 0).unwrap(),
            SwapState::Idle
        );

        board.flash.clear_log();
        assert_eq!(booted_version(&board.boot()), V2);
        assert_holds(&board.primary(0), &new);
        assert_eq!(board.flash.op_count(), 0);
    }
}

#[test]
fn test_perm_swap() {
    for mode in [UpgradeMode::Scratch, UpgradeMode::Move] {
        let board = TestBoard::new(mode);
        let config = board.config();
        let old = board.image(V1, 1200, 0x11);
        let new = board.image(V2, 9000, 0x22);
        board.load_primary(0, &old);
        board.load_secondary(0, &new);

        set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
        assert_eq!(
            swap_state(&board.flash, &config, 0).unwrap(),
            SwapState::SwapStarting(SwapType::Perm)
        );

        assert_eq!(booted_version(&board.boot()), V2);
        assert_holds(&board.primary(0), &new);
        assert_holds(&board.secondary(0), &old);
        assert_eq!(
            swap_state(&board.flash, &config, 0).unwrap(),
            SwapState::Idle
        );

        assert_eq!(booted_version(&board.boot()), V2);
    }
}

#[test]
fn test_full_slot_swap() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let layout = config.validate(&board.flash).unwrap();
    let slot_size = layout.image(0).unwrap().slot_size() as usize;

    // Leave room for the TLVs
    let old = board.image(V1, slot_size - 0x200, 0x11);
    let new = board.image(V2, slot_size - 0x180, 0x22);
    assert!(new.len() <= slot_size);
    board.load_primary(0, &old);
    board.load_secondary(0, &new);

    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    assert_eq!(booted_version(&board.boot()), V2);
    assert_holds(&board.primary(0), &new);
    assert_holds(&board.secondary(0), &old);
}

#[test]
fn test_swap_into_empty_primary() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let new = board.image(V2, 2000, 0x22);
    board.load_secondary(0, &new);

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot()), V2);
    assert_holds(&board.primary(0), &new);
}

#[test]
fn test_boot_resets_cfi_counter() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    board.load_primary(0, &board.image(V1, 2000, 0x11));

    // Left over from whatever ran before the loader
    CfiCounter::corrupt();
    assert_eq!(booted_version(&board.boot()), V1);
    assert_eq!(CfiCounter::read(), CfiInt::default());
}
