// Licensed under the Apache-2.0 license

use crate::helpers::*;
use swapboot_error::BootError;
use swapboot_loader::{
    set_confirmed, set_pending, swap_state, BootDecision, SwapState, UpgradeMode,
};

#[test]
fn test_lower_counter_rejected() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let mut config = board.config();
    config.rollback_protection = true;
    board.counters.set_counter(0, 5);

    let old = board.image_with_counter(V1, 2000, 5);
    board.load_primary(0, &old);
    board.load_secondary(0, &board.image_with_counter(V2, 2000, 4));

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V1);
    assert_holds(&board.primary(0), &old);
    assert!(is_erased(&board.secondary(0)[..SECTOR as usize]));
    assert_eq!(board.counters.counter(0), 5);
}

#[test]
fn test_primary_below_stored_counter() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let mut config = board.config();
    config.rollback_protection = true;
    board.counters.set_counter(0, 9);
    board.load_primary(0, &board.image_with_counter(V1, 2000, 3));

    assert_eq!(
        board.boot_with(&config),
        BootDecision::NoBootableImage(BootError::ROLLBACK_COUNTER_TOO_LOW)
    );

    // Protection off: counters are not looked at
    assert_eq!(booted_version(&board.boot()), V1);
}

#[test]
fn test_missing_counter() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let mut config = board.config();
    config.rollback_protection = true;
    board.load_primary(0, &board.image(V1, 2000, 0x11));

    assert_eq!(
        board.boot_with(&config),
        BootDecision::NoBootableImage(BootError::ROLLBACK_COUNTER_MISSING)
    );
}

#[test]
fn test_counter_updated_once_confirmed() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let mut config = board.config();
    config.rollback_protection = true;
    board.counters.set_counter(0, 1);

    board.load_primary(0, &board.image_with_counter(V1, 2000, 1));
    board.load_secondary(0, &board.image_with_counter(V2, 2000, 3));

    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V2);

    // A test image may still revert to the old counter
    assert_eq!(board.counters.counter(0), 1);

    set_confirmed(&mut board.flash.clone(), &config, 0).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V2);
    assert_eq!(board.counters.counter(0), 3);
    assert_eq!(board.counters.writes(), 1);

    // The old image now in the secondary slot can no longer come back
    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V2);
}

#[test]
fn test_perm_swap_updates_counter() {
    let board = TestBoard::new(UpgradeMode::Move);
    let mut config = board.config();
    config.rollback_protection = true;
    board.counters.set_counter(0, 2);

    board.load_primary(0, &board.image_with_counter(V1, 2000, 2));
    board.load_secondary(0, &board.image_with_counter(V2, 2000, 4));

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V2);
    assert_eq!(board.counters.counter(0), 4);
}

#[test]
fn test_equal_counter_with_invalid_primary() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let mut config = board.config();
    config.rollback_protection = true;
    board.counters.set_counter(0, 2);

    let mut old = board.image_with_counter(V1, 2000, 2);
    old[100] ^= 0x01;
    let new = board.image_with_counter(V2, 2000, 2);
    board.load_primary(0, &old);
    board.load_secondary(0, &new);

    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V2);
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapComplete
    );

    // The image to revert to is broken: keep the running one for good
    assert_eq!(booted_version(&board.boot_with(&config)), V2);
    assert_holds(&board.primary(0), &new);
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );
    assert_eq!(board.counters.counter(0), 2);
}
