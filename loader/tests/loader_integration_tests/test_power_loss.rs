// Licensed under the Apache-2.0 license

use crate::helpers::*;
use swapboot_error::BootError;
use swapboot_loader::{set_pending, swap_state, BootDecision, SwapState, UpgradeMode};

/// Cut power after every flash operation a clean upgrade performs, then
/// boot again. Every run has to end with the new image fully installed.
fn check_power_loss(mode: UpgradeMode, permanent: bool) {
    let board = TestBoard::new(mode);
    let config = board.config();
    let old = board.image(V1, 4100, 0x11);
    let new = board.image(V2, 2600, 0x22);
    board.load_primary(0, &old);
    board.load_secondary(0, &new);
    set_pending(&mut board.flash.clone(), &config, 0, permanent).unwrap();
    let staged = board.flash.snapshot();

    board.flash.clear_log();
    assert_eq!(booted_version(&board.boot()), V2);
    let ops = board.flash.op_count() as u32;
    assert!(ops > 0);
    let expected_state = swap_state(&board.flash, &config, 0).unwrap();

    for k in 0..ops {
        board.flash.restore(&staged);
        board.flash.power_cycle();
        board.flash.fail_after(k);

        assert_eq!(
            board.boot(),
            BootDecision::NoBootableImage(BootError::DRIVER_FLASH_POWER_LOSS),
            "power loss after {k} ops"
        );
        assert!(!board.flash.powered());

        board.flash.power_cycle();
        assert_eq!(booted_version(&board.boot()), V2, "power loss after {k} ops");
        assert_holds(&board.primary(0), &new);
        if mode != UpgradeMode::OverwriteOnly {
            assert_holds(&board.secondary(0), &old);
        }
        assert_eq!(swap_state(&board.flash, &config, 0).unwrap(), expected_state);
    }
}

#[test]
fn test_power_loss_scratch_test_swap() {
    check_power_loss(UpgradeMode::Scratch, false);
}

#[test]
fn test_power_loss_scratch_perm_swap() {
    check_power_loss(UpgradeMode::Scratch, true);
}

#[test]
fn test_power_loss_move_test_swap() {
    check_power_loss(UpgradeMode::Move, false);
}

#[test]
fn test_power_loss_move_perm_swap() {
    check_power_loss(UpgradeMode::Move, true);
}

#[test]
fn test_power_loss_overwrite() {
    check_power_loss(UpgradeMode::OverwriteOnly, true);
}

#[test]
fn test_power_loss_during_revert() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let old = board.image(V1, 3000, 0x11);
    let new = board.image(V2, 6000, 0x22);
    board.load_primary(0, &old);
    board.load_secondary(0, &new);
    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    assert_eq!(booted_version(&board.boot()), V2);
    let tested = board.flash.snapshot();

    board.flash.clear_log();
    assert_eq!(booted_version(&board.boot()), V1);
    let ops = board.flash.op_count() as u32;

    for k in 0..ops {
        board.flash.restore(&tested);
        board.flash.power_cycle();
        board.flash.fail_after(k);
        assert!(matches!(board.boot(), BootDecision::NoBootableImage(_)));

        board.flash.power_cycle();
        assert_eq!(booted_version(&board.boot()), V1, "power loss after {k} ops");
        assert_holds(&board.primary(0), &old);
        assert_holds(&board.secondary(0), &new);
        assert_eq!(
            swap_state(&board.flash, &config, 0).unwrap(),
            SwapState::Idle
        );
    }
}
