// Licensed under the Apache-2.0 license

use crate::helpers::*;
use swapboot_loader::{set_confirmed, set_pending, swap_state, SwapState, SwapType, UpgradeMode};

#[test]
fn test_overwrite_upgrade() {
    let board = TestBoard::new(UpgradeMode::OverwriteOnly);
    let config = board.config();
    let old = board.image(V1, 7000, 0x11);
    let new = board.image(V2, 2000, 0x22);
    board.load_primary(0, &old);
    board.load_secondary(0, &new);

    // Every request is permanent without a revert path
    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapStarting(SwapType::Perm)
    );

    assert_eq!(booted_version(&board.boot()), V2);
    let primary = board.primary(0);
    assert_holds(&primary, &new);

    // Stale bytes of the larger old image are gone
    let end = 7000u32.div_ceil(SECTOR) * SECTOR;
    assert!(is_erased(&primary[new.len().next_multiple_of(SECTOR as usize)..end as usize]));

    assert!(is_erased(&board.secondary(0)[..SECTOR as usize]));
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );

    // Nothing to confirm
    set_confirmed(&mut board.flash.clone(), &config, 0).unwrap();
    board.flash.clear_log();
    assert_eq!(booted_version(&board.boot()), V2);
    assert_eq!(board.flash.op_count(), 0);
}

#[test]
fn test_overwrite_downgrade_rejected() {
    let board = TestBoard::new(UpgradeMode::OverwriteOnly);
    let mut config = board.config();
    config.downgrade_prevention = true;

    let current = board.image(V3, 2000, 0x33);
    board.load_primary(0, &current);
    board.load_secondary(0, &board.image(V2, 2000, 0x22));

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V3);
    assert_holds(&board.primary(0), &current);
    assert!(is_erased(&board.secondary(0)[..SECTOR as usize]));
}

#[test]
fn test_overwrite_downgrade_allowed() {
    let board = TestBoard::new(UpgradeMode::OverwriteOnly);
    let config = board.config();
    board.load_primary(0, &board.image(V3, 2000, 0x33));
    let older = board.image(V2, 2000, 0x22);
    board.load_secondary(0, &older);

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot()), V2);
    assert_holds(&board.primary(0), &older);
}

#[test]
fn test_overwrite_same_version_allowed() {
    let board = TestBoard::new(UpgradeMode::OverwriteOnly);
    let mut config = board.config();
    config.downgrade_prevention = true;
    board.load_primary(0, &board.image(V2, 2000, 0x33));
    let rebuilt = board.image(V2, 2400, 0x44);
    board.load_secondary(0, &rebuilt);

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot_with(&config)), V2);
    assert_holds(&board.primary(0), &rebuilt);
}
