// Licensed under the Apache-2.0 license

use crate::helpers::*;
use swapboot_image_gen::ImageGeneratorConfig;
use swapboot_image_types::*;
use swapboot_loader::{set_pending, swap_state, BootDecision, SwapState, SwapType, UpgradeMode};

fn depends_on(board: &TestBoard, version: ImageVersion, image_id: u8, min: ImageVersion) -> Vec<u8> {
    board.generate(ImageGeneratorConfig {
        payload: vec![0x5a; 1500],
        version,
        dependencies: vec![ImageDependency {
            image_id,
            image_min_version: min,
            ..Default::default()
        }],
        ..Default::default()
    })
}

fn versions(decision: &BootDecision) -> Vec<ImageVersion> {
    match decision {
        BootDecision::Boot(rsp) => rsp.targets.iter().map(|t| t.header.ver()).collect(),
        BootDecision::NoBootableImage(err) => panic!("no bootable image: {err:?}"),
    }
}

#[test]
fn test_unmet_dependency_holds_upgrade() {
    let board = TestBoard::with_images(UpgradeMode::Scratch, 2);
    let config = board.config();
    board.load_primary(0, &board.image(V1, 1500, 0x10));
    board.load_primary(1, &board.image(V1, 1500, 0x20));
    board.load_secondary(0, &depends_on(&board, V2, 1, V2));

    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    board.flash.clear_log();
    assert_eq!(versions(&board.boot()), vec![V1, V1]);
    assert_eq!(board.flash.op_count(), 0);

    // The request waits for the other image
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::SwapStarting(SwapType::Test)
    );

    board.load_secondary(1, &board.image(V2, 1500, 0x21));
    set_pending(&mut board.flash.clone(), &config, 1, false).unwrap();
    assert_eq!(versions(&board.boot()), vec![V2, V2]);
    assert_eq!(
        swap_state(&board.flash, &config, 1).unwrap(),
        SwapState::SwapComplete
    );
}

#[test]
fn test_dependency_met_by_primary() {
    let board = TestBoard::with_images(UpgradeMode::Move, 2);
    let config = board.config();
    board.load_primary(0, &board.image(V1, 1500, 0x10));
    board.load_primary(1, &board.image(V3, 1500, 0x20));
    board.load_secondary(0, &depends_on(&board, V2, 1, V2));

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(versions(&board.boot()), vec![V2, V3]);
}

#[test]
fn test_cancelled_upgrade_breaks_dependent() {
    let board = TestBoard::with_images(UpgradeMode::Scratch, 3);
    let config = board.config();
    for idx in 0..3 {
        board.load_primary(idx, &board.image(V1, 1500, 0x10 + idx as u8));
    }

    // 0 needs 1 at V2, 1 needs 2 at V2, 2 has no upgrade
    board.load_secondary(0, &depends_on(&board, V2, 1, V2));
    board.load_secondary(1, &depends_on(&board, V2, 2, V2));
    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    set_pending(&mut board.flash.clone(), &config, 1, false).unwrap();

    assert_eq!(versions(&board.boot()), vec![V1, V1, V1]);
}

#[test]
fn test_dependency_on_unknown_image() {
    let board = TestBoard::with_images(UpgradeMode::Scratch, 2);
    let config = board.config();
    board.load_primary(0, &board.image(V1, 1500, 0x10));
    board.load_primary(1, &board.image(V1, 1500, 0x20));
    board.load_secondary(0, &depends_on(&board, V2, 3, V1));

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(versions(&board.boot()), vec![V1, V1]);
}
