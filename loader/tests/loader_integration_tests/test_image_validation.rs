// Licensed under the Apache-2.0 license

use crate::helpers::*;
use swapboot_error::{BootError, ErrorKind};
use swapboot_image_gen::ImageGeneratorConfig;
use swapboot_image_types::*;
use swapboot_loader::{set_pending, swap_state, BootDecision, SwapState, UpgradeMode};

fn flip_signature_bit(image: &mut [u8]) {
    // The signature is the last TLV
    let last = image.len() - 1;
    image[last] ^= 0x01;
}

fn no_bootable_image(decision: &BootDecision) -> BootError {
    match decision {
        BootDecision::NoBootableImage(err) => *err,
        BootDecision::Boot(rsp) => panic!("unexpected boot {rsp:?}"),
    }
}

#[test]
fn test_boot_primary_without_request() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let image = board.image(V1, 3000, 0x11);
    board.load_primary(0, &image);

    board.flash.clear_log();
    let target = boot_target(&board.boot());
    assert_eq!(target.image, 0);
    assert_eq!(target.header.ver(), V1);
    assert_eq!(target.header.img_size(), 3000);
    assert_eq!(board.flash.op_count(), 0);
}

#[test]
fn test_flipped_signature_bit_in_candidate() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let old = board.image(V1, 3000, 0x11);
    let mut new = board.image(V2, 3000, 0x22);
    flip_signature_bit(&mut new);
    board.load_primary(0, &old);
    board.load_secondary(0, &new);

    set_pending(&mut board.flash.clone(), &config, 0, true).unwrap();
    assert_eq!(booted_version(&board.boot()), V1);
    assert_holds(&board.primary(0), &old);

    // Dropped so it is not retried
    assert!(is_erased(&board.secondary(0)[..SECTOR as usize]));
    assert_eq!(
        swap_state(&board.flash, &config, 0).unwrap(),
        SwapState::Idle
    );
}

#[test]
fn test_flipped_signature_bit_in_primary() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let mut image = board.image(V1, 3000, 0x11);
    flip_signature_bit(&mut image);
    board.load_primary(0, &image);

    let err = no_bootable_image(&board.boot());
    assert_eq!(err.kind(), ErrorKind::Trust);

    // Header only checks do not look at the signature
    let mut config = board.config();
    config.validate_primary = false;
    assert_eq!(booted_version(&board.boot_with(&config)), V1);
}

#[test]
fn test_corrupt_payload() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let mut image = board.image(V1, 3000, 0x11);
    image[IMAGE_HEADER_SIZE + 100] ^= 0x80;
    board.load_primary(0, &image);

    assert_eq!(
        no_bootable_image(&board.boot()),
        BootError::IMAGE_VERIFY_DIGEST_MISMATCH
    );
}

#[test]
fn test_tlv_overrun() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let config = board.config();
    let old = board.image(V1, 3000, 0x11);
    let mut new = board.image(V2, 3000, 0x22);

    // No protected area: the TLV info follows the payload
    let tlv_off = IMAGE_HEADER_SIZE + 3000;
    new[tlv_off + 2..tlv_off + 4].copy_from_slice(&0xfff0u16.to_le_bytes());
    board.load_primary(0, &new);
    assert_eq!(
        no_bootable_image(&board.boot()),
        BootError::IMAGE_TLV_OVERRUN
    );
    assert_eq!(BootError::IMAGE_TLV_OVERRUN.kind(), ErrorKind::Format);

    board.load_primary(0, &old);
    board.flash.load(slots(0).secondary, 0, &new);
    set_pending(&mut board.flash.clone(), &config, 0, false).unwrap();
    assert_eq!(booted_version(&board.boot()), V1);
    assert!(is_erased(&board.secondary(0)[..SECTOR as usize]));
}

#[test]
fn test_empty_primary() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let err = no_bootable_image(&board.boot());
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_unsigned_image() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let image = swapboot_image_gen::ImageGenerator::new(
        swapboot_image_crypto::RustCrypto::default(),
    )
    .generate(&ImageGeneratorConfig {
        payload: vec![0x33; 500],
        version: V1,
        ..Default::default()
    })
    .unwrap();
    board.load_primary(0, &image);

    assert_eq!(
        no_bootable_image(&board.boot()),
        BootError::IMAGE_VERIFY_SIGNATURE_MISSING
    );

    let mut config = board.config();
    config.require_signature = false;
    assert_eq!(booted_version(&board.boot_with(&config)), V1);
}

#[test]
fn test_non_bootable_primary() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let image = board.generate(ImageGeneratorConfig {
        payload: vec![0x44; 800],
        version: V1,
        flags: ImageFlags::NON_BOOTABLE,
        ..Default::default()
    });
    board.load_primary(0, &image);

    assert_eq!(
        no_bootable_image(&board.boot()),
        BootError::IMAGE_VERIFY_NON_BOOTABLE
    );
    let mut config = board.config();
    config.validate_primary = false;
    assert_eq!(
        no_bootable_image(&board.boot_with(&config)),
        BootError::IMAGE_VERIFY_NON_BOOTABLE
    );
}

#[test]
fn test_bootstrap() {
    for mode in [
        UpgradeMode::Scratch,
        UpgradeMode::Move,
        UpgradeMode::OverwriteOnly,
    ] {
        let board = TestBoard::new(mode);
        let image = board.image(V2, 2000, 0x22);
        board.load_secondary(0, &image);

        assert!(matches!(board.boot(), BootDecision::NoBootableImage(_)));

        let mut config = board.config();
        config.bootstrap = true;
        assert_eq!(booted_version(&board.boot_with(&config)), V2);
        assert_holds(&board.primary(0), &image);
        assert_eq!(
            swap_state(&board.flash, &config, 0).unwrap(),
            SwapState::Idle
        );
    }
}

#[test]
fn test_bootstrap_keeps_valid_primary() {
    let board = TestBoard::new(UpgradeMode::Scratch);
    let old = board.image(V1, 2000, 0x11);
    board.load_primary(0, &old);
    board.load_secondary(0, &board.image(V2, 2000, 0x22));

    let mut config = board.config();
    config.bootstrap = true;
    board.flash.clear_log();
    assert_eq!(booted_version(&board.boot_with(&config)), V1);
    assert_eq!(board.flash.op_count(), 0);
}
