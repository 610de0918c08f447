// Licensed under the Apache-2.0 license

use swapboot_drivers::FlashArea;
use swapboot_image_crypto::{ecc_key_pair, RustCrypto};
use swapboot_image_gen::{ImageGenerator, ImageGeneratorConfig, ImageSigningConfig, KeyTlv};
use swapboot_image_types::*;
use swapboot_loader::{
    decide, BootConfig, BootDecision, BootEnv, BootTarget, ImageSlots, UpgradeMode,
};
use swapboot_sw_emulator::{SimCounterStore, SimFlash};

pub const SECTOR: u32 = 0x400;
pub const SLOT_SECTORS: u32 = 16;
pub const SCRATCH: u8 = 10;

/// Area ids of image `idx`
pub fn slots(idx: usize) -> ImageSlots {
    ImageSlots {
        primary: 1 + 2 * idx as u8,
        secondary: 2 + 2 * idx as u8,
    }
}

/// Simulated board: one flash device holding up to `MAX_IMAGES` slot pairs
/// and a scratch area, a counter store and a signing key.
pub struct TestBoard {
    pub flash: SimFlash,
    pub counters: SimCounterStore,
    pub mode: UpgradeMode,
    pub slots: Vec<ImageSlots>,
    pub keys: [ImageEccPubKey; 1],
    signing: ImageSigningConfig,
}

impl TestBoard {
    pub fn new(mode: UpgradeMode) -> Self {
        Self::with_images(mode, 1)
    }

    pub fn with_images(mode: UpgradeMode, images: usize) -> Self {
        let flash = SimFlash::new();
        flash.add_device(0, 0x48000, 8, 0xff);

        // The move strategy needs one spare sector in the primary slot
        let pri_sectors = match mode {
            UpgradeMode::Move => SLOT_SECTORS + 1,
            _ => SLOT_SECTORS,
        };
        for idx in 0..images {
            let base = idx as u32 * 0x10000;
            flash.add_area(FlashArea {
                id: slots(idx).primary,
                device_id: 0,
                off: base,
                size: pri_sectors * SECTOR,
                sector_size: SECTOR,
            });
            flash.add_area(FlashArea {
                id: slots(idx).secondary,
                device_id: 0,
                off: base + 0x8000,
                size: SLOT_SECTORS * SECTOR,
                sector_size: SECTOR,
            });
        }
        flash.add_area(FlashArea {
            id: SCRATCH,
            device_id: 0,
            off: 0x40000,
            size: 2 * SECTOR,
            sector_size: SECTOR,
        });

        let (priv_key, pub_key) = ecc_key_pair(7).unwrap();
        Self {
            flash,
            counters: SimCounterStore::new(),
            mode,
            slots: (0..images).map(slots).collect(),
            keys: [pub_key],
            signing: ImageSigningConfig {
                priv_key,
                pub_key,
                key_tlv: KeyTlv::KeyHash,
            },
        }
    }

    pub fn config(&self) -> BootConfig<'_> {
        let mut config = BootConfig::new(&self.slots, &self.keys, self.mode);
        if self.mode == UpgradeMode::Scratch {
            config.scratch = Some(SCRATCH);
        }
        config
    }

    /// Signed image of `len` payload bytes filled with `fill`
    pub fn image(&self, version: ImageVersion, len: usize, fill: u8) -> Vec<u8> {
        self.generate(ImageGeneratorConfig {
            payload: vec![fill; len],
            version,
            ..Default::default()
        })
    }

    /// Signed image carrying a security counter
    pub fn image_with_counter(&self, version: ImageVersion, len: usize, counter: u32) -> Vec<u8> {
        self.generate(ImageGeneratorConfig {
            payload: vec![version.major; len],
            version,
            security_counter: Some(counter),
            ..Default::default()
        })
    }

    pub fn generate(&self, config: ImageGeneratorConfig) -> Vec<u8> {
        let config = ImageGeneratorConfig {
            signing: Some(self.signing),
            ..config
        };
        ImageGenerator::new(RustCrypto::default())
            .generate(&config)
            .unwrap()
    }

    pub fn load_primary(&self, idx: usize, image: &[u8]) {
        self.flash.load(slots(idx).primary, 0, image);
    }

    pub fn load_secondary(&self, idx: usize, image: &[u8]) {
        self.flash.load(slots(idx).secondary, 0, image);
    }

    pub fn primary(&self, idx: usize) -> Vec<u8> {
        self.flash.area_bytes(slots(idx).primary)
    }

    pub fn secondary(&self, idx: usize) -> Vec<u8> {
        self.flash.area_bytes(slots(idx).secondary)
    }

    pub fn boot(&self) -> BootDecision {
        self.boot_with(&self.config())
    }

    pub fn boot_with(&self, config: &BootConfig) -> BootDecision {
        let mut env = BootEnv::new(
            self.flash.clone(),
            RustCrypto::default(),
            self.counters.clone(),
            [0x5eed_0001, 0x5eed_0002, 0x5eed_0003, 0x5eed_0004],
        );
        decide(&mut env, config)
    }
}

pub const V1: ImageVersion = ImageVersion::new(1, 0, 0, 0);
pub const V2: ImageVersion = ImageVersion::new(2, 0, 0, 0);
pub const V3: ImageVersion = ImageVersion::new(3, 0, 0, 0);

/// Target of the first image; panics when nothing boots
pub fn boot_target(decision: &BootDecision) -> BootTarget {
    match decision {
        BootDecision::Boot(rsp) => *rsp.boot_target().unwrap(),
        BootDecision::NoBootableImage(err) => panic!("no bootable image: {err:?}"),
    }
}

pub fn booted_version(decision: &BootDecision) -> ImageVersion {
    boot_target(decision).header.ver()
}

/// Slot bytes start with `image`
pub fn assert_holds(slot: &[u8], image: &[u8]) {
    assert!(slot.len() >= image.len());
    assert!(slot[..image.len()] == *image, "slot does not hold the image");
}

pub fn is_erased(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0xff)
}
