/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains the top level boot flow: finish interrupted swaps, decide
    and run the upgrade of every image, then select the primary images.

--*/

mod candidate;
mod dependency;
mod primary;

use arrayvec::ArrayVec;
#[cfg(not(feature = "no-cfi"))]
use swapboot_cfi_derive::cfi_mod_fn;
use swapboot_cfi_lib::{cfi_assert_eq, cfi_launder, CfiCounter, Verdict};
use swapboot_drivers::{
    cprintln, report_boot_status, BootCrypto, Flash, FlashArea, HexBytes, SecurityCounterStore,
};
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::{ImageHeader, MAX_IMAGES};
use swapboot_image_verify::{parse_header, ImageVerificationInfo, ImageVerifier};

use crate::boot_env::BootEnv;
use crate::boot_status::BootStatus;
use crate::config::{BootConfig, UpgradeMode};
use crate::env::{SlotEnv, SlotReader};
use crate::swap::{pending_swap, PendingSwap, SwapEngine};
use crate::trailer::SwapType;

/// Image handed to the next stage
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BootTarget {
    /// Logical image
    pub image: u8,

    /// Flash device holding the primary slot
    pub flash_device_id: u8,

    /// Offset of the primary slot on the device
    pub image_offset: u32,

    /// Header of the selected image
    pub header: ImageHeader,
}

/// Primary images selected for boot, one per configured image
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct BootResponse {
    pub targets: ArrayVec<BootTarget, MAX_IMAGES>,
}

impl BootResponse {
    /// Image the platform jumps to
    pub fn boot_target(&self) -> Option<&BootTarget> {
        self.targets.first()
    }
}

/// Outcome of a boot attempt
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum BootDecision {
    Boot(BootResponse),

    /// Nothing may boot; the error says why
    NoBootableImage(BootError),
}

/// Upgrade decided for one image
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct ImageDecision {
    swap_type: SwapType,
    revert_from_primary: bool,
}

impl ImageDecision {
    const NONE: Self = Self {
        swap_type: SwapType::None,
        revert_from_primary: false,
    };
}

/// Run the boot flow and pick the images to boot
///
/// # Arguments
///
/// * `env` - Boot Environment
/// * `config` - Boot configuration
pub fn decide<F, C, S>(env: &mut BootEnv<F, C, S>, config: &BootConfig) -> BootDecision
where
    F: Flash,
    C: BootCrypto,
    S: SecurityCounterStore,
{
    CfiCounter::reset(env.cfi_seed);

    match boot_go(env, config) {
        Ok(rsp) => BootDecision::Boot(rsp),
        Err(err) => {
            cprintln!(
                "[boot] No bootable image 0x{}",
                HexBytes(&u32::from(err).to_be_bytes())
            );
            report_boot_status(BootStatus::NoBootableImage.into());
            BootDecision::NoBootableImage(err)
        }
    }
}

#[cfg_attr(not(feature = "no-cfi"), cfi_mod_fn)]
fn boot_go<F, C, S>(env: &mut BootEnv<F, C, S>, config: &BootConfig) -> BootResult<BootResponse>
where
    F: Flash,
    C: BootCrypto,
    S: SecurityCounterStore,
{
    cprintln!("[boot] ++");

    let layout = config.validate(&env.flash)?;
    report_boot_status(BootStatus::ConfigValidated.into());

    // Overwrite copies restart from scratch, only swaps resume
    let mut resumed = [false; MAX_IMAGES];
    if layout.mode != UpgradeMode::OverwriteOnly {
        for (image, resumed) in layout.images.iter().zip(resumed.iter_mut()) {
            let pri = image.primary_trailer().read_state(&env.flash)?;
            let sec = image.secondary_trailer().read_state(&env.flash)?;
            if let Ok(PendingSwap::Resume(swap_type)) = pending_swap(&pri, &sec) {
                SwapEngine::new(&mut env.flash, image, layout.scratch, layout.mode)
                    .resume(swap_type)?;
                *resumed = true;
            }
        }
    }
    report_boot_status(BootStatus::InterruptedSwapsComplete.into());

    // A swap finished on this boot is not followed by another one; an
    // unconfirmed test image gets its chance to run first
    let mut decisions = ArrayVec::<ImageDecision, MAX_IMAGES>::new();
    for (image, resumed) in layout.images.iter().zip(resumed.iter()) {
        decisions.push(if *resumed {
            ImageDecision::NONE
        } else {
            candidate::resolve_swap(env, config, &layout, image)?
        });
    }
    report_boot_status(BootStatus::SwapTypesResolved.into());

    dependency::check_dependencies(&env.flash, &layout, &mut decisions)?;
    report_boot_status(BootStatus::DependenciesChecked.into());

    for (image, decision) in layout.images.iter().zip(decisions.iter()) {
        if !decision.swap_type.is_upgrade() {
            continue;
        }
        let mut engine = SwapEngine::new(&mut env.flash, image, layout.scratch, layout.mode);
        if layout.mode == UpgradeMode::OverwriteOnly {
            cfi_assert_eq(layout.mode, UpgradeMode::OverwriteOnly);
            engine.overwrite()?;
        } else {
            engine.start(decision.swap_type, decision.revert_from_primary)?;
        }
    }
    report_boot_status(BootStatus::UpgradesComplete.into());

    let mut rsp = BootResponse::default();
    for image in layout.images.iter() {
        rsp.targets
            .push(primary::validate_primary(env, config, &layout, image)?);
    }
    report_boot_status(BootStatus::PrimaryImagesValidated.into());

    let target = rsp.boot_target().ok_or(BootError::BOOT_NO_BOOTABLE_IMAGE)?;
    cprintln!(
        "[boot] Image {} at 0x{} version {}",
        target.image,
        HexBytes(&target.image_offset.to_be_bytes()),
        target.header.ver()
    );
    report_boot_status(BootStatus::BootTargetSelected.into());

    cprintln!("[boot] --");
    Ok(rsp)
}

/// Run the trust checks on the image in `fa`
fn verify_slot<F: Flash, C: BootCrypto>(
    flash: &F,
    crypto: &mut C,
    config: &BootConfig,
    fa: FlashArea,
    slot_size: u32,
) -> BootResult<ImageVerificationInfo> {
    let reader = SlotReader::new(flash, fa, slot_size);
    let hdr = parse_header(&reader)?;

    let mut verifier = ImageVerifier::new(SlotEnv::new(
        reader,
        crypto,
        config.keys,
        config.require_signature,
    ));
    let info = verifier.verify(&hdr)?;

    if cfi_launder(info.verdict.verdict()) == Verdict::Success {
        cfi_assert_eq(info.verdict.verdict(), Verdict::Success);
    } else {
        Err(BootError::IMAGE_VERIFY_VERDICT_MISMATCH)?;
    }
    Ok(info)
}
