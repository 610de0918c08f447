/*++

Licensed under the Apache-2.0 license.

File Name:

    candidate.rs

Abstract:

    File contains the upgrade decision for one image. A requested candidate
    must pass the trust and rollback checks before a single sector moves;
    a rejected one is dropped so it is not retried on every boot.

--*/

use swapboot_cfi_lib::cfi_assert;
use swapboot_drivers::{cprintln, BootCrypto, Flash, HexBytes, SecurityCounterStore};
use swapboot_error::{BootError, BootResult};
use swapboot_image_verify::ImageVerificationInfo;

use super::{verify_slot, ImageDecision};
use crate::boot_env::BootEnv;
use crate::config::{BootConfig, BootLayout, ImageLayout, UpgradeMode};
use crate::rollback::RollbackGuard;
use crate::swap::{pending_swap, secondary_request, PendingSwap, SwapEngine};
use crate::trailer::SwapType;

/// Work out the upgrade of `image` for this boot
pub(super) fn resolve_swap<F, C, S>(
    env: &mut BootEnv<F, C, S>,
    config: &BootConfig,
    layout: &BootLayout,
    image: &ImageLayout,
) -> BootResult<ImageDecision>
where
    F: Flash,
    C: BootCrypto,
    S: SecurityCounterStore,
{
    let pri = image.primary_trailer().read_state(&env.flash)?;
    let sec = image.secondary_trailer().read_state(&env.flash)?;

    let pending = if layout.mode == UpgradeMode::OverwriteOnly {
        secondary_request(&sec).map(|request| match request {
            Some(_) => PendingSwap::Start {
                swap_type: SwapType::Perm,
                revert_from_primary: false,
            },
            None => PendingSwap::None,
        })
    } else {
        pending_swap(&pri, &sec)
    };

    let pending = match pending {
        Err(err) if err == BootError::BOOT_REQUEST_CORRUPT => {
            cprintln!("[boot] Image {} dropping damaged request", image.index);
            image.secondary_trailer().erase(&mut env.flash)?;
            PendingSwap::None
        }
        other => other?,
    };

    match pending {
        PendingSwap::Start {
            swap_type,
            revert_from_primary,
        } => {
            if let Err(err) = check_candidate(env, config, layout, image) {
                cprintln!(
                    "[boot] Image {} {} rejected 0x{}",
                    image.index,
                    swap_type,
                    HexBytes(&u32::from(err).to_be_bytes())
                );
                let mut engine =
                    SwapEngine::new(&mut env.flash, image, layout.scratch, layout.mode);
                if swap_type == SwapType::Revert {
                    engine.cancel_revert(&pri)?;
                } else {
                    engine.cancel_candidate()?;
                }
                return Ok(ImageDecision {
                    swap_type: SwapType::Fail,
                    revert_from_primary: false,
                });
            }
            Ok(ImageDecision {
                swap_type,
                revert_from_primary,
            })
        }

        // Interrupted swaps were finished before any decision is made
        PendingSwap::Resume(_) => Err(BootError::SWAP_STATUS_CORRUPT),

        PendingSwap::None => {
            if config.bootstrap && needs_bootstrap(env, config, image) {
                cprintln!("[boot] Image {} bootstrap from secondary", image.index);
                return Ok(ImageDecision {
                    swap_type: SwapType::Perm,
                    revert_from_primary: false,
                });
            }
            Ok(ImageDecision::NONE)
        }
    }
}

/// Trust and rollback checks of the image in the secondary slot
fn validate_candidate<F, C, S>(
    env: &mut BootEnv<F, C, S>,
    config: &BootConfig,
    image: &ImageLayout,
) -> BootResult<ImageVerificationInfo>
where
    F: Flash,
    C: BootCrypto,
    S: SecurityCounterStore,
{
    let info = verify_slot(
        &env.flash,
        &mut env.crypto,
        config,
        image.secondary,
        image.slot_size(),
    )?;
    RollbackGuard::new(&mut env.counters, config.rollback_protection)
        .check(image.index, info.security_counter)?;
    Ok(info)
}

fn check_candidate<F, C, S>(
    env: &mut BootEnv<F, C, S>,
    config: &BootConfig,
    layout: &BootLayout,
    image: &ImageLayout,
) -> BootResult<()>
where
    F: Flash,
    C: BootCrypto,
    S: SecurityCounterStore,
{
    let info = validate_candidate(env, config, image)?;

    if layout.mode == UpgradeMode::OverwriteOnly && config.downgrade_prevention {
        // An unusable primary has no version worth protecting
        if let Ok(primary) = verify_slot(
            &env.flash,
            &mut env.crypto,
            config,
            image.primary,
            image.slot_size(),
        ) {
            if info.header.ver() < primary.header.ver() {
                cprintln!(
                    "[boot] Image {} downgrade {} < {}",
                    image.index,
                    info.header.ver(),
                    primary.header.ver()
                );
                Err(BootError::BOOT_DOWNGRADE_REJECTED)?;
            }
            cfi_assert!(info.header.ver() >= primary.header.ver());
        }
    }
    Ok(())
}

/// Primary is unusable while the secondary holds a valid image
fn needs_bootstrap<F, C, S>(
    env: &mut BootEnv<F, C, S>,
    config: &BootConfig,
    image: &ImageLayout,
) -> bool
where
    F: Flash,
    C: BootCrypto,
    S: SecurityCounterStore,
{
    let primary = verify_slot(
        &env.flash,
        &mut env.crypto,
        config,
        image.primary,
        image.slot_size(),
    )
    .and_then(|info| {
        RollbackGuard::new(&mut env.counters, config.rollback_protection)
            .check(image.index, info.security_counter)
    });
    primary.is_err() && validate_candidate(env, config, image).is_ok()
}
