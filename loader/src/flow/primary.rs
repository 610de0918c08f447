/*++

Licensed under the Apache-2.0 license.

File Name:

    primary.rs

Abstract:

    File contains the final check of a primary slot before it is handed to
    the next stage.

--*/

use swapboot_cfi_lib::cfi_assert;
use swapboot_drivers::{BootCrypto, Flash, SecurityCounterStore};
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::ImageFlags;
use swapboot_image_verify::{parse_header, read_security_counter};

use super::{verify_slot, BootTarget};
use crate::boot_env::BootEnv;
use crate::config::{BootConfig, BootLayout, ImageLayout, UpgradeMode};
use crate::env::SlotReader;
use crate::rollback::RollbackGuard;
use crate::swap::primary_confirmed;

/// Validate the primary slot of `image` and advance its security counter
/// once it is confirmed
pub(super) fn validate_primary<F, C, S>(
    env: &mut BootEnv<F, C, S>,
    config: &BootConfig,
    layout: &BootLayout,
    image: &ImageLayout,
) -> BootResult<BootTarget>
where
    F: Flash,
    C: BootCrypto,
    S: SecurityCounterStore,
{
    let (header, security_counter) = if config.validate_primary {
        let info = verify_slot(
            &env.flash,
            &mut env.crypto,
            config,
            image.primary,
            image.slot_size(),
        )?;
        (info.header, info.security_counter)
    } else {
        // Trusted once when it was installed; only the header is checked
        let reader = SlotReader::new(&env.flash, image.primary, image.slot_size());
        let hdr = parse_header(&reader)?;
        if hdr.image_flags().contains(ImageFlags::NON_BOOTABLE) {
            Err(BootError::IMAGE_VERIFY_NON_BOOTABLE)?;
        }
        cfi_assert!(!hdr.image_flags().contains(ImageFlags::NON_BOOTABLE));
        (hdr, read_security_counter(&reader, &hdr)?)
    };

    let pri = image.primary_trailer().read_state(&env.flash)?;
    let confirmed = layout.mode == UpgradeMode::OverwriteOnly || primary_confirmed(&pri);
    RollbackGuard::new(&mut env.counters, config.rollback_protection).check_and_update(
        image.index,
        security_counter,
        confirmed,
    )?;

    Ok(BootTarget {
        image: image.index,
        flash_device_id: image.primary.device_id,
        image_offset: image.primary.off,
        header,
    })
}
