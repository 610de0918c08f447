/*++

Licensed under the Apache-2.0 license.

File Name:

    dependency.rs

Abstract:

    File contains the multi image dependency check. A candidate only
    upgrades when every image it depends on will run at least the version
    it asks for.

--*/

use swapboot_drivers::{cprintln, Flash, HexBytes};
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::ImageVersion;
use swapboot_image_verify::{parse_header, read_dependencies};

use super::ImageDecision;
use crate::config::BootLayout;
use crate::env::SlotReader;
use crate::trailer::SwapType;

/// Cancel, for this boot, every upgrade with an unmet dependency. Cancelling
/// one upgrade can break another, so the check repeats until nothing
/// changes.
pub(super) fn check_dependencies<F: Flash>(
    flash: &F,
    layout: &BootLayout,
    decisions: &mut [ImageDecision],
) -> BootResult<()> {
    loop {
        let mut cancelled = false;

        for idx in 0..decisions.len() {
            if !matches!(decisions[idx].swap_type, SwapType::Test | SwapType::Perm) {
                continue;
            }
            if let Err(err) = check_image(flash, layout, decisions, idx) {
                cprintln!(
                    "[boot] Image {} upgrade held back 0x{}",
                    idx,
                    HexBytes(&u32::from(err).to_be_bytes())
                );
                decisions[idx] = ImageDecision::NONE;
                cancelled = true;
            }
        }

        if !cancelled {
            return Ok(());
        }
    }
}

fn check_image<F: Flash>(
    flash: &F,
    layout: &BootLayout,
    decisions: &[ImageDecision],
    idx: usize,
) -> BootResult<()> {
    let image = layout.image(idx)?;
    let reader = SlotReader::new(flash, image.secondary, image.slot_size());
    let hdr = parse_header(&reader)?;

    read_dependencies(&reader, &hdr, |dep| {
        let active = active_version(flash, layout, decisions, dep.image_id)?;
        if active < dep.image_min_version {
            Err(BootError::BOOT_DEPENDENCY_UNSATISFIED)?;
        }
        Ok(())
    })
}

/// Version `image_id` will run once this boot's upgrades are done
fn active_version<F: Flash>(
    flash: &F,
    layout: &BootLayout,
    decisions: &[ImageDecision],
    image_id: u8,
) -> BootResult<ImageVersion> {
    let idx = usize::from(image_id);
    let image = layout
        .image(idx)
        .map_err(|_| BootError::BOOT_DEPENDENCY_INVALID)?;
    let decision = decisions
        .get(idx)
        .ok_or(BootError::BOOT_DEPENDENCY_INVALID)?;

    let fa = if decision.swap_type.is_upgrade() {
        image.secondary
    } else {
        image.primary
    };
    let hdr = parse_header(&SlotReader::new(flash, fa, image.slot_size()))?;
    Ok(hdr.ver())
}
