/*++

Licensed under the Apache-2.0 license.

File Name:

    mod.rs

Abstract:

    File contains the swap state machine. Progress lives in the primary
    trailer; every transition is a single flash operation so an interrupted
    swap is picked up from the trailers on the next boot.

--*/

mod overwrite;
mod state;

pub use state::SwapState;
pub(crate) use state::{
    pending_swap, primary_confirmed, secondary_request, swap_state, PendingSwap,
};

use swapboot_drivers::{cprintln, report_boot_status, Flash, FlashArea};
use swapboot_error::{BootError, BootResult};
use swapboot_image_verify::{image_total_size, parse_header};

use crate::boot_status::BootStatus;
use crate::config::{ImageLayout, UpgradeMode};
use crate::env::SlotReader;
use crate::plan::{Slot, SlotSector, SwapPlan, SwapStep};
use crate::trailer::{FlagState, SwapType, TrailerState};

/// Plan moving the first `swap_size` bytes of both slots
pub(crate) fn swap_plan(
    image: &ImageLayout,
    mode: UpgradeMode,
    swap_size: u32,
) -> BootResult<SwapPlan> {
    if swap_size == 0 || swap_size > image.slot_size() {
        Err(BootError::SWAP_TRAILER_SIZE_INVALID)?;
    }
    let sectors = swap_size.div_ceil(image.sector_size);
    SwapPlan::new(mode, sectors).ok_or(BootError::SWAP_NOT_IN_PROGRESS)
}

/// Swap engine for one image
pub(crate) struct SwapEngine<'a, F: Flash> {
    flash: &'a mut F,
    image: &'a ImageLayout,
    scratch: Option<FlashArea>,
    mode: UpgradeMode,
}

impl<'a, F: Flash> SwapEngine<'a, F> {
    pub fn new(
        flash: &'a mut F,
        image: &'a ImageLayout,
        scratch: Option<FlashArea>,
        mode: UpgradeMode,
    ) -> Self {
        Self {
            flash,
            image,
            scratch,
            mode,
        }
    }

    /// Bytes of the image in `fa`, or the whole slot if it has no readable
    /// image
    fn image_size(&self, fa: FlashArea) -> u32 {
        let reader = SlotReader::new(&*self.flash, fa, self.image.slot_size());
        parse_header(&reader)
            .and_then(|hdr| image_total_size(&reader, &hdr))
            .unwrap_or(self.image.slot_size())
    }

    /// Bytes that have to move so both images end up intact
    fn swap_size(&self) -> u32 {
        core::cmp::max(
            self.image_size(self.image.primary),
            self.image_size(self.image.secondary),
        )
    }

    /// Record the swap in the primary trailer and run it.
    ///
    /// # Arguments
    ///
    /// * `swap_type` - `Test`, `Perm` or `Revert`
    /// * `revert_from_primary` - The revert is only recorded in the primary
    ///   trailer and must be moved to the secondary before that is erased
    pub fn start(&mut self, swap_type: SwapType, revert_from_primary: bool) -> BootResult<()> {
        let index = self.image.index;
        let pri = self.image.primary_trailer();
        let sec = self.image.secondary_trailer();
        cprintln!("[swap] Image {} start {}", index, swap_type);

        if revert_from_primary {
            sec.erase_if_dirty(self.flash)?;
            sec.write_swap_info(self.flash, index, SwapType::Revert)?;
            sec.write_magic(self.flash)?;
        }

        let swap_size = self.swap_size();
        pri.erase(self.flash)?;
        pri.write_swap_size(self.flash, swap_size)?;
        pri.write_swap_info(self.flash, index, swap_type)?;
        if swap_type == SwapType::Perm {
            pri.write_image_ok(self.flash)?;
        }
        // Commit point: from here on the swap resumes from the primary
        pri.write_magic(self.flash)?;

        report_boot_status(BootStatus::SwapStarted.into());
        self.resume(swap_type)
    }

    /// Run the remaining steps of the swap recorded in the primary trailer
    pub fn resume(&mut self, swap_type: SwapType) -> BootResult<()> {
        let pri = self.image.primary_trailer();
        let sec = self.image.secondary_trailer();

        // The request must not survive the swap
        sec.erase_if_dirty(self.flash)?;

        let state = pri.read_state(&*self.flash)?;
        let swap_size = state
            .swap_size
            .ok_or(BootError::SWAP_TRAILER_SIZE_INVALID)?;
        let plan = swap_plan(self.image, self.mode, swap_size)?;

        let first = pri.resume_point(&*self.flash, plan.len())?;
        if first > 0 {
            cprintln!(
                "[swap] Image {} resume {} at {}/{}",
                self.image.index,
                swap_type,
                first,
                plan.len()
            );
            report_boot_status(BootStatus::SwapResumed.into());
        }

        for k in first..plan.len() {
            let step = plan.step(k).ok_or(BootError::SWAP_STATUS_CORRUPT)?;
            self.run_step(&step)?;
            pri.write_status(self.flash, k)?;
        }
        report_boot_status(BootStatus::SwapSectorsCopied.into());

        self.finish(swap_type, &pri.read_state(&*self.flash)?)
    }

    fn finish(&mut self, swap_type: SwapType, state: &TrailerState) -> BootResult<()> {
        let pri = self.image.primary_trailer();
        if matches!(swap_type, SwapType::Perm | SwapType::Revert)
            && state.image_ok == FlagState::Unset
        {
            pri.write_image_ok(self.flash)?;
        }
        if state.copy_done == FlagState::Unset {
            pri.write_copy_done(self.flash)?;
        }

        cprintln!("[swap] Image {} {} done", self.image.index, swap_type);
        report_boot_status(BootStatus::SwapFinished.into());
        Ok(())
    }

    fn sector_area(&self, sector: &SlotSector) -> BootResult<(FlashArea, u32)> {
        let fa = match sector.slot {
            Slot::Primary => self.image.primary,
            Slot::Secondary => self.image.secondary,
            Slot::Scratch => self.scratch.ok_or(BootError::CONFIG_SCRATCH_MISSING)?,
        };
        Ok((fa, fa.sector_off(sector.sector)))
    }

    fn run_step(&mut self, step: &SwapStep) -> BootResult<()> {
        let (src, src_off) = self.sector_area(&step.src)?;
        let (dst, dst_off) = self.sector_area(&step.dst)?;
        let len = self.image.sector_size;

        self.flash.erase(&dst, dst_off, len)?;
        self.flash.copy(&src, src_off, &dst, dst_off, len)
    }

    /// Drop a rejected candidate so it is not retried
    pub fn cancel_candidate(&mut self) -> BootResult<()> {
        let sec = self.image.secondary_trailer();
        sec.erase_if_dirty(self.flash)?;

        let fa = self.image.secondary;
        if !self.flash.is_erased(&fa, 0, fa.sector_size)? {
            self.flash.erase(&fa, 0, fa.sector_size)?;
        }
        report_boot_status(BootStatus::CandidateRejected.into());
        Ok(())
    }

    /// The image to revert to is unusable; keep the running one for good
    pub fn cancel_revert(&mut self, pri_state: &TrailerState) -> BootResult<()> {
        if pri_state.image_ok == FlagState::Unset {
            self.image.primary_trailer().write_image_ok(self.flash)?;
        }
        self.image.secondary_trailer().erase_if_dirty(self.flash)?;
        report_boot_status(BootStatus::CandidateRejected.into());
        Ok(())
    }
}
