/*++

Licensed under the Apache-2.0 license.

File Name:

    rollback.rs

Abstract:

    File contains the security counter checks. A candidate may only boot
    when its counter is at least the stored one, and the stored value only
    moves forward once the running image is confirmed.

--*/

#[cfg(not(feature = "no-cfi"))]
use swapboot_cfi_derive::cfi_impl_fn;
use swapboot_cfi_lib::{cfi_assert_ge, cfi_launder, FihUint, FihVerdict, Verdict};
use swapboot_drivers::{cprintln, report_boot_status, SecurityCounterStore};
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::MAX_IMAGES;

use crate::boot_status::BootStatus;

/// Rollback Guard
pub struct RollbackGuard<'a, S: SecurityCounterStore> {
    store: &'a mut S,

    /// Counters are ignored when protection is off
    enabled: bool,
}

impl<'a, S: SecurityCounterStore> RollbackGuard<'a, S> {
    pub fn new(store: &'a mut S, enabled: bool) -> Self {
        Self { store, enabled }
    }

    /// Stored counter of `image_id`, read twice
    pub fn get_counter(&self, image_id: u8) -> BootResult<FihUint> {
        if usize::from(image_id) >= MAX_IMAGES {
            Err(BootError::ROLLBACK_IMAGE_ID_OUT_OF_RANGE)?;
        }

        let first = self.store.read_counter(image_id)?;
        let second = self.store.read_counter(cfi_launder(image_id))?;
        if first != cfi_launder(second) {
            Err(BootError::ROLLBACK_COUNTER_READ_MISMATCH)?;
        }
        Ok(FihUint::new(first))
    }

    /// Check `candidate` against the stored counter
    ///
    /// # Arguments
    ///
    /// * `image_id` - Logical image
    /// * `candidate` - Security counter carried by the image
    ///
    /// # Returns
    ///
    /// * `FihVerdict` - Success when the image may boot
    #[cfg_attr(not(feature = "no-cfi"), cfi_impl_fn)]
    pub fn check(&self, image_id: u8, candidate: Option<u32>) -> BootResult<FihVerdict> {
        if !self.enabled {
            return Ok(FihVerdict::success());
        }

        let candidate = candidate.ok_or(BootError::ROLLBACK_COUNTER_MISSING)?;
        let stored = self.get_counter(image_id)?;

        let verdict = FihUint::new(candidate).ge(&stored);
        if cfi_launder(verdict.verdict()) == Verdict::Success {
            cfi_assert_ge(candidate, stored.value());
        } else {
            cprintln!(
                "[rollback] Image {} counter {} below {}",
                image_id,
                candidate,
                stored.value()
            );
            Err(BootError::ROLLBACK_COUNTER_TOO_LOW)?;
        }

        report_boot_status(BootStatus::RollbackCheckComplete.into());
        Ok(verdict)
    }

    /// Check `candidate` and, once the image is confirmed, advance the
    /// stored counter to it
    ///
    /// # Arguments
    ///
    /// * `image_id` - Logical image
    /// * `candidate` - Security counter carried by the image
    /// * `confirmed` - The image will not be reverted
    pub fn check_and_update(
        &mut self,
        image_id: u8,
        candidate: Option<u32>,
        confirmed: bool,
    ) -> BootResult<FihVerdict> {
        let verdict = self.check(image_id, candidate)?;
        if !self.enabled || !confirmed {
            return Ok(verdict);
        }

        let candidate = candidate.ok_or(BootError::ROLLBACK_COUNTER_MISSING)?;
        let stored = self.get_counter(image_id)?;
        if candidate <= stored.value() {
            return Ok(verdict);
        }

        self.store.write_counter(image_id, candidate)?;

        let readback = self.get_counter(image_id)?;
        if cfi_launder(FihUint::new(candidate).eq(&readback).verdict()) != Verdict::Success {
            Err(BootError::ROLLBACK_COUNTER_UPDATE_MISMATCH)?;
        }

        cprintln!("[rollback] Image {} counter now {}", image_id, candidate);
        report_boot_status(BootStatus::RollbackCounterUpdated.into());
        Ok(verdict)
    }
}
