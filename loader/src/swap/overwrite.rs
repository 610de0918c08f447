/*++

Licensed under the Apache-2.0 license.

File Name:

    overwrite.rs

Abstract:

    File contains the overwrite-only upgrade. The candidate is copied over
    the primary and the request is dropped once the copy is complete; an
    interrupted copy starts over on the next boot.

--*/

use swapboot_drivers::{cprintln, report_boot_status, Flash};
use swapboot_error::BootResult;

use super::SwapEngine;
use crate::boot_status::BootStatus;

impl<F: Flash> SwapEngine<'_, F> {
    /// Copy the secondary image over the primary
    pub fn overwrite(&mut self) -> BootResult<()> {
        let sector_size = self.image.sector_size;
        let pri = self.image.primary;
        let sec = self.image.secondary;

        let erase_sectors = self.swap_size().div_ceil(sector_size);
        let copy_sectors = self.image_size(sec).div_ceil(sector_size);
        cprintln!(
            "[swap] Image {} overwrite {} sectors",
            self.image.index,
            copy_sectors
        );

        for idx in 0..erase_sectors {
            let off = pri.sector_off(idx);
            if !self.flash.is_erased(&pri, off, sector_size)? {
                self.flash.erase(&pri, off, sector_size)?;
            }
        }
        for idx in 0..copy_sectors {
            let off = sec.sector_off(idx);
            self.flash.copy(&sec, off, &pri, off, sector_size)?;
        }

        // Trailer first: once it is gone the request is complete
        self.image.secondary_trailer().erase_if_dirty(self.flash)?;
        if !self.flash.is_erased(&sec, 0, sector_size)? {
            self.flash.erase(&sec, 0, sector_size)?;
        }

        report_boot_status(BootStatus::OverwriteComplete.into());
        Ok(())
    }
}
