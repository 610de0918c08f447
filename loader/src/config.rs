/*++

Licensed under the Apache-2.0 license.

File Name:

    config.rs

Abstract:

    File contains the boot configuration and its validation into a slot
    layout.

--*/

use arrayvec::ArrayVec;
use swapboot_drivers::{Flash, FlashArea};
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::{ImageEccPubKey, MAX_IMAGES};

use crate::trailer::{trailer_size, SlotTrailer, TrailerLayout, BOOT_MAX_ALIGN};

/// How a candidate image is activated
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum UpgradeMode {
    /// Swap through a scratch area, one sector at a time
    Scratch,

    /// Swap by shifting the primary into a spare sector; no scratch area
    Move,

    /// Copy the candidate over the primary; no revert
    OverwriteOnly,
}

/// Flash areas of one logical image
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ImageSlots {
    pub primary: u8,
    pub secondary: u8,
}

/// Boot configuration, built once by the platform
#[derive(Debug, Clone, Copy)]
pub struct BootConfig<'a> {
    /// Slot map, one entry per logical image
    pub images: &'a [ImageSlots],

    /// Scratch area, required in scratch mode and shared by all images
    pub scratch: Option<u8>,

    pub mode: UpgradeMode,

    /// Keys trusted for image signatures, tried in order
    pub keys: &'a [ImageEccPubKey],

    /// Reject images that carry no signature
    pub require_signature: bool,

    /// Enforce and advance the security counters
    pub rollback_protection: bool,

    /// Overwrite-only mode: reject candidates older than the primary
    pub downgrade_prevention: bool,

    /// Repair an invalid primary from a valid secondary
    pub bootstrap: bool,

    /// Run the trust checks on the primary on every boot
    pub validate_primary: bool,
}

impl<'a> BootConfig<'a> {
    pub fn new(images: &'a [ImageSlots], keys: &'a [ImageEccPubKey], mode: UpgradeMode) -> Self {
        Self {
            images,
            scratch: None,
            mode,
            keys,
            require_signature: true,
            rollback_protection: false,
            downgrade_prevention: false,
            bootstrap: false,
            validate_primary: true,
        }
    }

    /// Open every area and work out the slot layout.
    ///
    /// # Arguments
    ///
    /// * `flash` - Flash holding the areas
    ///
    /// # Returns
    ///
    /// * `BootLayout` - Layout of every image
    pub fn validate<F: Flash>(&self, flash: &F) -> BootResult<BootLayout> {
        if self.images.is_empty() {
            Err(BootError::CONFIG_NO_IMAGES)?;
        }
        if self.images.len() > MAX_IMAGES {
            Err(BootError::CONFIG_TOO_MANY_IMAGES)?;
        }
        if self.require_signature && self.keys.is_empty() {
            Err(BootError::CONFIG_NO_KEYS)?;
        }

        let scratch = match self.scratch {
            Some(id) => Some(open_area(flash, id)?),
            None => None,
        };
        if self.mode == UpgradeMode::Scratch && scratch.is_none() {
            Err(BootError::CONFIG_SCRATCH_MISSING)?;
        }

        let mut layout = BootLayout {
            images: ArrayVec::new(),
            scratch: if self.mode == UpgradeMode::Scratch {
                scratch
            } else {
                None
            },
            mode: self.mode,
        };

        for (index, slots) in self.images.iter().enumerate() {
            let primary = open_area(flash, slots.primary)?;
            let secondary = open_area(flash, slots.secondary)?;
            let image = ImageLayout::new(flash, index as u8, primary, secondary, self.mode)?;

            if let Some(scratch) = layout.scratch {
                if scratch.sector_size != image.sector_size {
                    Err(BootError::CONFIG_SECTOR_SIZE_MISMATCH)?;
                }
                if scratch.size < image.sector_size {
                    Err(BootError::CONFIG_SCRATCH_TOO_SMALL)?;
                }
            }
            layout.images.push(image);
        }

        layout.check_overlap()?;
        Ok(layout)
    }
}

fn open_area<F: Flash>(flash: &F, id: u8) -> BootResult<FlashArea> {
    let fa = flash.open(id)?;
    if fa.sector_size == 0
        || fa.sector_size % BOOT_MAX_ALIGN != 0
        || fa.size % fa.sector_size != 0
    {
        Err(BootError::CONFIG_SECTOR_SIZE_INVALID)?;
    }

    let align = flash.align(&fa);
    if !align.is_power_of_two() || align > BOOT_MAX_ALIGN {
        Err(BootError::CONFIG_ALIGN_UNSUPPORTED)?;
    }
    Ok(fa)
}

/// Layout of one logical image
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ImageLayout {
    pub index: u8,
    pub primary: FlashArea,
    pub secondary: FlashArea,
    pub sector_size: u32,

    /// Write alignment used for both trailers
    pub write_align: u32,

    /// Sectors at the end of each slot holding the trailer
    pub trailer_sectors: u32,

    /// Payload sectors that can be exchanged; bounds the image size
    pub capacity: u32,

    pub status_entries: u32,
}

impl ImageLayout {
    fn new<F: Flash>(
        flash: &F,
        index: u8,
        primary: FlashArea,
        secondary: FlashArea,
        mode: UpgradeMode,
    ) -> BootResult<Self> {
        if primary.sector_size != secondary.sector_size {
            Err(BootError::CONFIG_SECTOR_SIZE_MISMATCH)?;
        }
        let sector_size = primary.sector_size;
        let write_align = core::cmp::max(flash.align(&primary), flash.align(&secondary));

        // The move strategy parks one primary sector above the payload
        let spare = if mode == UpgradeMode::Move { 1 } else { 0 };
        let pri_sectors = primary.sector_count();
        let sec_sectors = secondary.sector_count();

        // Trailer size depends on the status table, which depends on the
        // payload left over after the trailer. Grow until it fits.
        let mut trailer_sectors = 1;
        loop {
            let pri_payload = pri_sectors
                .checked_sub(trailer_sectors + spare)
                .ok_or(BootError::CONFIG_SLOT_TOO_SMALL)?;
            let sec_payload = sec_sectors
                .checked_sub(trailer_sectors)
                .ok_or(BootError::CONFIG_SLOT_TOO_SMALL)?;
            let capacity = core::cmp::min(pri_payload, sec_payload);
            if capacity == 0 {
                Err(BootError::CONFIG_SLOT_TOO_SMALL)?;
            }

            let status_entries = match mode {
                UpgradeMode::OverwriteOnly => 0,
                _ => 3 * capacity,
            };
            let needed = trailer_size(status_entries, write_align).div_ceil(sector_size);
            if needed <= trailer_sectors {
                return Ok(Self {
                    index,
                    primary,
                    secondary,
                    sector_size,
                    write_align,
                    trailer_sectors,
                    capacity,
                    status_entries,
                });
            }
            trailer_sectors = needed;
        }
    }

    /// Largest image, in bytes, a slot may hold
    pub fn slot_size(&self) -> u32 {
        self.capacity * self.sector_size
    }

    fn trailer_layout(&self, fa: &FlashArea) -> TrailerLayout {
        TrailerLayout {
            area_size: fa.size,
            write_align: self.write_align,
            status_entries: self.status_entries,
            sector_size: self.sector_size,
            trailer_sectors: self.trailer_sectors,
        }
    }

    pub fn primary_trailer(&self) -> SlotTrailer {
        SlotTrailer::new(self.primary, self.trailer_layout(&self.primary))
    }

    pub fn secondary_trailer(&self) -> SlotTrailer {
        SlotTrailer::new(self.secondary, self.trailer_layout(&self.secondary))
    }
}

/// Validated layout of every image
#[derive(Debug, Clone)]
pub struct BootLayout {
    pub images: ArrayVec<ImageLayout, MAX_IMAGES>,
    pub scratch: Option<FlashArea>,
    pub mode: UpgradeMode,
}

impl BootLayout {
    pub fn image(&self, index: usize) -> BootResult<&ImageLayout> {
        self.images
            .get(index)
            .ok_or(BootError::BOOT_IMAGE_INDEX_OUT_OF_RANGE)
    }

    // Every slot is private to its image; only the scratch area is shared
    fn check_overlap(&self) -> BootResult<()> {
        let mut areas: ArrayVec<FlashArea, { 2 * MAX_IMAGES + 1 }> = ArrayVec::new();
        for image in self.images.iter() {
            areas.push(image.primary);
            areas.push(image.secondary);
        }
        if let Some(scratch) = self.scratch {
            areas.push(scratch);
        }

        for (i, a) in areas.iter().enumerate() {
            if areas[i + 1..].iter().any(|b| a.overlaps(b)) {
                Err(BootError::CONFIG_AREA_OVERLAP)?;
            }
        }
        Ok(())
    }
}
