/*++

Licensed under the Apache-2.0 license.

File Name:

    trailer.rs

Abstract:

    File contains the swap trailer layout and accessors.

    The trailer occupies the last sectors of a slot and is never part of
    the swapped payload. Fields sit on 8 byte boundaries counted back from
    the end of the slot:

        +----------------------+ slot end
        | magic (16 bytes)     |
        | image_ok             |
        | copy_done            |
        | swap_info            |
        | swap_size (u32)      |
        | status table         | 3 entries per payload sector
        +----------------------+

--*/

use swapboot_drivers::{Flash, FlashArea};
use swapboot_error::{BootError, BootResult};

/// Trailer magic, written last
pub const BOOT_MAGIC: [u8; 16] = [
    0x77, 0xc2, 0x95, 0xf3, 0x60, 0xd2, 0xef, 0x7f, 0x35, 0x52, 0x50, 0x0f, 0x2c, 0xb6, 0x79, 0x80,
];

/// Value of a set flag or status entry
pub const BOOT_FLAG_SET: u8 = 0x01;

/// Largest supported write alignment; every field is padded to it
pub const BOOT_MAX_ALIGN: u32 = 8;

const MAGIC_SIZE: u32 = BOOT_MAGIC.len() as u32;
const SWAP_SIZE_BYTES: usize = 4;

/// Swap types. Only `Test`, `Perm` and `Revert` are ever persisted.
#[repr(u8)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SwapType {
    None = 1,
    Test = 2,
    Perm = 3,
    Revert = 4,
    Fail = 5,
}

impl SwapType {
    fn from_persisted(val: u8) -> Option<Self> {
        match val {
            2 => Some(SwapType::Test),
            3 => Some(SwapType::Perm),
            4 => Some(SwapType::Revert),
            _ => None,
        }
    }

    /// Swaps that copy sectors
    pub fn is_upgrade(self) -> bool {
        matches!(self, SwapType::Test | SwapType::Perm | SwapType::Revert)
    }
}

impl ufmt::uDisplay for SwapType {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        let name = match self {
            SwapType::None => "none",
            SwapType::Test => "test",
            SwapType::Perm => "perm",
            SwapType::Revert => "revert",
            SwapType::Fail => "fail",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MagicState {
    Good,
    Unset,
    Bad,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlagState {
    Set,
    Unset,
    Bad,
}

/// `swap_info` field
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SwapInfo {
    Unset,
    Valid { image_num: u8, swap_type: SwapType },
    Bad,
}

impl SwapInfo {
    pub fn swap_type(&self) -> Option<SwapType> {
        match self {
            SwapInfo::Valid { swap_type, .. } => Some(*swap_type),
            _ => None,
        }
    }
}

/// Decoded trailer fields
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TrailerState {
    pub magic: MagicState,
    pub image_ok: FlagState,
    pub copy_done: FlagState,
    pub swap_info: SwapInfo,
    pub swap_size: Option<u32>,
}

impl TrailerState {
    /// Any field holds a pattern the loader never writes
    pub fn is_corrupt(&self) -> bool {
        self.magic == MagicState::Bad
            || self.image_ok == FlagState::Bad
            || self.copy_done == FlagState::Bad
            || self.swap_info == SwapInfo::Bad
    }
}

/// Bytes needed by a trailer with `status_entries` entries
pub fn trailer_size(status_entries: u32, write_align: u32) -> u32 {
    MAGIC_SIZE + 4 * BOOT_MAX_ALIGN + status_entries * write_align
}

/// Field offsets of the trailer of one slot
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TrailerLayout {
    /// Size of the whole slot area
    pub area_size: u32,

    pub write_align: u32,

    /// Entries in the status table
    pub status_entries: u32,

    pub sector_size: u32,

    /// Sectors reserved for the trailer at the end of the slot
    pub trailer_sectors: u32,
}

impl TrailerLayout {
    pub fn magic_off(&self) -> u32 {
        self.area_size - MAGIC_SIZE
    }

    pub fn image_ok_off(&self) -> u32 {
        self.magic_off() - BOOT_MAX_ALIGN
    }

    pub fn copy_done_off(&self) -> u32 {
        self.image_ok_off() - BOOT_MAX_ALIGN
    }

    pub fn swap_info_off(&self) -> u32 {
        self.copy_done_off() - BOOT_MAX_ALIGN
    }

    pub fn swap_size_off(&self) -> u32 {
        self.swap_info_off() - BOOT_MAX_ALIGN
    }

    pub fn status_off(&self) -> u32 {
        self.swap_size_off() - self.status_entries * self.write_align
    }

    /// Offset of the first trailer sector
    pub fn trailer_sector_off(&self) -> u32 {
        self.area_size - self.trailer_sectors * self.sector_size
    }
}

/// Trailer of one slot
#[derive(Debug, Clone, Copy)]
pub struct SlotTrailer {
    pub fa: FlashArea,
    pub layout: TrailerLayout,
}

impl SlotTrailer {
    pub fn new(fa: FlashArea, layout: TrailerLayout) -> Self {
        Self { fa, layout }
    }

    /// Read and decode every field
    pub fn read_state<F: Flash>(&self, flash: &F) -> BootResult<TrailerState> {
        Ok(TrailerState {
            magic: self.read_magic(flash)?,
            image_ok: self.read_flag(flash, self.layout.image_ok_off())?,
            copy_done: self.read_flag(flash, self.layout.copy_done_off())?,
            swap_info: self.read_swap_info(flash)?,
            swap_size: self.read_swap_size(flash)?,
        })
    }

    pub fn read_magic<F: Flash>(&self, flash: &F) -> BootResult<MagicState> {
        let mut magic = [0u8; MAGIC_SIZE as usize];
        flash.read(&self.fa, self.layout.magic_off(), &mut magic)?;

        let erased = flash.erased_val(&self.fa);
        if magic == BOOT_MAGIC {
            Ok(MagicState::Good)
        } else if magic.iter().all(|b| *b == erased) {
            Ok(MagicState::Unset)
        } else {
            Ok(MagicState::Bad)
        }
    }

    /// Decode the write unit at `off`. Only the exact pattern the loader
    /// writes counts as set.
    fn read_flag<F: Flash>(&self, flash: &F, off: u32) -> BootResult<FlagState> {
        let mut buf = [0u8; BOOT_MAX_ALIGN as usize];
        let unit = &mut buf[..self.layout.write_align as usize];
        flash.read(&self.fa, off, unit)?;

        let erased = flash.erased_val(&self.fa);
        let tail_erased = unit[1..].iter().all(|b| *b == erased);
        if unit[0] == erased && tail_erased {
            Ok(FlagState::Unset)
        } else if unit[0] == BOOT_FLAG_SET && tail_erased {
            Ok(FlagState::Set)
        } else {
            Ok(FlagState::Bad)
        }
    }

    fn read_swap_info<F: Flash>(&self, flash: &F) -> BootResult<SwapInfo> {
        let mut buf = [0u8; 1];
        flash.read(&self.fa, self.layout.swap_info_off(), &mut buf)?;

        if buf[0] == flash.erased_val(&self.fa) {
            return Ok(SwapInfo::Unset);
        }
        Ok(match SwapType::from_persisted(buf[0] & 0x0f) {
            Some(swap_type) => SwapInfo::Valid {
                image_num: buf[0] >> 4,
                swap_type,
            },
            None => SwapInfo::Bad,
        })
    }

    fn read_swap_size<F: Flash>(&self, flash: &F) -> BootResult<Option<u32>> {
        let mut buf = [0u8; SWAP_SIZE_BYTES];
        flash.read(&self.fa, self.layout.swap_size_off(), &mut buf)?;

        let erased = flash.erased_val(&self.fa);
        if buf.iter().all(|b| *b == erased) {
            return Ok(None);
        }
        Ok(Some(u32::from_le_bytes(buf)))
    }

    /// Write one field padded to the write alignment
    fn write_field<F: Flash>(&self, flash: &mut F, off: u32, val: &[u8]) -> BootResult<()> {
        let align = self.layout.write_align as usize;
        let len = (val.len() + align - 1) & !(align - 1);

        let mut buf = [flash.erased_val(&self.fa); MAGIC_SIZE as usize];
        buf[..val.len()].copy_from_slice(val);
        flash.write(&self.fa, off, &buf[..len])
    }

    pub fn write_magic<F: Flash>(&self, flash: &mut F) -> BootResult<()> {
        self.write_field(flash, self.layout.magic_off(), &BOOT_MAGIC)
    }

    pub fn write_image_ok<F: Flash>(&self, flash: &mut F) -> BootResult<()> {
        self.write_field(flash, self.layout.image_ok_off(), &[BOOT_FLAG_SET])
    }

    pub fn write_copy_done<F: Flash>(&self, flash: &mut F) -> BootResult<()> {
        self.write_field(flash, self.layout.copy_done_off(), &[BOOT_FLAG_SET])
    }

    pub fn write_swap_info<F: Flash>(
        &self,
        flash: &mut F,
        image_num: u8,
        swap_type: SwapType,
    ) -> BootResult<()> {
        let info = (image_num << 4) | (swap_type as u8 & 0x0f);
        self.write_field(flash, self.layout.swap_info_off(), &[info])
    }

    pub fn write_swap_size<F: Flash>(&self, flash: &mut F, swap_size: u32) -> BootResult<()> {
        self.write_field(
            flash,
            self.layout.swap_size_off(),
            &swap_size.to_le_bytes(),
        )
    }

    fn status_entry_off(&self, idx: u32) -> BootResult<u32> {
        if idx >= self.layout.status_entries {
            Err(BootError::SWAP_STATUS_CORRUPT)?;
        }
        Ok(self.layout.status_off() + idx * self.layout.write_align)
    }

    pub fn read_status<F: Flash>(&self, flash: &F, idx: u32) -> BootResult<FlagState> {
        let off = self.status_entry_off(idx)?;
        self.read_flag(flash, off)
    }

    pub fn write_status<F: Flash>(&self, flash: &mut F, idx: u32) -> BootResult<()> {
        let off = self.status_entry_off(idx)?;
        self.write_field(flash, off, &[BOOT_FLAG_SET])
    }

    /// Index of the first step of `steps` without a status entry.
    ///
    /// Entries are appended in order, so a set entry after an unset one, or
    /// an entry in neither state, is corruption.
    pub fn resume_point<F: Flash>(&self, flash: &F, steps: u32) -> BootResult<u32> {
        let mut first_unset = None;
        for idx in 0..steps {
            match (self.read_status(flash, idx)?, first_unset) {
                (FlagState::Set, None) => {}
                (FlagState::Unset, None) => first_unset = Some(idx),
                (FlagState::Unset, Some(_)) => {}
                (FlagState::Set, Some(_)) | (FlagState::Bad, _) => {
                    Err(BootError::SWAP_STATUS_CORRUPT)?
                }
            }
        }
        Ok(first_unset.unwrap_or(steps))
    }

    /// Erase the trailer sectors
    pub fn erase<F: Flash>(&self, flash: &mut F) -> BootResult<()> {
        let off = self.layout.trailer_sector_off();
        flash.erase(
            &self.fa,
            off,
            self.layout.trailer_sectors * self.layout.sector_size,
        )
    }

    /// Erase the trailer sectors unless they already read back erased
    pub fn erase_if_dirty<F: Flash>(&self, flash: &mut F) -> BootResult<()> {
        let off = self.layout.trailer_sector_off();
        let len = self.layout.trailer_sectors * self.layout.sector_size;
        if !flash.is_erased(&self.fa, off, len)? {
            flash.erase(&self.fa, off, len)?;
        }
        Ok(())
    }
}
