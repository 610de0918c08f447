/*++

Licensed under the Apache-2.0 license.

File Name:

    flash.rs

Abstract:

    File contains the flash area descriptor and the flash access trait the
    bootloader core is written against. All offsets are area relative.

--*/

use swapboot_error::{BootError, BootResult};

/// Size of the bounce buffer used for sector copies and erase checks
pub const FLASH_COPY_CHUNK: usize = 256;

/// Flash area descriptor
///
/// Areas are owned by the platform flash map. The core only carries these
/// descriptors around and never touches absolute addresses.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FlashArea {
    /// Area identifier
    pub id: u8,

    /// Flash device holding the area
    pub device_id: u8,

    /// Byte offset of the area on its device
    pub off: u32,

    /// Area size in bytes
    pub size: u32,

    /// Erase sector size in bytes
    pub sector_size: u32,
}

impl FlashArea {
    /// Number of whole sectors in the area
    pub fn sector_count(&self) -> u32 {
        if self.sector_size == 0 {
            return 0;
        }
        self.size / self.sector_size
    }

    /// Offset of sector `idx`
    pub fn sector_off(&self, idx: u32) -> u32 {
        idx * self.sector_size
    }

    /// Check that `[off, off + len)` lies inside the area
    pub fn check_range(&self, off: u32, len: usize) -> BootResult<()> {
        let len = u32::try_from(len).map_err(|_| BootError::DRIVER_FLASH_OUT_OF_BOUNDS)?;
        match off.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(BootError::DRIVER_FLASH_OUT_OF_BOUNDS),
        }
    }

    /// Areas on the same device sharing at least one byte
    pub fn overlaps(&self, other: &FlashArea) -> bool {
        if self.device_id != other.device_id {
            return false;
        }
        let a_end = u64::from(self.off) + u64::from(self.size);
        let b_end = u64::from(other.off) + u64::from(other.size);
        u64::from(self.off) < b_end && u64::from(other.off) < a_end
    }
}

/// Flash region abstraction
///
/// Implementations provide NOR-like semantics: `erase` sets a range to
/// `erased_val`, `write` may only program erased locations at `align`
/// granularity.
pub trait Flash {
    /// Look up an area descriptor by id
    fn open(&self, id: u8) -> BootResult<FlashArea>;

    /// Read `buf.len()` bytes at `off`
    fn read(&self, fa: &FlashArea, off: u32, buf: &mut [u8]) -> BootResult<()>;

    /// Program `data` at `off`
    fn write(&mut self, fa: &FlashArea, off: u32, data: &[u8]) -> BootResult<()>;

    /// Erase `len` bytes at `off`; both sector aligned
    fn erase(&mut self, fa: &FlashArea, off: u32, len: u32) -> BootResult<()>;

    /// Minimum write size and alignment
    fn align(&self, fa: &FlashArea) -> u32;

    /// Value of an erased byte
    fn erased_val(&self, fa: &FlashArea) -> u8;

    /// Check whether `[off, off + len)` reads back as erased
    fn is_erased(&self, fa: &FlashArea, off: u32, len: u32) -> BootResult<bool> {
        let erased = self.erased_val(fa);
        let mut buf = [0u8; FLASH_COPY_CHUNK];
        let mut pos = 0;
        while pos < len {
            let chunk = core::cmp::min(FLASH_COPY_CHUNK as u32, len - pos) as usize;
            self.read(fa, off + pos, &mut buf[..chunk])?;
            if buf[..chunk].iter().any(|b| *b != erased) {
                return Ok(false);
            }
            pos += chunk as u32;
        }
        Ok(true)
    }

    /// Copy `len` bytes between two areas. The destination must already be
    /// erased.
    fn copy(
        &mut self,
        src: &FlashArea,
        src_off: u32,
        dst: &FlashArea,
        dst_off: u32,
        len: u32,
    ) -> BootResult<()> {
        let mut buf = [0u8; FLASH_COPY_CHUNK];
        let mut pos = 0;
        while pos < len {
            let chunk = core::cmp::min(FLASH_COPY_CHUNK as u32, len - pos) as usize;
            self.read(src, src_off + pos, &mut buf[..chunk])?;
            self.write(dst, dst_off + pos, &buf[..chunk])?;
            pos += chunk as u32;
        }
        Ok(())
    }
}
