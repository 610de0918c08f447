/*++

Licensed under the Apache-2.0 license.

File Name:

    codec.rs

Abstract:

    File contains the image header parser, the TLV iterator and the image
    digest computation. Nothing here takes trust decisions.

--*/

use crate::ImageSource;
use swapboot_drivers::{Sha256Hasher, FLASH_COPY_CHUNK};
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::*;
use zerocopy::FromBytes;

/// Parse and bounds check the header at the start of the slot
pub fn parse_header<S: ImageSource + ?Sized>(src: &S) -> BootResult<ImageHeader> {
    let mut buf = [0u8; IMAGE_HEADER_SIZE];
    src.read(0, &mut buf)?;

    let hdr = ImageHeader::read_from(&buf[..]).ok_or(BootError::IMAGE_HEADER_SIZE_TOO_SMALL)?;

    if hdr.magic() != IMAGE_MAGIC {
        let erased = src.erased_val();
        if buf.iter().all(|b| *b == erased) {
            Err(BootError::IMAGE_HEADER_ERASED)?;
        }
        Err(BootError::IMAGE_HEADER_BAD_MAGIC)?;
    }

    if usize::from(hdr.hdr_size()) < IMAGE_HEADER_SIZE {
        Err(BootError::IMAGE_HEADER_SIZE_TOO_SMALL)?;
    }

    let align = src.write_align();
    if align > 1 && u32::from(hdr.hdr_size()) % align != 0 {
        Err(BootError::IMAGE_HEADER_UNALIGNED)?;
    }

    // Header, payload, protected TLVs and at least an empty unprotected
    // info header must fit
    let end = u32::from(hdr.hdr_size())
        .checked_add(hdr.img_size())
        .and_then(|v| v.checked_add(u32::from(hdr.protect_tlv_size())))
        .and_then(|v| v.checked_add(IMAGE_TLV_INFO_SIZE as u32))
        .ok_or(BootError::IMAGE_HEADER_SIZE_OUT_OF_BOUNDS)?;
    if end > src.slot_size() {
        Err(BootError::IMAGE_HEADER_SIZE_OUT_OF_BOUNDS)?;
    }

    Ok(hdr)
}

/// Compute the SHA-256 over header, payload and protected TLVs
pub fn compute_digest<S: ImageSource + ?Sized, H: Sha256Hasher>(
    src: &S,
    hdr: &ImageHeader,
    mut hasher: H,
) -> BootResult<ImageDigest> {
    let len = hdr.digest_len();
    if len > src.slot_size() {
        Err(BootError::IMAGE_HEADER_SIZE_OUT_OF_BOUNDS)?;
    }

    let mut buf = [0u8; FLASH_COPY_CHUNK];
    let mut off = 0;
    while off < len {
        let chunk = core::cmp::min(FLASH_COPY_CHUNK as u32, len - off) as usize;
        src.read(off, &mut buf[..chunk])?;
        hasher.update(&buf[..chunk])?;
        off += chunk as u32;
    }

    hasher.finish()
}

/// Offset of the end of the unprotected TLV area, i.e. the number of bytes
/// a copy of this image has to move
pub fn image_total_size<S: ImageSource + ?Sized>(src: &S, hdr: &ImageHeader) -> BootResult<u32> {
    let iter = TlvIter::new(src, hdr, IMAGE_TLV_ANY, TlvArea::All)?;
    Ok(iter.tlv_end())
}

/// Security counter from the protected TLV area.
///
/// The record is read twice and both reads must decode to the same value.
pub fn read_security_counter<S: ImageSource + ?Sized>(
    src: &S,
    hdr: &ImageHeader,
) -> BootResult<Option<u32>> {
    let mut iter = TlvIter::new(src, hdr, IMAGE_TLV_SEC_CNT, TlvArea::Protected)?;
    let Some(record) = iter.next().transpose()? else {
        return Ok(None);
    };

    let mut first = [0u8; SEC_CNT_SIZE];
    let mut second = [0u8; SEC_CNT_SIZE];
    let first = Tlv::decode(record.tlv_type, record.read(src, &mut first)?)?;
    let second = Tlv::decode(record.tlv_type, record.read(src, &mut second)?)?;

    match (first, second) {
        (Tlv::SecurityCounter(a), Tlv::SecurityCounter(b)) if a == b => Ok(Some(a)),
        _ => Err(BootError::ROLLBACK_COUNTER_READ_MISMATCH),
    }
}

/// Visit every dependency record of the image
pub fn read_dependencies<S, F>(src: &S, hdr: &ImageHeader, mut visit: F) -> BootResult<()>
where
    S: ImageSource + ?Sized,
    F: FnMut(ImageDependency) -> BootResult<()>,
{
    let iter = TlvIter::new(src, hdr, IMAGE_TLV_DEPENDENCY, TlvArea::Protected)?;
    for record in iter {
        let record = record?;
        let mut buf = [0u8; IMAGE_DEPENDENCY_SIZE];
        if let Tlv::Dependency(dep) = Tlv::decode(record.tlv_type, record.read(src, &mut buf)?)? {
            visit(dep)?;
        }
    }
    Ok(())
}

/// TLV sub area selector
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TlvArea {
    Protected,
    Unprotected,
    All,
}

/// Location of one TLV record
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TlvRecord {
    pub tlv_type: u16,

    /// Slot offset of the value
    pub off: u32,

    pub len: u16,

    /// Record lives in the protected area
    pub protected: bool,
}

impl TlvRecord {
    /// Read the value into `buf`; fails when `buf` is too small
    pub fn read<'b, S: ImageSource + ?Sized>(
        &self,
        src: &S,
        buf: &'b mut [u8],
    ) -> BootResult<&'b [u8]> {
        let len = usize::from(self.len);
        if len > buf.len() {
            Err(BootError::IMAGE_TLV_BAD_LENGTH)?;
        }
        src.read(self.off, &mut buf[..len])?;
        Ok(&buf[..len])
    }
}

/// Lazy iterator over the TLV records of an image.
///
/// Offsets only ever move forward and every record must end inside its sub
/// area. The first error is yielded once and ends the iteration.
pub struct TlvIter<'a, S: ImageSource + ?Sized> {
    src: &'a S,
    filter: u16,
    area: TlvArea,
    prot_start: u32,
    prot_end: u32,
    unprot_start: u32,
    tlv_end: u32,
    off: u32,
    done: bool,
}

impl<'a, S: ImageSource + ?Sized> TlvIter<'a, S> {
    /// Locate and check the TLV info headers of the image
    ///
    /// # Arguments
    ///
    /// * `src`    - Slot to read from
    /// * `hdr`    - Parsed image header
    /// * `filter` - TLV type to yield, `IMAGE_TLV_ANY` for all
    /// * `area`   - Sub area(s) to walk
    pub fn new(src: &'a S, hdr: &ImageHeader, filter: u16, area: TlvArea) -> BootResult<Self> {
        let slot_size = src.slot_size();
        let tlv_off = hdr.tlv_off();

        let mut info = Self::read_info(src, tlv_off, slot_size)?;
        let (prot_start, prot_end) = if info.magic == IMAGE_TLV_PROT_INFO_MAGIC {
            if info.tlv_tot != hdr.protect_tlv_size() {
                Err(BootError::IMAGE_TLV_PROTECTED_SIZE_MISMATCH)?;
            }
            if usize::from(info.tlv_tot) < IMAGE_TLV_INFO_SIZE {
                Err(BootError::IMAGE_TLV_AREA_TOO_SMALL)?;
            }
            let prot_end = tlv_off + u32::from(info.tlv_tot);
            info = Self::read_info(src, prot_end, slot_size)?;
            (tlv_off + IMAGE_TLV_INFO_SIZE as u32, prot_end)
        } else if hdr.protect_tlv_size() != 0 {
            Err(BootError::IMAGE_TLV_PROTECTED_SIZE_MISMATCH)?
        } else {
            (tlv_off, tlv_off)
        };

        if info.magic != IMAGE_TLV_INFO_MAGIC {
            Err(BootError::IMAGE_TLV_INFO_BAD_MAGIC)?;
        }
        if usize::from(info.tlv_tot) < IMAGE_TLV_INFO_SIZE {
            Err(BootError::IMAGE_TLV_AREA_TOO_SMALL)?;
        }

        let tlv_end = prot_end
            .checked_add(u32::from(info.tlv_tot))
            .ok_or(BootError::IMAGE_TLV_OVERRUN)?;
        if tlv_end > slot_size {
            Err(BootError::IMAGE_TLV_OVERRUN)?;
        }

        let mut iter = Self {
            src,
            filter,
            area,
            prot_start,
            prot_end,
            unprot_start: prot_end + IMAGE_TLV_INFO_SIZE as u32,
            tlv_end,
            off: 0,
            done: false,
        };
        iter.restart();
        Ok(iter)
    }

    fn read_info(src: &S, off: u32, slot_size: u32) -> BootResult<ImageTlvInfo> {
        match off.checked_add(IMAGE_TLV_INFO_SIZE as u32) {
            Some(end) if end <= slot_size => {}
            _ => Err(BootError::IMAGE_TLV_OVERRUN)?,
        }
        let mut buf = [0u8; IMAGE_TLV_INFO_SIZE];
        src.read(off, &mut buf)?;
        ImageTlvInfo::read_from(&buf[..]).ok_or(BootError::IMAGE_TLV_AREA_TOO_SMALL)
    }

    /// Go back to the first record of the selected area
    pub fn restart(&mut self) {
        self.off = match self.area {
            TlvArea::Protected | TlvArea::All => self.prot_start,
            TlvArea::Unprotected => self.unprot_start,
        };
        self.done = false;
    }

    /// End of the unprotected TLV area
    pub fn tlv_end(&self) -> u32 {
        self.tlv_end
    }

    /// End of the protected TLV area
    pub fn prot_end(&self) -> u32 {
        self.prot_end
    }

    fn next_record(&mut self) -> BootResult<Option<TlvRecord>> {
        loop {
            let protected = self.off < self.prot_end;
            let end = if protected {
                self.prot_end
            } else {
                if self.off == self.prot_end {
                    if self.area == TlvArea::Protected {
                        return Ok(None);
                    }
                    self.off = self.unprot_start;
                }
                if self.off == self.tlv_end {
                    return Ok(None);
                }
                self.tlv_end
            };

            if end - self.off < IMAGE_TLV_HEADER_SIZE as u32 {
                Err(BootError::IMAGE_TLV_TRAILING_DATA)?;
            }

            let mut buf = [0u8; IMAGE_TLV_HEADER_SIZE];
            self.src.read(self.off, &mut buf)?;
            let tlv = ImageTlvHeader::read_from(&buf[..]).ok_or(BootError::IMAGE_TLV_BAD_LENGTH)?;

            let value_off = self.off + IMAGE_TLV_HEADER_SIZE as u32;
            let value_end = value_off + u32::from(tlv.len);
            if value_end > end {
                Err(BootError::IMAGE_TLV_OVERRUN)?;
            }
            self.off = value_end;

            if !protected && Tlv::is_protected_type(tlv.tlv_type) {
                Err(BootError::IMAGE_TLV_PROTECTED_TYPE_UNPROTECTED)?;
            }

            if self.filter == IMAGE_TLV_ANY || self.filter == tlv.tlv_type {
                return Ok(Some(TlvRecord {
                    tlv_type: tlv.tlv_type,
                    off: value_off,
                    len: tlv.len,
                    protected,
                }));
            }
        }
    }
}

impl<S: ImageSource + ?Sized> Iterator for TlvIter<'_, S> {
    type Item = BootResult<TlvRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
