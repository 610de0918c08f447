/*++

Licensed under the Apache-2.0 license.

File Name:

   tlv.rs

Abstract:

    File contains the TLV area encoder.

--*/

use anyhow::{bail, Context};
use swapboot_image_types::*;
use zerocopy::AsBytes;

/// Builder for one TLV sub area (protected or unprotected)
#[derive(Debug, Clone)]
pub struct TlvAreaBuilder {
    magic: u16,
    records: Vec<u8>,
}

impl TlvAreaBuilder {
    /// Protected area builder
    pub fn protected() -> Self {
        Self::new(IMAGE_TLV_PROT_INFO_MAGIC)
    }

    /// Unprotected area builder
    pub fn unprotected() -> Self {
        Self::new(IMAGE_TLV_INFO_MAGIC)
    }

    fn new(magic: u16) -> Self {
        Self {
            magic,
            records: Vec::new(),
        }
    }

    /// Append a record
    pub fn push(&mut self, tlv_type: u16, value: &[u8]) -> anyhow::Result<&mut Self> {
        let len = u16::try_from(value.len()).context("TLV value longer than 64 KiB")?;
        let hdr = ImageTlvHeader { tlv_type, len };
        self.records.extend_from_slice(hdr.as_bytes());
        self.records.extend_from_slice(value);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Size of the encoded area including the info header
    pub fn len(&self) -> usize {
        IMAGE_TLV_INFO_SIZE + self.records.len()
    }

    /// Encode the info header followed by the records
    pub fn build(&self) -> anyhow::Result<Vec<u8>> {
        let Ok(tlv_tot) = u16::try_from(self.len()) else {
            bail!("TLV area of {} bytes does not fit the info header", self.len());
        };
        let info = ImageTlvInfo {
            magic: self.magic,
            tlv_tot,
        };
        let mut out = info.as_bytes().to_vec();
        out.extend_from_slice(&self.records);
        Ok(out)
    }
}
