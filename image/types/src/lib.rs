/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures for the firmware image: the fixed header,
    the TLV info and record headers and the decoded TLV payloads.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

use core::ops::Range;

use getset::{CopyGetters, Getters, Setters};
use memoffset::span_of;
use swapboot_error::{BootError, BootResult};
use zerocopy::{AsBytes, FromBytes};
use zeroize::Zeroize;

pub const IMAGE_MAGIC: u32 = 0x96f3_b83d;
pub const IMAGE_HEADER_SIZE: usize = core::mem::size_of::<ImageHeader>();

pub const IMAGE_TLV_INFO_MAGIC: u16 = 0x6907;
pub const IMAGE_TLV_PROT_INFO_MAGIC: u16 = 0x6908;
pub const IMAGE_TLV_INFO_SIZE: usize = core::mem::size_of::<ImageTlvInfo>();
pub const IMAGE_TLV_HEADER_SIZE: usize = core::mem::size_of::<ImageTlvHeader>();

pub const IMAGE_TLV_KEYHASH: u16 = 0x01;
pub const IMAGE_TLV_PUBKEY: u16 = 0x02;
pub const IMAGE_TLV_SHA256: u16 = 0x10;
pub const IMAGE_TLV_SHA384: u16 = 0x11;
pub const IMAGE_TLV_RSA2048_PSS: u16 = 0x20;
pub const IMAGE_TLV_ECDSA_SIG: u16 = 0x22;
pub const IMAGE_TLV_RSA3072_PSS: u16 = 0x23;
pub const IMAGE_TLV_ED25519: u16 = 0x24;
pub const IMAGE_TLV_ENC_RSA2048: u16 = 0x30;
pub const IMAGE_TLV_ENC_KW: u16 = 0x31;
pub const IMAGE_TLV_ENC_EC256: u16 = 0x32;
pub const IMAGE_TLV_ENC_X25519: u16 = 0x33;
pub const IMAGE_TLV_DEPENDENCY: u16 = 0x40;
pub const IMAGE_TLV_SEC_CNT: u16 = 0x50;

/// Matches every TLV type when iterating
pub const IMAGE_TLV_ANY: u16 = 0xffff;

pub const SHA256_DIGEST_BYTE_SIZE: usize = 32;
pub const ECC256_SCALAR_BYTE_SIZE: usize = 32;
pub const ECC256_PUB_KEY_BYTE_SIZE: usize = core::mem::size_of::<ImageEccPubKey>();

/// DER SubjectPublicKeyInfo of a P-256 key up to the point coordinates:
/// id-ecPublicKey, prime256v1, then a BIT STRING opening the uncompressed
/// point
pub const ECC256_SPKI_PREFIX: [u8; 27] = [
    0x30, 0x59, 0x30, 0x13, 0x06, 0x07, 0x2a, 0x86, 0x48, 0xce, 0x3d, 0x02, 0x01, 0x06, 0x08,
    0x2a, 0x86, 0x48, 0xce, 0x3d, 0x03, 0x01, 0x07, 0x03, 0x42, 0x00, 0x04,
];

/// Size of a DER encoded P-256 SubjectPublicKeyInfo
pub const ECC256_PUB_KEY_SPKI_SIZE: usize = ECC256_SPKI_PREFIX.len() + ECC256_PUB_KEY_BYTE_SIZE;

/// Upper bound of a DER encoded P-256 signature
pub const ECDSA256_SIG_MAX_SIZE: usize = 72;

pub const IMAGE_DEPENDENCY_SIZE: usize = core::mem::size_of::<ImageDependency>();
pub const SEC_CNT_SIZE: usize = core::mem::size_of::<u32>();

/// Maximum number of logical images a bootloader instance handles
pub const MAX_IMAGES: usize = 4;

pub type ImageDigest = [u8; SHA256_DIGEST_BYTE_SIZE];
pub type ImageScalar = [u8; ECC256_SCALAR_BYTE_SIZE];

/// P-256 public key, big endian affine coordinates
#[repr(C)]
#[derive(
    AsBytes, FromBytes, Default, Debug, Getters, Setters, Copy, Clone, Eq, PartialEq, Zeroize,
)]
pub struct ImageEccPubKey {
    /// X Coordinate
    #[getset(get = "pub", set = "pub")]
    pub x: ImageScalar,

    /// Y Coordinate
    #[getset(get = "pub", set = "pub")]
    pub y: ImageScalar,
}

impl ImageEccPubKey {
    /// Key as provisioned and as carried by PUBKEY records. KEYHASH records
    /// hash these bytes.
    pub fn to_spki(&self) -> [u8; ECC256_PUB_KEY_SPKI_SIZE] {
        let mut der = [0u8; ECC256_PUB_KEY_SPKI_SIZE];
        let (prefix, point) = der.split_at_mut(ECC256_SPKI_PREFIX.len());
        prefix.copy_from_slice(&ECC256_SPKI_PREFIX);
        point.copy_from_slice(self.as_bytes());
        der
    }

    /// Parse a DER SubjectPublicKeyInfo; anything but an uncompressed P-256
    /// key is rejected
    pub fn from_spki(der: &[u8]) -> Option<Self> {
        if der.len() != ECC256_PUB_KEY_SPKI_SIZE {
            return None;
        }
        let (prefix, point) = der.split_at(ECC256_SPKI_PREFIX.len());
        if prefix != ECC256_SPKI_PREFIX {
            return None;
        }
        Self::read_from(point)
    }
}

bitflags::bitflags! {
    /// Image header flags
    #[derive(Default)]
    pub struct ImageFlags: u32 {
        const PIC = 0x0000_0001;
        const ENCRYPTED_AES128 = 0x0000_0004;
        const ENCRYPTED_AES256 = 0x0000_0008;
        const NON_BOOTABLE = 0x0000_0010;
        const RAM_LOAD = 0x0000_0020;
        const ROM_FIXED = 0x0000_0100;
    }
}

/// Image version. Ordering is lexicographic over
/// (major, minor, revision, build_num).
#[repr(C)]
#[derive(
    AsBytes, FromBytes, Default, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash,
)]
pub struct ImageVersion {
    pub major: u8,
    pub minor: u8,
    pub revision: u16,
    pub build_num: u32,
}

impl ImageVersion {
    pub const fn new(major: u8, minor: u8, revision: u16, build_num: u32) -> Self {
        Self {
            major,
            minor,
            revision,
            build_num,
        }
    }
}

impl ufmt::uDisplay for ImageVersion {
    fn fmt<W>(&self, f: &mut ufmt::Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: ufmt::uWrite + ?Sized,
    {
        ufmt::uwrite!(
            f,
            "{}.{}.{}+{}",
            self.major,
            self.minor,
            self.revision,
            self.build_num
        )
    }
}

/// Image header, stored at offset 0 of a slot
#[repr(C)]
#[derive(AsBytes, FromBytes, Default, Debug, CopyGetters, Setters, Copy, Clone, Eq, PartialEq)]
pub struct ImageHeader {
    /// Magic number (`IMAGE_MAGIC`)
    #[getset(get_copy = "pub", set = "pub")]
    magic: u32,

    /// Load address for RAM loading images
    #[getset(get_copy = "pub", set = "pub")]
    load_addr: u32,

    /// Size of the header; the payload starts here
    #[getset(get_copy = "pub", set = "pub")]
    hdr_size: u16,

    /// Size of the protected TLV area including its info header
    #[getset(get_copy = "pub", set = "pub")]
    protect_tlv_size: u16,

    /// Size of the payload, excluding the header
    #[getset(get_copy = "pub", set = "pub")]
    img_size: u32,

    /// `ImageFlags` bits
    #[getset(get_copy = "pub", set = "pub")]
    flags: u32,

    /// Image version
    #[getset(get_copy = "pub", set = "pub")]
    ver: ImageVersion,

    pad: u32,
}

impl ImageHeader {
    pub fn image_flags(&self) -> ImageFlags {
        ImageFlags::from_bits_truncate(self.flags)
    }

    /// Offset of the first TLV info header
    pub fn tlv_off(&self) -> u32 {
        u32::from(self.hdr_size).saturating_add(self.img_size)
    }

    /// Bytes covered by the image digest
    pub fn digest_len(&self) -> u32 {
        self.tlv_off()
            .saturating_add(u32::from(self.protect_tlv_size))
    }

    /// Returns the `Range<u32>` containing the version
    pub fn version_range() -> Range<u32> {
        let span = span_of!(ImageHeader, ver);
        span.start as u32..span.end as u32
    }

    /// Returns the `Range<u32>` containing the flags
    pub fn flags_range() -> Range<u32> {
        let span = span_of!(ImageHeader, flags);
        span.start as u32..span.end as u32
    }
}

/// TLV area info header
#[repr(C)]
#[derive(AsBytes, FromBytes, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageTlvInfo {
    /// `IMAGE_TLV_INFO_MAGIC` or `IMAGE_TLV_PROT_INFO_MAGIC`
    pub magic: u16,

    /// Size of the area including this header
    pub tlv_tot: u16,
}

/// TLV record header
#[repr(C)]
#[derive(AsBytes, FromBytes, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageTlvHeader {
    pub tlv_type: u16,
    pub len: u16,
}

/// Payload of a `IMAGE_TLV_DEPENDENCY` record
#[repr(C)]
#[derive(AsBytes, FromBytes, Default, Debug, Copy, Clone, Eq, PartialEq)]
pub struct ImageDependency {
    /// Logical image the dependency refers to
    pub image_id: u8,
    pub _pad1: u8,
    pub _pad2: u16,

    /// Minimum version of the referenced image
    pub image_min_version: ImageVersion,
}

/// Decoded TLV payload.
///
/// The tag is checked against the payload length before anything is read
/// out of the value.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Tlv<'a> {
    KeyHash(&'a ImageDigest),
    PubKey(ImageEccPubKey),
    Sha256(&'a ImageDigest),
    EcdsaSig(&'a [u8]),
    Dependency(ImageDependency),
    SecurityCounter(u32),
    Other { tlv_type: u16, value: &'a [u8] },
}

impl<'a> Tlv<'a> {
    pub fn decode(tlv_type: u16, value: &'a [u8]) -> BootResult<Self> {
        let tlv = match tlv_type {
            IMAGE_TLV_KEYHASH => Tlv::KeyHash(digest_ref(value)?),
            IMAGE_TLV_SHA256 => Tlv::Sha256(digest_ref(value)?),
            IMAGE_TLV_PUBKEY => Tlv::PubKey(
                ImageEccPubKey::from_spki(value).ok_or(BootError::IMAGE_TLV_BAD_LENGTH)?,
            ),
            IMAGE_TLV_ECDSA_SIG => {
                if value.is_empty() || value.len() > ECDSA256_SIG_MAX_SIZE {
                    Err(BootError::IMAGE_VERIFY_SIGNATURE_TOO_LARGE)?;
                }
                Tlv::EcdsaSig(value)
            }
            IMAGE_TLV_DEPENDENCY => Tlv::Dependency(
                ImageDependency::read_from(value).ok_or(BootError::IMAGE_TLV_BAD_LENGTH)?,
            ),
            IMAGE_TLV_SEC_CNT => {
                let bytes: [u8; SEC_CNT_SIZE] = value
                    .try_into()
                    .map_err(|_| BootError::IMAGE_TLV_BAD_LENGTH)?;
                Tlv::SecurityCounter(u32::from_le_bytes(bytes))
            }
            _ => Tlv::Other { tlv_type, value },
        };
        Ok(tlv)
    }

    pub fn tlv_type(&self) -> u16 {
        match self {
            Tlv::KeyHash(_) => IMAGE_TLV_KEYHASH,
            Tlv::PubKey(_) => IMAGE_TLV_PUBKEY,
            Tlv::Sha256(_) => IMAGE_TLV_SHA256,
            Tlv::EcdsaSig(_) => IMAGE_TLV_ECDSA_SIG,
            Tlv::Dependency(_) => IMAGE_TLV_DEPENDENCY,
            Tlv::SecurityCounter(_) => IMAGE_TLV_SEC_CNT,
            Tlv::Other { tlv_type, .. } => *tlv_type,
        }
    }

    /// TLVs that must live in the protected area when present
    pub fn is_protected_type(tlv_type: u16) -> bool {
        matches!(tlv_type, IMAGE_TLV_DEPENDENCY | IMAGE_TLV_SEC_CNT)
    }
}

fn digest_ref(value: &[u8]) -> BootResult<&ImageDigest> {
    value
        .try_into()
        .map_err(|_| BootError::IMAGE_TLV_BAD_LENGTH)
}
