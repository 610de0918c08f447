/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains API and macros used by the bootloader for error handling

--*/
#![cfg_attr(not(feature = "std"), no_std)]
use core::convert::From;
use core::num::{NonZeroU32, TryFromIntError};

/// Bootloader Error Type
/// Derives debug, copy, clone, eq, and partial eq
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BootError(pub NonZeroU32);

/// Error class, taken from the upper half of the error code
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// Flash read, write or erase failed
    FlashIo,

    /// Image header or TLV area is malformed
    Format,

    /// Digest, signature or key checks failed
    Trust,

    /// Security counter check failed
    Rollback,

    /// Swap trailer holds an unexpected pattern
    StateCorruption,

    /// Boot configuration is not usable
    Config,

    /// Boot flow level failure
    Boot,

    /// Control flow integrity violation
    Cfi,

    /// Unknown error group
    Unknown,
}

/// Macro to define error constants ensuring uniqueness
///
/// This macro takes a list of (name, value, doc) tuples and generates
/// constant definitions for each error code.
#[macro_export]
macro_rules! define_error_constants {
    ($(($name:ident, $value:expr, $doc:expr)),* $(,)?) => {
        $(
            #[doc = $doc]
            pub const $name: BootError = BootError::new_const($value);
        )*

        #[cfg(test)]
        /// Returns a vector of all defined error constants for testing uniqueness
        pub fn all_constants() -> Vec<(&'static str, u32)> {
            vec![
                $(
                    (stringify!($name), $value),
                )*
            ]
        }
    };
}

impl BootError {
    /// Create a boot error; intended to only be used from const contexts, as we don't want
    /// runtime panics if val is zero. The preferred way to get a BootError from a u32 is to
    /// use `BootError::try_from()` from the `TryFrom` trait impl.
    const fn new_const(val: u32) -> Self {
        match NonZeroU32::new(val) {
            Some(val) => Self(val),
            None => panic!("BootError cannot be 0"),
        }
    }

    /// Error class of this error
    pub fn kind(&self) -> ErrorKind {
        match self.0.get() >> 16 {
            0x0001 => ErrorKind::FlashIo,
            0x0002 => ErrorKind::Format,
            0x0003 => ErrorKind::Trust,
            0x0004 => ErrorKind::Rollback,
            0x0005 => ErrorKind::StateCorruption,
            0x0006 => ErrorKind::Config,
            0x0007 => ErrorKind::Boot,
            0x0008 => ErrorKind::Cfi,
            _ => ErrorKind::Unknown,
        }
    }

    define_error_constants![
        (
            DRIVER_FLASH_READ_FAILURE,
            0x0001_0001,
            "Flash read failed"
        ),
        (
            DRIVER_FLASH_WRITE_FAILURE,
            0x0001_0002,
            "Flash write failed"
        ),
        (
            DRIVER_FLASH_ERASE_FAILURE,
            0x0001_0003,
            "Flash erase failed"
        ),
        (
            DRIVER_FLASH_OUT_OF_BOUNDS,
            0x0001_0004,
            "Flash access outside of the area"
        ),
        (
            DRIVER_FLASH_UNALIGNED,
            0x0001_0005,
            "Flash write or erase not aligned"
        ),
        (
            DRIVER_FLASH_NOT_ERASED,
            0x0001_0006,
            "Flash write to a location that is not erased"
        ),
        (
            DRIVER_FLASH_AREA_NOT_FOUND,
            0x0001_0007,
            "Flash area id is unknown"
        ),
        (
            DRIVER_FLASH_POWER_LOSS,
            0x0001_0008,
            "Flash operation lost power before starting"
        ),
        (
            DRIVER_ROLLBACK_STORE_READ_FAILURE,
            0x0001_0009,
            "Rollback counter storage read failed"
        ),
        (
            DRIVER_ROLLBACK_STORE_WRITE_FAILURE,
            0x0001_000A,
            "Rollback counter storage write failed"
        ),
        (
            IMAGE_HEADER_BAD_MAGIC,
            0x0002_0001,
            "Image header magic mismatch"
        ),
        (
            IMAGE_HEADER_SIZE_OUT_OF_BOUNDS,
            0x0002_0002,
            "Image header declares sizes beyond the slot"
        ),
        (
            IMAGE_HEADER_UNALIGNED,
            0x0002_0003,
            "Image header size not aligned to the flash write alignment"
        ),
        (
            IMAGE_HEADER_SIZE_TOO_SMALL,
            0x0002_0004,
            "Image header size smaller than the header record"
        ),
        (
            IMAGE_HEADER_ERASED,
            0x0002_0005,
            "Image header is erased"
        ),
        (
            IMAGE_TLV_INFO_BAD_MAGIC,
            0x0002_0006,
            "TLV info header magic mismatch"
        ),
        (
            IMAGE_TLV_PROTECTED_SIZE_MISMATCH,
            0x0002_0007,
            "Protected TLV area size does not match the header"
        ),
        (
            IMAGE_TLV_OVERRUN,
            0x0002_0008,
            "TLV record extends past the TLV area end"
        ),
        (
            IMAGE_TLV_TRAILING_DATA,
            0x0002_0009,
            "TLV area holds bytes that do not form a record"
        ),
        (
            IMAGE_TLV_BAD_LENGTH,
            0x0002_000A,
            "TLV record length invalid for its type"
        ),
        (
            IMAGE_TLV_AREA_TOO_SMALL,
            0x0002_000B,
            "TLV info header total smaller than the info header"
        ),
        (
            IMAGE_TLV_PROTECTED_TYPE_UNPROTECTED,
            0x0002_000C,
            "Protected only TLV type found in the unprotected area"
        ),
        (
            IMAGE_VERIFY_DIGEST_MISSING,
            0x0003_0001,
            "Image digest TLV missing"
        ),
        (
            IMAGE_VERIFY_DIGEST_MISMATCH,
            0x0003_0002,
            "Image digest mismatch"
        ),
        (
            IMAGE_VERIFY_DIGEST_DUPLICATE,
            0x0003_0003,
            "Image carries more than one digest TLV"
        ),
        (
            IMAGE_VERIFY_SIGNATURE_MISSING,
            0x0003_0004,
            "Image signature TLV missing"
        ),
        (
            IMAGE_VERIFY_SIGNATURE_INVALID,
            0x0003_0005,
            "Image signature invalid for every configured key"
        ),
        (
            IMAGE_VERIFY_KEY_NOT_FOUND,
            0x0003_0006,
            "Key hash does not match any configured key"
        ),
        (
            IMAGE_VERIFY_SIGNATURE_TOO_LARGE,
            0x0003_0007,
            "Signature TLV larger than supported"
        ),
        (
            IMAGE_VERIFY_CRYPTO_FAILURE,
            0x0003_0008,
            "Crypto backend failure"
        ),
        (
            IMAGE_VERIFY_NON_BOOTABLE,
            0x0003_0009,
            "Image flagged as non bootable"
        ),
        (
            IMAGE_VERIFY_VERDICT_MISMATCH,
            0x0003_000A,
            "Redundant verdict evaluations disagree"
        ),
        (
            ROLLBACK_COUNTER_MISSING,
            0x0004_0001,
            "Image has no security counter TLV"
        ),
        (
            ROLLBACK_COUNTER_TOO_LOW,
            0x0004_0002,
            "Image security counter lower than stored counter"
        ),
        (
            ROLLBACK_COUNTER_READ_MISMATCH,
            0x0004_0003,
            "Repeated security counter reads disagree"
        ),
        (
            ROLLBACK_COUNTER_UPDATE_MISMATCH,
            0x0004_0004,
            "Stored security counter differs after update"
        ),
        (
            ROLLBACK_IMAGE_ID_OUT_OF_RANGE,
            0x0004_0005,
            "Security counter image id out of range"
        ),
        (
            SWAP_TRAILER_BAD_MAGIC,
            0x0005_0001,
            "Swap trailer magic is neither valid nor erased"
        ),
        (
            SWAP_TRAILER_FLAG_CORRUPT,
            0x0005_0002,
            "Swap trailer flag is neither set nor erased"
        ),
        (
            SWAP_TRAILER_INFO_INVALID,
            0x0005_0003,
            "Swap trailer swap info invalid"
        ),
        (
            SWAP_TRAILER_SIZE_INVALID,
            0x0005_0004,
            "Swap trailer swap size invalid"
        ),
        (
            SWAP_STATUS_CORRUPT,
            0x0005_0005,
            "Swap status table is inconsistent"
        ),
        (
            SWAP_SIZE_TOO_LARGE,
            0x0005_0006,
            "Swap does not fit in the slots"
        ),
        (
            SWAP_NOT_IN_PROGRESS,
            0x0005_0007,
            "No swap in progress to resume"
        ),
        (
            CONFIG_NO_IMAGES,
            0x0006_0001,
            "No images configured"
        ),
        (
            CONFIG_TOO_MANY_IMAGES,
            0x0006_0002,
            "Too many images configured"
        ),
        (
            CONFIG_SECTOR_SIZE_MISMATCH,
            0x0006_0003,
            "Slot sector sizes differ"
        ),
        (
            CONFIG_SCRATCH_MISSING,
            0x0006_0004,
            "Scratch mode configured without a scratch area"
        ),
        (
            CONFIG_SCRATCH_TOO_SMALL,
            0x0006_0005,
            "Scratch area smaller than one sector"
        ),
        (
            CONFIG_SLOT_TOO_SMALL,
            0x0006_0006,
            "Slot cannot hold the trailer and a payload"
        ),
        (
            CONFIG_AREA_OVERLAP,
            0x0006_0007,
            "Configured flash areas overlap"
        ),
        (
            CONFIG_ALIGN_UNSUPPORTED,
            0x0006_0008,
            "Flash write alignment unsupported"
        ),
        (
            CONFIG_NO_KEYS,
            0x0006_0009,
            "Signature required but no keys configured"
        ),
        (
            CONFIG_SECTOR_SIZE_INVALID,
            0x0006_000A,
            "Sector size does not divide the area"
        ),
        (
            BOOT_NO_BOOTABLE_IMAGE,
            0x0007_0001,
            "No bootable image"
        ),
        (
            BOOT_IMAGE_INDEX_OUT_OF_RANGE,
            0x0007_0002,
            "Image index out of range"
        ),
        (
            BOOT_DEPENDENCY_UNSATISFIED,
            0x0007_0003,
            "Image dependency not satisfied"
        ),
        (
            BOOT_DEPENDENCY_INVALID,
            0x0007_0004,
            "Image dependency refers to an unknown image"
        ),
        (
            BOOT_REQUEST_CORRUPT,
            0x0007_0005,
            "Upgrade request trailer is corrupted"
        ),
        (
            BOOT_DOWNGRADE_REJECTED,
            0x0007_0006,
            "Candidate version lower than the primary"
        ),
        (
            CFI_PANIC_COUNTER_CORRUPT,
            0x0008_0001,
            "CFI Panic: Counter corrupted"
        ),
        (
            CFI_PANIC_COUNTER_OVERFLOW,
            0x0008_0002,
            "CFI Panic: Counter overflow"
        ),
        (
            CFI_PANIC_COUNTER_UNDERFLOW,
            0x0008_0003,
            "CFI Panic: Counter underflow"
        ),
        (
            CFI_PANIC_COUNTER_MISMATCH,
            0x0008_0004,
            "CFI Panic: Counter mismatch"
        ),
        (
            CFI_PANIC_ASSERT_EQ_FAILURE,
            0x0008_0005,
            "CFI Panic: Assert equal failed"
        ),
        (
            CFI_PANIC_ASSERT_NE_FAILURE,
            0x0008_0006,
            "CFI Panic: Assert not equal failed"
        ),
        (
            CFI_PANIC_ASSERT_GT_FAILURE,
            0x0008_0007,
            "CFI Panic: Assert greater than failed"
        ),
        (
            CFI_PANIC_ASSERT_LT_FAILURE,
            0x0008_0008,
            "CFI Panic: Assert less than failed"
        ),
        (
            CFI_PANIC_ASSERT_GE_FAILURE,
            0x0008_0009,
            "CFI Panic: Assert greater than or equal failed"
        ),
        (
            CFI_PANIC_ASSERT_LE_FAILURE,
            0x0008_000A,
            "CFI Panic: Assert less than or equal failed"
        ),
        (
            CFI_PANIC_FIH_VERDICT_CORRUPT,
            0x0008_000B,
            "CFI Panic: Hardened verdict encoding corrupted"
        ),
        (
            CFI_PANIC_UNKNOWN,
            0x0008_000C,
            "CFI Panic: Unknown"
        ),
    ];
}

impl From<core::num::NonZeroU32> for crate::BootError {
    fn from(val: core::num::NonZeroU32) -> Self {
        crate::BootError(val)
    }
}

impl From<BootError> for core::num::NonZeroU32 {
    fn from(val: BootError) -> Self {
        val.0
    }
}

impl From<BootError> for u32 {
    fn from(val: BootError) -> Self {
        core::num::NonZeroU32::from(val).get()
    }
}

impl TryFrom<u32> for BootError {
    type Error = TryFromIntError;
    fn try_from(val: u32) -> Result<Self, TryFromIntError> {
        match NonZeroU32::try_from(val) {
            Ok(val) => Ok(BootError(val)),
            Err(err) => Err(err),
        }
    }
}

pub type BootResult<T> = Result<T, BootError>;
