/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Image parsing and verification library.

--*/
#![cfg_attr(not(feature = "std"), no_std)]

mod codec;
mod verifier;

use swapboot_cfi_lib::FihVerdict;
use swapboot_drivers::Sha256Hasher;
use swapboot_error::BootResult;
use swapboot_image_types::*;

pub use codec::{
    compute_digest, image_total_size, parse_header, read_dependencies, read_security_counter,
    TlvArea, TlvIter, TlvRecord,
};
pub use verifier::ImageVerifier;

/// Verified image information
#[derive(Debug, Clone, Copy)]
pub struct ImageVerificationInfo {
    /// Header the checks ran against
    pub header: ImageHeader,

    /// Recomputed image digest
    pub digest: ImageDigest,

    /// Index of the key that verified the signature
    pub key_idx: Option<usize>,

    /// Security counter, when the image carries one
    pub security_counter: Option<u32>,

    /// Hardened verdict of the trust checks
    pub verdict: FihVerdict,
}

/// Read only view of the bytes of one slot
pub trait ImageSource {
    /// Read `buf.len()` bytes at slot offset `off`
    fn read(&self, off: u32, buf: &mut [u8]) -> BootResult<()>;

    /// Bytes available to the image (header, payload and TLVs)
    fn slot_size(&self) -> u32;

    /// Flash write alignment of the slot
    fn write_align(&self) -> u32;

    /// Value of an erased flash byte
    fn erased_val(&self) -> u8;
}

/// Image Verification Environment
pub trait ImageVerificationEnv: ImageSource {
    type Hasher: Sha256Hasher;

    /// Prepare the crypto backend
    fn init(&mut self) -> BootResult<()> {
        Ok(())
    }

    /// Release the crypto backend
    fn deinit(&mut self) {}

    /// Start a SHA-256 computation
    fn sha256_start(&mut self) -> BootResult<Self::Hasher>;

    /// Perform ECDSA P-256 verification of a DER encoded signature
    fn ecdsa256_verify(
        &mut self,
        pub_key: &ImageEccPubKey,
        digest: &ImageDigest,
        sig: &[u8],
    ) -> BootResult<bool>;

    /// Public keys trusted for image signatures
    fn pub_keys(&self) -> &[ImageEccPubKey];

    /// Reject images without a signature
    fn require_signature(&self) -> bool;
}
