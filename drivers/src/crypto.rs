/*++

Licensed under the Apache-2.0 license.

File Name:

    crypto.rs

Abstract:

    File contains the interface to the platform crypto engine used for
    image verification.

--*/

use swapboot_error::BootResult;
use swapboot_image_types::{ImageDigest, ImageEccPubKey};

/// Streaming SHA-256 context
pub trait Sha256Hasher {
    fn update(&mut self, data: &[u8]) -> BootResult<()>;

    fn finish(self) -> BootResult<ImageDigest>;
}

/// Crypto backend
pub trait BootCrypto {
    type Hasher: Sha256Hasher;

    /// Bring up the engine before a verification
    fn init(&mut self) -> BootResult<()> {
        Ok(())
    }

    /// Power down the engine after a verification
    fn deinit(&mut self) {}

    /// Start a SHA-256 computation
    fn sha256_start(&mut self) -> BootResult<Self::Hasher>;

    /// Verify a DER encoded ECDSA P-256 signature over `digest`.
    ///
    /// The returned boolean is treated as untrusted by callers.
    fn ecdsa256_verify(
        &mut self,
        pub_key: &ImageEccPubKey,
        digest: &ImageDigest,
        sig: &[u8],
    ) -> BootResult<bool>;
}
