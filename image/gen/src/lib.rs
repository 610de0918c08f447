/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures for the image generator.

--*/

mod generator;
mod tlv;

pub use generator::ImageGenerator;
pub use tlv::TlvAreaBuilder;

use swapboot_image_types::*;

pub type ImageEccPrivKey = [u8; ECC256_SCALAR_BYTE_SIZE];

pub trait ImageGeneratorHasher {
    type Output: Copy;

    fn update(&mut self, data: &[u8]);

    fn finish(self) -> Self::Output;
}

/// Image Generator Crypto Trait
pub trait ImageGeneratorCrypto {
    type Sha256Hasher: ImageGeneratorHasher<Output = ImageDigest>;

    fn sha256_start(&self) -> Self::Sha256Hasher;

    /// Calculate SHA-256 digest
    fn sha256_digest(&self, data: &[u8]) -> anyhow::Result<ImageDigest> {
        let mut hasher = self.sha256_start();
        hasher.update(data);
        Ok(hasher.finish())
    }

    /// Calculate a DER encoded ECDSA P-256 signature over a digest
    fn ecdsa256_sign(
        &self,
        digest: &ImageDigest,
        priv_key: &ImageEccPrivKey,
    ) -> anyhow::Result<Vec<u8>>;
}

/// How the signing key is named in the image
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum KeyTlv {
    /// SHA-256 of the DER encoded public key
    #[default]
    KeyHash,

    /// DER encoded public key
    PubKey,

    /// Verifier tries every key
    None,
}

/// Signing configuration
#[derive(Debug, Clone, Copy)]
pub struct ImageSigningConfig {
    pub priv_key: ImageEccPrivKey,
    pub pub_key: ImageEccPubKey,
    pub key_tlv: KeyTlv,
}

/// Image generator configuration
#[derive(Debug, Clone)]
pub struct ImageGeneratorConfig {
    /// Executable payload
    pub payload: Vec<u8>,

    /// Header size; the payload starts here
    pub hdr_size: u16,

    pub load_addr: u32,

    pub version: ImageVersion,

    pub flags: ImageFlags,

    /// Security counter placed in the protected area
    pub security_counter: Option<u32>,

    /// Dependencies placed in the protected area
    pub dependencies: Vec<ImageDependency>,

    /// Signature, omitted when `None`
    pub signing: Option<ImageSigningConfig>,
}

impl Default for ImageGeneratorConfig {
    fn default() -> Self {
        Self {
            payload: Vec::new(),
            hdr_size: IMAGE_HEADER_SIZE as u16,
            load_addr: 0,
            version: ImageVersion::default(),
            flags: ImageFlags::empty(),
            security_counter: None,
            dependencies: Vec::new(),
            signing: None,
        }
    }
}
