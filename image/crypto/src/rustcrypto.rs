/*++

Licensed under the Apache-2.0 license.

File Name:

   rustcrypto.rs

Abstract:

    File contains the RustCrypto backed image signer and boot crypto engine.

--*/

use std::path::Path;
use std::str::from_utf8;

use anyhow::Context;

use swapboot_drivers::{BootCrypto, Sha256Hasher};
use swapboot_error::{BootError, BootResult};
use swapboot_image_gen::{ImageEccPrivKey, ImageGeneratorCrypto, ImageGeneratorHasher};
use swapboot_image_types::*;

use {
    ecdsa::elliptic_curve::sec1::ToEncodedPoint,
    ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier},
    p256::ecdsa::{Signature, SigningKey, VerifyingKey},
    p256::pkcs8::DecodePublicKey,
    sha2::{Digest, Sha256},
};

use crate::ecc_pub_key_from_priv;

/// Host crypto engine
#[derive(Default)]
pub struct RustCrypto {
    /// Number of `init` calls without a matching `deinit`
    active: u32,
}

impl RustCrypto {
    /// Read a P-256 public key from a PEM file
    pub fn ecc_pub_key_from_pem(path: &Path) -> anyhow::Result<ImageEccPubKey> {
        let key_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read public key PEM file {}", path.display()))?;

        let pub_key = p256::PublicKey::from_public_key_pem(from_utf8(&key_bytes)?)?;
        let verifying_key = VerifyingKey::from(pub_key);
        let point = verifying_key.to_encoded_point(false);

        let mut image_key = ImageEccPubKey::default();
        image_key
            .x
            .copy_from_slice(point.x().context("Error parsing x coordinate")?);
        image_key
            .y
            .copy_from_slice(point.y().context("Error parsing y coordinate")?);
        Ok(image_key)
    }

    /// Read a P-256 private key from a SEC1 PEM file
    pub fn ecc_priv_key_from_pem(path: &Path) -> anyhow::Result<ImageEccPrivKey> {
        let key_bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read private key PEM file {}", path.display()))?;

        let secret = p256::SecretKey::from_sec1_pem(from_utf8(&key_bytes)?)?;
        Ok(secret.to_bytes().into())
    }

    /// Outstanding `init` calls
    pub fn active(&self) -> u32 {
        self.active
    }
}

pub struct RustCryptoSha256Hasher(Sha256);

impl ImageGeneratorHasher for RustCryptoSha256Hasher {
    type Output = ImageDigest;

    fn update(&mut self, data: &[u8]) {
        self.0.update(data)
    }

    fn finish(self) -> Self::Output {
        self.0.finalize().into()
    }
}

impl ImageGeneratorCrypto for RustCrypto {
    type Sha256Hasher = RustCryptoSha256Hasher;

    fn sha256_start(&self) -> Self::Sha256Hasher {
        RustCryptoSha256Hasher(Sha256::default())
    }

    fn ecdsa256_sign(
        &self,
        digest: &ImageDigest,
        priv_key: &ImageEccPrivKey,
    ) -> anyhow::Result<Vec<u8>> {
        let sig: Signature = SigningKey::from_slice(priv_key)?.sign_prehash(digest)?;
        Ok(sig.to_der().as_bytes().to_vec())
    }
}

pub struct RustCryptoBootHasher(Sha256);

impl Sha256Hasher for RustCryptoBootHasher {
    fn update(&mut self, data: &[u8]) -> BootResult<()> {
        Digest::update(&mut self.0, data);
        Ok(())
    }

    fn finish(self) -> BootResult<ImageDigest> {
        Ok(self.0.finalize().into())
    }
}

impl BootCrypto for RustCrypto {
    type Hasher = RustCryptoBootHasher;

    fn init(&mut self) -> BootResult<()> {
        self.active += 1;
        Ok(())
    }

    fn deinit(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    fn sha256_start(&mut self) -> BootResult<RustCryptoBootHasher> {
        Ok(RustCryptoBootHasher(Sha256::new()))
    }

    fn ecdsa256_verify(
        &mut self,
        pub_key: &ImageEccPubKey,
        digest: &ImageDigest,
        sig: &[u8],
    ) -> BootResult<bool> {
        let point =
            p256::EncodedPoint::from_affine_coordinates(&pub_key.x.into(), &pub_key.y.into(), false);
        let verifying_key = VerifyingKey::from_encoded_point(&point)
            .map_err(|_| BootError::IMAGE_VERIFY_CRYPTO_FAILURE)?;

        // A malformed signature is a failed verification, not an engine fault
        let Ok(sig) = Signature::from_der(sig) else {
            return Ok(false);
        };
        Ok(verifying_key.verify_prehash(digest, &sig).is_ok())
    }
}

/// Check that `pub_key` belongs to `priv_key`
pub fn check_key_pair(priv_key: &ImageEccPrivKey, pub_key: &ImageEccPubKey) -> anyhow::Result<()> {
    if ecc_pub_key_from_priv(priv_key)? != *pub_key {
        anyhow::bail!("Public key does not match the private key");
    }
    Ok(())
}
