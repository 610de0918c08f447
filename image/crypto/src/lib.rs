/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains crypto utilities needed to generate and verify images on
    the host.

--*/

mod rustcrypto;

pub use rustcrypto::{check_key_pair, RustCrypto, RustCryptoBootHasher, RustCryptoSha256Hasher};

use anyhow::Context;
use ecdsa::elliptic_curve::sec1::ToEncodedPoint;
use p256::ecdsa::SigningKey;
use rand::{rngs::StdRng, SeedableRng};
use swapboot_image_gen::ImageEccPrivKey;
use swapboot_image_types::*;

/// Derive the public key of a private scalar
pub fn ecc_pub_key_from_priv(priv_key: &ImageEccPrivKey) -> anyhow::Result<ImageEccPubKey> {
    let signing_key = SigningKey::from_slice(priv_key).context("Invalid P-256 private key")?;
    let point = signing_key.verifying_key().to_encoded_point(false);

    let x = point.x().context("Error parsing x coordinate")?;
    let y = point.y().context("Error parsing y coordinate")?;

    let mut key = ImageEccPubKey::default();
    key.x.copy_from_slice(x);
    key.y.copy_from_slice(y);
    Ok(key)
}

/// Deterministic key pair for tests and simulations
pub fn ecc_key_pair(seed: u64) -> anyhow::Result<(ImageEccPrivKey, ImageEccPubKey)> {
    let mut rng = StdRng::seed_from_u64(seed);
    let signing_key = SigningKey::random(&mut rng);
    let priv_key: ImageEccPrivKey = signing_key.to_bytes().into();
    let pub_key = ecc_pub_key_from_priv(&priv_key)?;
    Ok((priv_key, pub_key))
}
