/*++

Licensed under the Apache-2.0 license.

File Name:

    verifier.rs

Abstract:

    This file is the main implementation of the image trust evaluator.

--*/

use crate::codec::{compute_digest, read_security_counter, TlvArea, TlvIter, TlvRecord};
use crate::*;
#[cfg(not(feature = "no-cfi"))]
use swapboot_cfi_derive::cfi_impl_fn;
use swapboot_cfi_lib::{
    cfi_assert, cfi_assert_eq, cfi_check, cfi_launder, hardened_memeq, memeq, FihChecks,
    FihVerdict, Verdict,
};
use swapboot_drivers::{cprintln, Sha256Hasher};
use swapboot_error::BootError;
use swapboot_image_types::*;
use zerocopy::AsBytes;

const CHECK_DIGEST: u32 = 0x0000_0001;
const CHECK_SIGNATURE: u32 = 0x0000_0010;

/// TLV records the trust checks look at
#[derive(Default)]
struct TrustTlvs {
    digest: Option<TlvRecord>,
    key_hash: Option<TlvRecord>,
    pub_key: Option<TlvRecord>,
    signature: Option<TlvRecord>,
}

/// Image Verifier
pub struct ImageVerifier<Env: ImageVerificationEnv> {
    /// Verification Environment
    env: Env,
}

impl<Env: ImageVerificationEnv> ImageVerifier<Env> {
    /// Create a new instance `ImageVerifier`
    ///
    /// # Arguments
    ///
    /// * `env` - Environment
    pub fn new(env: Env) -> Self {
        Self { env }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn into_env(self) -> Env {
        self.env
    }

    /// Verify the image described by `hdr`
    ///
    /// # Arguments
    ///
    /// * `hdr` - Parsed image header
    ///
    /// # Returns
    ///
    /// * `ImageVerificationInfo` - Image verification information on success
    #[cfg_attr(not(feature = "no-cfi"), cfi_impl_fn)]
    pub fn verify(&mut self, hdr: &ImageHeader) -> BootResult<ImageVerificationInfo> {
        self.env.init()?;
        let result = self.verify_image(hdr);
        self.env.deinit();
        cfi_check!(result);
        result
    }

    fn verify_image(&mut self, hdr: &ImageHeader) -> BootResult<ImageVerificationInfo> {
        if hdr.image_flags().contains(ImageFlags::NON_BOOTABLE) {
            Err(BootError::IMAGE_VERIFY_NON_BOOTABLE)?;
        }

        let hasher = self.env.sha256_start()?;
        let digest = compute_digest(&self.env, hdr, hasher)?;
        let tlvs = self.collect_tlvs(hdr)?;

        let mut checks = FihChecks::new();
        let mut expected = CHECK_DIGEST;

        // Digest
        let digest_ok = self.verify_digest(&tlvs, &digest)?;
        checks.record(CHECK_DIGEST, digest_ok);

        // Signature
        let mut key_idx = None;
        if let Some(sig_record) = tlvs.signature {
            expected |= CHECK_SIGNATURE;
            let selected = self.select_key(&tlvs)?;
            let (sig_ok, idx) = self.verify_signature(&sig_record, selected, &digest)?;
            checks.record(CHECK_SIGNATURE, sig_ok);
            key_idx = idx;
        } else if self.env.require_signature() {
            Err(BootError::IMAGE_VERIFY_SIGNATURE_MISSING)?;
        }

        let verdict = checks.finish(expected);
        if cfi_launder(verdict.verdict()) == Verdict::Success {
            cfi_assert_eq(checks.passed(), expected);
        } else {
            Err(BootError::IMAGE_VERIFY_VERDICT_MISMATCH)?;
        }

        let security_counter = read_security_counter(&self.env, hdr)?;

        Ok(ImageVerificationInfo {
            header: *hdr,
            digest,
            key_idx,
            security_counter,
            verdict,
        })
    }

    /// Locate the trust related records in one pass
    fn collect_tlvs(&self, hdr: &ImageHeader) -> BootResult<TrustTlvs> {
        let mut tlvs = TrustTlvs::default();
        for record in TlvIter::new(&self.env, hdr, IMAGE_TLV_ANY, TlvArea::All)? {
            let record = record?;
            let slot = match record.tlv_type {
                IMAGE_TLV_SHA256 => {
                    if tlvs.digest.is_some() {
                        Err(BootError::IMAGE_VERIFY_DIGEST_DUPLICATE)?;
                    }
                    &mut tlvs.digest
                }
                IMAGE_TLV_KEYHASH => &mut tlvs.key_hash,
                IMAGE_TLV_PUBKEY => &mut tlvs.pub_key,
                IMAGE_TLV_ECDSA_SIG => &mut tlvs.signature,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(record);
            }
        }
        Ok(tlvs)
    }

    /// Compare the digest TLV with the recomputed digest
    fn verify_digest(&self, tlvs: &TrustTlvs, digest: &ImageDigest) -> BootResult<FihVerdict> {
        let record = tlvs
            .digest
            .ok_or(BootError::IMAGE_VERIFY_DIGEST_MISSING)?;

        let mut buf = [0u8; SHA256_DIGEST_BYTE_SIZE];
        let Tlv::Sha256(stored) = Tlv::decode(record.tlv_type, record.read(&self.env, &mut buf)?)?
        else {
            return Err(BootError::IMAGE_TLV_BAD_LENGTH);
        };

        let verdict = FihVerdict::from_hardened(hardened_memeq(stored, digest));
        if cfi_launder(verdict.verdict()) != Verdict::Success {
            cprintln!("[verify] Digest mismatch");
            Err(BootError::IMAGE_VERIFY_DIGEST_MISMATCH)?;
        }
        Ok(verdict)
    }

    /// Key index named by a KEYHASH or PUBKEY record, `None` when the image
    /// names no key
    fn select_key(&mut self, tlvs: &TrustTlvs) -> BootResult<Option<usize>> {
        let key_count = self.env.pub_keys().len();

        if let Some(record) = tlvs.key_hash {
            let mut buf = [0u8; SHA256_DIGEST_BYTE_SIZE];
            let Tlv::KeyHash(wanted) = Tlv::decode(record.tlv_type, record.read(&self.env, &mut buf)?)?
            else {
                return Err(BootError::IMAGE_TLV_BAD_LENGTH);
            };
            for idx in 0..key_count {
                let key = self.env.pub_keys()[idx];
                let mut hasher = self.env.sha256_start()?;
                hasher.update(&key.to_spki())?;
                if memeq(&hasher.finish()?, wanted) {
                    return Ok(Some(idx));
                }
            }
            Err(BootError::IMAGE_VERIFY_KEY_NOT_FOUND)?;
        }

        if let Some(record) = tlvs.pub_key {
            let mut buf = [0u8; ECC256_PUB_KEY_SPKI_SIZE];
            let Tlv::PubKey(wanted) = Tlv::decode(record.tlv_type, record.read(&self.env, &mut buf)?)?
            else {
                return Err(BootError::IMAGE_TLV_BAD_LENGTH);
            };
            let found = self
                .env
                .pub_keys()
                .iter()
                .position(|key| memeq(key.as_bytes(), wanted.as_bytes()));
            return found.map(Some).ok_or(BootError::IMAGE_VERIFY_KEY_NOT_FOUND);
        }

        Ok(None)
    }

    /// Try the selected key, or every configured key in order
    fn verify_signature(
        &mut self,
        record: &TlvRecord,
        selected: Option<usize>,
        digest: &ImageDigest,
    ) -> BootResult<(FihVerdict, Option<usize>)> {
        if usize::from(record.len) > ECDSA256_SIG_MAX_SIZE {
            Err(BootError::IMAGE_VERIFY_SIGNATURE_TOO_LARGE)?;
        }

        let mut buf = [0u8; ECDSA256_SIG_MAX_SIZE];
        let Tlv::EcdsaSig(sig) = Tlv::decode(record.tlv_type, record.read(&self.env, &mut buf)?)?
        else {
            return Err(BootError::IMAGE_VERIFY_SIGNATURE_INVALID);
        };

        let candidates = match selected {
            Some(idx) => idx..idx + 1,
            None => 0..self.env.pub_keys().len(),
        };

        for idx in candidates {
            let key = self.env.pub_keys()[idx];
            let result = self.env.ecdsa256_verify(&key, digest, sig);
            cfi_check!(result);

            // The backend answer is an untrusted boolean
            let verified = result?;
            if cfi_launder(verified) {
                cfi_assert!(verified);
                return Ok((FihVerdict::success(), Some(idx)));
            } else {
                cfi_assert!(!verified);
            }
        }

        cprintln!("[verify] No key verified the signature");
        Err(BootError::IMAGE_VERIFY_SIGNATURE_INVALID)
    }
}
