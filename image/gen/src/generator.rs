/*++

Licensed under the Apache-2.0 license.

File Name:

   generator.rs

Abstract:

    Image generator

--*/
use anyhow::{bail, Context};
use swapboot_image_types::*;
use zerocopy::AsBytes;

use crate::*;

/// Image generator
pub struct ImageGenerator<Crypto: ImageGeneratorCrypto> {
    crypto: Crypto,
}

impl<Crypto: ImageGeneratorCrypto> ImageGenerator<Crypto> {
    /// Create an instance `ImageGenerator`
    pub fn new(crypto: Crypto) -> Self {
        Self { crypto }
    }

    /// Generate image
    ///
    /// # Arguments
    ///
    /// * `config` - Image generator configuration
    ///
    /// # Returns
    ///
    /// * `Vec<u8>` - Header, payload and both TLV areas, ready to be
    ///   written at the start of a slot
    pub fn generate(&self, config: &ImageGeneratorConfig) -> anyhow::Result<Vec<u8>> {
        if usize::from(config.hdr_size) < IMAGE_HEADER_SIZE {
            bail!(
                "Header size {} smaller than {IMAGE_HEADER_SIZE} bytes",
                config.hdr_size
            );
        }

        // Create protected TLVs
        let prot = self.gen_protected_tlvs(config)?;
        let prot = if prot.is_empty() {
            Vec::new()
        } else {
            prot.build()?
        };

        // Create Header
        let header = self.gen_header(config, &prot)?;

        let mut image = header.as_bytes().to_vec();
        image.resize(usize::from(config.hdr_size), 0);
        image.extend_from_slice(&config.payload);
        image.extend_from_slice(&prot);

        // Create unprotected TLVs over everything written so far
        let digest = self.crypto.sha256_digest(&image)?;
        let unprot = self.gen_unprotected_tlvs(config, &digest)?;
        image.extend_from_slice(&unprot.build()?);

        Ok(image)
    }

    /// Generate header
    fn gen_header(&self, config: &ImageGeneratorConfig, prot: &[u8]) -> anyhow::Result<ImageHeader> {
        let img_size = u32::try_from(config.payload.len()).context("Payload too large")?;
        let protect_tlv_size =
            u16::try_from(prot.len()).context("Protected TLV area too large")?;

        let mut header = ImageHeader::default();
        header
            .set_magic(IMAGE_MAGIC)
            .set_load_addr(config.load_addr)
            .set_hdr_size(config.hdr_size)
            .set_protect_tlv_size(protect_tlv_size)
            .set_img_size(img_size)
            .set_flags(config.flags.bits())
            .set_ver(config.version);
        Ok(header)
    }

    fn gen_protected_tlvs(&self, config: &ImageGeneratorConfig) -> anyhow::Result<TlvAreaBuilder> {
        let mut area = TlvAreaBuilder::protected();
        if let Some(counter) = config.security_counter {
            area.push(IMAGE_TLV_SEC_CNT, &counter.to_le_bytes())?;
        }
        for dep in config.dependencies.iter() {
            area.push(IMAGE_TLV_DEPENDENCY, dep.as_bytes())?;
        }
        Ok(area)
    }

    fn gen_unprotected_tlvs(
        &self,
        config: &ImageGeneratorConfig,
        digest: &ImageDigest,
    ) -> anyhow::Result<TlvAreaBuilder> {
        let mut area = TlvAreaBuilder::unprotected();
        area.push(IMAGE_TLV_SHA256, digest)?;

        if let Some(signing) = &config.signing {
            match signing.key_tlv {
                KeyTlv::KeyHash => {
                    let key_hash = self.pub_key_digest(&signing.pub_key)?;
                    area.push(IMAGE_TLV_KEYHASH, &key_hash)?;
                }
                KeyTlv::PubKey => {
                    area.push(IMAGE_TLV_PUBKEY, &signing.pub_key.to_spki())?;
                }
                KeyTlv::None => {}
            }
            let sig = self.crypto.ecdsa256_sign(digest, &signing.priv_key)?;
            area.push(IMAGE_TLV_ECDSA_SIG, &sig)?;
        }
        Ok(area)
    }

    /// Calculate the key hash the verifier matches keys against, taken over
    /// the DER encoded key
    pub fn pub_key_digest(&self, pub_key: &ImageEccPubKey) -> anyhow::Result<ImageDigest> {
        self.crypto.sha256_digest(&pub_key.to_spki())
    }
}
