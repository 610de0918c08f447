/*++

Licensed under the Apache-2.0 license.

File Name:

    env.rs

Abstract:

    Image verification environment over a flash slot.

--*/

use swapboot_drivers::{BootCrypto, Flash, FlashArea};
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::*;
use swapboot_image_verify::{ImageSource, ImageVerificationEnv};

/// Read only view of the image part of a slot
pub(crate) struct SlotReader<'a, F: Flash> {
    flash: &'a F,
    fa: FlashArea,
    slot_size: u32,
}

impl<'a, F: Flash> SlotReader<'a, F> {
    pub fn new(flash: &'a F, fa: FlashArea, slot_size: u32) -> Self {
        Self {
            flash,
            fa,
            slot_size,
        }
    }
}

impl<F: Flash> ImageSource for SlotReader<'_, F> {
    fn read(&self, off: u32, buf: &mut [u8]) -> BootResult<()> {
        let end = off
            .checked_add(buf.len() as u32)
            .ok_or(BootError::DRIVER_FLASH_OUT_OF_BOUNDS)?;
        if end > self.slot_size {
            Err(BootError::DRIVER_FLASH_OUT_OF_BOUNDS)?;
        }
        self.flash.read(&self.fa, off, buf)
    }

    fn slot_size(&self) -> u32 {
        self.slot_size
    }

    fn write_align(&self) -> u32 {
        self.flash.align(&self.fa)
    }

    fn erased_val(&self) -> u8 {
        self.flash.erased_val(&self.fa)
    }
}

/// Slot Verification Environment
pub(crate) struct SlotEnv<'a, F: Flash, C: BootCrypto> {
    reader: SlotReader<'a, F>,
    crypto: &'a mut C,
    keys: &'a [ImageEccPubKey],
    require_signature: bool,
}

impl<'a, F: Flash, C: BootCrypto> SlotEnv<'a, F, C> {
    pub fn new(
        reader: SlotReader<'a, F>,
        crypto: &'a mut C,
        keys: &'a [ImageEccPubKey],
        require_signature: bool,
    ) -> Self {
        Self {
            reader,
            crypto,
            keys,
            require_signature,
        }
    }
}

impl<F: Flash, C: BootCrypto> ImageSource for SlotEnv<'_, F, C> {
    fn read(&self, off: u32, buf: &mut [u8]) -> BootResult<()> {
        self.reader.read(off, buf)
    }

    fn slot_size(&self) -> u32 {
        self.reader.slot_size()
    }

    fn write_align(&self) -> u32 {
        self.reader.write_align()
    }

    fn erased_val(&self) -> u8 {
        self.reader.erased_val()
    }
}

impl<F: Flash, C: BootCrypto> ImageVerificationEnv for SlotEnv<'_, F, C> {
    type Hasher = C::Hasher;

    fn init(&mut self) -> BootResult<()> {
        self.crypto.init()
    }

    fn deinit(&mut self) {
        self.crypto.deinit()
    }

    fn sha256_start(&mut self) -> BootResult<C::Hasher> {
        self.crypto.sha256_start()
    }

    fn ecdsa256_verify(
        &mut self,
        pub_key: &ImageEccPubKey,
        digest: &ImageDigest,
        sig: &[u8],
    ) -> BootResult<bool> {
        self.crypto.ecdsa256_verify(pub_key, digest, sig)
    }

    fn pub_keys(&self) -> &[ImageEccPubKey] {
        self.keys
    }

    fn require_signature(&self) -> bool {
        self.require_signature
    }
}
