/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the bootloader driver interfaces: flash areas,
    the crypto engine, security counter storage, console output and boot
    status reporting.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod crypto;
mod flash;
pub mod printer;
mod rollback_store;
mod status_reporter;

pub use crypto::{BootCrypto, Sha256Hasher};
pub use flash::{Flash, FlashArea, FLASH_COPY_CHUNK};
pub use printer::HexBytes;
pub use rollback_store::SecurityCounterStore;
pub use status_reporter::{boot_status, report_boot_status};
pub use swapboot_error::{BootError, BootResult};
