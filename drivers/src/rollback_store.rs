/*++

Licensed under the Apache-2.0 license.

File Name:

    rollback_store.rs

Abstract:

    File contains the interface to the rollback resistant security counter
    storage (OTP, secure element or a protected flash page).

--*/

use swapboot_error::BootResult;

/// Security counter storage
pub trait SecurityCounterStore {
    /// Read the stored counter of `image_id`
    fn read_counter(&self, image_id: u8) -> BootResult<u32>;

    /// Store a new counter value for `image_id`. Callers only ever pass
    /// values greater than the stored one.
    fn write_counter(&mut self, image_id: u8, value: u32) -> BootResult<()>;
}
