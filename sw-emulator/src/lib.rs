/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the host side flash and counter storage
    simulators used to exercise the bootloader.

--*/

mod counter_store;
mod flash;

pub use counter_store::SimCounterStore;
pub use flash::{FlashOp, SimFlash, SimFlashSnapshot};
