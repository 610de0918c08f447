/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    File contains exports for the swap update boot loader: configuration,
    the boot flow and the trailer API for the running image.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod api;
mod boot_env;
mod boot_status;
mod config;
mod env;
mod flow;
mod plan;
mod rollback;
mod swap;
mod trailer;

pub use api::{set_confirmed, set_pending, swap_state};
pub use boot_env::BootEnv;
pub use boot_status::BootStatus;
pub use config::{BootConfig, BootLayout, ImageLayout, ImageSlots, UpgradeMode};
pub use flow::{decide, BootDecision, BootResponse, BootTarget};
pub use plan::{Slot, SlotSector, SwapPlan, SwapStep};
pub use rollback::RollbackGuard;
pub use swap::SwapState;
pub use trailer::{
    trailer_size, FlagState, MagicState, SlotTrailer, SwapInfo, SwapType, TrailerLayout,
    TrailerState, BOOT_MAGIC,
};
