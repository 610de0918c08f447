/*++

Licensed under the Apache-2.0 license.

File Name:

    boot_status.rs

Abstract:

    Loader boot status codes.

--*/

const FLOW_BOOT_STATUS_BASE: u32 = 1;
const SWAP_BOOT_STATUS_BASE: u32 = 65;
const ROLLBACK_BOOT_STATUS_BASE: u32 = 129;

/// Statuses used by the loader to log boot progress.
#[repr(u32)]
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BootStatus {
    // Orchestrator Statuses
    ConfigValidated = FLOW_BOOT_STATUS_BASE,
    InterruptedSwapsComplete = FLOW_BOOT_STATUS_BASE + 1,
    SwapTypesResolved = FLOW_BOOT_STATUS_BASE + 2,
    DependenciesChecked = FLOW_BOOT_STATUS_BASE + 3,
    UpgradesComplete = FLOW_BOOT_STATUS_BASE + 4,
    PrimaryImagesValidated = FLOW_BOOT_STATUS_BASE + 5,
    BootTargetSelected = FLOW_BOOT_STATUS_BASE + 6,
    NoBootableImage = FLOW_BOOT_STATUS_BASE + 7,

    // Swap Statuses
    SwapStarted = SWAP_BOOT_STATUS_BASE,
    SwapResumed = SWAP_BOOT_STATUS_BASE + 1,
    SwapSectorsCopied = SWAP_BOOT_STATUS_BASE + 2,
    SwapFinished = SWAP_BOOT_STATUS_BASE + 3,
    CandidateRejected = SWAP_BOOT_STATUS_BASE + 4,
    OverwriteComplete = SWAP_BOOT_STATUS_BASE + 5,

    // Rollback Statuses
    RollbackCheckComplete = ROLLBACK_BOOT_STATUS_BASE,
    RollbackCounterUpdated = ROLLBACK_BOOT_STATUS_BASE + 1,
}

impl From<BootStatus> for u32 {
    /// Converts to this type from the input type.
    fn from(status: BootStatus) -> u32 {
        status as u32
    }
}
