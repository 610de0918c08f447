/*++

Licensed under the Apache-2.0 license.

File Name:

    state.rs

Abstract:

    File contains the interpretation of the two trailers of an image: the
    swap that has to run on this boot, and the swap state reported to the
    running image.

--*/

use swapboot_drivers::Flash;
use swapboot_error::{BootError, BootResult};

use crate::config::{ImageLayout, UpgradeMode};
use crate::trailer::{FlagState, MagicState, SwapInfo, SwapType, TrailerState};

use super::swap_plan;

/// Work found in the trailers
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PendingSwap {
    /// Nothing requested
    None,

    /// A swap was interrupted and must be completed
    Resume(SwapType),

    /// A swap has to be started. `revert_from_primary` marks a revert that
    /// is only recorded in the primary trailer.
    Start {
        swap_type: SwapType,
        revert_from_primary: bool,
    },
}

/// Swap state as seen from the running image
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SwapState {
    /// No request, and any earlier swap is committed and confirmed
    Idle,

    /// A request is pending and runs on the next boot
    SwapStarting(SwapType),

    /// A swap was interrupted at `step`
    SwapInProgress { swap_type: SwapType, step: u32 },

    /// The last test swap finished but the image is not confirmed yet. It
    /// reverts on the next boot unless it is confirmed first.
    SwapComplete,
}

/// Reject primary trailers the loader could not have written
pub(crate) fn check_primary(pri: &TrailerState) -> BootResult<()> {
    match pri.magic {
        MagicState::Bad => Err(BootError::SWAP_TRAILER_BAD_MAGIC),
        MagicState::Unset => Ok(()),
        MagicState::Good => {
            if pri.image_ok == FlagState::Bad || pri.copy_done == FlagState::Bad {
                Err(BootError::SWAP_TRAILER_FLAG_CORRUPT)?;
            }
            if pri.swap_info == SwapInfo::Bad {
                Err(BootError::SWAP_TRAILER_INFO_INVALID)?;
            }
            Ok(())
        }
    }
}

/// Upgrade request recorded in the secondary trailer
pub(crate) fn secondary_request(sec: &TrailerState) -> BootResult<Option<SwapType>> {
    if sec.magic != MagicState::Good {
        return Ok(None);
    }
    if sec.image_ok == FlagState::Bad || sec.swap_info == SwapInfo::Bad {
        Err(BootError::BOOT_REQUEST_CORRUPT)?;
    }

    if sec.swap_info.swap_type() == Some(SwapType::Revert) {
        return Ok(Some(SwapType::Revert));
    }
    Ok(Some(match sec.image_ok {
        FlagState::Set => SwapType::Perm,
        _ => SwapType::Test,
    }))
}

/// Swap to run for a swapping upgrade mode
pub(crate) fn pending_swap(pri: &TrailerState, sec: &TrailerState) -> BootResult<PendingSwap> {
    check_primary(pri)?;

    if pri.magic == MagicState::Good && pri.copy_done == FlagState::Unset {
        let swap_type = pri
            .swap_info
            .swap_type()
            .ok_or(BootError::SWAP_TRAILER_INFO_INVALID)?;
        return Ok(PendingSwap::Resume(swap_type));
    }

    if let Some(swap_type) = secondary_request(sec)? {
        return Ok(PendingSwap::Start {
            swap_type,
            revert_from_primary: false,
        });
    }

    if pri.magic == MagicState::Good
        && pri.image_ok == FlagState::Unset
        && pri.copy_done == FlagState::Set
    {
        return Ok(PendingSwap::Start {
            swap_type: SwapType::Revert,
            revert_from_primary: true,
        });
    }

    Ok(PendingSwap::None)
}

/// Primary image will not be reverted
pub(crate) fn primary_confirmed(pri: &TrailerState) -> bool {
    pri.magic != MagicState::Good || pri.image_ok == FlagState::Set
}

/// Current swap state of `image`
pub(crate) fn swap_state<F: Flash>(
    flash: &F,
    image: &ImageLayout,
    mode: UpgradeMode,
) -> BootResult<SwapState> {
    let pri = image.primary_trailer().read_state(flash)?;
    let sec = image.secondary_trailer().read_state(flash)?;

    if mode == UpgradeMode::OverwriteOnly {
        return Ok(match secondary_request(&sec)? {
            Some(_) => SwapState::SwapStarting(SwapType::Perm),
            None => SwapState::Idle,
        });
    }

    match pending_swap(&pri, &sec)? {
        PendingSwap::Resume(swap_type) => {
            let swap_size = pri.swap_size.ok_or(BootError::SWAP_TRAILER_SIZE_INVALID)?;
            let plan = swap_plan(image, mode, swap_size)?;
            let step = image.primary_trailer().resume_point(flash, plan.len())?;
            Ok(SwapState::SwapInProgress { swap_type, step })
        }
        PendingSwap::Start {
            swap_type,
            revert_from_primary: false,
        } => Ok(SwapState::SwapStarting(swap_type)),
        // A confirmed swap is settled and reads as Idle
        _ if pri.copy_done == FlagState::Set && pri.image_ok != FlagState::Set => {
            Ok(SwapState::SwapComplete)
        }
        _ => Ok(SwapState::Idle),
    }
}
