/*++

Licensed under the Apache-2.0 license.

File Name:

    lib.rs

Abstract:

    Control flow integrity and fault injection hardening primitives.

--*/

#![cfg_attr(not(feature = "std"), no_std)]

mod cfi;
mod cfi_counter;
mod fih;
mod secmem;
mod xoshiro;

pub use cfi::*;
pub use cfi_counter::{CfiCounter, CfiInt};
pub use fih::{FihChecks, FihUint, FihVerdict, Verdict, FIH_FAILURE, FIH_MASK, FIH_SUCCESS};
pub use secmem::{hardened_memeq, memeq, HardenedBool, HARDENED_BOOL_FALSE, HARDENED_BOOL_TRUE};
pub use xoshiro::Xoshiro128;

use core::cell::Cell;

/// Per-core CFI state: the hardened call counter and the delay PRNG
pub(crate) struct CfiState {
    pub(crate) val: Cell<u32>,
    pub(crate) mask: Cell<u32>,
    pub(crate) prng: Xoshiro128,
}

impl CfiState {
    const fn new() -> Self {
        Self {
            val: Cell::new(0),
            mask: Cell::new(CfiInt::MASK),
            prng: Xoshiro128::new_unseeded(),
        }
    }
}

#[cfg(feature = "std")]
std::thread_local! {
    static CFI_STATE: CfiState = const { CfiState::new() };
}

#[cfg(feature = "std")]
pub(crate) fn with_cfi_state<R>(f: impl FnOnce(&CfiState) -> R) -> R {
    CFI_STATE.with(f)
}

#[cfg(not(feature = "std"))]
struct SingleCore(CfiState);

// The bootloader runs on a single core with interrupts that never touch
// the CFI state.
#[cfg(not(feature = "std"))]
unsafe impl Sync for SingleCore {}

#[cfg(not(feature = "std"))]
static CFI_STATE: SingleCore = SingleCore(CfiState::new());

#[cfg(not(feature = "std"))]
pub(crate) fn with_cfi_state<R>(f: impl FnOnce(&CfiState) -> R) -> R {
    f(&CFI_STATE.0)
}
