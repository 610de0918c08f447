/*++

Licensed under the Apache-2.0 license.

File Name:

    cfi.rs

Abstract:

    File contains CFI launder, panic and assertion routines.

References:
    https://github.com/lowRISC/opentitan/blob/7a61300cf7c409fa68fd892942c1d7b58a7cd4c0/sw/device/lib/base/hardened.h#L260

--*/

use swapboot_error::BootError;

use crate::CfiCounter;
use core::cmp::{Ord, PartialEq, PartialOrd};

/// CFI Panic Information
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CfiPanicInfo {
    /// CFI Counter decode error
    CounterCorrupt,

    /// CFI Counter overflow
    CounterOverflow,

    /// CFI Counter underflow
    CounterUnderflow,

    /// CFI Counter mismatch
    CounterMismatch,

    /// CFI Assert Equal failed
    AssertEqFail,

    /// CFI Assert Not Equal failed
    AssertNeFail,

    /// CFI Greater Than failed
    AssertGtFail,

    /// CFI Less Than failed
    AssertLtFail,

    /// CFI Greater Than Equal failed
    AssertGeFail,

    /// CFI Less Than Equal failed
    AssertLeFail,

    /// Hardened verdict or integer failed its shadow check
    FihCorrupt,

    /// An enum match statement finds an unexpected value.
    UnexpectedMatchBranch,

    /// Unknown error
    UnknownError,
}

impl From<CfiPanicInfo> for BootError {
    /// Converts to this type from the input type.
    fn from(info: CfiPanicInfo) -> BootError {
        match info {
            CfiPanicInfo::CounterCorrupt => BootError::CFI_PANIC_COUNTER_CORRUPT,
            CfiPanicInfo::CounterOverflow => BootError::CFI_PANIC_COUNTER_OVERFLOW,
            CfiPanicInfo::CounterUnderflow => BootError::CFI_PANIC_COUNTER_UNDERFLOW,
            CfiPanicInfo::CounterMismatch => BootError::CFI_PANIC_COUNTER_MISMATCH,
            CfiPanicInfo::AssertEqFail => BootError::CFI_PANIC_ASSERT_EQ_FAILURE,
            CfiPanicInfo::AssertNeFail => BootError::CFI_PANIC_ASSERT_NE_FAILURE,
            CfiPanicInfo::AssertGtFail => BootError::CFI_PANIC_ASSERT_GT_FAILURE,
            CfiPanicInfo::AssertLtFail => BootError::CFI_PANIC_ASSERT_LT_FAILURE,
            CfiPanicInfo::AssertGeFail => BootError::CFI_PANIC_ASSERT_GE_FAILURE,
            CfiPanicInfo::AssertLeFail => BootError::CFI_PANIC_ASSERT_LE_FAILURE,
            CfiPanicInfo::FihCorrupt => BootError::CFI_PANIC_FIH_VERDICT_CORRUPT,
            _ => BootError::CFI_PANIC_UNKNOWN,
        }
    }
}

/// Launder the value to prevent compiler optimization
///
/// # Arguments
///
/// * `val` - Value to launder
///
/// # Returns
///
/// `T` - Same value
pub fn cfi_launder<T>(val: T) -> T {
    if cfg!(feature = "cfi") {
        core::hint::black_box(val)
    } else {
        val
    }
}

/// Control flow integrity panic
///
/// Raised when a redundant check disagrees with the first evaluation. On
/// target the platform provides `cfi_panic_handler`, which must put the
/// device in a safe halted state. Hosted builds panic instead.
///
/// # Arguments
///
/// * `info` - Panic information
#[inline(never)]
pub fn cfi_panic(info: CfiPanicInfo) -> ! {
    // Prevent the compiler from optimizing the reason
    let _ = cfi_launder(info);

    #[cfg(feature = "std")]
    {
        panic!("CFI Panic = {:04x?}", info);
    }

    #[cfg(not(feature = "std"))]
    {
        extern "C" {
            fn cfi_panic_handler(code: u32) -> !;
        }
        unsafe {
            cfi_panic_handler(BootError::from(info).into());
        }
    }
}

macro_rules! cfi_assert_macro {
    ($name: ident, $op: tt, $trait1: path, $trait2: path, $panic_info: ident) => {
        /// CFI Binary Condition Assertion
        ///
        /// # Arguments
        ///
        /// `lhs` - Left hand side
        /// `rhs` - Right hand side
        #[inline(always)]
        #[allow(unused)]
        pub fn $name<T>(lhs: T, rhs: T)
        where
            T: $trait1 + $trait2 + Copy,
        {
            if cfg!(feature = "cfi") {
                CfiCounter::delay();
                if !(lhs $op rhs) {
                    cfi_panic(CfiPanicInfo::$panic_info);
                }

                // Second check for glitch protection
                CfiCounter::delay();
                if !(cfi_launder(lhs) $op cfi_launder(rhs)) {
                    cfi_panic(CfiPanicInfo::$panic_info);
                }
            }
        }
    };
}

cfi_assert_macro!(cfi_assert_eq, ==, PartialEq, PartialEq, AssertEqFail);
cfi_assert_macro!(cfi_assert_ne, !=, PartialEq, PartialEq, AssertNeFail);
cfi_assert_macro!(cfi_assert_gt, >, Ord, PartialOrd, AssertGtFail);
cfi_assert_macro!(cfi_assert_lt, <, Ord, PartialOrd, AssertLtFail);
cfi_assert_macro!(cfi_assert_ge, >=, Ord, PartialOrd, AssertGeFail);
cfi_assert_macro!(cfi_assert_le, <=, Ord, PartialOrd, AssertLeFail);

#[inline(always)]
pub fn cfi_assert_bool(cond: bool) {
    cfi_assert_eq(cond, true)
}

#[macro_export]
macro_rules! cfi_assert {
    ($cond: expr) => {
        $crate::cfi_assert_bool($cond)
    };
}

/// Re-check the outcome of a `Result` through a laundered path
#[macro_export]
macro_rules! cfi_check {
    ($result:expr) => {
        if $crate::cfi_launder($result.is_ok()) {
            $crate::cfi_assert!($result.is_ok());
        } else {
            $crate::cfi_assert!($result.is_err());
        }
    };
}
