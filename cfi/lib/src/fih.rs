/*++

Licensed under the Apache-2.0 license.

File Name:

    fih.rs

Abstract:

    File contains the fault injection hardened verdict and integer types.
    Both are stored twice, once plain and once xor-ed with a mask, and every
    decision on them is evaluated twice through laundered values.

--*/

use crate::{cfi_launder, cfi_panic, CfiCounter, CfiPanicInfo};
use crate::{HardenedBool, HARDENED_BOOL_TRUE};
use core::ops::BitAnd;

/// Encoding of a successful verdict
pub const FIH_SUCCESS: u32 = 0x5555_AAAA;

/// Encoding of a failed verdict
pub const FIH_FAILURE: u32 = 0xAAAA_5555;

/// Mask for the shadow copy
pub const FIH_MASK: u32 = 0xA5C3_5A3C;

/// Decoded verdict, handed across trust boundaries instead of a `bool`
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Verdict {
    Success,
    Failure,
}

/// Redundantly encoded trust verdict
#[derive(Debug, Clone, Copy)]
pub struct FihVerdict {
    val: u32,
    masked: u32,
}

impl FihVerdict {
    pub const fn success() -> Self {
        Self {
            val: FIH_SUCCESS,
            masked: FIH_SUCCESS ^ FIH_MASK,
        }
    }

    pub const fn failure() -> Self {
        Self {
            val: FIH_FAILURE,
            masked: FIH_FAILURE ^ FIH_MASK,
        }
    }

    /// Verdict from a hardened boolean; anything but the exact true pattern
    /// is a failure
    pub fn from_hardened(b: HardenedBool) -> Self {
        if cfi_launder(b) == HARDENED_BOOL_TRUE {
            Self::success()
        } else {
            Self::failure()
        }
    }

    /// Decode the verdict.
    ///
    /// Only the exact success encoding in both copies decodes to
    /// `Verdict::Success`. The decision is taken twice; if the two
    /// evaluations disagree a fault was injected and the CFI panic handler
    /// is entered.
    #[inline(never)]
    pub fn verdict(&self) -> Verdict {
        let first = (self.val == FIH_SUCCESS) & ((self.masked ^ FIH_MASK) == FIH_SUCCESS);

        CfiCounter::delay();
        let second = ((cfi_launder(self.masked) ^ FIH_MASK) == FIH_SUCCESS)
            & (cfi_launder(self.val) == FIH_SUCCESS);

        if cfi_launder(first) != second {
            cfi_panic(CfiPanicInfo::FihCorrupt);
        }

        if first {
            Verdict::Success
        } else {
            Verdict::Failure
        }
    }

    /// Fuse two verdicts without short circuiting. Mixed inputs produce an
    /// encoding that is neither success nor failure, which decodes as
    /// failure.
    pub fn and(self, other: Self) -> Self {
        Self {
            val: cfi_launder(self.val) & other.val,
            masked: cfi_launder(self.masked) & other.masked,
        }
    }

    /// Raw encodings, for tests and diagnostics
    pub fn raw(&self) -> (u32, u32) {
        (self.val, self.masked)
    }
}

impl BitAnd for FihVerdict {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        self.and(rhs)
    }
}

impl From<Verdict> for FihVerdict {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Success => Self::success(),
            Verdict::Failure => Self::failure(),
        }
    }
}

/// Hardened unsigned integer
#[derive(Debug, Clone, Copy)]
pub struct FihUint {
    val: u32,
    masked: u32,
}

impl FihUint {
    pub const fn new(val: u32) -> Self {
        Self {
            val,
            masked: val ^ FIH_MASK,
        }
    }

    fn validate(&self) {
        if cfi_launder(self.val) ^ FIH_MASK != self.masked {
            cfi_panic(CfiPanicInfo::FihCorrupt);
        }
    }

    /// Plain value, after checking the shadow copy
    pub fn value(&self) -> u32 {
        self.validate();
        self.val
    }

    /// Hardened `self >= rhs`
    #[inline(never)]
    pub fn ge(&self, rhs: &FihUint) -> FihVerdict {
        self.validate();
        rhs.validate();

        let first = self.val >= rhs.val;

        CfiCounter::delay();
        let second = (cfi_launder(self.masked) ^ FIH_MASK) >= (cfi_launder(rhs.masked) ^ FIH_MASK);

        if cfi_launder(first) != second {
            cfi_panic(CfiPanicInfo::AssertGeFail);
        }

        if first {
            FihVerdict::success()
        } else {
            FihVerdict::failure()
        }
    }

    /// Hardened `self == rhs`
    #[inline(never)]
    pub fn eq(&self, rhs: &FihUint) -> FihVerdict {
        self.validate();
        rhs.validate();

        let first = self.val == rhs.val;

        CfiCounter::delay();
        let second = (cfi_launder(self.masked) ^ FIH_MASK) == (cfi_launder(rhs.masked) ^ FIH_MASK);

        if cfi_launder(first) != second {
            cfi_panic(CfiPanicInfo::AssertEqFail);
        }

        if first {
            FihVerdict::success()
        } else {
            FihVerdict::failure()
        }
    }
}

/// Accumulator for a multi check decision.
///
/// Each check is recorded twice: as a bit in a mask and as a verdict fused
/// into a chain. `finish` requires the mask to equal the expected set and the
/// chain to still be a success, so skipping a check or flipping one outcome
/// cannot produce a success.
#[derive(Debug, Clone, Copy)]
pub struct FihChecks {
    bits: u32,
    chain: FihVerdict,
}

impl Default for FihChecks {
    fn default() -> Self {
        Self::new()
    }
}

impl FihChecks {
    pub const fn new() -> Self {
        Self {
            bits: 0,
            chain: FihVerdict::success(),
        }
    }

    /// Record the outcome of the check identified by `bit`
    pub fn record(&mut self, bit: u32, verdict: FihVerdict) {
        if verdict.verdict() == Verdict::Success {
            self.bits = cfi_launder(self.bits) | bit;
        }
        self.chain = self.chain.and(verdict);
    }

    /// Mask of checks that passed so far
    pub fn passed(&self) -> u32 {
        self.bits
    }

    /// Final verdict for the `expected` set of checks
    pub fn finish(&self, expected: u32) -> FihVerdict {
        let by_mask = if cfi_launder(self.bits) == expected {
            FihVerdict::success()
        } else {
            FihVerdict::failure()
        };
        by_mask.and(self.chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encodings_are_far_apart() {
        assert_eq!((FIH_SUCCESS ^ FIH_FAILURE).count_ones(), 32);
        assert_eq!(FihVerdict::success().verdict(), Verdict::Success);
        assert_eq!(FihVerdict::failure().verdict(), Verdict::Failure);
    }

    #[test]
    fn test_and() {
        let s = FihVerdict::success();
        let f = FihVerdict::failure();
        assert_eq!((s & s).verdict(), Verdict::Success);
        assert_eq!((s & f).verdict(), Verdict::Failure);
        assert_eq!((f & s).verdict(), Verdict::Failure);
        assert_eq!((f & f).verdict(), Verdict::Failure);
    }

    #[test]
    fn test_broken_encodings_never_succeed() {
        let (val, masked) = FihVerdict::success().raw();
        let torn = FihVerdict { val, masked: 0 };
        assert_eq!(torn.verdict(), Verdict::Failure);
        let flipped = FihVerdict {
            val: val ^ 1,
            masked,
        };
        assert_eq!(flipped.verdict(), Verdict::Failure);
        let zero = FihVerdict { val: 0, masked: 0 };
        assert_eq!(zero.verdict(), Verdict::Failure);
    }

    #[test]
    fn test_hardened_bool() {
        assert_eq!(
            FihVerdict::from_hardened(HARDENED_BOOL_TRUE).verdict(),
            Verdict::Success
        );
        assert_eq!(FihVerdict::from_hardened(1).verdict(), Verdict::Failure);
    }

    #[test]
    fn test_uint_compare() {
        let five = FihUint::new(5);
        let six = FihUint::new(6);
        assert_eq!(six.ge(&five).verdict(), Verdict::Success);
        assert_eq!(five.ge(&five).verdict(), Verdict::Success);
        assert_eq!(five.ge(&six).verdict(), Verdict::Failure);
        assert_eq!(five.eq(&five).verdict(), Verdict::Success);
        assert_eq!(five.eq(&six).verdict(), Verdict::Failure);
        assert_eq!(six.value(), 6);
    }

    #[test]
    #[should_panic(expected = "CFI Panic = FihCorrupt")]
    fn test_uint_corrupt_shadow() {
        let bad = FihUint { val: 1, masked: 1 };
        let _ = bad.ge(&FihUint::new(0));
    }

    #[test]
    fn test_checks() {
        const A: u32 = 0x1;
        const B: u32 = 0x4;

        let mut checks = FihChecks::new();
        checks.record(A, FihVerdict::success());
        checks.record(B, FihVerdict::success());
        assert_eq!(checks.finish(A | B).verdict(), Verdict::Success);

        let mut skipped = FihChecks::new();
        skipped.record(A, FihVerdict::success());
        assert_eq!(skipped.finish(A | B).verdict(), Verdict::Failure);

        let mut failed = FihChecks::new();
        failed.record(A, FihVerdict::success());
        failed.record(B, FihVerdict::failure());
        assert_eq!(failed.passed(), A);
        assert_eq!(failed.finish(A | B).verdict(), Verdict::Failure);

        assert_eq!(FihChecks::new().finish(A).verdict(), Verdict::Failure);
    }
}
