/*++

Licensed under the Apache-2.0 license.

File Name:

    secmem.rs

Abstract:

    File contains hardened memory comparison used for digests and key
    hashes.

--*/

use crate::{cfi_assert_eq, cfi_assert_ne, cfi_launder};

// Adapted from https://github.com/lowRISC/opentitan/blob/7a61300cf7c409fa68fd892942c1d7b58a7cd4c0/sw/device/lib/base/hardened_memory.c
// Copyright lowRISC contributors.

/// Values for a hardened boolean type.
///
/// The values have a Hamming distance of 8 and are not complements of each
/// other, so a single flipped bit or a zeroed register never reads as true.
pub type HardenedBool = u32;
pub const HARDENED_BOOL_TRUE: HardenedBool = 0x739;
pub const HARDENED_BOOL_FALSE: HardenedBool = 0x1d4;

#[inline(always)]
pub fn memeq(lhs: &[u8], rhs: &[u8]) -> bool {
    hardened_memeq(lhs, rhs) == HARDENED_BOOL_TRUE
}

/// Constant time comparison of two byte slices.
///
/// Every byte is visited regardless of where the first difference is. Two
/// accumulators are kept: `zeros` collects differing bits and `ones` keeps
/// the bits that agreed everywhere; they must tell the same story.
#[inline(never)]
pub fn hardened_memeq(lhs: &[u8], rhs: &[u8]) -> HardenedBool {
    if lhs.len() != rhs.len() {
        return HARDENED_BOOL_FALSE;
    }

    let mut zeros: u8 = 0;
    let mut ones: u8 = u8::MAX;
    let mut count = 0usize;

    for (a, b) in lhs.iter().zip(rhs.iter()) {
        zeros = cfi_launder(zeros) | (cfi_launder(*a) ^ *b);
        ones = cfi_launder(ones) & (cfi_launder(*a) ^ !*b);
        count = cfi_launder(count) + 1;
    }

    // Loop completion check
    cfi_assert_eq(count, lhs.len());

    if cfi_launder(zeros) == 0 {
        cfi_assert_eq(ones, u8::MAX);
        if ones == u8::MAX {
            return HARDENED_BOOL_TRUE;
        }
    }

    cfi_assert_ne(ones, u8::MAX);
    HARDENED_BOOL_FALSE
}
