/*++

Licensed under the Apache-2.0 license.

File Name:

    xoshiro.rs

Abstract:

    File contains the xoshiro128** generator that drives the random CFI
    delays.

References:
    http://prng.di.unimi.it/xoshiro128starstar.c

--*/

use core::cell::Cell;

/// xoshiro128** state. Not a source of secrets; it only jitters the timing of
/// redundant checks.
pub struct Xoshiro128 {
    s: [Cell<u32>; 4],
}

impl Xoshiro128 {
    /// Generator with a fixed non-zero state, used until the platform mixes
    /// in entropy.
    pub const fn new_unseeded() -> Self {
        Self {
            s: [
                Cell::new(0x9E37_79B9),
                Cell::new(0x243F_6A88),
                Cell::new(0xB7E1_5162),
                Cell::new(0x7F4A_7C15),
            ],
        }
    }

    /// Mix entropy into the state. An all-zero result is replaced by the
    /// unseeded state since xoshiro would only ever output zero.
    pub fn mix_entropy(&self, seed: [u32; 4]) {
        for (s, e) in self.s.iter().zip(seed) {
            s.set(s.get() ^ e);
        }
        if self.s.iter().all(|s| s.get() == 0) {
            let fresh = Self::new_unseeded();
            for (s, f) in self.s.iter().zip(fresh.s.iter()) {
                s.set(f.get());
            }
        }
    }

    /// Get the next random number
    pub fn next(&self) -> u32 {
        let [mut s0, mut s1, mut s2, mut s3] = [
            self.s[0].get(),
            self.s[1].get(),
            self.s[2].get(),
            self.s[3].get(),
        ];

        let result = u32::wrapping_mul(u32::wrapping_mul(s1, 5).rotate_left(7), 9);
        let t = s1 << 9;

        s2 ^= s0;
        s3 ^= s1;
        s1 ^= s2;
        s0 ^= s3;

        s2 ^= t;
        s3 = s3.rotate_left(11);

        self.s[0].set(s0);
        self.s[1].set(s1);
        self.s[2].set(s2);
        self.s[3].set(s3);

        result
    }
}
