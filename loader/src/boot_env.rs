/*++

Licensed under the Apache-2.0 license.

File Name:

    boot_env.rs

Abstract:

    File implements a context holding all the services used by the boot
    flow. Platforms plug their flash, crypto and counter storage in here;
    tests plug in the simulated ones.

--*/

use swapboot_drivers::{BootCrypto, Flash, SecurityCounterStore};

/// Boot Context
pub struct BootEnv<F: Flash, C: BootCrypto, S: SecurityCounterStore> {
    /// Flash holding the slots and the scratch area
    pub flash: F,

    /// SHA-256 and ECDSA P-256 engine
    pub crypto: C,

    // Security counters
    pub counters: S,

    /// Entropy for the CFI glitch delays, drawn fresh on every boot
    pub cfi_seed: [u32; 4],
}

impl<F: Flash, C: BootCrypto, S: SecurityCounterStore> BootEnv<F, C, S> {
    pub fn new(flash: F, crypto: C, counters: S, cfi_seed: [u32; 4]) -> Self {
        Self {
            flash,
            crypto,
            counters,
            cfi_seed,
        }
    }
}
