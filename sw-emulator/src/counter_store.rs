/*++

Licensed under the Apache-2.0 license.

File Name:

    counter_store.rs

Abstract:

    File contains the simulated security counter storage.

--*/

use std::{cell::RefCell, rc::Rc};

use swapboot_drivers::SecurityCounterStore;
use swapboot_error::{BootError, BootResult};
use swapboot_image_types::MAX_IMAGES;

#[derive(Clone, Default)]
pub struct SimCounterStore {
    store: Rc<RefCell<SimCounterStoreImpl>>,
}

#[derive(Default)]
struct SimCounterStoreImpl {
    counters: [u32; MAX_IMAGES],
    writes: usize,
    fail_writes: bool,

    /// Value handed back instead of the stored one, to model a store that
    /// does not retain writes
    read_override: Option<u32>,
}

impl SimCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value, bypassing the trait
    pub fn counter(&self, image_id: u8) -> u32 {
        self.store.borrow().counters[image_id as usize]
    }

    pub fn set_counter(&self, image_id: u8, value: u32) {
        self.store.borrow_mut().counters[image_id as usize] = value;
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.store.borrow().writes
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.store.borrow_mut().fail_writes = fail;
    }

    pub fn set_read_override(&self, value: Option<u32>) {
        self.store.borrow_mut().read_override = value;
    }
}

impl SecurityCounterStore for SimCounterStore {
    fn read_counter(&self, image_id: u8) -> BootResult<u32> {
        let store = self.store.borrow();
        let stored = store
            .counters
            .get(image_id as usize)
            .ok_or(BootError::DRIVER_ROLLBACK_STORE_READ_FAILURE)?;
        Ok(store.read_override.unwrap_or(*stored))
    }

    fn write_counter(&mut self, image_id: u8, value: u32) -> BootResult<()> {
        let mut store = self.store.borrow_mut();
        if store.fail_writes {
            Err(BootError::DRIVER_ROLLBACK_STORE_WRITE_FAILURE)?;
        }
        let slot = store
            .counters
            .get_mut(image_id as usize)
            .ok_or(BootError::DRIVER_ROLLBACK_STORE_WRITE_FAILURE)?;
        *slot = value;
        store.writes += 1;
        Ok(())
    }
}
