/*++

Licensed under the Apache-2.0 license.

File Name:

    flash.rs

Abstract:

    File contains the NOR flash simulator. Bytes erase to the erased value
    one sector at a time, and may only be programmed while erased at the
    write alignment. A power loss can be scheduled after a number of
    mutating operations; every operation from then on fails until the
    flash is power cycled.

--*/

use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use swapboot_drivers::{Flash, FlashArea};
use swapboot_error::{BootError, BootResult};

/// Mutating flash operation, as recorded in the operation log
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FlashOp {
    Write { area: u8, off: u32, len: u32 },
    Erase { area: u8, off: u32, len: u32 },
}

/// Contents of every simulated device
#[derive(Clone)]
pub struct SimFlashSnapshot {
    devices: BTreeMap<u8, Vec<u8>>,
}

#[derive(Clone)]
pub struct SimFlash {
    flash: Rc<RefCell<SimFlashImpl>>,
}

struct SimDevice {
    data: Vec<u8>,
    align: u32,
    erased_val: u8,
}

struct SimFlashImpl {
    devices: BTreeMap<u8, SimDevice>,
    areas: BTreeMap<u8, FlashArea>,

    /// Mutating operations allowed before power is lost
    ops_left: Option<u32>,
    powered: bool,
    log: Vec<FlashOp>,
}

impl SimFlash {
    pub fn new() -> Self {
        Self {
            flash: Rc::new(RefCell::new(SimFlashImpl {
                devices: BTreeMap::new(),
                areas: BTreeMap::new(),
                ops_left: None,
                powered: true,
                log: Vec::new(),
            })),
        }
    }

    /// Add a device of `size` bytes, initially erased
    ///
    /// # Arguments
    ///
    /// * `device_id` - Device identifier referenced by the areas
    /// * `size` - Device size in bytes
    /// * `align` - Write alignment, a power of two
    /// * `erased_val` - Value of an erased byte
    pub fn add_device(&self, device_id: u8, size: usize, align: u32, erased_val: u8) {
        assert!(align.is_power_of_two());
        self.flash.borrow_mut().devices.insert(
            device_id,
            SimDevice {
                data: vec![erased_val; size],
                align,
                erased_val,
            },
        );
    }

    /// Add an area; it must fit its device
    pub fn add_area(&self, area: FlashArea) {
        let mut flash = self.flash.borrow_mut();
        let dev_len = flash
            .devices
            .get(&area.device_id)
            .map(|dev| dev.data.len())
            .unwrap_or(0);
        assert!(area.off as usize + area.size as usize <= dev_len);
        flash.areas.insert(area.id, area);
    }

    /// Program bytes directly, bypassing the NOR rules and the operation
    /// count. Used to stage images before a boot.
    pub fn load(&self, area_id: u8, off: u32, data: &[u8]) {
        let mut flash = self.flash.borrow_mut();
        let fa = flash.areas[&area_id];
        assert!(off as usize + data.len() <= fa.size as usize);
        let start = (fa.off + off) as usize;
        if let Some(dev) = flash.devices.get_mut(&fa.device_id) {
            dev.data[start..start + data.len()].copy_from_slice(data);
        }
    }

    /// Copy of the whole contents of an area
    pub fn area_bytes(&self, area_id: u8) -> Vec<u8> {
        let flash = self.flash.borrow();
        let fa = flash.areas[&area_id];
        let start = fa.off as usize;
        flash.devices[&fa.device_id].data[start..start + fa.size as usize].to_vec()
    }

    /// Lose power once `ops` more mutating operations have completed
    pub fn fail_after(&self, ops: u32) {
        self.flash.borrow_mut().ops_left = Some(ops);
    }

    /// Restore power and cancel any scheduled power loss
    pub fn power_cycle(&self) {
        let mut flash = self.flash.borrow_mut();
        flash.powered = true;
        flash.ops_left = None;
    }

    pub fn powered(&self) -> bool {
        self.flash.borrow().powered
    }

    /// Number of mutating operations that completed
    pub fn op_count(&self) -> usize {
        self.flash.borrow().log.len()
    }

    pub fn op_log(&self) -> Vec<FlashOp> {
        self.flash.borrow().log.clone()
    }

    pub fn clear_log(&self) {
        self.flash.borrow_mut().log.clear();
    }

    pub fn snapshot(&self) -> SimFlashSnapshot {
        let flash = self.flash.borrow();
        SimFlashSnapshot {
            devices: flash
                .devices
                .iter()
                .map(|(id, dev)| (*id, dev.data.clone()))
                .collect(),
        }
    }

    pub fn restore(&self, snapshot: &SimFlashSnapshot) {
        let mut flash = self.flash.borrow_mut();
        for (id, data) in snapshot.devices.iter() {
            if let Some(dev) = flash.devices.get_mut(id) {
                dev.data.clone_from(data);
            }
        }
    }
}

impl Default for SimFlash {
    fn default() -> Self {
        SimFlash::new()
    }
}

impl SimFlashImpl {
    fn device(&self, fa: &FlashArea) -> BootResult<&SimDevice> {
        self.devices
            .get(&fa.device_id)
            .ok_or(BootError::DRIVER_FLASH_AREA_NOT_FOUND)
    }

    fn device_mut(&mut self, fa: &FlashArea) -> BootResult<&mut SimDevice> {
        self.devices
            .get_mut(&fa.device_id)
            .ok_or(BootError::DRIVER_FLASH_AREA_NOT_FOUND)
    }

    /// Account for one mutating operation
    fn consume_op(&mut self) -> BootResult<()> {
        if !self.powered {
            Err(BootError::DRIVER_FLASH_POWER_LOSS)?;
        }
        match self.ops_left {
            Some(0) => {
                self.powered = false;
                Err(BootError::DRIVER_FLASH_POWER_LOSS)
            }
            Some(n) => {
                self.ops_left = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Flash for SimFlash {
    fn open(&self, id: u8) -> BootResult<FlashArea> {
        self.flash
            .borrow()
            .areas
            .get(&id)
            .copied()
            .ok_or(BootError::DRIVER_FLASH_AREA_NOT_FOUND)
    }

    fn read(&self, fa: &FlashArea, off: u32, buf: &mut [u8]) -> BootResult<()> {
        let flash = self.flash.borrow();
        if !flash.powered {
            Err(BootError::DRIVER_FLASH_POWER_LOSS)?;
        }
        fa.check_range(off, buf.len())?;

        let start = (fa.off + off) as usize;
        let dev = flash.device(fa)?;
        let src = dev
            .data
            .get(start..start + buf.len())
            .ok_or(BootError::DRIVER_FLASH_READ_FAILURE)?;
        buf.copy_from_slice(src);
        Ok(())
    }

    fn write(&mut self, fa: &FlashArea, off: u32, data: &[u8]) -> BootResult<()> {
        let mut flash = self.flash.borrow_mut();
        fa.check_range(off, data.len())?;

        let align = flash.device(fa)?.align;
        if off % align != 0 || data.len() as u32 % align != 0 {
            Err(BootError::DRIVER_FLASH_UNALIGNED)?;
        }

        flash.consume_op()?;

        let start = (fa.off + off) as usize;
        let dev = flash.device_mut(fa)?;
        let erased = dev.erased_val;
        let dst = dev
            .data
            .get_mut(start..start + data.len())
            .ok_or(BootError::DRIVER_FLASH_WRITE_FAILURE)?;
        if dst.iter().any(|b| *b != erased) {
            Err(BootError::DRIVER_FLASH_NOT_ERASED)?;
        }
        dst.copy_from_slice(data);

        flash.log.push(FlashOp::Write {
            area: fa.id,
            off,
            len: data.len() as u32,
        });
        Ok(())
    }

    fn erase(&mut self, fa: &FlashArea, off: u32, len: u32) -> BootResult<()> {
        let mut flash = self.flash.borrow_mut();
        fa.check_range(off, len as usize)?;
        if fa.sector_size == 0 || off % fa.sector_size != 0 || len % fa.sector_size != 0 {
            Err(BootError::DRIVER_FLASH_UNALIGNED)?;
        }

        flash.consume_op()?;

        let start = (fa.off + off) as usize;
        let dev = flash.device_mut(fa)?;
        let erased = dev.erased_val;
        dev.data
            .get_mut(start..start + len as usize)
            .ok_or(BootError::DRIVER_FLASH_ERASE_FAILURE)?
            .fill(erased);

        flash.log.push(FlashOp::Erase {
            area: fa.id,
            off,
            len,
        });
        Ok(())
    }

    fn align(&self, fa: &FlashArea) -> u32 {
        self.flash
            .borrow()
            .device(fa)
            .map(|dev| dev.align)
            .unwrap_or(1)
    }

    fn erased_val(&self, fa: &FlashArea) -> u8 {
        self.flash
            .borrow()
            .device(fa)
            .map(|dev| dev.erased_val)
            .unwrap_or(0xff)
    }
}
