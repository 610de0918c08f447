/*++

Licensed under the Apache-2.0 license.

File Name:

    plan.rs

Abstract:

    File contains the sector move plans of the swap strategies. A plan is an
    indexable list of sector copies; step `k` always means the same copy
    for a given swap size, which is what lets a swap resume from the status
    table.

--*/

use crate::config::UpgradeMode;

/// Slot role within one image
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Slot {
    Primary,
    Secondary,
    Scratch,
}

/// Sector of a slot
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SlotSector {
    pub slot: Slot,
    pub sector: u32,
}

impl SlotSector {
    const fn new(slot: Slot, sector: u32) -> Self {
        Self { slot, sector }
    }
}

/// One step: erase `dst`, then copy `src` into it
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwapStep {
    pub src: SlotSector,
    pub dst: SlotSector,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Strategy {
    Scratch,
    Move,
}

/// Step list exchanging the first `sectors` payload sectors of the two
/// slots
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SwapPlan {
    strategy: Strategy,
    sectors: u32,
}

impl SwapPlan {
    /// Plan for `mode`; overwrite-only mode never swaps
    pub fn new(mode: UpgradeMode, sectors: u32) -> Option<Self> {
        let strategy = match mode {
            UpgradeMode::Scratch => Strategy::Scratch,
            UpgradeMode::Move => Strategy::Move,
            UpgradeMode::OverwriteOnly => return None,
        };
        Some(Self { strategy, sectors })
    }

    /// Both strategies take three copies per sector
    pub fn len(&self) -> u32 {
        3 * self.sectors
    }

    pub fn is_empty(&self) -> bool {
        self.sectors == 0
    }

    pub fn sectors(&self) -> u32 {
        self.sectors
    }

    /// Step `k`, `None` past the end
    pub fn step(&self, k: u32) -> Option<SwapStep> {
        if k >= self.len() {
            return None;
        }
        Some(match self.strategy {
            Strategy::Scratch => self.scratch_step(k),
            Strategy::Move => self.move_step(k),
        })
    }

    pub fn steps(&self) -> impl Iterator<Item = SwapStep> + '_ {
        (0..self.len()).filter_map(move |k| self.step(k))
    }

    // Sector by sector through the scratch area
    fn scratch_step(&self, k: u32) -> SwapStep {
        let i = k / 3;
        let (src, dst) = match k % 3 {
            0 => (Slot::Secondary, Slot::Scratch),
            1 => (Slot::Primary, Slot::Secondary),
            _ => (Slot::Scratch, Slot::Primary),
        };
        let src_sector = if src == Slot::Scratch { 0 } else { i };
        let dst_sector = if dst == Slot::Scratch { 0 } else { i };
        SwapStep {
            src: SlotSector::new(src, src_sector),
            dst: SlotSector::new(dst, dst_sector),
        }
    }

    // Phase 1 shifts the primary up by one sector, highest first. Phase 2
    // walks up from sector 0 pulling in the secondary and pushing out the
    // shifted primary.
    fn move_step(&self, k: u32) -> SwapStep {
        let n = self.sectors;
        if k < n {
            let i = n - 1 - k;
            return SwapStep {
                src: SlotSector::new(Slot::Primary, i),
                dst: SlotSector::new(Slot::Primary, i + 1),
            };
        }

        let j = k - n;
        let i = j / 2;
        if j % 2 == 0 {
            SwapStep {
                src: SlotSector::new(Slot::Secondary, i),
                dst: SlotSector::new(Slot::Primary, i),
            }
        } else {
            SwapStep {
                src: SlotSector::new(Slot::Primary, i + 1),
                dst: SlotSector::new(Slot::Secondary, i),
            }
        }
    }
}
