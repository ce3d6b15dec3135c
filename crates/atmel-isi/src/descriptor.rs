// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! DMA frame-buffer descriptors
//!
//! The ISI DMA engine reads [`Fbd`] records from a fixed table in coherent
//! memory. [`DescriptorTable`] is that table, shared between the capture
//! core and whatever stands in for the DMA engine. [`DescriptorPool`] hands
//! out table slots as owned [`DescriptorHandle`]s; a handle cannot be cloned
//! so a slot is bound to at most one buffer at a time.

use crate::{regs::dma, Error};
use std::{
    mem::size_of,
    sync::{Arc, Mutex, PoisonError},
};

/// Descriptor capacity of the table.
pub const MAX_BUFFER_NUM: usize = 32;

/// Frame-buffer descriptor as laid out for the DMA engine.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Fbd {
    /// Physical address of the frame buffer
    pub fb_address: u32,
    /// DMA control word
    pub dma_ctrl: u32,
    /// Physical address of the next descriptor, 0 for single shot
    pub next_fbd_address: u32,
}

/// Size of one descriptor in the table.
pub const FBD_SIZE: u32 = size_of::<Fbd>() as u32;

/// Hardware-visible descriptor array.
#[derive(Debug)]
pub struct DescriptorTable {
    base: u32,
    slots: Mutex<[Fbd; MAX_BUFFER_NUM]>,
}

impl DescriptorTable {
    /// Creates a zeroed table at physical address `base`.
    pub fn new(base: u32) -> Arc<DescriptorTable> {
        Arc::new(DescriptorTable {
            base,
            slots: Mutex::new([Fbd::default(); MAX_BUFFER_NUM]),
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    /// Physical address of slot `index`.
    pub fn phys(&self, index: usize) -> u32 {
        self.base + index as u32 * FBD_SIZE
    }

    /// Slot index of a descriptor physical address.
    pub fn index_of(&self, phys: u32) -> Option<usize> {
        let offset = phys.checked_sub(self.base)?;
        if offset % FBD_SIZE != 0 {
            return None;
        }
        let index = (offset / FBD_SIZE) as usize;
        (index < MAX_BUFFER_NUM).then_some(index)
    }

    pub fn read(&self, index: usize) -> Fbd {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)[index]
    }

    pub fn write(&self, index: usize, fbd: Fbd) {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)[index] = fbd;
    }

    /// Reads the descriptor at physical address `phys`.
    pub fn fetch(&self, phys: u32) -> Option<Fbd> {
        self.index_of(phys).map(|index| self.read(index))
    }

    /// Updates the descriptor at `phys` in place, as the DMA engine does on
    /// write-back.
    pub fn update<F: FnOnce(&mut Fbd)>(&self, phys: u32, f: F) -> bool {
        match self.index_of(phys) {
            Some(index) => {
                f(&mut self.slots.lock().unwrap_or_else(PoisonError::into_inner)[index]);
                true
            }
            None => false,
        }
    }
}

/// Exclusive ownership of one descriptor slot.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
    index: usize,
    phys: u32,
}

impl DescriptorHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Physical address programmed into the channel DSCR register.
    pub fn phys(&self) -> u32 {
        self.phys
    }
}

/// Free list over the slots of a [`DescriptorTable`].
#[derive(Debug)]
pub struct DescriptorPool {
    table: Arc<DescriptorTable>,
    free: Vec<usize>,
    in_use: [bool; MAX_BUFFER_NUM],
}

impl DescriptorPool {
    pub fn new(table: Arc<DescriptorTable>) -> DescriptorPool {
        DescriptorPool {
            table,
            free: (0..MAX_BUFFER_NUM).collect(),
            in_use: [false; MAX_BUFFER_NUM],
        }
    }

    /// Takes a descriptor off the free list.
    pub fn acquire(&mut self) -> Result<DescriptorHandle, Error> {
        let index = self.free.pop().ok_or_else(|| {
            log::error!("Not enough dma descriptors.");
            Error::NoDescriptors
        })?;
        self.in_use[index] = true;
        Ok(DescriptorHandle {
            index,
            phys: self.table.phys(index),
        })
    }

    /// Returns a descriptor to the free list.
    pub fn release(&mut self, handle: DescriptorHandle) {
        if !self.in_use[handle.index] {
            log::warn!("descriptor {} released twice", handle.index);
            return;
        }
        self.in_use[handle.index] = false;
        self.free.push(handle.index);
    }

    /// Points a descriptor at a frame buffer for a single-shot transfer.
    pub fn bind(&self, handle: &DescriptorHandle, fb_address: u32) {
        self.table.write(
            handle.index,
            Fbd {
                fb_address,
                dma_ctrl: dma::CTRL_WB,
                next_fbd_address: 0,
            },
        );
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn in_use_count(&self) -> usize {
        MAX_BUFFER_NUM - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fbd_layout() {
        assert_eq!(FBD_SIZE, 12);
        let table = DescriptorTable::new(0x1000);
        assert_eq!(table.phys(0), 0x1000);
        assert_eq!(table.phys(3), 0x1000 + 36);
        assert_eq!(table.index_of(0x1000 + 36), Some(3));
        assert_eq!(table.index_of(0x1000 + 37), None);
        assert_eq!(table.index_of(0x0fff), None);
        assert_eq!(table.index_of(table.phys(31) + FBD_SIZE), None);
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = DescriptorPool::new(DescriptorTable::new(0));
        let handles: Vec<_> = (0..MAX_BUFFER_NUM)
            .map(|_| pool.acquire().unwrap())
            .collect();
        assert_eq!(pool.free_count(), 0);
        assert!(matches!(pool.acquire(), Err(Error::NoDescriptors)));

        for handle in handles {
            pool.release(handle);
        }
        assert_eq!(pool.free_count(), MAX_BUFFER_NUM);
        assert_eq!(pool.in_use_count(), 0);
    }

    #[test]
    fn test_handles_are_distinct() {
        let mut pool = DescriptorPool::new(DescriptorTable::new(0x2000));
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a.index(), b.index());
        assert_ne!(a.phys(), b.phys());
        pool.release(a);
        let c = pool.acquire().unwrap();
        assert_ne!(c.index(), b.index());
    }

    #[test]
    fn test_bind_single_shot() {
        let table = DescriptorTable::new(0x3000);
        let mut pool = DescriptorPool::new(table.clone());
        let handle = pool.acquire().unwrap();
        pool.bind(&handle, 0x2000_0000);

        let fbd = table.fetch(handle.phys()).unwrap();
        assert_eq!(fbd.fb_address, 0x2000_0000);
        assert_eq!(fbd.dma_ctrl, dma::CTRL_WB);
        assert_eq!(fbd.next_fbd_address, 0);

        assert!(table.update(handle.phys(), |fbd| fbd.dma_ctrl |= dma::CTRL_DONE));
        assert_eq!(table.read(handle.index()).dma_ctrl, dma::CTRL_WB | dma::CTRL_DONE);
    }

    #[test]
    fn test_release_foreign_handle_ignored() {
        let mut pool = DescriptorPool::new(DescriptorTable::new(0));
        let mut other = DescriptorPool::new(DescriptorTable::new(0));
        let foreign = other.acquire().unwrap();
        pool.release(foreign);
        assert_eq!(pool.free_count(), MAX_BUFFER_NUM);
    }
}
