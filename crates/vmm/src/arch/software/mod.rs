//! Software emulation implementation for testing and development.
//!
//! This module provides a software-emulated machine that can run on any host. Page tables use
//! the real Sv39 format; only physical memory and the translation registers are simulated:
//!
//! - [`EmulatedMemory`] is a run of page-aligned frames starting at a chosen physical base
//!   address, with a bump allocator that hands frames out one at a time.
//! - [`EmulatedMmu`] records every `satp` write and every translation cache flush.

mod mmu;

pub use mmu::EmulatedMmu;

use alloc::boxed::Box;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::{
    PhysicalAddress,
    address::AddressTranslator,
    frame::{FrameAllocator, Zone},
};

use super::sv39::{ENTRIES_PER_TABLE, PAGE_SIZE, PageTable, PageTableEntry};

/// Byte pattern written into every frame the emulated allocator hands out.
///
/// Real allocators make no promise about frame contents, so neither does this one. The
/// pattern has the valid bit set in every entry it overlaps, which makes a missing
/// zero-fill visible.
pub const POISON_BYTE: u8 = 0xA5;

/// Default physical base, matching where DRAM starts on common RISC-V boards.
pub const DEFAULT_BASE: usize = 0x8000_0000;

#[repr(C, align(4096))]
struct EmulatedFrame([u8; PAGE_SIZE]);

/// Emulated physical memory.
///
/// This provides a simulated physical memory space for testing page table operations
/// without requiring actual hardware or virtual memory support from the host OS.
pub struct EmulatedMemory {
    /// The underlying frames.
    frames: Box<[UnsafeCell<EmulatedFrame>]>,
    /// Physical address of the first frame.
    base: PhysicalAddress,
    /// Index of the next frame to hand out (simple bump allocator).
    next_frame: AtomicUsize,
}

impl EmulatedMemory {
    /// Creates emulated memory of `frame_count` frames at [`DEFAULT_BASE`].
    pub fn new(frame_count: usize) -> Self {
        Self::with_base(PhysicalAddress::new(DEFAULT_BASE), frame_count)
    }

    /// Creates emulated memory of `frame_count` frames starting at `base`.
    ///
    /// # Panics
    ///
    /// Panics if `base` is not page-aligned.
    pub fn with_base(base: PhysicalAddress, frame_count: usize) -> Self {
        assert!(
            base.is_aligned(PAGE_SIZE),
            "emulated memory base must be page-aligned"
        );
        let frames = (0..frame_count)
            .map(|_| UnsafeCell::new(EmulatedFrame([0; PAGE_SIZE])))
            .collect();
        Self {
            frames,
            base,
            next_frame: AtomicUsize::new(0),
        }
    }

    /// Returns the physical address of the first frame.
    pub fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Returns the physical address just past the last frame.
    pub fn end(&self) -> PhysicalAddress {
        self.base + self.size()
    }

    /// Returns the size of the emulated memory region in bytes.
    pub fn size(&self) -> usize {
        self.frames.len() * PAGE_SIZE
    }

    /// Returns true if `phys` falls inside the emulated memory.
    pub fn contains(&self, phys: PhysicalAddress) -> bool {
        phys >= self.base && phys < self.end()
    }

    /// Returns how many frames have been handed out so far.
    pub fn allocated_frames(&self) -> usize {
        self.next_frame.load(Ordering::Relaxed)
    }

    /// Allocates one frame, fills it with [`POISON_BYTE`] and returns its physical address.
    ///
    /// Returns None once every frame has been handed out.
    pub fn allocate_frame(&self) -> Option<PhysicalAddress> {
        loop {
            let current = self.next_frame.load(Ordering::Relaxed);
            if current >= self.frames.len() {
                return None;
            }

            // Try to claim this frame
            if self
                .next_frame
                .compare_exchange(current, current + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                // SAFETY: The frame was just claimed, nothing else refers to it.
                unsafe { (*self.frames[current].get()).0.fill(POISON_BYTE) };
                return Some(self.base + current * PAGE_SIZE);
            }
        }
    }

    /// Reads entry `index` of the page table stored in the frame at `table`.
    ///
    /// # Panics
    ///
    /// Panics if `table` is outside the emulated memory or `index` >= 512.
    pub fn read_entry(&self, table: PhysicalAddress, index: usize) -> PageTableEntry {
        assert!(
            index < ENTRIES_PER_TABLE,
            "page table index out of bounds"
        );
        let ptr = self.phys_to_ptr::<PageTable>(table);
        // SAFETY: The pointer addresses a whole frame inside the emulated memory and the read
        // does not create a reference that could alias a live `&mut PageTable`.
        unsafe { ptr.cast::<PageTableEntry>().add(index).read() }
    }
}

// SAFETY: Every address inside the emulated memory resolves to a byte of a frame owned by
// `self`, and frames stay put for as long as `self` lives.
unsafe impl AddressTranslator for EmulatedMemory {
    fn phys_to_virt(&self, phys: PhysicalAddress) -> usize {
        assert!(
            self.contains(phys),
            "physical address outside emulated memory"
        );
        let offset = phys - self.base;
        self.frames[offset / PAGE_SIZE].get() as usize + offset % PAGE_SIZE
    }
}

impl FrameAllocator for &EmulatedMemory {
    fn allocate_one_page(&mut self, _zone: Zone) -> Option<PhysicalAddress> {
        self.allocate_frame()
    }
}
