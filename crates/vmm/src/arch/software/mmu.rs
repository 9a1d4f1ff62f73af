//! Emulated translation registers.

use alloc::vec::Vec;

use crate::{
    PhysicalAddress, RootHandle,
    arch::sv39::{self, encode_satp},
    mmu::Mmu,
};

/// Records what would have been written to `satp` and how often the TLB was flushed.
#[derive(Debug, Default)]
pub struct EmulatedMmu {
    satp: usize,
    writes: Vec<usize>,
    flushes: usize,
}

impl EmulatedMmu {
    /// Creates an MMU in bare mode (translation off, `satp` zero).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an MMU whose `satp` already names `root`, as if a bootloader had set it up.
    pub fn with_active_root(root: RootHandle) -> Self {
        Self {
            satp: encode_satp(root.address().as_usize()),
            ..Self::default()
        }
    }

    /// Returns the current `satp` word.
    pub fn satp(&self) -> usize {
        self.satp
    }

    /// Returns every word written to `satp`, oldest first.
    pub fn writes(&self) -> &[usize] {
        &self.writes
    }

    /// Returns the number of translation cache flushes performed.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }
}

impl Mmu for EmulatedMmu {
    fn read_active_root(&self) -> RootHandle {
        RootHandle::new(PhysicalAddress::new(sv39::satp_root(self.satp)))
    }

    unsafe fn write_active_root(&mut self, word: usize) {
        self.satp = word;
        self.writes.push(word);
    }

    fn invalidate_translation_cache(&mut self) {
        self.flushes += 1;
    }
}
