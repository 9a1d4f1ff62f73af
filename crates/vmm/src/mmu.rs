//! Translation register primitives.
//!
//! The address space never touches `satp` or issues fences directly. It goes through an
//! [`Mmu`], which lets the same code drive real hardware and the software emulation.

use core::fmt;

use crate::{PhysicalAddress, arch};

/// The physical address of a root (level 2) page table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct RootHandle(PhysicalAddress);

impl RootHandle {
    /// Creates a root handle for the table at `address`.
    ///
    /// # Panics
    ///
    /// Panics if `address` is not page-aligned.
    #[inline]
    pub const fn new(address: PhysicalAddress) -> Self {
        assert!(
            address.is_aligned(arch::PAGE_SIZE),
            "root table must be page-aligned"
        );
        Self(address)
    }

    /// Returns the physical address of the root table.
    #[inline]
    pub const fn address(self) -> PhysicalAddress {
        self.0
    }
}

impl fmt::Debug for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootHandle({:#x})", self.0.as_usize())
    }
}

impl fmt::Display for RootHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Access to the hardware translation registers of the current hart.
pub trait Mmu {
    /// Reads the root table that is currently active.
    ///
    /// Used once, when an address space is constructed, to snapshot the boot table.
    fn read_active_root(&self) -> RootHandle;

    /// Encodes `root` together with the translation mode into the word written by
    /// [`Mmu::write_active_root`].
    fn encode_for_activation(&self, root: RootHandle) -> usize {
        arch::encode_satp(root.address().as_usize())
    }

    /// Writes the translation control register.
    ///
    /// # Safety
    ///
    /// `word` must name a root table that maps all code and data the hart touches after the
    /// write, including the code performing the write.
    unsafe fn write_active_root(&mut self, word: usize);

    /// Discards every cached translation on the current hart.
    fn invalidate_translation_cache(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedMmu;

    impl Mmu for FixedMmu {
        fn read_active_root(&self) -> RootHandle {
            RootHandle::new(PhysicalAddress::new(0x8000_0000))
        }

        unsafe fn write_active_root(&mut self, _word: usize) {}

        fn invalidate_translation_cache(&mut self) {}
    }

    #[test]
    fn default_encoding_selects_sv39() {
        let mmu = FixedMmu;
        let root = RootHandle::new(PhysicalAddress::new(0x8020_1000));
        assert_eq!(mmu.encode_for_activation(root), (8 << 60) | 0x80201);
    }

    #[test]
    #[should_panic(expected = "root table must be page-aligned")]
    fn unaligned_root() {
        RootHandle::new(PhysicalAddress::new(0x8000_0010));
    }

    #[test]
    fn display_format() {
        let root = FixedMmu.read_active_root();
        assert_eq!(format!("{}", root), "0x80000000");
        assert_eq!(format!("{:?}", root), "RootHandle(0x80000000)");
    }
}
