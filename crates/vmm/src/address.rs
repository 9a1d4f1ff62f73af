//! Address types for physical and virtual memory management.
//!
//! This module provides wrappers around Sv39 physical and virtual addresses, with methods to
//! manipulate them for page table operations, and the [`AddressTranslator`] indirection used
//! to reach page tables stored in physical memory.

use core::fmt;
use core::ops::{Add, Sub};

use crate::{FrameNumber, PageNumber, arch};

/// Resolves physical addresses to addresses the kernel can dereference.
///
/// Page tables link to each other by physical address. Every access the walker makes to a
/// table goes through this trait, so there is exactly one place where a physical address
/// becomes a pointer.
///
/// # Safety
///
/// For every physical frame that holds a page table (or is handed out by the frame allocator
/// used alongside this translator), [`AddressTranslator::phys_to_virt`] must return an address
/// that is valid for reads and writes of a whole page for as long as the translator is alive.
pub unsafe trait AddressTranslator {
    /// Translates a physical address to a virtual address.
    fn phys_to_virt(&self, phys: PhysicalAddress) -> usize;

    /// Translates a physical address to a typed pointer.
    #[inline]
    fn phys_to_ptr<T>(&self, phys: PhysicalAddress) -> *mut T {
        self.phys_to_virt(phys) as *mut T
    }
}

// SAFETY: Forwards to `T`, which upholds the contract.
unsafe impl<T: AddressTranslator + ?Sized> AddressTranslator for &T {
    #[inline]
    fn phys_to_virt(&self, phys: PhysicalAddress) -> usize {
        (**self).phys_to_virt(phys)
    }
}

/// Hardware translation using a direct-map offset.
///
/// All of physical memory is mapped at `offset` in the kernel's virtual address space. An
/// offset of zero is an identity mapping, which is what the kernel runs under right after
/// [`AddressSpace::init`](crate::AddressSpace::init).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectMap {
    offset: usize,
}

impl DirectMap {
    /// Creates a translator for physical memory mapped at `offset`.
    ///
    /// # Safety
    ///
    /// Every frame the page tables live in must be mapped read-write at `phys + offset` in the
    /// currently active address space, for as long as the translator is used. Tables reached
    /// through copies of this translator must not be written from one context while another
    /// context reads or writes them; wrap the address space in a
    /// [`LockedAddressSpace`](crate::LockedAddressSpace) when it is shared.
    #[inline]
    pub const unsafe fn new(offset: usize) -> Self {
        Self { offset }
    }

    /// Returns the direct-map offset.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Converts a direct-mapped virtual address back to a physical address.
    #[inline]
    pub fn virt_to_phys(&self, virt: VirtualAddress) -> PhysicalAddress {
        PhysicalAddress::new(virt.as_usize().wrapping_sub(self.offset))
    }

    /// Returns true if `virt` lies at or above the direct-map offset.
    #[inline]
    pub fn is_direct_mapped(&self, virt: VirtualAddress) -> bool {
        virt.as_usize() >= self.offset
    }
}

// SAFETY: Guaranteed by the contract of `DirectMap::new`.
unsafe impl AddressTranslator for DirectMap {
    #[inline]
    fn phys_to_virt(&self, phys: PhysicalAddress) -> usize {
        phys.as_usize().wrapping_add(self.offset)
    }
}

/// Macro to define common address type functionality.
///
/// This macro generates the basic structure and methods common to both physical
/// and virtual address types, reducing code duplication.
macro_rules! impl_address_common {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(usize);

        impl $name {
            /// Creates a new address without validation.
            ///
            /// # Safety
            ///
            /// The caller must ensure that the address is valid for Sv39.
            #[inline]
            pub const unsafe fn new_unchecked(addr: usize) -> Self {
                Self(addr)
            }

            /// Returns the raw address value.
            #[inline]
            pub const fn as_usize(self) -> usize {
                self.0
            }

            /// Checks if the address is aligned to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn is_aligned(self, align: usize) -> bool {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                self.0 & (align - 1) == 0
            }

            /// Returns true if the address is aligned to a page boundary.
            #[inline]
            pub const fn is_page_aligned(self) -> bool {
                self.0 & arch::PAGE_OFFSET_MASK == 0
            }

            /// Aligns the address down to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn align_down(self, align: usize) -> Self {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                Self(self.0 & !(align - 1))
            }

            /// Aligns the address up to the given alignment.
            ///
            /// # Panics
            ///
            /// Panics if `align` is not a power of two.
            #[inline]
            pub const fn align_up(self, align: usize) -> Self {
                assert!(align.is_power_of_two(), "alignment must be a power of two");
                Self((self.0 + align - 1) & !(align - 1))
            }

            /// Returns the offset of the address within its page.
            #[inline]
            pub const fn page_offset(self) -> usize {
                self.0 & arch::PAGE_OFFSET_MASK
            }
        }

        impl fmt::Pointer for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:p}", self.0 as *const u8)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:#x})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.0)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(addr: usize) -> Self {
                Self::new(addr)
            }
        }

        impl Add<usize> for $name {
            type Output = Self;

            #[inline]
            fn add(self, rhs: usize) -> Self::Output {
                Self::new(self.0 + rhs)
            }
        }

        impl Sub<usize> for $name {
            type Output = Self;

            #[inline]
            fn sub(self, rhs: usize) -> Self::Output {
                Self::new(self.0 - rhs)
            }
        }

        impl Sub<$name> for $name {
            type Output = usize;

            #[inline]
            fn sub(self, rhs: $name) -> Self::Output {
                self.0 - rhs.0
            }
        }
    };
}

impl_address_common!(
    PhysicalAddress,
    "A physical memory address.\n\n\
     Sv39 physical addresses are 56 bits wide."
);

impl PhysicalAddress {
    /// Creates a new physical address.
    ///
    /// # Panics
    ///
    /// Panics if the address exceeds the maximum physical address width.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        assert!(
            arch::validate_physical(addr),
            "physical address exceeds maximum width"
        );
        Self(addr)
    }

    /// Creates a new physical address, or None if it exceeds the maximum width.
    #[inline]
    pub const fn try_new(addr: usize) -> Option<Self> {
        if arch::validate_physical(addr) {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// Returns the corresponding frame number for this physical address.
    #[inline]
    pub const fn frame_number(self) -> FrameNumber {
        FrameNumber::new(self.0 >> arch::PAGE_SHIFT)
    }
}

impl_address_common!(
    VirtualAddress,
    "A virtual memory address.\n\n\
     Sv39 virtual addresses are 39 bits wide and sign-extended to 64 bits. Bits 12-38 are \
     split into three 9-bit page table indices."
);

impl VirtualAddress {
    /// Creates a new virtual address.
    ///
    /// # Panics
    ///
    /// Panics if the address is not canonical.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        assert!(arch::validate_virtual(addr), "address is not canonical");
        Self(addr)
    }

    /// Creates a new virtual address, or None if it is not canonical.
    #[inline]
    pub const fn try_new(addr: usize) -> Option<Self> {
        if arch::validate_virtual(addr) {
            Some(Self(addr))
        } else {
            None
        }
    }

    /// Creates a virtual address by sign-extending bit 38.
    #[inline]
    pub const fn new_truncate(addr: usize) -> Self {
        Self(arch::canonicalize_virtual(addr))
    }

    /// Returns the page table index at the specified level.
    ///
    /// Level 2 indexes the root table and level 0 the table holding leaves. The index is
    /// `(address >> (12 + 9 * level)) & 0x1FF`.
    ///
    /// # Panics
    ///
    /// Panics if `level` is greater than 2.
    #[inline]
    pub const fn page_index(self, level: usize) -> usize {
        arch::page_index(self.0, level)
    }

    /// Gets the corresponding page number for this virtual address.
    #[inline]
    pub const fn page_number(self) -> PageNumber {
        PageNumber::new(self.0 >> arch::PAGE_SHIFT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod physical_address {
        use super::*;

        #[test]
        fn new_max_valid_address() {
            let max_addr = (1usize << arch::MAX_PHYSICAL_BITS) - 1;
            let addr = PhysicalAddress::new(max_addr);
            assert_eq!(addr.as_usize(), max_addr);
        }

        #[test]
        #[should_panic(expected = "physical address exceeds maximum width")]
        fn new_exceeds_max() {
            PhysicalAddress::new(1usize << arch::MAX_PHYSICAL_BITS);
        }

        #[test]
        fn try_new() {
            assert_eq!(
                PhysicalAddress::try_new(0x8000_0000),
                Some(PhysicalAddress::new(0x8000_0000))
            );
            assert_eq!(PhysicalAddress::try_new(usize::MAX), None);
        }

        #[test]
        fn alignment() {
            let addr = PhysicalAddress::new(0x8000_1234);
            assert!(!addr.is_page_aligned());
            assert_eq!(addr.page_offset(), 0x234);
            assert_eq!(
                addr.align_down(arch::PAGE_SIZE),
                PhysicalAddress::new(0x8000_1000)
            );
            assert_eq!(
                addr.align_up(arch::PAGE_SIZE),
                PhysicalAddress::new(0x8000_2000)
            );
            assert!(addr.align_down(arch::PAGE_SIZE).is_page_aligned());
        }

        #[test]
        fn frame_number() {
            let addr = PhysicalAddress::new(0x8000_1FFF);
            assert_eq!(addr.frame_number(), FrameNumber::new(0x80001));
        }

        #[test]
        fn arithmetic() {
            let addr = PhysicalAddress::new(0x8000_0000);
            assert_eq!(addr + 0x1000, PhysicalAddress::new(0x8000_1000));
            assert_eq!((addr + 0x1000) - 0x800, PhysicalAddress::new(0x8000_0800));
            assert_eq!(PhysicalAddress::new(0x8000_3000) - addr, 0x3000);
        }

        #[test]
        fn formatting() {
            let addr = PhysicalAddress::new(0x8000_1000);
            assert_eq!(format!("{:?}", addr), "PhysicalAddress(0x80001000)");
            assert_eq!(format!("{}", addr), "0x80001000");
        }
    }

    mod virtual_address {
        use super::*;

        #[test]
        fn new_valid_upper_half() {
            let addr = VirtualAddress::new(0xFFFF_FFC0_0000_0000);
            assert_eq!(addr.page_index(2), 0x100);
            assert_eq!(addr.page_index(1), 0);
            assert_eq!(addr.page_index(0), 0);
        }

        #[test]
        #[should_panic(expected = "address is not canonical")]
        fn new_non_canonical_low() {
            VirtualAddress::new(0x40_0000_0000);
        }

        #[test]
        #[should_panic(expected = "address is not canonical")]
        fn new_non_canonical_high() {
            VirtualAddress::new(0xFFFF_FF80_0000_0000);
        }

        #[test]
        fn try_new_and_truncate() {
            assert_eq!(VirtualAddress::try_new(0x40_0000_0000), None);
            assert_eq!(
                VirtualAddress::new_truncate(0x40_0000_0000),
                VirtualAddress::new(0xFFFF_FFC0_0000_0000)
            );
        }

        #[test]
        fn page_index_per_level() {
            // 0x1000: level 2 = 0, level 1 = 0, level 0 = 1
            let addr = VirtualAddress::new(0x1000);
            assert_eq!(addr.page_index(2), 0);
            assert_eq!(addr.page_index(1), 0);
            assert_eq!(addr.page_index(0), 1);

            // 0x8020_1678: level 2 = 2, level 1 = 1, level 0 = 1, offset = 0x678
            let addr = VirtualAddress::new(0x8020_1678);
            assert_eq!(addr.page_index(2), 2);
            assert_eq!(addr.page_index(1), 1);
            assert_eq!(addr.page_index(0), 1);
            assert_eq!(addr.page_offset(), 0x678);
        }

        #[test]
        fn page_index_uses_nine_bits() {
            let addr = VirtualAddress::new(0x3F_FFFF_F000);
            assert_eq!(addr.page_index(2), 0xFF);
            assert_eq!(addr.page_index(1), 0x1FF);
            assert_eq!(addr.page_index(0), 0x1FF);
        }

        #[test]
        fn page_number() {
            let addr = VirtualAddress::new(0x5123);
            assert_eq!(addr.page_number(), PageNumber::new(5));
        }
    }

    mod direct_map {
        use super::*;

        #[test]
        fn identity() {
            let map = unsafe { DirectMap::new(0) };
            let phys = PhysicalAddress::new(0x8020_0000);
            assert_eq!(map.phys_to_virt(phys), 0x8020_0000);
            assert_eq!(map.virt_to_phys(VirtualAddress::new(0x8020_0000)), phys);
        }

        #[test]
        fn high_half_offset() {
            let map = unsafe { DirectMap::new(0xFFFF_FFC0_0000_0000) };
            let phys = PhysicalAddress::new(0x8000_1000);
            let virt = map.phys_to_virt(phys);
            assert_eq!(virt, 0xFFFF_FFC0_8000_1000);
            assert_eq!(map.virt_to_phys(VirtualAddress::new(virt)), phys);
            assert!(map.is_direct_mapped(VirtualAddress::new(virt)));
            assert!(!map.is_direct_mapped(VirtualAddress::new(0x1000)));
        }

        #[test]
        fn typed_pointer_through_reference() {
            let map = unsafe { DirectMap::new(0x1000) };
            let by_ref = &map;
            let ptr: *mut u64 = by_ref.phys_to_ptr(PhysicalAddress::new(0x2000));
            assert_eq!(ptr as usize, 0x3000);
        }
    }
}
