//! Sv39 page table entry.

use core::fmt;

use crate::{FrameNumber, PhysicalAddress};

use super::flags::PageFlags;

/// A single Sv39 page table entry.
///
/// The layout is a hardware contract and is reproduced exactly:
/// - Bits 0-3: valid, readable, writable, executable
/// - Bits 4-9: accessed/dirty/global/user/RSW, always written as zero
/// - Bits 10-53: physical page number
/// - Bits 54-63: reserved, always written as zero
///
/// Encoding is `((address >> 12) << 10) | flags | VALID` and decoding is
/// `(entry >> 10) << 12`.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct PageTableEntry(u64);

impl PageTableEntry {
    const PPN_SHIFT: u32 = 10;

    /// Physical page number field (bits 10-53) after shifting down.
    const PPN_MASK: u64 = (1 << 44) - 1;

    /// Creates an invalid (all-zero) entry.
    #[inline]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Creates a leaf entry mapping the page at `address` with the given permissions.
    ///
    /// The valid bit is always set. Bits other than R/W/X/V in `flags` are ignored.
    pub fn leaf(address: PhysicalAddress, flags: PageFlags) -> Self {
        debug_assert!(
            address.is_aligned(super::PAGE_SIZE),
            "physical address must be page-aligned"
        );
        Self::encode(address.frame_number(), flags | PageFlags::VALID)
    }

    /// Creates a non-leaf entry pointing at the next-level table at `address`.
    ///
    /// Non-leaf entries carry the valid bit and nothing else.
    pub fn table(address: PhysicalAddress) -> Self {
        debug_assert!(
            address.is_aligned(super::PAGE_SIZE),
            "page table address must be page-aligned"
        );
        Self::encode(address.frame_number(), PageFlags::VALID)
    }

    #[inline]
    fn encode(frame: FrameNumber, flags: PageFlags) -> Self {
        Self(((frame.as_usize() as u64) << Self::PPN_SHIFT) | flags.bits())
    }

    /// Returns the frame number stored in this entry.
    #[inline]
    pub const fn frame_number(self) -> FrameNumber {
        FrameNumber::new(((self.0 >> Self::PPN_SHIFT) & Self::PPN_MASK) as usize)
    }

    /// Returns the physical address stored in this entry, regardless of the valid bit.
    #[inline]
    pub const fn address(self) -> PhysicalAddress {
        self.frame_number().start()
    }

    /// Returns the flags for this entry.
    #[inline]
    pub const fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0)
    }

    /// Returns whether this entry is valid.
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.flags().contains(PageFlags::VALID)
    }

    /// Returns whether this entry is a valid leaf (maps a page directly).
    #[inline]
    pub const fn is_leaf(self) -> bool {
        self.is_valid() && self.flags().is_leaf()
    }

    /// Returns whether this entry is a valid pointer to a next-level table.
    #[inline]
    pub const fn is_table(self) -> bool {
        self.is_valid() && !self.flags().is_leaf()
    }

    /// Clears this entry (sets it to zero).
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Returns the raw 64-bit value of this entry.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Creates an entry from a raw 64-bit value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTableEntry")
            .field("raw", &format_args!("{:#018x}", self.0))
            .field("address", &self.address())
            .field("flags", &self.flags())
            .finish()
    }
}

impl fmt::Display for PageTableEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return f.write_str("<invalid>");
        }

        let flags = self.flags();
        let bit = |flag: PageFlags, c: char| if flags.contains(flag) { c } else { '-' };
        write!(
            f,
            "{} {}{}{}",
            self.address(),
            bit(PageFlags::READABLE, 'r'),
            bit(PageFlags::WRITABLE, 'w'),
            bit(PageFlags::EXECUTABLE, 'x'),
        )
    }
}
