//! Sv39 paging format.
//!
//! Sv39 is the only page table format this crate manages. Both real RISC-V hardware and the
//! software emulation share it, so everything here is plain bit manipulation:
//!
//! - 39-bit virtual addresses, sign-extended from bit 38
//! - 56-bit physical addresses
//! - 3 levels of page tables (level 2 is the root, level 0 holds leaves)
//! - 9-bit indexes (512 entries per table)
//! - 12-bit page offset (4 KiB pages)

mod entry;
mod flags;
mod table;

pub use entry::PageTableEntry;
pub use flags::PageFlags;
pub use table::PageTable;

/// Maximum number of bits in a physical address.
pub const MAX_PHYSICAL_BITS: usize = 56;

/// Number of significant bits in a virtual address.
pub const MAX_VIRTUAL_BITS: usize = 39;

/// log2 of [`PAGE_SIZE`].
pub const PAGE_SHIFT: usize = 12;

/// Page size in bytes (4 KiB).
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;

/// Mask selecting the offset of an address within its page.
pub const PAGE_OFFSET_MASK: usize = PAGE_SIZE - 1;

/// Number of page table levels (level 2, 1, 0).
pub const PAGE_TABLE_LEVELS: usize = 3;

/// Number of virtual address bits consumed by each level.
pub const INDEX_BITS: usize = 9;

/// Number of entries in one page table.
pub const ENTRIES_PER_TABLE: usize = 1 << INDEX_BITS;

/// `satp.MODE` value selecting Sv39 translation.
pub const SATP_MODE_SV39: usize = 8;

const SATP_MODE_SHIFT: usize = 60;
const SATP_PPN_MASK: usize = (1 << 44) - 1;

/// Returns the page table index for a given virtual address at the specified level.
///
/// Level 0 uses bits 12-20, level 1 bits 21-29 and level 2 bits 30-38.
#[inline]
pub const fn page_index(address: usize, level: usize) -> usize {
    assert!(level < PAGE_TABLE_LEVELS, "level out of range for Sv39 (0-2)");
    (address >> (PAGE_SHIFT + INDEX_BITS * level)) & (ENTRIES_PER_TABLE - 1)
}

/// Validates a physical address.
#[inline]
pub const fn validate_physical(addr: usize) -> bool {
    addr >> MAX_PHYSICAL_BITS == 0
}

/// Validates a virtual address.
///
/// Virtual addresses must be canonical (bits 39-63 must equal bit 38).
#[inline]
pub const fn validate_virtual(addr: usize) -> bool {
    canonicalize_virtual(addr) == addr
}

/// Canonicalizes a virtual address by sign-extending bit 38 to bits 39-63.
#[inline]
pub const fn canonicalize_virtual(addr: usize) -> usize {
    let shift = usize::BITS as usize - MAX_VIRTUAL_BITS;
    (((addr << shift) as isize) >> shift) as usize
}

/// Builds the `satp` word that activates the table rooted at `root`.
///
/// The ASID field is left zero.
#[inline]
pub const fn encode_satp(root: usize) -> usize {
    (SATP_MODE_SV39 << SATP_MODE_SHIFT) | ((root >> PAGE_SHIFT) & SATP_PPN_MASK)
}

/// Returns the translation mode selected by a `satp` word.
#[inline]
pub const fn satp_mode(satp: usize) -> usize {
    satp >> SATP_MODE_SHIFT
}

/// Returns the physical address of the root table named by a `satp` word.
#[inline]
pub const fn satp_root(satp: usize) -> usize {
    (satp & SATP_PPN_MASK) << PAGE_SHIFT
}
