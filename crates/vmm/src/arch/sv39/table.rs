//! Sv39 page table structure.

use super::{ENTRIES_PER_TABLE, PAGE_SIZE, entry::PageTableEntry};

/// One level of an Sv39 page table.
///
/// A table is exactly one page of 512 entries and lives in a page-aligned physical frame.
/// Tables are never created on the stack or heap by the walker; they are always reached
/// through a physical frame handed out by the frame allocator.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRIES_PER_TABLE],
}

const _: () = assert!(core::mem::size_of::<PageTable>() == PAGE_SIZE);
const _: () = assert!(core::mem::align_of::<PageTable>() == PAGE_SIZE);

impl PageTable {
    /// Creates a new, empty page table.
    pub const fn new() -> Self {
        Self {
            entries: [PageTableEntry::zero(); ENTRIES_PER_TABLE],
        }
    }

    /// Sets every entry to zero (invalid).
    pub fn zero(&mut self) {
        self.entries.fill(PageTableEntry::zero());
    }

    /// Returns the entry at the given index.
    ///
    /// # Panics
    /// Panics if index >= 512.
    pub fn entry(&self, index: usize) -> PageTableEntry {
        assert!(index < ENTRIES_PER_TABLE, "page table index out of bounds");
        self.entries[index]
    }

    /// Returns a mutable reference to the entry at the given index.
    ///
    /// # Panics
    /// Panics if index >= 512.
    pub fn entry_mut(&mut self, index: usize) -> &mut PageTableEntry {
        assert!(index < ENTRIES_PER_TABLE, "page table index out of bounds");
        &mut self.entries[index]
    }

    /// Returns the number of entries in this page table.
    pub const fn len(&self) -> usize {
        ENTRIES_PER_TABLE
    }

    /// Returns true if no entry in this table is valid.
    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|entry| !entry.is_valid())
    }

    /// Iterates over the valid entries of this table together with their indexes.
    pub fn valid_entries(&self) -> impl Iterator<Item = (usize, PageTableEntry)> + '_ {
        self.entries
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, entry)| entry.is_valid())
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PageFlags, PhysicalAddress};

    #[test]
    fn new_table_is_empty() {
        let table = PageTable::new();
        assert!(table.is_empty());
        assert_eq!(table.len(), 512);
        assert_eq!(table.valid_entries().count(), 0);
    }

    #[test]
    fn zero_clears_every_entry() {
        let mut table = PageTable::new();
        *table.entry_mut(0) = PageTableEntry::table(PhysicalAddress::new(0x1000));
        *table.entry_mut(511) =
            PageTableEntry::leaf(PhysicalAddress::new(0x2000), PageFlags::READABLE);
        assert_eq!(table.valid_entries().map(|(i, _)| i).collect::<Vec<_>>(), [0, 511]);

        table.zero();
        assert!(table.is_empty());
    }

    #[test]
    #[should_panic(expected = "page table index out of bounds")]
    fn entry_out_of_bounds() {
        PageTable::new().entry(512);
    }
}
