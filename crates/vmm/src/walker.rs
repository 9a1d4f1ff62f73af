//! Sv39 page table walking.
//!
//! This module provides the `PageTableWalker` type, which resolves the chain of tables from a
//! root down to the level 0 entry for a virtual address, creating intermediate tables on
//! demand when asked to.

use crate::{
    PhysicalAddress, RootHandle, VirtualAddress, VmmError,
    address::AddressTranslator,
    arch::{self, PageTable, PageTableEntry},
    frame::{FrameAllocator, Zone},
};

/// Walks page tables reachable through an [`AddressTranslator`].
///
/// Tables are only built along paths that are actually mapped, so memory spent on tables is
/// proportional to the number of mappings rather than to the size of the address space.
///
/// The walker borrows itself mutably for as long as a returned entry is alive, so two entries
/// obtained from the same walker can never alias. Keeping other walkers away from the same
/// tables is part of the contract of [`PageTableWalker::new`].
pub struct PageTableWalker<'a, T: AddressTranslator + ?Sized> {
    translator: &'a T,
}

impl<'a, T: AddressTranslator + ?Sized> PageTableWalker<'a, T> {
    /// Creates a walker that reaches tables through `translator`.
    ///
    /// # Safety
    ///
    /// While the walker is alive, the page tables reachable from the roots it is given must
    /// not be accessed by anything else: no other walker, address space or reference may
    /// read or write them. Shared use through [`PageTableWalker::lookup`] on this walker is
    /// fine.
    pub const unsafe fn new(translator: &'a T) -> Self {
        Self { translator }
    }

    /// Reads the level 0 entry for a virtual address without modifying anything.
    ///
    /// Entries are copied out of each table on the way down, so no mutable reference to a
    /// table is ever formed. The returned entry may or may not be valid.
    ///
    /// # Errors
    ///
    /// Same as [`PageTableWalker::walk`].
    pub fn lookup(
        &self,
        root: RootHandle,
        virt: VirtualAddress,
    ) -> Result<PageTableEntry, VmmError> {
        let mut phys = root.address();

        for level in (1..arch::PAGE_TABLE_LEVELS).rev() {
            // SAFETY: `phys` is the root or the target of a valid non-leaf entry, and the
            // contract of `new` keeps writers away while `self` is alive.
            let entry = unsafe { self.table(phys) }.entry(virt.page_index(level));

            if entry.is_leaf() {
                return Err(VmmError::UnexpectedLeaf {
                    address: virt,
                    level,
                });
            }
            if !entry.is_valid() {
                return Err(VmmError::UnresolvedTranslation {
                    address: virt,
                    level,
                });
            }
            phys = entry.address();
        }

        // SAFETY: As above.
        Ok(unsafe { self.table(phys) }.entry(virt.page_index(0)))
    }

    /// Walks the page table hierarchy to find the level 0 entry for a virtual address.
    ///
    /// No table is created or modified. The returned entry may or may not be valid.
    ///
    /// # Errors
    ///
    /// Returns [`VmmError::UnresolvedTranslation`] if an intermediate table is missing and
    /// [`VmmError::UnexpectedLeaf`] if the path runs into a superpage.
    pub fn walk(
        &mut self,
        root: RootHandle,
        virt: VirtualAddress,
    ) -> Result<&mut PageTableEntry, VmmError> {
        self.descend(root, virt, None)
    }

    /// Walks the page table hierarchy, creating intermediate tables as needed.
    ///
    /// Every table created here is zero-filled before it is linked into its parent, and its
    /// parent entry carries the valid bit only. At most two tables are created per walk.
    ///
    /// # Errors
    ///
    /// Returns [`VmmError::AllocationExhausted`] if `frames` runs out while a table is
    /// needed, and [`VmmError::UnexpectedLeaf`] if the path runs into a superpage. Tables
    /// created before the failure stay linked in.
    pub fn walk_or_create<A: FrameAllocator>(
        &mut self,
        root: RootHandle,
        virt: VirtualAddress,
        frames: &mut A,
    ) -> Result<&mut PageTableEntry, VmmError> {
        self.descend(root, virt, Some(frames))
    }

    fn descend(
        &mut self,
        root: RootHandle,
        virt: VirtualAddress,
        mut frames: Option<&mut dyn FrameAllocator>,
    ) -> Result<&mut PageTableEntry, VmmError> {
        // SAFETY: Root handles name page tables reachable through the translator, and `&mut
        // self` keeps any other entry from this walker from being alive.
        let mut table = unsafe { self.table_mut(root.address()) };

        // Walk through all levels except the last
        for level in (1..arch::PAGE_TABLE_LEVELS).rev() {
            let entry = table.entry_mut(virt.page_index(level));

            if entry.is_leaf() {
                return Err(VmmError::UnexpectedLeaf {
                    address: virt,
                    level,
                });
            }

            if !entry.is_valid() {
                let Some(frames) = frames.as_deref_mut() else {
                    return Err(VmmError::UnresolvedTranslation {
                        address: virt,
                        level,
                    });
                };

                let frame = frames
                    .allocate_one_page(Zone::Normal)
                    .ok_or(VmmError::AllocationExhausted { level })?;

                // SAFETY: The frame was just handed out, so nothing else refers to it.
                unsafe { self.table_mut(frame) }.zero();
                *entry = PageTableEntry::table(frame);
                log::trace!(
                    "created level {} table at {} for {}",
                    level - 1,
                    frame,
                    virt
                );
            }

            // SAFETY: Valid non-leaf entries only ever point at tables created above or by an
            // earlier walk over the same root.
            table = unsafe { self.table_mut(entry.address()) };
        }

        Ok(table.entry_mut(virt.page_index(0)))
    }

    /// Returns the table stored in the frame at `phys` for reading.
    ///
    /// # Safety
    ///
    /// `phys` must hold a page table and no mutable reference to that table may be alive.
    unsafe fn table(&self, phys: PhysicalAddress) -> &PageTable {
        // SAFETY: The translator contract makes the pointer valid for a whole page.
        unsafe { &*self.translator.phys_to_ptr::<PageTable>(phys) }
    }

    /// Returns the table stored in the frame at `phys`.
    ///
    /// # Safety
    ///
    /// `phys` must hold a page table (or a frame about to become one) and no other reference
    /// to that table may be alive.
    #[allow(clippy::mut_from_ref)]
    unsafe fn table_mut(&self, phys: PhysicalAddress) -> &'a mut PageTable {
        // SAFETY: The translator contract makes the pointer valid for a whole page; exclusivity
        // is up to the caller.
        unsafe { &mut *self.translator.phys_to_ptr::<PageTable>(phys) }
    }
}
