//! Address space management.
//!
//! An [`AddressSpace`] ties together the three things a page table needs from the outside
//! world: a way to reach physical memory, a source of frames for new tables, and the
//! translation registers. It remembers which root table is active and keeps the hardware
//! translation cache consistent with every change it makes.
//!
//! Intermediate tables and mapped frames are never freed here. Unmapping leaves empty tables
//! linked in, and remapping does not reclaim the frame that was mapped before; the previous
//! entry is handed back so a higher layer can decide what to do with it.

use crate::{
    KernelRegion, PhysicalAddress, RootHandle, VirtualAddress, VmmError,
    address::AddressTranslator,
    arch::{self, PageFlags, PageTable, PageTableEntry},
    frame::{FrameAllocator, Zone},
    mmu::Mmu,
    walker::PageTableWalker,
};

/// Whether an address space's root is the one loaded into hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    /// The root has not been activated through [`AddressSpace::set_root`].
    Inactive,
    /// The root was written to the translation register.
    Active,
}

/// Result of a successful [`AddressSpace::map`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapOutcome {
    /// The slot was empty.
    Mapped,
    /// The slot already held a valid leaf, which was overwritten.
    Remapped {
        /// The entry that was replaced. Its frame was not reclaimed.
        previous: PageTableEntry,
    },
}

/// Result of a successful [`AddressSpace::unmap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmapOutcome {
    /// The leaf was cleared.
    Unmapped {
        /// The entry that was cleared. Its frame was not reclaimed.
        previous: PageTableEntry,
    },
    /// Nothing was mapped at the address; no table was touched.
    NotMapped,
}

/// A resolved translation returned by [`AddressSpace::query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    /// Start of the mapped physical frame.
    pub frame: PhysicalAddress,
    /// Flags of the leaf entry, including [`PageFlags::VALID`].
    pub flags: PageFlags,
}

/// A virtual address space rooted at a single Sv39 table.
pub struct AddressSpace<T, A, M> {
    translator: T,
    frames: A,
    mmu: M,
    root: RootHandle,
    state: ActivationState,
}

impl<T, A, M> AddressSpace<T, A, M>
where
    T: AddressTranslator,
    A: FrameAllocator,
    M: Mmu,
{
    /// Creates an address space, snapshotting whatever root is active in hardware.
    ///
    /// The address space starts out [`ActivationState::Inactive`] even though the snapshot is
    /// the live table; it only becomes active through [`AddressSpace::set_root`].
    pub fn new(translator: T, frames: A, mmu: M) -> Self {
        let root = mmu.read_active_root();
        log::debug!("boot page table at {}", root);
        Self {
            translator,
            frames,
            mmu,
            root,
            state: ActivationState::Inactive,
        }
    }

    /// Builds the kernel address space and activates it.
    ///
    /// Allocates a fresh root, identity-maps every page of `kernel` as read/write/execute and
    /// then installs the root with [`AddressSpace::set_root`]. Activation only happens once
    /// the whole region is mapped.
    ///
    /// # Errors
    ///
    /// Returns the first error from allocating the root or mapping the region. The hardware
    /// is left untouched in that case.
    ///
    /// # Safety
    ///
    /// `kernel` must cover all code and data the hart touches after activation, and the
    /// translator must still reach page tables under the identity mapping.
    pub unsafe fn init(&mut self, kernel: &KernelRegion) -> Result<RootHandle, VmmError> {
        let root = self.allocate_root()?;
        let pages = self.identity_map(root, kernel, PageFlags::RWX)?;
        log::info!(
            "identity-mapped {} kernel pages at {}..{}",
            pages,
            kernel.base(),
            kernel.end()
        );

        // SAFETY: The caller guarantees the kernel region is complete, and it is fully mapped.
        unsafe { self.set_root(root) };
        Ok(root)
    }

    /// Allocates and zero-fills a new root table.
    ///
    /// # Errors
    ///
    /// Returns [`VmmError::AllocationExhausted`] if no frame is available.
    pub fn allocate_root(&mut self) -> Result<RootHandle, VmmError> {
        let frame = self
            .frames
            .allocate_one_page(Zone::Normal)
            .ok_or(VmmError::AllocationExhausted {
                level: arch::PAGE_TABLE_LEVELS,
            })?;

        // SAFETY: The frame was just handed out, so nothing else refers to it.
        unsafe { (*self.translator.phys_to_ptr::<PageTable>(frame)).zero() };
        log::trace!("created root table at {}", frame);
        Ok(RootHandle::new(frame))
    }

    /// Returns the root handle this address space considers current.
    pub const fn root(&self) -> RootHandle {
        self.root
    }

    /// Returns the activation state.
    pub const fn state(&self) -> ActivationState {
        self.state
    }

    /// Returns true once [`AddressSpace::set_root`] has been called.
    pub const fn is_active(&self) -> bool {
        matches!(self.state, ActivationState::Active)
    }

    /// Makes `root` the active table.
    ///
    /// Records the handle, writes the encoded root to the translation register and flushes
    /// the translation cache, all in one step. The table is not inspected before the hardware
    /// is pointed at it.
    ///
    /// # Safety
    ///
    /// `root` must be a well-formed table that maps all code and data the hart touches after
    /// the switch.
    pub unsafe fn set_root(&mut self, root: RootHandle) {
        let word = self.mmu.encode_for_activation(root);
        self.root = root;
        // SAFETY: Guaranteed by the caller.
        unsafe { self.mmu.write_active_root(word) };
        self.mmu.invalidate_translation_cache();
        self.state = ActivationState::Active;
        log::debug!("activated page table at {} (satp {:#x})", root, word);
    }

    /// Maps the page at `virt` to the frame at `phys` with the given permissions.
    ///
    /// Intermediate tables are created as needed. If `virt` is already mapped the entry is
    /// overwritten and the old one is returned in [`MapOutcome::Remapped`]. The translation
    /// cache is flushed before returning.
    ///
    /// # Errors
    ///
    /// - [`VmmError::Misaligned`] if either address is not page-aligned. Nothing is rounded.
    /// - [`VmmError::InvalidPermissions`] if `flags` is not a valid leaf permission.
    /// - [`VmmError::AllocationExhausted`] if a table could not be allocated.
    /// - [`VmmError::UnexpectedLeaf`] if `virt` lies in a superpage.
    pub fn map(
        &mut self,
        root: RootHandle,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: PageFlags,
    ) -> Result<MapOutcome, VmmError> {
        check_aligned(virt.as_usize())?;
        check_aligned(phys.as_usize())?;
        let permissions = flags.permissions();
        if !permissions.is_valid_leaf_permission() {
            return Err(VmmError::InvalidPermissions { flags });
        }

        // SAFETY: `&mut self` keeps every other walk over these tables out until the entry is
        // written and dropped.
        let mut walker = unsafe { PageTableWalker::new(&self.translator) };
        let entry = walker
            .walk_or_create(root, virt, &mut self.frames)
            .inspect_err(|err| log::warn!("failed to map {} -> {}: {}", virt, phys, err))?;

        let previous = *entry;
        if previous.is_valid() {
            log::info!("remapping {}: {} -> {}", virt, previous.address(), phys);
        }
        *entry = PageTableEntry::leaf(phys, permissions);
        self.mmu.invalidate_translation_cache();

        Ok(if previous.is_valid() {
            MapOutcome::Remapped { previous }
        } else {
            MapOutcome::Mapped
        })
    }

    /// Identity-maps every page of `region` with the given permissions.
    ///
    /// Returns the number of pages mapped.
    ///
    /// # Errors
    ///
    /// Stops at the first page that fails to map, see [`AddressSpace::map`]. Pages mapped
    /// before the failure stay mapped.
    pub fn identity_map(
        &mut self,
        root: RootHandle,
        region: &KernelRegion,
        flags: PageFlags,
    ) -> Result<usize, VmmError> {
        let mut mapped = 0;
        for page in region.pages() {
            let virt = page.start();
            self.map(root, virt, PhysicalAddress::new(virt.as_usize()), flags)?;
            mapped += 1;
        }
        Ok(mapped)
    }

    /// Removes the mapping for the page at `virt`.
    ///
    /// Unmapping a page that is not mapped is not an error: it is logged and reported as
    /// [`UnmapOutcome::NotMapped`]. Neither the frame nor any table that becomes empty is
    /// freed.
    ///
    /// # Errors
    ///
    /// [`VmmError::Misaligned`] if `virt` is not page-aligned, and
    /// [`VmmError::UnexpectedLeaf`] if it lies in a superpage.
    pub fn unmap(
        &mut self,
        root: RootHandle,
        virt: VirtualAddress,
    ) -> Result<UnmapOutcome, VmmError> {
        check_aligned(virt.as_usize())?;

        // SAFETY: `&mut self` keeps every other walk over these tables out until the entry is
        // cleared and dropped.
        let mut walker = unsafe { PageTableWalker::new(&self.translator) };
        let entry = match walker.walk(root, virt) {
            Ok(entry) if entry.is_valid() => entry,
            Ok(_) | Err(VmmError::UnresolvedTranslation { .. }) => {
                log::info!("unmap of {}, which is not mapped", virt);
                return Ok(UnmapOutcome::NotMapped);
            }
            Err(err) => return Err(err),
        };

        let previous = *entry;
        entry.clear();
        self.mmu.invalidate_translation_cache();
        Ok(UnmapOutcome::Unmapped { previous })
    }

    /// Looks up the frame and flags `virt` is mapped to.
    ///
    /// Read-only: no table is created and the translation cache is not touched.
    ///
    /// # Errors
    ///
    /// [`VmmError::UnresolvedTranslation`] if the page is not mapped,
    /// [`VmmError::Misaligned`] if `virt` is not page-aligned, and
    /// [`VmmError::UnexpectedLeaf`] if it lies in a superpage.
    pub fn query(&self, root: RootHandle, virt: VirtualAddress) -> Result<Translation, VmmError> {
        check_aligned(virt.as_usize())?;

        // SAFETY: Tables are only written through `&mut self`, so while `&self` is held every
        // other access is a read, and `lookup` forms shared references only.
        let walker = unsafe { PageTableWalker::new(&self.translator) };
        let entry = walker.lookup(root, virt)?;
        if !entry.is_valid() {
            return Err(VmmError::UnresolvedTranslation {
                address: virt,
                level: 0,
            });
        }

        Ok(Translation {
            frame: entry.address(),
            flags: entry.flags(),
        })
    }

    /// Translates any virtual address, keeping its offset within the page.
    ///
    /// # Errors
    ///
    /// Same as [`AddressSpace::query`] on the page containing `virt`.
    pub fn translate(
        &self,
        root: RootHandle,
        virt: VirtualAddress,
    ) -> Result<PhysicalAddress, VmmError> {
        let page = virt.align_down(arch::PAGE_SIZE);
        let translation = self.query(root, page)?;
        Ok(translation.frame + virt.page_offset())
    }

    /// Returns the physical memory translator.
    pub fn translator(&self) -> &T {
        &self.translator
    }

    /// Returns the frame allocator.
    pub fn frames(&self) -> &A {
        &self.frames
    }

    /// Returns the frame allocator mutably.
    pub fn frames_mut(&mut self) -> &mut A {
        &mut self.frames
    }

    /// Returns the translation register layer.
    pub fn mmu(&self) -> &M {
        &self.mmu
    }
}

fn check_aligned(address: usize) -> Result<(), VmmError> {
    if address & arch::PAGE_OFFSET_MASK == 0 {
        Ok(())
    } else {
        Err(VmmError::Misaligned { address })
    }
}
