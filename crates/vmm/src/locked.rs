//! Serialized access to an address space.

use spin::{Mutex, MutexGuard};

use crate::{
    AddressSpace, MapOutcome, PhysicalAddress, RootHandle, Translation, UnmapOutcome,
    VirtualAddress, VmmError, address::AddressTranslator, arch::PageFlags,
    frame::FrameAllocator, mmu::Mmu,
};

/// An [`AddressSpace`] behind a spin lock.
///
/// Page table mutation is not safe to run from two contexts at once. Every operation here
/// holds the lock for its whole duration, walk and translation cache flush included.
pub struct LockedAddressSpace<T, A, M> {
    inner: Mutex<AddressSpace<T, A, M>>,
}

impl<T, A, M> LockedAddressSpace<T, A, M> {
    /// Wraps `space` in a lock.
    pub const fn new(space: AddressSpace<T, A, M>) -> Self {
        Self {
            inner: Mutex::new(space),
        }
    }

    /// Locks the address space for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, AddressSpace<T, A, M>> {
        self.inner.lock()
    }

    /// Locks the address space if no one else holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, AddressSpace<T, A, M>>> {
        self.inner.try_lock()
    }

    /// Unwraps the address space.
    pub fn into_inner(self) -> AddressSpace<T, A, M> {
        self.inner.into_inner()
    }
}

impl<T, A, M> LockedAddressSpace<T, A, M>
where
    T: AddressTranslator,
    A: FrameAllocator,
    M: Mmu,
{
    /// Returns the current root handle.
    pub fn root(&self) -> RootHandle {
        self.inner.lock().root()
    }

    /// Makes `root` the active table, see [`AddressSpace::set_root`].
    ///
    /// # Safety
    ///
    /// Same as [`AddressSpace::set_root`].
    pub unsafe fn set_root(&self, root: RootHandle) {
        // SAFETY: Guaranteed by the caller.
        unsafe { self.inner.lock().set_root(root) }
    }

    /// See [`AddressSpace::map`].
    pub fn map(
        &self,
        root: RootHandle,
        virt: VirtualAddress,
        phys: PhysicalAddress,
        flags: PageFlags,
    ) -> Result<MapOutcome, VmmError> {
        self.inner.lock().map(root, virt, phys, flags)
    }

    /// See [`AddressSpace::unmap`].
    pub fn unmap(&self, root: RootHandle, virt: VirtualAddress) -> Result<UnmapOutcome, VmmError> {
        self.inner.lock().unmap(root, virt)
    }

    /// See [`AddressSpace::query`].
    pub fn query(&self, root: RootHandle, virt: VirtualAddress) -> Result<Translation, VmmError> {
        self.inner.lock().query(root, virt)
    }

    /// See [`AddressSpace::translate`].
    pub fn translate(
        &self,
        root: RootHandle,
        virt: VirtualAddress,
    ) -> Result<PhysicalAddress, VmmError> {
        self.inner.lock().translate(root, virt)
    }
}
