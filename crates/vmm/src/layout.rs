//! Boot-time memory layout.

use crate::{PageNumber, PhysicalAddress, VmmError, arch};

/// The physical range holding the kernel image, which is identity-mapped at init.
///
/// The base and size come from the linker script or bootloader; nothing here derives them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelRegion {
    base: PhysicalAddress,
    size: usize,
}

impl KernelRegion {
    /// Creates a kernel region of `size` bytes starting at `base`.
    ///
    /// A size that is not a whole number of pages is rounded up to cover the last partial
    /// page.
    ///
    /// # Errors
    ///
    /// Returns [`VmmError::Misaligned`] if `base` is not page-aligned, and
    /// [`VmmError::OutOfRange`] if the region cannot be identity-mapped because its end does
    /// not fit in the lower half of the Sv39 address space.
    pub fn new(base: PhysicalAddress, size: usize) -> Result<Self, VmmError> {
        if !base.is_page_aligned() {
            return Err(VmmError::Misaligned {
                address: base.as_usize(),
            });
        }

        let out_of_range = VmmError::OutOfRange {
            base: base.as_usize(),
            size,
        };
        let end = base
            .as_usize()
            .checked_add(size)
            .and_then(|end| end.checked_add(arch::PAGE_OFFSET_MASK))
            .ok_or(out_of_range)?
            & !arch::PAGE_OFFSET_MASK;
        if end > 1 << (arch::MAX_VIRTUAL_BITS - 1) {
            return Err(out_of_range);
        }

        Ok(Self { base, size })
    }

    /// Returns the base address of this region.
    pub const fn base(&self) -> PhysicalAddress {
        self.base
    }

    /// Returns the size of this region in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the end address (exclusive) of this region, rounded up to a page boundary.
    pub const fn end(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.base.as_usize() + self.size).align_up(arch::PAGE_SIZE)
    }

    /// Returns the number of pages covered by this region.
    pub const fn page_count(&self) -> usize {
        (self.end().as_usize() - self.base.as_usize()) >> arch::PAGE_SHIFT
    }

    /// Returns true if `addr` lies inside this region.
    pub const fn contains(&self, addr: PhysicalAddress) -> bool {
        addr.as_usize() >= self.base.as_usize() && addr.as_usize() < self.end().as_usize()
    }

    /// Iterates over the virtual pages of the identity mapping of this region.
    pub fn pages(&self) -> impl Iterator<Item = PageNumber> {
        let first = self.base.frame_number().as_usize();
        (first..first + self.page_count()).map(PageNumber::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_pages() {
        let region = KernelRegion::new(PhysicalAddress::new(0x8020_0000), 0x3000).unwrap();
        assert_eq!(region.end(), PhysicalAddress::new(0x8020_3000));
        assert_eq!(region.page_count(), 3);
        let pages: Vec<_> = region.pages().map(|page| page.start().as_usize()).collect();
        assert_eq!(pages, [0x8020_0000, 0x8020_1000, 0x8020_2000]);
    }

    #[test]
    fn partial_last_page_is_covered() {
        let region = KernelRegion::new(PhysicalAddress::new(0x8020_0000), 0x1001).unwrap();
        assert_eq!(region.page_count(), 2);
        assert!(region.contains(PhysicalAddress::new(0x8020_1FFF)));
        assert!(!region.contains(PhysicalAddress::new(0x8020_2000)));
    }

    #[test]
    fn empty_region() {
        let region = KernelRegion::new(PhysicalAddress::new(0x8020_0000), 0).unwrap();
        assert_eq!(region.page_count(), 0);
        assert_eq!(region.pages().count(), 0);
    }

    #[test]
    fn rejects_unaligned_base() {
        assert_eq!(
            KernelRegion::new(PhysicalAddress::new(0x8020_0010), 0x1000),
            Err(VmmError::Misaligned {
                address: 0x8020_0010
            })
        );
    }

    #[test]
    fn rejects_region_past_lower_half() {
        let base = PhysicalAddress::new(0x3F_FFFF_F000);
        assert!(KernelRegion::new(base, 0x1000).is_ok());
        assert_eq!(
            KernelRegion::new(base, 0x1001),
            Err(VmmError::OutOfRange {
                base: 0x3F_FFFF_F000,
                size: 0x1001
            })
        );
    }
}
