//! Interface to the physical frame allocator.

use crate::PhysicalAddress;

/// Physical memory zone to allocate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Zone {
    /// General purpose memory, reachable through the kernel's translator.
    Normal,
}

/// Source of page-sized physical frames.
///
/// Page tables are built from frames handed out here. The contents of a returned frame are
/// unspecified; callers zero-fill what they need.
pub trait FrameAllocator {
    /// Allocates exactly one page-aligned frame from `zone`.
    ///
    /// Returns None if the zone is exhausted.
    fn allocate_one_page(&mut self, zone: Zone) -> Option<PhysicalAddress>;
}

impl<A: FrameAllocator + ?Sized> FrameAllocator for &mut A {
    #[inline]
    fn allocate_one_page(&mut self, zone: Zone) -> Option<PhysicalAddress> {
        (**self).allocate_one_page(zone)
    }
}
