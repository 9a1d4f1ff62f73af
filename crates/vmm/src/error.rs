use crate::{PageFlags, VirtualAddress};

/// Errors returned by page table walks and address space operations.
///
/// Remapping an already-mapped page and unmapping an unmapped one are not errors; they are
/// reported through [`MapOutcome`](crate::MapOutcome) and
/// [`UnmapOutcome`](crate::UnmapOutcome).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VmmError {
    /// The frame allocator could not supply a page needed to extend the walk.
    #[error("out of frames for a page table below level {level}")]
    AllocationExhausted { level: usize },

    /// A lookup reached an invalid entry and was not allowed to allocate.
    #[error("{address} is not mapped (invalid entry at level {level})")]
    UnresolvedTranslation { address: VirtualAddress, level: usize },

    /// An upper-level entry maps a superpage, which this crate does not manage.
    #[error("{address} is covered by a level {level} superpage")]
    UnexpectedLeaf { address: VirtualAddress, level: usize },

    /// An address that must be page-aligned was not.
    #[error("address {address:#x} is not page-aligned")]
    Misaligned { address: usize },

    /// The permissions cannot be encoded in a leaf entry.
    #[error("{flags:?} is not a valid leaf permission")]
    InvalidPermissions { flags: PageFlags },

    /// A region does not fit in the address range it has to be mapped into.
    #[error("region at {base:#x} of {size:#x} bytes is out of range")]
    OutOfRange { base: usize, size: usize },
}

impl VmmError {
    /// Returns true if the error means "nothing is mapped here", as opposed to a failure.
    pub const fn is_not_mapped(&self) -> bool {
        matches!(self, Self::UnresolvedTranslation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let err = VmmError::UnresolvedTranslation {
            address: VirtualAddress::new(0x1000),
            level: 0,
        };
        assert_eq!(
            err.to_string(),
            "0x1000 is not mapped (invalid entry at level 0)"
        );
        assert!(err.is_not_mapped());

        let err = VmmError::Misaligned { address: 0x1234 };
        assert_eq!(err.to_string(), "address 0x1234 is not page-aligned");
        assert!(!err.is_not_mapped());

        let err = VmmError::AllocationExhausted { level: 2 };
        assert_eq!(err.to_string(), "out of frames for a page table below level 2");
    }
}
