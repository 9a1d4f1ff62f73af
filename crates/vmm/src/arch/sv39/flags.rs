//! Page table entry flags.

bitflags::bitflags! {
    /// Low bits of an Sv39 page table entry.
    ///
    /// Only the valid bit and the three permission bits are managed. A valid entry with no
    /// permission bit set points at the next-level table; any permission bit makes it a leaf.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageFlags: u64 {
        /// Entry is valid (bit 0).
        const VALID = 1 << 0;
        /// Page is readable (bit 1).
        const READABLE = 1 << 1;
        /// Page is writable (bit 2).
        const WRITABLE = 1 << 2;
        /// Page is executable (bit 3).
        const EXECUTABLE = 1 << 3;
    }
}

impl PageFlags {
    /// Read + write + execute, the permissions given to the kernel image.
    pub const RWX: Self = Self::READABLE.union(Self::WRITABLE).union(Self::EXECUTABLE);

    /// The permission bits (R/W/X) in these flags.
    #[inline]
    pub const fn permissions(self) -> Self {
        self.intersection(Self::RWX)
    }

    /// Returns whether these flags describe a leaf, i.e. carry at least one permission bit.
    #[inline]
    pub const fn is_leaf(self) -> bool {
        self.intersects(Self::RWX)
    }

    /// Returns whether these permissions can be installed in a leaf.
    ///
    /// Sv39 reserves writable-without-readable, and a leaf needs at least one permission
    /// bit or the hardware treats it as a table pointer.
    #[inline]
    pub const fn is_valid_leaf_permission(self) -> bool {
        let perms = self.permissions();
        !perms.is_empty() && !(perms.contains(Self::WRITABLE) && !perms.contains(Self::READABLE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_positions() {
        assert_eq!(PageFlags::VALID.bits(), 0b0001);
        assert_eq!(PageFlags::READABLE.bits(), 0b0010);
        assert_eq!(PageFlags::WRITABLE.bits(), 0b0100);
        assert_eq!(PageFlags::EXECUTABLE.bits(), 0b1000);
        assert_eq!(PageFlags::RWX.bits(), 0b1110);
    }

    #[test]
    fn permissions_drop_valid() {
        let flags = PageFlags::VALID | PageFlags::READABLE;
        assert_eq!(flags.permissions(), PageFlags::READABLE);
        assert!(flags.is_leaf());
        assert!(!PageFlags::VALID.is_leaf());
    }

    #[test]
    fn leaf_permission_rules() {
        assert!(PageFlags::READABLE.is_valid_leaf_permission());
        assert!(PageFlags::EXECUTABLE.is_valid_leaf_permission());
        assert!(PageFlags::RWX.is_valid_leaf_permission());
        assert!(!PageFlags::empty().is_valid_leaf_permission());
        assert!(!PageFlags::VALID.is_valid_leaf_permission());
        assert!(!PageFlags::WRITABLE.is_valid_leaf_permission());
        assert!(!(PageFlags::WRITABLE | PageFlags::EXECUTABLE).is_valid_leaf_permission());
    }
}
