#![cfg_attr(not(any(test, feature = "software-emulation")), no_std)]

//! # Polaris Virtual Memory Manager (VMM)
//!
//! The Polaris Virtual Memory Manager is the page table layer of the Polaris kernel on
//! RISC-V. It provides:
//!
//! - A bit-exact Sv39 page table entry codec.
//! - A page table walker that builds intermediate tables on demand.
//! - Kernel address spaces with map, unmap, query and activation, keeping the hardware
//!   translation cache consistent with every change.
//! - Software emulation of physical memory and translation registers for testing in
//!   non-kernel environments.

#[cfg(any(test, feature = "software-emulation"))]
extern crate alloc;

mod address;
mod address_space;
mod arch;
mod error;
mod frame;
mod layout;
mod locked;
mod mmu;
mod numbers;
mod walker;

pub use address::{AddressTranslator, DirectMap, PhysicalAddress, VirtualAddress};
pub use address_space::{ActivationState, AddressSpace, MapOutcome, Translation, UnmapOutcome};
pub use error::VmmError;
pub use frame::{FrameAllocator, Zone};
pub use layout::KernelRegion;
pub use locked::LockedAddressSpace;
pub use mmu::{Mmu, RootHandle};
pub use numbers::{FrameNumber, PageNumber};
pub use walker::PageTableWalker;

pub use arch::{
    ENTRIES_PER_TABLE, PAGE_OFFSET_MASK, PAGE_SHIFT, PAGE_SIZE, PAGE_TABLE_LEVELS, PageFlags,
    PageTable, PageTableEntry, SATP_MODE_SV39, encode_satp, satp_mode, satp_root,
};

#[cfg(target_arch = "riscv64")]
pub use arch::Sv39Mmu;

#[cfg(any(test, feature = "software-emulation"))]
pub use arch::{EmulatedMemory, EmulatedMmu};
