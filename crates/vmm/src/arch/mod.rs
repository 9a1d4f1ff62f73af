//! Architecture-specific implementations for memory management.
//!
//! The page table format is always Sv39. What differs between targets is how the translation
//! registers are reached: real RISC-V hardware goes through `satp` and `sfence.vma`, while
//! tests and host tools use software emulation.

mod sv39;
pub use sv39::*;

// NOTE: The hardware layer is only compiled for riscv64 since it issues RISC-V instructions.
#[cfg(target_arch = "riscv64")]
mod riscv64;
#[cfg(target_arch = "riscv64")]
pub use riscv64::Sv39Mmu;

// Use software emulation ONLY when:
// - Running tests, OR
// - software-emulation feature is explicitly enabled
#[cfg(any(test, feature = "software-emulation"))]
mod software;
#[cfg(any(test, feature = "software-emulation"))]
pub use software::{EmulatedMemory, EmulatedMmu};
