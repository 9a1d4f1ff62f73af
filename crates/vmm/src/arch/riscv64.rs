//! RISC-V supervisor-mode translation registers.

use riscv::register::satp;

use crate::{PhysicalAddress, RootHandle, mmu::Mmu};

use super::sv39;

/// Drives `satp` and `sfence.vma` on the current hart.
pub struct Sv39Mmu {
    _private: (),
}

impl Sv39Mmu {
    /// Creates the register layer for the current hart.
    ///
    /// # Safety
    ///
    /// Must be called in S-mode, and only one `Sv39Mmu` may exist per hart at a time.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Mmu for Sv39Mmu {
    fn read_active_root(&self) -> RootHandle {
        let word = satp::read().bits();
        if sv39::satp_mode(word) != sv39::SATP_MODE_SV39 {
            log::debug!("satp {:#x} is not in Sv39 mode", word);
        }
        RootHandle::new(PhysicalAddress::new(sv39::satp_root(word)))
    }

    unsafe fn write_active_root(&mut self, word: usize) {
        // SAFETY: The caller guarantees the new root maps everything the hart runs next.
        unsafe {
            core::arch::asm!("csrw satp, {}", in(reg) word, options(nostack));
        }
    }

    fn invalidate_translation_cache(&mut self) {
        // SAFETY: A global fence only discards cached translations.
        unsafe { riscv::asm::sfence_vma_all() }
    }
}
