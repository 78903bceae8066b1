//! Memory-mapped register access

use buswire_hal::RegisterAccess;

/// Volatile access to the peripheral address space
///
/// Zero-sized and `Copy`; every engine handle can hold its own copy. Only
/// [`Mmio::new`] creates one, and its contract covers every address later
/// passed to [`read`](RegisterAccess::read) and
/// [`write`](RegisterAccess::write).
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// The returned value, and every copy of it, must only be handed to
    /// code that passes word-aligned peripheral register addresses of this
    /// chip, such as the engines driven by the register maps in
    /// `buswire-core`.
    #[allow(unsafe_code)]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterAccess for Mmio {
    #[allow(unsafe_code)]
    fn read(&self, addr: u32) -> u32 {
        // SAFETY: the Mmio::new contract restricts addr to peripheral registers
        unsafe { core::ptr::read_volatile(addr as usize as *const u32) }
    }

    #[allow(unsafe_code)]
    fn write(&self, addr: u32, value: u32) {
        // SAFETY: the Mmio::new contract restricts addr to peripheral registers
        unsafe { core::ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}
