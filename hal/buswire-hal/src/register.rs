//! Register access abstraction
//!
//! Every engine reads and writes peripheral registers through
//! [`RegisterAccess`]. Addresses are absolute (peripheral base + offset) so a
//! single accessor covers the clock controller and the bus blocks alike.

/// A bit field inside a 32-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Field {
    /// Position of the least significant bit
    pub shift: u8,
    /// Number of bits
    pub width: u8,
}

impl Field {
    /// Field of `width` bits starting at `shift`
    pub const fn new(shift: u8, width: u8) -> Self {
        Self { shift, width }
    }

    /// Single-bit field
    pub const fn bit(shift: u8) -> Self {
        Self { shift, width: 1 }
    }

    /// Unshifted mask covering `width` bits
    pub const fn value_mask(self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        }
    }

    /// Mask of the field in register position
    pub const fn mask(self) -> u32 {
        self.value_mask() << self.shift
    }

    /// Extract the field from a register value
    pub const fn extract(self, reg: u32) -> u32 {
        (reg >> self.shift) & self.value_mask()
    }

    /// Replace the field inside `reg` with `value`, truncated to the field width
    pub const fn insert(self, reg: u32, value: u32) -> u32 {
        (reg & !self.mask()) | ((value & self.value_mask()) << self.shift)
    }
}

/// Access to memory-mapped peripheral registers
///
/// Implementations must perform each access exactly once and in program
/// order: status registers on this family have read side effects (e.g. the
/// I2C ADDR flag clears on an SR1-then-SR2 read sequence), so caching or
/// coalescing accesses would break the engines.
pub trait RegisterAccess {
    /// Read the 32-bit register at `addr`
    fn read(&self, addr: u32) -> u32;

    /// Write the 32-bit register at `addr`
    fn write(&self, addr: u32, value: u32);

    /// Read-modify-write
    fn modify<F>(&self, addr: u32, f: F)
    where
        F: FnOnce(u32) -> u32,
    {
        let value = self.read(addr);
        self.write(addr, f(value));
    }

    /// Set the bits in `mask`
    fn set_bits(&self, addr: u32, mask: u32) {
        self.modify(addr, |v| v | mask);
    }

    /// Clear the bits in `mask`
    fn clear_bits(&self, addr: u32, mask: u32) {
        self.modify(addr, |v| v & !mask);
    }

    /// Read a single field
    fn read_field(&self, addr: u32, field: Field) -> u32 {
        field.extract(self.read(addr))
    }

    /// Write a single field, leaving the rest of the register untouched
    fn write_field(&self, addr: u32, field: Field, value: u32) {
        self.modify(addr, |v| field.insert(v, value));
    }

    /// Check whether any bit of `field` is set
    fn is_set(&self, addr: u32, field: Field) -> bool {
        self.read(addr) & field.mask() != 0
    }
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &T {
    fn read(&self, addr: u32) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: u32, value: u32) {
        (**self).write(addr, value)
    }
}
