//! Interrupt controller abstraction
//!
//! The engines only know which interrupt lines their peripheral raises;
//! routing and prioritising those lines is done by the platform.

/// Interrupt line number as seen by the interrupt controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Irq(pub u16);

impl Irq {
    /// Raw line number
    pub const fn number(self) -> u16 {
        self.0
    }
}

/// Interrupt controller
///
/// Implemented by the chip crate on top of the NVIC.
pub trait InterruptController {
    /// Unmask an interrupt line
    fn enable(&mut self, irq: Irq);

    /// Mask an interrupt line
    fn disable(&mut self, irq: Irq);

    /// Set the priority of a line (0 = most urgent)
    ///
    /// `level` is the logical priority; implementations shift it into the
    /// implemented priority bits of the controller.
    fn set_priority(&mut self, irq: Irq, level: u8);

    /// Enable or disable a line
    fn set_enabled(&mut self, irq: Irq, enable: bool) {
        if enable {
            self.enable(irq);
        } else {
            self.disable(irq);
        }
    }
}
