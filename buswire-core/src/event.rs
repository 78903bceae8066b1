//! Transfer events reported from interrupt context

/// Something an engine observed while servicing an interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    // Completion
    /// Last transmit unit moved
    TxComplete,
    /// Last receive unit stored
    RxComplete,

    // Receiver errors
    /// New data arrived before the previous unit was read
    Overrun,
    /// Stop bit missing (UART)
    Framing,
    /// Noise detected on a sample (UART)
    Noise,
    /// Parity mismatch (UART)
    Parity,

    // Bus errors (I2C)
    /// Misplaced START or STOP
    BusError,
    /// Another master won the bus
    ArbitrationLost,
    /// Slave did not acknowledge
    AckFailure,
    /// SCL held low too long
    Timeout,
    /// STOP condition generated
    Stop,
}

impl Event {
    /// Check if this event reports a fault rather than progress
    pub fn is_error(&self) -> bool {
        !matches!(self, Event::TxComplete | Event::RxComplete | Event::Stop)
    }
}

/// Receiver of transfer events
///
/// Called from interrupt context with the handle borrowed, so
/// implementations must not block.
pub trait EventHandler {
    fn on_event(&mut self, _event: Event) {}
}

/// Event sink that ignores everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoEvents;

impl EventHandler for NoEvents {}

impl<E: EventHandler + ?Sized> EventHandler for &mut E {
    fn on_event(&mut self, event: Event) {
        (**self).on_event(event)
    }
}
