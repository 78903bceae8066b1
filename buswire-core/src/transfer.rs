//! Transfer bookkeeping shared by the interrupt-driven engines
//!
//! A transfer borrows the caller's buffer for its whole lifetime; the
//! cursors below walk that borrow one unit at a time and never copy it.
//! A unit is one data register access: one byte, or two bytes
//! (little-endian) for 16-bit SPI frames and 9-bit UART frames.

/// Per-direction transfer status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransferState {
    /// No transfer armed; a new one is accepted
    #[default]
    Ready,
    /// Transmission in progress
    BusyTx,
    /// Reception in progress
    BusyRx,
}

impl TransferState {
    pub fn is_ready(&self) -> bool {
        matches!(self, TransferState::Ready)
    }

    pub fn is_busy(&self) -> bool {
        !self.is_ready()
    }
}

/// Outgoing half of a transfer
#[derive(Debug, Default)]
pub struct TxCursor<'a> {
    data: &'a [u8],
}

impl<'a> TxCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Bytes still to send
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Take the next unit of `unit_bytes` (1 or 2)
    ///
    /// A trailing odd byte in 2-byte mode goes out with a zero high byte.
    pub fn next_unit(&mut self, unit_bytes: usize) -> Option<u16> {
        let (&lo, rest) = self.data.split_first()?;
        if unit_bytes < 2 {
            self.data = rest;
            return Some(lo as u16);
        }
        match rest.split_first() {
            Some((&hi, rest)) => {
                self.data = rest;
                Some(u16::from_le_bytes([lo, hi]))
            }
            None => {
                self.data = rest;
                Some(lo as u16)
            }
        }
    }
}

/// Incoming half of a transfer
#[derive(Debug, Default)]
pub struct RxCursor<'a> {
    buf: &'a mut [u8],
}

impl<'a> RxCursor<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    /// Bytes still to fill
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Store one received unit of `unit_bytes` (1 or 2)
    ///
    /// Returns `false` if the buffer was already full. A 2-byte unit landing
    /// on the last byte keeps only its low byte.
    pub fn put_unit(&mut self, value: u16, unit_bytes: usize) -> bool {
        if self.buf.is_empty() {
            return false;
        }
        let bytes = value.to_le_bytes();
        let n = unit_bytes.clamp(1, 2).min(self.buf.len());
        let buf = core::mem::take(&mut self.buf);
        let (head, tail) = buf.split_at_mut(n);
        head.copy_from_slice(&bytes[..n]);
        self.buf = tail;
        true
    }
}
