//! SPI engine
//!
//! Drives one SPI block in master or slave mode. Transfers come in two
//! flavours:
//!
//! - Blocking: [`Spi::send`], [`Spi::receive`] and [`Spi::transfer`] spin
//!   on TXE/RXNE and return as soon as the last unit has moved through DR.
//! - Interrupt-driven: [`Spi::send_async`], [`Spi::receive_async`] and
//!   [`Spi::transfer_async`] arm the interrupt sources and return at once;
//!   [`Spi::on_interrupt`] must be called from the SPI interrupt handler and
//!   moves one unit per call.
//!
//! # Transfer state
//!
//! ```text
//!   Ready ──send_async──▶ BusyTx ──last unit──▶ Ready (TxComplete)
//!   Ready ──receive_async──▶ BusyRx ──last unit──▶ Ready (RxComplete)
//! ```
//!
//! Each direction has its own state. Both are busy at the same time only
//! after [`Spi::transfer_async`], which requires a full-duplex bus.

use core::convert::Infallible;

use buswire_core::config::SpiConfig;
use buswire_core::regs::spi;
use buswire_core::{Event, EventHandler, NoEvents, RxCursor, SpiInstance, TransferState, TxCursor};
use buswire_hal::spi::{BusMode, DeviceMode, Phase, Polarity, SlaveSelect, WordSize};
use buswire_hal::{Field, InterruptController, RegisterAccess};

use crate::deadline::Cancellable;

/// Handle binding one SPI block to its configuration and transfer state
pub struct Spi<'a, R: RegisterAccess, E: EventHandler = NoEvents> {
    regs: R,
    instance: SpiInstance,
    config: SpiConfig,
    tx_state: TransferState,
    rx_state: TransferState,
    tx: TxCursor<'a>,
    rx: RxCursor<'a>,
    /// Zero units still owed to a full-duplex read longer than its write
    fill: usize,
    events: E,
}

impl<'a, R: RegisterAccess> Spi<'a, R> {
    /// Create a handle that discards transfer events
    pub fn new(regs: R, instance: SpiInstance, config: SpiConfig) -> Self {
        Self::with_events(regs, instance, config, NoEvents)
    }
}

impl<'a, R: RegisterAccess, E: EventHandler> Spi<'a, R, E> {
    /// Create a handle that reports transfer events to `events`
    pub fn with_events(regs: R, instance: SpiInstance, config: SpiConfig, events: E) -> Self {
        Self {
            regs,
            instance,
            config,
            tx_state: TransferState::Ready,
            rx_state: TransferState::Ready,
            tx: TxCursor::default(),
            rx: RxCursor::default(),
            fill: 0,
            events,
        }
    }

    pub fn instance(&self) -> SpiInstance {
        self.instance
    }

    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    pub fn tx_state(&self) -> TransferState {
        self.tx_state
    }

    pub fn rx_state(&self) -> TransferState {
        self.rx_state
    }

    fn addr(&self, offset: u32) -> u32 {
        self.instance.base() + offset
    }

    fn flag(&self, field: Field) -> bool {
        self.regs.is_set(self.addr(spi::SR), field)
    }

    fn wait_for(&self, field: Field) {
        while !self.flag(field) {
            core::hint::spin_loop();
        }
    }

    fn unit_bytes(&self) -> usize {
        self.config.unit_bytes()
    }

    /// Gate the peripheral clock
    pub fn clock_control(&mut self, enable: bool) {
        self.instance.clock_gate().set(&self.regs, enable);
    }

    /// Enable the clock and program CR1 from the configuration
    ///
    /// Leaves SPE clear; call [`enable`](Self::enable) to start the block.
    pub fn init(&mut self) {
        self.clock_control(true);

        let c = &self.config;
        let mut cr1 = 0;
        if c.device_mode == DeviceMode::Master {
            cr1 |= spi::CR1_MSTR.mask();
        }
        match c.bus_mode {
            BusMode::FullDuplex => {}
            BusMode::HalfDuplex => cr1 |= spi::CR1_BIDIMODE.mask(),
            BusMode::SimplexRxOnly => cr1 |= spi::CR1_RXONLY.mask(),
        }
        if c.word_size == WordSize::Sixteen {
            cr1 |= spi::CR1_DFF.mask();
        }
        if c.phase == Phase::CaptureOnSecondTransition {
            cr1 |= spi::CR1_CPHA.mask();
        }
        if c.polarity == Polarity::IdleHigh {
            cr1 |= spi::CR1_CPOL.mask();
        }
        if c.slave_select == SlaveSelect::Software {
            cr1 |= spi::CR1_SSM.mask();
            // A master must see NSS high or it faults with MODF
            if c.device_mode == DeviceMode::Master {
                cr1 |= spi::CR1_SSI.mask();
            }
        }
        cr1 = spi::CR1_BR.insert(cr1, c.baud as u32);

        self.regs.write(self.addr(spi::CR1), cr1);

        #[cfg(feature = "defmt")]
        defmt::trace!("{} init: CR1={=u32:#x}", self.instance, cr1);
    }

    /// Reset every register of the block and forget any armed transfer
    pub fn deinit(&mut self) {
        self.instance.reset_line().pulse(&self.regs);
        self.tx = TxCursor::default();
        self.rx = RxCursor::default();
        self.fill = 0;
        self.tx_state = TransferState::Ready;
        self.rx_state = TransferState::Ready;
    }

    pub fn enable(&mut self) {
        self.regs.set_bits(self.addr(spi::CR1), spi::CR1_SPE.mask());
    }

    pub fn disable(&mut self) {
        self.regs.clear_bits(self.addr(spi::CR1), spi::CR1_SPE.mask());
    }

    /// Drive NSS from hardware while the block is enabled (master mode)
    pub fn set_ss_output(&mut self, enable: bool) {
        let cr2 = self.addr(spi::CR2);
        self.regs.write_field(cr2, spi::CR2_SSOE, enable as u32);
    }

    /// Shifter or data register still occupied
    pub fn is_busy(&self) -> bool {
        self.flag(spi::SR_BSY)
    }

    /// Route the block's interrupt line through `nvic` at `priority`
    pub fn enable_interrupts<C: InterruptController>(&self, nvic: &mut C, priority: u8) {
        let irq = self.instance.irq();
        nvic.set_priority(irq, priority);
        nvic.enable(irq);
    }

    /// Send `data`, discarding whatever is clocked in
    pub fn send(&mut self, data: &[u8]) {
        let unit = self.unit_bytes();
        let dr = self.addr(spi::DR);
        let mut tx = TxCursor::new(data);
        while let Some(word) = tx.next_unit(unit) {
            self.wait_for(spi::SR_TXE);
            self.regs.write(dr, word as u32);
        }
    }

    /// Fill `buf` with received units
    ///
    /// Does not generate clocks by itself: in master mode the peer only
    /// shifts data while something is being sent.
    pub fn receive(&mut self, buf: &mut [u8]) {
        let unit = self.unit_bytes();
        let dr = self.addr(spi::DR);
        let mut rx = RxCursor::new(buf);
        while !rx.is_empty() {
            self.wait_for(spi::SR_RXNE);
            rx.put_unit(self.regs.read(dr) as u16, unit);
        }
    }

    /// Full-duplex exchange
    ///
    /// Runs for the longer of the two buffers; missing outgoing units are
    /// sent as zero and surplus incoming units are dropped.
    pub fn transfer(&mut self, read: &mut [u8], write: &[u8]) {
        let unit = self.unit_bytes();
        let mut tx = TxCursor::new(write);
        let mut rx = RxCursor::new(read);
        while !tx.is_empty() || !rx.is_empty() {
            let word = tx.next_unit(unit).unwrap_or(0);
            let received = self.exchange(word);
            rx.put_unit(received, unit);
        }
    }

    fn exchange(&mut self, word: u16) -> u16 {
        let dr = self.addr(spi::DR);
        self.wait_for(spi::SR_TXE);
        self.regs.write(dr, word as u32);
        self.wait_for(spi::SR_RXNE);
        self.regs.read(dr) as u16
    }

    /// State observed before arming: the busy direction, if any
    fn entry_state(&self) -> TransferState {
        if self.tx_state.is_busy() {
            self.tx_state
        } else {
            self.rx_state
        }
    }

    /// Start sending `data` from the interrupt handler
    ///
    /// Returns the state observed on entry. Anything other than
    /// [`TransferState::Ready`] means the call was rejected and nothing was
    /// armed.
    pub fn send_async(&mut self, data: &'a [u8]) -> TransferState {
        let state = self.entry_state();
        if state.is_ready() {
            self.tx = TxCursor::new(data);
            self.tx_state = TransferState::BusyTx;
            self.regs.set_bits(self.addr(spi::CR2), spi::CR2_TXEIE.mask());
        }
        state
    }

    /// Start filling `buf` from the interrupt handler
    ///
    /// Same return contract as [`send_async`](Self::send_async).
    pub fn receive_async(&mut self, buf: &'a mut [u8]) -> TransferState {
        let state = self.entry_state();
        if state.is_ready() {
            self.rx = RxCursor::new(buf);
            self.rx_state = TransferState::BusyRx;
            self.regs.set_bits(
                self.addr(spi::CR2),
                spi::CR2_RXNEIE.mask() | spi::CR2_ERRIE.mask(),
            );
        }
        state
    }

    /// Arm both directions at once
    ///
    /// Only accepted on a full-duplex bus with both directions idle.
    /// Returns whether the transfer was armed.
    ///
    /// Like [`transfer`](Self::transfer), the exchange runs for the longer
    /// buffer: a short `write` is padded with zero units until `read` is
    /// full. An empty `read` arms the transmit side only.
    pub fn transfer_async(&mut self, read: &'a mut [u8], write: &'a [u8]) -> bool {
        if !self.config.is_full_duplex() || self.entry_state().is_busy() {
            return false;
        }
        let unit = self.unit_bytes();
        self.fill = read.len().div_ceil(unit).saturating_sub(write.len().div_ceil(unit));
        self.tx = TxCursor::new(write);
        self.tx_state = TransferState::BusyTx;
        let mut cr2 = spi::CR2_TXEIE.mask();
        if !read.is_empty() {
            self.rx = RxCursor::new(read);
            self.rx_state = TransferState::BusyRx;
            cr2 |= spi::CR2_RXNEIE.mask() | spi::CR2_ERRIE.mask();
        }
        self.regs.set_bits(self.addr(spi::CR2), cr2);
        true
    }

    /// Service the SPI interrupt
    ///
    /// Handles the first pending enabled source in the order receive,
    /// transmit, overrun, moving at most one unit.
    pub fn on_interrupt(&mut self) {
        let sr = self.regs.read(self.addr(spi::SR));
        let cr2 = self.regs.read(self.addr(spi::CR2));
        let pending = |flag: Field, enable: Field| sr & flag.mask() != 0 && cr2 & enable.mask() != 0;

        if pending(spi::SR_RXNE, spi::CR2_RXNEIE) {
            self.receive_unit();
        } else if pending(spi::SR_TXE, spi::CR2_TXEIE) {
            self.transmit_unit();
        } else if pending(spi::SR_OVR, spi::CR2_ERRIE) {
            self.clear_overrun();
        }
    }

    fn transmit_unit(&mut self) {
        let word = match self.tx.next_unit(self.unit_bytes()) {
            Some(word) => Some(word),
            None if self.fill > 0 => {
                self.fill -= 1;
                Some(0)
            }
            None => None,
        };
        if let Some(word) = word {
            self.regs.write(self.addr(spi::DR), word as u32);
        }
        if self.tx.is_empty() && self.fill == 0 {
            self.close_send();
            self.events.on_event(Event::TxComplete);
        }
    }

    fn receive_unit(&mut self) {
        let word = self.regs.read(self.addr(spi::DR)) as u16;
        self.rx.put_unit(word, self.unit_bytes());
        if self.rx.is_empty() {
            self.close_receive();
            self.events.on_event(Event::RxComplete);
        }
    }

    fn clear_overrun(&mut self) {
        // A transmission in progress keeps OVR until it completes
        if self.tx_state.is_busy() {
            return;
        }
        self.regs.read(self.addr(spi::DR));
        self.regs.read(self.addr(spi::SR));
        self.events.on_event(Event::Overrun);
    }

    /// Abort an armed transmission without reporting completion
    pub fn close_send(&mut self) {
        self.regs.clear_bits(self.addr(spi::CR2), spi::CR2_TXEIE.mask());
        self.tx = TxCursor::default();
        self.fill = 0;
        self.tx_state = TransferState::Ready;
    }

    /// Abort an armed reception without reporting completion
    pub fn close_receive(&mut self) {
        self.regs.clear_bits(
            self.addr(spi::CR2),
            spi::CR2_RXNEIE.mask() | spi::CR2_ERRIE.mask(),
        );
        self.rx = RxCursor::default();
        self.rx_state = TransferState::Ready;
    }
}

impl<R: RegisterAccess, E: EventHandler> Cancellable for Spi<'_, R, E> {
    fn is_idle(&self) -> bool {
        self.tx_state.is_ready() && self.rx_state.is_ready()
    }

    fn cancel(&mut self) {
        self.close_send();
        self.close_receive();
    }
}

impl<R: RegisterAccess, E: EventHandler> buswire_hal::SpiBus for Spi<'_, R, E> {
    type Error = Infallible;

    fn send(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        Spi::send(self, data);
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        Spi::receive(self, buf);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        Spi::transfer(self, read, write);
        Ok(())
    }

    fn is_busy(&self) -> bool {
        Spi::is_busy(self)
    }
}

impl<R: RegisterAccess, E: EventHandler> embedded_hal::spi::ErrorType for Spi<'_, R, E> {
    type Error = Infallible;
}

impl<R: RegisterAccess, E: EventHandler> embedded_hal::spi::SpiBus<u8> for Spi<'_, R, E> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        // Clock out zeros so the peer can answer
        Spi::transfer(self, words, &[]);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        Spi::send(self, words);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        Spi::transfer(self, read, write);
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let unit = self.unit_bytes();
        for chunk in words.chunks_mut(unit) {
            let mut bytes = [0u8; 2];
            bytes[..chunk.len()].copy_from_slice(chunk);
            let received = self.exchange(u16::from_le_bytes(bytes)).to_le_bytes();
            let n = chunk.len();
            chunk.copy_from_slice(&received[..n]);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        while Spi::is_busy(self) {
            core::hint::spin_loop();
        }
        Ok(())
    }
}
