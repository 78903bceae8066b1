//! I2C master engine
//!
//! Implements the master side of the bus protocol on one I2C block:
//!
//! ```text
//!   Idle ─▶ StartSent ─▶ AddressSent ─▶ Transmitting ─┐
//!                                   └─▶ Receiving ────┴─▶ StopSent ─▶ Idle
//! ```
//!
//! # Last-byte handling
//!
//! The receiver acknowledges each byte as soon as it has been shifted in,
//! before software reads it. To NACK the final byte, ACK must already be
//! clear when that byte arrives, and STOP must be requested before it is
//! read:
//!
//! - one byte: clear ACK before clearing ADDR, then request STOP, then read
//! - N bytes: once exactly one byte remains, clear ACK and request STOP,
//!   then read it
//!
//! ACK returns to the configured value after every reception.
//!
//! # Clock programming
//!
//! `init` derives the APB1 clock from the clock authority and programs
//! FREQ, CCR and TRISE from it. These are only ever written there, never
//! during a transfer.

use core::convert::Infallible;

use buswire_core::clock::bus_clock;
use buswire_core::config::I2cConfig;
use buswire_core::regs::i2c;
use buswire_core::{Event, EventHandler, I2cInstance, NoEvents, RxCursor, TransferState, TxCursor};
use buswire_hal::i2c::{FastDuty, I2cSpeed, Stop};
use buswire_hal::{Field, InterruptController, RegisterAccess};

use crate::deadline::Cancellable;

/// Where the engine is in the current master transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cPhase {
    #[default]
    Idle,
    StartSent,
    AddressSent,
    Transmitting,
    Receiving,
    /// STOP requested; a reception still has its last byte to collect
    StopSent,
}

/// CCR value for `pclk` Hz, including the F/S and DUTY bits
///
/// The divisor is truncated to the 12-bit field.
pub fn ccr_value(pclk: u32, speed: I2cSpeed, duty: FastDuty) -> u32 {
    match speed {
        I2cSpeed::Standard => i2c::CCR_CCR.insert(0, pclk / (2 * speed.frequency())),
        I2cSpeed::Fast => {
            let (divisor, duty_bit) = match duty {
                FastDuty::Two => (3, 0),
                FastDuty::SixteenNine => (25, i2c::CCR_DUTY.mask()),
            };
            i2c::CCR_CCR.insert(0, pclk / (divisor * speed.frequency()))
                | i2c::CCR_FS.mask()
                | duty_bit
        }
    }
}

/// TRISE value: maximum rise time in bus clock cycles, plus one
///
/// Truncated to the 6-bit field.
pub fn trise_value(pclk: u32, speed: I2cSpeed) -> u32 {
    let cycles = (pclk as u64 * speed.max_rise_time_ns() as u64 / 1_000_000_000) as u32;
    i2c::TRISE_TRISE.insert(0, cycles + 1)
}

/// Handle binding one I2C block to its configuration and transfer state
pub struct I2c<'a, R: RegisterAccess, E: EventHandler = NoEvents> {
    regs: R,
    instance: I2cInstance,
    config: I2cConfig,
    state: TransferState,
    phase: I2cPhase,
    address: u8,
    tx: TxCursor<'a>,
    rx: RxCursor<'a>,
    events: E,
}

impl<'a, R: RegisterAccess> I2c<'a, R> {
    /// Create a handle that discards transfer events
    pub fn new(regs: R, instance: I2cInstance, config: I2cConfig) -> Self {
        Self::with_events(regs, instance, config, NoEvents)
    }
}

impl<'a, R: RegisterAccess, E: EventHandler> I2c<'a, R, E> {
    /// Create a handle that reports transfer events to `events`
    pub fn with_events(regs: R, instance: I2cInstance, config: I2cConfig, events: E) -> Self {
        Self {
            regs,
            instance,
            config,
            state: TransferState::Ready,
            phase: I2cPhase::Idle,
            address: 0,
            tx: TxCursor::default(),
            rx: RxCursor::default(),
            events,
        }
    }

    pub fn instance(&self) -> I2cInstance {
        self.instance
    }

    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut E {
        &mut self.events
    }

    /// Interrupt-driven transfer state; never busy in both directions
    pub fn state(&self) -> TransferState {
        self.state
    }

    pub fn phase(&self) -> I2cPhase {
        self.phase
    }

    fn addr(&self, offset: u32) -> u32 {
        self.instance.base() + offset
    }

    fn wait_for(&self, field: Field) {
        let sr1 = self.addr(i2c::SR1);
        while !self.regs.is_set(sr1, field) {
            core::hint::spin_loop();
        }
    }

    /// Gate the peripheral clock
    pub fn clock_control(&mut self, enable: bool) {
        self.instance.clock_gate().set(&self.regs, enable);
    }

    /// Enable the clock and program ACK, FREQ, own address, CCR and TRISE
    pub fn init(&mut self) {
        self.clock_control(true);

        let pclk = bus_clock(&self.regs, self.instance.bus());
        let c = self.config;

        self.regs
            .write_field(self.addr(i2c::CR1), i2c::CR1_ACK, c.ack as u32);
        self.regs
            .write_field(self.addr(i2c::CR2), i2c::CR2_FREQ, pclk / 1_000_000);
        let oar1 = i2c::OAR1_ADD7.insert(i2c::OAR1_KEEP.mask(), c.own_address as u32);
        self.regs.write(self.addr(i2c::OAR1), oar1);
        let ccr = ccr_value(pclk, c.speed, c.duty);
        self.regs.write(self.addr(i2c::CCR), ccr);
        let trise = trise_value(pclk, c.speed);
        self.regs.write(self.addr(i2c::TRISE), trise);

        #[cfg(feature = "defmt")]
        defmt::trace!(
            "{} init: pclk={=u32} CCR={=u32:#x} TRISE={=u32}",
            self.instance,
            pclk,
            ccr,
            trise
        );
    }

    /// Reset every register of the block and forget any armed transfer
    pub fn deinit(&mut self) {
        self.instance.reset_line().pulse(&self.regs);
        self.tx = TxCursor::default();
        self.rx = RxCursor::default();
        self.state = TransferState::Ready;
        self.phase = I2cPhase::Idle;
    }

    pub fn enable(&mut self) {
        self.regs.set_bits(self.addr(i2c::CR1), i2c::CR1_PE.mask());
    }

    pub fn disable(&mut self) {
        self.regs.clear_bits(self.addr(i2c::CR1), i2c::CR1_PE.mask());
    }

    /// Acknowledge (or not) the next received byte
    pub fn set_ack(&mut self, enable: bool) {
        self.regs
            .write_field(self.addr(i2c::CR1), i2c::CR1_ACK, enable as u32);
    }

    /// Request a STOP condition after the current byte
    pub fn generate_stop(&mut self) {
        self.regs.set_bits(self.addr(i2c::CR1), i2c::CR1_STOP.mask());
        self.phase = I2cPhase::StopSent;
    }

    fn generate_start(&mut self) {
        self.regs.set_bits(self.addr(i2c::CR1), i2c::CR1_START.mask());
        self.phase = I2cPhase::StartSent;
    }

    /// SR1 then SR2
    fn clear_addr(&mut self) {
        self.regs.read(self.addr(i2c::SR1));
        self.regs.read(self.addr(i2c::SR2));
    }

    /// Another master or this one still holds the bus
    pub fn is_bus_busy(&self) -> bool {
        self.regs.is_set(self.addr(i2c::SR2), i2c::SR2_BUSY)
    }

    /// Route the event and error interrupt lines through `nvic` at `priority`
    pub fn enable_interrupts<C: InterruptController>(&self, nvic: &mut C, priority: u8) {
        for irq in [self.instance.event_irq(), self.instance.error_irq()] {
            nvic.set_priority(irq, priority);
            nvic.enable(irq);
        }
    }

    /// START, address, wait for the slave to acknowledge
    fn address_slave(&mut self, address: u8, read: bool) {
        self.generate_start();
        self.wait_for(i2c::SR1_SB);
        self.regs
            .write(self.addr(i2c::DR), (address as u32) << 1 | read as u32);
        self.phase = I2cPhase::AddressSent;
        self.wait_for(i2c::SR1_ADDR);
    }

    /// Send `data` to the 7-bit `address` and release the bus
    pub fn master_send(&mut self, data: &[u8], address: u8) {
        self.master_send_with(data, address, Stop::Generate);
    }

    /// Send `data` to the 7-bit `address`
    ///
    /// With [`Stop::Hold`] the bus stays owned so the next transfer starts
    /// with a repeated START.
    pub fn master_send_with(&mut self, data: &[u8], address: u8, stop: Stop) {
        self.address_slave(address, false);
        self.clear_addr();
        self.phase = I2cPhase::Transmitting;

        let dr = self.addr(i2c::DR);
        for &byte in data {
            self.wait_for(i2c::SR1_TXE);
            self.regs.write(dr, byte as u32);
        }

        if !data.is_empty() {
            let sr1 = self.addr(i2c::SR1);
            let done = i2c::SR1_TXE.mask() | i2c::SR1_BTF.mask();
            while self.regs.read(sr1) & done != done {
                core::hint::spin_loop();
            }
        }

        if stop == Stop::Generate {
            self.generate_stop();
            self.phase = I2cPhase::Idle;
        }
    }

    /// Fill `buf` from the 7-bit `address` and release the bus
    pub fn master_receive(&mut self, buf: &mut [u8], address: u8) {
        self.master_receive_with(buf, address, Stop::Generate);
    }

    /// Fill `buf` from the 7-bit `address`
    ///
    /// The last byte is always NACKed. With [`Stop::Hold`] no STOP is
    /// requested and the caller continues with a repeated START. An empty
    /// buffer touches no register.
    pub fn master_receive_with(&mut self, buf: &mut [u8], address: u8, stop: Stop) {
        let len = buf.len();
        if len == 0 {
            return;
        }
        if len > 1 {
            self.set_ack(true);
        }

        self.address_slave(address, true);

        let dr = self.addr(i2c::DR);
        if len == 1 {
            self.set_ack(false);
            self.clear_addr();
            self.phase = I2cPhase::Receiving;
            self.end_reception(stop);
            self.wait_for(i2c::SR1_RXNE);
            buf[0] = self.regs.read(dr) as u8;
        } else {
            self.clear_addr();
            self.phase = I2cPhase::Receiving;
            for (i, slot) in buf.iter_mut().enumerate() {
                if len - i == 1 {
                    self.set_ack(false);
                    self.end_reception(stop);
                }
                self.wait_for(i2c::SR1_RXNE);
                *slot = self.regs.read(dr) as u8;
            }
        }

        self.set_ack(self.config.ack);
        self.phase = I2cPhase::Idle;
    }

    fn end_reception(&mut self, stop: Stop) {
        if stop == Stop::Generate {
            self.generate_stop();
        }
    }

    /// Write then read with a repeated START in between
    pub fn write_read(&mut self, address: u8, write: &[u8], read: &mut [u8]) {
        self.master_send_with(write, address, Stop::Hold);
        self.master_receive(read, address);
    }

    fn enable_sources(&mut self) {
        let mask = i2c::CR2_ITEVTEN.mask() | i2c::CR2_ITBUFEN.mask() | i2c::CR2_ITERREN.mask();
        self.regs.set_bits(self.addr(i2c::CR2), mask);
    }

    fn disable_sources(&mut self) {
        let mask = i2c::CR2_ITEVTEN.mask() | i2c::CR2_ITBUFEN.mask() | i2c::CR2_ITERREN.mask();
        self.regs.clear_bits(self.addr(i2c::CR2), mask);
    }

    /// Start sending `data` to `address` from the interrupt handlers
    ///
    /// Returns the state observed on entry; anything but
    /// [`TransferState::Ready`] means nothing was armed.
    pub fn master_send_async(&mut self, data: &'a [u8], address: u8) -> TransferState {
        let state = self.state;
        if state.is_ready() {
            self.tx = TxCursor::new(data);
            self.address = address;
            self.state = TransferState::BusyTx;
            self.enable_sources();
            self.generate_start();
        }
        state
    }

    /// Start filling `buf` from `address` from the interrupt handlers
    ///
    /// Same return contract as
    /// [`master_send_async`](Self::master_send_async). An empty buffer is
    /// accepted and completes at once: [`Event::RxComplete`] fires before
    /// this returns and the bus is left untouched.
    pub fn master_receive_async(&mut self, buf: &'a mut [u8], address: u8) -> TransferState {
        let state = self.state;
        if state.is_ready() && buf.is_empty() {
            self.events.on_event(Event::RxComplete);
        } else if state.is_ready() {
            if buf.len() > 1 {
                self.set_ack(true);
            }
            self.rx = RxCursor::new(buf);
            self.address = address;
            self.state = TransferState::BusyRx;
            self.enable_sources();
            self.generate_start();
        }
        state
    }

    /// Service the event interrupt
    ///
    /// Advances the transaction by one step: START sent, address
    /// acknowledged, one byte moved, or the final byte transfer finished.
    pub fn on_event_interrupt(&mut self) {
        let sr1 = self.regs.read(self.addr(i2c::SR1));
        let has = |field: Field| sr1 & field.mask() != 0;

        if has(i2c::SR1_SB) {
            let read = self.state == TransferState::BusyRx;
            self.regs
                .write(self.addr(i2c::DR), (self.address as u32) << 1 | read as u32);
            self.phase = I2cPhase::AddressSent;
        } else if has(i2c::SR1_ADDR) {
            self.on_address_acked();
        } else if self.state == TransferState::BusyTx {
            if has(i2c::SR1_BTF) && self.tx.is_empty() {
                self.finish_send();
            } else if has(i2c::SR1_TXE) {
                if let Some(byte) = self.tx.next_unit(1) {
                    self.regs.write(self.addr(i2c::DR), byte as u32);
                }
                if self.tx.is_empty() {
                    // Wait for BTF only
                    self.regs
                        .clear_bits(self.addr(i2c::CR2), i2c::CR2_ITBUFEN.mask());
                }
            }
        } else if self.state == TransferState::BusyRx && has(i2c::SR1_RXNE) {
            let byte = self.regs.read(self.addr(i2c::DR)) as u16;
            self.rx.put_unit(byte, 1);
            match self.rx.remaining() {
                0 => self.finish_receive(),
                1 => {
                    self.set_ack(false);
                    self.stop_and_report();
                }
                _ => {}
            }
        }
    }

    fn on_address_acked(&mut self) {
        match self.state {
            TransferState::BusyRx if self.rx.remaining() == 1 => {
                self.set_ack(false);
                self.regs.read(self.addr(i2c::SR2));
                self.phase = I2cPhase::Receiving;
                self.stop_and_report();
            }
            TransferState::BusyRx => {
                self.regs.read(self.addr(i2c::SR2));
                self.phase = I2cPhase::Receiving;
            }
            TransferState::BusyTx => {
                self.regs.read(self.addr(i2c::SR2));
                self.phase = I2cPhase::Transmitting;
                // Address-only write
                if self.tx.is_empty() {
                    self.finish_send();
                }
            }
            TransferState::Ready => {
                self.regs.read(self.addr(i2c::SR2));
            }
        }
    }

    fn stop_and_report(&mut self) {
        self.generate_stop();
        self.events.on_event(Event::Stop);
    }

    fn finish_send(&mut self) {
        self.stop_and_report();
        self.close_send();
        self.events.on_event(Event::TxComplete);
    }

    fn finish_receive(&mut self) {
        self.close_receive();
        self.events.on_event(Event::RxComplete);
    }

    /// Service the error interrupt
    ///
    /// Clears every raised error flag and reports it. The transfer is left
    /// as it is; recovery belongs to the caller.
    pub fn on_error_interrupt(&mut self) {
        const ERRORS: [(Field, Event); 5] = [
            (i2c::SR1_BERR, Event::BusError),
            (i2c::SR1_ARLO, Event::ArbitrationLost),
            (i2c::SR1_AF, Event::AckFailure),
            (i2c::SR1_OVR, Event::Overrun),
            (i2c::SR1_TIMEOUT, Event::Timeout),
        ];

        let sr1_addr = self.addr(i2c::SR1);
        let sr1 = self.regs.read(sr1_addr);
        for (field, event) in ERRORS {
            if sr1 & field.mask() != 0 {
                // rc_w0
                self.regs.write(sr1_addr, !field.mask() & 0xFFFF);
                self.events.on_event(event);
            }
        }
    }

    /// Abort an armed transmission without reporting completion
    pub fn close_send(&mut self) {
        self.disable_sources();
        self.tx = TxCursor::default();
        self.state = TransferState::Ready;
        self.phase = I2cPhase::Idle;
    }

    /// Abort an armed reception without reporting completion
    pub fn close_receive(&mut self) {
        self.disable_sources();
        self.set_ack(self.config.ack);
        self.rx = RxCursor::default();
        self.state = TransferState::Ready;
        self.phase = I2cPhase::Idle;
    }
}

impl<R: RegisterAccess, E: EventHandler> Cancellable for I2c<'_, R, E> {
    fn is_idle(&self) -> bool {
        self.state.is_ready()
    }

    /// Release the bus and drop the armed transfer
    fn cancel(&mut self) {
        match self.state {
            TransferState::BusyTx => {
                self.generate_stop();
                self.close_send();
            }
            TransferState::BusyRx => {
                self.generate_stop();
                self.close_receive();
            }
            TransferState::Ready => {}
        }
    }
}

impl<R: RegisterAccess, E: EventHandler> buswire_hal::I2cBus for I2c<'_, R, E> {
    type Error = Infallible;

    fn write(&mut self, address: u8, data: &[u8]) -> Result<(), Self::Error> {
        self.master_send(data, address);
        Ok(())
    }

    fn read(&mut self, address: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.master_receive(buf, address);
        Ok(())
    }

    fn write_read(
        &mut self,
        address: u8,
        write_data: &[u8],
        read_buf: &mut [u8],
    ) -> Result<(), Self::Error> {
        I2c::write_read(self, address, write_data, read_buf);
        Ok(())
    }
}
