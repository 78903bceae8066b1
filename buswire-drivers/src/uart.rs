//! USART/UART engine
//!
//! Asynchronous serial with the same transfer contract as the SPI engine:
//! blocking [`Uart::send`] / [`Uart::receive`], and interrupt-driven
//! [`Uart::send_async`] / [`Uart::receive_async`] serviced by
//! [`Uart::on_interrupt`].
//!
//! The line is full duplex, so the two directions are armed
//! independently: a busy receiver never blocks a transmission.
//!
//! # Frames
//!
//! | word length | parity | data bits | bytes per unit |
//! |-------------|--------|-----------|----------------|
//! | 8           | none   | 8         | 1              |
//! | 8           | yes    | 7         | 1              |
//! | 9           | none   | 9         | 2              |
//! | 9           | yes    | 8         | 1              |

use core::convert::Infallible;

use buswire_core::clock::bus_clock;
use buswire_core::config::UartConfig;
use buswire_core::regs::usart;
use buswire_core::{Event, EventHandler, NoEvents, RxCursor, TransferState, TxCursor, UartInstance};
use buswire_hal::uart::{FlowControl, Parity, StopBits, WordLength};
use buswire_hal::{Field, InterruptController, RegisterAccess};

use crate::deadline::Cancellable;

/// BRR value for 16x oversampling, rounded to the nearest sixteenth
///
/// A zero baud rate yields 0.
pub const fn brr_value(pclk: u32, baud: u32) -> u32 {
    if baud == 0 {
        return 0;
    }
    (pclk + baud / 2) / baud
}

/// Handle binding one USART block to its configuration and transfer state
pub struct Uart<'a, R: RegisterAccess, E: EventHandler = NoEvents> {
    regs: R,
    instance: UartInstance,
    config: UartConfig,
    tx_state: TransferState,
    rx_state: TransferState,
    tx: TxCursor<'a>,
    rx: RxCursor<'a>,
    events: E,
}

impl<'a, R: RegisterAccess> Uart<'a, R> {
    /// Create a handle that discards transfer events
    pub fn new(regs: R, instance: UartInstance, config: UartConfig) -> Self {
        Self::with_events(regs, instance, config, NoEvents)
    }
}

impl<'a, R: RegisterAccess, E: EventHandler> Uart<'a, R, E> {
    /// Create a handle that reports transfer events to `events`
    pub fn with_events(regs: R, instance: UartInstance, config: UartConfig, events: E) -> Self {
        Self {
            regs,
            instance,
            config,
            tx_state: TransferState::Ready,
            rx_state: TransferState::Ready,
            tx: TxCursor::default(),
            rx: RxCursor::default(),
            events,
        }
    }

    pub fn instance(&self) -> UartInstance {
        self.instance
    }

    pub fn config(&self) -> &UartConfig {
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

    fn wait_for(&self, field: Field) {
        let sr = self.addr(usart::SR);
        while !self.regs.is_set(sr, field) {
            core::hint::spin_loop();
        }
    }

    fn unit_bytes(&self) -> usize {
        self.config.unit_bytes()
    }

    fn frame_mask(&self) -> u32 {
        if self.unit_bytes() == 2 {
            0x1FF
        } else {
            0xFF
        }
    }

    /// Gate the peripheral clock
    pub fn clock_control(&mut self, enable: bool) {
        self.instance.clock_gate().set(&self.regs, enable);
    }

    /// Enable the clock and program frame format, flow control and baud rate
    ///
    /// Leaves UE clear; call [`enable`](Self::enable) to start the block.
    /// Flow control is ignored on UART4/UART5, which have no RTS/CTS.
    pub fn init(&mut self) {
        self.clock_control(true);
        let c = self.config;

        let mut cr1 = 0;
        if c.direction.transmits() {
            cr1 |= usart::CR1_TE.mask();
        }
        if c.direction.receives() {
            cr1 |= usart::CR1_RE.mask();
        }
        if c.word_length == WordLength::Nine {
            cr1 |= usart::CR1_M.mask();
        }
        match c.parity {
            Parity::None => {}
            Parity::Even => cr1 |= usart::CR1_PCE.mask(),
            Parity::Odd => cr1 |= usart::CR1_PCE.mask() | usart::CR1_PS.mask(),
        }
        self.regs.write(self.addr(usart::CR1), cr1);

        let stop = match c.stop_bits {
            StopBits::One => 0,
            StopBits::Half => 1,
            StopBits::Two => 2,
            StopBits::OneAndHalf => 3,
        };
        self.regs
            .write_field(self.addr(usart::CR2), usart::CR2_STOP, stop);

        let (rts, cts) = match c.flow_control {
            _ if !self.instance.supports_flow_control() => (false, false),
            FlowControl::None => (false, false),
            FlowControl::Rts => (true, false),
            FlowControl::Cts => (false, true),
            FlowControl::RtsCts => (true, true),
        };
        let cr3 = self.addr(usart::CR3);
        self.regs.write_field(cr3, usart::CR3_RTSE, rts as u32);
        self.regs.write_field(cr3, usart::CR3_CTSE, cts as u32);

        let pclk = bus_clock(&self.regs, self.instance.bus());
        let brr = brr_value(pclk, c.baud);
        self.regs.write(self.addr(usart::BRR), brr);

        #[cfg(feature = "defmt")]
        defmt::trace!(
            "{} init: {=u32} baud, pclk={=u32} BRR={=u32:#x}",
            self.instance,
            c.baud,
            pclk,
            brr
        );
    }

    /// Reset every register of the block and forget any armed transfer
    pub fn deinit(&mut self) {
        self.instance.reset_line().pulse(&self.regs);
        self.tx = TxCursor::default();
        self.rx = RxCursor::default();
        self.tx_state = TransferState::Ready;
        self.rx_state = TransferState::Ready;
    }

    pub fn enable(&mut self) {
        self.regs.set_bits(self.addr(usart::CR1), usart::CR1_UE.mask());
    }

    pub fn disable(&mut self) {
        self.regs
            .clear_bits(self.addr(usart::CR1), usart::CR1_UE.mask());
    }

    /// Route the block's interrupt line through `nvic` at `priority`
    pub fn enable_interrupts<C: InterruptController>(&self, nvic: &mut C, priority: u8) {
        let irq = self.instance.irq();
        nvic.set_priority(irq, priority);
        nvic.enable(irq);
    }

    /// Send `data` and wait until the last frame has left the shifter
    pub fn send(&mut self, data: &[u8]) {
        let unit = self.unit_bytes();
        let mask = self.frame_mask();
        let dr = self.addr(usart::DR);
        let mut tx = TxCursor::new(data);
        while let Some(word) = tx.next_unit(unit) {
            self.wait_for(usart::SR_TXE);
            self.regs.write(dr, word as u32 & mask);
        }
        self.wait_for(usart::SR_TC);
    }

    /// Fill `buf` with received data, parity bits stripped
    pub fn receive(&mut self, buf: &mut [u8]) {
        let unit = self.unit_bytes();
        let mut rx = RxCursor::new(buf);
        while !rx.is_empty() {
            let word = self.read_unit();
            rx.put_unit(word, unit);
        }
    }

    fn read_unit(&mut self) -> u16 {
        self.wait_for(usart::SR_RXNE);
        (self.regs.read(self.addr(usart::DR)) as u16) & self.config.data_mask()
    }

    /// Start sending `data` from the interrupt handler
    ///
    /// Returns the transmit state observed on entry; anything but
    /// [`TransferState::Ready`] means nothing was armed.
    pub fn send_async(&mut self, data: &'a [u8]) -> TransferState {
        let state = self.tx_state;
        if state.is_ready() {
            self.tx = TxCursor::new(data);
            self.tx_state = TransferState::BusyTx;
            self.regs
                .set_bits(self.addr(usart::CR1), usart::CR1_TXEIE.mask());
        }
        state
    }

    /// Start filling `buf` from the interrupt handler
    ///
    /// Also enables the error sources. Same return contract as
    /// [`send_async`](Self::send_async) for the receive state.
    pub fn receive_async(&mut self, buf: &'a mut [u8]) -> TransferState {
        let state = self.rx_state;
        if state.is_ready() {
            self.rx = RxCursor::new(buf);
            self.rx_state = TransferState::BusyRx;
            let mut cr1 = usart::CR1_RXNEIE.mask();
            if self.config.parity != Parity::None {
                cr1 |= usart::CR1_PEIE.mask();
            }
            self.regs.set_bits(self.addr(usart::CR1), cr1);
            self.regs
                .set_bits(self.addr(usart::CR3), usart::CR3_EIE.mask());
        }
        state
    }

    /// Service the USART interrupt
    ///
    /// Handles the first pending enabled source in the order receive,
    /// transmit, transmission complete, line errors. Errors flagged
    /// together with a received unit are reported with it, since reading
    /// the unit clears them.
    pub fn on_interrupt(&mut self) {
        let sr = self.regs.read(self.addr(usart::SR));
        let cr1 = self.regs.read(self.addr(usart::CR1));
        let pending = |flag: Field, enable: Field| sr & flag.mask() != 0 && cr1 & enable.mask() != 0;

        if pending(usart::SR_RXNE, usart::CR1_RXNEIE) {
            self.report_errors(sr);
            self.receive_unit();
        } else if pending(usart::SR_TXE, usart::CR1_TXEIE) {
            self.transmit_unit();
        } else if pending(usart::SR_TC, usart::CR1_TCIE) {
            self.close_send();
            self.events.on_event(Event::TxComplete);
        } else if self.report_errors(sr) {
            // SR then DR clears the error flags
            self.regs.read(self.addr(usart::DR));
        }
    }

    /// Report every enabled error flag in `sr`; true if any was reported
    fn report_errors(&mut self, sr: u32) -> bool {
        let cr1 = self.regs.read(self.addr(usart::CR1));
        let eie = self.regs.is_set(self.addr(usart::CR3), usart::CR3_EIE);
        let set = |field: Field| sr & field.mask() != 0;
        let sources = [
            (
                usart::SR_ORE,
                cr1 & usart::CR1_RXNEIE.mask() != 0 || eie,
                Event::Overrun,
            ),
            (usart::SR_FE, eie, Event::Framing),
            (usart::SR_NF, eie, Event::Noise),
            (
                usart::SR_PE,
                cr1 & usart::CR1_PEIE.mask() != 0,
                Event::Parity,
            ),
        ];

        let mut reported = false;
        for (flag, enabled, event) in sources {
            if enabled && set(flag) {
                self.events.on_event(event);
                reported = true;
            }
        }
        reported
    }

    fn transmit_unit(&mut self) {
        if let Some(word) = self.tx.next_unit(self.unit_bytes()) {
            let mask = self.frame_mask();
            self.regs.write(self.addr(usart::DR), word as u32 & mask);
        }
        if self.tx.is_empty() {
            // Last unit queued; complete once it has left the shifter
            let cr1 = self.addr(usart::CR1);
            self.regs.modify(cr1, |v| {
                (v & !usart::CR1_TXEIE.mask()) | usart::CR1_TCIE.mask()
            });
        }
    }

    fn receive_unit(&mut self) {
        let word = (self.regs.read(self.addr(usart::DR)) as u16) & self.config.data_mask();
        self.rx.put_unit(word, self.unit_bytes());
        if self.rx.is_empty() {
            self.close_receive();
            self.events.on_event(Event::RxComplete);
        }
    }

    /// Abort an armed transmission without reporting completion
    pub fn close_send(&mut self) {
        self.regs.clear_bits(
            self.addr(usart::CR1),
            usart::CR1_TXEIE.mask() | usart::CR1_TCIE.mask(),
        );
        self.tx = TxCursor::default();
        self.tx_state = TransferState::Ready;
    }

    /// Abort an armed reception without reporting completion
    pub fn close_receive(&mut self) {
        self.regs.clear_bits(
            self.addr(usart::CR1),
            usart::CR1_RXNEIE.mask() | usart::CR1_PEIE.mask(),
        );
        self.regs
            .clear_bits(self.addr(usart::CR3), usart::CR3_EIE.mask());
        self.rx = RxCursor::default();
        self.rx_state = TransferState::Ready;
    }
}

impl<R: RegisterAccess, E: EventHandler> Cancellable for Uart<'_, R, E> {
    fn is_idle(&self) -> bool {
        self.tx_state.is_ready() && self.rx_state.is_ready()
    }

    fn cancel(&mut self) {
        self.close_send();
        self.close_receive();
    }
}

impl<R: RegisterAccess, E: EventHandler> buswire_hal::UartTx for Uart<'_, R, E> {
    type Error = Infallible;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.send(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.wait_for(usart::SR_TC);
        Ok(())
    }
}

impl<R: RegisterAccess, E: EventHandler> buswire_hal::UartRx for Uart<'_, R, E> {
    type Error = Infallible;

    fn read_blocking(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.receive(buf);
        Ok(buf.len())
    }
}

impl<R: RegisterAccess, E: EventHandler> embedded_io::ErrorType for Uart<'_, R, E> {
    type Error = Infallible;
}

impl<R: RegisterAccess, E: EventHandler> embedded_io::Write for Uart<'_, R, E> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.send(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.wait_for(usart::SR_TC);
        Ok(())
    }
}

impl<R: RegisterAccess, E: EventHandler> embedded_io::Read for Uart<'_, R, E> {
    /// Block for the first unit, then take whatever else is already waiting
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        let unit = self.unit_bytes();
        let total = buf.len();
        let mut rx = RxCursor::new(buf);
        let first = self.read_unit();
        rx.put_unit(first, unit);
        let sr = self.addr(usart::SR);
        while !rx.is_empty() && self.regs.is_set(sr, usart::SR_RXNE) {
            let word = self.read_unit();
            rx.put_unit(word, unit);
        }
        Ok(total - rx.remaining())
    }
}

impl<R: RegisterAccess, E: EventHandler> embedded_io::ReadReady for Uart<'_, R, E> {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs.is_set(self.addr(usart::SR), usart::SR_RXNE))
    }
}

impl<R: RegisterAccess, E: EventHandler> embedded_io::WriteReady for Uart<'_, R, E> {
    fn write_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(self.regs.is_set(self.addr(usart::SR), usart::SR_TXE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buswire_core::regs::rcc;
    use buswire_core::sim::{EventLog, SimUsart};
    use buswire_hal::mock::MockRegisters;
    use buswire_hal::uart::Direction;
    use proptest::prelude::*;
    use std::vec;

    const INSTANCE: UartInstance = UartInstance::Usart2;

    fn bench(sim: &SimUsart, instance: UartInstance) -> MockRegisters {
        let mut regs = MockRegisters::new();
        sim.attach(&mut regs, instance.base());
        regs
    }

    fn pump<R: RegisterAccess, E: EventHandler>(uart: &mut Uart<'_, R, E>, sim: &SimUsart) {
        let mut dispatches = 0;
        while sim.irq_pending() && dispatches < 64 {
            uart.on_interrupt();
            dispatches += 1;
        }
    }

    #[test]
    fn test_brr_rounding() {
        assert_eq!(brr_value(16_000_000, 115_200), 0x8B);
        assert_eq!(brr_value(16_000_000, 9600), 0x683);
        assert_eq!(brr_value(42_000_000, 115_200), 365);
        assert_eq!(brr_value(16_000_000, 0), 0);
    }

    #[test]
    fn test_init_frame_format() {
        let sim = SimUsart::new();
        let regs = bench(&sim, INSTANCE);
        let config = UartConfig {
            word_length: WordLength::Nine,
            parity: Parity::Odd,
            stop_bits: StopBits::Two,
            flow_control: FlowControl::RtsCts,
            ..UartConfig::DEFAULT
        };
        let mut uart = Uart::new(&regs, INSTANCE, config);
        uart.init();

        let cr1 = usart::CR1_TE.mask()
            | usart::CR1_RE.mask()
            | usart::CR1_M.mask()
            | usart::CR1_PCE.mask()
            | usart::CR1_PS.mask();
        assert_eq!(sim.cr1(), cr1);
        assert_eq!(sim.cr2(), 2 << 12);
        assert_eq!(sim.cr3(), usart::CR3_RTSE.mask() | usart::CR3_CTSE.mask());
        assert_eq!(sim.brr(), 0x8B);
        assert_eq!(regs.peek(rcc::BASE + rcc::APB1ENR), 1 << 17);
    }

    #[test]
    fn test_init_rx_only_on_apb2() {
        let sim = SimUsart::new();
        let instance = UartInstance::Usart1;
        let regs = bench(&sim, instance);
        // HSE, APB2 /2
        regs.set(
            rcc::BASE + rcc::CFGR,
            rcc::CFGR_SWS.insert(0, 1) | rcc::CFGR_PPRE2.insert(0, 4),
        );
        let config = UartConfig {
            direction: Direction::Rx,
            ..UartConfig::DEFAULT.with_baud(9600)
        };
        let mut uart = Uart::new(&regs, instance, config);
        uart.init();

        assert_eq!(sim.cr1(), usart::CR1_RE.mask());
        assert_eq!(sim.brr(), brr_value(4_000_000, 9600));
        assert_eq!(regs.peek(rcc::BASE + rcc::APB2ENR), 1 << 4);
    }

    #[test]
    fn test_uart4_ignores_flow_control() {
        let sim = SimUsart::new();
        let instance = UartInstance::Uart4;
        let regs = bench(&sim, instance);
        let config = UartConfig {
            flow_control: FlowControl::Rts,
            ..UartConfig::DEFAULT
        };
        Uart::new(&regs, instance, config).init();
        assert_eq!(sim.cr3(), 0);
    }

    #[test]
    fn test_send_waits_for_tc() {
        let sim = SimUsart::new();
        let regs = bench(&sim, INSTANCE);
        let mut uart = Uart::new(&regs, INSTANCE, UartConfig::default());

        uart.send(b"ok");
        assert_eq!(sim.sent(), vec![b'o' as u16, b'k' as u16]);
        let last = regs.log().last().copied().unwrap();
        assert!(last.is_read());
        assert_eq!(last.addr(), INSTANCE.base() + usart::SR);
    }

    #[test]
    fn test_nine_bit_units() {
        let sim = SimUsart::loopback();
        let regs = bench(&sim, INSTANCE);
        let config = UartConfig {
            word_length: WordLength::Nine,
            ..UartConfig::DEFAULT
        };
        let mut uart = Uart::new(&regs, INSTANCE, config);

        uart.send(&[0xFF, 0x01, 0x23, 0xFE]);
        // High bits beyond the ninth are dropped
        assert_eq!(sim.sent(), vec![0x1FF, 0x0023]);

        let mut buf = [0u8; 4];
        uart.receive(&mut buf);
        assert_eq!(buf, [0xFF, 0x01, 0x23, 0x00]);
    }

    #[test]
    fn test_receive_strips_parity_bit() {
        let sim = SimUsart::new();
        let regs = bench(&sim, INSTANCE);
        let config = UartConfig {
            parity: Parity::Even,
            ..UartConfig::DEFAULT
        };
        let mut uart = Uart::new(&regs, INSTANCE, config);

        sim.push_rx(0xC1);
        let mut buf = [0u8; 1];
        uart.receive(&mut buf);
        assert_eq!(buf, [0x41]);
    }

    #[test]
    fn test_send_async_completes_on_tc() {
        let sim = SimUsart::new();
        let regs = bench(&sim, INSTANCE);
        let log = EventLog::new();
        let mut uart = Uart::with_events(&regs, INSTANCE, UartConfig::default(), log.clone());

        assert_eq!(uart.send_async(b"abc"), TransferState::Ready);
        uart.on_interrupt();
        assert_eq!(sim.sent().len(), 1);

        pump(&mut uart, &sim);
        assert_eq!(sim.sent(), vec![b'a' as u16, b'b' as u16, b'c' as u16]);
        assert_eq!(uart.tx_state(), TransferState::Ready);
        assert_eq!(log.events(), vec![Event::TxComplete]);
        assert_eq!(sim.cr1() & (usart::CR1_TXEIE.mask() | usart::CR1_TCIE.mask()), 0);
    }

    #[test]
    fn test_directions_are_independent() {
        let sim = SimUsart::new();
        let regs = bench(&sim, INSTANCE);
        let mut buf = [0u8; 2];
        let mut uart = Uart::new(&regs, INSTANCE, UartConfig::default());

        assert_eq!(uart.receive_async(&mut buf), TransferState::Ready);
        assert_eq!(uart.send_async(b"x"), TransferState::Ready);
        assert_eq!(uart.send_async(b"y"), TransferState::BusyTx);
        let mut other = [0u8; 1];
        assert_eq!(uart.receive_async(&mut other), TransferState::BusyRx);
    }

    #[test]
    fn test_framing_error_reported_and_cleared() {
        let sim = SimUsart::new();
        let regs = bench(&sim, INSTANCE);
        let log = EventLog::new();
        let mut buf = [0u8; 1];
        let mut uart = Uart::with_events(&regs, INSTANCE, UartConfig::default(), log.clone());

        uart.receive_async(&mut buf);
        sim.raise(usart::SR_FE.mask());
        assert!(sim.irq_pending());
        uart.on_interrupt();

        assert_eq!(log.events(), vec![Event::Framing]);
        assert_eq!(sim.errors(), 0);
        assert_eq!(uart.rx_state(), TransferState::BusyRx);
    }

    #[test]
    fn test_overrun_reported_with_data() {
        let sim = SimUsart::new();
        let regs = bench(&sim, INSTANCE);
        let log = EventLog::new();
        let mut buf = [0u8; 1];
        {
            let mut uart =
                Uart::with_events(&regs, INSTANCE, UartConfig::default(), log.clone());
            uart.receive_async(&mut buf);
            sim.push_rx(0x33);
            sim.raise(usart::SR_ORE.mask());
            pump(&mut uart, &sim);
        }
        assert_eq!(buf, [0x33]);
        assert_eq!(log.events(), vec![Event::Overrun, Event::RxComplete]);
        assert_eq!(sim.cr3(), 0);
    }

    #[test]
    fn test_embedded_io_roundtrip() {
        use embedded_io::{Read, ReadReady, Write};

        let sim = SimUsart::loopback();
        let regs = bench(&sim, INSTANCE);
        let mut uart = Uart::new(&regs, INSTANCE, UartConfig::default());

        assert!(!uart.read_ready().unwrap());
        assert_eq!(uart.write(b"ping").unwrap(), 4);
        assert!(uart.read_ready().unwrap());
        uart.flush().unwrap();
        let mut buf = [0u8; 8];
        let n = uart.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    proptest! {
        #[test]
        fn prop_brr_rounds_to_nearest(pclk in 1_000_000u32..=84_000_000, baud in 1_200u32..=921_600) {
            let brr = brr_value(pclk, baud) as u64;
            let (pclk, baud) = (pclk as u64, baud as u64);
            // |brr * baud - pclk| never exceeds half a baud step
            prop_assert!((brr * baud).abs_diff(pclk) * 2 <= baud);
        }
    }
}
