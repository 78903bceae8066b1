//! I2C master block model with slave devices on the bus

use core::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::vec::Vec;

use buswire_hal::mock::{MockPeripheral, MockRegisters};

use super::WINDOW;
use crate::regs::i2c;

/// Bus-level record of what the master did, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// START or repeated START
    Start,
    /// Address byte; `acked` is false when no device answered
    Address { address: u8, read: bool, acked: bool },
    /// Data byte sent to the slave
    Write(u8),
    /// Data byte taken from DR; `acked` is the ACK bit when it was read
    Read { byte: u8, acked: bool },
    /// CR1.ACK went from set to clear
    AckDisabled,
    /// STOP requested
    Stop,
}

#[derive(Debug)]
struct Device {
    address: u8,
    response: VecDeque<u8>,
    received: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Start,
    Addressed {
        read: bool,
    },
    Transmit,
    Receive,
}

const ERROR_MASK: u32 = i2c::SR1_BERR.mask()
    | i2c::SR1_ARLO.mask()
    | i2c::SR1_AF.mask()
    | i2c::SR1_OVR.mask()
    | i2c::SR1_TIMEOUT.mask();

#[derive(Debug, Default)]
struct State {
    cr1: u32,
    cr2: u32,
    oar1: u32,
    ccr: u32,
    trise: u32,
    errors: u32,
    phase: Phase,
    sb: bool,
    addr: bool,
    addr_sr1_seen: bool,
    btf: bool,
    rx_byte: Option<u8>,
    stop_pending: bool,
    target: Option<usize>,
    devices: Vec<Device>,
    transcript: Vec<BusEvent>,
}

impl State {
    fn sr1(&self) -> u32 {
        let mut sr1 = self.errors;
        if self.sb {
            sr1 |= i2c::SR1_SB.mask();
        }
        if self.addr {
            sr1 |= i2c::SR1_ADDR.mask();
        }
        if self.phase == Phase::Transmit {
            sr1 |= i2c::SR1_TXE.mask();
            if self.btf {
                sr1 |= i2c::SR1_BTF.mask();
            }
        }
        if self.phase == Phase::Receive && self.rx_byte.is_some() {
            sr1 |= i2c::SR1_RXNE.mask();
        }
        sr1
    }

    fn sr2(&self) -> u32 {
        let mut sr2 = 0;
        if self.phase != Phase::Idle {
            sr2 |= i2c::SR2_MSL.mask() | i2c::SR2_BUSY.mask();
        }
        if matches!(
            self.phase,
            Phase::Transmit | Phase::Addressed { read: false }
        ) {
            sr2 |= i2c::SR2_TRA.mask();
        }
        sr2
    }

    fn ack(&self) -> bool {
        self.cr1 & i2c::CR1_ACK.mask() != 0
    }

    fn load_rx(&mut self) {
        let byte = self
            .target
            .and_then(|t| self.devices.get_mut(t))
            .and_then(|d| d.response.pop_front())
            .unwrap_or(0xFF);
        self.rx_byte = Some(byte);
    }

    fn release_bus(&mut self) {
        self.phase = Phase::Idle;
        self.btf = false;
        self.rx_byte = None;
        self.stop_pending = false;
        self.target = None;
    }

    fn write_cr1(&mut self, value: u32) {
        let was_acking = self.ack();
        self.cr1 = value & !(i2c::CR1_START.mask() | i2c::CR1_STOP.mask());
        if was_acking && !self.ack() {
            self.transcript.push(BusEvent::AckDisabled);
        }

        if value & i2c::CR1_START.mask() != 0 {
            self.transcript.push(BusEvent::Start);
            self.sb = true;
            self.addr = false;
            self.phase = Phase::Start;
            self.stop_pending = false;
        }

        if value & i2c::CR1_STOP.mask() != 0 {
            self.transcript.push(BusEvent::Stop);
            if self.phase == Phase::Receive && self.rx_byte.is_some() {
                // Byte already in flight is still delivered
                self.stop_pending = true;
            } else {
                self.release_bus();
            }
        }
    }

    fn write_dr(&mut self, value: u32) {
        let byte = value as u8;
        if self.sb {
            self.sb = false;
            let address = byte >> 1;
            let read = byte & 1 != 0;
            let found = self.devices.iter().position(|d| d.address == address);
            self.transcript.push(BusEvent::Address {
                address,
                read,
                acked: found.is_some(),
            });
            match found {
                Some(index) => {
                    self.target = Some(index);
                    self.addr = true;
                    self.phase = Phase::Addressed { read };
                }
                None => self.errors |= i2c::SR1_AF.mask(),
            }
        } else if self.phase == Phase::Transmit {
            if let Some(device) = self.target.and_then(|t| self.devices.get_mut(t)) {
                device.received.push(byte);
            }
            self.transcript.push(BusEvent::Write(byte));
            self.btf = true;
        }
    }

    fn read_dr(&mut self) -> u32 {
        if self.phase != Phase::Receive {
            return 0;
        }
        let Some(byte) = self.rx_byte.take() else {
            return 0;
        };
        self.transcript.push(BusEvent::Read {
            byte,
            acked: self.ack(),
        });
        if self.stop_pending {
            self.release_bus();
        } else {
            self.load_rx();
        }
        byte as u32
    }

    fn read_sr2(&mut self) -> u32 {
        let sr2 = self.sr2();
        if self.addr && self.addr_sr1_seen {
            self.addr = false;
            self.addr_sr1_seen = false;
            match self.phase {
                Phase::Addressed { read: true } => {
                    self.phase = Phase::Receive;
                    self.load_rx();
                }
                Phase::Addressed { read: false } => {
                    self.phase = Phase::Transmit;
                    self.btf = false;
                }
                _ => {}
            }
        }
        sr2
    }
}

/// I2C register block driving a bus of modelled slaves
///
/// Devices answer their address with ACK; writes to them are collected and
/// reads are served from a response queue (0xFF once exhausted). An
/// unanswered address raises AF. Every bus-level action is appended to a
/// [`BusEvent`] transcript.
#[derive(Debug, Clone, Default)]
pub struct SimI2c {
    state: Rc<RefCell<State>>,
}

impl SimI2c {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route the block at `base` to this model
    pub fn attach(&self, regs: &mut MockRegisters, base: u32) {
        regs.attach(base, WINDOW, self.clone());
    }

    /// Put a slave at 7-bit `address` that answers reads with `response`
    pub fn add_device(&self, address: u8, response: &[u8]) {
        self.state.borrow_mut().devices.push(Device {
            address,
            response: response.iter().copied().collect(),
            received: Vec::new(),
        });
    }

    /// Bytes written to the slave at `address`
    pub fn received(&self, address: u8) -> Vec<u8> {
        self.state
            .borrow()
            .devices
            .iter()
            .find(|d| d.address == address)
            .map(|d| d.received.clone())
            .unwrap_or_default()
    }

    pub fn transcript(&self) -> Vec<BusEvent> {
        self.state.borrow().transcript.clone()
    }

    pub fn clear_transcript(&self) {
        self.state.borrow_mut().transcript.clear();
    }

    /// Set SR1 error bits (BERR, ARLO, AF, OVR, TIMEOUT)
    pub fn raise(&self, mask: u32) {
        self.state.borrow_mut().errors |= mask & ERROR_MASK;
    }

    /// SR1 error bits still set
    pub fn errors(&self) -> u32 {
        self.state.borrow().errors
    }

    /// Master still owns the bus
    pub fn bus_busy(&self) -> bool {
        self.state.borrow().phase != Phase::Idle
    }

    pub fn cr1(&self) -> u32 {
        self.state.borrow().cr1
    }

    pub fn cr2(&self) -> u32 {
        self.state.borrow().cr2
    }

    pub fn ccr(&self) -> u32 {
        self.state.borrow().ccr
    }

    pub fn trise(&self) -> u32 {
        self.state.borrow().trise
    }

    pub fn oar1(&self) -> u32 {
        self.state.borrow().oar1
    }

    /// Whether the event interrupt line is asserted
    pub fn event_pending(&self) -> bool {
        let s = self.state.borrow();
        let sr1 = s.sr1();
        let evt = s.cr2 & i2c::CR2_ITEVTEN.mask() != 0;
        let buf = s.cr2 & i2c::CR2_ITBUFEN.mask() != 0;
        let event_bits = i2c::SR1_SB.mask() | i2c::SR1_ADDR.mask() | i2c::SR1_BTF.mask();
        let buffer_bits = i2c::SR1_TXE.mask() | i2c::SR1_RXNE.mask();
        evt && (sr1 & event_bits != 0 || (buf && sr1 & buffer_bits != 0))
    }

    /// Whether the error interrupt line is asserted
    pub fn error_pending(&self) -> bool {
        let s = self.state.borrow();
        s.cr2 & i2c::CR2_ITERREN.mask() != 0 && s.errors != 0
    }
}

impl MockPeripheral for SimI2c {
    fn read(&mut self, offset: u32) -> u32 {
        let mut s = self.state.borrow_mut();
        match offset {
            i2c::CR1 => s.cr1,
            i2c::CR2 => s.cr2,
            i2c::OAR1 => s.oar1,
            i2c::DR => s.read_dr(),
            i2c::SR1 => {
                let sr1 = s.sr1();
                if s.addr {
                    s.addr_sr1_seen = true;
                }
                sr1
            }
            i2c::SR2 => s.read_sr2(),
            i2c::CCR => s.ccr,
            i2c::TRISE => s.trise,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        let mut s = self.state.borrow_mut();
        match offset {
            i2c::CR1 => s.write_cr1(value),
            i2c::CR2 => s.cr2 = value & 0x1FFF,
            i2c::OAR1 => s.oar1 = value,
            i2c::DR => s.write_dr(value),
            // Error flags are rc_w0
            i2c::SR1 => s.errors &= value | !ERROR_MASK,
            i2c::CCR => s.ccr = value,
            i2c::TRISE => s.trise = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buswire_hal::RegisterAccess;
    use std::vec;

    const BASE: u32 = 0x4000_5400;

    fn setup() -> (SimI2c, MockRegisters) {
        let sim = SimI2c::new();
        let mut regs = MockRegisters::new();
        sim.attach(&mut regs, BASE);
        (sim, regs)
    }

    #[test]
    fn test_write_sequence() {
        let (sim, regs) = setup();
        sim.add_device(0x3C, &[]);

        regs.write(BASE + i2c::CR1, i2c::CR1_START.mask());
        assert!(regs.is_set(BASE + i2c::SR1, i2c::SR1_SB));
        regs.write(BASE + i2c::DR, 0x3C << 1);
        assert!(regs.is_set(BASE + i2c::SR1, i2c::SR1_ADDR));
        regs.read(BASE + i2c::SR2);
        assert!(regs.is_set(BASE + i2c::SR1, i2c::SR1_TXE));
        regs.write(BASE + i2c::DR, 0xAA);
        assert!(regs.is_set(BASE + i2c::SR1, i2c::SR1_BTF));
        regs.write(BASE + i2c::CR1, i2c::CR1_STOP.mask());

        assert_eq!(sim.received(0x3C), vec![0xAA]);
        assert!(!sim.bus_busy());
        assert_eq!(
            sim.transcript(),
            vec![
                BusEvent::Start,
                BusEvent::Address {
                    address: 0x3C,
                    read: false,
                    acked: true
                },
                BusEvent::Write(0xAA),
                BusEvent::Stop,
            ]
        );
    }

    #[test]
    fn test_addr_needs_sr1_then_sr2() {
        let (sim, regs) = setup();
        sim.add_device(0x50, &[]);

        regs.write(BASE + i2c::CR1, i2c::CR1_START.mask());
        regs.write(BASE + i2c::DR, 0x50 << 1);
        // SR2 without a prior SR1 read keeps ADDR
        regs.read(BASE + i2c::SR2);
        assert!(regs.is_set(BASE + i2c::SR1, i2c::SR1_ADDR));
        regs.read(BASE + i2c::SR2);
        assert!(!regs.is_set(BASE + i2c::SR1, i2c::SR1_ADDR));
    }

    #[test]
    fn test_missing_device_raises_af() {
        let (sim, regs) = setup();
        regs.write(BASE + i2c::CR2, i2c::CR2_ITERREN.mask());
        regs.write(BASE + i2c::CR1, i2c::CR1_START.mask());
        regs.write(BASE + i2c::DR, 0x10 << 1);

        assert!(regs.is_set(BASE + i2c::SR1, i2c::SR1_AF));
        assert!(sim.error_pending());
        regs.write(BASE + i2c::SR1, !i2c::SR1_AF.mask());
        assert_eq!(sim.errors(), 0);
    }

    #[test]
    fn test_read_delivers_in_flight_byte_after_stop() {
        let (sim, regs) = setup();
        sim.add_device(0x68, &[0x11, 0x22]);

        regs.write(BASE + i2c::CR1, i2c::CR1_ACK.mask() | i2c::CR1_START.mask());
        regs.write(BASE + i2c::DR, 0x68 << 1 | 1);
        regs.read(BASE + i2c::SR1);
        regs.read(BASE + i2c::SR2);
        assert_eq!(regs.read(BASE + i2c::DR), 0x11);
        regs.write(BASE + i2c::CR1, i2c::CR1_STOP.mask());
        assert!(regs.is_set(BASE + i2c::SR1, i2c::SR1_RXNE));
        assert_eq!(regs.read(BASE + i2c::DR), 0x22);
        assert!(!sim.bus_busy());

        let t = sim.transcript();
        assert_eq!(
            t[2..],
            [
                BusEvent::Read {
                    byte: 0x11,
                    acked: true
                },
                BusEvent::AckDisabled,
                BusEvent::Stop,
                BusEvent::Read {
                    byte: 0x22,
                    acked: false
                },
            ]
        );
    }
}
