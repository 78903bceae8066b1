//! SPI block model

use core::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::vec::Vec;

use buswire_hal::mock::{MockPeripheral, MockRegisters};

use super::WINDOW;
use crate::regs::spi;

#[derive(Debug, Default)]
struct State {
    cr1: u32,
    cr2: u32,
    rx: VecDeque<u16>,
    sent: Vec<u16>,
    overrun: bool,
    dr_read_after_ovr: bool,
    busy: bool,
    loopback: bool,
    peer: Option<Weak<RefCell<State>>>,
}

impl State {
    fn sr(&self) -> u32 {
        let mut sr = spi::SR_TXE.mask();
        if !self.rx.is_empty() {
            sr |= spi::SR_RXNE.mask();
        }
        if self.overrun {
            sr |= spi::SR_OVR.mask();
        }
        if self.busy {
            sr |= spi::SR_BSY.mask();
        }
        sr
    }
}

/// SPI register block with an attached wire
///
/// Every DR write lands in [`sent`](Self::sent) and is delivered to the
/// peer's receive queue (or the own queue in loopback). RXNE reflects the
/// receive queue; TXE is always set.
#[derive(Debug, Clone, Default)]
pub struct SimSpi {
    state: Rc<RefCell<State>>,
}

impl SimSpi {
    /// Model with nothing on the other end of the wire
    pub fn new() -> Self {
        Self::default()
    }

    /// Model with MOSI tied to MISO
    pub fn loopback() -> Self {
        let sim = Self::new();
        sim.state.borrow_mut().loopback = true;
        sim
    }

    /// Two blocks wired to each other
    pub fn pair() -> (Self, Self) {
        let a = Self::new();
        let b = Self::new();
        a.state.borrow_mut().peer = Some(Rc::downgrade(&b.state));
        b.state.borrow_mut().peer = Some(Rc::downgrade(&a.state));
        (a, b)
    }

    /// Route the block at `base` to this model
    pub fn attach(&self, regs: &mut MockRegisters, base: u32) {
        regs.attach(base, WINDOW, self.clone());
    }

    /// Units written to DR, oldest first
    pub fn sent(&self) -> Vec<u16> {
        self.state.borrow().sent.clone()
    }

    /// Make a unit arrive from the wire
    pub fn push_rx(&self, unit: u16) {
        self.state.borrow_mut().rx.push_back(unit);
    }

    /// Units received but not yet read
    pub fn rx_pending(&self) -> usize {
        self.state.borrow().rx.len()
    }

    /// Raise OVR; cleared by a DR read followed by an SR read
    pub fn inject_overrun(&self) {
        self.state.borrow_mut().overrun = true;
    }

    pub fn overrun(&self) -> bool {
        self.state.borrow().overrun
    }

    pub fn set_busy(&self, busy: bool) {
        self.state.borrow_mut().busy = busy;
    }

    pub fn cr1(&self) -> u32 {
        self.state.borrow().cr1
    }

    pub fn cr2(&self) -> u32 {
        self.state.borrow().cr2
    }

    /// Whether an enabled interrupt source is asserted
    pub fn irq_pending(&self) -> bool {
        let s = self.state.borrow();
        let sr = s.sr();
        (sr & spi::SR_TXE.mask() != 0 && s.cr2 & spi::CR2_TXEIE.mask() != 0)
            || (sr & spi::SR_RXNE.mask() != 0 && s.cr2 & spi::CR2_RXNEIE.mask() != 0)
            || (sr & spi::SR_OVR.mask() != 0 && s.cr2 & spi::CR2_ERRIE.mask() != 0)
    }
}

impl MockPeripheral for SimSpi {
    fn read(&mut self, offset: u32) -> u32 {
        let mut s = self.state.borrow_mut();
        match offset {
            spi::CR1 => s.cr1,
            spi::CR2 => s.cr2,
            spi::SR => {
                let sr = s.sr();
                if s.overrun && s.dr_read_after_ovr {
                    s.overrun = false;
                    s.dr_read_after_ovr = false;
                }
                sr
            }
            spi::DR => {
                if s.overrun {
                    s.dr_read_after_ovr = true;
                }
                s.rx.pop_front().map_or(0, u32::from)
            }
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        let mut s = self.state.borrow_mut();
        match offset {
            spi::CR1 => s.cr1 = value & 0xFFFF,
            spi::CR2 => s.cr2 = value & 0xFF,
            spi::DR => {
                let unit = value as u16;
                s.sent.push(unit);
                if s.loopback {
                    s.rx.push_back(unit);
                } else if let Some(peer) = s.peer.as_ref().and_then(Weak::upgrade) {
                    peer.borrow_mut().rx.push_back(unit);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buswire_hal::RegisterAccess;
    use std::vec;

    const BASE: u32 = 0x4000_3800;

    #[test]
    fn test_pair_delivers_to_peer() {
        let (a, b) = SimSpi::pair();
        let mut regs = MockRegisters::new();
        a.attach(&mut regs, BASE);

        regs.write(BASE + spi::DR, 0x5A);
        assert_eq!(a.sent(), vec![0x5A]);
        assert_eq!(a.rx_pending(), 0);
        assert_eq!(b.rx_pending(), 1);
    }

    #[test]
    fn test_rxne_tracks_queue() {
        let sim = SimSpi::loopback();
        let mut regs = MockRegisters::new();
        sim.attach(&mut regs, BASE);

        assert!(!regs.is_set(BASE + spi::SR, spi::SR_RXNE));
        regs.write(BASE + spi::DR, 0x1234);
        assert!(regs.is_set(BASE + spi::SR, spi::SR_RXNE));
        assert_eq!(regs.read(BASE + spi::DR), 0x1234);
        assert!(!regs.is_set(BASE + spi::SR, spi::SR_RXNE));
    }

    #[test]
    fn test_overrun_clear_sequence() {
        let sim = SimSpi::new();
        let mut regs = MockRegisters::new();
        sim.attach(&mut regs, BASE);

        sim.inject_overrun();
        // SR alone does not clear it
        assert!(regs.is_set(BASE + spi::SR, spi::SR_OVR));
        assert!(sim.overrun());
        regs.read(BASE + spi::DR);
        assert!(regs.is_set(BASE + spi::SR, spi::SR_OVR));
        assert!(!sim.overrun());
    }

    #[test]
    fn test_irq_pending_needs_enable() {
        let sim = SimSpi::new();
        let mut regs = MockRegisters::new();
        sim.attach(&mut regs, BASE);

        assert!(!sim.irq_pending());
        regs.write(BASE + spi::CR2, spi::CR2_TXEIE.mask());
        assert!(sim.irq_pending());
    }
}
