//! USART block model

use core::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::vec::Vec;

use buswire_hal::mock::{MockPeripheral, MockRegisters};

use super::WINDOW;
use crate::regs::usart;

const ERROR_MASK: u32 =
    usart::SR_PE.mask() | usart::SR_FE.mask() | usart::SR_NF.mask() | usart::SR_ORE.mask();

#[derive(Debug, Default)]
struct State {
    cr1: u32,
    cr2: u32,
    cr3: u32,
    brr: u32,
    errors: u32,
    sr_read_with_errors: bool,
    rx: VecDeque<u16>,
    sent: Vec<u16>,
    loopback: bool,
    peer: Option<Weak<RefCell<State>>>,
}

impl State {
    fn sr(&self) -> u32 {
        let mut sr = usart::SR_TXE.mask() | usart::SR_TC.mask() | self.errors;
        if !self.rx.is_empty() {
            sr |= usart::SR_RXNE.mask();
        }
        sr
    }

    fn enabled(&self, field: buswire_hal::Field) -> bool {
        self.cr1 & field.mask() != 0
    }
}

/// USART register block with an attached line
///
/// Transmission is instantaneous, so TXE and TC always read set. Frames
/// written to DR land in [`sent`](Self::sent) and in the peer's receive
/// queue (or the own queue in loopback). Error flags are cleared by an SR
/// read followed by a DR read.
#[derive(Debug, Clone, Default)]
pub struct SimUsart {
    state: Rc<RefCell<State>>,
}

impl SimUsart {
    /// Model with nothing on the other end of the line
    pub fn new() -> Self {
        Self::default()
    }

    /// Model with TX tied to RX
    pub fn loopback() -> Self {
        let sim = Self::new();
        sim.state.borrow_mut().loopback = true;
        sim
    }

    /// Two blocks with crossed TX/RX lines
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

    /// Frames written to DR, oldest first
    pub fn sent(&self) -> Vec<u16> {
        self.state.borrow().sent.clone()
    }

    /// Make a frame arrive on RX
    pub fn push_rx(&self, frame: u16) {
        self.state.borrow_mut().rx.push_back(frame);
    }

    pub fn rx_pending(&self) -> usize {
        self.state.borrow().rx.len()
    }

    /// Set SR error bits (PE, FE, NF, ORE)
    pub fn raise(&self, mask: u32) {
        self.state.borrow_mut().errors |= mask & ERROR_MASK;
    }

    pub fn errors(&self) -> u32 {
        self.state.borrow().errors
    }

    pub fn brr(&self) -> u32 {
        self.state.borrow().brr
    }

    pub fn cr1(&self) -> u32 {
        self.state.borrow().cr1
    }

    pub fn cr2(&self) -> u32 {
        self.state.borrow().cr2
    }

    pub fn cr3(&self) -> u32 {
        self.state.borrow().cr3
    }

    /// Whether an enabled interrupt source is asserted
    pub fn irq_pending(&self) -> bool {
        let s = self.state.borrow();
        let sr = s.sr();
        let rxne = sr & usart::SR_RXNE.mask() != 0;
        let ore = sr & usart::SR_ORE.mask() != 0;
        let line_errors = sr & (usart::SR_FE.mask() | usart::SR_NF.mask() | usart::SR_ORE.mask());
        let pe = sr & usart::SR_PE.mask() != 0;
        ((rxne || ore) && s.enabled(usart::CR1_RXNEIE))
            || s.enabled(usart::CR1_TXEIE)
            || s.enabled(usart::CR1_TCIE)
            || (pe && s.enabled(usart::CR1_PEIE))
            || (line_errors != 0 && s.cr3 & usart::CR3_EIE.mask() != 0)
    }
}

impl MockPeripheral for SimUsart {
    fn read(&mut self, offset: u32) -> u32 {
        let mut s = self.state.borrow_mut();
        match offset {
            usart::SR => {
                if s.errors != 0 {
                    s.sr_read_with_errors = true;
                }
                s.sr()
            }
            usart::DR => {
                if s.sr_read_with_errors {
                    s.errors = 0;
                    s.sr_read_with_errors = false;
                }
                s.rx.pop_front().map_or(0, u32::from)
            }
            usart::BRR => s.brr,
            usart::CR1 => s.cr1,
            usart::CR2 => s.cr2,
            usart::CR3 => s.cr3,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        let mut s = self.state.borrow_mut();
        match offset {
            usart::DR => {
                let frame = (value & 0x1FF) as u16;
                s.sent.push(frame);
                if s.loopback {
                    s.rx.push_back(frame);
                } else if let Some(peer) = s.peer.as_ref().and_then(Weak::upgrade) {
                    peer.borrow_mut().rx.push_back(frame);
                }
            }
            usart::BRR => s.brr = value & 0xFFFF,
            usart::CR1 => s.cr1 = value,
            usart::CR2 => s.cr2 = value,
            usart::CR3 => s.cr3 = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buswire_hal::RegisterAccess;
    use std::vec;

    const BASE: u32 = 0x4000_4400;

    #[test]
    fn test_pair_crosses_lines() {
        let (a, b) = SimUsart::pair();
        let mut regs = MockRegisters::new();
        a.attach(&mut regs, BASE);

        regs.write(BASE + usart::DR, 0x1_41);
        assert_eq!(a.sent(), vec![0x141]);
        assert_eq!(b.rx_pending(), 1);
    }

    #[test]
    fn test_error_clear_sequence() {
        let sim = SimUsart::new();
        let mut regs = MockRegisters::new();
        sim.attach(&mut regs, BASE);

        sim.raise(usart::SR_FE.mask());
        // DR alone does not clear
        regs.read(BASE + usart::DR);
        assert_eq!(sim.errors(), usart::SR_FE.mask());
        assert!(regs.is_set(BASE + usart::SR, usart::SR_FE));
        regs.read(BASE + usart::DR);
        assert_eq!(sim.errors(), 0);
    }
}
