//! Clock authority
//!
//! Derives the system and bus clock frequencies from the RCC clock
//! configuration register. Everything here is pure computation over the
//! current register contents; nothing is cached.
//!
//! # Prescaler encodings
//!
//! | field | encodings      | divide by                              |
//! |-------|----------------|----------------------------------------|
//! | HPRE  | 0-7            | 1                                      |
//! | HPRE  | 8-15           | 2, 4, 8, 16, 64, 128, 256, 512         |
//! | PPREx | 0-3            | 1                                      |
//! | PPREx | 4-7            | 2, 4, 8, 16                            |
//!
//! Malformed encodings are not rejected; the result mirrors what the
//! hardware would do with the same bits.

use buswire_hal::RegisterAccess;

use crate::regs::rcc;

/// Internal 16 MHz RC oscillator
pub const HSI_HZ: u32 = 16_000_000;

/// External crystal fitted on the STM32F4-Discovery board
pub const HSE_HZ: u32 = 8_000_000;

const AHB_DIVISORS: [u32; 8] = [2, 4, 8, 16, 64, 128, 256, 512];
const APB_DIVISORS: [u32; 4] = [2, 4, 8, 16];

/// Clock domains a peripheral can hang off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bus {
    Ahb,
    /// Low-speed peripheral bus
    Apb1,
    /// High-speed peripheral bus
    Apb2,
}

/// Oscillator currently driving SYSCLK
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemClockSource {
    Hsi,
    Hse,
    Pll,
    /// SWS = 0b11, not a valid source
    Invalid,
}

impl SystemClockSource {
    /// Decode the CFGR.SWS field
    pub const fn from_sws(sws: u32) -> Self {
        match sws & 0b11 {
            0 => SystemClockSource::Hsi,
            1 => SystemClockSource::Hse,
            2 => SystemClockSource::Pll,
            _ => SystemClockSource::Invalid,
        }
    }
}

/// AHB prescaler divide ratio for a HPRE encoding
pub const fn ahb_divisor(hpre: u32) -> u32 {
    if hpre <= 7 {
        1
    } else {
        AHB_DIVISORS[((hpre - 8) & 0b111) as usize]
    }
}

/// APB prescaler divide ratio for a PPRE1/PPRE2 encoding
pub const fn apb_divisor(ppre: u32) -> u32 {
    if ppre <= 3 {
        1
    } else {
        APB_DIVISORS[((ppre - 4) & 0b11) as usize]
    }
}

/// Source currently selected by the clock switch
pub fn system_clock_source<R: RegisterAccess>(regs: &R) -> SystemClockSource {
    SystemClockSource::from_sws(regs.read_field(rcc::BASE + rcc::CFGR, rcc::CFGR_SWS))
}

/// PLL output frequency
///
/// Not derived: the PLL configuration register is never decoded, so a
/// PLL-clocked system reports 0 Hz.
pub fn pll_output<R: RegisterAccess>(_regs: &R) -> u32 {
    0
}

/// SYSCLK frequency in Hz
pub fn system_clock<R: RegisterAccess>(regs: &R) -> u32 {
    match system_clock_source(regs) {
        SystemClockSource::Hsi => HSI_HZ,
        SystemClockSource::Hse => HSE_HZ,
        SystemClockSource::Pll => pll_output(regs),
        SystemClockSource::Invalid => 0,
    }
}

/// Frequency of `bus` in Hz
pub fn bus_clock<R: RegisterAccess>(regs: &R, bus: Bus) -> u32 {
    let cfgr = regs.read(rcc::BASE + rcc::CFGR);
    let sysclk = system_clock(regs);
    let hclk = sysclk / ahb_divisor(rcc::CFGR_HPRE.extract(cfgr));

    match bus {
        Bus::Ahb => hclk,
        Bus::Apb1 => hclk / apb_divisor(rcc::CFGR_PPRE1.extract(cfgr)),
        Bus::Apb2 => hclk / apb_divisor(rcc::CFGR_PPRE2.extract(cfgr)),
    }
}

/// Snapshot of every derived clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockTree {
    pub sysclk: u32,
    pub hclk: u32,
    pub pclk1: u32,
    pub pclk2: u32,
}

impl ClockTree {
    /// Compute the tree from the current register contents
    pub fn read<R: RegisterAccess>(regs: &R) -> Self {
        Self {
            sysclk: system_clock(regs),
            hclk: bus_clock(regs, Bus::Ahb),
            pclk1: bus_clock(regs, Bus::Apb1),
            pclk2: bus_clock(regs, Bus::Apb2),
        }
    }
}

/// Peripheral clock enable bit in RCC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockGate {
    /// Absolute address of the enable register
    pub register: u32,
    pub bit: u8,
}

impl ClockGate {
    pub const fn on_bus(bus: Bus, bit: u8) -> Self {
        let offset = match bus {
            Bus::Ahb => rcc::AHB1ENR,
            Bus::Apb1 => rcc::APB1ENR,
            Bus::Apb2 => rcc::APB2ENR,
        };
        Self {
            register: rcc::BASE + offset,
            bit,
        }
    }

    /// Gate the peripheral clock on or off
    pub fn set<R: RegisterAccess>(&self, regs: &R, enable: bool) {
        if enable {
            regs.set_bits(self.register, 1 << self.bit);
        } else {
            regs.clear_bits(self.register, 1 << self.bit);
        }
    }

    pub fn is_enabled<R: RegisterAccess>(&self, regs: &R) -> bool {
        regs.read(self.register) & (1 << self.bit) != 0
    }
}

/// Peripheral reset bit in RCC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ResetLine {
    /// Absolute address of the reset register
    pub register: u32,
    pub bit: u8,
}

impl ResetLine {
    pub const fn on_bus(bus: Bus, bit: u8) -> Self {
        let offset = match bus {
            Bus::Ahb => rcc::AHB1RSTR,
            Bus::Apb1 => rcc::APB1RSTR,
            Bus::Apb2 => rcc::APB2RSTR,
        };
        Self {
            register: rcc::BASE + offset,
            bit,
        }
    }

    /// Assert then release reset, returning every register of the block to
    /// its reset value
    pub fn pulse<R: RegisterAccess>(&self, regs: &R) {
        regs.set_bits(self.register, 1 << self.bit);
        regs.clear_bits(self.register, 1 << self.bit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buswire_hal::mock::MockRegisters;
    use proptest::prelude::*;

    const CFGR: u32 = rcc::BASE + rcc::CFGR;

    fn cfgr(sws: u32, hpre: u32, ppre1: u32, ppre2: u32) -> u32 {
        let v = rcc::CFGR_SWS.insert(0, sws);
        let v = rcc::CFGR_HPRE.insert(v, hpre);
        let v = rcc::CFGR_PPRE1.insert(v, ppre1);
        rcc::CFGR_PPRE2.insert(v, ppre2)
    }

    #[test]
    fn test_ahb_divisor_table() {
        for enc in 0..=7 {
            assert_eq!(ahb_divisor(enc), 1);
        }
        let expected = [2, 4, 8, 16, 64, 128, 256, 512];
        for (i, div) in expected.iter().enumerate() {
            assert_eq!(ahb_divisor(8 + i as u32), *div);
        }
    }

    #[test]
    fn test_apb_divisor_table() {
        for enc in 0..=3 {
            assert_eq!(apb_divisor(enc), 1);
        }
        assert_eq!(apb_divisor(4), 2);
        assert_eq!(apb_divisor(5), 4);
        assert_eq!(apb_divisor(6), 8);
        assert_eq!(apb_divisor(7), 16);
    }

    #[test]
    fn test_system_clock_sources() {
        let regs = MockRegisters::new();
        regs.set(CFGR, cfgr(0, 0, 0, 0));
        assert_eq!(system_clock(&regs), HSI_HZ);
        regs.set(CFGR, cfgr(1, 0, 0, 0));
        assert_eq!(system_clock(&regs), HSE_HZ);
        regs.set(CFGR, cfgr(2, 0, 0, 0));
        assert_eq!(system_clock(&regs), 0);
        regs.set(CFGR, cfgr(3, 0, 0, 0));
        assert_eq!(system_clock_source(&regs), SystemClockSource::Invalid);
        assert_eq!(system_clock(&regs), 0);
    }

    #[test]
    fn test_reset_value_gives_hsi_everywhere() {
        let regs = MockRegisters::new();
        let tree = ClockTree::read(&regs);
        assert_eq!(
            tree,
            ClockTree {
                sysclk: 16_000_000,
                hclk: 16_000_000,
                pclk1: 16_000_000,
                pclk2: 16_000_000,
            }
        );
    }

    #[test]
    fn test_bus_clock_chain() {
        let regs = MockRegisters::new();
        // HSE, AHB /2, APB1 /4, APB2 /2
        regs.set(CFGR, cfgr(1, 8, 5, 4));
        assert_eq!(bus_clock(&regs, Bus::Ahb), 4_000_000);
        assert_eq!(bus_clock(&regs, Bus::Apb1), 1_000_000);
        assert_eq!(bus_clock(&regs, Bus::Apb2), 2_000_000);
    }

    #[test]
    fn test_clock_gate_toggles_single_bit() {
        let regs = MockRegisters::new();
        let gate = ClockGate::on_bus(Bus::Apb1, 14);
        regs.set(gate.register, 0x0000_0001);
        gate.set(&regs, true);
        assert_eq!(regs.peek(gate.register), 0x0000_4001);
        assert!(gate.is_enabled(&regs));
        gate.set(&regs, false);
        assert_eq!(regs.peek(gate.register), 0x0000_0001);
    }

    #[test]
    fn test_reset_pulse_leaves_bit_clear() {
        let regs = MockRegisters::new();
        let line = ResetLine::on_bus(Bus::Apb2, 12);
        line.pulse(&regs);
        assert_eq!(regs.writes_to(line.register), [1 << 12, 0]);
    }

    proptest! {
        #[test]
        fn prop_hpre_low_encodings_pass_through(hpre in 0u32..8, sws in 0u32..2) {
            let regs = MockRegisters::new();
            regs.set(CFGR, cfgr(sws, hpre, 0, 0));
            prop_assert_eq!(bus_clock(&regs, Bus::Ahb), system_clock(&regs));
        }

        #[test]
        fn prop_apb_never_faster_than_ahb(hpre in 0u32..16, ppre1 in 0u32..8, ppre2 in 0u32..8) {
            let regs = MockRegisters::new();
            regs.set(CFGR, cfgr(0, hpre, ppre1, ppre2));
            let hclk = bus_clock(&regs, Bus::Ahb);
            prop_assert_eq!(hclk, HSI_HZ / ahb_divisor(hpre));
            prop_assert_eq!(bus_clock(&regs, Bus::Apb1), hclk / apb_divisor(ppre1));
            prop_assert_eq!(bus_clock(&regs, Bus::Apb2), hclk / apb_divisor(ppre2));
        }
    }
}
