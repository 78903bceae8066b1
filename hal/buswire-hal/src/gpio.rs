//! GPIO pin multiplexing abstractions
//!
//! Bus pins (SCK/MOSI/MISO, SCL/SDA, TX/RX) have to be routed to their
//! peripheral before any transfer. The engines do not do this themselves;
//! the platform provides a [`PinMux`].

/// GPIO port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Port {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
}

impl Port {
    /// Zero-based port index (A = 0)
    pub const fn index(self) -> u8 {
        self as u8
    }
}

/// Pin mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PinMode {
    #[default]
    Input,
    Output,
    AltFunction,
    Analog,
}

/// Output slew rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Speed {
    #[default]
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Output driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputType {
    #[default]
    PushPull,
    /// Required for I2C SCL/SDA
    OpenDrain,
}

/// Internal pull resistor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Pull {
    #[default]
    None,
    Up,
    Down,
}

/// Complete configuration for one pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinConfig {
    pub mode: PinMode,
    pub speed: Speed,
    pub output_type: OutputType,
    pub pull: Pull,
    /// Alternate function number (AF0..AF15), used when `mode` is `AltFunction`
    pub alt_function: u8,
}

impl PinConfig {
    /// Push-pull alternate function pin (SPI, UART)
    pub const fn alternate(alt_function: u8) -> Self {
        Self {
            mode: PinMode::AltFunction,
            speed: Speed::High,
            output_type: OutputType::PushPull,
            pull: Pull::None,
            alt_function,
        }
    }

    /// Open-drain alternate function pin with pull-up (I2C)
    pub const fn alternate_open_drain(alt_function: u8) -> Self {
        Self {
            mode: PinMode::AltFunction,
            speed: Speed::High,
            output_type: OutputType::OpenDrain,
            pull: Pull::Up,
            alt_function,
        }
    }
}

/// Pin multiplexer
pub trait PinMux {
    /// Route `pin` of `port` according to `config`
    fn configure_pin(&mut self, port: Port, pin: u8, config: PinConfig);
}
