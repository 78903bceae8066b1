//! buswire demo firmware
//!
//! Runs the buswire engines on an STM32F4-Discovery (STM32F407VG):
//!
//! - SPI2 send test: every press of the user button (PA0) clocks out the
//!   message length and then the message, alternating between the blocking
//!   and the interrupt-driven path. The green LED (PD12) follows the button.
//! - I2C1 scan at boot: an address-only write to every 7-bit address, each
//!   bounded by a deadline.
//! - USART2 echo at 115200 8N1.
//!
//! Embassy provides the executor, time driver and the button/LED pins; the
//! bus peripherals are driven by buswire through raw register access.

#![no_std]
#![no_main]

mod board;
mod shared;

use buswire_core::TransferState;
use buswire_drivers::{wait_idle, I2c, Spi, TransferError, Uart};
use buswire_hal_stm32f4::{GpioMux, Mmio, Nvic};
use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::exti::{self, ExtiInput};
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::{bind_interrupts, interrupt};
use embassy_time::{Duration, Timer};
use embedded_io::{Read, ReadReady, Write};
use {defmt_rtt as _, panic_probe as _};

use crate::shared::{Shared, TimerDeadline};

bind_interrupts!(struct Irqs {
    EXTI0 => exti::InterruptHandler<embassy_stm32::interrupt::typelevel::EXTI0>;
});

const MESSAGE: &[u8] = b"HelloWorld!";
static LENGTH: [u8; 1] = [MESSAGE.len() as u8];

static SPI_HANDLE: Shared<Spi<'static, Mmio>> = Shared::new();
static I2C_HANDLE: Shared<I2c<'static, Mmio>> = Shared::new();

/// Bound on one interrupt-driven SPI chunk
const SPI_DEADLINE: Duration = Duration::from_millis(10);
/// Bound on one address probe (a standard-mode address phase takes ~100 us)
const PROBE_DEADLINE: Duration = Duration::from_millis(2);

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("buswire firmware starting...");

    let p = embassy_stm32::init(Default::default());
    let core = unwrap!(cortex_m::Peripherals::take());
    let mut nvic = Nvic::new(core.NVIC);
    // SAFETY: regs only reaches the buswire engines and the GPIO mux, which
    // address the register maps of this chip
    let regs = unsafe { Mmio::new() };

    board::route_pins(&mut GpioMux::new(regs));

    let mut spi = Spi::new(regs, board::SPI, board::SPI_CONFIG);
    spi.init();
    spi.set_ss_output(true);
    spi.enable_interrupts(&mut nvic, board::SPI_PRIORITY);
    SPI_HANDLE.install(spi);

    let mut i2c = I2c::new(regs, board::I2C, board::I2C_CONFIG);
    i2c.init();
    i2c.enable();
    i2c.enable_interrupts(&mut nvic, board::I2C_PRIORITY);
    I2C_HANDLE.install(i2c);

    let found = scan_bus();
    info!("I2C1: {} device(s) {:#x}", found.len(), found.as_slice());

    let mut uart = Uart::new(regs, board::UART, board::UART_CONFIG);
    uart.init();
    uart.enable();

    let button = ExtiInput::new(p.PA0, p.EXTI0, Pull::Down, Irqs);
    let led = Output::new(p.PD12, Level::Low, Speed::Low);

    spawner.spawn(spi_send_task(button, led)).unwrap();
    spawner.spawn(echo_task(uart)).unwrap();

    info!("All tasks spawned");
}

/// Probe every non-reserved 7-bit address
fn scan_bus() -> heapless::Vec<u8, 16> {
    let mut found = heapless::Vec::new();
    for address in 0x08..0x78u8 {
        let state = I2C_HANDLE.with(|i2c| i2c.master_send_async(&[], address));
        if state != Some(TransferState::Ready) {
            warn!("I2C1 busy, scan stopped at {=u8:#x}", address);
            break;
        }
        let mut deadline = TimerDeadline::after(PROBE_DEADLINE);
        if wait_idle(&mut &I2C_HANDLE, &mut deadline).is_ok() && found.push(address).is_err() {
            warn!("I2C1 scan: result list full");
            break;
        }
    }
    found
}

fn send_blocking() {
    SPI_HANDLE.with(|spi| {
        spi.enable();
        spi.send(&LENGTH);
        spi.send(MESSAGE);
        while spi.is_busy() {
            core::hint::spin_loop();
        }
        spi.disable();
    });
}

fn send_interrupt_driven() -> Result<(), TransferError> {
    for chunk in [&LENGTH[..], MESSAGE] {
        let state = SPI_HANDLE.with(|spi| {
            spi.enable();
            spi.send_async(chunk)
        });
        if state != Some(TransferState::Ready) {
            warn!("SPI2 busy, chunk dropped");
            continue;
        }
        wait_idle(&mut &SPI_HANDLE, &mut TimerDeadline::after(SPI_DEADLINE))?;
    }
    SPI_HANDLE.with(|spi| {
        while spi.is_busy() {
            core::hint::spin_loop();
        }
        spi.disable();
    });
    Ok(())
}

/// SPI2 send test, one message per button press
#[embassy_executor::task]
async fn spi_send_task(mut button: ExtiInput<'static>, mut led: Output<'static>) {
    info!("SPI send task started");

    let mut interrupt_driven = false;
    loop {
        button.wait_for_rising_edge().await;
        led.set_high();

        if interrupt_driven {
            if let Err(e) = send_interrupt_driven() {
                warn!("SPI2 send failed: {}", e);
            }
        } else {
            send_blocking();
        }
        debug!("SPI2 sent {=usize} bytes", MESSAGE.len() + 1);
        interrupt_driven = !interrupt_driven;

        button.wait_for_falling_edge().await;
        led.set_low();
    }
}

/// USART2 echo
#[embassy_executor::task]
async fn echo_task(mut uart: Uart<'static, Mmio>) {
    info!("USART2 echo task started");

    let mut buf = [0u8; 32];
    loop {
        if !matches!(uart.read_ready(), Ok(true)) {
            Timer::after(Duration::from_millis(1)).await;
            continue;
        }
        if let Ok(n) = uart.read(&mut buf) {
            uart.write_all(&buf[..n]).ok();
        }
    }
}

#[interrupt]
fn SPI2() {
    SPI_HANDLE.with(|spi| spi.on_interrupt());
}

#[interrupt]
fn I2C1_EV() {
    I2C_HANDLE.with(|i2c| i2c.on_event_interrupt());
}

#[interrupt]
fn I2C1_ER() {
    I2C_HANDLE.with(|i2c| i2c.on_error_interrupt());
}
