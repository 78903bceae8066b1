//! Two-ended transfers across modelled peripheral blocks

use core::cell::RefCell;

use buswire_core::config::{I2cConfig, SpiConfig, UartConfig};
use buswire_core::sim::{BusEvent, EventLog, SimI2c, SimSpi, SimUsart};
use buswire_core::{Event, EventHandler, I2cInstance, SpiInstance, TransferState, UartInstance};
use buswire_drivers::{wait_idle, Cancellable, I2c, PollBudget, Spi, TransferError, Uart};
use buswire_hal::mock::MockRegisters;
use buswire_hal::RegisterAccess;

const PATTERN: &[u8] = b"\x0bHelloWorld!";

fn pump_spi<R: RegisterAccess, E: EventHandler>(spi: &mut Spi<'_, R, E>, sim: &SimSpi) {
    let mut dispatches = 0;
    while sim.irq_pending() && dispatches < 256 {
        spi.on_interrupt();
        dispatches += 1;
    }
}

#[test]
fn spi_blocking_pattern_reaches_peer() {
    let (master_sim, slave_sim) = SimSpi::pair();
    let mut regs = MockRegisters::new();
    master_sim.attach(&mut regs, SpiInstance::Spi2.base());
    slave_sim.attach(&mut regs, SpiInstance::Spi1.base());

    let mut master = Spi::new(&regs, SpiInstance::Spi2, SpiConfig::MASTER);
    let mut slave = Spi::new(&regs, SpiInstance::Spi1, SpiConfig::SLAVE);
    master.init();
    slave.init();
    master.enable();
    slave.enable();

    master.send(PATTERN);

    let mut received = [0u8; 12];
    slave.receive(&mut received);
    assert_eq!(&received, PATTERN);
    assert_eq!(slave_sim.rx_pending(), 0);
}

#[test]
fn spi_interrupt_driven_pattern_reaches_peer() {
    let (master_sim, slave_sim) = SimSpi::pair();
    let mut regs = MockRegisters::new();
    master_sim.attach(&mut regs, SpiInstance::Spi2.base());
    slave_sim.attach(&mut regs, SpiInstance::Spi1.base());

    let master_log = EventLog::new();
    let slave_log = EventLog::new();
    let mut received = [0u8; 12];
    {
        let mut master =
            Spi::with_events(&regs, SpiInstance::Spi2, SpiConfig::MASTER, master_log.clone());
        let mut slave =
            Spi::with_events(&regs, SpiInstance::Spi1, SpiConfig::SLAVE, slave_log.clone());

        assert_eq!(slave.receive_async(&mut received), TransferState::Ready);
        assert_eq!(master.send_async(PATTERN), TransferState::Ready);

        while master_sim.irq_pending() || slave_sim.irq_pending() {
            pump_spi(&mut master, &master_sim);
            pump_spi(&mut slave, &slave_sim);
        }
        assert_eq!(master.tx_state(), TransferState::Ready);
        assert_eq!(slave.rx_state(), TransferState::Ready);
    }

    assert_eq!(&received, PATTERN);
    assert_eq!(master_log.events(), vec![Event::TxComplete]);
    assert_eq!(slave_log.events(), vec![Event::RxComplete]);
}

#[test]
fn uart_pair_crosses_lines() {
    let (a_sim, b_sim) = SimUsart::pair();
    let mut regs = MockRegisters::new();
    a_sim.attach(&mut regs, UartInstance::Usart1.base());
    b_sim.attach(&mut regs, UartInstance::Usart2.base());

    let mut a = Uart::new(&regs, UartInstance::Usart1, UartConfig::DEFAULT);
    let mut b = Uart::new(&regs, UartInstance::Usart2, UartConfig::DEFAULT);
    a.init();
    b.init();
    a.enable();
    b.enable();

    a.send(PATTERN);
    let mut received = [0u8; 12];
    b.receive(&mut received);
    assert_eq!(&received, PATTERN);

    b.send(b"ack");
    let mut reply = [0u8; 3];
    a.receive(&mut reply);
    assert_eq!(&reply, b"ack");
}

/// Services the I2C interrupt lines every time the deadline layer polls
struct Serviced<'h, 'a> {
    i2c: RefCell<I2c<'a, &'h MockRegisters, EventLog>>,
    sim: SimI2c,
}

impl Cancellable for Serviced<'_, '_> {
    fn is_idle(&self) -> bool {
        let mut i2c = self.i2c.borrow_mut();
        if self.sim.error_pending() {
            i2c.on_error_interrupt();
        } else if self.sim.event_pending() {
            i2c.on_event_interrupt();
        }
        i2c.is_idle()
    }

    fn cancel(&mut self) {
        self.i2c.get_mut().cancel();
    }
}

const SENSOR: u8 = 0x50;

fn i2c_bench(sim: &SimI2c) -> MockRegisters {
    let mut regs = MockRegisters::new();
    sim.attach(&mut regs, I2cInstance::I2c1.base());
    regs
}

#[test]
fn i2c_receive_completes_within_deadline() {
    let sim = SimI2c::new();
    sim.add_device(SENSOR, &[0x10, 0x20, 0x30]);
    let regs = i2c_bench(&sim);
    let log = EventLog::new();
    let mut buf = [0u8; 3];

    let mut i2c = I2c::with_events(&regs, I2cInstance::I2c1, I2cConfig::STANDARD, log.clone());
    i2c.init();
    i2c.enable();
    assert_eq!(i2c.master_receive_async(&mut buf, SENSOR), TransferState::Ready);

    let mut serviced = Serviced {
        i2c: RefCell::new(i2c),
        sim: sim.clone(),
    };
    let mut budget = PollBudget::new(32);
    assert_eq!(wait_idle(&mut serviced, &mut budget), Ok(()));
    assert!(budget.remaining() > 0);
    drop(serviced);

    assert_eq!(buf, [0x10, 0x20, 0x30]);
    assert_eq!(log.events(), vec![Event::Stop, Event::RxComplete]);
    assert!(!sim.bus_busy());
}

#[test]
fn i2c_probe_of_absent_device_times_out_and_releases_bus() {
    let sim = SimI2c::new();
    sim.add_device(SENSOR, &[]);
    let regs = i2c_bench(&sim);
    let log = EventLog::new();

    let mut i2c = I2c::with_events(&regs, I2cInstance::I2c1, I2cConfig::STANDARD, log.clone());
    i2c.init();
    i2c.enable();
    assert_eq!(i2c.master_send_async(&[], 0x42), TransferState::Ready);

    let mut serviced = Serviced {
        i2c: RefCell::new(i2c),
        sim: sim.clone(),
    };
    let mut budget = PollBudget::new(8);
    assert_eq!(
        wait_idle(&mut serviced, &mut budget),
        Err(TransferError::Timeout)
    );

    assert!(serviced.i2c.borrow().is_idle());
    assert!(!sim.bus_busy());
    assert_eq!(log.events(), vec![Event::AckFailure]);
    assert_eq!(sim.transcript().last(), Some(&BusEvent::Stop));
}

#[test]
fn i2c_probe_of_present_device_succeeds() {
    let sim = SimI2c::new();
    sim.add_device(SENSOR, &[]);
    let regs = i2c_bench(&sim);

    let mut i2c = I2c::with_events(&regs, I2cInstance::I2c1, I2cConfig::STANDARD, EventLog::new());
    i2c.init();
    i2c.enable();
    i2c.master_send_async(&[], SENSOR);

    let mut serviced = Serviced {
        i2c: RefCell::new(i2c),
        sim: sim.clone(),
    };
    assert_eq!(wait_idle(&mut serviced, &mut PollBudget::new(8)), Ok(()));
    assert!(!sim.bus_busy());
}
