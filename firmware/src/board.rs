use embassy_stm32::gpio::{AnyPin, Level, Output, Pin, Speed};
use embassy_stm32::peripherals::{PA2, PA3, PA8, USART2};
use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz as TimeHertz;
use embassy_stm32::usart::{
    BufferedInterruptHandler, BufferedUart, Config as UsartConfig, DataBits, Parity, StopBits,
};
use embassy_stm32::{bind_interrupts, Config};
use static_cell::StaticCell;

use rotator_link::{LinkConfig, Transport};

bind_interrupts!(pub struct Rs485Irqs {
    USART2 => BufferedInterruptHandler<USART2>;
});

/// UART wired to the MAX485 (TX=PA2, RX=PA3).
pub type Rs485Port = BufferedUart<'static, USART2>;
/// DE and /RE tied together on PA8, high drives the bus.
pub type DirectionPin = Output<'static, AnyPin>;
pub type Rs485Link = Transport<Rs485Port, DirectionPin>;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: TimeHertz(8_000_000),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2), // 168 MHz
            divq: Some(PllQDiv::DIV7), // 48 MHz USB
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        let p = embassy_stm32::init(config);

        Self { p }
    }
}

/// Link parameters as flashed on both stations.
pub fn link_config() -> LinkConfig {
    LinkConfig {
        // flush returns when the TX buffer drains, the last character still
        // needs ~1 ms on the wire at 9600 baud
        turnaround_guard_us: 1_100,
        ..LinkConfig::default()
    }
}

/// 8N1 at the configured baud rate.
pub fn rs485_uart_config(link: &LinkConfig) -> UsartConfig {
    let mut config = UsartConfig::default();
    config.baudrate = link.baud_rate;
    config.data_bits = DataBits::DataBits8;
    config.parity = Parity::ParityNone;
    config.stop_bits = StopBits::STOP1;
    config
}

static TX_BUF: StaticCell<[u8; 128]> = StaticCell::new();
static RX_BUF: StaticCell<[u8; 256]> = StaticCell::new();

/// Bring up USART2 and the direction line. Call once.
pub fn rs485(
    usart: USART2,
    rx: PA3,
    tx: PA2,
    de: PA8,
    link: &LinkConfig,
) -> Option<Rs485Link> {
    let tx_buf = TX_BUF.init([0; 128]);
    let rx_buf = RX_BUF.init([0; 256]);
    let uart = BufferedUart::new(
        usart,
        Rs485Irqs,
        rx,
        tx,
        tx_buf,
        rx_buf,
        rs485_uart_config(link),
    )
    .ok()?;
    let de = Output::new(de.degrade(), Level::Low, Speed::VeryHigh);
    Some(Transport::new(uart, de, link))
}
