//! USB CDC-ACM operator console for the shack node.
//!
//! The class is split so the console task can read typed commands while the
//! status line is written from the same task.

use embassy_stm32::usb_otg::{self, Driver};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender, State};
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(pub struct Irqs {
    OTG_FS => usb_otg::InterruptHandler<peripherals::USB_OTG_FS>;
});

pub type UsbDriver = Driver<'static, peripherals::USB_OTG_FS>;
pub type ConsoleTx = Sender<'static, UsbDriver>;
pub type ConsoleRx = Receiver<'static, UsbDriver>;

/// Full-speed bulk packet size.
pub const CONSOLE_PACKET: u16 = 64;

static EP_OUT_BUF: StaticCell<[u8; 256]> = StaticCell::new();
static CONFIG_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESC: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();
static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();

pub struct Console {
    pub tx: ConsoleTx,
    pub rx: ConsoleRx,
}

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Bring up the OTG_FS port (DP=PA12, DM=PA11) as a serial console. Call once;
/// a second call panics on the already-taken static cells.
pub fn console(
    usb_periph: peripherals::USB_OTG_FS,
    pa12: peripherals::PA12,
    pa11: peripherals::PA11,
) -> (UsbDevice<'static, UsbDriver>, Console) {
    let mut otg_config = usb_otg::Config::default();
    otg_config.vbus_detection = false;
    let driver = Driver::new_fs(
        usb_periph,
        Irqs,
        pa12,
        pa11,
        EP_OUT_BUF.init([0; 256]),
        otg_config,
    );

    let mut config = Config::new(0xc0de, 0xcafe);
    config.manufacturer = Some("rotator-link");
    config.product = Some("Rotator shack console");
    config.serial_number = Some("SHACK001");
    config.max_packet_size_0 = 64;

    let mut builder = Builder::new(
        driver,
        config,
        CONFIG_DESC.init([0; 256]),
        BOS_DESC.init([0; 256]),
        &mut [], // no MS OS descriptors
        CONTROL_BUF.init([0; 64]),
    );

    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), CONSOLE_PACKET);
    let (tx, rx) = class.split();
    (builder.build(), Console { tx, rx })
}
