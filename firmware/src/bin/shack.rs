#![no_std]
#![no_main]

//! Shack node: Remote role on the RS-485 link plus the operator console.

use embassy_executor::Spawner;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use rotator_firmware::board::{self, Board};
use rotator_firmware::tasks::{button_task, console_task, shack_task};
use rotator_firmware::tasks::{ShackCommand, ShackView};
use rotator_firmware::usb;
use rotator_link::Remote;

// ── Inter-task channels ───────────────────────────────────────────────────────
static COMMAND_CHAN: Channel<CriticalSectionRawMutex, ShackCommand, 1> = Channel::new();
static VIEW_CHAN: Channel<CriticalSectionRawMutex, ShackView, 1> = Channel::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    // 2. USB console
    let (usb_dev, console) = usb::console(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // 3. RS-485 on USART2, DE/RE on PA8
    let cfg = board::link_config();
    if let Err(e) = cfg.validate() {
        defmt::panic!("bad link config: {}", e);
    }
    let Some(link) = board::rs485(p.USART2, p.PA3, p.PA2, p.PA8, &cfg) else {
        defmt::panic!("USART2 init failed");
    };
    defmt::info!("shack: remote @ {} baud", cfg.baud_rate);

    // 4. STOP button on PC0 (EXTI0)
    let stop = ExtiInput::new(Input::new(p.PC0, Pull::Up), p.EXTI0);

    // 5. Spawn tasks
    spawner
        .spawn(shack_task::shack_task(
            Remote::new(link, cfg),
            COMMAND_CHAN.receiver(),
            VIEW_CHAN.sender(),
        ))
        .unwrap();
    spawner
        .spawn(button_task::button_task(stop, COMMAND_CHAN.sender()))
        .unwrap();
    spawner
        .spawn(console_task::console_task(
            console,
            VIEW_CHAN.receiver(),
            COMMAND_CHAN.sender(),
        ))
        .unwrap();

    // 6. Pull a full status once the link has settled
    Timer::after(Duration::from_millis(500)).await;
    COMMAND_CHAN.send(ShackCommand::RefreshStatus).await;

    // 7. Main task: LED heartbeat @ 1 Hz
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
