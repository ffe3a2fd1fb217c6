#![no_std]
#![no_main]

//! Antenna node: Master role on the RS-485 link.

use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use rotator_firmware::board::{self, Board};
use rotator_firmware::tasks::antenna_task::antenna_task;
use rotator_link::{Master, RotatorState};

// Cap=1: the LED only cares about the latest snapshot.
static STATE_CHAN: Channel<CriticalSectionRawMutex, RotatorState, 1> = Channel::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    // 2. RS-485 on USART2, DE/RE on PA8
    let cfg = board::link_config();
    if let Err(e) = cfg.validate() {
        defmt::panic!("bad link config: {}", e);
    }
    let Some(link) = board::rs485(p.USART2, p.PA3, p.PA2, p.PA8, &cfg) else {
        defmt::panic!("USART2 init failed");
    };
    defmt::info!("antenna: master @ {} baud", cfg.baud_rate);

    // 3. Link task
    spawner
        .spawn(antenna_task(Master::new(link, cfg), STATE_CHAN.sender()))
        .unwrap();

    // 4. Heartbeat LED (PC13): 1 Hz idle, 5 Hz while slewing
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);
    let mut moving = false;
    loop {
        if let Ok(state) = STATE_CHAN.try_receive() {
            moving = state.status_flags.is_moving();
        }
        led.toggle();
        let half_period = if moving { 100 } else { 500 };
        Timer::after(Duration::from_millis(half_period)).await;
    }
}
