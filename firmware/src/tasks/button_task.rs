use embassy_executor::task;
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::peripherals::PC0;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Timer};

use super::ShackCommand;

/// STOP push-button, active low.
#[task]
pub async fn button_task(
    mut stop: ExtiInput<'static, PC0>,
    commands: Sender<'static, CriticalSectionRawMutex, ShackCommand, 1>,
) {
    loop {
        stop.wait_for_falling_edge().await;
        Timer::after(Duration::from_millis(30)).await;
        if stop.is_low() {
            // a STOP must not be dropped behind a pending request
            commands.send(ShackCommand::Stop).await;
            stop.wait_for_high().await;
        }
    }
}
