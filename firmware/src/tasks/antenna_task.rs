use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Timer};

use rotator_link::{Master, RotatorState};

use crate::board::{DirectionPin, Rs485Port};
use crate::slew::Slew;

/// Antenna link loop: one `Master::process` per iteration.
///
/// The receive window inside `process` paces the loop; the short sleep only
/// yields to the LED task when the bus is busy.
#[task]
pub async fn antenna_task(
    mut master: Master<Rs485Port, DirectionPin>,
    state_tx: Sender<'static, CriticalSectionRawMutex, RotatorState, 1>,
) {
    let mut slew = Slew::new();
    if master.begin().is_err() {
        defmt::error!("antenna: RS-485 direction pin stuck");
    }

    loop {
        master.process(&mut slew).await;
        let _ = state_tx.try_send(*master.state());
        Timer::after(Duration::from_millis(1)).await;
    }
}
