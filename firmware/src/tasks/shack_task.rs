use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};

use rotator_link::Remote;

use super::{ShackCommand, ShackView};
use crate::board::{DirectionPin, Rs485Port};

/// Shack link loop: absorbs broadcasts and runs queued operator commands.
///
/// A command blocks this task for at most `retry_count × response_timeout`;
/// the console and button tasks keep running meanwhile.
#[task]
pub async fn shack_task(
    mut remote: Remote<Rs485Port, DirectionPin>,
    commands: Receiver<'static, CriticalSectionRawMutex, ShackCommand, 1>,
    view_tx: Sender<'static, CriticalSectionRawMutex, ShackView, 1>,
) {
    if remote.begin().is_err() {
        defmt::error!("shack: RS-485 direction pin stuck");
    }
    let mut last_command_ok = None;
    let mut was_connected = false;

    loop {
        remote.process().await;

        if let Ok(cmd) = commands.try_receive() {
            let ok = match cmd {
                ShackCommand::Stop => remote.send_stop().await,
                ShackCommand::Park => remote.send_park().await,
                ShackCommand::MoveTo { azimuth, elevation } => {
                    remote.send_move_to(azimuth, elevation).await
                }
                ShackCommand::RefreshStatus => remote.request_status().await,
            };
            if ok {
                defmt::info!("shack: {} ok", cmd);
            } else {
                defmt::warn!("shack: {} failed, nak={}", cmd, remote.last_nak());
            }
            last_command_ok = Some(ok);
        }

        let connected = remote.is_connected();
        if connected != was_connected {
            if connected {
                defmt::info!("shack: link up");
            } else {
                defmt::warn!("shack: link lost");
            }
            was_connected = connected;
        }

        let _ = view_tx.try_send(ShackView {
            state: *remote.state(),
            connected,
            success_rate: remote.success_rate(),
            last_command_ok,
        });
    }
}
