use core::fmt::Write;

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Ticker};
use heapless::String;

use super::{ShackCommand, ShackView};
use crate::usb::{Console, ConsoleTx, CONSOLE_PACKET};

const HELP: &str = "commands: stop | park | status | goto <az> <el>\r\n";

/// Operator console over USB CDC-ACM.
///
/// Prints a status line at 2 Hz and turns typed lines into link commands.
#[task]
pub async fn console_task(
    console: Console,
    view_rx: Receiver<'static, CriticalSectionRawMutex, ShackView, 1>,
    commands: Sender<'static, CriticalSectionRawMutex, ShackCommand, 1>,
) {
    let Console { mut tx, mut rx } = console;
    let mut view = ShackView::default();
    let mut ticker = Ticker::every(Duration::from_millis(500));
    let mut packet = [0u8; CONSOLE_PACKET as usize];
    let mut line = String::<32>::new();
    let mut overlong = false;

    loop {
        match select(ticker.next(), rx.read_packet(&mut packet)).await {
            Either::First(()) => {
                if let Ok(v) = view_rx.try_receive() {
                    view = v;
                }
                if tx.dtr() {
                    print_status(&mut tx, &view).await;
                }
            }
            Either::Second(Ok(n)) => {
                for &b in &packet[..n] {
                    if b != b'\r' && b != b'\n' {
                        overlong |= line.push(b as char).is_err();
                        continue;
                    }
                    if line.is_empty() && !overlong {
                        continue;
                    }
                    let parsed = if overlong { None } else { ShackCommand::parse(&line) };
                    match parsed {
                        Some(cmd) => {
                            defmt::info!("console: {}", cmd);
                            commands.send(cmd).await;
                        }
                        None => {
                            let _ = tx.write_packet(HELP.as_bytes()).await;
                        }
                    }
                    line.clear();
                    overlong = false;
                }
            }
            Either::Second(Err(_)) => {
                line.clear();
                overlong = false;
                rx.wait_connection().await;
            }
        }
    }
}

async fn print_status(tx: &mut ConsoleTx, view: &ShackView) {
    let s = &view.state;
    let mut m = String::<128>::new();
    let _ = write!(
        m,
        "[ROT] az={:.1}/{:.1} el={:.1}/{:.1} flags={:#04x} err={}\r\n",
        s.azimuth_current,
        s.azimuth_target,
        s.elevation_current,
        s.elevation_target,
        s.status_flags.bits(),
        s.error_code
    );
    let _ = tx.write_packet(m.as_bytes()).await;

    let mut m = String::<64>::new();
    let last = match view.last_command_ok {
        Some(true) => "ok",
        Some(false) => "FAILED",
        None => "-",
    };
    let _ = write!(
        m,
        "[LINK] {} {:.0}% last={}\r\n",
        if view.connected { "up" } else { "LOST" },
        view.success_rate,
        last
    );
    let _ = tx.write_packet(m.as_bytes()).await;
}
