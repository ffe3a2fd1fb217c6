pub mod antenna_task;
pub mod button_task;
pub mod console_task;
pub mod shack_task;

use rotator_link::RotatorState;

/// Operator requests queued for the shack link task.
pub use rotator_link::OperatorCommand as ShackCommand;

/// What the console shows after each link iteration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShackView {
    pub state: RotatorState,
    pub connected: bool,
    pub success_rate: f32,
    pub last_command_ok: Option<bool>,
}
