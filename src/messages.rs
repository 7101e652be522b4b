// Message types exchanged over zenoh

use serde::{Deserialize, Serialize};

/// Command from teleop/scripts -> runtime.
///
/// Tank-drive wheel speeds plus attachment speeds, all in signed rpm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleopCommand {
    pub left_drive_rpm: f64,
    pub right_drive_rpm: f64,
    pub roller_rpm: f64,
    pub tray_rpm: f64,
    pub arm_rpm: f64,
}

/// What the runtime actually applied this tick (zeros when the watchdog
/// has tripped).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Actuation {
    pub left_drive_rpm: f64,
    pub right_drive_rpm: f64,
    pub roller_rpm: f64,
    pub tray_rpm: f64,
    pub arm_rpm: f64,
}

impl From<&TeleopCommand> for Actuation {
    fn from(cmd: &TeleopCommand) -> Self {
        Self {
            left_drive_rpm: cmd.left_drive_rpm,
            right_drive_rpm: cmd.right_drive_rpm,
            roller_rpm: cmd.roller_rpm,
            tray_rpm: cmd.tray_rpm,
            arm_rpm: cmd.arm_rpm,
        }
    }
}

/// Health status published by the runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
