// Timeouts, topics, motor ports, robot geometry
use std::time::Duration;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Inter-poll delay used by blocking completion waits
pub const POLL_INTERVAL: Duration = Duration::from_millis(2);

// Zenoh topics
pub const TOPIC_CMD_TELEOP: &str = "towerbot/cmd/teleop"; // commands
pub const TOPIC_RT_ACTUATION: &str = "towerbot/rt/actuation"; // actuation echo
pub const TOPIC_HEALTH: &str = "towerbot/state/health"; // health status

// Serial port for the smart-motor bus
pub const MOTOR_PORT: &str = "/dev/ttyACM0";

// Motor ids on the bus (as configured in the motors)
pub const MOTOR_ID_LEFT_DRIVE: u8 = 11;
pub const MOTOR_ID_RIGHT_DRIVE: u8 = 20;
pub const MOTOR_ID_ARM: u8 = 1;
pub const MOTOR_ID_TRAY: u8 = 8;
pub const MOTOR_ID_LEFT_ROLLER: u8 = 2;
pub const MOTOR_ID_RIGHT_ROLLER: u8 = 9;

// Robot geometry
pub const WHEEL_DIAMETER_IN: f64 = 3.25;
pub const TRACK_WIDTH_IN: f64 = 9.75;
pub const ROLLER_RADIUS_IN: f64 = 1.25;

// Output rotations of the actuator per commanded tray/arm unit
pub const TRAY_RATIO: f64 = 7.0;
pub const ARM_RATIO: f64 = 5.0;

// Default commanded speeds until a caller overrides them
pub const DRIVE_SPEED_RPM: f64 = 120.0;
pub const ROLLER_SPEED_RPM: f64 = 160.0;
pub const TRAY_SPEED_RPM: f64 = 60.0;
pub const ARM_SPEED_RPM: f64 = 80.0;
