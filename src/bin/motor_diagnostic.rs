// Motor diagnostic: READ-ONLY check of every motor on the bus
//
// Pings each configured motor and dumps its mode/position registers.
// Nothing is written, so it is safe to run with the robot on the ground.
//
// Usage: cargo run --bin motor_diagnostic -- [port]

use towerbot_runtime::config::{
    MOTOR_ID_ARM, MOTOR_ID_LEFT_DRIVE, MOTOR_ID_LEFT_ROLLER, MOTOR_ID_RIGHT_DRIVE,
    MOTOR_ID_RIGHT_ROLLER, MOTOR_ID_TRAY, MOTOR_PORT,
};
use towerbot_runtime::motor::bus::{MotorBus, Register, TICKS_PER_MOTOR_REV};

const MOTORS: [(&str, u8); 6] = [
    ("Left drive", MOTOR_ID_LEFT_DRIVE),
    ("Right drive", MOTOR_ID_RIGHT_DRIVE),
    ("Arm", MOTOR_ID_ARM),
    ("Tray", MOTOR_ID_TRAY),
    ("Left roller", MOTOR_ID_LEFT_ROLLER),
    ("Right roller", MOTOR_ID_RIGHT_ROLLER),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let port = std::env::args()
        .nth(1)
        .unwrap_or_else(|| MOTOR_PORT.to_string());

    println!("Towerbot motor diagnostic (read-only)");
    println!("Serial port: {}", port);
    println!();

    let mut bus = match MotorBus::open(&port) {
        Ok(bus) => {
            println!("Serial port opened");
            bus
        }
        Err(e) => {
            println!("Failed to open serial port: {}", e);
            println!("Check the port path and that the USB cable is connected.");
            return Err(e.into());
        }
    };

    let mut all_found = true;
    println!("Pinging motors...");
    for (name, id) in MOTORS {
        match bus.ping(id) {
            Ok(true) => println!("  {} (ID {}): responding", name, id),
            Ok(false) => {
                println!("  {} (ID {}): NO RESPONSE", name, id);
                all_found = false;
            }
            Err(e) => {
                println!("  {} (ID {}): error: {}", name, id, e);
                all_found = false;
            }
        }
    }
    println!();

    if !all_found {
        println!("Not all motors responded; check power and wiring.");
        println!("Continuing with the ones that did.");
        println!();
    }

    for (name, id) in MOTORS {
        println!("=== {} (ID {}) ===", name, id);

        match bus.firmware_version(id) {
            Ok((major, minor)) => println!("  Firmware:         v{}.{}", major, minor),
            Err(e) => println!("  Firmware:         ERROR - {}", e),
        }

        match bus.read_u8(id, Register::OperatingMode) {
            Ok(mode) => {
                let mode_str = match mode {
                    0 => "position",
                    1 => "velocity",
                    _ => "unknown",
                };
                println!("  Operating mode:   {} ({})", mode, mode_str);
            }
            Err(e) => println!("  Operating mode:   ERROR - {}", e),
        }

        match bus.read_u8(id, Register::TorqueEnable) {
            Ok(val) => println!(
                "  Torque:           {}",
                if val == 1 { "enabled" } else { "disabled" }
            ),
            Err(e) => println!("  Torque:           ERROR - {}", e),
        }

        match bus.present_position(id) {
            Ok(ticks) => {
                let revs = ticks as f64 / TICKS_PER_MOTOR_REV;
                println!("  Present position: {} ticks ({:.2} motor revs)", ticks, revs);
            }
            Err(e) => println!("  Present position: ERROR - {}", e),
        }

        match bus.present_velocity(id) {
            Ok(rpm) => println!("  Present velocity: {} rpm", rpm),
            Err(e) => println!("  Present velocity: ERROR - {}", e),
        }

        println!();
    }

    println!("Diagnostic complete.");
    println!("Stationary motors should read ~0 rpm; if everything responded,");
    println!("bring the runtime up with: cargo run -- --port {}", port);

    Ok(())
}
