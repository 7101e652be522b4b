// Keyboard teleop: W/S drive, A/D turn, I/K roller, T/G tray, U/J arm,
// [ / ] speed, Q quit
//
// Publishes TeleopCommand at ~50 Hz. Held keys keep their velocity alive;
// any axis without input for INPUT_TIMEOUT_MS falls back to zero, and the
// runtime's own watchdog covers the case where this tool dies entirely.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::time::{Duration, Instant};
use tracing::info;

use towerbot_runtime::config::TOPIC_CMD_TELEOP;
use towerbot_runtime::messages::TeleopCommand;

const DRIVE_SPEEDS: [f64; 3] = [40.0, 90.0, 160.0]; // rpm
const ATTACHMENT_SPEEDS: [f64; 3] = [30.0, 60.0, 100.0]; // rpm
const INPUT_TIMEOUT_MS: u64 = 100; // Zero an axis after this long without input

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;
    let publisher = session.declare_publisher(TOPIC_CMD_TELEOP).await?;

    info!("Controls: W/S=drive, A/D=turn, I/K=roller, T/G=tray, U/J=arm, [/]=speed, Q=quit");
    info!("Speed: LOW");

    enable_raw_mode()?;
    let result = run_teleop(&publisher).await;
    disable_raw_mode()?;

    result
}

async fn run_teleop(
    publisher: &zenoh::pubsub::Publisher<'_>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut speed_idx: usize = 0;

    let mut drive = 0.0; // forward component, rpm
    let mut turn = 0.0; // turning component, rpm
    let mut roller = 0.0;
    let mut tray = 0.0;
    let mut arm = 0.0;
    let mut last_input = Instant::now();

    loop {
        // Poll for key with 20ms timeout (50Hz effective rate)
        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(KeyEvent { code, kind, .. }) = event::read()? {
                let pressed = kind == KeyEventKind::Press || kind == KeyEventKind::Repeat;
                if pressed {
                    let mut moved = true;
                    match code {
                        KeyCode::Char('w') => drive = DRIVE_SPEEDS[speed_idx],
                        KeyCode::Char('s') => drive = -DRIVE_SPEEDS[speed_idx],
                        KeyCode::Char('a') => turn = -DRIVE_SPEEDS[speed_idx],
                        KeyCode::Char('d') => turn = DRIVE_SPEEDS[speed_idx],

                        KeyCode::Char('i') => roller = ATTACHMENT_SPEEDS[speed_idx],
                        KeyCode::Char('k') => roller = -ATTACHMENT_SPEEDS[speed_idx],
                        KeyCode::Char('t') => tray = ATTACHMENT_SPEEDS[speed_idx],
                        KeyCode::Char('g') => tray = -ATTACHMENT_SPEEDS[speed_idx],
                        KeyCode::Char('u') => arm = ATTACHMENT_SPEEDS[speed_idx],
                        KeyCode::Char('j') => arm = -ATTACHMENT_SPEEDS[speed_idx],

                        KeyCode::Char(']') => {
                            speed_idx = (speed_idx + 1).min(2);
                            print_speed(speed_idx);
                            moved = false;
                        }
                        KeyCode::Char('[') => {
                            speed_idx = speed_idx.saturating_sub(1);
                            print_speed(speed_idx);
                            moved = false;
                        }

                        KeyCode::Char('q') | KeyCode::Esc => break,

                        _ => moved = false,
                    }
                    if moved {
                        last_input = Instant::now();
                    }
                }
            }
        }

        // Zero everything if no movement input recently
        if last_input.elapsed() > Duration::from_millis(INPUT_TIMEOUT_MS) {
            drive = 0.0;
            turn = 0.0;
            roller = 0.0;
            tray = 0.0;
            arm = 0.0;
        }

        let cmd = TeleopCommand {
            left_drive_rpm: drive + turn,
            right_drive_rpm: drive - turn,
            roller_rpm: roller,
            tray_rpm: tray,
            arm_rpm: arm,
        };
        publisher.put(serde_json::to_string(&cmd)?).await?;
    }

    Ok(())
}

fn print_speed(idx: usize) {
    let label = ["LOW", "MED", "HIGH"][idx];
    info!("Speed: {}", label);
}
