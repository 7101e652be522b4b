// 50 Hz teleop loop with watchdog
//
// The watchdog zeros every assembly if teleop stops sending commands, so a
// crashed publisher cannot leave the robot driving. Teleop is velocity-only
// by design: blocking completion waits stay out of this loop so it never
// stalls the tick.

use std::time::Instant;

use tokio::time::{interval, Duration};
use tracing::{info, warn};

use crate::config::{CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_TELEOP, TOPIC_HEALTH, TOPIC_RT_ACTUATION};
use crate::messages::{Actuation, RuntimeHealth, TeleopCommand};
use crate::motor::MotorSystem;
use crate::robot::Robot;

pub struct Runtime {
    latest_cmd: Option<TeleopCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: TeleopCommand) {
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Compute actuation based on watchdog state
    fn compute_actuation(&mut self) -> Actuation {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > CMD_TIMEOUT {
            // Watchdog tripped - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            Actuation::default() // Zero velocity
        } else if let Some(ref cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            Actuation::from(cmd)
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            Actuation::default()
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Push this tick's actuation into the assemblies.
fn apply_actuation(robot: &mut Robot, actuation: &Actuation) {
    robot.left_wheel.lock().set_velocity(actuation.left_drive_rpm);
    robot.right_wheel.lock().set_velocity(actuation.right_drive_rpm);
    robot.roller.lock().set_velocity(actuation.roller_rpm);
    robot.tray.set_velocity(actuation.tray_rpm);
    robot.arm.set_velocity(actuation.arm_rpm);
}

pub async fn run(mut robot: Robot) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let subscriber = session.declare_subscriber(TOPIC_CMD_TELEOP).await?;
    let pub_actuation = session.declare_publisher(TOPIC_RT_ACTUATION).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}", TOPIC_CMD_TELEOP);
    info!("Publishing to: {}, {}", TOPIC_RT_ACTUATION, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = subscriber.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<TeleopCommand>(&payload) {
                Ok(cmd) => {
                    runtime.on_command(cmd);
                }
                Err(e) => {
                    warn!("Failed to parse command: {}", e);
                }
            }
        }

        // 2. Compute actuation (includes watchdog logic)
        let actuation = runtime.compute_actuation();

        // 3. Drive the assemblies
        apply_actuation(&mut robot, &actuation);

        // 4. Publish actuation echo and health
        let actuation_json = serde_json::to_string(&actuation)?;
        pub_actuation.put(actuation_json).await?;

        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(rpm: f64) -> TeleopCommand {
        TeleopCommand {
            left_drive_rpm: rpm,
            right_drive_rpm: rpm,
            roller_rpm: 0.0,
            tray_rpm: 0.0,
            arm_rpm: 0.0,
        }
    }

    #[test]
    fn fresh_command_passes_through() {
        let mut runtime = Runtime::new();
        runtime.on_command(cmd(80.0));

        let actuation = runtime.compute_actuation();
        assert_eq!(actuation.left_drive_rpm, 80.0);
        assert_eq!(runtime.health, RuntimeHealth::Ok);
    }

    #[test]
    fn stale_command_zeros_actuation() {
        let mut runtime = Runtime::new();
        runtime.on_command(cmd(80.0));
        runtime.cmd_received_at = Instant::now() - (CMD_TIMEOUT * 2);

        let actuation = runtime.compute_actuation();
        assert_eq!(actuation.left_drive_rpm, 0.0);
        assert_eq!(runtime.health, RuntimeHealth::CmdStale);
    }

    #[test]
    fn starts_stale_until_first_command() {
        let mut runtime = Runtime::new();
        let actuation = runtime.compute_actuation();
        assert_eq!(actuation.left_drive_rpm, 0.0);
        assert_eq!(runtime.health, RuntimeHealth::CmdStale);
    }
}
