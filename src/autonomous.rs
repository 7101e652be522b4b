// Canned autonomous routine
//
// Runs on a dedicated blocking thread: every motion is issued through the
// capability traits and awaited on its completion handle. Waits are
// deadline-guarded so a jammed mechanism skips the step instead of hanging
// the rest of the routine.

use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use crate::motor::{
    AbsoluteAngularMotorSystem, AngularMotorSystem, Completion, LinearMotorSystem, MotorSystem,
};
use crate::robot::Robot;

/// Longest we let any single motion run before giving up on it.
const STEP_TIMEOUT: Duration = Duration::from_secs(5);

fn await_step(step: &str, mut handle: Completion) {
    if let Err(e) = handle.wait_deadline(STEP_TIMEOUT) {
        warn!("{}: {}", step, e);
    }
}

pub fn run(robot: &mut Robot) {
    info!("Autonomous start");

    // Unfold: push the tray out against its hardstop
    await_step("tray unfold", robot.tray.move_to_limit(40.0));

    // Shake the arm to drop the folded intake
    await_step("arm up", robot.arm.move_angle(0.1));
    await_step("arm down", robot.arm.move_angle(-0.1));

    // Run the rollers to grab the first cube
    robot.roller.lock().set_velocity(160.0);
    thread::sleep(Duration::from_secs(1));

    // Tray back to the carry position
    await_step("tray home", robot.tray.move_to_angle(0.0));
    robot.roller.lock().set_velocity(0.0);

    // Push a cube into the goal zone, then back out
    await_step(
        "drive forward",
        robot.straight_drive.lock().move_distance(12.0),
    );
    await_step(
        "drive back",
        robot.straight_drive.lock().move_distance(-12.0),
    );

    // Release the stack: back away while the rollers feed it out
    await_step("stack setdown", robot.stack_setdown.move_distance(8.0));

    robot.stop_all();
    info!("Autonomous finish");
}
