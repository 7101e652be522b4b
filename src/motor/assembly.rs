// Kinematic assemblies and the capability traits they implement
//
// An assembly composes one or more actuators behind a robot-level unit
// (inches of travel, commanded rotations) and hands back a Completion
// handle covering every actuator it touched. Assemblies are wired once at
// bring-up by the device registry and live for the process lifetime.

use std::f64::consts::PI;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::actuator::ActuatorRef;
use super::completion::Completion;

/// Base capability: continuous rotation at a signed speed.
pub trait MotorSystem {
    /// Spin at `rpm` until told otherwise. Fire-and-forget; hardware faults
    /// are not surfaced here.
    fn set_velocity(&mut self, rpm: f64);
}

/// Relative angular positioning in commanded rotations.
pub trait AngularMotorSystem: MotorSystem {
    /// Start a relative move of `rotations` (signed) and return its handle.
    fn move_angle(&mut self, rotations: f64) -> Completion;

    /// Speed used by subsequent positioning moves. Does not affect motions
    /// already in flight.
    fn set_speed(&mut self, rpm: f64);
}

/// Relative linear positioning in inches.
pub trait LinearMotorSystem: MotorSystem {
    /// Start a relative move of `inches` (signed) and return its handle.
    fn move_distance(&mut self, inches: f64) -> Completion;

    /// Speed used by subsequent positioning moves. Does not affect motions
    /// already in flight.
    fn set_speed(&mut self, rpm: f64);
}

/// Angular positioning against an absolute reference, for assemblies with a
/// meaningful home position (the tray).
pub trait AbsoluteAngularMotorSystem: AngularMotorSystem {
    /// Start a move to the absolute position `rotations` and return its
    /// handle.
    fn move_to_angle(&mut self, rotations: f64) -> Completion;
}

/// Single driven wheel: one actuator plus the wheel diameter that turns
/// inches into actuator rotations.
pub struct Wheel {
    actuator: ActuatorRef,
    diameter_in: f64,
    speed_rpm: f64,
}

/// Wheels are shared between the straight and turn drives that sit above
/// them. Callers must not issue overlapping straight/turn commands; the
/// wheels do not arbitrate.
pub type SharedWheel = Arc<Mutex<Wheel>>;

impl Wheel {
    pub fn new(actuator: ActuatorRef, diameter_in: f64, speed_rpm: f64) -> Self {
        Self {
            actuator,
            diameter_in,
            speed_rpm,
        }
    }

    pub fn shared(self) -> SharedWheel {
        Arc::new(Mutex::new(self))
    }
}

impl MotorSystem for Wheel {
    fn set_velocity(&mut self, rpm: f64) {
        self.actuator.lock().set_velocity(rpm);
    }
}

impl LinearMotorSystem for Wheel {
    fn move_distance(&mut self, inches: f64) -> Completion {
        let rotations = inches / (self.diameter_in * PI);
        debug!(inches, rotations, "wheel relative move");

        let mut actuator = self.actuator.lock();
        // Target is computed from the position read *before* the move is
        // issued; reading afterwards would race the firmware's own updates.
        let target = actuator.position() + rotations;
        actuator.move_relative(rotations, self.speed_rpm);
        drop(actuator);

        Completion::position(self.actuator.clone(), target)
    }

    fn set_speed(&mut self, rpm: f64) {
        self.speed_rpm = rpm;
    }
}

/// Differential drivetrain, turning: both wheels travel the same arc in
/// opposite directions.
pub struct TurnDrive {
    left: SharedWheel,
    right: SharedWheel,
    track_width_in: f64,
}

impl TurnDrive {
    pub fn new(left: SharedWheel, right: SharedWheel, track_width_in: f64) -> Self {
        Self {
            left,
            right,
            track_width_in,
        }
    }
}

impl MotorSystem for TurnDrive {
    fn set_velocity(&mut self, rpm: f64) {
        self.left.lock().set_velocity(rpm);
        self.right.lock().set_velocity(-rpm);
    }
}

impl AngularMotorSystem for TurnDrive {
    fn move_angle(&mut self, rotations: f64) -> Completion {
        // One full robot rotation walks each wheel along the turning circle
        // circumference.
        let arc_in = self.track_width_in * PI * rotations;
        debug!(rotations, arc_in, "turn drive move");
        Completion::all(vec![
            self.left.lock().move_distance(arc_in),
            self.right.lock().move_distance(-arc_in),
        ])
    }

    fn set_speed(&mut self, rpm: f64) {
        self.left.lock().set_speed(rpm);
        self.right.lock().set_speed(rpm);
    }
}

/// Differential drivetrain, straight-line: both wheels travel the same
/// signed distance.
pub struct StraightDrive {
    left: SharedWheel,
    right: SharedWheel,
}

impl StraightDrive {
    pub fn new(left: SharedWheel, right: SharedWheel) -> Self {
        Self { left, right }
    }
}

impl MotorSystem for StraightDrive {
    fn set_velocity(&mut self, rpm: f64) {
        self.left.lock().set_velocity(rpm);
        self.right.lock().set_velocity(rpm);
    }
}

impl LinearMotorSystem for StraightDrive {
    fn move_distance(&mut self, inches: f64) -> Completion {
        debug!(inches, "straight drive move");
        Completion::all(vec![
            self.left.lock().move_distance(inches),
            self.right.lock().move_distance(inches),
        ])
    }

    fn set_speed(&mut self, rpm: f64) {
        self.left.lock().set_speed(rpm);
        self.right.lock().set_speed(rpm);
    }
}

/// Intake roller pair. Each motor is wrapped as a wheel whose diameter is
/// the roller's, so "distance" is inches of material pulled through.
pub struct Roller {
    left: Wheel,
    right: Wheel,
}

impl Roller {
    pub fn new(
        left_actuator: ActuatorRef,
        right_actuator: ActuatorRef,
        roller_radius_in: f64,
        speed_rpm: f64,
    ) -> Self {
        let diameter = 2.0 * roller_radius_in;
        Self {
            left: Wheel::new(left_actuator, diameter, speed_rpm),
            right: Wheel::new(right_actuator, diameter, speed_rpm),
        }
    }
}

impl MotorSystem for Roller {
    fn set_velocity(&mut self, rpm: f64) {
        self.left.set_velocity(rpm);
        self.right.set_velocity(rpm);
    }
}

impl LinearMotorSystem for Roller {
    fn move_distance(&mut self, inches: f64) -> Completion {
        Completion::all(vec![
            self.left.move_distance(inches),
            self.right.move_distance(inches),
        ])
    }

    fn set_speed(&mut self, rpm: f64) {
        self.left.set_speed(rpm);
        self.right.set_speed(rpm);
    }
}

/// Cube tray: single actuator with both relative and absolute positioning.
/// Commanded angles are scaled by a fixed actuator-rotations-per-unit ratio.
pub struct Tray {
    actuator: ActuatorRef,
    ratio: f64,
    speed_rpm: f64,
}

impl Tray {
    pub fn new(actuator: ActuatorRef, ratio: f64, speed_rpm: f64) -> Self {
        Self {
            actuator,
            ratio,
            speed_rpm,
        }
    }

    /// Drive the tray at `rpm` into its mechanical stop and return a handle
    /// that completes, and stops the motor, once the tray quits moving.
    pub fn move_to_limit(&mut self, rpm: f64) -> Completion {
        debug!(rpm, "tray moving to hardstop");
        self.actuator.lock().set_velocity(rpm);
        Completion::until_stall(self.actuator.clone())
    }
}

impl MotorSystem for Tray {
    fn set_velocity(&mut self, rpm: f64) {
        self.actuator.lock().set_velocity(rpm);
    }
}

impl AngularMotorSystem for Tray {
    fn move_angle(&mut self, rotations: f64) -> Completion {
        let delta = rotations * self.ratio;
        let mut actuator = self.actuator.lock();
        let target = actuator.position() + delta;
        actuator.move_relative(delta, self.speed_rpm);
        drop(actuator);
        Completion::position(self.actuator.clone(), target)
    }

    fn set_speed(&mut self, rpm: f64) {
        self.speed_rpm = rpm;
    }
}

impl AbsoluteAngularMotorSystem for Tray {
    fn move_to_angle(&mut self, rotations: f64) -> Completion {
        let target = rotations * self.ratio;
        self.actuator.lock().move_absolute(target, self.speed_rpm);
        Completion::position(self.actuator.clone(), target)
    }
}

/// Lift arm driven by one or two actuators in lockstep.
pub struct Arm {
    actuators: Vec<ActuatorRef>,
    ratio: f64,
    speed_rpm: f64,
}

impl Arm {
    pub fn single(actuator: ActuatorRef, ratio: f64, speed_rpm: f64) -> Self {
        Self {
            actuators: vec![actuator],
            ratio,
            speed_rpm,
        }
    }

    pub fn dual(left: ActuatorRef, right: ActuatorRef, ratio: f64, speed_rpm: f64) -> Self {
        Self {
            actuators: vec![left, right],
            ratio,
            speed_rpm,
        }
    }
}

impl MotorSystem for Arm {
    fn set_velocity(&mut self, rpm: f64) {
        for actuator in &self.actuators {
            actuator.lock().set_velocity(rpm);
        }
    }
}

impl AngularMotorSystem for Arm {
    fn move_angle(&mut self, rotations: f64) -> Completion {
        let delta = rotations * self.ratio;
        let mut handles = Vec::with_capacity(self.actuators.len());
        for actuator in &self.actuators {
            let mut guard = actuator.lock();
            let target = guard.position() + delta;
            guard.move_relative(delta, self.speed_rpm);
            drop(guard);
            handles.push(Completion::position(actuator.clone(), target));
        }
        Completion::all(handles)
    }

    fn set_speed(&mut self, rpm: f64) {
        self.speed_rpm = rpm;
    }
}

/// Stack setdown: back the chassis away from a placed stack while the
/// rollers feed forward at the same surface speed, so the stack releases
/// without slip. Owns no actuators; borrows the drive and roller.
pub struct StackSetdown {
    drive: Arc<Mutex<StraightDrive>>,
    roller: Arc<Mutex<Roller>>,
}

impl StackSetdown {
    pub fn new(drive: Arc<Mutex<StraightDrive>>, roller: Arc<Mutex<Roller>>) -> Self {
        Self { drive, roller }
    }
}

impl MotorSystem for StackSetdown {
    fn set_velocity(&mut self, rpm: f64) {
        self.drive.lock().set_velocity(-rpm);
        self.roller.lock().set_velocity(rpm);
    }
}

impl LinearMotorSystem for StackSetdown {
    fn move_distance(&mut self, inches: f64) -> Completion {
        debug!(inches, "stack setdown");
        // Both sub-commands are issued before the handle is returned.
        Completion::all(vec![
            self.drive.lock().move_distance(-inches),
            self.roller.lock().move_distance(inches),
        ])
    }

    fn set_speed(&mut self, rpm: f64) {
        self.drive.lock().set_speed(rpm);
        self.roller.lock().set_speed(rpm);
    }
}
