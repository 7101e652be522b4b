// Motor control module for the towerbot
//
// Provides:
// - The Actuator contract a single motor must satisfy
// - Completion handles for in-flight motions (pollable, awaitable)
// - Capability traits and the kinematic assemblies implementing them
// - Serial smart-motor bus backend and a simulated backend

pub mod actuator;
pub mod assembly;
pub mod bus;
pub mod completion;
pub mod sim;

pub use actuator::{Actuator, ActuatorRef, BrakeMode};
pub use assembly::{
    AbsoluteAngularMotorSystem, AngularMotorSystem, Arm, LinearMotorSystem, MotorSystem, Roller,
    SharedWheel, StackSetdown, StraightDrive, Tray, TurnDrive, Wheel,
};
pub use bus::{BusActuator, BusError, MotorBus};
pub use completion::{Completion, Progress, WaitTimeout};
pub use sim::SimActuator;
