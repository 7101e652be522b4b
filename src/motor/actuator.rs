// Actuator contract consumed by the kinematic assemblies
//
// A single physical motor with onboard position control: the firmware runs
// its own closed loop, so relative/absolute moves return immediately and the
// motor keeps moving in the background. Completion of a move is observed by
// reading `position` back, never by blocking here.

use std::sync::Arc;

use parking_lot::Mutex;

/// Behavior of the motor when its commanded velocity is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrakeMode {
    /// Freewheel to a stop
    Coast,
    /// Short the windings to stop quickly
    Brake,
    /// Actively servo back to the stop position
    Hold,
}

/// A single physical motor.
///
/// Positions are accumulated output-shaft rotations (signed, not wrapped).
/// Hardware faults are not surfaced at this layer: implementations log and
/// carry on, so callers never see a transport error mid-motion.
pub trait Actuator {
    /// Current accumulated position in output-shaft rotations.
    fn position(&mut self) -> f64;

    /// Start a move of `delta` rotations relative to the current position,
    /// capped at `speed_rpm`. Returns immediately.
    fn move_relative(&mut self, delta: f64, speed_rpm: f64);

    /// Start a move to an absolute position in rotations, capped at
    /// `speed_rpm`. Returns immediately.
    fn move_absolute(&mut self, target: f64, speed_rpm: f64);

    /// Spin continuously at a signed speed. Zero stops per the brake mode.
    fn set_velocity(&mut self, rpm: f64);

    /// Configure the zero-velocity behavior.
    fn set_brake_mode(&mut self, mode: BrakeMode);
}

/// Shared handle to an actuator.
///
/// Exactly one leaf assembly owns the actuator logically; the ref-count
/// exists so completion handles can read position back after the command
/// was issued.
pub type ActuatorRef = Arc<Mutex<dyn Actuator + Send>>;

#[cfg(test)]
pub(crate) mod mock {
    use super::{Actuator, ActuatorRef, BrakeMode};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Every command issued to a [`MockActuator`], in order.
    #[derive(Debug, Clone, PartialEq)]
    pub enum IssuedCommand {
        MoveRelative { delta: f64, speed_rpm: f64 },
        MoveAbsolute { target: f64, speed_rpm: f64 },
        SetVelocity { rpm: f64 },
        SetBrakeMode(BrakeMode),
    }

    /// Scripted actuator for assembly and completion tests.
    ///
    /// With `perfect` set, relative and absolute moves land instantly, which
    /// is the "actuator that perfectly executes moves" the round-trip tests
    /// assume. Without it, position only changes via `set_position`.
    pub struct MockActuator {
        pub position: f64,
        pub perfect: bool,
        pub commands: Vec<IssuedCommand>,
    }

    impl MockActuator {
        pub fn new(position: f64) -> Self {
            Self {
                position,
                perfect: false,
                commands: Vec::new(),
            }
        }

        pub fn perfect(position: f64) -> Self {
            Self {
                position,
                perfect: true,
                commands: Vec::new(),
            }
        }

        pub fn shared(self) -> Arc<Mutex<MockActuator>> {
            Arc::new(Mutex::new(self))
        }
    }

    /// Coerce a typed mock handle into the trait-object form assemblies take.
    pub fn as_ref(mock: &Arc<Mutex<MockActuator>>) -> ActuatorRef {
        mock.clone()
    }

    impl Actuator for MockActuator {
        fn position(&mut self) -> f64 {
            self.position
        }

        fn move_relative(&mut self, delta: f64, speed_rpm: f64) {
            self.commands
                .push(IssuedCommand::MoveRelative { delta, speed_rpm });
            if self.perfect {
                self.position += delta;
            }
        }

        fn move_absolute(&mut self, target: f64, speed_rpm: f64) {
            self.commands
                .push(IssuedCommand::MoveAbsolute { target, speed_rpm });
            if self.perfect {
                self.position = target;
            }
        }

        fn set_velocity(&mut self, rpm: f64) {
            self.commands.push(IssuedCommand::SetVelocity { rpm });
        }

        fn set_brake_mode(&mut self, mode: BrakeMode) {
            self.commands.push(IssuedCommand::SetBrakeMode(mode));
        }
    }
}
