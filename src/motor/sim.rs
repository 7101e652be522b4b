// Simulated actuator for running the runtime without hardware
//
// Integrates lazily: every interaction first advances the model by the
// wall-clock time since the last one, so no background task is needed. A
// position goal ramps at the commanded speed and clamps at the target,
// which is enough for completion handles and the autonomous routine to
// behave as they would on the robot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::trace;

use super::actuator::{Actuator, ActuatorRef, BrakeMode};

struct Goal {
    target: f64,
    speed_rps: f64,
}

pub struct SimActuator {
    id: u8,
    position: f64,
    goal: Option<Goal>,
    velocity_rps: f64,
    updated_at: Instant,
}

impl SimActuator {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            position: 0.0,
            goal: None,
            velocity_rps: 0.0,
            updated_at: Instant::now(),
        }
    }

    pub fn into_ref(self) -> ActuatorRef {
        Arc::new(Mutex::new(self))
    }

    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now - self.updated_at;
        self.updated_at = now;
        self.integrate(dt);
    }

    fn integrate(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        if let Some(goal) = &self.goal {
            let step = goal.speed_rps * dt;
            let remaining = goal.target - self.position;
            if remaining.abs() <= step {
                self.position = goal.target;
                self.goal = None;
            } else {
                self.position += step * remaining.signum();
            }
        } else {
            self.position += self.velocity_rps * dt;
        }
    }
}

impl Actuator for SimActuator {
    fn position(&mut self) -> f64 {
        self.advance();
        self.position
    }

    fn move_relative(&mut self, delta: f64, speed_rpm: f64) {
        self.advance();
        trace!("sim motor {}: relative move {delta} @ {speed_rpm}rpm", self.id);
        self.velocity_rps = 0.0;
        self.goal = Some(Goal {
            target: self.position + delta,
            speed_rps: speed_rpm.abs() / 60.0,
        });
    }

    fn move_absolute(&mut self, target: f64, speed_rpm: f64) {
        self.advance();
        trace!("sim motor {}: absolute move to {target} @ {speed_rpm}rpm", self.id);
        self.velocity_rps = 0.0;
        self.goal = Some(Goal {
            target,
            speed_rps: speed_rpm.abs() / 60.0,
        });
    }

    fn set_velocity(&mut self, rpm: f64) {
        self.advance();
        trace!("sim motor {}: velocity {rpm}rpm", self.id);
        self.goal = None;
        self.velocity_rps = rpm / 60.0;
    }

    fn set_brake_mode(&mut self, mode: BrakeMode) {
        trace!("sim motor {}: brake mode {:?}", self.id, mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_actuator_holds_position() {
        let mut sim = SimActuator::new(1);
        sim.integrate(Duration::from_secs(5));
        assert_eq!(sim.position, 0.0);
    }

    #[test]
    fn position_goal_ramps_and_clamps() {
        let mut sim = SimActuator::new(1);
        sim.goal = Some(Goal {
            target: 2.0,
            speed_rps: 1.0,
        });

        sim.integrate(Duration::from_millis(500));
        assert!((sim.position - 0.5).abs() < 1e-9);

        // Long step lands exactly on the target, no overshoot.
        sim.integrate(Duration::from_secs(10));
        assert_eq!(sim.position, 2.0);
        assert!(sim.goal.is_none());
    }

    #[test]
    fn negative_goal_moves_backwards() {
        let mut sim = SimActuator::new(1);
        sim.goal = Some(Goal {
            target: -1.0,
            speed_rps: 2.0,
        });

        sim.integrate(Duration::from_millis(250));
        assert!((sim.position + 0.5).abs() < 1e-9);
    }

    #[test]
    fn velocity_integrates_until_changed() {
        let mut sim = SimActuator::new(1);
        sim.velocity_rps = 2.0; // 120 rpm
        sim.integrate(Duration::from_secs(2));
        assert!((sim.position - 4.0).abs() < 1e-9);

        sim.velocity_rps = 0.0;
        sim.integrate(Duration::from_secs(2));
        assert!((sim.position - 4.0).abs() < 1e-9);
    }

    #[test]
    fn new_command_supersedes_velocity() {
        let mut sim = SimActuator::new(1);
        sim.set_velocity(60.0);
        sim.move_relative(1.0, 60.0);
        // Goal mode: velocity no longer applies.
        assert_eq!(sim.velocity_rps, 0.0);
        assert!(sim.goal.is_some());
    }
}
