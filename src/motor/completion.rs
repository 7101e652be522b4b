// Completion tracking for in-flight motions
//
// A motion command returns immediately while the actuator firmware keeps
// moving in the background. The returned Completion handle is how callers
// find out the motion finished: poll it from the control thread, or block
// on it with wait(). Handles compose, so a two-wheel command hands back one
// handle covering both motors.

use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use super::actuator::ActuatorRef;
use crate::config::POLL_INTERVAL;

/// Half-width of the position window considered "arrived", in output-shaft
/// rotations.
pub const POSITION_TOLERANCE: f64 = 0.05;

/// Result of a single predicate evaluation.
///
/// `DoneNeedsStop` means the condition is met but the actuator is still
/// being driven and should be stopped; [`Completion::poll`] performs that
/// stop, while [`Completion::check`] leaves it to the caller so the
/// predicate stays testable in isolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    InProgress,
    Done,
    DoneNeedsStop,
}

/// Handle to a previously issued, possibly composite motion.
///
/// A handle is single-use: once it reports done it stays safe to poll, but
/// it must not be reused to stand for a new motion. A handle that can never
/// be satisfied (jammed or disconnected motor) blocks `wait()` forever; use
/// [`Completion::wait_deadline`] where that must not hang the caller.
pub enum Completion {
    /// Trivially done, for no-op commands.
    Satisfied,
    /// Done when the actuator reads back within `tolerance` of `target`.
    PositionTarget {
        actuator: ActuatorRef,
        target: f64,
        tolerance: f64,
    },
    /// Done when two consecutive checks observe no position change; the
    /// actuator is stopped when that first happens.
    StallTarget {
        actuator: ActuatorRef,
        last_position: Option<f64>,
        stop_issued: bool,
    },
    /// Done when every child is done.
    All(Vec<Completion>),
}

impl Completion {
    pub fn satisfied() -> Self {
        Completion::Satisfied
    }

    /// Handle satisfied when `actuator` settles within the default tolerance
    /// of `target` rotations.
    pub fn position(actuator: ActuatorRef, target: f64) -> Self {
        Completion::PositionTarget {
            actuator,
            target,
            tolerance: POSITION_TOLERANCE,
        }
    }

    /// Handle satisfied when `actuator` stops making progress, e.g. a move
    /// into a mechanical hardstop.
    pub fn until_stall(actuator: ActuatorRef) -> Self {
        Completion::StallTarget {
            actuator,
            last_position: None,
            stop_issued: false,
        }
    }

    /// Aggregate handle over `children`; satisfied only when all are.
    /// The child set is fixed here and never changes afterwards.
    pub fn all(mut children: Vec<Completion>) -> Self {
        if children.len() == 1 {
            children.remove(0)
        } else {
            Completion::All(children)
        }
    }

    /// Evaluate the condition once without performing any corrective action.
    ///
    /// Stall bookkeeping (the remembered last position) is updated, but the
    /// velocity-zero command a detected stall calls for is left to `poll`.
    pub fn check(&mut self) -> Progress {
        match self {
            Completion::Satisfied => Progress::Done,
            Completion::PositionTarget {
                actuator,
                target,
                tolerance,
            } => {
                let pos = actuator.lock().position();
                // Strict open interval: landing exactly on the boundary does
                // not count as arrived.
                if pos > *target - *tolerance && pos < *target + *tolerance {
                    Progress::Done
                } else {
                    Progress::InProgress
                }
            }
            Completion::StallTarget {
                actuator,
                last_position,
                stop_issued,
            } => {
                if *stop_issued {
                    return Progress::Done;
                }
                let pos = actuator.lock().position();
                // Exact equality of consecutive reads. The firmware
                // quantizes position, so identical reads do occur in
                // practice; see DESIGN.md for the noise caveat.
                match *last_position {
                    Some(last) if last == pos => Progress::DoneNeedsStop,
                    _ => {
                        *last_position = Some(pos);
                        Progress::InProgress
                    }
                }
            }
            Completion::All(children) => {
                // Every child is checked every call so stall bookkeeping
                // keeps advancing even after earlier children finish.
                let mut all_done = true;
                for child in children.iter_mut() {
                    all_done &= child.check() != Progress::InProgress;
                }
                if all_done {
                    Progress::Done
                } else {
                    Progress::InProgress
                }
            }
        }
    }

    /// Evaluate the condition once and perform any pending stop action.
    /// Returns true when the motion has completed.
    pub fn poll(&mut self) -> bool {
        if let Completion::All(children) = self {
            let mut all_done = true;
            for child in children.iter_mut() {
                all_done &= child.poll();
            }
            return all_done;
        }

        match self.check() {
            Progress::InProgress => false,
            Progress::Done => true,
            Progress::DoneNeedsStop => {
                if let Completion::StallTarget {
                    actuator,
                    stop_issued,
                    ..
                } = self
                {
                    debug!("stall detected, stopping actuator");
                    actuator.lock().set_velocity(0.0);
                    *stop_issued = true;
                }
                true
            }
        }
    }

    /// Block the calling thread until the motion completes.
    ///
    /// Polls at a fixed interval and never times out: an unreachable target
    /// hangs here. Keep blocking waits out of loops that must stay
    /// responsive.
    pub fn wait(&mut self) {
        while !self.poll() {
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Block until the motion completes or `timeout` elapses.
    ///
    /// On expiry the motion has not been cancelled and may still be in
    /// progress; the error only ends the wait.
    pub fn wait_deadline(&mut self, timeout: Duration) -> Result<(), WaitTimeout> {
        let deadline = Instant::now() + timeout;
        while !self.poll() {
            if Instant::now() >= deadline {
                return Err(WaitTimeout { waited: timeout });
            }
            thread::sleep(POLL_INTERVAL);
        }
        Ok(())
    }
}

/// A deadline-bounded wait expired before the motion completed.
#[derive(Debug, thiserror::Error)]
#[error("motion did not complete within {waited:?}; it may still be in progress")]
pub struct WaitTimeout {
    pub waited: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::actuator::mock::{as_ref, IssuedCommand, MockActuator};

    #[test]
    fn satisfied_is_always_done() {
        let mut handle = Completion::satisfied();
        assert!(handle.poll());
        assert!(handle.poll());
    }

    #[test]
    fn position_target_open_interval() {
        let mock = MockActuator::new(0.0).shared();
        let mut handle = Completion::PositionTarget {
            actuator: as_ref(&mock),
            target: 2.0,
            tolerance: 0.05,
        };

        mock.lock().position = 0.0;
        assert!(!handle.poll());

        mock.lock().position = 1.98;
        assert!(handle.poll());

        mock.lock().position = 2.0;
        assert!(handle.poll());

        // Exactly on the boundary is not done, either side.
        mock.lock().position = 1.95;
        assert!(!handle.poll());
        mock.lock().position = 2.05;
        assert!(!handle.poll());

        mock.lock().position = 2.051;
        assert!(!handle.poll());
    }

    #[test]
    fn composite_requires_every_child() {
        let done = MockActuator::new(5.0).shared();
        let pending = MockActuator::new(0.0).shared();
        let mut handle = Completion::all(vec![
            Completion::position(as_ref(&done), 5.0),
            Completion::position(as_ref(&pending), 5.0),
        ]);

        assert!(!handle.poll());

        pending.lock().position = 5.0;
        assert!(handle.poll());
    }

    #[test]
    fn composite_of_always_true_and_always_false_is_false() {
        let stuck = MockActuator::new(0.0).shared();
        let mut handle = Completion::all(vec![
            Completion::satisfied(),
            Completion::position(as_ref(&stuck), 100.0),
        ]);

        for _ in 0..10 {
            assert!(!handle.poll());
        }
    }

    #[test]
    fn composite_keeps_polling_stall_child_after_others_finish() {
        let done = MockActuator::new(1.0).shared();
        let stalling = MockActuator::new(0.0).shared();
        let mut handle = Completion::all(vec![
            Completion::position(as_ref(&done), 1.0),
            Completion::until_stall(as_ref(&stalling)),
        ]);

        // The first child is done from the start; the stall child must
        // still be checked on every poll so its bookkeeping advances.
        stalling.lock().position = 0.1;
        assert!(!handle.poll());
        stalling.lock().position = 0.2;
        assert!(!handle.poll());
        assert!(handle.poll()); // repeated read: stalled, motor stopped

        assert_eq!(
            stalling.lock().commands,
            vec![IssuedCommand::SetVelocity { rpm: 0.0 }]
        );

        // Idempotent afterwards, and the stop is not reissued.
        assert!(handle.poll());
        let stops = stalling
            .lock()
            .commands
            .iter()
            .filter(|c| matches!(c, IssuedCommand::SetVelocity { rpm } if *rpm == 0.0))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn single_child_composite_collapses() {
        let mock = MockActuator::new(1.0).shared();
        let handle = Completion::all(vec![Completion::position(as_ref(&mock), 1.0)]);
        assert!(matches!(handle, Completion::PositionTarget { .. }));
    }

    #[test]
    fn stall_needs_two_identical_reads() {
        let mock = MockActuator::new(0.0).shared();
        let mut handle = Completion::until_stall(as_ref(&mock));

        // Position advancing: never done.
        for step in 1..=5 {
            mock.lock().position = step as f64 * 0.1;
            assert!(!handle.poll());
        }

        // First repeated read completes the handle and stops the motor.
        assert!(handle.poll());

        let commands = mock.lock().commands.clone();
        assert_eq!(commands, vec![IssuedCommand::SetVelocity { rpm: 0.0 }]);
    }

    #[test]
    fn stall_stop_issued_exactly_once() {
        let mock = MockActuator::new(3.0).shared();
        let mut handle = Completion::until_stall(as_ref(&mock));

        assert!(!handle.poll()); // first read only records the position
        assert!(handle.poll()); // second identical read stalls
        assert!(handle.poll());
        assert!(handle.poll());

        let stops = mock
            .lock()
            .commands
            .iter()
            .filter(|c| matches!(c, IssuedCommand::SetVelocity { rpm } if *rpm == 0.0))
            .count();
        assert_eq!(stops, 1);
    }

    #[test]
    fn stall_check_is_pure() {
        let mock = MockActuator::new(1.0).shared();
        let mut handle = Completion::until_stall(as_ref(&mock));

        assert_eq!(handle.check(), Progress::InProgress);
        assert_eq!(handle.check(), Progress::DoneNeedsStop);
        // check never issues the stop itself
        assert!(mock.lock().commands.is_empty());
    }

    #[test]
    fn wait_deadline_expires_on_unreachable_target() {
        let stuck = MockActuator::new(0.0).shared();
        let mut handle = Completion::position(as_ref(&stuck), 50.0);

        let err = handle
            .wait_deadline(Duration::from_millis(20))
            .expect_err("target is unreachable");
        assert_eq!(err.waited, Duration::from_millis(20));
    }

    #[test]
    fn wait_returns_once_satisfied() {
        let mock = MockActuator::new(7.0).shared();
        let mut handle = Completion::position(as_ref(&mock), 7.0);
        // Already in tolerance: returns without sleeping forever.
        handle.wait();
    }
}
