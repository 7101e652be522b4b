// Device registry: constructs actuators and wires the kinematic assemblies
//
// Built once at bring-up and alive for the process lifetime. The two drive
// wheels are shared by reference between the straight and turn drives, and
// the stack-setdown composite borrows the straight drive and roller the
// same way; nothing here arbitrates overlapping commands, callers must not
// drive the same wheels through two composites at once.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::config::{
    ARM_RATIO, ARM_SPEED_RPM, DRIVE_SPEED_RPM, MOTOR_ID_ARM, MOTOR_ID_LEFT_DRIVE,
    MOTOR_ID_LEFT_ROLLER, MOTOR_ID_RIGHT_DRIVE, MOTOR_ID_RIGHT_ROLLER, MOTOR_ID_TRAY,
    ROLLER_RADIUS_IN, ROLLER_SPEED_RPM, TRACK_WIDTH_IN, TRAY_RATIO, TRAY_SPEED_RPM,
    WHEEL_DIAMETER_IN,
};
use crate::motor::{
    ActuatorRef, Arm, BrakeMode, BusActuator, BusError, MotorBus, MotorSystem, Roller,
    SharedWheel, SimActuator, StackSetdown, StraightDrive, Tray, TurnDrive, Wheel,
};

const ALL_MOTOR_IDS: [u8; 6] = [
    MOTOR_ID_LEFT_DRIVE,
    MOTOR_ID_RIGHT_DRIVE,
    MOTOR_ID_ARM,
    MOTOR_ID_TRAY,
    MOTOR_ID_LEFT_ROLLER,
    MOTOR_ID_RIGHT_ROLLER,
];

pub struct Robot {
    pub left_wheel: SharedWheel,
    pub right_wheel: SharedWheel,
    pub straight_drive: Arc<Mutex<StraightDrive>>,
    pub turn_drive: TurnDrive,
    pub roller: Arc<Mutex<Roller>>,
    pub tray: Tray,
    pub arm: Arm,
    pub stack_setdown: StackSetdown,
}

impl Robot {
    /// Bring up the robot on the hardware bus.
    pub fn connect(port: &str) -> Result<Self, BusError> {
        info!("Opening motor bus on {}", port);
        let mut bus = MotorBus::open(port)?;

        for id in ALL_MOTOR_IDS {
            if !bus.ping(id)? {
                return Err(BusError::Timeout { id });
            }
        }

        for id in ALL_MOTOR_IDS {
            bus.enable_torque(id)?;
        }

        let bus = Arc::new(Mutex::new(bus));
        let motor = |id: u8, gear_ratio: f64, reversed: bool, brake: BrakeMode| -> ActuatorRef {
            let actuator = BusActuator::new(bus.clone(), id, gear_ratio, reversed).into_ref();
            actuator.lock().set_brake_mode(brake);
            actuator
        };

        // Gear ratios are motor revolutions per output revolution of the
        // driven shaft; reversal flags match the mounting orientation.
        let left_drive = motor(MOTOR_ID_LEFT_DRIVE, 2.0, false, BrakeMode::Brake);
        let right_drive = motor(MOTOR_ID_RIGHT_DRIVE, 2.0, true, BrakeMode::Brake);
        let arm = motor(MOTOR_ID_ARM, 9.0, true, BrakeMode::Hold);
        let tray = motor(MOTOR_ID_TRAY, 9.0, false, BrakeMode::Hold);
        let left_roller = motor(MOTOR_ID_LEFT_ROLLER, 2.0, true, BrakeMode::Coast);
        let right_roller = motor(MOTOR_ID_RIGHT_ROLLER, 2.0, false, BrakeMode::Coast);

        info!("Motor bus up, all {} motors responding", ALL_MOTOR_IDS.len());
        Ok(Self::assemble(
            left_drive,
            right_drive,
            arm,
            tray,
            left_roller,
            right_roller,
        ))
    }

    /// Bring up a fully simulated robot (no hardware required).
    pub fn simulated() -> Self {
        info!("Bringing up simulated robot");
        let sim = |id: u8| SimActuator::new(id).into_ref();
        Self::assemble(
            sim(MOTOR_ID_LEFT_DRIVE),
            sim(MOTOR_ID_RIGHT_DRIVE),
            sim(MOTOR_ID_ARM),
            sim(MOTOR_ID_TRAY),
            sim(MOTOR_ID_LEFT_ROLLER),
            sim(MOTOR_ID_RIGHT_ROLLER),
        )
    }

    fn assemble(
        left_drive: ActuatorRef,
        right_drive: ActuatorRef,
        arm: ActuatorRef,
        tray: ActuatorRef,
        left_roller: ActuatorRef,
        right_roller: ActuatorRef,
    ) -> Self {
        let left_wheel = Wheel::new(left_drive, WHEEL_DIAMETER_IN, DRIVE_SPEED_RPM).shared();
        let right_wheel = Wheel::new(right_drive, WHEEL_DIAMETER_IN, DRIVE_SPEED_RPM).shared();

        let straight_drive = Arc::new(Mutex::new(StraightDrive::new(
            left_wheel.clone(),
            right_wheel.clone(),
        )));
        let turn_drive = TurnDrive::new(left_wheel.clone(), right_wheel.clone(), TRACK_WIDTH_IN);

        let roller = Arc::new(Mutex::new(Roller::new(
            left_roller,
            right_roller,
            ROLLER_RADIUS_IN,
            ROLLER_SPEED_RPM,
        )));

        let stack_setdown = StackSetdown::new(straight_drive.clone(), roller.clone());

        Self {
            left_wheel,
            right_wheel,
            straight_drive,
            turn_drive,
            roller,
            tray: Tray::new(tray, TRAY_RATIO, TRAY_SPEED_RPM),
            arm: Arm::single(arm, ARM_RATIO, ARM_SPEED_RPM),
            stack_setdown,
        }
    }

    /// Zero every assembly's velocity. Used by the watchdog and on shutdown.
    pub fn stop_all(&mut self) {
        self.straight_drive.lock().set_velocity(0.0);
        self.roller.lock().set_velocity(0.0);
        self.tray.set_velocity(0.0);
        self.arm.set_velocity(0.0);
    }
}

impl Drop for Robot {
    fn drop(&mut self) {
        // Leave nothing spinning if the process unwinds mid-motion
        self.stop_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motor::{AngularMotorSystem, LinearMotorSystem};

    #[test]
    fn simulated_robot_wires_all_assemblies() {
        let mut robot = Robot::simulated();

        // Straight and turn drive share the same simulated wheels; both
        // commands run to completion end to end.
        let mut out = robot.straight_drive.lock().move_distance(1.0);
        out.wait();
        let mut turned = robot.turn_drive.move_angle(0.05);
        turned.wait();

        robot.stop_all();
    }
}
