// Serial smart-motor bus protocol
//
// Half-duplex request/response framing:
// [0xAA, 0x55, ID, Length, Instruction, Params..., Checksum]
// Checksum is the XOR of everything after the header. Replies carry a
// status byte ahead of the payload; non-zero status is a device fault.
//
// The motors run their own position loop: writing a goal position starts a
// move that continues after the reply, which is what lets the assemblies
// hand back completion handles instead of blocking.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serialport::SerialPort;
use tracing::{debug, warn};

use super::actuator::{Actuator, ActuatorRef, BrakeMode};

/// Default serial configuration for the motor bus
pub const DEFAULT_BAUDRATE: u32 = 921_600;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Encoder counts per motor revolution, before gearing
pub const TICKS_PER_MOTOR_REV: f64 = 900.0;

/// Frame header bytes
const HEADER: [u8; 2] = [0xAA, 0x55];

/// Instruction set
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    ReadReg = 0x02,
    WriteReg = 0x03,
}

/// Register map
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    FirmwareVersion = 0x00, // 2 bytes, read-only
    OperatingMode = 0x10,   // 1 byte: 0=position, 1=velocity
    BrakeMode = 0x11,       // 1 byte: 0=coast, 1=brake, 2=hold
    TorqueEnable = 0x12,    // 1 byte: 0=off, 1=on
    GoalPosition = 0x20,    // 4 bytes, signed ticks
    GoalSpeed = 0x24,       // 2 bytes, rpm cap for position moves
    GoalVelocity = 0x26,    // 2 bytes, signed rpm (velocity mode)
    PresentPosition = 0x30, // 4 bytes, signed ticks, read-only
    PresentVelocity = 0x34, // 2 bytes, signed rpm, read-only
}

/// Firmware-side control mode
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Position = 0,
    Velocity = 1,
}

/// Error types for bus communication
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} reported fault status 0x{status:02X}")]
    DeviceFault { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, BusError>;

/// Smart-motor bus: owns the serial port, speaks the frame protocol.
pub struct MotorBus {
    port: Box<dyn SerialPort>,
}

impl MotorBus {
    /// Open a connection to the motor bus at the default baudrate.
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// XOR checksum over everything after the header.
    fn checksum(data: &[u8]) -> u8 {
        data.iter().fold(0u8, |acc, &b| acc ^ b)
    }

    fn build_frame(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // instruction + checksum
        let mut frame = Vec::with_capacity(6 + params.len());

        frame.extend_from_slice(&HEADER);
        frame.push(id);
        frame.push(length);
        frame.push(instruction as u8);
        frame.extend_from_slice(params);
        frame.push(Self::checksum(&frame[2..]));

        frame
    }

    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.port.write_all(frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one reply frame, returning its payload.
    fn read_reply(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.port.read_exact(&mut header).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                BusError::Timeout { id: expected_id }
            } else {
                BusError::Io(e)
            }
        })?;

        if header != HEADER {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.port.read_exact(&mut id_length)?;
        let id = id_length[0];
        let length = id_length[1] as usize;

        if id != expected_id {
            return Err(BusError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }

        // status + payload + checksum = length bytes
        let mut rest = vec![0u8; length];
        self.port.read_exact(&mut rest)?;

        Self::decode_reply(id, &rest)
    }

    /// Validate a reply body (everything after the length byte) and return
    /// its payload.
    fn decode_reply(id: u8, rest: &[u8]) -> Result<Vec<u8>> {
        // Even an empty payload carries a status byte and a checksum; a
        // shorter frame is garbage from a corrupted or misbehaving device.
        if rest.len() < 2 {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Reply body {} bytes, need at least 2", rest.len()),
            });
        }

        let mut checked = vec![id, rest.len() as u8];
        checked.extend_from_slice(&rest[..rest.len() - 1]);
        if Self::checksum(&checked) != rest[rest.len() - 1] {
            return Err(BusError::ChecksumMismatch { id });
        }

        let status = rest[0];
        if status != 0 {
            return Err(BusError::DeviceFault { id, status });
        }

        Ok(rest[1..rest.len() - 1].to_vec())
    }

    fn transact(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let frame = Self::build_frame(id, instruction, params);
        self.send_frame(&frame)?;
        self.read_reply(id)
    }

    /// Ping a motor to check that it is on the bus.
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        let frame = Self::build_frame(id, Instruction::Ping, &[]);
        self.send_frame(&frame)?;

        match self.read_reply(id) {
            Ok(_) => Ok(true),
            Err(BusError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write raw bytes to a register.
    pub fn write_reg(&mut self, id: u8, register: Register, payload: &[u8]) -> Result<()> {
        let mut params = Vec::with_capacity(1 + payload.len());
        params.push(register as u8);
        params.extend_from_slice(payload);
        debug!("Write to motor {}: reg={:?}, bytes={:02X?}", id, register, payload);
        self.transact(id, Instruction::WriteReg, &params)?;
        Ok(())
    }

    /// Read `len` bytes from a register.
    pub fn read_reg(&mut self, id: u8, register: Register, len: u8) -> Result<Vec<u8>> {
        let params = [register as u8, len];
        let payload = self.transact(id, Instruction::ReadReg, &params)?;
        if payload.len() != len as usize {
            return Err(BusError::InvalidResponse {
                id,
                reason: format!("Expected {} bytes, got {}", len, payload.len()),
            });
        }
        Ok(payload)
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        self.write_reg(id, register, &[value])
    }

    pub fn write_u16(&mut self, id: u8, register: Register, value: u16) -> Result<()> {
        self.write_reg(id, register, &value.to_le_bytes())
    }

    pub fn write_i16(&mut self, id: u8, register: Register, value: i16) -> Result<()> {
        self.write_reg(id, register, &value.to_le_bytes())
    }

    pub fn write_i32(&mut self, id: u8, register: Register, value: i32) -> Result<()> {
        self.write_reg(id, register, &value.to_le_bytes())
    }

    pub fn read_u8(&mut self, id: u8, register: Register) -> Result<u8> {
        let bytes = self.read_reg(id, register, 1)?;
        Ok(bytes[0])
    }

    pub fn read_i16(&mut self, id: u8, register: Register) -> Result<i16> {
        let bytes = self.read_reg(id, register, 2)?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i32(&mut self, id: u8, register: Register) -> Result<i32> {
        let bytes = self.read_reg(id, register, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    // === High-level convenience methods ===

    pub fn enable_torque(&mut self, id: u8) -> Result<()> {
        self.write_u8(id, Register::TorqueEnable, 1)
    }

    /// Firmware version as (major, minor).
    pub fn firmware_version(&mut self, id: u8) -> Result<(u8, u8)> {
        let bytes = self.read_reg(id, Register::FirmwareVersion, 2)?;
        Ok((bytes[0], bytes[1]))
    }

    pub fn set_operating_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        self.write_u8(id, Register::OperatingMode, mode as u8)
    }

    pub fn set_brake_mode(&mut self, id: u8, mode: BrakeMode) -> Result<()> {
        let raw = match mode {
            BrakeMode::Coast => 0u8,
            BrakeMode::Brake => 1,
            BrakeMode::Hold => 2,
        };
        self.write_u8(id, Register::BrakeMode, raw)
    }

    /// Start a position move: speed cap first, then the goal that triggers it.
    pub fn set_goal_position(&mut self, id: u8, ticks: i32, speed_rpm: u16) -> Result<()> {
        self.write_u16(id, Register::GoalSpeed, speed_rpm)?;
        self.write_i32(id, Register::GoalPosition, ticks)
    }

    pub fn set_goal_velocity(&mut self, id: u8, rpm: i16) -> Result<()> {
        self.write_i16(id, Register::GoalVelocity, rpm)
    }

    pub fn present_position(&mut self, id: u8) -> Result<i32> {
        self.read_i32(id, Register::PresentPosition)
    }

    pub fn present_velocity(&mut self, id: u8) -> Result<i16> {
        self.read_i16(id, Register::PresentVelocity)
    }
}

/// One motor on the bus, exposed through the [`Actuator`] contract.
///
/// Converts output-shaft rotations to encoder ticks through the gear ratio
/// and flips signs for reversed mounting. Bus failures are logged and
/// swallowed: the capability layer never sees transport errors, and
/// `position` falls back to the last good read.
pub struct BusActuator {
    bus: Arc<Mutex<MotorBus>>,
    id: u8,
    ticks_per_rotation: f64,
    reversed: bool,
    mode: Option<OperatingMode>,
    last_position: f64,
}

impl BusActuator {
    /// `gear_ratio` is motor revolutions per output revolution.
    pub fn new(bus: Arc<Mutex<MotorBus>>, id: u8, gear_ratio: f64, reversed: bool) -> Self {
        Self {
            bus,
            id,
            ticks_per_rotation: TICKS_PER_MOTOR_REV * gear_ratio,
            reversed,
            mode: None,
            last_position: 0.0,
        }
    }

    /// Box into the shared form the assemblies take.
    pub fn into_ref(self) -> ActuatorRef {
        Arc::new(Mutex::new(self))
    }

    fn sign(&self) -> f64 {
        if self.reversed { -1.0 } else { 1.0 }
    }

    fn to_ticks(&self, rotations: f64) -> i32 {
        (rotations * self.sign() * self.ticks_per_rotation).round() as i32
    }

    fn from_ticks(&self, ticks: i32) -> f64 {
        ticks as f64 / self.ticks_per_rotation * self.sign()
    }

    /// Switch firmware mode if the cached mode disagrees.
    fn ensure_mode(&mut self, mode: OperatingMode) -> Result<()> {
        if self.mode != Some(mode) {
            self.bus.lock().set_operating_mode(self.id, mode)?;
            self.mode = Some(mode);
        }
        Ok(())
    }

    fn log_fault(&self, op: &str, err: BusError) {
        warn!("motor {}: {} failed: {}", self.id, op, err);
    }
}

impl Actuator for BusActuator {
    fn position(&mut self) -> f64 {
        match self.bus.lock().present_position(self.id) {
            Ok(ticks) => {
                self.last_position = self.from_ticks(ticks);
                self.last_position
            }
            Err(e) => {
                self.log_fault("position read", e);
                self.last_position
            }
        }
    }

    fn move_relative(&mut self, delta: f64, speed_rpm: f64) {
        let result = (|| -> Result<()> {
            self.ensure_mode(OperatingMode::Position)?;
            let mut bus = self.bus.lock();
            let present = bus.present_position(self.id)?;
            let goal = present + self.to_ticks(delta);
            bus.set_goal_position(self.id, goal, speed_rpm.abs() as u16)
        })();
        if let Err(e) = result {
            self.log_fault("relative move", e);
        }
    }

    fn move_absolute(&mut self, target: f64, speed_rpm: f64) {
        let goal = self.to_ticks(target);
        let result = (|| -> Result<()> {
            self.ensure_mode(OperatingMode::Position)?;
            self.bus
                .lock()
                .set_goal_position(self.id, goal, speed_rpm.abs() as u16)
        })();
        if let Err(e) = result {
            self.log_fault("absolute move", e);
        }
    }

    fn set_velocity(&mut self, rpm: f64) {
        let signed = (rpm * self.sign()).round() as i16;
        let result = (|| -> Result<()> {
            self.ensure_mode(OperatingMode::Velocity)?;
            self.bus.lock().set_goal_velocity(self.id, signed)
        })();
        if let Err(e) = result {
            self.log_fault("velocity command", e);
        }
    }

    fn set_brake_mode(&mut self, mode: BrakeMode) {
        if let Err(e) = self.bus.lock().set_brake_mode(self.id, mode) {
            self.log_fault("brake mode", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_is_xor() {
        let data = [1u8, 4, 0x03, 0x20, 0, 2];
        assert_eq!(MotorBus::checksum(&data), 1 ^ 4 ^ 0x03 ^ 0x20 ^ 0 ^ 2);
    }

    #[test]
    fn test_build_frame() {
        let frame = MotorBus::build_frame(11, Instruction::Ping, &[]);
        // Header (2) + ID (1) + Length (1) + Instruction (1) + Checksum (1)
        assert_eq!(frame.len(), 6);
        assert_eq!(frame[0], 0xAA);
        assert_eq!(frame[1], 0x55);
        assert_eq!(frame[2], 11); // ID
        assert_eq!(frame[3], 2); // instruction + checksum
        assert_eq!(frame[4], 0x01); // PING
        assert_eq!(frame[5], MotorBus::checksum(&frame[2..5]));
    }

    /// Build a well-formed reply body for `id` carrying `payload`.
    fn reply_body(id: u8, status: u8, payload: &[u8]) -> Vec<u8> {
        let len = (payload.len() + 2) as u8;
        let mut rest = vec![status];
        rest.extend_from_slice(payload);
        let mut checked = vec![id, len, status];
        checked.extend_from_slice(payload);
        rest.push(MotorBus::checksum(&checked));
        rest
    }

    #[test]
    fn test_decode_reply_payload() {
        let body = reply_body(11, 0, &[0x34, 0x12]);
        let payload = MotorBus::decode_reply(11, &body).unwrap();
        assert_eq!(payload, vec![0x34, 0x12]);
    }

    #[test]
    fn test_decode_reply_rejects_short_body() {
        // A length byte of 0 or 1 cannot carry status + checksum; both must
        // come back as errors, not panics.
        assert!(matches!(
            MotorBus::decode_reply(11, &[]),
            Err(BusError::InvalidResponse { id: 11, .. })
        ));
        assert!(matches!(
            MotorBus::decode_reply(11, &[0]),
            Err(BusError::InvalidResponse { id: 11, .. })
        ));
    }

    #[test]
    fn test_decode_reply_rejects_bad_checksum() {
        let mut body = reply_body(11, 0, &[0x34, 0x12]);
        let last = body.len() - 1;
        body[last] ^= 0xFF;
        assert!(matches!(
            MotorBus::decode_reply(11, &body),
            Err(BusError::ChecksumMismatch { id: 11 })
        ));
    }

    #[test]
    fn test_decode_reply_surfaces_device_fault() {
        let body = reply_body(20, 0x04, &[]);
        assert!(matches!(
            MotorBus::decode_reply(20, &body),
            Err(BusError::DeviceFault { id: 20, status: 0x04 })
        ));
    }

    #[test]
    fn test_write_frame_params() {
        let ticks: i32 = -1800;
        let mut params = vec![Register::GoalPosition as u8];
        params.extend_from_slice(&ticks.to_le_bytes());
        let frame = MotorBus::build_frame(20, Instruction::WriteReg, &params);

        assert_eq!(frame[3] as usize, params.len() + 2);
        assert_eq!(frame[4], Instruction::WriteReg as u8);
        assert_eq!(&frame[5..10], params.as_slice());
    }
}
