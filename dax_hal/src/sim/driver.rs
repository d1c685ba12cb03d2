//! Stepper-driver simulation engine.
//!
//! Implements the driver's register file, command decoder and motion
//! integrator. Each axis engine owns its register file exclusively; the
//! status word is recomputed every tick from the motion phase, direction
//! and active fault, so the bitset can never drift from the enum state.

use crate::sim::motion::MotionProfile;
use dax_common::config::AxisConfig;
use dax_common::error::{HalError, HalResult};
use dax_common::motor::command::opcode;
use dax_common::motor::registers::{self, RegisterFile, decode_position, encode_position};
use dax_common::motor::{Direction, FaultKind, MotionCommand, MotionPhase, MotorStatus};
use std::time::Duration;
use tracing::{debug, trace};

/// Fixed length of a register-bus frame: opcode + argument + 4 value bytes.
pub const FRAME_LEN: usize = 6;

/// Stepper-driver engine for one axis.
pub struct MotorSimulator {
    /// Axis name for logs.
    name: String,
    /// Trapezoidal profile state.
    profile: MotionProfile,
    /// Register file, the only source for host-visible values.
    registers: RegisterFile,
    /// Derived status word, rebuilt every tick.
    status: MotorStatus,
    /// Injected fault, OR'ed into the status until cleared.
    active_fault: Option<FaultKind>,
    /// Latched wrong-command bit, cleared on status read.
    wrong_cmd: bool,
    /// Power stage released.
    hiz: bool,
}

impl MotorSimulator {
    /// Create an axis engine from configuration.
    ///
    /// Profile parameters go through the same validation as host register
    /// writes, so an out-of-range config value is rejected as
    /// `ConfigOutOfRange` rather than silently clamped.
    pub fn new(config: &AxisConfig) -> HalResult<Self> {
        let mut registers = RegisterFile::new();
        for spec in &registers::REGISTER_TABLE {
            registers
                .insert(spec.addr, spec.reset)
                .map_err(|_| HalError::HardwareFailure("register file capacity"))?;
        }

        let mut sim = Self {
            name: config.name.clone(),
            profile: MotionProfile::new(
                config.acceleration,
                config.deceleration,
                config.min_speed,
            ),
            registers,
            status: MotorStatus::empty(),
            active_fault: None,
            wrong_cmd: false,
            hiz: false,
        };

        sim.write_register(registers::ACC, config.acceleration.round() as u32)?;
        sim.write_register(registers::DEC, config.deceleration.round() as u32)?;
        sim.write_register(registers::MAX_SPEED, config.max_speed.round() as u32)?;
        sim.write_register(registers::MIN_SPEED, config.min_speed.round() as u32)?;
        sim.recompute_status();

        debug!(
            "axis {}: driver engine ready (acc={} dec={} max={})",
            sim.name, config.acceleration, config.deceleration, config.max_speed
        );
        Ok(sim)
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current motion phase.
    pub fn phase(&self) -> MotionPhase {
        self.profile.phase()
    }

    /// True while a motion is in progress.
    pub fn is_busy(&self) -> bool {
        self.profile.is_busy()
    }

    /// Current position in steps.
    pub fn position(&self) -> i32 {
        self.profile.position_steps()
    }

    /// Current speed in steps/s.
    pub fn speed(&self) -> f64 {
        self.profile.speed()
    }

    /// The injected fault, if any.
    pub fn active_fault(&self) -> Option<FaultKind> {
        self.active_fault
    }

    /// Current status word without clearing edge-triggered bits.
    pub fn status(&self) -> MotorStatus {
        self.status
    }

    /// Read a register.
    ///
    /// Reading `STATUS` clears the edge-triggered bits, matching common
    /// serial-driver semantics.
    pub fn read_register(&mut self, addr: u8) -> HalResult<u32> {
        let spec = registers::spec(addr).ok_or(HalError::InvalidParameter("unknown register"))?;
        if addr == registers::STATUS {
            return Ok(u32::from(self.read_status().bits()));
        }
        Ok(self.registers.get(&spec.addr).copied().unwrap_or(spec.reset))
    }

    /// Write a register after validating against the legal-range table.
    ///
    /// Illegal writes are rejected and never partially applied; writes to
    /// profile registers while the axis is moving are rejected `Busy`.
    pub fn write_register(&mut self, addr: u8, value: u32) -> HalResult<()> {
        let spec = registers::spec(addr).ok_or(HalError::InvalidParameter("unknown register"))?;
        if !spec.writable {
            return Err(HalError::InvalidParameter("read-only register"));
        }
        if value < spec.min || value > spec.max {
            return Err(HalError::ConfigOutOfRange(spec.label));
        }
        if self.is_busy() && addr != registers::MARK && addr != registers::CONFIG {
            return Err(HalError::Busy("axis moving"));
        }

        match addr {
            registers::ACC => self.profile.set_acceleration(f64::from(value)),
            registers::DEC => self.profile.set_deceleration(f64::from(value)),
            registers::MIN_SPEED => self.profile.set_min_speed(f64::from(value)),
            registers::ABS_POS => self.profile.set_position(f64::from(decode_position(value))),
            _ => {}
        }

        self.registers
            .insert(addr, value)
            .map_err(|_| HalError::HardwareFailure("register file capacity"))?;
        trace!("axis {}: {} <- {:#x}", self.name, spec.label, value);
        Ok(())
    }

    /// Apply a motion command.
    ///
    /// Superseding a pending command is atomic: validation happens before
    /// any state is touched, so a rejected command has no side effects.
    pub fn apply_command(&mut self, command: MotionCommand) -> HalResult<()> {
        if self.active_fault.is_some() && !command.is_stop() {
            return Err(HalError::InvalidState("fault active"));
        }

        match command {
            MotionCommand::Run { direction, speed } => {
                if speed <= 0.0 {
                    return Err(HalError::InvalidParameter("run speed"));
                }
                self.check_direction(direction)?;
                let speed = speed.min(self.max_speed());
                self.hiz = false;
                self.profile.start_run(direction, speed);
            }
            MotionCommand::Move { direction, steps } => {
                if steps == 0 {
                    return Ok(());
                }
                self.check_direction(direction)?;
                let cruise = self.max_speed();
                self.hiz = false;
                self.profile.start_move(direction, steps, cruise);
            }
            MotionCommand::GoTo { position } => {
                let target = f64::from(position);
                self.check_direction(self.profile.goto_direction(target))?;
                let cruise = self.max_speed();
                self.hiz = false;
                self.profile.start_goto(target, cruise);
            }
            MotionCommand::SoftStop => self.profile.soft_stop(),
            MotionCommand::HardStop => self.profile.hard_stop(),
            MotionCommand::SoftHiZ => {
                self.profile.soft_stop();
                self.hiz = true;
            }
            MotionCommand::HardHiZ => {
                self.profile.hard_stop();
                self.hiz = true;
            }
            MotionCommand::ResetPosition => {
                if self.is_busy() {
                    return Err(HalError::Busy("axis moving"));
                }
                self.profile.reset_position();
            }
        }

        debug!("axis {}: {}", self.name, command.name());
        self.recompute_status();
        Ok(())
    }

    /// Inject a driver fault; mirrored into the status word every tick
    /// until [`Self::clear_faults`].
    pub fn inject_fault(&mut self, fault: FaultKind) {
        debug!("axis {}: fault injected: {:?}", self.name, fault);
        self.active_fault = Some(fault);
        self.recompute_status();
    }

    /// Clear the injected fault (device-reset semantics).
    pub fn clear_faults(&mut self) {
        self.active_fault = None;
        self.recompute_status();
    }

    /// Read the status word and clear edge-triggered bits.
    pub fn read_status(&mut self) -> MotorStatus {
        let word = self.status;
        self.wrong_cmd = false;
        self.recompute_status();
        word
    }

    /// Advance the engine by one tick.
    pub fn tick(&mut self, dt: Duration) {
        self.profile.tick(dt.as_secs_f64());
        self.recompute_status();
        self.sync_registers();
    }

    /// Handle one register-bus frame (full-duplex exchange).
    ///
    /// An unrecognized opcode sets the `WRONG_CMD` status bit and is
    /// rejected without side effects.
    pub fn handle_frame(&mut self, tx: &[u8], rx: &mut [u8]) -> HalResult<()> {
        if tx.len() != FRAME_LEN || rx.len() != FRAME_LEN {
            return Err(HalError::InvalidParameter("frame length"));
        }
        rx.fill(0);
        let value = u32::from_be_bytes([tx[2], tx[3], tx[4], tx[5]]);

        match tx[0] {
            opcode::NOP => Ok(()),
            opcode::SET_PARAM => self.write_register(tx[1], value),
            opcode::GET_PARAM => {
                let value = self.read_register(tx[1])?;
                rx[2..6].copy_from_slice(&value.to_be_bytes());
                Ok(())
            }
            opcode::RUN => {
                let direction = decode_direction(tx[1])?;
                self.apply_command(MotionCommand::Run {
                    direction,
                    speed: f64::from(value) / 1000.0,
                })
            }
            opcode::MOVE => {
                let direction = decode_direction(tx[1])?;
                self.apply_command(MotionCommand::Move {
                    direction,
                    steps: value,
                })
            }
            opcode::GOTO => self.apply_command(MotionCommand::GoTo {
                position: decode_position(value),
            }),
            opcode::SOFT_STOP => self.apply_command(MotionCommand::SoftStop),
            opcode::HARD_STOP => self.apply_command(MotionCommand::HardStop),
            opcode::SOFT_HIZ => self.apply_command(MotionCommand::SoftHiZ),
            opcode::HARD_HIZ => self.apply_command(MotionCommand::HardHiZ),
            opcode::RESET_POS => self.apply_command(MotionCommand::ResetPosition),
            opcode::GET_STATUS => {
                let word = self.read_status().bits();
                rx[4..6].copy_from_slice(&word.to_be_bytes());
                Ok(())
            }
            _ => {
                self.wrong_cmd = true;
                self.recompute_status();
                Err(HalError::InvalidParameter("unrecognized opcode"))
            }
        }
    }

    /// Cruise speed from the `MAX_SPEED` register.
    fn max_speed(&self) -> f64 {
        self.registers
            .get(&registers::MAX_SPEED)
            .copied()
            .map_or(500.0, f64::from)
    }

    /// A motion command must not reverse a moving axis.
    fn check_direction(&self, requested: Direction) -> HalResult<()> {
        if self.is_busy() && requested != self.profile.direction() {
            return Err(HalError::Busy("direction change requires stop"));
        }
        Ok(())
    }

    /// Rebuild the derived status word.
    fn recompute_status(&mut self) {
        let mut status = MotorStatus::empty();
        if self.hiz {
            status |= MotorStatus::HIZ;
        }
        if self.profile.is_busy() {
            status |= MotorStatus::BUSY;
        }
        if self.profile.direction() == Direction::Forward {
            status |= MotorStatus::DIR;
        }
        status |= self.profile.phase().flag();
        if self.wrong_cmd {
            status |= MotorStatus::WRONG_CMD;
        }
        if let Some(fault) = self.active_fault {
            status |= fault.flag();
        }
        self.status = status;
    }

    /// Mirror live state into the host-visible registers.
    fn sync_registers(&mut self) {
        let abs_pos = encode_position(self.profile.position_steps());
        let speed = self.profile.speed().round() as u32;
        let status = u32::from(self.status.bits());
        // Keys exist since init; insert only replaces.
        let _ = self.registers.insert(registers::ABS_POS, abs_pos);
        let _ = self.registers.insert(registers::SPEED, speed);
        let _ = self.registers.insert(registers::STATUS, status);
    }
}

fn decode_direction(byte: u8) -> HalResult<Direction> {
    match byte {
        0 => Ok(Direction::Reverse),
        1 => Ok(Direction::Forward),
        _ => Err(HalError::InvalidParameter("direction byte")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dax_common::config::AxisConfig;

    fn config() -> AxisConfig {
        AxisConfig {
            name: "x".to_string(),
            acceleration: 1000.0,
            deceleration: 1000.0,
            max_speed: 500.0,
            min_speed: 0.0,
            encoder: Default::default(),
        }
    }

    fn sim() -> MotorSimulator {
        MotorSimulator::new(&config()).unwrap()
    }

    const DT: Duration = Duration::from_millis(1);

    #[test]
    fn register_round_trip() {
        let mut sim = sim();
        sim.write_register(registers::ACC, 2000).unwrap();
        assert_eq!(sim.read_register(registers::ACC).unwrap(), 2000);
    }

    #[test]
    fn illegal_write_leaves_prior_value() {
        let mut sim = sim();
        sim.write_register(registers::ACC, 2000).unwrap();

        let err = sim.write_register(registers::ACC, 2_000_000).unwrap_err();
        assert_eq!(err, HalError::ConfigOutOfRange("ACC"));
        assert_eq!(sim.read_register(registers::ACC).unwrap(), 2000);

        let err = sim.write_register(registers::STATUS, 1).unwrap_err();
        assert_eq!(err, HalError::InvalidParameter("read-only register"));
    }

    #[test]
    fn unknown_register_rejected() {
        let mut sim = sim();
        assert!(sim.read_register(0x7F).is_err());
        assert!(sim.write_register(0x7F, 0).is_err());
    }

    #[test]
    fn move_lands_on_target_and_clears_busy() {
        let mut sim = sim();
        sim.apply_command(MotionCommand::Move {
            direction: Direction::Forward,
            steps: 1000,
        })
        .unwrap();

        for _ in 0..5000 {
            sim.tick(DT);
            // Derived-view invariant, every tick.
            assert_eq!(
                sim.status().contains(MotorStatus::BUSY),
                sim.phase() != MotionPhase::Stopped
            );
            if !sim.is_busy() {
                break;
            }
        }

        assert_eq!(sim.position(), 1000);
        assert_eq!(sim.phase(), MotionPhase::Stopped);
        assert_eq!(
            sim.read_register(registers::ABS_POS).unwrap(),
            encode_position(1000)
        );
    }

    #[test]
    fn wrong_opcode_latches_and_clears_on_read() {
        let mut sim = sim();
        let tx = [0xFFu8, 0, 0, 0, 0, 0];
        let mut rx = [0u8; FRAME_LEN];

        assert!(sim.handle_frame(&tx, &mut rx).is_err());
        let status = sim.read_status();
        assert!(status.contains(MotorStatus::WRONG_CMD));

        let status = sim.read_status();
        assert!(!status.contains(MotorStatus::WRONG_CMD));
    }

    #[test]
    fn fault_mirrored_until_cleared() {
        let mut sim = sim();
        sim.inject_fault(FaultKind::Stall);
        sim.tick(DT);
        assert!(sim.status().contains(MotorStatus::STALL));
        assert!(sim.status().has_fault());

        // Status reads do not clear fault bits.
        let _ = sim.read_status();
        sim.tick(DT);
        assert!(sim.status().contains(MotorStatus::STALL));

        sim.clear_faults();
        sim.tick(DT);
        assert!(!sim.status().has_fault());
    }

    #[test]
    fn fault_blocks_motion_commands() {
        let mut sim = sim();
        sim.inject_fault(FaultKind::Undervoltage);

        let err = sim
            .apply_command(MotionCommand::Move {
                direction: Direction::Forward,
                steps: 10,
            })
            .unwrap_err();
        assert_eq!(err, HalError::InvalidState("fault active"));

        // Stops remain accepted.
        sim.apply_command(MotionCommand::HardStop).unwrap();
    }

    #[test]
    fn busy_axis_rejects_conflicting_requests() {
        let mut sim = sim();
        sim.apply_command(MotionCommand::Move {
            direction: Direction::Forward,
            steps: 1000,
        })
        .unwrap();
        sim.tick(DT);
        assert!(sim.is_busy());

        assert_eq!(
            sim.write_register(registers::ACC, 500).unwrap_err(),
            HalError::Busy("axis moving")
        );
        assert!(matches!(
            sim.apply_command(MotionCommand::Move {
                direction: Direction::Reverse,
                steps: 10,
            })
            .unwrap_err(),
            HalError::Busy(_)
        ));
        assert!(matches!(
            sim.apply_command(MotionCommand::ResetPosition).unwrap_err(),
            HalError::Busy(_)
        ));
    }

    #[test]
    fn same_direction_retarget_is_accepted() {
        let mut sim = sim();
        sim.apply_command(MotionCommand::GoTo { position: 1000 }).unwrap();
        for _ in 0..100 {
            sim.tick(DT);
        }
        assert!(sim.is_busy());

        sim.apply_command(MotionCommand::GoTo { position: 2000 }).unwrap();
        for _ in 0..10_000 {
            sim.tick(DT);
            if !sim.is_busy() {
                break;
            }
        }
        assert_eq!(sim.position(), 2000);
    }

    #[test]
    fn hiz_flag_set_by_hiz_stops_and_cleared_by_motion() {
        let mut sim = sim();
        sim.apply_command(MotionCommand::HardHiZ).unwrap();
        assert!(sim.status().contains(MotorStatus::HIZ));

        sim.apply_command(MotionCommand::Run {
            direction: Direction::Forward,
            speed: 100.0,
        })
        .unwrap();
        assert!(!sim.status().contains(MotorStatus::HIZ));
    }

    #[test]
    fn hard_stop_twice_matches_single_stop() {
        let mut sim = sim();
        sim.apply_command(MotionCommand::Run {
            direction: Direction::Forward,
            speed: 400.0,
        })
        .unwrap();
        for _ in 0..200 {
            sim.tick(DT);
        }

        sim.apply_command(MotionCommand::HardStop).unwrap();
        let pos = sim.position();
        sim.apply_command(MotionCommand::HardStop).unwrap();

        assert_eq!(sim.phase(), MotionPhase::Stopped);
        assert_eq!(sim.speed(), 0.0);
        assert_eq!(sim.position(), pos);
    }

    #[test]
    fn frame_codec_drives_motion() {
        let mut sim = sim();
        let mut rx = [0u8; FRAME_LEN];

        // RUN forward at 300.000 steps/s.
        let speed_millisteps = 300_000u32.to_be_bytes();
        let tx = [
            opcode::RUN,
            1,
            speed_millisteps[0],
            speed_millisteps[1],
            speed_millisteps[2],
            speed_millisteps[3],
        ];
        sim.handle_frame(&tx, &mut rx).unwrap();

        for _ in 0..1000 {
            sim.tick(DT);
        }
        assert!((sim.speed() - 300.0).abs() < 1e-6);

        // GET_PARAM SPEED returns the live value.
        let tx = [opcode::GET_PARAM, registers::SPEED, 0, 0, 0, 0];
        sim.handle_frame(&tx, &mut rx).unwrap();
        let speed = u32::from_be_bytes([rx[2], rx[3], rx[4], rx[5]]);
        assert_eq!(speed, 300);
    }

    #[test]
    fn get_status_frame_reports_and_clears_edges() {
        let mut sim = sim();
        let mut rx = [0u8; FRAME_LEN];
        assert!(sim.handle_frame(&[0xEE, 0, 0, 0, 0, 0], &mut rx).is_err());

        sim.handle_frame(&[opcode::GET_STATUS, 0, 0, 0, 0, 0], &mut rx)
            .unwrap();
        let word = u16::from_be_bytes([rx[4], rx[5]]);
        assert!(MotorStatus::from_bits_truncate(word).contains(MotorStatus::WRONG_CMD));

        sim.handle_frame(&[opcode::GET_STATUS, 0, 0, 0, 0, 0], &mut rx)
            .unwrap();
        let word = u16::from_be_bytes([rx[4], rx[5]]);
        assert!(!MotorStatus::from_bits_truncate(word).contains(MotorStatus::WRONG_CMD));
    }
}
