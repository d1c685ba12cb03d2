//! Simulated rig: clock + engines + I/O behind one tick entry point.
//!
//! Callers own the timing source: nothing moves until
//! [`SimRig::advance`] is called, and a call drives every engine forward
//! by exactly the same delta.

use crate::clock::SimClock;
use crate::sim::driver::MotorSimulator;
use crate::sim::encoder::EncoderSimulator;
use crate::sim::io::IoSimulator;
use crate::sim::state::{PersistedAxisState, PersistedState, StatePersistence};
use dax_common::config::RigConfig;
use dax_common::error::{HalError, HalResult};
use dax_common::hal::{MonotonicClock, PinId, PinMode};
use dax_common::motor::registers;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Emergency-button input pin (asserted = pressed).
pub const ESTOP_BUTTON_PIN: PinId = 0;
/// Motor-power output pin (asserted = power on).
pub const MOTOR_POWER_PIN: PinId = 8;
/// Fault-indicator output pin.
pub const FAULT_INDICATOR_PIN: PinId = 9;

/// The simulated rig: one clock, one I/O bank, and a driver + encoder
/// engine pair per configured axis.
pub struct SimRig {
    clock: SimClock,
    motors: Vec<MotorSimulator>,
    encoders: Vec<EncoderSimulator>,
    io: IoSimulator,
    persistence: Option<StatePersistence>,
}

impl SimRig {
    /// Build a rig from a validated configuration.
    pub fn new(config: &RigConfig) -> HalResult<Self> {
        let motors = config
            .axes
            .iter()
            .map(MotorSimulator::new)
            .collect::<HalResult<Vec<_>>>()?;

        let encoders = config
            .axes
            .iter()
            .enumerate()
            .map(|(idx, axis)| EncoderSimulator::new(&axis.name, &axis.encoder, 0x9E37 + idx as u32))
            .collect();

        let mut io = IoSimulator::new();
        io.configure(ESTOP_BUTTON_PIN, PinMode::Input)?;
        io.configure(MOTOR_POWER_PIN, PinMode::Output)?;
        io.configure(FAULT_INDICATOR_PIN, PinMode::Output)?;

        let persistence = config.state_file.as_ref().map(StatePersistence::new);

        let mut rig = Self {
            clock: SimClock::new(),
            motors,
            encoders,
            io,
            persistence,
        };
        rig.restore_state();

        info!("sim rig ready: {} axes", rig.motors.len());
        Ok(rig)
    }

    /// Advance every engine by `delta_ms` milliseconds.
    pub fn advance(&mut self, delta_ms: u32) {
        self.clock.advance(delta_ms);
        let dt = Duration::from_millis(u64::from(delta_ms));

        for motor in &mut self.motors {
            motor.tick(dt);
        }
        for encoder in &mut self.encoders {
            encoder.tick(dt);
        }
    }

    /// Number of configured axes.
    pub fn axis_count(&self) -> usize {
        self.motors.len()
    }

    /// Simulation clock.
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Current time in milliseconds.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Driver engine of one axis.
    pub fn motor(&self, axis: usize) -> HalResult<&MotorSimulator> {
        self.motors
            .get(axis)
            .ok_or(HalError::InvalidParameter("axis index"))
    }

    /// Mutable driver engine of one axis.
    pub fn motor_mut(&mut self, axis: usize) -> HalResult<&mut MotorSimulator> {
        self.motors
            .get_mut(axis)
            .ok_or(HalError::InvalidParameter("axis index"))
    }

    /// Encoder engine of one axis.
    pub fn encoder(&self, axis: usize) -> HalResult<&EncoderSimulator> {
        self.encoders
            .get(axis)
            .ok_or(HalError::InvalidParameter("axis index"))
    }

    /// Mutable encoder engine of one axis.
    pub fn encoder_mut(&mut self, axis: usize) -> HalResult<&mut EncoderSimulator> {
        self.encoders
            .get_mut(axis)
            .ok_or(HalError::InvalidParameter("axis index"))
    }

    /// Digital pin bank.
    pub fn io(&self) -> &IoSimulator {
        &self.io
    }

    /// Mutable digital pin bank.
    pub fn io_mut(&mut self) -> &mut IoSimulator {
        &mut self.io
    }

    /// Persist sim state if a state file is configured.
    pub fn shutdown(&mut self) {
        let Some(persistence) = &self.persistence else {
            return;
        };

        let axes = self
            .motors
            .iter()
            .zip(&self.encoders)
            .map(|(motor, encoder)| PersistedAxisState {
                name: motor.name().to_string(),
                position: motor.position(),
                angle_deg: encoder.actual_deg(),
            })
            .collect();
        let state = PersistedState {
            version: PersistedState::CURRENT_VERSION,
            axes,
        };

        if let Err(e) = persistence.save(&state) {
            warn!("failed to save sim state: {e}");
        }
    }

    /// Restore sim state from the state file, if present and readable.
    fn restore_state(&mut self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let Some(state) = persistence.load_or_warn() else {
            return;
        };

        for (idx, motor) in self.motors.iter_mut().enumerate() {
            let Some(saved) = state.axes.iter().find(|a| a.name == motor.name()) else {
                debug!("no persisted state for axis {}", motor.name());
                continue;
            };
            let raw = registers::encode_position(saved.position);
            if let Err(e) = motor.write_register(registers::ABS_POS, raw) {
                warn!("axis {}: position restore rejected: {e}", motor.name());
                continue;
            }
            if let Some(encoder) = self.encoders.get_mut(idx) {
                encoder.set_angle(saved.angle_deg);
            }
            info!(
                "restored axis {}: position={} angle={:.1}",
                motor.name(),
                saved.position,
                saved.angle_deg
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dax_common::config::{AxisConfig, SharedConfig};
    use dax_common::motor::{Direction, MotionCommand};

    fn rig_config() -> RigConfig {
        RigConfig {
            shared: SharedConfig {
                log_level: Default::default(),
                service_name: "test-rig".to_string(),
            },
            tick_ms: 1,
            state_file: None,
            axes: vec![
                AxisConfig {
                    name: "x".to_string(),
                    acceleration: 1000.0,
                    deceleration: 1000.0,
                    max_speed: 500.0,
                    min_speed: 0.0,
                    encoder: Default::default(),
                },
                AxisConfig {
                    name: "y".to_string(),
                    acceleration: 2000.0,
                    deceleration: 2000.0,
                    max_speed: 800.0,
                    min_speed: 0.0,
                    encoder: Default::default(),
                },
            ],
            safety: Default::default(),
        }
    }

    #[test]
    fn advance_drives_all_engines() {
        let mut rig = SimRig::new(&rig_config()).unwrap();
        rig.motor_mut(0)
            .unwrap()
            .apply_command(MotionCommand::Run {
                direction: Direction::Forward,
                speed: 100.0,
            })
            .unwrap();

        rig.advance(10);
        assert_eq!(rig.now_ms(), 10);
        assert!(rig.motor(0).unwrap().speed() > 0.0);
        assert_eq!(rig.motor(1).unwrap().speed(), 0.0);
    }

    #[test]
    fn axes_are_independent() {
        let mut rig = SimRig::new(&rig_config()).unwrap();
        rig.motor_mut(0)
            .unwrap()
            .apply_command(MotionCommand::Move {
                direction: Direction::Forward,
                steps: 100,
            })
            .unwrap();

        for _ in 0..2000 {
            rig.advance(1);
        }

        assert_eq!(rig.motor(0).unwrap().position(), 100);
        assert_eq!(rig.motor(1).unwrap().position(), 0);
    }

    #[test]
    fn bad_axis_index_is_rejected() {
        let rig = SimRig::new(&rig_config()).unwrap();
        assert!(rig.motor(2).is_err());
        assert!(rig.encoder(5).is_err());
    }

    #[test]
    fn state_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("rig_state.json");
        let mut config = rig_config();
        config.state_file = Some(state_path.to_string_lossy().into_owned());

        {
            let mut rig = SimRig::new(&config).unwrap();
            rig.motor_mut(0)
                .unwrap()
                .apply_command(MotionCommand::Move {
                    direction: Direction::Forward,
                    steps: 250,
                })
                .unwrap();
            for _ in 0..2000 {
                rig.advance(1);
            }
            rig.encoder_mut(0).unwrap().set_angle(77.0);
            rig.shutdown();
        }

        let rig = SimRig::new(&config).unwrap();
        assert_eq!(rig.motor(0).unwrap().position(), 250);
        assert!((rig.encoder(0).unwrap().actual_deg() - 77.0).abs() < 1e-9);
    }
}
