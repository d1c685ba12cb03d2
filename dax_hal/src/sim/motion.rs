//! Trapezoidal velocity profile integrator.
//!
//! One instance per axis, evaluated once per tick of size `dt`. The
//! deceleration trigger is computed from live speed and position every
//! tick (`v²/(2·deceleration)` against the remaining distance), never
//! pre-scheduled, so late target changes are honored.

use dax_common::motor::{Direction, MotionPhase};
use tracing::trace;

/// Speed below which a decelerating axis is considered stopped.
const SPEED_EPSILON: f64 = 1e-9;

/// Per-axis kinematic state driven by the trapezoidal profile.
#[derive(Debug, Clone)]
pub struct MotionProfile {
    /// Current position in steps (integrated, fractional).
    position: f64,
    /// Target position in steps, meaningful when `has_target`.
    target_position: f64,
    /// Current speed in steps/s, always >= 0.
    current_speed: f64,
    /// Commanded cruise speed in steps/s.
    target_speed: f64,
    /// Acceleration in steps/s².
    acceleration: f64,
    /// Deceleration in steps/s².
    deceleration: f64,
    /// Speed at which motion starts, steps/s.
    min_speed: f64,
    /// Trapezoidal phase.
    phase: MotionPhase,
    /// Travel direction.
    direction: Direction,
    /// Whether the current motion has a positional target.
    has_target: bool,
}

impl MotionProfile {
    /// Create a stopped profile with the given kinematic limits.
    pub fn new(acceleration: f64, deceleration: f64, min_speed: f64) -> Self {
        Self {
            position: 0.0,
            target_position: 0.0,
            current_speed: 0.0,
            target_speed: 0.0,
            acceleration,
            deceleration,
            min_speed,
            phase: MotionPhase::Stopped,
            direction: Direction::Forward,
            has_target: false,
        }
    }

    /// Current phase.
    #[inline]
    pub const fn phase(&self) -> MotionPhase {
        self.phase
    }

    /// Current travel direction.
    #[inline]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Current speed in steps/s.
    #[inline]
    pub const fn speed(&self) -> f64 {
        self.current_speed
    }

    /// Current position in steps, rounded to the nearest integer step.
    #[inline]
    pub fn position_steps(&self) -> i32 {
        self.position.round() as i32
    }

    /// Target position in steps, rounded.
    #[inline]
    pub fn target_steps(&self) -> i32 {
        self.target_position.round() as i32
    }

    /// True while the profile is executing a motion.
    #[inline]
    pub const fn is_busy(&self) -> bool {
        self.phase.is_busy()
    }

    /// Replace the acceleration limit.
    pub fn set_acceleration(&mut self, acceleration: f64) {
        self.acceleration = acceleration;
    }

    /// Replace the deceleration limit.
    pub fn set_deceleration(&mut self, deceleration: f64) {
        self.deceleration = deceleration;
    }

    /// Replace the minimum starting speed.
    pub fn set_min_speed(&mut self, min_speed: f64) {
        self.min_speed = min_speed;
    }

    /// Overwrite the position (register write or state restore).
    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    /// Begin a free-running motion at `speed` steps/s.
    pub fn start_run(&mut self, direction: Direction, speed: f64) {
        self.direction = direction;
        self.target_speed = speed;
        self.has_target = false;
        self.enter_ramp();
    }

    /// Begin a relative move of `steps` in `direction` at `cruise_speed`.
    pub fn start_move(&mut self, direction: Direction, steps: u32, cruise_speed: f64) {
        self.direction = direction;
        self.target_position = self.position + direction.sign() * f64::from(steps);
        self.target_speed = cruise_speed;
        self.has_target = true;
        self.enter_ramp();
    }

    /// Begin an absolute move to `position` at `cruise_speed`.
    ///
    /// Direction is derived from the sign of the remaining distance; a
    /// zero-distance request completes immediately.
    pub fn start_goto(&mut self, position: f64, cruise_speed: f64) {
        let delta = position - self.position;
        if delta == 0.0 && !self.is_busy() {
            self.target_position = position;
            return;
        }
        self.direction = if delta >= 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        };
        self.target_position = position;
        self.target_speed = cruise_speed;
        self.has_target = true;
        self.enter_ramp();
    }

    /// Decelerate to zero at the configured rate.
    pub fn soft_stop(&mut self) {
        if !self.is_busy() {
            return;
        }
        self.has_target = false;
        self.target_speed = 0.0;
        self.phase = MotionPhase::Decelerating;
    }

    /// Force velocity to zero immediately.
    pub fn hard_stop(&mut self) {
        self.current_speed = 0.0;
        self.target_speed = 0.0;
        self.has_target = false;
        self.phase = MotionPhase::Stopped;
    }

    /// Zero both position and target.
    pub fn reset_position(&mut self) {
        self.position = 0.0;
        self.target_position = 0.0;
    }

    /// The travel direction a `GoTo` to `position` would take.
    pub fn goto_direction(&self, position: f64) -> Direction {
        if position - self.position >= 0.0 {
            Direction::Forward
        } else {
            Direction::Reverse
        }
    }

    /// Advance the profile by `dt` seconds.
    pub fn tick(&mut self, dt: f64) {
        match self.phase {
            MotionPhase::Stopped => {
                self.current_speed = 0.0;
                return;
            }
            MotionPhase::Accelerating => {
                self.current_speed += self.acceleration * dt;
                if self.current_speed >= self.target_speed {
                    self.current_speed = self.target_speed;
                    self.phase = MotionPhase::ConstantSpeed;
                }
                if self.deceleration_due() {
                    self.phase = MotionPhase::Decelerating;
                }
            }
            MotionPhase::ConstantSpeed => {
                if self.deceleration_due() {
                    self.phase = MotionPhase::Decelerating;
                }
            }
            MotionPhase::Decelerating => {
                self.current_speed -= self.deceleration * dt;
                if !self.has_target
                    && self.target_speed > 0.0
                    && self.current_speed <= self.target_speed
                {
                    // Run retargeted to a lower speed: settle there.
                    self.current_speed = self.target_speed;
                    self.phase = MotionPhase::ConstantSpeed;
                } else if self.current_speed <= SPEED_EPSILON {
                    self.finish();
                    return;
                }
            }
        }

        self.position += self.direction.sign() * self.current_speed * dt;

        // Overshoot guard: a late tick past the target ends the motion.
        if self.has_target && self.remaining_distance() <= 0.0 {
            self.finish();
        }

        trace!(
            "profile tick: pos={:.3} v={:.3} phase={:?}",
            self.position, self.current_speed, self.phase
        );
    }

    /// Signed distance left along the travel direction.
    fn remaining_distance(&self) -> f64 {
        (self.target_position - self.position) * self.direction.sign()
    }

    /// Live deceleration trigger: stopping distance at the current speed.
    fn deceleration_due(&self) -> bool {
        if !self.has_target {
            return false;
        }
        let stopping = self.current_speed * self.current_speed / (2.0 * self.deceleration);
        self.remaining_distance() <= stopping
    }

    /// Enter the ramp toward `target_speed` from the current speed.
    fn enter_ramp(&mut self) {
        if self.current_speed < self.min_speed {
            self.current_speed = self.min_speed;
        }
        self.phase = if self.current_speed < self.target_speed {
            MotionPhase::Accelerating
        } else if self.current_speed > self.target_speed {
            MotionPhase::Decelerating
        } else {
            MotionPhase::ConstantSpeed
        };
    }

    /// Motion complete: stop and, for positional commands, land exactly on
    /// the integer target (step quantization).
    fn finish(&mut self) {
        if self.has_target {
            self.position = self.target_position;
        }
        self.current_speed = 0.0;
        self.has_target = false;
        self.phase = MotionPhase::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.001;

    fn profile() -> MotionProfile {
        MotionProfile::new(1000.0, 1000.0, 0.0)
    }

    /// A full trapezoid lands exactly on the integer target with the axis
    /// stopped.
    #[test]
    fn move_reaches_exact_target() {
        let mut p = profile();
        p.start_move(Direction::Forward, 1000, 500.0);

        for _ in 0..10_000 {
            p.tick(DT);
            assert!(p.is_busy() == (p.phase() != MotionPhase::Stopped));
            assert!(p.speed() <= 500.0 + 1e-6);
            if p.phase() == MotionPhase::Stopped {
                break;
            }
        }

        assert_eq!(p.phase(), MotionPhase::Stopped);
        assert_eq!(p.position_steps(), 1000);
        assert_eq!(p.speed(), 0.0);
    }

    #[test]
    fn profile_passes_through_all_phases() {
        let mut p = profile();
        p.start_move(Direction::Forward, 1000, 500.0);

        let mut seen = Vec::new();
        for _ in 0..10_000 {
            p.tick(DT);
            if seen.last() != Some(&p.phase()) {
                seen.push(p.phase());
            }
            if p.phase() == MotionPhase::Stopped {
                break;
            }
        }

        assert_eq!(
            seen,
            vec![
                MotionPhase::Accelerating,
                MotionPhase::ConstantSpeed,
                MotionPhase::Decelerating,
                MotionPhase::Stopped,
            ]
        );
    }

    /// A short move never reaches cruise speed and still lands exactly.
    #[test]
    fn short_move_skips_cruise() {
        let mut p = profile();
        p.start_move(Direction::Forward, 50, 500.0);

        for _ in 0..10_000 {
            p.tick(DT);
            if p.phase() == MotionPhase::Stopped {
                break;
            }
        }

        assert_eq!(p.position_steps(), 50);
    }

    #[test]
    fn reverse_move_integrates_negative() {
        let mut p = profile();
        p.start_move(Direction::Reverse, 200, 500.0);

        for _ in 0..10_000 {
            p.tick(DT);
            if p.phase() == MotionPhase::Stopped {
                break;
            }
        }

        assert_eq!(p.position_steps(), -200);
    }

    #[test]
    fn hard_stop_is_idempotent() {
        let mut p = profile();
        p.start_run(Direction::Forward, 300.0);
        for _ in 0..100 {
            p.tick(DT);
        }
        assert!(p.is_busy());

        p.hard_stop();
        let pos = p.position_steps();
        assert_eq!(p.phase(), MotionPhase::Stopped);
        assert_eq!(p.speed(), 0.0);

        p.hard_stop();
        assert_eq!(p.phase(), MotionPhase::Stopped);
        assert_eq!(p.speed(), 0.0);
        assert_eq!(p.position_steps(), pos);
    }

    #[test]
    fn soft_stop_decelerates_to_zero() {
        let mut p = profile();
        p.start_run(Direction::Forward, 500.0);
        for _ in 0..600 {
            p.tick(DT);
        }
        assert_eq!(p.phase(), MotionPhase::ConstantSpeed);

        p.soft_stop();
        assert_eq!(p.phase(), MotionPhase::Decelerating);

        let mut ticks = 0;
        while p.is_busy() {
            p.tick(DT);
            ticks += 1;
            assert!(ticks < 1000, "soft stop did not converge");
        }
        assert_eq!(p.speed(), 0.0);
    }

    /// The deceleration trigger is recomputed live: retargeting further out
    /// mid-deceleration resumes the motion and still lands exactly.
    #[test]
    fn late_retarget_is_honored() {
        let mut p = profile();
        p.start_goto(1000.0, 500.0);

        for _ in 0..10_000 {
            p.tick(DT);
            if p.phase() == MotionPhase::Decelerating {
                break;
            }
        }
        assert_eq!(p.phase(), MotionPhase::Decelerating);

        p.start_goto(2000.0, 500.0);
        for _ in 0..20_000 {
            p.tick(DT);
            if p.phase() == MotionPhase::Stopped {
                break;
            }
        }

        assert_eq!(p.position_steps(), 2000);
    }

    #[test]
    fn run_retarget_down_settles_at_lower_speed() {
        let mut p = profile();
        p.start_run(Direction::Forward, 500.0);
        for _ in 0..600 {
            p.tick(DT);
        }
        assert_eq!(p.speed(), 500.0);

        p.start_run(Direction::Forward, 200.0);
        for _ in 0..600 {
            p.tick(DT);
        }
        assert_eq!(p.phase(), MotionPhase::ConstantSpeed);
        assert!((p.speed() - 200.0).abs() < 1e-6);
    }

    #[test]
    fn goto_zero_distance_completes_immediately() {
        let mut p = profile();
        p.start_goto(0.0, 500.0);
        assert_eq!(p.phase(), MotionPhase::Stopped);
        assert_eq!(p.position_steps(), 0);
    }
}
