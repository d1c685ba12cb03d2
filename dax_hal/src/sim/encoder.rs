//! Magnetic absolute-angle encoder engine.
//!
//! `actual_position_deg` is the ground truth driven by the configured
//! motion pattern; noise is applied only to the filtered angle, never to
//! the ground truth, so test assertions always have an authoritative
//! value to compare against.

use dax_common::config::EncoderConfig;
use dax_common::consts::{ENCODER_COUNTS, SINUSOIDAL_REF_FREQ_HZ};
use dax_common::encoder::registers as reg;
use dax_common::encoder::{MagnetStatus, MotionPattern};
use dax_common::error::{HalError, HalResult};
use std::f64::consts::TAU;
use std::time::Duration;
use tracing::debug;

/// Encoder engine for one axis.
pub struct EncoderSimulator {
    /// Axis name for logs.
    name: String,
    /// Ground-truth angle in degrees, always in [0, 360).
    actual_deg: f64,
    /// Exact 12-bit quantization of `actual_deg`.
    raw_angle: u16,
    /// `raw_angle` plus bounded noise, re-quantized.
    filtered_angle: u16,
    /// Motion pattern driving the angle.
    pattern: MotionPattern,
    /// Pattern parameter (deg/s for Linear, amplitude deg for Sinusoidal).
    pattern_param: f64,
    /// Peak noise amplitude in degrees.
    noise_amplitude: f64,
    /// Elapsed pattern time in seconds.
    elapsed_s: f64,
    /// Magnet health bits, settable for fault injection.
    magnet: MagnetStatus,
    /// Xorshift PRNG state for deterministic noise.
    rng: u32,
}

impl EncoderSimulator {
    /// Create an encoder engine from configuration.
    ///
    /// `seed` decorrelates the noise streams of different axes.
    pub fn new(name: &str, config: &EncoderConfig, seed: u32) -> Self {
        let mut sim = Self {
            name: name.to_string(),
            actual_deg: 0.0,
            raw_angle: 0,
            filtered_angle: 0,
            pattern: config.pattern,
            pattern_param: config.pattern_param,
            noise_amplitude: config.noise_amplitude,
            elapsed_s: 0.0,
            magnet: MagnetStatus::DETECTED,
            rng: seed | 1,
        };
        sim.quantize();
        debug!(
            "axis {}: encoder engine ready (pattern={:?})",
            sim.name, sim.pattern
        );
        sim
    }

    /// Ground-truth angle in degrees.
    pub fn actual_deg(&self) -> f64 {
        self.actual_deg
    }

    /// Exact 12-bit quantization of the ground truth.
    pub fn raw_angle(&self) -> u16 {
        self.raw_angle
    }

    /// Noisy 12-bit angle as the host reads it.
    pub fn filtered_angle(&self) -> u16 {
        self.filtered_angle
    }

    /// Current magnet health bits.
    pub fn magnet_status(&self) -> MagnetStatus {
        self.magnet
    }

    /// Overwrite the magnet health bits (fault injection).
    pub fn set_magnet_status(&mut self, magnet: MagnetStatus) {
        debug!("axis {}: magnet status forced to {:?}", self.name, magnet);
        self.magnet = magnet;
    }

    /// Replace the motion pattern, restarting the pattern time base.
    pub fn set_pattern(&mut self, pattern: MotionPattern, param: f64) {
        self.pattern = pattern;
        self.pattern_param = param;
        self.elapsed_s = 0.0;
    }

    /// Overwrite the ground-truth angle (state restore or tests).
    pub fn set_angle(&mut self, deg: f64) {
        self.actual_deg = deg.rem_euclid(360.0);
        self.quantize();
    }

    /// Advance the engine by one tick.
    pub fn tick(&mut self, dt: Duration) {
        let dt_s = dt.as_secs_f64();
        self.elapsed_s += dt_s;

        match self.pattern {
            MotionPattern::Static => {}
            MotionPattern::Linear => {
                self.actual_deg += self.pattern_param * dt_s;
            }
            MotionPattern::Sinusoidal => {
                self.actual_deg =
                    self.pattern_param * (TAU * SINUSOIDAL_REF_FREQ_HZ * self.elapsed_s).sin();
            }
        }

        self.actual_deg = self.actual_deg.rem_euclid(360.0);
        self.quantize();
    }

    /// Read one protocol register.
    pub fn read_register(&self, addr: u8) -> HalResult<u8> {
        match addr {
            reg::STATUS => Ok(self.magnet.bits()),
            reg::RAW_ANGLE_H => Ok((self.raw_angle >> 8) as u8),
            reg::RAW_ANGLE_L => Ok((self.raw_angle & 0xFF) as u8),
            reg::ANGLE_H => Ok((self.filtered_angle >> 8) as u8),
            reg::ANGLE_L => Ok((self.filtered_angle & 0xFF) as u8),
            reg::AGC => Ok(self.agc()),
            reg::MAGNITUDE_H => Ok((self.magnitude() >> 8) as u8),
            reg::MAGNITUDE_L => Ok((self.magnitude() & 0xFF) as u8),
            _ => Err(HalError::InvalidParameter("unknown encoder register")),
        }
    }

    /// Rebuild both quantized angles from the ground truth.
    fn quantize(&mut self) {
        self.raw_angle = quantize_deg(self.actual_deg);

        let noise = self.next_noise();
        self.filtered_angle = quantize_deg((self.actual_deg + noise).rem_euclid(360.0));
    }

    /// Deterministic bounded noise in [-noise_amplitude, noise_amplitude].
    fn next_noise(&mut self) -> f64 {
        if self.noise_amplitude == 0.0 {
            return 0.0;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let unit = f64::from(x) / f64::from(u32::MAX) * 2.0 - 1.0;
        unit * self.noise_amplitude
    }

    /// Gain value tracking magnet strength.
    fn agc(&self) -> u8 {
        if self.magnet.contains(MagnetStatus::TOO_WEAK) {
            255
        } else if self.magnet.contains(MagnetStatus::TOO_STRONG) {
            0
        } else if self.magnet.contains(MagnetStatus::DETECTED) {
            128
        } else {
            0
        }
    }

    /// Field magnitude tracking magnet strength.
    fn magnitude(&self) -> u16 {
        if self.magnet.contains(MagnetStatus::TOO_STRONG) {
            3800
        } else if self.magnet.contains(MagnetStatus::TOO_WEAK) {
            300
        } else if self.magnet.contains(MagnetStatus::DETECTED) {
            2000
        } else {
            50
        }
    }
}

/// 12-bit quantization of an angle in [0, 360).
fn quantize_deg(deg: f64) -> u16 {
    let counts = (deg / 360.0 * f64::from(ENCODER_COUNTS)).round() as u32;
    (counts % u32::from(ENCODER_COUNTS)) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: Duration = Duration::from_millis(1);

    fn encoder(pattern: MotionPattern, param: f64, noise: f64) -> EncoderSimulator {
        let config = EncoderConfig {
            pattern,
            pattern_param: param,
            noise_amplitude: noise,
        };
        EncoderSimulator::new("x", &config, 0xC0FFEE)
    }

    #[test]
    fn raw_angle_is_exact_quantization() {
        let mut enc = encoder(MotionPattern::Linear, 90.0, 0.0);
        for _ in 0..500 {
            enc.tick(DT);
            let expected = quantize_deg(enc.actual_deg());
            assert_eq!(enc.raw_angle(), expected);
            assert!(enc.raw_angle() < 4096);
        }
    }

    #[test]
    fn linear_pattern_advances_and_wraps() {
        let mut enc = encoder(MotionPattern::Linear, 100.0, 0.0);
        for _ in 0..4000 {
            enc.tick(DT);
        }
        // 100 deg/s for 4 s = 400 deg, wrapped into [0, 360).
        assert!((enc.actual_deg() - 40.0).abs() < 0.01);
    }

    /// Sinusoidal pattern, amplitude 90°: one quarter of the reference
    /// period puts the angle at the amplitude.
    #[test]
    fn sinusoidal_quarter_period_hits_amplitude() {
        let mut enc = encoder(MotionPattern::Sinusoidal, 90.0, 0.0);
        let quarter_period_ms = (1000.0 / SINUSOIDAL_REF_FREQ_HZ / 4.0) as u32;
        for _ in 0..quarter_period_ms {
            enc.tick(DT);
        }
        assert!((enc.actual_deg() - 90.0).abs() < 0.1);
    }

    #[test]
    fn static_pattern_holds_angle() {
        let mut enc = encoder(MotionPattern::Static, 0.0, 0.0);
        enc.set_angle(123.4);
        for _ in 0..1000 {
            enc.tick(DT);
        }
        assert_eq!(enc.actual_deg(), 123.4);
    }

    #[test]
    fn noise_never_touches_ground_truth() {
        let mut enc = encoder(MotionPattern::Static, 0.0, 5.0);
        enc.set_angle(180.0);

        let max_noise_counts = (5.0f64 / 360.0 * 4096.0).ceil() as i32 + 1;
        for _ in 0..1000 {
            enc.tick(DT);
            assert_eq!(enc.actual_deg(), 180.0);
            let delta = i32::from(enc.filtered_angle()) - i32::from(enc.raw_angle());
            assert!(delta.abs() <= max_noise_counts, "noise out of bounds");
        }
    }

    #[test]
    fn register_reads_assemble_angles() {
        let mut enc = encoder(MotionPattern::Static, 0.0, 0.0);
        enc.set_angle(90.0);

        let raw = u16::from(enc.read_register(reg::RAW_ANGLE_H).unwrap()) << 8
            | u16::from(enc.read_register(reg::RAW_ANGLE_L).unwrap());
        assert_eq!(raw, 1024); // 90° of 4096 counts

        let filtered = u16::from(enc.read_register(reg::ANGLE_H).unwrap()) << 8
            | u16::from(enc.read_register(reg::ANGLE_L).unwrap());
        assert_eq!(filtered, enc.filtered_angle());

        assert!(enc.read_register(0x55).is_err());
    }

    #[test]
    fn magnet_flags_track_injection() {
        let mut enc = encoder(MotionPattern::Static, 0.0, 0.0);
        assert_eq!(
            enc.read_register(reg::STATUS).unwrap(),
            MagnetStatus::DETECTED.bits()
        );
        assert_eq!(enc.read_register(reg::AGC).unwrap(), 128);

        enc.set_magnet_status(MagnetStatus::DETECTED | MagnetStatus::TOO_WEAK);
        assert_eq!(enc.read_register(reg::AGC).unwrap(), 255);
        let magnitude = u16::from(enc.read_register(reg::MAGNITUDE_H).unwrap()) << 8
            | u16::from(enc.read_register(reg::MAGNITUDE_L).unwrap());
        assert_eq!(magnitude, 300);

        // Magnet health does not disturb the angle computation.
        enc.set_angle(45.0);
        enc.tick(DT);
        assert_eq!(enc.actual_deg(), 45.0);
    }
}
