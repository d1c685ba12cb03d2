//! Safety core driven against the simulated platform, end to end: fault
//! injection reaches the motor-power pin, watchdog starvation trips the
//! stop, and the button reset protocol runs over real pin levels.

use dax_common::config::{AxisConfig, RigConfig, SafetyConfig, SharedConfig};
use dax_common::encoder::MagnetStatus;
use dax_common::hal::DigitalIo;
use dax_common::motor::FaultKind;
use dax_hal::rig::{ESTOP_BUTTON_PIN, FAULT_INDICATOR_PIN, MOTOR_POWER_PIN};
use dax_hal::{SimPlatform, SimRig};
use dax_safety::{
    EncoderHealth, InterruptTable, MonitorSample, MotorHealth, PinSafetyOutputs, ResetResult,
    SafetyCore, SafetyInputs, SafetyState, TriggerSource,
};

fn rig_config() -> RigConfig {
    RigConfig {
        shared: SharedConfig {
            log_level: Default::default(),
            service_name: "safety-rig".to_string(),
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
                acceleration: 1000.0,
                deceleration: 1000.0,
                max_speed: 500.0,
                min_speed: 0.0,
                encoder: Default::default(),
            },
        ],
        safety: SafetyConfig::default(),
    }
}

fn sample_from(rig: &SimRig) -> MonitorSample {
    let mut sample = MonitorSample::default();
    for axis in 0..rig.axis_count() {
        let motor = rig.motor(axis).unwrap();
        sample.motors[axis] = MotorHealth {
            status: motor.status(),
            fault: motor.active_fault(),
        };
        sample.encoders[axis] = EncoderHealth {
            magnet: rig.encoder(axis).unwrap().magnet_status(),
        };
    }
    sample
}

fn inputs_from(platform: &SimPlatform) -> SafetyInputs {
    SafetyInputs {
        button_pressed: platform.read(ESTOP_BUTTON_PIN).unwrap(),
        sample: sample_from(platform.rig()),
    }
}

fn poll(core: &mut SafetyCore, platform: &mut SimPlatform) -> SafetyState {
    let inputs = inputs_from(platform);
    let now_ms = platform.rig().now_ms();
    let mut outputs = PinSafetyOutputs::new(platform, MOTOR_POWER_PIN, FAULT_INDICATOR_PIN);
    core.poll(&inputs, &mut outputs, now_ms).unwrap()
}

fn setup() -> (SafetyCore, SimPlatform) {
    let config = rig_config();
    config.validate().unwrap();
    let mut platform = SimPlatform::new(SimRig::new(&config).unwrap());
    // Supervisor powers the motors once armed.
    platform.write(MOTOR_POWER_PIN, true).unwrap();

    let mut core = SafetyCore::new(&config.safety);
    core.init(&InterruptTable::new(), &config.safety, 0).unwrap();
    (core, platform)
}

#[test]
fn injected_stall_cuts_power_within_budget() {
    let (mut core, mut platform) = setup();
    assert_eq!(poll(&mut core, &mut platform), SafetyState::Armed);
    assert!(platform.read(MOTOR_POWER_PIN).unwrap());

    platform
        .rig_mut()
        .motor_mut(0)
        .unwrap()
        .inject_fault(FaultKind::Stall);
    let detected_at = platform.rig().now_ms();

    // The very next safety pass must de-assert the power pin: the cut
    // happens inside the trigger handler, not a deferred task.
    assert_eq!(poll(&mut core, &mut platform), SafetyState::Triggered);
    assert!(!platform.read(MOTOR_POWER_PIN).unwrap());
    assert!(platform.read(FAULT_INDICATOR_PIN).unwrap());
    assert_eq!(core.last_trigger_source(), Some(TriggerSource::MotorFault));

    let reaction_ms = platform.rig().now_ms() - detected_at;
    assert!(reaction_ms <= u64::from(rig_config().safety.reaction_budget_ms));
}

#[test]
fn magnet_loss_trips_encoder_fault() {
    let (mut core, mut platform) = setup();
    poll(&mut core, &mut platform);

    platform
        .rig_mut()
        .encoder_mut(1)
        .unwrap()
        .set_magnet_status(MagnetStatus::empty());

    // Advance past the monitor interval so the next poll samples it.
    platform.advance(10);
    assert_eq!(poll(&mut core, &mut platform), SafetyState::Triggered);
    assert_eq!(core.last_trigger_source(), Some(TriggerSource::EncoderFault));
    assert!(!platform.read(MOTOR_POWER_PIN).unwrap());
}

#[test]
fn watchdog_starvation_trips_the_stop() {
    let (mut core, mut platform) = setup();

    // 3 s of healthy operation: refresh every 200 ms.
    for _ in 0..3000u32 {
        platform.advance(1);
        let now_ms = platform.rig().now_ms();
        if now_ms % 200 == 0 {
            core.refresh_watchdog(now_ms).unwrap();
        }
        assert_eq!(poll(&mut core, &mut platform), SafetyState::Armed);
    }
    let stats = core.watchdog_stats();
    assert_eq!(stats.refresh_count, 15);
    assert_eq!(stats.missed_count, 0);
    assert_eq!(stats.timeout_count, 0);

    // Stop refreshing; the default 1000 ms timeout elapses.
    let mut state = SafetyState::Armed;
    for _ in 0..1100u32 {
        platform.advance(1);
        state = poll(&mut core, &mut platform);
        if state == SafetyState::Triggered {
            break;
        }
    }

    assert_eq!(state, SafetyState::Triggered);
    assert_eq!(core.last_trigger_source(), Some(TriggerSource::Watchdog));
    assert_eq!(core.watchdog_stats().timeout_count, 1);
    assert!(!platform.read(MOTOR_POWER_PIN).unwrap());
}

#[test]
fn button_reset_protocol_over_pins() {
    let (mut core, mut platform) = setup();
    poll(&mut core, &mut platform);

    // Operator hits the button.
    platform
        .rig_mut()
        .io_mut()
        .set_input(ESTOP_BUTTON_PIN, true)
        .unwrap();
    assert_eq!(poll(&mut core, &mut platform), SafetyState::Triggered);
    assert!(!platform.read(MOTOR_POWER_PIN).unwrap());

    // Past the cooldown, button still held: reset must refuse.
    platform.advance(200);
    let inputs = inputs_from(&platform);
    let now_ms = platform.rig().now_ms();
    let mut outputs = PinSafetyOutputs::new(&mut platform, MOTOR_POWER_PIN, FAULT_INDICATOR_PIN);
    assert_eq!(
        core.request_reset(&inputs, &mut outputs, now_ms).unwrap(),
        ResetResult::StillTriggered
    );
    assert_eq!(core.state(), SafetyState::ResetPending);

    // Button released: reset re-arms and the indicator clears.
    platform
        .rig_mut()
        .io_mut()
        .set_input(ESTOP_BUTTON_PIN, false)
        .unwrap();
    platform.advance(10);
    let inputs = inputs_from(&platform);
    let now_ms = platform.rig().now_ms();
    let mut outputs = PinSafetyOutputs::new(&mut platform, MOTOR_POWER_PIN, FAULT_INDICATOR_PIN);
    assert_eq!(
        core.request_reset(&inputs, &mut outputs, now_ms).unwrap(),
        ResetResult::Armed
    );
    assert!(!platform.read(FAULT_INDICATOR_PIN).unwrap());
    assert!(!core.is_active());
}
