use approx::assert_abs_diff_eq;
use laser_scan_core::{ChannelOrder, Frame};
use laser_scan_engine::sim::{RecordingActuator, RecordingEmitter, ScriptedFrames, WallScene};
use laser_scan_engine::{
    ActuatorError, CaptureError, CaptureRetryParams, FrameSource, PixelProbe, ProbeHandle,
    ScanConfig, ScanEngine, ScanError, ScanObserver, StopReason, StopSignal, TickContext,
};
use std::time::Duration;

const WIDTH: usize = 1280;
const HEIGHT: usize = 960;

fn quick_config(max_ticks: u64) -> ScanConfig {
    ScanConfig {
        tick_period_ms: 0,
        settle_ms: 0,
        capture: CaptureRetryParams {
            max_attempts: 3,
            initial_backoff_ms: 0,
        },
        max_ticks: Some(max_ticks),
        ..ScanConfig::default()
    }
}

fn wall(config: &ScanConfig, distance: f64) -> WallScene {
    let model = config.build_model().expect("model");
    WallScene::new(&model, distance, WIDTH, HEIGHT, ChannelOrder::Bgr, 200..700)
        .expect("render")
        .expect("wall visible")
}

fn wall_frame(config: &ScanConfig) -> Frame {
    wall(config, 17.0).capture().expect("frame")
}

#[test]
fn flat_wall_yields_identical_profiles() {
    let config = quick_config(40);
    let mut engine = ScanEngine::new(
        &config,
        wall(&config, 17.0),
        RecordingActuator::new(),
        RecordingEmitter::new(),
    )
    .expect("engine");

    let summary = engine.run(&StopSignal::new()).expect("scan");
    assert_eq!(summary.stop_reason, StopReason::TickLimit);
    assert_eq!(summary.ticks, 40);
    assert_eq!(summary.points, 40 * 500);
    assert_eq!(summary.dropped_rows, 0);
    assert!(summary.sweeps >= 1);

    let stats = summary.stats.expect("stats");
    assert_abs_diff_eq!(stats.mean_x, 17.0, epsilon = 1e-6);
    assert!(stats.var_x < 1e-12, "var x = {}", stats.var_x);

    let cloud = engine.cloud();
    let (_, first) = cloud.profiles().next().expect("first profile");
    for (slice, profile) in cloud.profiles() {
        assert_eq!(profile.len(), 500, "tick {}", slice.tick);
        for (a, b) in first.iter().zip(profile) {
            assert_eq!(a.y, b.y);
        }
    }
}

#[test]
fn slices_carry_the_capture_position() {
    let config = quick_config(30);
    let actuator = RecordingActuator::new();
    let mut engine = ScanEngine::new(
        &config,
        wall(&config, 14.0),
        actuator.clone(),
        RecordingEmitter::new(),
    )
    .expect("engine");
    engine.run(&StopSignal::new()).expect("scan");

    // home, one command per tick, park
    let commands = actuator.commands();
    assert_eq!(commands.len(), 32);
    assert_eq!(commands.first().copied(), Some(1863));
    assert_eq!(commands.last().copied(), Some(1863));

    let slices = engine.cloud().slices();
    assert_eq!(slices.len(), 30);
    for (i, slice) in slices.iter().enumerate() {
        assert_eq!(slice.tick, i as u64);
        assert_eq!(slice.pulse_width, commands[i], "tick {i}");
        assert!((1400..=2100).contains(&slice.pulse_width));
    }
}

#[test]
fn transient_capture_failure_is_retried() {
    let config = quick_config(2);
    let source = ScriptedFrames::default();
    source.push_error(CaptureError::Timeout(Duration::from_millis(50)));
    source.push_frame(wall_frame(&config));
    source.push_frame(wall_frame(&config));

    let mut engine = ScanEngine::new(
        &config,
        source.clone(),
        RecordingActuator::new(),
        RecordingEmitter::new(),
    )
    .expect("engine");
    let summary = engine.run(&StopSignal::new()).expect("scan");
    assert_eq!(summary.ticks, 2);
    assert_eq!(summary.capture_retries, 1);
    assert_eq!(source.captures(), 3);
}

#[test]
fn exhausted_capture_retries_shut_the_scanner_down() {
    let config = quick_config(10);
    let source = ScriptedFrames::default();
    source.push_frame(wall_frame(&config));
    for _ in 0..3 {
        source.push_error(CaptureError::Unavailable("usb reset".into()));
    }
    let actuator = RecordingActuator::new();
    let emitter = RecordingEmitter::new();

    let mut engine = ScanEngine::new(&config, source.clone(), actuator.clone(), emitter.clone())
        .expect("engine");
    let err = engine.run(&StopSignal::new()).unwrap_err();
    assert!(matches!(
        err,
        ScanError::Capture {
            attempts: 3,
            source: CaptureError::Unavailable(_)
        }
    ));

    assert_eq!(engine.ticks(), 1);
    assert_eq!(emitter.transitions(), vec![true, false]);
    assert!(!emitter.is_enabled());
    assert!(actuator.relaxed());
    assert_eq!(actuator.commands().last().copied(), Some(1863));
    assert!(source.released());
}

#[test]
fn closed_source_is_not_retried() {
    let config = quick_config(10);
    let source = ScriptedFrames::default();
    let mut engine = ScanEngine::new(
        &config,
        source.clone(),
        RecordingActuator::new(),
        RecordingEmitter::new(),
    )
    .expect("engine");
    let err = engine.run(&StopSignal::new()).unwrap_err();
    assert!(matches!(
        err,
        ScanError::Capture {
            attempts: 1,
            source: CaptureError::Closed
        }
    ));
    assert_eq!(source.captures(), 1);
}

#[test]
fn actuator_fault_is_fatal() {
    let config = quick_config(10);
    let source = ScriptedFrames::new((0..5).map(|_| wall_frame(&config)));
    let actuator = RecordingActuator::new();
    // home, tick 0 step, then the tick 1 step fails
    actuator.fail_on_command(3);
    let emitter = RecordingEmitter::new();

    let mut engine = ScanEngine::new(&config, source.clone(), actuator.clone(), emitter.clone())
        .expect("engine");
    let err = engine.run(&StopSignal::new()).unwrap_err();
    assert!(matches!(
        err,
        ScanError::Actuator(ActuatorError::Rejected {
            pulse_width: 1903,
            ..
        })
    ));

    // Both captured frames are kept with the positions they were taken at.
    let slices = engine.cloud().slices();
    assert_eq!(slices.len(), 2);
    assert_eq!((slices[0].pulse_width, slices[1].pulse_width), (1863, 1883));

    // Parking fails as well, the remaining steps still run.
    assert_eq!(actuator.commands(), vec![1863, 1883]);
    assert!(actuator.relaxed());
    assert!(!emitter.is_enabled());
    assert!(source.released());
}

struct StopAt {
    tick: u64,
    signal: StopSignal,
}

impl ScanObserver for StopAt {
    fn on_tick(&mut self, ctx: &TickContext<'_>) {
        if ctx.tick == self.tick {
            self.signal.stop();
        }
    }
}

#[test]
fn stop_is_observed_at_the_next_tick_boundary() {
    let config = ScanConfig {
        max_ticks: None,
        ..quick_config(0)
    };
    let stop = StopSignal::new();
    let emitter = RecordingEmitter::new();
    let mut engine = ScanEngine::new(
        &config,
        wall(&config, 17.0),
        RecordingActuator::new(),
        emitter.clone(),
    )
    .expect("engine");
    engine.add_observer(StopAt {
        tick: 4,
        signal: stop.clone(),
    });

    let summary = engine.run(&stop).expect("scan");
    assert_eq!(summary.stop_reason, StopReason::Stopped);
    assert_eq!(summary.ticks, 5);
    assert!(!emitter.is_enabled());
}

#[test]
fn stop_before_first_tick_still_parks() {
    let config = quick_config(10);
    let stop = StopSignal::new();
    stop.stop();
    let actuator = RecordingActuator::new();
    let emitter = RecordingEmitter::new();
    let mut engine = ScanEngine::new(
        &config,
        wall(&config, 17.0),
        actuator.clone(),
        emitter.clone(),
    )
    .expect("engine");

    let summary = engine.run(&stop).expect("scan");
    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.stats, None);
    assert_eq!(actuator.commands(), vec![1863, 1863]);
    assert_eq!(emitter.transitions(), vec![true, false]);
}

#[test]
fn emitter_failure_on_shutdown_is_reported() {
    let config = quick_config(1);
    let actuator = RecordingActuator::new();
    let emitter = RecordingEmitter::new();
    emitter.fail_disable();
    let mut engine = ScanEngine::new(&config, wall(&config, 17.0), actuator.clone(), emitter)
        .expect("engine");

    let err = engine.run(&StopSignal::new()).unwrap_err();
    assert!(matches!(err, ScanError::Emitter(_)));
    assert!(actuator.relaxed());
}

#[test]
fn emitter_fault_on_start_still_parks_and_releases() {
    let config = quick_config(5);
    let source = ScriptedFrames::new([wall_frame(&config)]);
    let actuator = RecordingActuator::new();
    let emitter = RecordingEmitter::new();
    emitter.fail_enable();
    let mut engine = ScanEngine::new(&config, source.clone(), actuator.clone(), emitter.clone())
        .expect("engine");

    let err = engine.run(&StopSignal::new()).unwrap_err();
    assert!(matches!(err, ScanError::Emitter(_)));
    assert_eq!(engine.ticks(), 0);
    assert_eq!(source.captures(), 0);
    // never homed, only parked
    assert_eq!(actuator.commands(), vec![1863]);
    assert!(actuator.relaxed());
    assert_eq!(emitter.transitions(), vec![true, false]);
    assert!(!emitter.is_enabled());
    assert!(source.released());
}

#[test]
fn probe_reads_the_stripe_pixel() {
    let config = quick_config(3);
    let scene = wall(&config, 17.0);
    let column = scene.stripe_column();
    let mut engine = ScanEngine::new(
        &config,
        scene,
        RecordingActuator::new(),
        RecordingEmitter::new(),
    )
    .expect("engine");
    let handle = ProbeHandle::default();
    engine.add_observer(PixelProbe::new(&handle));
    handle.request(column, 300);

    engine.run(&StopSignal::new()).expect("scan");
    let reading = handle.last_reading().expect("reading");
    assert_eq!(reading.tick, 0);
    assert_eq!(reading.value, vec![24, 24, 235]);
}
