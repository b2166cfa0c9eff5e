use lightning::{
    AnimationDriver, DriverState, GpuCall, HeadlessHost, LightningParams, ManualClock,
    RecordingGpu, RecordingOptions, SetupError, ShaderStage, SharedParams, UniformValue,
    ViewportSize,
};

fn scenario_params() -> LightningParams {
    LightningParams {
        hue: 230.0,
        x_offset: 0.0,
        speed: 1.6,
        intensity: 0.6,
        size: 2.0,
    }
}

fn driver(clock: &ManualClock) -> AnimationDriver<RecordingGpu, ManualClock> {
    AnimationDriver::new(SharedParams::new(scenario_params()), clock.clone())
}

fn floats(values: Vec<UniformValue>) -> Vec<f32> {
    values.into_iter().filter_map(UniformValue::as_float).collect()
}

#[test]
fn three_frames_advance_time_and_keep_params_constant() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(ViewportSize::new(800, 600));
    let log = host.log().clone();
    let mut driver = driver(&clock);
    driver.mount(&mut host).expect("mount");

    for t in [0.0, 0.016, 0.033] {
        clock.set_secs(t);
        assert!(host.advance(&mut driver));
    }

    let times = floats(log.uniform_writes("iTime"));
    assert_eq!(times.len(), 3);
    for (written, expected) in times.iter().zip([0.0f32, 0.016, 0.033]) {
        assert!((written - expected).abs() < 1e-6, "{written} != {expected}");
    }

    let expected = [
        ("uHue", 230.0),
        ("uXOffset", 0.0),
        ("uSpeed", 1.6),
        ("uIntensity", 0.6),
        ("uSize", 2.0),
    ];
    for (name, value) in expected {
        assert_eq!(floats(log.uniform_writes(name)), [value; 3], "{name}");
    }
    assert_eq!(
        log.uniform_writes("iResolution"),
        [UniformValue::Vec2(800.0, 600.0); 3]
    );
    assert_eq!(log.draw_count(), 3);
    assert_eq!(driver.frames_drawn(), 3);
}

#[test]
fn every_draw_covers_the_six_vertex_quad() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(ViewportSize::new(320, 240));
    let log = host.log().clone();
    let mut driver = driver(&clock);
    driver.mount(&mut host).expect("mount");
    host.advance(&mut driver);
    host.advance(&mut driver);

    let draws: Vec<GpuCall> = log
        .calls()
        .iter()
        .filter(|call| matches!(call, GpuCall::Draw { .. }))
        .cloned()
        .collect();
    assert_eq!(draws, vec![GpuCall::Draw { first: 0, count: 6 }; 2]);
}

#[test]
fn resize_mid_run_reaches_next_frame() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(ViewportSize::new(800, 600));
    let log = host.log().clone();
    let mut driver = driver(&clock);
    driver.mount(&mut host).expect("mount");
    host.advance(&mut driver);

    let notified = host.resize(&mut driver, ViewportSize::new(1024, 768));
    assert_eq!(notified, Some(ViewportSize::new(1024, 768)));
    assert_eq!(log.last_viewport(), Some((0, 0, 1024, 768)));

    clock.set_secs(0.016);
    host.advance(&mut driver);
    assert_eq!(
        log.uniform_writes("iResolution").last().copied(),
        Some(UniformValue::Vec2(1024.0, 768.0))
    );
    assert_eq!(log.last_viewport(), Some((0, 0, 1024, 768)));
    assert_eq!(log.last_drawable_size(), Some((1024, 768)));
}

#[test]
fn silent_resize_is_picked_up_by_the_frame_sync() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(ViewportSize::new(800, 600));
    let log = host.log().clone();
    let mut driver = driver(&clock);
    driver.mount(&mut host).expect("mount");

    host.set_client_size(ViewportSize::new(640, 360));
    host.advance(&mut driver);
    assert_eq!(
        log.uniform_writes("iResolution"),
        [UniformValue::Vec2(640.0, 360.0)]
    );
    assert_eq!(driver.viewport(), Some(ViewportSize::new(640, 360)));
}

#[test]
fn repeated_identical_sizes_reallocate_once() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(ViewportSize::new(800, 600));
    let log = host.log().clone();
    let mut driver = driver(&clock);
    driver.mount(&mut host).expect("mount");
    let after_mount = log.drawable_reallocations();

    for _ in 0..4 {
        host.resize(&mut driver, ViewportSize::new(1024, 768));
        host.advance(&mut driver);
    }
    assert_eq!(log.drawable_reallocations(), after_mount + 1);
}

#[test]
fn no_frames_after_dispose() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(ViewportSize::new(800, 600));
    let log = host.log().clone();
    let mut driver = driver(&clock);
    driver.mount(&mut host).expect("mount");
    host.advance(&mut driver);
    host.advance(&mut driver);
    let before = log.draw_count();

    driver.dispose(&mut host);
    assert_eq!(driver.state(), DriverState::Disposed);

    for step in 0..120 {
        clock.set_secs(step as f64 / 60.0);
        assert!(!host.advance(&mut driver));
    }
    assert_eq!(log.draw_count(), before);
    assert_eq!(host.resize(&mut driver, ViewportSize::new(10, 10)), None);
}

#[test]
fn invalid_fragment_reports_one_compile_error_and_never_runs() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::with_options(
        ViewportSize::new(800, 600),
        RecordingOptions {
            reject_stage: Some(ShaderStage::Fragment),
            ..RecordingOptions::default()
        },
    );
    let log = host.log().clone();
    let mut driver = driver(&clock);

    let err = driver.mount(&mut host).unwrap_err();
    assert!(matches!(
        err,
        SetupError::ShaderCompile {
            stage: ShaderStage::Fragment,
            ..
        }
    ));

    for _ in 0..10 {
        host.advance(&mut driver);
        driver.start(&mut host);
    }
    assert_eq!(driver.state(), DriverState::Failed);
    let failed_compiles = log
        .calls()
        .iter()
        .filter(|call| matches!(call, GpuCall::CompileShader { success: false, .. }))
        .count();
    assert_eq!(failed_compiles, 1);
    assert_eq!(log.link_count(), 0);
    assert_eq!(log.draw_count(), 0);
    assert_eq!(log.live_shaders(), 0);
}

#[test]
fn link_failure_is_terminal() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::with_options(
        ViewportSize::new(800, 600),
        RecordingOptions {
            fail_link: true,
            ..RecordingOptions::default()
        },
    );
    let log = host.log().clone();
    let mut driver = driver(&clock);

    let err = driver.mount(&mut host).unwrap_err();
    assert!(matches!(err, SetupError::ProgramLink { .. }));
    assert_eq!(driver.state(), DriverState::Failed);
    assert_eq!(log.live_programs(), 0);
    assert_eq!(log.live_shaders(), 0);
    assert!(!host.frame_pending());
}

#[test]
fn missing_context_fails_before_any_gpu_work() {
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(ViewportSize::new(800, 600));
    host.set_context_unavailable(true);
    let log = host.log().clone();
    let mut driver = driver(&clock);

    let err = driver.mount(&mut host).unwrap_err();
    assert!(matches!(err, SetupError::ContextUnavailable { .. }));
    assert!(log.calls().is_empty());
    assert!(driver.gpu().is_none());
}
