use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use lightning::gpu::translate_to_glsl450;
use lightning::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};
use lightning::{
    run_preview, AnimationDriver, HeadlessHost, ManualClock, PreviewConfig, RebuildPolicy,
    SetupError, SharedParams, UniformName, ViewportSize,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{ParamArgs, RunArgs, ShadersArgs, TraceArgs};
use crate::config::StormConfig;

/// Text to print for a failed command. Setup errors were already logged by the
/// driver when they happened, so they print nothing.
pub fn failure_message(err: &anyhow::Error) -> Option<String> {
    if err.downcast_ref::<SetupError>().is_some() {
        return None;
    }
    Some(format!("Error: {err:?}"))
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(params: &ParamArgs) -> Result<StormConfig> {
    let config = StormConfig::load_optional(params.config.as_deref())
        .context("failed to load storm configuration")?;
    if let Some(path) = &params.config {
        tracing::debug!(path = %path.display(), "loaded configuration");
    }
    Ok(config)
}

pub fn run(args: RunArgs) -> Result<()> {
    let config = load_config(&args.params)?;
    let policy = if args.in_place {
        RebuildPolicy::InPlace
    } else {
        config.window.rebuild
    };
    let preview = PreviewConfig {
        params: args.params.apply(config.params),
        width: args.width.unwrap_or(config.window.width),
        height: args.height.unwrap_or(config.window.height),
        title: args.title.unwrap_or(config.window.title),
        policy,
        max_frames: args.frames,
    };
    tracing::debug!(?preview, "starting preview");

    let summary = run_preview(preview).context("lightning preview failed")?;
    tracing::info!(
        frames = summary.frames,
        hue = summary.params.hue,
        intensity = summary.params.intensity,
        "preview closed"
    );
    Ok(())
}

/// One line of `storm trace` output.
#[derive(Debug, Serialize)]
struct FrameTrace {
    frame: u64,
    time: f64,
    viewport: Option<[u32; 2]>,
    resolution: Option<[f32; 2]>,
    uniforms: BTreeMap<&'static str, f32>,
    draws: usize,
}

pub fn trace(args: TraceArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_trace(&args, &mut out)
}

fn write_trace(args: &TraceArgs, out: &mut impl Write) -> Result<()> {
    let config = load_config(&args.params)?;
    let size = args
        .size
        .unwrap_or(ViewportSize::new(config.window.width, config.window.height));
    let params = SharedParams::new(args.params.apply(config.params));
    let clock = ManualClock::new();
    let mut host = HeadlessHost::new(size);
    let log = host.log().clone();
    let mut driver = AnimationDriver::new(params, clock.clone());
    driver.mount(&mut host)?;

    let interval = Duration::from_millis(args.interval_ms);
    for frame in 0..args.frames {
        for resize in args.resize_at.iter().filter(|resize| resize.frame == frame) {
            host.resize(&mut driver, resize.size);
        }
        let time = interval * u32::try_from(frame).context("frame index out of range")?;
        clock.set(time);

        log.clear();
        if !host.advance(&mut driver) {
            return Err(anyhow!("frame {frame} was not drawn"));
        }

        let mut uniforms = BTreeMap::new();
        let mut resolution = None;
        for name in UniformName::ALL {
            let Some(value) = log.uniform_writes(name.as_str()).last().copied() else {
                continue;
            };
            if let Some((x, y)) = value.as_vec2() {
                resolution = Some([x, y]);
            } else if let Some(value) = value.as_float() {
                uniforms.insert(name.as_str(), value);
            }
        }
        let record = FrameTrace {
            frame,
            time: time.as_secs_f64(),
            viewport: log
                .last_viewport()
                .map(|(_, _, width, height)| [width, height]),
            resolution,
            uniforms,
            draws: log.draw_count(),
        };
        serde_json::to_writer(&mut *out, &record).context("failed to serialise frame trace")?;
        writeln!(out).context("failed to write frame trace")?;
    }

    driver.dispose(&mut host);
    Ok(())
}

pub fn shaders(args: ShadersArgs) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for source in [VERTEX_SHADER, FRAGMENT_SHADER] {
        if args.stage.is_some_and(|stage| stage != source.stage) {
            continue;
        }
        let text = if args.translated {
            translate_to_glsl450(&source)
                .map_err(|log| anyhow!("failed to translate {} stage: {log}", source.stage))?
        } else {
            source.text.to_string()
        };
        writeln!(out, "// {} stage", source.stage)?;
        writeln!(out, "{}", text.trim_matches('\n'))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ResizeAt;

    fn trace_args(frames: u64, resize_at: Vec<ResizeAt>) -> TraceArgs {
        TraceArgs {
            params: ParamArgs::default(),
            frames,
            interval_ms: 16,
            size: Some(ViewportSize::new(800, 600)),
            resize_at,
        }
    }

    fn lines(args: &TraceArgs) -> Vec<serde_json::Value> {
        let mut buffer = Vec::new();
        write_trace(args, &mut buffer).unwrap();
        String::from_utf8(buffer)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn setup_errors_are_not_reported_twice() {
        let setup = anyhow::Error::from(SetupError::ProgramLink {
            log: "ERROR: link failed".to_string(),
        });
        assert_eq!(failure_message(&setup), None);
        let wrapped = Err::<(), _>(setup)
            .context("lightning preview failed")
            .unwrap_err();
        assert_eq!(failure_message(&wrapped), None);

        let other = anyhow!("frame 3 was not drawn");
        let message = failure_message(&other).unwrap();
        assert!(message.contains("frame 3 was not drawn"), "{message}");
    }

    #[test]
    fn trace_reports_one_line_per_frame() {
        let records = lines(&trace_args(3, Vec::new()));
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["frame"], 2);
        assert_eq!(records[0]["draws"], 1);
        assert_eq!(records[0]["viewport"], serde_json::json!([800, 600]));
        assert_eq!(records[0]["uniforms"]["uHue"], 230.0);
        let time = records[1]["uniforms"]["iTime"].as_f64().unwrap();
        assert!((time - 0.016).abs() < 1e-6, "{time}");
    }

    #[test]
    fn trace_applies_resizes_before_the_frame() {
        let records = lines(&trace_args(
            2,
            vec![ResizeAt {
                frame: 1,
                size: ViewportSize::new(1024, 768),
            }],
        ));
        assert_eq!(records[0]["resolution"], serde_json::json!([800.0, 600.0]));
        assert_eq!(records[1]["resolution"], serde_json::json!([1024.0, 768.0]));
        assert_eq!(records[1]["viewport"], serde_json::json!([1024, 768]));
    }
}
