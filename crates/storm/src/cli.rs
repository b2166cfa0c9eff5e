use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lightning::{LightningParams, ShaderStage, ViewportSize};

#[derive(Parser, Debug)]
#[command(
    name = "storm",
    author,
    version,
    about = "Lightning shader backdrop preview",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the effect headless and print one JSON object per frame.
    Trace(TraceArgs),
    /// Print the fixed shader sources.
    Shaders(ShadersArgs),
}

/// Parameter overrides shared by every command that renders.
#[derive(Args, Debug, Clone, Default)]
pub struct ParamArgs {
    /// TOML file with `[params]` and `[window]` tables.
    #[arg(long, env = "STORM_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Hue of the glow, in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub hue: Option<f32>,

    /// Horizontal offset of the bolt, in normalised units.
    #[arg(long, allow_hyphen_values = true)]
    pub x_offset: Option<f32>,

    /// Animation speed multiplier.
    #[arg(long, allow_hyphen_values = true)]
    pub speed: Option<f32>,

    /// Brightness multiplier.
    #[arg(long, allow_hyphen_values = true)]
    pub intensity: Option<f32>,

    /// Noise scale.
    #[arg(long, allow_hyphen_values = true)]
    pub size: Option<f32>,
}

impl ParamArgs {
    /// Layers the flags given on the command line over `base`.
    pub fn apply(&self, base: LightningParams) -> LightningParams {
        LightningParams {
            hue: self.hue.unwrap_or(base.hue),
            x_offset: self.x_offset.unwrap_or(base.x_offset),
            speed: self.speed.unwrap_or(base.speed),
            intensity: self.intensity.unwrap_or(base.intensity),
            size: self.size.unwrap_or(base.size),
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    /// Initial window width in pixels.
    #[arg(long)]
    pub width: Option<u32>,

    /// Initial window height in pixels.
    #[arg(long)]
    pub height: Option<u32>,

    /// Window title.
    #[arg(long)]
    pub title: Option<String>,

    /// Close the window after this many frames.
    #[arg(long, value_name = "N")]
    pub frames: Option<u64>,

    /// Keep the GPU program across parameter changes instead of rebuilding it.
    #[arg(long)]
    pub in_place: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TraceArgs {
    #[command(flatten)]
    pub params: ParamArgs,

    /// Number of frames to draw.
    #[arg(long, value_name = "N", default_value_t = 3)]
    pub frames: u64,

    /// Simulated time between frames.
    #[arg(long, value_name = "MS", default_value_t = 16)]
    pub interval_ms: u64,

    /// Surface size before the first frame (defaults to the configured window size).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<ViewportSize>,

    /// Resize the surface right before the given frame (repeatable).
    #[arg(long = "resize-at", value_name = "FRAME:WIDTHxHEIGHT", value_parser = parse_resize_at)]
    pub resize_at: Vec<ResizeAt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeAt {
    pub frame: u64,
    pub size: ViewportSize,
}

#[derive(Args, Debug, Clone)]
pub struct ShadersArgs {
    /// Only print this stage (`vertex` or `fragment`).
    #[arg(long, value_parser = parse_stage)]
    pub stage: Option<ShaderStage>,

    /// Print the GLSL 450 translation the wgpu backend compiles.
    #[arg(long)]
    pub translated: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_stage(value: &str) -> Result<ShaderStage, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "vertex" | "vert" => Ok(ShaderStage::Vertex),
        "fragment" | "frag" => Ok(ShaderStage::Fragment),
        other => Err(format!(
            "unknown shader stage '{other}'; expected vertex or fragment"
        )),
    }
}

pub fn parse_size(value: &str) -> Result<ViewportSize, String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid width '{}'", w.trim()))?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid height '{}'", h.trim()))?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".into());
    }
    Ok(ViewportSize::new(width, height))
}

pub fn parse_resize_at(value: &str) -> Result<ResizeAt, String> {
    let (frame, size) = value
        .split_once(':')
        .ok_or_else(|| "expected FRAME:WIDTHxHEIGHT".to_string())?;
    let frame = frame
        .trim()
        .parse::<u64>()
        .map_err(|_| format!("invalid frame index '{}'", frame.trim()))?;
    Ok(ResizeAt {
        frame,
        size: parse_size(size)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes_and_resize_events() {
        assert_eq!(parse_size("1024x768").unwrap(), ViewportSize::new(1024, 768));
        assert_eq!(parse_size(" 8 X 6 ").unwrap(), ViewportSize::new(8, 6));
        assert!(parse_size("0x10").is_err());
        assert!(parse_size("wide").is_err());

        assert_eq!(
            parse_resize_at("2:1024x768").unwrap(),
            ResizeAt {
                frame: 2,
                size: ViewportSize::new(1024, 768),
            }
        );
        assert!(parse_resize_at("1024x768").is_err());
        assert!(parse_resize_at("x:1x1").is_err());
    }

    #[test]
    fn parses_stage_names() {
        assert_eq!(parse_stage("Fragment").unwrap(), ShaderStage::Fragment);
        assert_eq!(parse_stage("vert").unwrap(), ShaderStage::Vertex);
        assert!(parse_stage("compute").is_err());
    }

    #[test]
    fn flags_override_base_params() {
        let cli = Cli::try_parse_from(["storm", "--hue", "12", "--x-offset", "-0.25"]).unwrap();
        let params = cli.run.params.apply(LightningParams::default());
        assert_eq!(params.hue, 12.0);
        assert_eq!(params.x_offset, -0.25);
        assert_eq!(params.speed, 1.0);
    }

    #[test]
    fn trace_subcommand_collects_resizes() {
        let cli = Cli::try_parse_from([
            "storm",
            "trace",
            "--frames",
            "4",
            "--resize-at",
            "1:10x10",
            "--resize-at",
            "3:20x20",
        ])
        .unwrap();
        let Some(Command::Trace(args)) = cli.command else {
            panic!("expected trace command");
        };
        assert_eq!(args.frames, 4);
        assert_eq!(args.interval_ms, 16);
        assert_eq!(args.resize_at.len(), 2);
    }
}
