//! rgaconvert CLI
//!
//! Command-line interface for inspecting and exercising the converter.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rgaconvert::{
    caps::{pad_template_caps, PadDirection},
    format::{to_rga_format, SUPPORTED_FORMATS},
    Caps, ConvertConfig, CoreMask, Direction, FrameDescriptor, HeapBuffer, Resolution,
    RgaVideoConvert, SoftwareDriver, VideoFormat, VideoInfo,
};
use std::path::PathBuf;

/// Negotiation direction for CLI
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CapsDirection {
    /// Given input caps, show what the output may carry
    Downstream,
    /// Given output caps, show what the input may accept
    Upstream,
}

impl From<CapsDirection> for Direction {
    fn from(d: CapsDirection) -> Self {
        match d {
            CapsDirection::Downstream => Direction::Downstream,
            CapsDirection::Upstream => Direction::Upstream,
        }
    }
}

#[derive(Parser)]
#[command(name = "rgaconvert")]
#[command(about = "Rockchip RGA video convert/scale")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show formats, core masks and pad templates
    Info,

    /// Transform caps across the converter
    Caps {
        /// Side the result describes
        #[arg(short, long, value_enum)]
        direction: CapsDirection,

        /// Caps on the opposite side (e.g. "video/x-raw, format=NV12, width=1920, height=1080")
        caps: Caps,

        /// Caps to intersect the result with
        #[arg(short, long)]
        filter: Option<Caps>,
    },

    /// Convert raw frames from one file into another
    Convert {
        /// Input file of raw frames
        #[arg(short, long)]
        input: PathBuf,

        /// Input pixel format (e.g. NV12)
        #[arg(long)]
        in_format: VideoFormat,

        /// Input size (e.g. 1920x1080)
        #[arg(long)]
        in_size: Resolution,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Output pixel format (e.g. BGR)
        #[arg(long)]
        out_format: VideoFormat,

        /// Output size (e.g. 640x480)
        #[arg(long)]
        out_size: Resolution,

        /// Core mask (auto, rga3, rga3_core0+rga2_core0, 0x3, ...)
        #[arg(short, long)]
        core_mask: Option<CoreMask>,

        /// TOML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("rgaconvert=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info => cmd_info(),
        Commands::Caps {
            direction,
            caps,
            filter,
        } => cmd_caps(direction.into(), caps, filter),
        Commands::Convert {
            input,
            in_format,
            in_size,
            output,
            out_format,
            out_size,
            core_mask,
            config,
        } => {
            let mut cfg = match config {
                Some(path) => ConvertConfig::load(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => ConvertConfig::default(),
            };
            if let Some(mask) = core_mask {
                cfg = cfg.with_core_mask(mask);
            }
            let in_info = VideoInfo::new(in_format, in_size.width, in_size.height)?;
            let out_info = VideoInfo::new(out_format, out_size.width, out_size.height)?;
            cmd_convert(input, in_info, output, out_info, cfg)
        }
    }
}

fn cmd_info() -> anyhow::Result<()> {
    println!("rgaconvert {}", rgaconvert::VERSION);
    println!("==================\n");

    println!("=== Formats ===");
    for format in SUPPORTED_FORMATS {
        let rga = to_rga_format(format);
        println!(
            "  {:<12} -> {:<28} pixel size {}",
            format.name(),
            rga.name(),
            rga.pixel_size().unwrap_or(0)
        );
    }

    println!("\n=== Core masks ===");
    for (name, mask) in CoreMask::names() {
        println!("  {:<12} {:#x}", name, mask.bits());
    }

    println!("\n=== Pad templates ===");
    println!("  sink: {}", pad_template_caps(PadDirection::Sink));
    println!("  src:  {}", pad_template_caps(PadDirection::Src));

    Ok(())
}

fn cmd_caps(direction: Direction, caps: Caps, filter: Option<Caps>) -> anyhow::Result<()> {
    let convert = RgaVideoConvert::new(SoftwareDriver::new(), ConvertConfig::default());
    let result = convert.transform_caps(direction, &caps, filter.as_ref());
    println!("{}", result);
    Ok(())
}

fn cmd_convert(
    input: PathBuf,
    in_info: VideoInfo,
    output: PathBuf,
    out_info: VideoInfo,
    config: ConvertConfig,
) -> anyhow::Result<()> {
    let data = std::fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
    let frames = data.len() / in_info.size;
    if frames == 0 {
        anyhow::bail!(
            "{} holds {} bytes, one {} {} frame needs {}",
            input.display(),
            data.len(),
            in_info.resolution(),
            in_info.format,
            in_info.size
        );
    }

    let mut convert = RgaVideoConvert::new(SoftwareDriver::new(), config);
    convert.start()?;
    convert.set_info(&in_info, &out_info)?;

    println!("Configuration:");
    println!("  Input: {} {}", in_info.format, in_info.resolution());
    println!("  Output: {} {}", out_info.format, out_info.resolution());
    println!("  Core mask: {}", convert.core_mask());
    println!("  Frames: {}", frames);
    println!();

    let start = std::time::Instant::now();
    let mut out = Vec::with_capacity(frames * out_info.size);
    for chunk in data.chunks_exact(in_info.size) {
        if convert.is_passthrough() {
            out.extend_from_slice(chunk);
            continue;
        }
        let src = HeapBuffer::from_vec(chunk.to_vec());
        let dst = HeapBuffer::new(out_info.size);
        convert.transform_frame(
            &FrameDescriptor::new(&in_info, &src),
            &FrameDescriptor::new(&out_info, &dst),
        )?;
        out.extend_from_slice(dst.bytes());
    }
    let elapsed = start.elapsed();
    convert.stop();

    std::fs::write(&output, &out).with_context(|| format!("writing {}", output.display()))?;

    let stats = convert.stats();
    println!("Results:");
    println!("  Total time: {:.2}s", elapsed.as_secs_f64());
    println!("  Frames converted: {}", stats.frames);
    println!("  Mapped surfaces: {}", stats.mapped_surfaces);
    println!("  Bytes written: {}", out.len());
    if convert.is_passthrough() {
        println!("  Passthrough: identical input and output");
    }

    Ok(())
}
