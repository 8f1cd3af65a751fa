use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::profiling;
use crate::raster::PixelSurface;
use crate::scene::{mount, SceneKind};
use crate::scheduler::ManualFrameHost;
use crate::surface::{DrawCommand, DrawSurface, RecordingSurface, Rgba};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log per-tick timings
    #[arg(long, global = true)]
    profile: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render frames to PNG files
    Render {
        /// Scene to render (wave, network, skills)
        #[arg(long)]
        scene: SceneKind,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Number of frames
        #[arg(long, default_value_t = 120)]
        frames: usize,

        /// Output width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Output height
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Seed for texture lines and signal spawning
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Print each frame's draw calls as a JSON line
    Trace {
        #[arg(long)]
        scene: SceneKind,

        #[arg(long, default_value_t = 1)]
        frames: usize,

        #[arg(long, default_value_t = 800)]
        width: u32,

        #[arg(long, default_value_t = 600)]
        height: u32,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Run a scene through the frame loop at a fixed refresh rate
    Preview {
        #[arg(long)]
        scene: SceneKind,

        /// Simulated display refresh rate
        #[arg(long, default_value_t = 60.0)]
        fps: f32,

        #[arg(long, default_value_t = 300)]
        frames: usize,

        #[arg(long, default_value_t = 800)]
        width: u32,

        #[arg(long, default_value_t = 600)]
        height: u32,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

#[derive(Serialize)]
struct FrameTrace<'a> {
    scene: &'a str,
    frame: usize,
    commands: &'a [DrawCommand],
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.profile {
        profiling::set_profiling_enabled(true);
    }

    match cli.command {
        Commands::Render { scene, out, frames, width, height, seed } => {
            render_offline(scene, out, frames, width, height, seed)?;
        }
        Commands::Trace { scene, frames, width, height, seed } => {
            trace(scene, frames, width, height, seed)?;
        }
        Commands::Preview { scene, fps, frames, width, height, seed } => {
            preview(scene, fps, frames, width, height, seed)?;
        }
    }
    Ok(())
}

fn render_offline(kind: SceneKind, out_dir: PathBuf, frames: usize, width: u32, height: u32, seed: u64) -> Result<()> {
    ensure!(width > 0 && height > 0, "Output size must be non-zero, got {}x{}", width, height);
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let mut scene = kind.create(seed);
    let mut surface = PixelSurface::new(width, height);

    println!("Rendering {} frames of {} to {:?}...", frames, kind, out_dir);

    for i in 0..frames {
        profiling::timed(scene.name(), || scene.tick(&mut surface));
        surface.save_png(&out_dir.join(format!("frame_{:05}.png", i)), Rgba::BLACK)?;

        if i % 60 == 0 {
            print!(".");
            std::io::stdout().flush()?;
        }
    }
    println!("\nDone.");

    if surface.text_skipped() > 0 {
        log::warn!("{} text draws were skipped; labels are only drawn in the browser", surface.text_skipped());
    }
    Ok(())
}

fn trace(kind: SceneKind, frames: usize, width: u32, height: u32, seed: u64) -> Result<()> {
    let mut scene = kind.create(seed);
    let mut surface = RecordingSurface::new(width, height);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for frame in 0..frames {
        scene.tick(&mut surface);
        let line = serde_json::to_string(&FrameTrace {
            scene: kind.as_str(),
            frame,
            commands: &surface.commands,
        })?;
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

/// Wall-clock time between simulated refreshes.
fn frame_interval(fps: f32) -> Result<Duration> {
    ensure!(fps > 0.0, "fps must be positive, got {}", fps);
    Duration::try_from_secs_f32(1.0 / fps).with_context(|| format!("fps {} gives no usable frame interval", fps))
}

fn preview(kind: SceneKind, fps: f32, frames: usize, width: u32, height: u32, seed: u64) -> Result<()> {
    let host = ManualFrameHost::new();
    let Some(mut mounted) = mount(Some(PixelSurface::new(width, height)), kind.create(seed), host.clone()) else {
        anyhow::bail!("Failed to mount {}", kind);
    };

    let frame_time = frame_interval(fps)?;
    for _ in 0..frames {
        std::thread::sleep(frame_time);
        if host.fire() == 0 {
            log::warn!("Frame loop stopped early");
            break;
        }
    }

    let lit = {
        let surface = mounted.surface();
        surface.as_rgba().chunks_exact(4).filter(|px| px[3] > 0).count()
    };
    let viewport = mounted.surface().viewport();
    println!(
        "{}: {} ticks at {}x{}, {} lit pixels in the last frame",
        kind,
        mounted.scheduler().ticks(),
        viewport.width,
        viewport.height,
        lit
    );
    mounted.unmount();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_interval() {
        assert_eq!(frame_interval(4.0).unwrap(), Duration::from_millis(250));
        assert!(frame_interval(0.0).is_err());
        assert!(frame_interval(-60.0).is_err());
        assert!(frame_interval(f32::NAN).is_err());
        assert!(frame_interval(f32::MIN_POSITIVE / 4.0).is_err());
    }

    #[test]
    fn test_cli_parses_preview() {
        let cli = Cli::try_parse_from(["folio-scenes", "preview", "--scene", "network", "--fps", "30"]).unwrap();
        assert!(matches!(cli.command, Commands::Preview { scene: SceneKind::Network, .. }));
    }
}
