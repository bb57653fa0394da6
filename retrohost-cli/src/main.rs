//! retrohost-cli: drive a libretro core without a frontend.
//!
//! Useful for smoke-testing cores and content: it loads both, runs a number of frames, unloads
//! and reports what the core produced.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use retrohost_core::{Adapter, AdapterConfig, AdapterState, Event, LoadError, StateChange};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;

/// Headless libretro runner
#[derive(Parser, Debug)]
#[command(name = "retrohost-cli")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity (-v info, -vv debug, -vvv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a core and content, run frames, then unload
    Run {
        /// Path to the core (shared library)
        core: PathBuf,

        /// Path to the content file
        content: PathBuf,

        /// Number of frames to run
        #[arg(short, long, default_value = "60")]
        frames: u64,

        /// Set a core option before loading content
        #[arg(short = 'o', long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
        options: Vec<(String, String)>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Load a core and print what it reports about itself
    Info {
        /// Path to the core (shared library)
        core: PathBuf,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Adapter configuration file (JSON)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory handed to the core for BIOS and system files
    #[arg(long, value_name = "DIR")]
    system_dir: Option<PathBuf>,

    /// Directory for save files
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,
}

impl ConfigArgs {
    fn load(&self) -> Result<AdapterConfig> {
        let mut config = match &self.config {
            Some(path) => AdapterConfig::from_json_file(path)?,
            None => AdapterConfig::default(),
        };
        if let Some(dir) = &self.system_dir {
            config.system_directory = dir.clone();
        }
        if let Some(dir) = &self.save_dir {
            config.save_directory = dir.clone();
        }
        Ok(config)
    }
}

/// Parse "KEY=VALUE"
fn parse_option(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got: {s}")),
    }
}

/// Tally of what came over the event channel.
#[derive(Debug, Default)]
struct Summary {
    frames_rendered: u64,
    video_frames: u64,
    audio_buffers: u64,
    audio_samples: u64,
    error: Option<LoadError>,
}

impl Summary {
    fn absorb(&mut self, events: &Receiver<Event>) {
        for event in events.try_iter() {
            match event {
                Event::FrameRendered => self.frames_rendered += 1,
                Event::VideoDataReady(_) => self.video_frames += 1,
                Event::AudioDataReady(buffer) => {
                    self.audio_buffers += 1;
                    self.audio_samples += buffer.samples.len() as u64;
                }
                Event::StateChanged(StateChange::Error(e)) => self.error = Some(e),
                Event::StateChanged(change) => info!("state -> {:?}", change.state()),
            }
        }
    }

    fn check(&mut self, what: &Path) -> Result<()> {
        match self.error.take() {
            Some(e) => bail!("{}: {e}", what.display()),
            None => Ok(()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Command::Run {
            core,
            content,
            frames,
            options,
            config,
        } => run(&core, &content, frames, &options, config.load()?),
        Command::Info { core, config } => print_info(&core, config.load()?),
    }
}

fn run(
    core: &Path,
    content: &Path,
    frames: u64,
    options: &[(String, String)],
    config: AdapterConfig,
) -> Result<()> {
    let (mut adapter, events) = Adapter::new(config);
    let mut summary = Summary::default();

    adapter.load_core(core)?;
    summary.absorb(&events);
    summary.check(core)?;

    for (key, value) in options {
        adapter
            .set_variable(key, value)
            .with_context(|| format!("cannot set option {key}"))?;
    }

    adapter.load_content(content)?;
    summary.absorb(&events);
    summary.check(content)?;

    if let Some(av) = adapter.av_info() {
        println!(
            "Loaded {}: {}x{} @ {:.3} fps, {} Hz, {:?}",
            content.display(),
            av.geometry.base_width,
            av.geometry.base_height,
            av.timing.fps,
            av.timing.sample_rate,
            av.pixel_format
        );
    }

    let mut ran = 0;
    while ran < frames && adapter.state() == AdapterState::Ready {
        adapter.run_frame()?;
        summary.absorb(&events);
        ran += 1;
    }
    if ran < frames {
        warn!("core stopped after {ran} of {frames} frames");
    }

    let dropped = adapter.dropped_frames();
    adapter.unload()?;
    summary.absorb(&events);
    summary.check(content)?;

    println!("Frames rendered: {}", summary.frames_rendered);
    println!("Video frames:    {}", summary.video_frames);
    println!(
        "Audio buffers:   {} ({} samples)",
        summary.audio_buffers, summary.audio_samples
    );
    if dropped.audio > 0 || dropped.video > 0 {
        println!(
            "Dropped:         {} video, {} audio",
            dropped.video, dropped.audio
        );
    }
    Ok(())
}

fn print_info(core: &Path, config: AdapterConfig) -> Result<()> {
    let (mut adapter, events) = Adapter::new(config);
    let mut summary = Summary::default();

    adapter.load_core(core)?;
    summary.absorb(&events);
    summary.check(core)?;

    let info = adapter
        .core_info()
        .context("core reported no system info")?;
    println!("{} {}", info.library_name, info.library_version);
    println!("  Extensions:    {}", info.valid_extensions.join(", "));
    println!("  Needs path:    {}", info.need_fullpath);
    println!("  Block extract: {}", info.block_extract);

    let variables = adapter.variables();
    if !variables.is_empty() {
        println!("\nOptions:");
        for var in &variables {
            println!(
                "  {} = {} ({})",
                var.key(),
                var.effective_value(),
                var.choices().join("|")
            );
        }
    }

    adapter.unload()?;
    Ok(())
}
