//! styleplayer CLI: inspect, export and play style files.
//!
//! Usage:
//!   sp-cli info path/to/file.sty
//!   sp-cli export path/to/file.sty --pattern "Main A" --out main_a.mid
//!   sp-cli play path/to/file.sty --pattern "Main A" --solo 10 --seconds 8
//!   sp-cli settings --write styleplayer.json

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sp_ir::{ChannelSlot, SUBDIVISIONS_PER_BAR, SUBDIVISIONS_PER_BEAT};
use sp_master::{ChannelPlayState, Controller, Settings, Style};

#[derive(Parser)]
#[command(name = "sp-cli", about = "Style file player and MIDI exporter")]
struct Cli {
    /// Settings file (JSON); defaults are used when absent
    #[arg(short, long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the patterns of a style or MIDI file
    Info { file: PathBuf },
    /// Write one pattern as a standard MIDI file
    Export {
        file: PathBuf,
        /// Pattern name (first pattern when omitted)
        #[arg(short, long)]
        pattern: Option<String>,
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Play a pattern
    Play {
        file: PathBuf,
        /// Pattern name (first pattern when omitted)
        #[arg(short, long)]
        pattern: Option<String>,
        /// Tempo in BPM, replacing the pattern's own
        #[arg(short, long)]
        tempo: Option<u32>,
        /// Stop at the end of the pattern instead of looping
        #[arg(long)]
        no_loop: bool,
        /// Solo a channel (1-16); repeatable
        #[arg(long)]
        solo: Vec<u8>,
        /// Mute a channel (1-16); repeatable
        #[arg(long)]
        mute: Vec<u8>,
        /// Output channel for the drum part (1-16)
        #[arg(long)]
        drum: Option<u8>,
        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<u64>,
        /// MIDI output port index (see `ports`)
        #[arg(long)]
        port: Option<usize>,
    },
    /// List MIDI output ports
    Ports,
    /// Print the effective settings, optionally writing them to a file
    Settings {
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => Settings::load_or_default(path),
        None => Settings::default(),
    };

    match cli.command {
        Commands::Info { file } => show_info(settings, &file),
        Commands::Export { file, pattern, out } => export(settings, &file, pattern, &out),
        Commands::Play {
            file,
            pattern,
            tempo,
            no_loop,
            solo,
            mute,
            drum,
            seconds,
            port,
        } => {
            let mut settings = Settings {
                autoplay: false,
                ..settings
            };
            if no_loop {
                settings.looping = false;
            }
            if let Some(channel) = drum {
                settings.drum_channel = channel;
            }
            if tempo.is_some() {
                settings.default_tempo = tempo;
            }
            let ctrl = open_controller(settings, port)?;
            play(ctrl, &file, pattern, &solo, &mute, seconds)
        }
        Commands::Ports => list_ports(),
        Commands::Settings { write } => {
            println!("{:#?}", settings);
            if let Some(path) = write {
                settings
                    .save(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                println!("Wrote {}", path.display());
            }
            Ok(())
        }
    }
}

fn load(settings: Settings, file: &Path) -> Result<Controller> {
    let mut ctrl = Controller::with_monitor(settings);
    ctrl.load_file(file)
        .with_context(|| format!("loading {}", file.display()))?;
    Ok(ctrl)
}

fn show_info(settings: Settings, file: &Path) -> Result<()> {
    let ctrl = load(settings, file)?;
    let Some(style) = ctrl.style() else {
        bail!("nothing loaded from {}", file.display());
    };

    println!("File:       {}", file.display());
    println!("Format:     {} ({} tracks)", style.format, style.track_count);
    println!("Resolution: {} ticks per beat", style.resolution());
    println!("Patterns:   {}", style.patterns.len());
    println!();
    for pattern in &style.patterns {
        print_pattern(style, pattern);
    }
    Ok(())
}

fn print_pattern(style: &Style, pattern: &sp_master::Pattern) {
    let name = if pattern.name.is_empty() {
        "(unnamed)"
    } else {
        pattern.name.as_str()
    };
    let events = style.event_count(&pattern.name).unwrap_or(0);
    let bars = style
        .streams(&pattern.name)
        .map(|s| s.length() / SUBDIVISIONS_PER_BAR)
        .unwrap_or(0);
    println!(
        "{:<16} {:>3} bpm  {:<5} {:<4} {:>3} bars {:>6} events",
        name,
        pattern.tempo,
        pattern.time_signature.as_deref().unwrap_or("-"),
        pattern.key_signature.as_deref().unwrap_or("-"),
        bars,
        events
    );
    for channel in pattern.used_channels() {
        let patch = match pattern.channels[channel as usize] {
            ChannelSlot::Patch(program) => format!("patch {}", program),
            _ => String::from("no patch"),
        };
        let drums = if channel == pattern.drum_slot { " (drums)" } else { "" };
        println!("    ch{:<2} {}{}", channel + 1, patch, drums);
    }
}

fn export(settings: Settings, file: &Path, pattern: Option<String>, out: &Path) -> Result<()> {
    let ctrl = load(settings, file)?;
    let name = pattern_or_first(&ctrl, pattern)?;
    ctrl.export_pattern(&name, out)
        .with_context(|| format!("exporting \"{}\"", name))?;
    println!("Exported \"{}\" to {}", name, out.display());
    Ok(())
}

fn play(
    mut ctrl: Controller,
    file: &Path,
    pattern: Option<String>,
    solo: &[u8],
    mute: &[u8],
    seconds: Option<u64>,
) -> Result<()> {
    ctrl.load_file(file)
        .with_context(|| format!("loading {}", file.display()))?;
    let name = pattern_or_first(&ctrl, pattern)?;
    ctrl.select_pattern(&name)?;
    for &channel in solo {
        ctrl.set_channel_state(channel, ChannelPlayState::Solo)?;
    }
    for &channel in mute {
        ctrl.set_channel_state(channel, ChannelPlayState::Mute)?;
    }

    ctrl.play()?;
    ctrl.sync()?;
    println!("Playing \"{}\"...", name);
    println!();

    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));
    while ctrl.is_playing() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        let pos = ctrl.snapped_position();
        print!(
            "\rBar {:>3} | Beat {} | {:>4}",
            pos / SUBDIVISIONS_PER_BAR + 1,
            pos % SUBDIVISIONS_PER_BAR / SUBDIVISIONS_PER_BEAT + 1,
            pos
        );
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(10));
    }

    ctrl.stop()?;
    ctrl.sync()?;
    println!("\rDone.                      ");
    Ok(())
}

/// The named pattern, or the first pattern of the loaded style.
fn pattern_or_first(ctrl: &Controller, pattern: Option<String>) -> Result<String> {
    if let Some(name) = pattern {
        return Ok(name);
    }
    ctrl.style()
        .and_then(|s| s.patterns.first())
        .map(|p| p.name.clone())
        .context("style has no patterns")
}

#[cfg(feature = "midir")]
fn open_controller(settings: Settings, port: Option<usize>) -> Result<Controller> {
    match port {
        Some(port) => Ok(Controller::with_midi_port(settings, port)?),
        None => Ok(Controller::with_monitor(settings)),
    }
}

#[cfg(not(feature = "midir"))]
fn open_controller(settings: Settings, port: Option<usize>) -> Result<Controller> {
    if port.is_some() {
        bail!("built without MIDI output; rebuild with `--features midir`");
    }
    Ok(Controller::with_monitor(settings))
}

#[cfg(feature = "midir")]
fn list_ports() -> Result<()> {
    let ports = sp_master::output_ports()?;
    if ports.is_empty() {
        println!("No MIDI output ports.");
    }
    for (idx, name) in ports.iter().enumerate() {
        println!("{:>2}: {}", idx, name);
    }
    Ok(())
}

#[cfg(not(feature = "midir"))]
fn list_ports() -> Result<()> {
    bail!("built without MIDI output; rebuild with `--features midir`")
}
