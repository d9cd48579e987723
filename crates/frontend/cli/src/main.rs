use anyhow::{anyhow, Context, Result};
use clap::Parser;
use dotmatrix_core::logging::{LogCategory, LogConfig, LogLevel};
use dotmatrix_core::System;
use dotmatrix_gb::cartridge::CartridgeHeader;
use dotmatrix_gb::{battery, Button, GbSystem};
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;

mod config;
mod input;
mod pacer;
mod screenshot;
mod worker;

use config::Settings;
use input::InputScript;
use worker::{Command, Controls, WorkerConfig};

#[derive(Parser, Debug)]
#[command(name = "dotmatrix", about = "Headless Game Boy / Game Boy Color emulator")]
struct Args {
    /// Cartridge image (.gb / .gbc)
    rom: PathBuf,

    /// Boot ROM to run before the cartridge (overrides the config file)
    #[arg(long)]
    boot_rom: Option<PathBuf>,

    /// Number of frames to run; 0 runs until stopped
    #[arg(long, default_value_t = 60)]
    frames: u64,

    /// Speed multiplier; 0 runs unthrottled (overrides the config file)
    #[arg(long)]
    speed: Option<f64>,

    /// Write the last frame to this PNG file
    #[arg(long)]
    screenshot: Option<PathBuf>,

    /// Dump a save state to this file as JSON on exit
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Load a save state from this file before running
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Scripted input, BUTTON@FRAME[+HOLD] (repeatable)
    #[arg(long = "press", value_name = "BUTTON@FRAME")]
    presses: Vec<String>,

    /// Do not read or write battery saves
    #[arg(long, default_value_t = false)]
    no_battery: bool,

    /// Print bytes sent over the serial port on exit
    #[arg(long, default_value_t = false)]
    serial: bool,

    /// Read commands from stdin: p (pause), q (quit), +BUTTON, -BUTTON
    #[arg(long, default_value_t = false)]
    interactive: bool,

    /// Global emulator log level (off, error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    /// Per-category log level, CATEGORY=LEVEL (repeatable)
    #[arg(long = "log", value_name = "CATEGORY=LEVEL")]
    log_categories: Vec<String>,

    /// Write emulator log messages to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Maximum messages per category per second
    #[arg(long)]
    log_rate: Option<usize>,

    /// Settings file (default: dotmatrix.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_level(s: &str) -> Result<LogLevel> {
    LogLevel::from_str(s).ok_or_else(|| anyhow!("unknown log level \"{s}\""))
}

fn parse_category_level(category: &str, level: &str) -> Result<(LogCategory, LogLevel)> {
    let category = LogCategory::from_str(category)
        .ok_or_else(|| anyhow!("unknown log category \"{category}\""))?;
    Ok((category, parse_level(level)?))
}

fn init_logging(args: &Args, settings: &Settings) -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = LogConfig::global();
    let level = args.log_level.as_deref().unwrap_or(&settings.log_level);
    config.set_global_level(parse_level(level)?);

    for (category, level) in &settings.log_levels {
        let (category, level) = parse_category_level(category, level)?;
        config.set_level(category, level);
    }
    for spec in &args.log_categories {
        let (category, level) = spec
            .split_once('=')
            .ok_or_else(|| anyhow!("expected CATEGORY=LEVEL, got \"{spec}\""))?;
        let (category, level) = parse_category_level(category, level)?;
        config.set_level(category, level);
    }

    if let Some(rate) = args.log_rate {
        config.set_rate_limit(rate);
    }
    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }
    Ok(())
}

fn load_battery(sys: &mut GbSystem, rom_path: &Path) -> Result<()> {
    if let Some(ram) = battery::load_ram(&battery::save_path(rom_path))? {
        sys.load_cartridge_ram(&ram);
    }
    if let Some(record) = battery::load_rtc(&battery::rtc_path(rom_path))? {
        sys.load_rtc_record(&record);
    }
    Ok(())
}

fn store_battery(sys: &mut GbSystem, rom_path: &Path) -> Result<()> {
    if let Some(ram) = sys.cartridge_ram() {
        battery::store_ram(&battery::save_path(rom_path), ram)?;
    }
    if let Some(record) = sys.rtc_record() {
        battery::store_rtc(&battery::rtc_path(rom_path), &record)?;
    }
    Ok(())
}

/// Parse one interactive command line.
fn parse_command(line: &str) -> Option<Result<Command, &'static str>> {
    let line = line.trim();
    let (pressed, name) = match line.as_bytes().first() {
        Some(b'+') => (true, &line[1..]),
        Some(b'-') => (false, &line[1..]),
        _ => return None,
    };
    Some(match Button::from_str(name) {
        Some(b) if pressed => Ok(Command::Press(b)),
        Some(b) => Ok(Command::Release(b)),
        None => Err("unknown button"),
    })
}

fn spawn_stdin_reader(controls: Controls, commands: Sender<Command>) -> Result<()> {
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                match line.trim() {
                    "p" | "pause" => {
                        let paused = controls.toggle_pause();
                        log::info!("{}", if paused { "paused" } else { "resumed" });
                    }
                    "q" | "quit" => {
                        controls.stop();
                        break;
                    }
                    other => match parse_command(other) {
                        Some(Ok(cmd)) => {
                            if commands.send(cmd).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => log::warn!("{e}: {other}"),
                        None => log::warn!("unknown command: {other}"),
                    },
                }
            }
        })?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    init_logging(&args, &settings)?;

    let rom = fs::read(&args.rom).with_context(|| format!("cannot read {}", args.rom.display()))?;
    let header = CartridgeHeader::parse(&rom)?;

    let mut sys = GbSystem::new();
    let boot_rom = args
        .boot_rom
        .as_deref()
        .or_else(|| settings.boot_rom(header.supports_cgb()));
    if let Some(path) = boot_rom {
        let data = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
        sys.mount("BootROM", &data)
            .with_context(|| format!("cannot use boot ROM {}", path.display()))?;
    }
    sys.mount("Cartridge", &rom)
        .with_context(|| format!("cannot load {}", args.rom.display()))?;
    log::info!(
        "{} ({}, {})",
        header.title,
        header.type_name(),
        if sys.is_cgb() { "CGB" } else { "DMG" }
    );

    let use_battery = settings.battery_saves && !args.no_battery && sys.has_battery();
    if use_battery {
        load_battery(&mut sys, &args.rom)?;
    }

    if let Some(path) = &args.load_state {
        let text =
            fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
        sys.load_state(&serde_json::from_str(&text)?)?;
    }

    let controls = Controls::default();
    let (frame_tx, frame_rx) = mpsc::channel();
    sys.set_frame_sink(worker::channel_sink(frame_tx, controls.clone()));

    let script = InputScript::parse(&args.presses)?;
    if !script.is_empty() {
        log::info!("{} scripted presses", args.presses.len());
    }

    let (cmd_tx, cmd_rx) = mpsc::channel();
    let worker = worker::spawn(
        sys,
        controls.clone(),
        WorkerConfig {
            speed: args.speed.unwrap_or(settings.speed),
            script,
        },
        cmd_rx,
    )?;
    if args.interactive {
        spawn_stdin_reader(controls.clone(), cmd_tx)?;
    }

    let mut frames = 0u64;
    let mut last = None;
    for frame in frame_rx.iter() {
        frames += 1;
        last = Some(frame);
        if args.frames != 0 && frames >= args.frames {
            controls.stop();
            break;
        }
    }
    drop(frame_rx);

    let mut sys = worker
        .join()
        .map_err(|_| anyhow!("emulation thread panicked"))??;
    log::info!("ran {frames} frames");

    if let (Some(path), Some(frame)) = (&args.screenshot, &last) {
        screenshot::save_png(path, frame)?;
        log::info!("wrote {}", path.display());
    }
    if use_battery {
        store_battery(&mut sys, &args.rom)?;
    }
    if let Some(path) = &args.save_state {
        fs::write(path, serde_json::to_string_pretty(&sys.save_state())?)
            .with_context(|| format!("cannot write {}", path.display()))?;
    }
    if args.serial {
        let mut stdout = std::io::stdout();
        stdout.write_all(&sys.take_serial_output())?;
        stdout.flush()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "dotmatrix",
            "game.gb",
            "--frames",
            "10",
            "--press",
            "a@1",
            "--press",
            "start@5+2",
            "--log",
            "cpu=debug",
            "--speed",
            "0",
        ])
        .unwrap();
        assert_eq!(args.rom, PathBuf::from("game.gb"));
        assert_eq!(args.frames, 10);
        assert_eq!(args.presses.len(), 2);
        assert_eq!(args.log_categories, vec!["cpu=debug".to_string()]);
        assert_eq!(args.speed, Some(0.0));
        assert!(!args.no_battery);
    }

    #[test]
    fn test_rom_is_required() {
        assert!(Args::try_parse_from(["dotmatrix"]).is_err());
    }

    #[test]
    fn test_parse_category_level() {
        let (cat, level) = parse_category_level("mbc", "trace").unwrap();
        assert_eq!(cat, LogCategory::Cartridge);
        assert_eq!(level, LogLevel::Trace);
        assert!(parse_category_level("apu", "info").is_err());
        assert!(parse_category_level("cpu", "loud").is_err());
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("+a"), Some(Ok(Command::Press(Button::A))));
        assert_eq!(
            parse_command("-select"),
            Some(Ok(Command::Release(Button::Select)))
        );
        assert!(matches!(parse_command("+turbo"), Some(Err(_))));
        assert_eq!(parse_command("hello"), None);
    }
}
