//! Centralized logging configuration for the emulator.
//!
//! Emulation code logs through [`log`], which is gated by a global
//! [`LogConfig`] holding one level per [`LogCategory`]. Messages are built
//! lazily so a disabled category costs a single atomic load.
//!
//! # Architecture
//!
//! - **LogConfig**: Thread-safe global configuration using atomic operations
//! - **LogLevel**: Hierarchical log levels (Off < Error < Warn < Info < Debug < Trace)
//! - **LogCategory**: CPU, Bus, PPU, Timer, Interrupts, Cartridge
//! - **log()**: Common entry point, rate limited per category
//!
//! # Output
//!
//! By default messages are forwarded to the `log` crate facade with the
//! target `dotmatrix::<category>`, so whichever logger the frontend installs
//! (the CLI uses `env_logger`) decides formatting. When a log file is set,
//! messages go to a background writer thread instead and the emulation
//! thread never blocks on file I/O.
//!
//! # Usage
//!
//! ```rust
//! use dotmatrix_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::CPU, LogLevel::Warn, || {
//!     format!("illegal opcode {:02X} at PC={:04X}", 0xD3, 0x1234)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

const CATEGORY_COUNT: usize = 6;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }

    /// The matching `log` crate level, `None` for `Off`.
    pub fn to_log_level(self) -> Option<log::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(log::Level::Error),
            LogLevel::Warn => Some(log::Level::Warn),
            LogLevel::Info => Some(log::Level::Info),
            LogLevel::Debug => Some(log::Level::Debug),
            LogLevel::Trace => Some(log::Level::Trace),
        }
    }
}

/// Log category for different emulator components
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction execution, illegal opcodes, halt/stop transitions
    CPU,
    /// Memory map, banking registers, DMA
    Bus,
    /// LCD controller and rendering
    PPU,
    /// DIV/TIMA unit
    Timer,
    /// Interrupt requests and dispatch
    Interrupts,
    /// Header parsing, MBC and RTC activity, battery files
    Cartridge,
}

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::CPU,
        LogCategory::Bus,
        LogCategory::PPU,
        LogCategory::Timer,
        LogCategory::Interrupts,
        LogCategory::Cartridge,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::CPU => 0,
            LogCategory::Bus => 1,
            LogCategory::PPU => 2,
            LogCategory::Timer => 3,
            LogCategory::Interrupts => 4,
            LogCategory::Cartridge => 5,
        }
    }

    /// `log` crate target used when forwarding.
    pub fn target(self) -> &'static str {
        match self {
            LogCategory::CPU => "dotmatrix::cpu",
            LogCategory::Bus => "dotmatrix::bus",
            LogCategory::PPU => "dotmatrix::ppu",
            LogCategory::Timer => "dotmatrix::timer",
            LogCategory::Interrupts => "dotmatrix::interrupts",
            LogCategory::Cartridge => "dotmatrix::cartridge",
        }
    }

    /// Parse a category name as used on the command line.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cpu" => Some(LogCategory::CPU),
            "bus" | "mem" | "memory" => Some(LogCategory::Bus),
            "ppu" | "lcd" => Some(LogCategory::PPU),
            "timer" => Some(LogCategory::Timer),
            "int" | "irq" | "interrupts" => Some(LogCategory::Interrupts),
            "cart" | "cartridge" | "mbc" => Some(LogCategory::Cartridge),
            _ => None,
        }
    }
}

/// Sliding-window limiter: at most N messages per category per second.
struct RateLimiter {
    max_logs_per_second: AtomicUsize,
    window_duration: Duration,
    state: Mutex<RateState>,
}

#[derive(Default)]
struct RateState {
    timestamps: [VecDeque<Instant>; CATEGORY_COUNT],
    dropped: [usize; CATEGORY_COUNT],
    last_drop_report: [Option<Instant>; CATEGORY_COUNT],
}

impl RateLimiter {
    fn new(max_logs_per_second: usize) -> Self {
        Self {
            max_logs_per_second: AtomicUsize::new(max_logs_per_second),
            window_duration: Duration::from_secs(1),
            state: Mutex::new(RateState::default()),
        }
    }

    /// Returns (allowed, dropped) where dropped is Some(n) when a drop summary is due.
    fn should_allow(&self, category: LogCategory) -> (bool, Option<usize>) {
        let now = Instant::now();
        let idx = category.index();
        let max_logs = self.max_logs_per_second.load(Ordering::Relaxed);

        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let window = &mut state.timestamps[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window_duration {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < max_logs {
            window.push_back(now);
            let dropped = state.dropped[idx];
            if dropped > 0 {
                state.dropped[idx] = 0;
                state.last_drop_report[idx] = Some(now);
                return (true, Some(dropped));
            }
            return (true, None);
        }

        state.dropped[idx] += 1;
        let report_due = match state.last_drop_report[idx] {
            None => true,
            Some(last) => now.duration_since(last) >= Duration::from_secs(1),
        };
        if report_due {
            let dropped = state.dropped[idx];
            state.dropped[idx] = 0;
            state.last_drop_report[idx] = Some(now);
            (false, Some(dropped))
        } else {
            (false, None)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

impl LogConfig {
    /// All categories off, 60 messages/second per category.
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: Default::default(),
            log_sender: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(60),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category level other than `Off` overrides the global level.
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    pub fn set_rate_limit(&self, max_logs_per_second: usize) {
        self.rate_limiter
            .max_logs_per_second
            .store(max_logs_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_logs_per_second.load(Ordering::Relaxed)
    }

    /// Send messages to `path` from a background writer thread.
    ///
    /// Replaces any previous log file; the old writer exits once its channel closes.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
            })?;

        if let Ok(mut slot) = self.log_sender.lock() {
            *slot = Some(sender);
        }
        self.file_logging_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop logging to file and go back to the `log` facade.
    pub fn clear_log_file(&self) {
        if let Ok(mut slot) = self.log_sender.lock() {
            *slot = None;
        }
        self.file_logging_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, category: LogCategory, level: LogLevel, message: String) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            if let Ok(slot) = self.log_sender.lock() {
                if let Some(sender) = slot.as_ref() {
                    let line = format!("[{:?}] {}", category, message);
                    if sender.send(line).is_ok() {
                        return;
                    }
                }
            }
        }
        if let Some(level) = level.to_log_level() {
            log::log!(target: category.target(), level, "{}", message);
        }
    }
}

/// Log a message for `category` at `level`.
///
/// `message_fn` only runs when the category is enabled at that level and the
/// per-category rate limit has room. Dropped messages are summarised with a
/// single warning once per second.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }

    let (allowed, dropped) = config.rate_limiter.should_allow(category);
    if let Some(count) = dropped.filter(|&n| n > 0) {
        config.write_message(
            category,
            LogLevel::Warn,
            format!("rate limit exceeded, {} message(s) dropped", count),
        );
    }
    if allowed {
        config.write_message(category, level, message_fn());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(LogCategory::from_str("CPU"), Some(LogCategory::CPU));
        assert_eq!(LogCategory::from_str("mbc"), Some(LogCategory::Cartridge));
        assert_eq!(LogCategory::from_str("irq"), Some(LogCategory::Interrupts));
        assert_eq!(LogCategory::from_str("apu"), None);
    }

    #[test]
    fn test_category_targets_are_distinct() {
        let mut targets: Vec<_> = LogCategory::ALL.iter().map(|c| c.target()).collect();
        targets.sort();
        targets.dedup();
        assert_eq!(targets.len(), CATEGORY_COUNT);
    }

    #[test]
    fn test_should_log_with_category_level() {
        let config = LogConfig::new();
        config.set_level(LogCategory::CPU, LogLevel::Info);

        assert!(config.should_log(LogCategory::CPU, LogLevel::Error));
        assert!(config.should_log(LogCategory::CPU, LogLevel::Info));
        assert!(!config.should_log(LogCategory::CPU, LogLevel::Debug));
        assert!(!config.should_log(LogCategory::Timer, LogLevel::Error));
    }

    #[test]
    fn test_category_level_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Error);
        config.set_level(LogCategory::PPU, LogLevel::Trace);

        assert!(config.should_log(LogCategory::PPU, LogLevel::Trace));
        assert!(config.should_log(LogCategory::Bus, LogLevel::Error));
        assert!(!config.should_log(LogCategory::Bus, LogLevel::Warn));
    }

    #[test]
    fn test_off_is_never_logged() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::CPU, LogLevel::Off));
    }

    #[test]
    fn test_reset() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        config.set_level(LogCategory::Cartridge, LogLevel::Debug);
        config.reset();
        assert_eq!(config.get_global_level(), LogLevel::Off);
        assert_eq!(config.get_level(LogCategory::Cartridge), LogLevel::Off);
    }

    #[test]
    fn test_rate_limiter_blocks_over_limit() {
        let limiter = RateLimiter::new(5);
        for _ in 0..5 {
            assert!(limiter.should_allow(LogCategory::CPU).0);
        }
        assert!(!limiter.should_allow(LogCategory::CPU).0);
        // Other categories have their own window.
        assert!(limiter.should_allow(LogCategory::Timer).0);
    }

    #[test]
    fn test_rate_limiter_reports_drops_after_window() {
        let limiter = RateLimiter::new(2);
        limiter.should_allow(LogCategory::Bus);
        limiter.should_allow(LogCategory::Bus);
        for _ in 0..4 {
            limiter.should_allow(LogCategory::Bus);
        }

        std::thread::sleep(Duration::from_millis(1100));

        let (allowed, dropped) = limiter.should_allow(LogCategory::Bus);
        assert!(allowed);
        let dropped = dropped.expect("drop summary");
        assert!((3..=4).contains(&dropped), "got {}", dropped);
    }

    #[test]
    fn test_rate_limit_setter() {
        let config = LogConfig::new();
        config.set_rate_limit(500);
        assert_eq!(config.get_rate_limit(), 500);
    }
}
