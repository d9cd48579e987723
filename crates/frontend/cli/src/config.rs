use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "dotmatrix.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// 256-byte DMG boot ROM, used for cartridges without CGB support
    pub dmg_boot_rom: Option<PathBuf>,
    /// 2304-byte CGB boot ROM, used for cartridges with the CGB flag
    pub cgb_boot_rom: Option<PathBuf>,
    /// Emulation speed multiplier; 0 runs unthrottled
    pub speed: f64,
    /// Read and write `.sav` / `.rtc` files next to the ROM
    pub battery_saves: bool,
    /// Global log level ("off", "error", "warn", "info", "debug", "trace")
    pub log_level: String,
    /// Per-category overrides, e.g. {"cpu": "debug"}
    pub log_levels: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dmg_boot_rom: None,
            cgb_boot_rom: None,
            speed: 1.0,
            battery_saves: true,
            log_level: "warn".to_string(),
            log_levels: HashMap::new(),
        }
    }
}

impl Settings {
    /// `dotmatrix.json` next to the executable
    pub fn config_path() -> PathBuf {
        let mut path = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        path.push(CONFIG_FILE);
        path
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`, falling back to defaults on error
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(e) => {
                    log::warn!(
                        "failed to parse {}: {}. Using defaults.",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            // A missing file is the normal first-run case.
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Boot ROM for the given model, if one is configured.
    pub fn boot_rom(&self, cgb: bool) -> Option<&Path> {
        if cgb {
            self.cgb_boot_rom.as_deref()
        } else {
            self.dmg_boot_rom.as_deref()
        }
    }
}
