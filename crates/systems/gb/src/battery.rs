//! Battery-backed save files next to the ROM.
//!
//! `game.gb` keeps its cartridge RAM in `game.sav` (raw bytes) and its
//! MBC3 clock in `game.rtc` (JSON). A missing file is not an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use dotmatrix_core::logging::{log, LogCategory, LogLevel};

use crate::rtc::RtcRecord;
use crate::GbError;

pub fn save_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("sav")
}

pub fn rtc_path(rom_path: &Path) -> PathBuf {
    rom_path.with_extension("rtc")
}

/// Read a RAM image. `Ok(None)` when there is no file yet.
pub fn load_ram(path: &Path) -> Result<Option<Vec<u8>>, GbError> {
    match fs::read(path) {
        Ok(data) => {
            log(LogCategory::Cartridge, LogLevel::Info, || {
                format!("loaded {} bytes from {}", data.len(), path.display())
            });
            Ok(Some(data))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn store_ram(path: &Path, data: &[u8]) -> Result<(), GbError> {
    fs::write(path, data)?;
    log(LogCategory::Cartridge, LogLevel::Info, || {
        format!("wrote {} bytes to {}", data.len(), path.display())
    });
    Ok(())
}

pub fn load_rtc(path: &Path) -> Result<Option<RtcRecord>, GbError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn store_rtc(path: &Path, record: &RtcRecord) -> Result<(), GbError> {
    fs::write(path, serde_json::to_string_pretty(record)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_replace_extension() {
        let rom = Path::new("/games/zelda.gbc");
        assert_eq!(save_path(rom), PathBuf::from("/games/zelda.sav"));
        assert_eq!(rtc_path(rom), PathBuf::from("/games/zelda.rtc"));
        assert_eq!(save_path(Path::new("noext")), PathBuf::from("noext.sav"));
    }

    #[test]
    fn test_missing_files_are_none() {
        let dir = std::env::temp_dir().join("dotmatrix_battery_missing");
        assert!(matches!(load_ram(&dir.join("nothing.sav")), Ok(None)));
        assert!(matches!(load_rtc(&dir.join("nothing.rtc")), Ok(None)));
    }
}
