//! Cartridge header and controller setup.
//!
//! ```text
//! 0134-0143  title (0134-013E when the CGB flag is in use)
//! 0143       CGB flag: bit 7 set = CGB features
//! 0147       cartridge type (controller + RAM/battery/timer)
//! 0148       ROM size: 32 KiB << n
//! 0149       RAM size code
//! ```

use dotmatrix_core::logging::{log, LogCategory, LogLevel};

use crate::mappers::{cart_type_name, Mapper};
use crate::rtc::Rtc;
use crate::GbError;

/// Smallest image that still contains a complete header.
pub const HEADER_END: usize = 0x0150;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartridgeHeader {
    pub title: String,
    pub cgb_flag: u8,
    pub cart_type: u8,
    /// Declared ROM size in bytes
    pub rom_size: usize,
    /// External RAM size in bytes, excluding MBC2's built-in RAM
    pub ram_size: usize,
}

impl CartridgeHeader {
    pub fn parse(rom: &[u8]) -> Result<Self, GbError> {
        if rom.len() < HEADER_END {
            return Err(GbError::RomTooSmall(rom.len()));
        }

        let cgb_flag = rom[0x0143];
        let title_end = if cgb_flag & 0x80 != 0 { 0x013F } else { 0x0144 };
        let title = rom[0x0134..title_end]
            .iter()
            .take_while(|&&b| b != 0)
            .filter(|b| b.is_ascii_graphic() || **b == b' ')
            .map(|&b| b as char)
            .collect::<String>()
            .trim_end()
            .to_string();

        Ok(Self {
            title,
            cgb_flag,
            cart_type: rom[0x0147],
            rom_size: 0x8000usize << (rom[0x0148] & 0x0F),
            ram_size: ram_size(rom[0x0149]),
        })
    }

    /// Whether the cartridge asks for CGB features.
    pub fn supports_cgb(&self) -> bool {
        self.cgb_flag & 0x80 != 0
    }

    pub fn has_battery(&self) -> bool {
        matches!(
            self.cart_type,
            0x03 | 0x06 | 0x09 | 0x0D | 0x0F | 0x10 | 0x13 | 0x1B | 0x1E | 0x22 | 0xFF
        )
    }

    pub fn has_rtc(&self) -> bool {
        matches!(self.cart_type, 0x0F | 0x10)
    }

    pub fn type_name(&self) -> &'static str {
        cart_type_name(self.cart_type)
    }
}

/// Bytes of external RAM for a 0x0149 code.
fn ram_size(code: u8) -> usize {
    match code {
        0x01 => 0x800,
        0x02 => 0x2000,
        0x03 => 0x8000,
        0x04 => 0x20000,
        0x05 => 0x10000,
        _ => 0,
    }
}

#[derive(Debug)]
pub struct Cartridge {
    pub header: CartridgeHeader,
    pub mapper: Mapper,
}

impl Cartridge {
    pub fn load(data: &[u8]) -> Result<Self, GbError> {
        let header = CartridgeHeader::parse(data)?;

        if data.len() < header.rom_size {
            log(LogCategory::Cartridge, LogLevel::Warn, || {
                format!(
                    "ROM image is {} bytes, header declares {}",
                    data.len(),
                    header.rom_size
                )
            });
        }

        let ram = vec![0; header.ram_size];
        let mapper = Mapper::from_cart(data.to_vec(), ram, header.cart_type)?;

        log(LogCategory::Cartridge, LogLevel::Info, || {
            format!(
                "loaded \"{}\": {} ({:02X}), {} KiB ROM, {} KiB RAM{}",
                header.title,
                header.type_name(),
                header.cart_type,
                header.rom_size / 1024,
                mapper.ram().len() / 1024,
                if header.supports_cgb() { ", CGB" } else { "" }
            )
        });

        Ok(Self { header, mapper })
    }

    /// Battery-backed RAM, or None if the cartridge has no battery.
    pub fn battery_ram(&self) -> Option<&[u8]> {
        (self.header.has_battery() && !self.mapper.ram().is_empty()).then(|| self.mapper.ram())
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        self.mapper.rtc()
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        self.mapper.rtc_mut()
    }
}
