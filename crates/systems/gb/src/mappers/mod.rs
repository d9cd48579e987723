//! Cartridge memory bank controllers
//!
//! Each controller sees writes to 0x0000-0x7FFF as register writes and
//! decides which ROM bank appears at 0x4000-0x7FFF and which RAM bank (if
//! any, and only while enabled) appears at 0xA000-0xBFFF.

mod mbc0;
mod mbc1;
mod mbc2;
mod mbc3;
mod mbc5;

pub use mbc0::Mbc0;
pub use mbc1::Mbc1;
pub use mbc2::Mbc2;
pub use mbc3::Mbc3;
pub use mbc5::Mbc5;

use serde::{Deserialize, Serialize};

use crate::rtc::Rtc;
use crate::GbError;

const ROM_BANK_SIZE: usize = 0x4000;
const RAM_BANK_SIZE: usize = 0x2000;

/// Byte at `addr` (0x0000-0x7FFF) inside ROM bank `bank`, wrapping the bank
/// number to the image size.
fn rom_byte(rom: &[u8], bank: usize, addr: u16) -> u8 {
    let banks = rom.len().div_ceil(ROM_BANK_SIZE).max(1);
    let offset = (bank % banks) * ROM_BANK_SIZE + (addr as usize & (ROM_BANK_SIZE - 1));
    rom.get(offset).copied().unwrap_or(0xFF)
}

/// Offset of `addr` (0xA000-0xBFFF) inside RAM bank `bank`, or None when
/// the cartridge has no RAM there.
fn ram_offset(ram: &[u8], bank: usize, addr: u16) -> Option<usize> {
    if ram.is_empty() {
        return None;
    }
    let banks = ram.len().div_ceil(RAM_BANK_SIZE);
    let offset = (bank % banks) * RAM_BANK_SIZE + (addr.wrapping_sub(0xA000) as usize & 0x1FFF);
    (offset < ram.len()).then_some(offset)
}

/// Copy a saved image into cartridge RAM. Extra bytes are ignored, missing
/// bytes keep their current value.
fn copy_ram(ram: &mut [u8], data: &[u8]) {
    let len = ram.len().min(data.len());
    ram[..len].copy_from_slice(&data[..len]);
}

/// Controller state. The serialized form carries bank registers, RAM and
/// clock but not the ROM image; see [`Mapper::adopt_rom`].
#[derive(Debug, Serialize, Deserialize)]
pub enum Mapper {
    Mbc0(Mbc0),
    Mbc1(Mbc1),
    Mbc2(Mbc2),
    Mbc3(Mbc3),
    Mbc5(Mbc5),
}

impl Mapper {
    /// Build the controller named by the cartridge type byte (0x0147).
    pub fn from_cart(rom: Vec<u8>, ram: Vec<u8>, cart_type: u8) -> Result<Self, GbError> {
        let mapper = match cart_type {
            0x00 | 0x08 | 0x09 => Mapper::Mbc0(Mbc0::new(rom, ram)),
            0x01..=0x03 => Mapper::Mbc1(Mbc1::new(rom, ram)),
            0x05 | 0x06 => Mapper::Mbc2(Mbc2::new(rom)),
            0x0F | 0x10 => Mapper::Mbc3(Mbc3::new(rom, ram, true)),
            0x11..=0x13 => Mapper::Mbc3(Mbc3::new(rom, ram, false)),
            0x19..=0x1E => Mapper::Mbc5(Mbc5::new(rom, ram)),
            code => {
                return Err(GbError::UnsupportedMapper {
                    code,
                    name: cart_type_name(code),
                })
            }
        };
        Ok(mapper)
    }

    /// Move the ROM image (and wall clock) of `current` into a controller
    /// restored from a save state. Returns false, leaving both untouched,
    /// when they are different controller types.
    pub fn adopt_rom(&mut self, current: &mut Mapper) -> bool {
        use std::mem::swap;

        match (self, current) {
            (Mapper::Mbc0(new), Mapper::Mbc0(old)) => swap(&mut new.rom, &mut old.rom),
            (Mapper::Mbc1(new), Mapper::Mbc1(old)) => swap(&mut new.rom, &mut old.rom),
            (Mapper::Mbc2(new), Mapper::Mbc2(old)) => swap(&mut new.rom, &mut old.rom),
            (Mapper::Mbc3(new), Mapper::Mbc3(old)) => {
                swap(&mut new.rom, &mut old.rom);
                new.clock = old.clock;
            }
            (Mapper::Mbc5(new), Mapper::Mbc5(old)) => swap(&mut new.rom, &mut old.rom),
            _ => return false,
        }
        true
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        match self {
            Mapper::Mbc0(m) => m.read_rom(addr),
            Mapper::Mbc1(m) => m.read_rom(addr),
            Mapper::Mbc2(m) => m.read_rom(addr),
            Mapper::Mbc3(m) => m.read_rom(addr),
            Mapper::Mbc5(m) => m.read_rom(addr),
        }
    }

    /// Register write to 0x0000-0x7FFF
    pub fn write_rom(&mut self, addr: u16, val: u8) {
        match self {
            Mapper::Mbc0(_) => {}
            Mapper::Mbc1(m) => m.write_rom(addr, val),
            Mapper::Mbc2(m) => m.write_rom(addr, val),
            Mapper::Mbc3(m) => m.write_rom(addr, val),
            Mapper::Mbc5(m) => m.write_rom(addr, val),
        }
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        match self {
            Mapper::Mbc0(m) => m.read_ram(addr),
            Mapper::Mbc1(m) => m.read_ram(addr),
            Mapper::Mbc2(m) => m.read_ram(addr),
            Mapper::Mbc3(m) => m.read_ram(addr),
            Mapper::Mbc5(m) => m.read_ram(addr),
        }
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        match self {
            Mapper::Mbc0(m) => m.write_ram(addr, val),
            Mapper::Mbc1(m) => m.write_ram(addr, val),
            Mapper::Mbc2(m) => m.write_ram(addr, val),
            Mapper::Mbc3(m) => m.write_ram(addr, val),
            Mapper::Mbc5(m) => m.write_ram(addr, val),
        }
    }

    /// Cartridge RAM contents, as written to a `.sav` file.
    pub fn ram(&self) -> &[u8] {
        match self {
            Mapper::Mbc0(m) => m.ram(),
            Mapper::Mbc1(m) => m.ram(),
            Mapper::Mbc2(m) => m.ram(),
            Mapper::Mbc3(m) => m.ram(),
            Mapper::Mbc5(m) => m.ram(),
        }
    }

    pub fn load_ram(&mut self, data: &[u8]) {
        match self {
            Mapper::Mbc0(m) => m.load_ram(data),
            Mapper::Mbc1(m) => m.load_ram(data),
            Mapper::Mbc2(m) => m.load_ram(data),
            Mapper::Mbc3(m) => m.load_ram(data),
            Mapper::Mbc5(m) => m.load_ram(data),
        }
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        match self {
            Mapper::Mbc3(m) => m.rtc(),
            _ => None,
        }
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        match self {
            Mapper::Mbc3(m) => m.rtc_mut(),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mapper::Mbc0(_) => "ROM",
            Mapper::Mbc1(_) => "MBC1",
            Mapper::Mbc2(_) => "MBC2",
            Mapper::Mbc3(_) => "MBC3",
            Mapper::Mbc5(_) => "MBC5",
        }
    }
}

/// Human-readable name for a cartridge type byte, used in load errors.
pub fn cart_type_name(code: u8) -> &'static str {
    match code {
        0x00 => "ROM ONLY",
        0x01 => "MBC1",
        0x02 => "MBC1+RAM",
        0x03 => "MBC1+RAM+BATTERY",
        0x05 => "MBC2",
        0x06 => "MBC2+BATTERY",
        0x08 => "ROM+RAM",
        0x09 => "ROM+RAM+BATTERY",
        0x0B => "MMM01",
        0x0C => "MMM01+RAM",
        0x0D => "MMM01+RAM+BATTERY",
        0x0F => "MBC3+TIMER+BATTERY",
        0x10 => "MBC3+TIMER+RAM+BATTERY",
        0x11 => "MBC3",
        0x12 => "MBC3+RAM",
        0x13 => "MBC3+RAM+BATTERY",
        0x19 => "MBC5",
        0x1A => "MBC5+RAM",
        0x1B => "MBC5+RAM+BATTERY",
        0x1C => "MBC5+RUMBLE",
        0x1D => "MBC5+RUMBLE+RAM",
        0x1E => "MBC5+RUMBLE+RAM+BATTERY",
        0x20 => "MBC6",
        0x22 => "MBC7+SENSOR+RUMBLE+RAM+BATTERY",
        0xFC => "POCKET CAMERA",
        0xFD => "BANDAI TAMA5",
        0xFE => "HuC3",
        0xFF => "HuC1+RAM+BATTERY",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make(cart_type: u8) -> Result<Mapper, GbError> {
        Mapper::from_cart(vec![0; 0x8000], vec![0; 0x2000], cart_type)
    }

    #[test]
    fn test_mapper_from_cart_type() {
        for (code, name) in [
            (0x00, "ROM"),
            (0x09, "ROM"),
            (0x01, "MBC1"),
            (0x03, "MBC1"),
            (0x05, "MBC2"),
            (0x06, "MBC2"),
            (0x0F, "MBC3"),
            (0x13, "MBC3"),
            (0x19, "MBC5"),
            (0x1E, "MBC5"),
        ] {
            assert_eq!(make(code).map(|m| m.name()).ok(), Some(name), "type {code:02X}");
        }
    }

    #[test]
    fn test_unsupported_type_is_an_error() {
        match make(0xFF) {
            Err(GbError::UnsupportedMapper { code, name }) => {
                assert_eq!(code, 0xFF);
                assert_eq!(name, "HuC1+RAM+BATTERY");
            }
            other => panic!("expected UnsupportedMapper, got {other:?}"),
        }
        assert!(make(0x20).is_err());
        assert!(make(0x04).is_err());
    }

    #[test]
    fn test_rtc_only_on_timer_carts() {
        assert!(make(0x10).map(|m| m.rtc().is_some()).unwrap_or(false));
        assert!(!make(0x13).map(|m| m.rtc().is_some()).unwrap_or(true));
        assert!(!make(0x1B).map(|m| m.rtc().is_some()).unwrap_or(true));
    }

    #[test]
    fn test_rom_byte_wraps_bank() {
        let mut rom = vec![0; 0x8000];
        rom[0x4123] = 0x5A;
        assert_eq!(rom_byte(&rom, 1, 0x4123), 0x5A);
        assert_eq!(rom_byte(&rom, 3, 0x4123), 0x5A);
    }

    #[test]
    fn test_saved_controller_adopts_rom() {
        let mut rom = vec![0; 0x10000];
        for bank in 0..4 {
            rom[bank * 0x4000] = bank as u8 + 0x10;
        }
        let mut mapper = Mapper::from_cart(rom.clone(), vec![0; 0x2000], 0x03).unwrap();
        mapper.write_rom(0x0000, 0x0A);
        mapper.write_rom(0x2000, 0x03);
        mapper.write_ram(0xA010, 0x77);

        let saved = serde_json::to_value(&mapper).unwrap();
        let mut restored: Mapper = serde_json::from_value(saved).unwrap();
        let mut current = Mapper::from_cart(rom, vec![0; 0x2000], 0x03).unwrap();
        assert_eq!(current.read_rom(0x4000), 0x11);

        assert!(restored.adopt_rom(&mut current));
        assert_eq!(restored.read_rom(0x4000), 0x13);
        assert_eq!(restored.read_ram(0xA010), 0x77);
    }

    #[test]
    fn test_adopt_rom_rejects_other_controller() {
        let saved = serde_json::to_value(make(0x19).unwrap()).unwrap();
        let mut restored: Mapper = serde_json::from_value(saved).unwrap();
        let mut current = make(0x01).unwrap();
        assert!(!restored.adopt_rom(&mut current));
        assert_eq!(current.read_rom(0x0000), 0x00);
        // No image: open bus
        assert_eq!(restored.read_rom(0x0000), 0xFF);
        assert_eq!(restored.name(), "MBC5");
    }

    #[test]
    fn test_load_ram_copies_prefix() {
        let mut mapper = make(0x03).unwrap_or_else(|e| panic!("{e}"));
        mapper.load_ram(&[1, 2, 3]);
        assert_eq!(&mapper.ram()[..4], &[1, 2, 3, 0]);
        assert_eq!(mapper.ram().len(), 0x2000);
    }
}
