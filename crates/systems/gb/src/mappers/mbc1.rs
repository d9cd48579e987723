//! MBC1 (types 0x01-0x03)
//!
//! ```text
//! 0000-1FFF  RAM enable (0x0A in the low nibble)
//! 2000-3FFF  BANK1: low 5 bits of the ROM bank, 0 reads as 1
//! 4000-5FFF  BANK2: 2 bits, ROM bank bits 5-6 or RAM bank
//! 6000-7FFF  mode: 0 = BANK2 only affects 4000-7FFF,
//!            1 = BANK2 also selects the 0000-3FFF bank and the RAM bank
//! ```

use serde::{Deserialize, Serialize};

use super::{copy_ram, ram_offset, rom_byte};

#[derive(Debug, Serialize, Deserialize)]
pub struct Mbc1 {
    #[serde(skip)]
    pub(super) rom: Vec<u8>,
    ram: Vec<u8>,
    ram_enabled: bool,
    bank1: u8,
    bank2: u8,
    mode: u8,
}

impl Mbc1 {
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self {
            rom,
            ram,
            ram_enabled: false,
            bank1: 1,
            bank2: 0,
            mode: 0,
        }
    }

    fn low_bank(&self) -> usize {
        if self.mode == 1 {
            (self.bank2 as usize) << 5
        } else {
            0
        }
    }

    fn high_bank(&self) -> usize {
        ((self.bank2 as usize) << 5) | self.bank1 as usize
    }

    fn ram_bank(&self) -> usize {
        if self.mode == 1 {
            self.bank2 as usize
        } else {
            0
        }
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        let bank = if addr < 0x4000 {
            self.low_bank()
        } else {
            self.high_bank()
        };
        rom_byte(&self.rom, bank, addr)
    }

    pub fn write_rom(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram_enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                let bank = val & 0x1F;
                self.bank1 = if bank == 0 { 1 } else { bank };
            }
            0x4000..=0x5FFF => self.bank2 = val & 0x03,
            0x6000..=0x7FFF => self.mode = val & 0x01,
            _ => {}
        }
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_enabled {
            return 0xFF;
        }
        ram_offset(&self.ram, self.ram_bank(), addr).map_or(0xFF, |i| self.ram[i])
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        if !self.ram_enabled {
            return;
        }
        if let Some(i) = ram_offset(&self.ram, self.ram_bank(), addr) {
            self.ram[i] = val;
        }
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn load_ram(&mut self, data: &[u8]) {
        copy_ram(&mut self.ram, data);
    }
}
