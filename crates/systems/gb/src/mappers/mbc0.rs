//! ROM only (types 0x00, 0x08, 0x09)
//!
//! 32 KiB mapped directly. The RAM variants expose up to 8 KiB at
//! 0xA000-0xBFFF with no enable register.

use serde::{Deserialize, Serialize};

use super::{copy_ram, ram_offset, rom_byte};

#[derive(Debug, Serialize, Deserialize)]
pub struct Mbc0 {
    #[serde(skip)]
    pub(super) rom: Vec<u8>,
    ram: Vec<u8>,
}

impl Mbc0 {
    pub fn new(rom: Vec<u8>, ram: Vec<u8>) -> Self {
        Self { rom, ram }
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        let bank = if addr < 0x4000 { 0 } else { 1 };
        rom_byte(&self.rom, bank, addr)
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        ram_offset(&self.ram, 0, addr).map_or(0xFF, |i| self.ram[i])
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        if let Some(i) = ram_offset(&self.ram, 0, addr) {
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
