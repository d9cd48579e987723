//! MBC2 (types 0x05-0x06)
//!
//! Registers live in 0x0000-0x3FFF and are told apart by address bit 8:
//! clear selects RAM enable, set selects the 4-bit ROM bank. The chip has
//! 512 half-bytes of RAM, repeated across 0xA000-0xBFFF. Only the low
//! nibble is stored; the upper nibble reads as 1s.

use serde::{Deserialize, Serialize};

use super::{copy_ram, rom_byte};

const RAM_SIZE: usize = 512;

#[derive(Debug, Serialize, Deserialize)]
pub struct Mbc2 {
    #[serde(skip)]
    pub(super) rom: Vec<u8>,
    ram: Vec<u8>,
    ram_enabled: bool,
    rom_bank: u8,
}

impl Mbc2 {
    pub fn new(rom: Vec<u8>) -> Self {
        Self {
            rom,
            ram: vec![0; RAM_SIZE],
            ram_enabled: false,
            rom_bank: 1,
        }
    }

    pub fn read_rom(&self, addr: u16) -> u8 {
        let bank = if addr < 0x4000 {
            0
        } else {
            self.rom_bank as usize
        };
        rom_byte(&self.rom, bank, addr)
    }

    pub fn write_rom(&mut self, addr: u16, val: u8) {
        if addr >= 0x4000 {
            return;
        }
        if addr & 0x0100 == 0 {
            self.ram_enabled = val & 0x0F == 0x0A;
        } else {
            let bank = val & 0x0F;
            self.rom_bank = if bank == 0 { 1 } else { bank };
        }
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        if !self.ram_enabled {
            return 0xFF;
        }
        0xF0 | self.ram[addr as usize & (RAM_SIZE - 1)]
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        if self.ram_enabled {
            self.ram[addr as usize & (RAM_SIZE - 1)] = val & 0x0F;
        }
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn load_ram(&mut self, data: &[u8]) {
        copy_ram(&mut self.ram, data);
        for b in &mut self.ram {
            *b &= 0x0F;
        }
    }
}
