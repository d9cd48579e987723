//! MBC3 (types 0x0F-0x13)
//!
//! ```text
//! 0000-1FFF  RAM and RTC enable (0x0A in the low nibble)
//! 2000-3FFF  ROM bank, 7 bits, 0 reads as 1
//! 4000-5FFF  00-03: RAM bank, 08-0C: RTC register
//! 6000-7FFF  RTC latch (write 00 then 01)
//! ```

use serde::{Deserialize, Serialize};

use super::{copy_ram, ram_offset, rom_byte};
use crate::rtc::{unix_now, Rtc};

#[derive(Debug, Serialize, Deserialize)]
pub struct Mbc3 {
    #[serde(skip)]
    pub(super) rom: Vec<u8>,
    ram: Vec<u8>,
    enabled: bool,
    rom_bank: u8,
    /// RAM bank (0-3) or RTC register (08-0C)
    select: u8,
    rtc: Option<Rtc>,
    #[serde(skip, default = "wall_clock")]
    pub(super) clock: fn() -> u64,
}

fn wall_clock() -> fn() -> u64 {
    unix_now
}

impl Mbc3 {
    pub fn new(rom: Vec<u8>, ram: Vec<u8>, has_rtc: bool) -> Self {
        Self::with_clock(rom, ram, has_rtc, unix_now)
    }

    /// Same as `new` with a custom wall clock (seconds since the epoch).
    pub fn with_clock(rom: Vec<u8>, ram: Vec<u8>, has_rtc: bool, clock: fn() -> u64) -> Self {
        Self {
            rom,
            ram,
            enabled: false,
            rom_bank: 1,
            select: 0,
            rtc: has_rtc.then(|| Rtc::new(clock())),
            clock,
        }
    }

    pub fn rtc(&self) -> Option<&Rtc> {
        self.rtc.as_ref()
    }

    pub fn rtc_mut(&mut self) -> Option<&mut Rtc> {
        self.rtc.as_mut()
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
        match addr {
            0x0000..=0x1FFF => self.enabled = val & 0x0F == 0x0A,
            0x2000..=0x3FFF => {
                let bank = val & 0x7F;
                self.rom_bank = if bank == 0 { 1 } else { bank };
            }
            0x4000..=0x5FFF => self.select = val & 0x0F,
            0x6000..=0x7FFF => {
                let now = (self.clock)();
                if let Some(rtc) = &mut self.rtc {
                    rtc.write_latch(val, now);
                }
            }
            _ => {}
        }
    }

    pub fn read_ram(&self, addr: u16) -> u8 {
        if !self.enabled {
            return 0xFF;
        }
        match self.select {
            0x00..=0x03 => {
                ram_offset(&self.ram, self.select as usize, addr).map_or(0xFF, |i| self.ram[i])
            }
            0x08..=0x0C => self.rtc.as_ref().map_or(0xFF, |rtc| rtc.read(self.select)),
            _ => 0xFF,
        }
    }

    pub fn write_ram(&mut self, addr: u16, val: u8) {
        if !self.enabled {
            return;
        }
        match self.select {
            0x00..=0x03 => {
                if let Some(i) = ram_offset(&self.ram, self.select as usize, addr) {
                    self.ram[i] = val;
                }
            }
            0x08..=0x0C => {
                let now = (self.clock)();
                if let Some(rtc) = &mut self.rtc {
                    rtc.write(self.select, val, now);
                }
            }
            _ => {}
        }
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn load_ram(&mut self, data: &[u8]) {
        copy_ram(&mut self.ram, data);
    }
}
