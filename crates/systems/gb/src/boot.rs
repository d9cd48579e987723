//! Boot ROM overlay.
//!
//! While enabled, the boot ROM shadows the cartridge at 0x0000-0x00FF and,
//! for the 2304-byte CGB image, also 0x0200-0x08FF (the cartridge header at
//! 0x0100-0x01FF stays visible). Any nonzero write to FF50 unmaps it until
//! the next reset.

use crate::GbError;

pub const DMG_BOOT_SIZE: usize = 0x100;
pub const CGB_BOOT_SIZE: usize = 0x900;

#[derive(Debug, Clone)]
pub struct BootRom {
    data: Vec<u8>,
    enabled: bool,
}

impl BootRom {
    pub fn new(data: &[u8]) -> Result<Self, GbError> {
        match data.len() {
            DMG_BOOT_SIZE | CGB_BOOT_SIZE => Ok(Self {
                data: data.to_vec(),
                enabled: true,
            }),
            len => Err(GbError::InvalidBootRom(len)),
        }
    }

    pub fn is_cgb(&self) -> bool {
        self.data.len() == CGB_BOOT_SIZE
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Map the overlay back in (on reset).
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Handle a write to FF50.
    pub fn write_disable(&mut self, val: u8) {
        if val != 0 {
            self.enabled = false;
        }
    }

    /// Overlay byte at `addr`, or None if the cartridge shows through.
    pub fn read(&self, addr: u16) -> Option<u8> {
        if !self.enabled {
            return None;
        }
        match addr {
            0x0000..=0x00FF => Some(self.data[addr as usize]),
            0x0200..=0x08FF if self.is_cgb() => Some(self.data[addr as usize]),
            _ => None,
        }
    }
}
