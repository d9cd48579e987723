//! Interrupt enable / request registers.
//!
//! - `$FF0F (IF)`: request flags, upper three bits read as 1
//! - `$FFFF (IE)`: enable mask, all eight bits stored
//!
//! Priority follows bit order: V-Blank first, Joypad last.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    LcdStat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub const ALL: [Interrupt; 5] = [
        Interrupt::VBlank,
        Interrupt::LcdStat,
        Interrupt::Timer,
        Interrupt::Serial,
        Interrupt::Joypad,
    ];

    pub fn bit(self) -> u8 {
        match self {
            Interrupt::VBlank => 0,
            Interrupt::LcdStat => 1,
            Interrupt::Timer => 2,
            Interrupt::Serial => 3,
            Interrupt::Joypad => 4,
        }
    }

    pub fn mask(self) -> u8 {
        1 << self.bit()
    }

    /// Handler address.
    pub fn vector(self) -> u16 {
        0x0040 + self.bit() as u16 * 8
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterruptController {
    pub enable: u8,
    pub flags: u8,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self, interrupt: Interrupt) {
        self.flags |= interrupt.mask();
    }

    /// Raise every interrupt whose bit is set in `mask`.
    pub fn request_mask(&mut self, mask: u8) {
        self.flags |= mask & 0x1F;
    }

    /// Requested and enabled interrupts.
    pub fn pending(&self) -> u8 {
        self.enable & self.flags & 0x1F
    }

    pub fn acknowledge(&mut self, mask: u8) {
        self.flags &= !mask;
    }

    /// Highest-priority pending interrupt.
    pub fn highest(&self) -> Option<Interrupt> {
        let pending = self.pending();
        Interrupt::ALL
            .into_iter()
            .find(|i| pending & i.mask() != 0)
    }

    pub fn read_if(&self) -> u8 {
        self.flags | 0xE0
    }

    pub fn write_if(&mut self, val: u8) {
        self.flags = val & 0x1F;
    }
}
