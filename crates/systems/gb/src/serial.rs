//! Serial port (`$FF01 SB`, `$FF02 SC`)
//!
//! No link partner is emulated. A transfer started with the internal clock
//! shifts out SB, shifts in 0xFF, and completes after 8 bit-times: 1024
//! machine cycles at 8192 Hz, or 32 with the CGB fast clock (SC bit 1).
//! Transfers waiting on an external clock never finish.
//!
//! Every byte sent is also appended to an output buffer so test ROMs that
//! print over serial can be observed.

use serde::{Deserialize, Serialize};

const NORMAL_TRANSFER_CYCLES: u32 = 1024;
const FAST_TRANSFER_CYCLES: u32 = 32;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Serial {
    sb: u8,
    sc: u8,
    /// Machine cycles left in the active transfer
    remaining: u32,
    output: Vec<u8>,
    cgb: bool,
}

impl Serial {
    pub fn new(cgb: bool) -> Self {
        Self {
            cgb,
            ..Self::default()
        }
    }

    pub fn read_register(&self, addr: u16) -> u8 {
        match addr {
            0xFF01 => self.sb,
            0xFF02 => {
                if self.cgb {
                    self.sc | 0x7C
                } else {
                    self.sc | 0x7E
                }
            }
            _ => 0xFF,
        }
    }

    pub fn write_register(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF01 => self.sb = val,
            0xFF02 => {
                self.sc = if self.cgb { val & 0x83 } else { val & 0x81 };
                if self.sc & 0x81 == 0x81 {
                    self.output.push(self.sb);
                    self.remaining = if self.cgb && self.sc & 0x02 != 0 {
                        FAST_TRANSFER_CYCLES
                    } else {
                        NORMAL_TRANSFER_CYCLES
                    };
                } else {
                    self.remaining = 0;
                }
            }
            _ => {}
        }
    }

    /// Advance one machine cycle. Returns true when a transfer completes.
    pub fn step(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            return false;
        }
        self.sb = 0xFF;
        self.sc &= !0x80;
        true
    }

    pub fn output(&self) -> &[u8] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}
