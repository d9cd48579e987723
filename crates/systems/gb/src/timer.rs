//! Game Boy Timer implementation
//!
//! # Timer Registers
//!
//! - `$FF04 (DIV)`: upper byte of the internal 16-bit counter, write resets it
//! - `$FF05 (TIMA)`: timer counter, incremented at the rate selected by TAC
//! - `$FF06 (TMA)`: value loaded into TIMA after an overflow
//! - `$FF07 (TAC)`: timer control
//!   - Bit 2: Timer enable
//!   - Bits 1-0: Clock select
//!     - 00: 4096 Hz (counter bit 9)
//!     - 01: 262144 Hz (counter bit 3)
//!     - 10: 65536 Hz (counter bit 5)
//!     - 11: 16384 Hz (counter bit 7)
//!
//! # Implementation
//!
//! The internal counter advances by 4 every machine cycle. TIMA is clocked
//! by the falling edge of `enabled && counter[bit]`, so writes to DIV or TAC
//! that pull that signal low increment TIMA as well.
//!
//! On overflow TIMA reads 0x00 for one machine cycle; TMA is copied in and
//! the interrupt requested on the next one. Writing TIMA during that cycle
//! cancels the reload.

use dotmatrix_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

/// Counter bit watched for each TAC clock select.
const TAC_BITS: [u16; 4] = [9, 3, 5, 7];

/// Game Boy Timer
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Timer {
    counter: u16,
    tima: u8,
    tma: u8,
    tac: u8,
    /// TIMA overflowed last cycle; reload on the next one
    reload_pending: bool,
    /// Divider frozen (STOP mode)
    stopped: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// DIV value left behind by the boot ROM.
    pub fn with_counter(counter: u16) -> Self {
        Self {
            counter,
            ..Self::default()
        }
    }

    pub fn div(&self) -> u8 {
        (self.counter >> 8) as u8
    }

    pub fn counter(&self) -> u16 {
        self.counter
    }

    pub fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
    }

    fn signal(&self) -> bool {
        self.tac & 0x04 != 0 && self.counter & (1 << TAC_BITS[(self.tac & 0x03) as usize]) != 0
    }

    fn increment(&mut self) {
        let (tima, overflow) = self.tima.overflowing_add(1);
        self.tima = tima;
        if overflow {
            self.reload_pending = true;
        }
    }

    /// Read a timer register
    pub fn read_register(&self, addr: u16) -> u8 {
        match addr {
            0xFF04 => self.div(),
            0xFF05 => self.tima,
            0xFF06 => self.tma,
            0xFF07 => self.tac | 0xF8,
            _ => 0xFF,
        }
    }

    /// Write to a timer register
    pub fn write_register(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF04 => self.reset_divider(),
            0xFF05 => {
                self.reload_pending = false;
                self.tima = val;
            }
            0xFF06 => self.tma = val,
            0xFF07 => {
                let before = self.signal();
                self.tac = val & 0x07;
                if before && !self.signal() {
                    self.increment();
                }
            }
            _ => {}
        }
    }

    /// Zero the internal counter (DIV write, speed switch).
    pub fn reset_divider(&mut self) {
        let before = self.signal();
        self.counter = 0;
        if before {
            self.increment();
        }
    }

    /// Advance one machine cycle.
    ///
    /// Returns true if a timer interrupt should be requested.
    pub fn step(&mut self) -> bool {
        let mut interrupt = false;
        if self.reload_pending {
            self.reload_pending = false;
            self.tima = self.tma;
            interrupt = true;
            log(LogCategory::Timer, LogLevel::Trace, || {
                format!("TIMA reloaded with {:02X}", self.tma)
            });
        }

        if self.stopped {
            return interrupt;
        }

        let before = self.signal();
        self.counter = self.counter.wrapping_add(4);
        if before && !self.signal() {
            self.increment();
        }
        interrupt
    }
}
