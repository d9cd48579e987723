//! MBC3 real-time clock.
//!
//! The clock keeps live registers that advance with wall-clock time and a
//! latched copy that the game reads after writing 0x00 then 0x01 to
//! 0x6000-0x7FFF.
//!
//! ```text
//! 08  seconds   0-59
//! 09  minutes   0-59
//! 0A  hours     0-23
//! 0B  day counter, low 8 bits
//! 0C  bit 0: day counter bit 8, bit 6: halt, bit 7: day counter carry
//! ```
//!
//! Time is tracked in whole seconds relative to a UNIX timestamp, so a saved
//! record can be fast-forwarded on the next load.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const DH_DAY_MSB: u8 = 0x01;
const DH_HALT: u8 = 0x40;
const DH_CARRY: u8 = 0x80;

/// Seconds since the UNIX epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcRegisters {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days_low: u8,
    pub days_high: u8,
}

/// On-disk form of the clock. `timestamp` 0 means the clock was halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtcRecord {
    pub seconds: u8,
    pub minutes: u8,
    pub hours: u8,
    pub days_low: u8,
    pub days_high: u8,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rtc {
    live: RtcRegisters,
    latched: RtcRegisters,
    /// Timestamp the live registers are current as of
    base: u64,
    last_latch_write: u8,
}

impl Rtc {
    pub fn new(now: u64) -> Self {
        Self {
            live: RtcRegisters::default(),
            latched: RtcRegisters::default(),
            base: now,
            last_latch_write: 0xFF,
        }
    }

    pub fn halted(&self) -> bool {
        self.live.days_high & DH_HALT != 0
    }

    pub fn live(&self) -> RtcRegisters {
        self.live
    }

    /// Bring the live registers up to `now`.
    pub fn sync(&mut self, now: u64) {
        if !self.halted() && now > self.base {
            self.advance(now - self.base);
        }
        self.base = now;
    }

    fn advance(&mut self, elapsed: u64) {
        let r = &mut self.live;

        let total = r.seconds as u64 + elapsed;
        r.seconds = (total % 60) as u8;
        let total = r.minutes as u64 + total / 60;
        r.minutes = (total % 60) as u8;
        let total = r.hours as u64 + total / 60;
        r.hours = (total % 24) as u8;

        let days = ((r.days_high & DH_DAY_MSB) as u64) << 8 | r.days_low as u64;
        let days = days + total / 24;
        if days > 0x1FF {
            r.days_high |= DH_CARRY;
        }
        r.days_low = days as u8;
        r.days_high = (r.days_high & !DH_DAY_MSB) | ((days >> 8) as u8 & DH_DAY_MSB);
    }

    /// A write to 0x6000-0x7FFF. 0x00 followed by 0x01 latches.
    pub fn write_latch(&mut self, val: u8, now: u64) {
        if self.last_latch_write == 0x00 && val == 0x01 {
            self.sync(now);
            self.latched = self.live;
        }
        self.last_latch_write = val;
    }

    /// Read a latched register (0x08-0x0C).
    pub fn read(&self, reg: u8) -> u8 {
        let r = &self.latched;
        match reg {
            0x08 => r.seconds,
            0x09 => r.minutes,
            0x0A => r.hours,
            0x0B => r.days_low,
            0x0C => r.days_high | 0x3E,
            _ => 0xFF,
        }
    }

    /// Write a live register (0x08-0x0C).
    pub fn write(&mut self, reg: u8, val: u8, now: u64) {
        self.sync(now);
        let r = &mut self.live;
        match reg {
            0x08 => r.seconds = val & 0x3F,
            0x09 => r.minutes = val & 0x3F,
            0x0A => r.hours = val & 0x1F,
            0x0B => r.days_low = val,
            0x0C => r.days_high = val & (DH_DAY_MSB | DH_HALT | DH_CARRY),
            _ => {}
        }
    }

    pub fn record(&mut self, now: u64) -> RtcRecord {
        self.sync(now);
        let r = self.live;
        RtcRecord {
            seconds: r.seconds,
            minutes: r.minutes,
            hours: r.hours,
            days_low: r.days_low,
            days_high: r.days_high,
            timestamp: if self.halted() { 0 } else { now },
        }
    }

    /// Restore from a saved record and fast-forward to `now`.
    pub fn load_record(&mut self, record: &RtcRecord, now: u64) {
        self.live = RtcRegisters {
            seconds: record.seconds,
            minutes: record.minutes,
            hours: record.hours,
            days_low: record.days_low,
            days_high: record.days_high,
        };
        self.base = if record.timestamp == 0 {
            now
        } else {
            record.timestamp
        };
        self.sync(now);
        self.latched = self.live;
    }
}
