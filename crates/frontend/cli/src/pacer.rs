//! Frame pacing against the wall clock.

use std::thread;
use std::time::{Duration, Instant};

/// T-cycles per frame (154 lines x 456)
pub const CYCLES_PER_FRAME: u64 = 70_224;
/// DMG master clock
pub const CLOCK_HZ: u64 = 4_194_304;

/// How far behind the schedule may fall before it is reset instead of
/// caught up with a burst of unthrottled frames.
const MAX_LAG_FRAMES: u32 = 4;

/// Wall-clock time of one frame at `speed`, or None when unthrottled.
pub fn frame_duration(speed: f64) -> Option<Duration> {
    if !speed.is_finite() || speed <= 0.0 {
        return None;
    }
    let seconds = CYCLES_PER_FRAME as f64 / CLOCK_HZ as f64 / speed;
    Some(Duration::from_secs_f64(seconds))
}

pub struct Pacer {
    frame_time: Option<Duration>,
    deadline: Instant,
}

impl Pacer {
    pub fn new(speed: f64) -> Self {
        Self {
            frame_time: frame_duration(speed),
            deadline: Instant::now(),
        }
    }

    /// Restart the schedule from now (after a pause).
    pub fn reset(&mut self) {
        self.deadline = Instant::now();
    }

    /// Sleep until the next frame is due.
    pub fn wait(&mut self) {
        let Some(frame_time) = self.frame_time else {
            return;
        };
        self.deadline += frame_time;
        let now = Instant::now();
        if self.deadline > now {
            thread::sleep(self.deadline - now);
        } else if now - self.deadline > frame_time * MAX_LAG_FRAMES {
            self.deadline = now;
        }
    }
}
