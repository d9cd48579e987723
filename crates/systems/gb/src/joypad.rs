//! Joypad (`$FF00`, P1)
//!
//! ```text
//! Bit 5: select action buttons (0 = selected)
//! Bit 4: select direction pad (0 = selected)
//! Bits 3-0: input lines, 0 = pressed
//!   directions: Down Up Left Right
//!   actions:    Start Select B A
//! ```
//!
//! The joypad interrupt fires when any visible input line goes from 1 to 0,
//! whether because a button was pressed or because the selection changed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    /// Bit in the pressed mask: directions in 0-3, actions in 4-7.
    fn bit(self) -> u8 {
        match self {
            Button::Right => 0,
            Button::Left => 1,
            Button::Up => 2,
            Button::Down => 3,
            Button::A => 4,
            Button::B => 5,
            Button::Select => 6,
            Button::Start => 7,
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "right" => Some(Button::Right),
            "left" => Some(Button::Left),
            "up" => Some(Button::Up),
            "down" => Some(Button::Down),
            "a" => Some(Button::A),
            "b" => Some(Button::B),
            "select" => Some(Button::Select),
            "start" => Some(Button::Start),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Joypad {
    /// 1 = pressed
    pressed: u8,
    /// P1 bits 4-5 as last written
    select: u8,
    /// Interrupt raised since last poll
    interrupt: bool,
}

impl Joypad {
    pub fn new() -> Self {
        Self {
            pressed: 0,
            select: 0x30,
            interrupt: false,
        }
    }

    /// Active-low input lines for the current selection.
    fn lines(&self) -> u8 {
        let mut lines = 0x0F;
        if self.select & 0x10 == 0 {
            lines &= !self.pressed & 0x0F;
        }
        if self.select & 0x20 == 0 {
            lines &= !(self.pressed >> 4) & 0x0F;
        }
        lines
    }

    fn update<F: FnOnce(&mut Self)>(&mut self, change: F) {
        let before = self.lines();
        change(self);
        if before & !self.lines() != 0 {
            self.interrupt = true;
        }
    }

    pub fn press(&mut self, button: Button) {
        self.update(|pad| pad.pressed |= 1 << button.bit());
    }

    pub fn release(&mut self, button: Button) {
        self.update(|pad| pad.pressed &= !(1 << button.bit()));
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.pressed & (1 << button.bit()) != 0
    }

    pub fn any_pressed(&self) -> bool {
        self.pressed != 0
    }

    pub fn read(&self) -> u8 {
        0xC0 | self.select | self.lines()
    }

    pub fn write(&mut self, val: u8) {
        self.update(|pad| pad.select = val & 0x30);
    }

    /// Take the pending interrupt request, if any.
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.interrupt)
    }
}
