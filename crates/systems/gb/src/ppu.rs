//! Game Boy PPU (LCD Controller) implementation
//!
//! # Scanline state machine
//!
//! Each visible line (0-143) runs through three modes, timed in machine
//! cycles from the start of the line:
//!
//! ```text
//!   0 ..  20   Mode 2  OAM search     (up to 10 sprites, OAM order)
//!  20 ..  63   Mode 3  pixel transfer (line rendered on entry)
//!  63 .. 114   Mode 0  H-Blank
//! ```
//!
//! Lines 144-153 are Mode 1 (V-Blank); the V-Blank interrupt fires and the
//! frame is marked ready when line 144 begins. 154 lines x 114 cycles make
//! one 17556-cycle frame.
//!
//! # Line rendering
//!
//! Background, window and sprites are drawn in that order into a per-line
//! buffer of [`LinePixel`]s that remember where each pixel came from. Priority
//! between sprites and the background is resolved in the buffer, and only then
//! are colours looked up and written into the frame.
//!
//! # STAT interrupt
//!
//! The STAT line is the OR of the enabled sources (LY=LYC, Mode 2, Mode 1,
//! Mode 0). The interrupt is requested only on its rising edge.
//!
//! # Registers
//!
//! - `$FF40 (LCDC)`: LCD control
//! - `$FF41 (STAT)`: LCD status (bits 3-6 writable)
//! - `$FF42 (SCY)` / `$FF43 (SCX)`: background scroll
//! - `$FF44 (LY)`: current line (read-only)
//! - `$FF45 (LYC)`: LY compare
//! - `$FF47 (BGP)` / `$FF48 (OBP0)` / `$FF49 (OBP1)`: DMG palettes
//! - `$FF4A (WY)` / `$FF4B (WX)`: window position
//! - `$FF4F (VBK)`: CGB VRAM bank
//! - `$FF68-$FF6B`: CGB colour palettes
//! - `$FF6C (OPRI)`: CGB object priority mode

use dotmatrix_core::logging::{log, LogCategory, LogLevel};
use dotmatrix_core::types::Frame;
use serde::{Deserialize, Serialize};

use crate::interrupts::Interrupt;
use crate::palette::{dmg_color, ColorRam, DMG_SHADES};

pub const SCREEN_WIDTH: usize = 160;
pub const SCREEN_HEIGHT: usize = 144;

const OAM_SEARCH_END: u32 = 20;
const TRANSFER_END: u32 = 63;
const LINE_CYCLES: u32 = 114;
const LINES_PER_FRAME: u8 = 154;
pub const FRAME_CYCLES: u32 = LINE_CYCLES * LINES_PER_FRAME as u32;

const MAX_SPRITES_PER_LINE: usize = 10;

// LCDC bits
const LCDC_ENABLE: u8 = 0x80;
const LCDC_WIN_TILEMAP: u8 = 0x40;
const LCDC_WIN_ENABLE: u8 = 0x20;
const LCDC_BG_WIN_TILES: u8 = 0x10;
const LCDC_BG_TILEMAP: u8 = 0x08;
const LCDC_OBJ_SIZE: u8 = 0x04;
const LCDC_OBJ_ENABLE: u8 = 0x02;
const LCDC_BG_WIN_ENABLE: u8 = 0x01;

// OAM attribute bits
const ATTR_BEHIND_BG: u8 = 0x80;
const ATTR_Y_FLIP: u8 = 0x40;
const ATTR_X_FLIP: u8 = 0x20;
const ATTR_DMG_PALETTE: u8 = 0x10;
const ATTR_CGB_BANK: u8 = 0x08;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    HBlank = 0,
    VBlank = 1,
    OamSearch = 2,
    Transfer = 3,
}

/// Which layer produced a line pixel. Sprite0/Sprite1 name the DMG object palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelSource {
    #[default]
    Background,
    Window,
    Sprite0,
    Sprite1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinePixel {
    /// 2-bit colour index before palette lookup
    pub color: u8,
    pub source: PixelSource,
    /// CGB palette number (0-7)
    pub palette: u8,
    /// CGB background attribute priority bit
    pub bg_priority: bool,
    /// Index into the line's visible sprite list
    pub sprite_slot: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sprite {
    pub y: u8,
    pub x: u8,
    pub tile: u8,
    pub flags: u8,
    pub oam_index: u8,
}

/// What happened during one PPU machine cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PpuEvents {
    /// Interrupt request mask (V-Blank and/or STAT)
    pub interrupts: u8,
    pub hblank_started: bool,
    pub frame_ready: bool,
}

fn blank_line() -> [LinePixel; SCREEN_WIDTH] {
    [LinePixel::default(); SCREEN_WIDTH]
}

fn blank_frame() -> Frame {
    let mut frame = Frame::new(SCREEN_WIDTH as u32, SCREEN_HEIGHT as u32);
    frame.pixels.fill(DMG_SHADES[0]);
    frame
}

/// Game Boy PPU state. Save states leave out the line and frame buffers;
/// they refill as the display runs.
#[derive(Serialize, Deserialize)]
pub struct Ppu {
    /// Two 8 KiB banks; bank 1 is only reachable on CGB
    vram: Vec<u8>,
    vram_bank: u8,
    #[serde(with = "crate::serde_arrays")]
    oam: [u8; 0xA0],

    pub lcdc: u8,
    /// Writable bits 3-6 only
    stat: u8,
    pub scy: u8,
    pub scx: u8,
    ly: u8,
    pub lyc: u8,
    pub bgp: u8,
    pub obp0: u8,
    pub obp1: u8,
    pub wy: u8,
    pub wx: u8,
    /// OPRI bit 0: 1 = DMG-style X priority on CGB
    opri: u8,

    bg_palettes: ColorRam,
    obj_palettes: ColorRam,

    mode: Mode,
    line_cycles: u32,
    /// Window rows drawn so far this frame
    window_line: u8,
    stat_line: bool,
    lcd_off_cycles: u32,

    sprites: Vec<Sprite>,
    #[serde(skip, default = "blank_line")]
    line: [LinePixel; SCREEN_WIDTH],
    #[serde(skip, default = "blank_frame")]
    frame: Frame,
    cgb: bool,
}

impl Ppu {
    /// Power-on state with the LCD off, as the boot ROM finds it.
    pub fn new(cgb: bool) -> Self {
        Self {
            vram: vec![0; 0x4000],
            vram_bank: 0,
            oam: [0; 0xA0],
            lcdc: 0,
            stat: 0,
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            bgp: 0,
            obp0: 0,
            obp1: 0,
            wy: 0,
            wx: 0,
            opri: if cgb { 0 } else { 1 },
            bg_palettes: ColorRam::new(),
            obj_palettes: ColorRam::new(),
            mode: Mode::HBlank,
            line_cycles: 0,
            window_line: 0,
            stat_line: false,
            lcd_off_cycles: 0,
            sprites: Vec::with_capacity(MAX_SPRITES_PER_LINE),
            line: blank_line(),
            frame: blank_frame(),
            cgb,
        }
    }

    /// Register state the boot ROM leaves behind: LCD on, at the top of line 0.
    pub fn apply_post_boot(&mut self) {
        self.lcdc = 0x91;
        self.bgp = 0xFC;
        self.obp0 = 0xFF;
        self.obp1 = 0xFF;
        self.start_display();
    }

    fn start_display(&mut self) {
        self.ly = 0;
        self.line_cycles = 0;
        self.window_line = 0;
        self.lcd_off_cycles = 0;
        self.mode = Mode::OamSearch;
        self.search_oam();
        self.stat_line = self.stat_signal();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn ly(&self) -> u8 {
        self.ly
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn line_buffer(&self) -> &[LinePixel; SCREEN_WIDTH] {
        &self.line
    }

    pub fn visible_sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    fn lcd_enabled(&self) -> bool {
        self.lcdc & LCDC_ENABLE != 0
    }

    /// Read from VRAM (0x8000-0x9FFF) in the selected bank
    pub fn read_vram(&self, addr: u16) -> u8 {
        self.vram[self.vram_bank as usize * 0x2000 + (addr & 0x1FFF) as usize]
    }

    /// Write to VRAM (0x8000-0x9FFF) in the selected bank
    pub fn write_vram(&mut self, addr: u16, val: u8) {
        self.vram[self.vram_bank as usize * 0x2000 + (addr & 0x1FFF) as usize] = val;
    }

    /// Read from OAM (0xFE00-0xFE9F)
    pub fn read_oam(&self, addr: u16) -> u8 {
        self.oam[(addr & 0xFF) as usize % 0xA0]
    }

    /// Write to OAM (0xFE00-0xFE9F)
    pub fn write_oam(&mut self, addr: u16, val: u8) {
        self.oam[(addr & 0xFF) as usize % 0xA0] = val;
    }

    pub fn read_register(&self, addr: u16) -> u8 {
        match addr {
            0xFF40 => self.lcdc,
            0xFF41 => {
                let coincidence = ((self.ly == self.lyc) as u8) << 2;
                let mode = if self.lcd_enabled() { self.mode as u8 } else { 0 };
                0x80 | self.stat | coincidence | mode
            }
            0xFF42 => self.scy,
            0xFF43 => self.scx,
            0xFF44 => self.ly,
            0xFF45 => self.lyc,
            0xFF47 => self.bgp,
            0xFF48 => self.obp0,
            0xFF49 => self.obp1,
            0xFF4A => self.wy,
            0xFF4B => self.wx,
            0xFF4F if self.cgb => 0xFE | self.vram_bank,
            0xFF68 if self.cgb => self.bg_palettes.read_spec(),
            0xFF69 if self.cgb => self.bg_palettes.read_data(),
            0xFF6A if self.cgb => self.obj_palettes.read_spec(),
            0xFF6B if self.cgb => self.obj_palettes.read_data(),
            0xFF6C if self.cgb => 0xFE | self.opri,
            _ => 0xFF,
        }
    }

    pub fn write_register(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF40 => self.write_lcdc(val),
            0xFF41 => self.stat = val & 0x78,
            0xFF42 => self.scy = val,
            0xFF43 => self.scx = val,
            0xFF44 => {}
            0xFF45 => self.lyc = val,
            0xFF47 => self.bgp = val,
            0xFF48 => self.obp0 = val,
            0xFF49 => self.obp1 = val,
            0xFF4A => self.wy = val,
            0xFF4B => self.wx = val,
            0xFF4F if self.cgb => self.vram_bank = val & 0x01,
            0xFF68 if self.cgb => self.bg_palettes.write_spec(val),
            0xFF69 if self.cgb => self.bg_palettes.write_data(val),
            0xFF6A if self.cgb => self.obj_palettes.write_spec(val),
            0xFF6B if self.cgb => self.obj_palettes.write_data(val),
            0xFF6C if self.cgb => self.opri = val & 0x01,
            _ => {}
        }
    }

    fn write_lcdc(&mut self, val: u8) {
        let was_on = self.lcd_enabled();
        self.lcdc = val;
        match (was_on, self.lcd_enabled()) {
            (true, false) => {
                log(LogCategory::PPU, LogLevel::Debug, || {
                    format!("LCD off at LY={}", self.ly)
                });
                self.ly = 0;
                self.line_cycles = 0;
                self.lcd_off_cycles = 0;
                self.mode = Mode::HBlank;
                self.stat_line = false;
            }
            (false, true) => {
                log(LogCategory::PPU, LogLevel::Debug, || "LCD on".to_string());
                self.start_display();
            }
            _ => {}
        }
    }

    fn stat_signal(&self) -> bool {
        let coincidence = self.stat & 0x40 != 0 && self.ly == self.lyc;
        let mode = match self.mode {
            Mode::HBlank => self.stat & 0x08 != 0,
            Mode::VBlank => self.stat & 0x10 != 0,
            Mode::OamSearch => self.stat & 0x20 != 0,
            Mode::Transfer => false,
        };
        coincidence || mode
    }

    /// Advance one machine cycle.
    pub fn step(&mut self) -> PpuEvents {
        let mut events = PpuEvents::default();

        if !self.lcd_enabled() {
            self.lcd_off_cycles += 1;
            if self.lcd_off_cycles >= FRAME_CYCLES {
                self.lcd_off_cycles = 0;
                self.frame.pixels.fill(DMG_SHADES[0]);
                events.frame_ready = true;
            }
            return events;
        }

        self.line_cycles += 1;
        match self.mode {
            Mode::OamSearch if self.line_cycles >= OAM_SEARCH_END => {
                self.mode = Mode::Transfer;
                self.render_line();
            }
            Mode::Transfer if self.line_cycles >= TRANSFER_END => {
                self.mode = Mode::HBlank;
                events.hblank_started = true;
            }
            Mode::HBlank | Mode::VBlank if self.line_cycles >= LINE_CYCLES => {
                self.line_cycles = 0;
                self.ly += 1;
                if self.ly == SCREEN_HEIGHT as u8 {
                    self.mode = Mode::VBlank;
                    events.interrupts |= Interrupt::VBlank.mask();
                    events.frame_ready = true;
                } else if self.ly >= LINES_PER_FRAME {
                    self.ly = 0;
                    self.window_line = 0;
                    self.mode = Mode::OamSearch;
                    self.search_oam();
                } else if self.ly < SCREEN_HEIGHT as u8 {
                    self.mode = Mode::OamSearch;
                    self.search_oam();
                }
            }
            _ => {}
        }

        let signal = self.stat_signal();
        if signal && !self.stat_line {
            events.interrupts |= Interrupt::LcdStat.mask();
        }
        self.stat_line = signal;

        events
    }

    fn sprite_height(&self) -> i16 {
        if self.lcdc & LCDC_OBJ_SIZE != 0 {
            16
        } else {
            8
        }
    }

    /// Select up to 10 sprites overlapping the current line, in OAM order.
    fn search_oam(&mut self) {
        self.sprites.clear();
        let height = self.sprite_height();
        let ly = self.ly as i16;
        for index in 0..40u8 {
            let base = index as usize * 4;
            let top = self.oam[base] as i16 - 16;
            if ly >= top && ly < top + height {
                self.sprites.push(Sprite {
                    y: self.oam[base],
                    x: self.oam[base + 1],
                    tile: self.oam[base + 2],
                    flags: self.oam[base + 3],
                    oam_index: index,
                });
                if self.sprites.len() == MAX_SPRITES_PER_LINE {
                    break;
                }
            }
        }
    }

    /// Two bitplane bytes of one tile row.
    fn tile_row(&self, bank: usize, tile: u8, row: u8, signed_index: bool) -> (u8, u8) {
        let offset = if signed_index {
            (0x1000 + (tile as i8 as i32) * 16) as usize
        } else {
            tile as usize * 16
        };
        let addr = bank * 0x2000 + offset + row as usize * 2;
        (self.vram[addr], self.vram[addr + 1])
    }

    fn pixel_from_row(row: (u8, u8), bit: u8) -> u8 {
        (((row.1 >> bit) & 1) << 1) | ((row.0 >> bit) & 1)
    }

    /// Fetch one background or window pixel from a 32x32 tile map.
    fn map_pixel(&self, map_base: usize, x: u8, y: u8, source: PixelSource) -> LinePixel {
        let map_addr = map_base + (y as usize / 8) * 32 + x as usize / 8;
        let tile = self.vram[map_addr];
        let attrs = if self.cgb { self.vram[0x2000 + map_addr] } else { 0 };

        let mut row = y % 8;
        if attrs & ATTR_Y_FLIP != 0 {
            row = 7 - row;
        }
        let bit = if attrs & ATTR_X_FLIP != 0 {
            x % 8
        } else {
            7 - x % 8
        };
        let bank = ((attrs & ATTR_CGB_BANK) >> 3) as usize;
        let signed_index = self.lcdc & LCDC_BG_WIN_TILES == 0;
        let data = self.tile_row(bank, tile, row, signed_index);

        LinePixel {
            color: Self::pixel_from_row(data, bit),
            source,
            palette: attrs & 0x07,
            bg_priority: attrs & 0x80 != 0,
            sprite_slot: None,
        }
    }

    fn render_line(&mut self) {
        let ly = self.ly;
        let mut line = [LinePixel::default(); SCREEN_WIDTH];

        // On DMG bit 0 blanks background and window; on CGB it only drops their priority.
        let bg_visible = self.cgb || self.lcdc & LCDC_BG_WIN_ENABLE != 0;

        if bg_visible {
            let map_base = if self.lcdc & LCDC_BG_TILEMAP != 0 {
                0x1C00
            } else {
                0x1800
            };
            let y = ly.wrapping_add(self.scy);
            for (x, pixel) in line.iter_mut().enumerate() {
                let px = (x as u8).wrapping_add(self.scx);
                *pixel = self.map_pixel(map_base, px, y, PixelSource::Background);
            }
        }

        let window_visible = bg_visible
            && self.lcdc & LCDC_WIN_ENABLE != 0
            && ly >= self.wy
            && self.wx <= 166;
        if window_visible {
            let map_base = if self.lcdc & LCDC_WIN_TILEMAP != 0 {
                0x1C00
            } else {
                0x1800
            };
            let start = self.wx as i16 - 7;
            let y = self.window_line;
            for (x, pixel) in line.iter_mut().enumerate() {
                let wx = x as i16 - start;
                if wx >= 0 {
                    *pixel = self.map_pixel(map_base, wx as u8, y, PixelSource::Window);
                }
            }
            self.window_line = self.window_line.wrapping_add(1);
        }

        if self.lcdc & LCDC_OBJ_ENABLE != 0 {
            self.render_sprites(&mut line);
        }

        self.line = line;
        self.commit_line();
    }

    fn render_sprites(&self, line: &mut [LinePixel; SCREEN_WIDTH]) {
        let height = self.sprite_height();
        let ly = self.ly as i16;

        let mut order: Vec<usize> = (0..self.sprites.len()).collect();
        if !self.cgb || self.opri & 0x01 != 0 {
            // Lower X wins, then lower OAM index.
            order.sort_by_key(|&slot| (self.sprites[slot].x, self.sprites[slot].oam_index));
        }

        let master_priority = !self.cgb || self.lcdc & LCDC_BG_WIN_ENABLE != 0;
        let mut claimed = [false; SCREEN_WIDTH];

        for slot in order {
            let sprite = self.sprites[slot];
            let mut row = (ly - (sprite.y as i16 - 16)) as u8;
            if sprite.flags & ATTR_Y_FLIP != 0 {
                row = (height as u8 - 1) - row;
            }
            let tile = if height == 16 {
                sprite.tile & 0xFE
            } else {
                sprite.tile
            };
            let bank = if self.cgb {
                ((sprite.flags & ATTR_CGB_BANK) >> 3) as usize
            } else {
                0
            };
            let data = self.tile_row(bank, tile, row, false);

            for col in 0..8u8 {
                let x = sprite.x as i16 - 8 + col as i16;
                if !(0..SCREEN_WIDTH as i16).contains(&x) {
                    continue;
                }
                let x = x as usize;
                if claimed[x] {
                    continue;
                }
                let bit = if sprite.flags & ATTR_X_FLIP != 0 {
                    col
                } else {
                    7 - col
                };
                let color = Self::pixel_from_row(data, bit);
                if color == 0 {
                    continue;
                }
                claimed[x] = true;

                let under = line[x];
                let bg_wins = master_priority
                    && under.color != 0
                    && (sprite.flags & ATTR_BEHIND_BG != 0 || (self.cgb && under.bg_priority));
                if bg_wins {
                    continue;
                }

                line[x] = LinePixel {
                    color,
                    source: if sprite.flags & ATTR_DMG_PALETTE != 0 {
                        PixelSource::Sprite1
                    } else {
                        PixelSource::Sprite0
                    },
                    palette: sprite.flags & 0x07,
                    bg_priority: false,
                    sprite_slot: Some(slot as u8),
                };
            }
        }
    }

    /// Resolve the line buffer to colours and write it into the frame.
    fn commit_line(&mut self) {
        let row = self.ly as usize * SCREEN_WIDTH;
        let bg_enabled = self.lcdc & LCDC_BG_WIN_ENABLE != 0;
        for (x, pixel) in self.line.iter().enumerate() {
            let argb = if self.cgb {
                match pixel.source {
                    PixelSource::Background | PixelSource::Window => {
                        self.bg_palettes.color(pixel.palette, pixel.color)
                    }
                    PixelSource::Sprite0 | PixelSource::Sprite1 => {
                        self.obj_palettes.color(pixel.palette, pixel.color)
                    }
                }
            } else {
                match pixel.source {
                    PixelSource::Background | PixelSource::Window if !bg_enabled => DMG_SHADES[0],
                    PixelSource::Background | PixelSource::Window => dmg_color(self.bgp, pixel.color),
                    PixelSource::Sprite0 => dmg_color(self.obp0, pixel.color),
                    PixelSource::Sprite1 => dmg_color(self.obp1, pixel.color),
                }
            };
            self.frame.pixels[row + x] = argb;
        }
    }
}
