//! Game Boy memory bus
//!
//! Owns every device behind the CPU and decodes the 16-bit address space.
//! Each CPU read, write or internal cycle costs one machine cycle, during
//! which the timer, serial port and PPU are stepped and their interrupt
//! requests collected.
//!
//! # Memory Map
//!
//! ```text
//! $0000-$00FF  Boot ROM overlay (until $FF50 is written)
//! $0200-$08FF  CGB boot ROM overlay
//! $0000-$3FFF  ROM bank 0
//! $4000-$7FFF  ROM bank 1-N (MBC)
//! $8000-$9FFF  VRAM (CGB: 2 banks, VBK)
//! $A000-$BFFF  External RAM (MBC, gated by its enable register)
//! $C000-$CFFF  WRAM bank 0
//! $D000-$DFFF  WRAM bank 1 (CGB: 1-7, SVBK)
//! $E000-$FDFF  Echo of $C000-$DDFF
//! $FE00-$FE9F  OAM
//! $FEA0-$FEFF  Not usable (reads 0xFF)
//! $FF00-$FF7F  I/O registers
//! $FF80-$FFFE  HRAM
//! $FFFF        IE
//! ```
//!
//! # DMA
//!
//! - `$FF46`: OAM DMA, copies 160 bytes from `XX00` at once.
//! - `$FF51-$FF55` (CGB): VRAM DMA. Bit 7 of the FF55 write picks general
//!   purpose (whole block now) or H-Blank mode (16 bytes per H-Blank).
//!   FF55 reads the blocks left minus one while active and 0xFF when idle.
//!
//! # Speed switch
//!
//! `$FF4D KEY1` bit 0 arms a switch that the next STOP performs. In double
//! speed the PPU advances on every other machine cycle.

use dotmatrix_core::cpu_lr35902::BusLr35902;
use dotmatrix_core::logging::{log, LogCategory, LogLevel};
use serde::{Deserialize, Serialize};

use crate::boot::BootRom;
use crate::cartridge::Cartridge;
use crate::interrupts::{Interrupt, InterruptController};
use crate::joypad::Joypad;
use crate::ppu::Ppu;
use crate::serial::Serial;
use crate::timer::Timer;

const WRAM_BANK_SIZE: usize = 0x1000;

/// Bits that always read as 1 in FF10-FF3F. Writes are stored as-is.
const AUDIO_READ_MASK: [u8; 0x30] = [
    0x80, 0x3F, 0x00, 0xFF, 0xBF, // NR10-NR14
    0xFF, 0x3F, 0x00, 0xFF, 0xBF, // unused, NR21-NR24
    0x7F, 0xFF, 0x9F, 0xFF, 0xBF, // NR30-NR34
    0xFF, 0xFF, 0x00, 0x00, 0xBF, // unused, NR41-NR44
    0x00, 0x00, 0x70, // NR50-NR52
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // unused
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // wave RAM
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// FF10-FF26 as the boot ROM leaves them.
const AUDIO_POST_BOOT: [(u16, u8); 15] = [
    (0xFF10, 0x80),
    (0xFF11, 0xBF),
    (0xFF12, 0xF3),
    (0xFF14, 0xBF),
    (0xFF16, 0x3F),
    (0xFF19, 0xBF),
    (0xFF1A, 0x7F),
    (0xFF1B, 0xFF),
    (0xFF1C, 0x9F),
    (0xFF1E, 0xBF),
    (0xFF20, 0xFF),
    (0xFF23, 0xBF),
    (0xFF24, 0x77),
    (0xFF25, 0xF3),
    (0xFF26, 0xF1),
];

/// CGB VRAM DMA state (FF51-FF55)
#[derive(Debug, Default, Serialize, Deserialize)]
struct Hdma {
    source: u16,
    dest: u16,
    /// 16-byte blocks still to copy in H-Blank mode
    blocks_left: u8,
    active: bool,
    /// FF55 readback when no transfer is running
    idle_status: u8,
}

impl Hdma {
    fn new() -> Self {
        Self {
            idle_status: 0xFF,
            ..Self::default()
        }
    }

    fn status(&self) -> u8 {
        if self.active {
            self.blocks_left.wrapping_sub(1) & 0x7F
        } else {
            self.idle_status
        }
    }
}

/// Save states carry everything here except the mounted media; the
/// cartridge controller is stored separately and the boot ROM is only
/// recorded as enabled or not.
#[derive(Serialize, Deserialize)]
pub struct GbBus {
    cgb: bool,
    double_speed: bool,
    speed_armed: bool,
    /// Odd machine cycle in double speed (PPU idles)
    half_cycle: bool,
    wram: Vec<u8>,
    /// Bank mapped at D000-DFFF, 1-7
    wram_bank: u8,
    #[serde(with = "crate::serde_arrays")]
    hram: [u8; 0x7F],
    #[serde(with = "crate::serde_arrays")]
    audio: [u8; 0x30],
    dma: u8,
    hdma: Hdma,
    frame_ready: bool,
    pub interrupts: InterruptController,
    #[serde(skip)]
    pub cartridge: Option<Cartridge>,
    #[serde(skip)]
    pub boot: Option<BootRom>,
    pub ppu: Ppu,
    pub timer: Timer,
    pub joypad: Joypad,
    pub serial: Serial,
}

impl GbBus {
    pub fn new(cgb: bool, cartridge: Option<Cartridge>, boot: Option<BootRom>) -> Self {
        Self {
            cgb,
            double_speed: false,
            speed_armed: false,
            half_cycle: false,
            wram: vec![0; WRAM_BANK_SIZE * 8],
            wram_bank: 1,
            hram: [0; 0x7F],
            audio: [0; 0x30],
            dma: 0xFF,
            hdma: Hdma::new(),
            frame_ready: false,
            interrupts: InterruptController::new(),
            cartridge,
            boot,
            ppu: Ppu::new(cgb),
            timer: Timer::new(),
            joypad: Joypad::new(),
            serial: Serial::new(cgb),
        }
    }

    /// Register state the boot ROM leaves behind, for starts without one.
    pub fn apply_post_boot(&mut self) {
        self.ppu.apply_post_boot();
        self.timer = Timer::with_counter(if self.cgb { 0x1EA0 } else { 0xABCC });
        self.interrupts.flags = Interrupt::VBlank.mask();
        for &(addr, val) in &AUDIO_POST_BOOT {
            self.audio[(addr - 0xFF10) as usize] = val;
        }
        if let Some(boot) = &mut self.boot {
            boot.write_disable(1);
        }
    }

    pub fn is_cgb(&self) -> bool {
        self.cgb
    }

    /// Whether the PPU has finished a frame since the last call.
    pub fn take_frame_ready(&mut self) -> bool {
        std::mem::take(&mut self.frame_ready)
    }

    fn wram_index(&self, addr: u16) -> usize {
        let offset = (addr & 0x0FFF) as usize;
        if addr & 0x1000 == 0 {
            offset
        } else {
            self.wram_bank as usize * WRAM_BANK_SIZE + offset
        }
    }

    /// Read without spending a machine cycle (DMA, debugging).
    pub fn peek(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x7FFF => {
                if let Some(val) = self.boot.as_ref().and_then(|b| b.read(addr)) {
                    return val;
                }
                self.cartridge
                    .as_ref()
                    .map_or(0xFF, |c| c.mapper.read_rom(addr))
            }
            0x8000..=0x9FFF => self.ppu.read_vram(addr),
            0xA000..=0xBFFF => self
                .cartridge
                .as_ref()
                .map_or(0xFF, |c| c.mapper.read_ram(addr)),
            0xC000..=0xDFFF => self.wram[self.wram_index(addr)],
            0xE000..=0xFDFF => self.wram[self.wram_index(addr - 0x2000)],
            0xFE00..=0xFE9F => self.ppu.read_oam(addr),
            0xFEA0..=0xFEFF => 0xFF,
            0xFF00..=0xFF7F => self.read_io(addr),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize],
            0xFFFF => self.interrupts.enable,
        }
    }

    /// Write without spending a machine cycle.
    pub fn poke(&mut self, addr: u16, val: u8) {
        match addr {
            0x0000..=0x7FFF => {
                if let Some(cart) = &mut self.cartridge {
                    cart.mapper.write_rom(addr, val);
                }
            }
            0x8000..=0x9FFF => self.ppu.write_vram(addr, val),
            0xA000..=0xBFFF => {
                if let Some(cart) = &mut self.cartridge {
                    cart.mapper.write_ram(addr, val);
                }
            }
            0xC000..=0xDFFF => {
                let i = self.wram_index(addr);
                self.wram[i] = val;
            }
            0xE000..=0xFDFF => {
                let i = self.wram_index(addr - 0x2000);
                self.wram[i] = val;
            }
            0xFE00..=0xFE9F => self.ppu.write_oam(addr, val),
            0xFEA0..=0xFEFF => {}
            0xFF00..=0xFF7F => self.write_io(addr, val),
            0xFF80..=0xFFFE => self.hram[(addr - 0xFF80) as usize] = val,
            0xFFFF => self.interrupts.enable = val,
        }
    }

    fn read_io(&self, addr: u16) -> u8 {
        match addr {
            0xFF00 => self.joypad.read(),
            0xFF01 | 0xFF02 => self.serial.read_register(addr),
            0xFF04..=0xFF07 => self.timer.read_register(addr),
            0xFF0F => self.interrupts.read_if(),
            0xFF10..=0xFF3F => {
                let i = (addr - 0xFF10) as usize;
                self.audio[i] | AUDIO_READ_MASK[i]
            }
            0xFF46 => self.dma,
            0xFF40..=0xFF4B => self.ppu.read_register(addr),
            0xFF4D if self.cgb => {
                0x7E | ((self.double_speed as u8) << 7) | self.speed_armed as u8
            }
            0xFF4F => self.ppu.read_register(addr),
            0xFF55 if self.cgb => self.hdma.status(),
            0xFF68..=0xFF6C => self.ppu.read_register(addr),
            0xFF70 if self.cgb => 0xF8 | self.wram_bank,
            _ => 0xFF,
        }
    }

    fn write_io(&mut self, addr: u16, val: u8) {
        match addr {
            0xFF00 => self.joypad.write(val),
            0xFF01 | 0xFF02 => self.serial.write_register(addr, val),
            0xFF04..=0xFF07 => self.timer.write_register(addr, val),
            0xFF0F => self.interrupts.write_if(val),
            0xFF26 => self.audio[0x16] = val & 0x80,
            0xFF10..=0xFF3F => self.audio[(addr - 0xFF10) as usize] = val,
            0xFF46 => self.oam_dma(val),
            0xFF40..=0xFF4B => self.ppu.write_register(addr, val),
            0xFF4D if self.cgb => self.speed_armed = val & 0x01 != 0,
            0xFF4F => self.ppu.write_register(addr, val),
            0xFF50 => {
                if let Some(boot) = &mut self.boot {
                    boot.write_disable(val);
                    if !boot.enabled() {
                        log(LogCategory::Bus, LogLevel::Info, || {
                            "boot ROM unmapped".to_string()
                        });
                    }
                }
            }
            0xFF51 if self.cgb => self.hdma.source = (self.hdma.source & 0x00FF) | (val as u16) << 8,
            0xFF52 if self.cgb => self.hdma.source = (self.hdma.source & 0xFF00) | (val & 0xF0) as u16,
            0xFF53 if self.cgb => {
                self.hdma.dest = (self.hdma.dest & 0x00FF) | ((val & 0x1F) as u16) << 8
            }
            0xFF54 if self.cgb => self.hdma.dest = (self.hdma.dest & 0xFF00) | (val & 0xF0) as u16,
            0xFF55 if self.cgb => self.start_hdma(val),
            0xFF68..=0xFF6C => self.ppu.write_register(addr, val),
            0xFF70 if self.cgb => {
                let bank = val & 0x07;
                self.wram_bank = if bank == 0 { 1 } else { bank };
            }
            _ => {}
        }
    }

    fn oam_dma(&mut self, val: u8) {
        self.dma = val;
        let base = (val as u16) << 8;
        for i in 0..0xA0u16 {
            let byte = self.peek(base.wrapping_add(i));
            self.ppu.write_oam(0xFE00 + i, byte);
        }
    }

    fn start_hdma(&mut self, val: u8) {
        let blocks = (val & 0x7F) + 1;
        if self.hdma.active && val & 0x80 == 0 {
            // Writing bit 7 = 0 during an H-Blank transfer stops it.
            self.hdma.active = false;
            self.hdma.idle_status = 0x80 | self.hdma.blocks_left.wrapping_sub(1);
            return;
        }
        if val & 0x80 == 0 {
            log(LogCategory::Bus, LogLevel::Trace, || {
                format!(
                    "GDMA {:04X} -> {:04X}, {} bytes",
                    self.hdma.source,
                    0x8000 | self.hdma.dest,
                    blocks as u16 * 16
                )
            });
            for _ in 0..blocks {
                self.hdma_block();
            }
            self.hdma.idle_status = 0xFF;
        } else {
            self.hdma.blocks_left = blocks;
            self.hdma.active = true;
        }
    }

    fn hdma_block(&mut self) {
        for _ in 0..16 {
            let byte = self.peek(self.hdma.source);
            self.ppu.write_vram(0x8000 | (self.hdma.dest & 0x1FFF), byte);
            self.hdma.source = self.hdma.source.wrapping_add(1);
            self.hdma.dest = (self.hdma.dest + 1) & 0x1FFF;
        }
    }

    fn hblank_dma(&mut self) {
        if !self.hdma.active {
            return;
        }
        self.hdma_block();
        self.hdma.blocks_left -= 1;
        if self.hdma.blocks_left == 0 {
            self.hdma.active = false;
            self.hdma.idle_status = 0xFF;
        }
    }

    /// Advance every device by one machine cycle.
    fn step_devices(&mut self) {
        if self.timer.step() {
            self.interrupts.request(Interrupt::Timer);
        }
        if self.serial.step() {
            self.interrupts.request(Interrupt::Serial);
        }
        if self.joypad.take_interrupt() {
            self.interrupts.request(Interrupt::Joypad);
        }

        if self.double_speed {
            self.half_cycle = !self.half_cycle;
            if self.half_cycle {
                return;
            }
        }

        let events = self.ppu.step();
        self.interrupts.request_mask(events.interrupts);
        if events.hblank_started {
            self.hblank_dma();
        }
        if events.frame_ready {
            self.frame_ready = true;
        }
    }
}

impl BusLr35902 for GbBus {
    fn read(&mut self, addr: u16) -> u8 {
        let val = self.peek(addr);
        self.step_devices();
        val
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.poke(addr, val);
        self.step_devices();
    }

    fn tick(&mut self) {
        self.step_devices();
    }

    fn pending_interrupts(&self) -> u8 {
        self.interrupts.pending()
    }

    fn acknowledge_interrupt(&mut self) -> Option<u16> {
        let interrupt = self.interrupts.highest()?;
        self.interrupts.acknowledge(interrupt.mask());
        Some(interrupt.vector())
    }

    fn speed_switch(&mut self) -> bool {
        if !self.cgb || !self.speed_armed {
            return false;
        }
        self.speed_armed = false;
        self.double_speed = !self.double_speed;
        self.half_cycle = false;
        self.timer.reset_divider();
        log(LogCategory::Bus, LogLevel::Info, || {
            format!(
                "speed switch: {} speed",
                if self.double_speed { "double" } else { "normal" }
            )
        });
        true
    }

    fn set_stopped(&mut self, stopped: bool) {
        self.timer.set_stopped(stopped);
    }

    fn wake_from_stop(&self) -> bool {
        self.joypad.any_pressed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joypad::Button;

    fn dmg() -> GbBus {
        GbBus::new(false, None, None)
    }

    fn cgb() -> GbBus {
        GbBus::new(true, None, None)
    }

    #[test]
    fn test_echo_ram_shares_storage() {
        let mut bus = dmg();
        bus.write(0xC123, 0x42);
        assert_eq!(bus.read(0xE123), 0x42);
        bus.write(0xFDFF, 0x24);
        assert_eq!(bus.read(0xDDFF), 0x24);
    }

    #[test]
    fn test_unusable_region() {
        let mut bus = dmg();
        bus.write(0xFEA0, 0x12);
        assert_eq!(bus.read(0xFEA0), 0xFF);
        assert_eq!(bus.read(0xFEFF), 0xFF);
    }

    #[test]
    fn test_no_cartridge_reads_open_bus() {
        let mut bus = dmg();
        assert_eq!(bus.read(0x0100), 0xFF);
        assert_eq!(bus.read(0xA000), 0xFF);
    }

    #[test]
    fn test_unmapped_io_reads_ff() {
        let mut bus = dmg();
        for addr in [0xFF03, 0xFF08, 0xFF4C, 0xFF4D, 0xFF56, 0xFF70, 0xFF7F] {
            assert_eq!(bus.read(addr), 0xFF, "{addr:04X}");
        }
    }

    #[test]
    fn test_if_upper_bits_and_ie() {
        let mut bus = dmg();
        bus.write(0xFF0F, 0x00);
        assert_eq!(bus.read(0xFF0F), 0xE0);
        bus.write(0xFFFF, 0x1F);
        bus.write(0xFF0F, 0x04);
        assert_eq!(bus.pending_interrupts(), 0x04);
        assert_eq!(bus.acknowledge_interrupt(), Some(0x0050));
        assert_eq!(bus.pending_interrupts(), 0);
        assert_eq!(bus.acknowledge_interrupt(), None);
    }

    #[test]
    fn test_acknowledge_takes_highest_priority_first() {
        let mut bus = dmg();
        bus.write(0xFFFF, 0x1F);
        bus.write(0xFF0F, 0x12);
        assert_eq!(bus.acknowledge_interrupt(), Some(0x0048));
        assert_eq!(bus.acknowledge_interrupt(), Some(0x0060));
        assert_eq!(bus.acknowledge_interrupt(), None);
    }

    #[test]
    fn test_audio_register_masks() {
        let mut bus = dmg();
        bus.write(0xFF11, 0x00);
        assert_eq!(bus.read(0xFF11), 0x3F);
        bus.write(0xFF13, 0x12);
        assert_eq!(bus.read(0xFF13), 0xFF);
        bus.write(0xFF30, 0x5A);
        assert_eq!(bus.read(0xFF30), 0x5A);
        bus.write(0xFF26, 0xFF);
        assert_eq!(bus.read(0xFF26), 0xF0);
    }

    #[test]
    fn test_every_access_steps_the_timer() {
        let mut bus = dmg();
        for _ in 0..32 {
            bus.read(0xC000);
        }
        for _ in 0..32 {
            bus.tick();
        }
        assert_eq!(bus.timer.div(), 1);
    }

    #[test]
    fn test_oam_dma() {
        let mut bus = dmg();
        for i in 0..0xA0u16 {
            bus.poke(0xC000 + i, i as u8);
        }
        bus.write(0xFF46, 0xC0);
        assert_eq!(bus.read(0xFF46), 0xC0);
        assert_eq!(bus.ppu.read_oam(0xFE00), 0x00);
        assert_eq!(bus.ppu.read_oam(0xFE9F), 0x9F);
    }

    #[test]
    fn test_wram_banking() {
        let mut bus = cgb();
        bus.write(0xFF70, 0x03);
        bus.write(0xD000, 0x33);
        bus.write(0xFF70, 0x00);
        assert_eq!(bus.read(0xFF70), 0xF9);
        assert_eq!(bus.read(0xD000), 0x00);
        bus.write(0xFF70, 0x03);
        assert_eq!(bus.read(0xD000), 0x33);
        // Bank 0 is always at C000.
        bus.write(0xC000, 0x11);
        bus.write(0xFF70, 0x05);
        assert_eq!(bus.read(0xC000), 0x11);
    }

    #[test]
    fn test_dmg_ignores_svbk() {
        let mut bus = dmg();
        bus.write(0xD000, 0x44);
        bus.write(0xFF70, 0x03);
        assert_eq!(bus.read(0xD000), 0x44);
    }

    #[test]
    fn test_joypad_interrupt_on_tick() {
        let mut bus = dmg();
        bus.write(0xFF00, 0x10);
        bus.joypad.press(Button::A);
        assert_eq!(bus.interrupts.flags & Interrupt::Joypad.mask(), 0);
        bus.tick();
        assert_ne!(bus.interrupts.flags & Interrupt::Joypad.mask(), 0);
        assert!(bus.wake_from_stop());
    }

    #[test]
    fn test_speed_switch() {
        let mut bus = cgb();
        assert!(!bus.speed_switch());
        bus.write(0xFF4D, 0x01);
        assert_eq!(bus.read(0xFF4D), 0x7F);
        assert!(bus.speed_switch());
        assert_eq!(bus.read(0xFF4D), 0xFE);
        assert_eq!(bus.timer.div(), 0);

        let mut bus = dmg();
        bus.write(0xFF4D, 0x01);
        assert!(!bus.speed_switch());
    }

    #[test]
    fn test_double_speed_halves_ppu_rate() {
        let mut bus = cgb();
        bus.write(0xFF4D, 0x01);
        bus.speed_switch();
        // LCD on at the top of line 0, after the switch.
        bus.apply_post_boot();
        let before = bus.ppu.ly();
        for _ in 0..(114 * 2 - 1) {
            bus.tick();
        }
        assert_eq!(bus.ppu.ly(), before);
        bus.tick();
        assert_eq!(bus.ppu.ly(), before + 1);
    }

    #[test]
    fn test_general_hdma() {
        let mut bus = cgb();
        for i in 0..0x20u16 {
            bus.poke(0xC000 + i, 0x80 + i as u8);
        }
        bus.write(0xFF51, 0xC0);
        bus.write(0xFF52, 0x00);
        bus.write(0xFF53, 0x01);
        bus.write(0xFF54, 0x00);
        bus.write(0xFF55, 0x01);
        assert_eq!(bus.ppu.read_vram(0x8100), 0x80);
        assert_eq!(bus.ppu.read_vram(0x811F), 0x9F);
        assert_eq!(bus.read(0xFF55), 0xFF);
    }

    #[test]
    fn test_hblank_hdma() {
        let mut bus = cgb();
        bus.apply_post_boot();
        for i in 0..0x30u16 {
            bus.poke(0xC000 + i, i as u8 + 1);
        }
        bus.write(0xFF51, 0xC0);
        bus.write(0xFF52, 0x00);
        bus.write(0xFF53, 0x00);
        bus.write(0xFF54, 0x00);
        bus.write(0xFF55, 0x82);
        assert_eq!(bus.read(0xFF55), 0x02);
        assert_eq!(bus.ppu.read_vram(0x8000), 0);

        // One line: one block.
        for _ in 0..114 {
            bus.tick();
        }
        assert_eq!(bus.ppu.read_vram(0x800F), 0x10);
        assert_eq!(bus.ppu.read_vram(0x8010), 0);
        assert_eq!(bus.read(0xFF55), 0x01);

        for _ in 0..114 * 2 {
            bus.tick();
        }
        assert_eq!(bus.ppu.read_vram(0x802F), 0x30);
        assert_eq!(bus.read(0xFF55), 0xFF);
    }

    #[test]
    fn test_hblank_hdma_cancel() {
        let mut bus = cgb();
        bus.write(0xFF55, 0x85);
        bus.write(0xFF55, 0x00);
        assert_eq!(bus.read(0xFF55), 0x85);
    }

    #[test]
    fn test_boot_overlay_and_disable() {
        let mut data = vec![0u8; 256];
        data[0] = 0x31;
        let boot = BootRom::new(&data).unwrap();
        let mut bus = GbBus::new(false, None, Some(boot));
        assert_eq!(bus.read(0x0000), 0x31);
        bus.write(0xFF50, 0x01);
        assert_eq!(bus.read(0x0000), 0xFF);
    }

    #[test]
    fn test_post_boot_state() {
        let mut bus = dmg();
        bus.apply_post_boot();
        assert_eq!(bus.read(0xFF40), 0x91);
        assert_eq!(bus.read(0xFF47), 0xFC);
        assert_eq!(bus.read(0xFF0F), 0xE1);
        assert_eq!(bus.read(0xFF26), 0xF1);
        assert_eq!(bus.read(0xFF04), 0xAB);
    }

    #[test]
    fn test_stop_freezes_divider() {
        let mut bus = dmg();
        bus.set_stopped(true);
        for _ in 0..256 {
            bus.tick();
        }
        assert_eq!(bus.timer.div(), 0);
        bus.set_stopped(false);
        for _ in 0..64 {
            bus.tick();
        }
        assert_eq!(bus.timer.div(), 1);
    }
}
