//! Game Boy / Game Boy Color system
//!
//! [`GbSystem`] owns the CPU and, through the CPU, the bus with every
//! device. A frame is produced by stepping instructions until the PPU
//! enters V-Blank (or, with the LCD off, until a frame's worth of cycles
//! has elapsed).

use dotmatrix_core::cpu_lr35902::{CpuLr35902, CpuState, Model, Registers};
use dotmatrix_core::logging::{log, LogCategory, LogLevel};
use dotmatrix_core::{types::Frame, MountPointInfo, System};

pub mod battery;
pub mod boot;
pub mod bus;
pub mod cartridge;
pub mod interrupts;
pub mod joypad;
pub mod mappers;
pub mod palette;
pub mod ppu;
pub mod rtc;
pub mod serial;
pub mod timer;

use boot::BootRom;
use bus::GbBus;
use cartridge::{Cartridge, CartridgeHeader};
use mappers::Mapper;
pub use joypad::Button;
pub use rtc::RtcRecord;

/// Fixed-size byte arrays as JSON lists in save states.
mod serde_arrays {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, const N: usize>(arr: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        arr.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let vec = Vec::<u8>::deserialize(deserializer)?;
        let len = vec.len();
        vec.try_into()
            .map_err(|_| D::Error::invalid_length(len, &"a fixed-size byte array"))
    }
}

const CARTRIDGE: &str = "Cartridge";
const STATE_VERSION: u64 = 1;
const BOOT_ROM: &str = "BootROM";

type FrameSink = Box<dyn FnMut(&Frame) + Send>;

#[derive(thiserror::Error, Debug)]
pub enum GbError {
    #[error("No cartridge loaded")]
    NoCartridge,
    #[error("Invalid mount point")]
    InvalidMountPoint,
    #[error("ROM image is too small ({0} bytes)")]
    RomTooSmall(usize),
    #[error("Unsupported cartridge type {code:#04X} ({name})")]
    UnsupportedMapper { code: u8, name: &'static str },
    #[error("Boot ROM must be 256 or 2304 bytes, got {0}")]
    InvalidBootRom(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct GbSystem {
    cpu: CpuLr35902<GbBus>,
    /// Raw image, kept so reset can rebuild the controller
    rom: Option<Vec<u8>>,
    boot_rom: Option<BootRom>,
    frame_sink: Option<FrameSink>,
}

impl Default for GbSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl GbSystem {
    pub fn new() -> Self {
        let mut sys = Self {
            cpu: CpuLr35902::new(GbBus::new(false, None, None)),
            rom: None,
            boot_rom: None,
            frame_sink: None,
        };
        sys.power_on(None);
        sys
    }

    /// Build a fresh bus around `cartridge` and start the CPU, either at the
    /// boot ROM or at the post-boot state.
    fn power_on(&mut self, cartridge: Option<Cartridge>) {
        let boot = self.boot_rom.clone().map(|mut b| {
            b.enable();
            b
        });
        let cgb = match (&boot, &cartridge) {
            (Some(boot), _) => boot.is_cgb(),
            (None, Some(cart)) => cart.header.supports_cgb(),
            (None, None) => false,
        };
        let has_boot = boot.is_some();

        self.cpu = CpuLr35902::new(GbBus::new(cgb, cartridge, boot));
        if has_boot {
            self.cpu.reset();
        } else {
            self.cpu.bus.apply_post_boot();
            self.cpu
                .reset_post_boot(if cgb { Model::Cgb } else { Model::Dmg });
        }

        log(LogCategory::Bus, LogLevel::Debug, || {
            format!(
                "power on: {}, {}",
                if cgb { "CGB" } else { "DMG" },
                if has_boot { "boot ROM" } else { "post-boot state" }
            )
        });
    }

    /// Reload the controller from the ROM image, keeping RAM and clock.
    fn fresh_cartridge(&self, old: Cartridge) -> Cartridge {
        let Some(rom) = &self.rom else {
            return old;
        };
        match Cartridge::load(rom) {
            Ok(mut cart) => {
                cart.mapper.load_ram(old.mapper.ram());
                if let (Some(dst), Some(src)) = (cart.rtc_mut(), old.rtc()) {
                    *dst = src.clone();
                }
                cart
            }
            Err(_) => old,
        }
    }

    /// Register a callback that receives every finished frame.
    pub fn set_frame_sink<F>(&mut self, sink: F)
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        self.frame_sink = Some(Box::new(sink));
    }

    pub fn clear_frame_sink(&mut self) {
        self.frame_sink = None;
    }

    pub fn press(&mut self, button: Button) {
        self.cpu.bus.joypad.press(button);
    }

    pub fn release(&mut self, button: Button) {
        self.cpu.bus.joypad.release(button);
    }

    /// Bytes sent over the serial port since the last call.
    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.cpu.bus.serial.take_output()
    }

    pub fn is_cgb(&self) -> bool {
        self.cpu.bus.is_cgb()
    }

    pub fn header(&self) -> Option<&CartridgeHeader> {
        self.cpu.bus.cartridge.as_ref().map(|c| &c.header)
    }

    pub fn has_battery(&self) -> bool {
        self.header().is_some_and(|h| h.has_battery())
    }

    /// Battery-backed cartridge RAM, if the cartridge has any.
    pub fn cartridge_ram(&self) -> Option<&[u8]> {
        self.cpu.bus.cartridge.as_ref().and_then(|c| c.battery_ram())
    }

    pub fn load_cartridge_ram(&mut self, data: &[u8]) {
        if let Some(cart) = &mut self.cpu.bus.cartridge {
            if data.len() != cart.mapper.ram().len() {
                log(LogCategory::Cartridge, LogLevel::Warn, || {
                    format!(
                        "save is {} bytes, cartridge RAM is {}",
                        data.len(),
                        cart.mapper.ram().len()
                    )
                });
            }
            cart.mapper.load_ram(data);
        }
    }

    /// Clock state for a `.rtc` file (MBC3 timer cartridges only).
    pub fn rtc_record(&mut self) -> Option<RtcRecord> {
        let now = rtc::unix_now();
        self.cpu
            .bus
            .cartridge
            .as_mut()
            .and_then(|c| c.rtc_mut())
            .map(|rtc| rtc.record(now))
    }

    pub fn load_rtc_record(&mut self, record: &RtcRecord) {
        let now = rtc::unix_now();
        if let Some(rtc) = self.cpu.bus.cartridge.as_mut().and_then(|c| c.rtc_mut()) {
            rtc.load_record(record, now);
        }
    }

    pub fn registers(&self) -> &Registers {
        &self.cpu.regs
    }

    pub fn bus(&self) -> &GbBus {
        &self.cpu.bus
    }

    /// Run a single CPU step; returns machine cycles.
    pub fn step(&mut self) -> u32 {
        self.cpu.step()
    }
}

impl System for GbSystem {
    type Error = GbError;

    fn reset(&mut self) {
        let cartridge = self
            .cpu
            .bus
            .cartridge
            .take()
            .map(|old| self.fresh_cartridge(old));
        self.power_on(cartridge);
    }

    fn step_frame(&mut self) -> Result<Frame, Self::Error> {
        if self.cpu.bus.cartridge.is_none() {
            return Err(GbError::NoCartridge);
        }

        while !self.cpu.bus.take_frame_ready() {
            self.cpu.step();
        }

        let frame = self.cpu.bus.ppu.frame().clone();
        if let Some(sink) = &mut self.frame_sink {
            sink(&frame);
        }
        Ok(frame)
    }

    /// CPU, bus and device state, the cartridge controller's registers,
    /// RAM and clock, and whether the boot ROM is still mapped. ROM images
    /// are never included.
    fn save_state(&self) -> serde_json::Value {
        let bus = &self.cpu.bus;
        serde_json::json!({
            "system": "gb",
            "version": STATE_VERSION,
            "cpu": self.cpu.snapshot(),
            "bus": bus,
            "mapper": bus.cartridge.as_ref().map(|c| &c.mapper),
            "boot_enabled": bus.boot.as_ref().is_some_and(|b| b.enabled()),
        })
    }

    /// Everything is parsed and checked against the mounted cartridge
    /// before the session is touched, so a rejected state changes nothing.
    fn load_state(&mut self, v: &serde_json::Value) -> Result<(), serde_json::Error> {
        use serde::de::Error;

        if v.get("system").and_then(|s| s.as_str()) != Some("gb") {
            return Err(serde_json::Error::custom("not a Game Boy save state"));
        }
        let version = v.get("version").and_then(|n| n.as_u64());
        if version != Some(STATE_VERSION) {
            return Err(serde_json::Error::custom(format!(
                "unsupported save state version {version:?}"
            )));
        }
        let field = |name: &'static str| {
            v.get(name)
                .cloned()
                .ok_or_else(|| serde_json::Error::missing_field(name))
        };
        let cpu: CpuState = serde_json::from_value(field("cpu")?)?;
        let mut bus: GbBus = serde_json::from_value(field("bus")?)?;
        let mapper: Option<Mapper> = serde_json::from_value(field("mapper")?)?;
        let boot_enabled: bool = serde_json::from_value(field("boot_enabled")?)?;

        match (mapper, &mut self.cpu.bus.cartridge) {
            (Some(mut saved), Some(cart)) => {
                if !saved.adopt_rom(&mut cart.mapper) {
                    return Err(serde_json::Error::custom(format!(
                        "save state is not for a {} cartridge",
                        cart.mapper.name()
                    )));
                }
                cart.mapper = saved;
            }
            (None, None) => {}
            (Some(_), None) => {
                return Err(serde_json::Error::custom("save state needs a cartridge"))
            }
            (None, Some(_)) => {
                return Err(serde_json::Error::custom("save state has no cartridge"))
            }
        }

        bus.cartridge = self.cpu.bus.cartridge.take();
        bus.boot = self.cpu.bus.boot.take();
        if let Some(boot) = &mut bus.boot {
            if boot_enabled {
                boot.enable();
            } else {
                boot.write_disable(1);
            }
        }
        self.cpu.bus = bus;
        self.cpu.restore(&cpu);

        log(LogCategory::Bus, LogLevel::Debug, || {
            format!("state loaded at PC={:04X}", self.cpu.regs.pc)
        });
        Ok(())
    }

    fn supports_save_states(&self) -> bool {
        true
    }

    fn mount_points(&self) -> Vec<MountPointInfo> {
        vec![
            MountPointInfo {
                id: CARTRIDGE.to_string(),
                name: "Cartridge Slot".to_string(),
                extensions: vec!["gb".to_string(), "gbc".to_string()],
                required: true,
            },
            MountPointInfo {
                id: BOOT_ROM.to_string(),
                name: "Boot ROM".to_string(),
                extensions: vec!["bin".to_string()],
                required: false,
            },
        ]
    }

    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error> {
        match mount_point_id {
            CARTRIDGE => {
                let cart = Cartridge::load(data)?;
                self.rom = Some(data.to_vec());
                self.power_on(Some(cart));
            }
            BOOT_ROM => {
                self.boot_rom = Some(BootRom::new(data)?);
                self.reset();
            }
            _ => return Err(GbError::InvalidMountPoint),
        }
        Ok(())
    }

    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error> {
        match mount_point_id {
            CARTRIDGE => {
                self.rom = None;
                self.power_on(None);
            }
            BOOT_ROM => {
                self.boot_rom = None;
                self.reset();
            }
            _ => return Err(GbError::InvalidMountPoint),
        }
        Ok(())
    }

    fn is_mounted(&self, mount_point_id: &str) -> bool {
        match mount_point_id {
            CARTRIDGE => self.cpu.bus.cartridge.is_some(),
            BOOT_ROM => self.boot_rom.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// 32 KiB ROM-only image that spins on `JR -2` at 0x0150.
    fn spin_rom(cart_type: u8, ram_code: u8) -> Vec<u8> {
        let mut rom = vec![0; 0x8000];
        rom[0x0100..0x0104].copy_from_slice(&[0x00, 0xC3, 0x50, 0x01]);
        rom[0x0147] = cart_type;
        rom[0x0149] = ram_code;
        rom[0x0150..0x0152].copy_from_slice(&[0x18, 0xFE]);
        rom
    }

    #[test]
    fn test_gb_mount_points() {
        let sys = GbSystem::new();
        let mount_points = sys.mount_points();
        assert_eq!(mount_points.len(), 2);
        assert_eq!(mount_points[0].id, "Cartridge");
        assert!(mount_points[0].required);
        assert_eq!(mount_points[1].id, "BootROM");
        assert!(!mount_points[1].required);
    }

    #[test]
    fn test_gb_mount_unmount() {
        let mut sys = GbSystem::new();
        assert!(!sys.is_mounted("Cartridge"));

        assert!(sys.mount("Cartridge", &spin_rom(0x00, 0)).is_ok());
        assert!(sys.is_mounted("Cartridge"));
        assert_eq!(sys.registers().pc, 0x0100);

        assert!(sys.unmount("Cartridge").is_ok());
        assert!(!sys.is_mounted("Cartridge"));
        assert!(matches!(
            sys.mount("Tape", &[]),
            Err(GbError::InvalidMountPoint)
        ));
    }

    #[test]
    fn test_failed_mount_keeps_session() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &spin_rom(0x00, 0)).unwrap();
        sys.step_frame().unwrap();
        let pc = sys.registers().pc;

        assert!(matches!(
            sys.mount("Cartridge", &spin_rom(0xFE, 0)),
            Err(GbError::UnsupportedMapper { code: 0xFE, .. })
        ));
        assert!(matches!(
            sys.mount("Cartridge", &[0; 0x40]),
            Err(GbError::RomTooSmall(0x40))
        ));
        assert!(sys.is_mounted("Cartridge"));
        assert_eq!(sys.registers().pc, pc);
    }

    #[test]
    fn test_gb_step_frame_without_cart() {
        let mut sys = GbSystem::new();
        assert!(matches!(sys.step_frame(), Err(GbError::NoCartridge)));
    }

    #[test]
    fn test_gb_step_frame_with_cart() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &spin_rom(0x00, 0)).unwrap();

        let frame = sys.step_frame().unwrap();
        assert_eq!(frame.width, 160);
        assert_eq!(frame.height, 144);
        assert_eq!(frame.pixels.len(), 160 * 144);
    }

    #[test]
    fn test_frame_sink_receives_frames() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &spin_rom(0x00, 0)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        sys.set_frame_sink(move |frame| {
            assert_eq!(frame.width, 160);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        for _ in 0..3 {
            sys.step_frame().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_save_load_state() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &spin_rom(0x00, 0)).unwrap();
        sys.step_frame().unwrap();
        let state = sys.save_state();
        assert_eq!(state["system"], "gb");
        assert_eq!(state["version"], 1);
        assert!(state["cpu"].is_object());
        assert!(state["bus"].is_object());

        let mut other = GbSystem::new();
        other.mount("Cartridge", &spin_rom(0x00, 0)).unwrap();
        assert!(other.load_state(&state).is_ok());
        assert_eq!(other.registers(), sys.registers());

        assert!(other
            .load_state(&serde_json::json!({"system": "nes"}))
            .is_err());
    }

    /// `LD HL,C000` then `INC (HL)` forever.
    fn counter_rom() -> Vec<u8> {
        let mut rom = spin_rom(0x00, 0);
        rom[0x0150..0x0156].copy_from_slice(&[0x21, 0x00, 0xC0, 0x34, 0x18, 0xFD]);
        rom
    }

    #[test]
    fn test_load_state_rewinds_memory_and_devices() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &counter_rom()).unwrap();
        sys.step_frame().unwrap();
        let counter = sys.bus().peek(0xC000);
        let text = serde_json::to_string(&sys.save_state()).unwrap();

        sys.step_frame().unwrap();
        assert_ne!(sys.bus().peek(0xC000), counter);

        sys.load_state(&serde_json::from_str(&text).unwrap()).unwrap();
        assert_eq!(sys.bus().peek(0xC000), counter);

        // The restored session runs exactly like one that never stopped.
        let mut reference = GbSystem::new();
        reference.mount("Cartridge", &counter_rom()).unwrap();
        reference.step_frame().unwrap();
        reference.step_frame().unwrap();
        sys.step_frame().unwrap();
        assert_eq!(sys.registers(), reference.registers());
        assert_eq!(sys.bus().peek(0xC000), reference.bus().peek(0xC000));
        assert_eq!(sys.bus().timer.counter(), reference.bus().timer.counter());
        assert_eq!(sys.bus().ppu.ly(), reference.bus().ppu.ly());
        assert_eq!(sys.bus().ppu.mode(), reference.bus().ppu.mode());
    }

    #[test]
    fn test_load_state_restores_bank_registers() {
        let mut rom = spin_rom(0x03, 0x02);
        rom.resize(0x10000, 0);
        rom[0x0148] = 0x01;
        rom[0x8000] = 0xB2;
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &rom).unwrap();
        sys.cpu.bus.poke(0x2000, 0x02);
        sys.cpu.bus.poke(0x0000, 0x0A);
        sys.cpu.bus.poke(0xA000, 0x5C);
        let state = sys.save_state();

        sys.cpu.bus.poke(0x2000, 0x01);
        sys.cpu.bus.poke(0xA000, 0x00);
        sys.load_state(&state).unwrap();
        assert_eq!(sys.bus().peek(0x4000), 0xB2);
        assert_eq!(sys.bus().peek(0xA000), 0x5C);
    }

    #[test]
    fn test_mismatched_state_is_rejected() {
        let mut mbc1 = GbSystem::new();
        mbc1.mount("Cartridge", &spin_rom(0x01, 0)).unwrap();
        let state = mbc1.save_state();

        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &counter_rom()).unwrap();
        sys.step_frame().unwrap();
        let pc = sys.registers().pc;
        assert!(sys.load_state(&state).is_err());
        assert_eq!(sys.registers().pc, pc);
        assert_eq!(sys.bus().peek(0x0150), 0x21);

        let mut old = state.clone();
        old["version"] = serde_json::json!(0);
        assert!(mbc1.load_state(&old).is_err());

        let empty = GbSystem::new();
        assert!(sys.load_state(&empty.save_state()).is_err());
    }

    #[test]
    fn test_reset_keeps_cartridge_ram() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &spin_rom(0x03, 0x02)).unwrap();
        sys.load_cartridge_ram(&[0x12, 0x34]);
        sys.reset();
        assert_eq!(sys.cartridge_ram().map(|r| &r[..2]), Some(&[0x12, 0x34][..]));
        assert_eq!(sys.registers().pc, 0x0100);
    }

    #[test]
    fn test_boot_rom_mount() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &spin_rom(0x00, 0)).unwrap();
        assert!(matches!(
            sys.mount("BootROM", &[0; 100]),
            Err(GbError::InvalidBootRom(100))
        ));

        sys.mount("BootROM", &[0; 256]).unwrap();
        assert!(sys.is_mounted("BootROM"));
        assert_eq!(sys.registers().pc, 0x0000);
        assert!(!sys.is_cgb());

        sys.unmount("BootROM").unwrap();
        assert_eq!(sys.registers().pc, 0x0100);
    }

    #[test]
    fn test_cgb_flag_selects_model() {
        let mut rom = spin_rom(0x00, 0);
        rom[0x0143] = 0x80;
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &rom).unwrap();
        assert!(sys.is_cgb());
        assert_eq!(sys.registers().a(), 0x11);
    }

    #[test]
    fn test_rtc_record_only_for_timer_carts() {
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &spin_rom(0x13, 0x03)).unwrap();
        assert!(sys.rtc_record().is_none());

        sys.mount("Cartridge", &spin_rom(0x10, 0x03)).unwrap();
        assert!(sys.rtc_record().is_some());
    }
}
