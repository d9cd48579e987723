//! Core emulator primitives and traits shared by the DotMatrix crates.
//!
//! The Sharp LR35902 CPU lives here, generic over a bus so that the Game Boy
//! system crate (and the tests in this crate) can supply their own memory map.

pub mod cpu_lr35902;
pub mod logging;

pub mod types {
    use serde::{Deserialize, Serialize};

    /// A finished framebuffer in ARGB8888.
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Frame {
        pub width: u32,
        pub height: u32,
        pub pixels: Vec<u32>,
    }

    impl Frame {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                pixels: vec![0; (width * height) as usize],
            }
        }

        /// Pixel at (x, y). Panics when out of bounds.
        pub fn pixel(&self, x: u32, y: u32) -> u32 {
            self.pixels[(y * self.width + x) as usize]
        }
    }
}

use serde_json::Value;

/// A CPU-like component that can be stepped; returns machine cycles consumed.
pub trait Cpu {
    fn reset(&mut self);
    fn step(&mut self) -> u32;
}

/// Description of a mount point (media slot) that a system supports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPointInfo {
    /// Unique identifier for this mount point (e.g., "Cartridge", "BootROM")
    pub id: String,
    /// User-friendly name for display
    pub name: String,
    /// File extensions accepted by this mount point (e.g., ["gb", "gbc"])
    pub extensions: Vec<String>,
    /// Whether this mount point is required for the system to function
    pub required: bool,
}

/// A high-level System trait tying components together.
pub trait System {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Reset to initial power-on state. Mounted media stays mounted.
    fn reset(&mut self);

    /// Emulate until a frame is produced and return a framebuffer.
    fn step_frame(&mut self) -> Result<types::Frame, Self::Error>;

    /// Return a JSON-serializable save state.
    /// Save states never include ROM or cartridge RAM contents.
    fn save_state(&self) -> Value;

    /// Load a JSON save state.
    fn load_state(&mut self, v: &Value) -> Result<(), serde_json::Error>;

    /// Check if this system supports save/load state functionality
    fn supports_save_states(&self) -> bool {
        false
    }

    /// Get the list of mount points this system supports
    fn mount_points(&self) -> Vec<MountPointInfo>;

    /// Load media into a specific mount point
    fn mount(&mut self, mount_point_id: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Unload media from a specific mount point
    fn unmount(&mut self, mount_point_id: &str) -> Result<(), Self::Error>;

    /// Check if a mount point has media loaded
    fn is_mounted(&self, mount_point_id: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_initialization() {
        let f = types::Frame::new(160, 144);
        assert_eq!(f.pixels.len(), 160 * 144);
        assert_eq!(f.width, 160);
        assert_eq!(f.height, 144);
        assert_eq!(f.pixel(159, 143), 0);
    }

    struct NullSystem {
        mounted: bool,
    }

    impl System for NullSystem {
        type Error = std::convert::Infallible;

        fn reset(&mut self) {}

        fn step_frame(&mut self) -> Result<types::Frame, Self::Error> {
            Ok(types::Frame::new(160, 144))
        }

        fn save_state(&self) -> serde_json::Value {
            serde_json::json!({"system": "null", "version": 1})
        }

        fn load_state(&mut self, _v: &serde_json::Value) -> Result<(), serde_json::Error> {
            Ok(())
        }

        fn mount_points(&self) -> Vec<MountPointInfo> {
            vec![MountPointInfo {
                id: "Cartridge".to_string(),
                name: "Cartridge Slot".to_string(),
                extensions: vec!["gb".to_string()],
                required: true,
            }]
        }

        fn mount(&mut self, _mount_point_id: &str, _data: &[u8]) -> Result<(), Self::Error> {
            self.mounted = true;
            Ok(())
        }

        fn unmount(&mut self, _mount_point_id: &str) -> Result<(), Self::Error> {
            self.mounted = false;
            Ok(())
        }

        fn is_mounted(&self, _mount_point_id: &str) -> bool {
            self.mounted
        }
    }

    #[test]
    fn test_default_save_state_support() {
        let sys = NullSystem { mounted: false };
        assert!(!sys.supports_save_states());
    }

    #[test]
    fn test_mount_cycle() {
        let mut sys = NullSystem { mounted: false };
        assert!(!sys.is_mounted("Cartridge"));
        assert!(sys.mount("Cartridge", &[0; 4]).is_ok());
        assert!(sys.is_mounted("Cartridge"));
        assert!(sys.unmount("Cartridge").is_ok());
        assert!(!sys.is_mounted("Cartridge"));
    }

    #[test]
    fn test_save_state_roundtrip_through_text() {
        let sys = NullSystem { mounted: false };
        let text = serde_json::to_string(&sys.save_state()).expect("serialize");
        let v: serde_json::Value = serde_json::from_str(&text).expect("deserialize");
        let mut sys2 = NullSystem { mounted: false };
        assert!(sys2.load_state(&v).is_ok());
        assert_eq!(v["system"], "null");
    }

    #[test]
    fn test_frame_serializes() {
        let mut f = types::Frame::new(2, 1);
        f.pixels[1] = 0xFF00FF00;
        let text = serde_json::to_string(&f).expect("serialize");
        let back: types::Frame = serde_json::from_str(&text).expect("deserialize");
        assert_eq!(back, f);
    }
}
