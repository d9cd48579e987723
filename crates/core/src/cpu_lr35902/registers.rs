//! LR35902 register file.
//!
//! Every 16-bit pair owns a single `u16`; the 8-bit halves are views over it,
//! so writing `B` is immediately visible through `BC` and the other way round.

use serde::{Deserialize, Serialize};

pub const FLAG_Z: u8 = 0b1000_0000;
pub const FLAG_N: u8 = 0b0100_0000;
pub const FLAG_H: u8 = 0b0010_0000;
pub const FLAG_C: u8 = 0b0001_0000;

/// Two 8-bit registers sharing one 16-bit backing value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegisterPair(u16);

impl RegisterPair {
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn set(&mut self, value: u16) {
        self.0 = value;
    }

    #[inline]
    pub fn hi(self) -> u8 {
        (self.0 >> 8) as u8
    }

    #[inline]
    pub fn lo(self) -> u8 {
        self.0 as u8
    }

    #[inline]
    pub fn set_hi(&mut self, value: u8) {
        self.0 = (self.0 & 0x00FF) | ((value as u16) << 8);
    }

    #[inline]
    pub fn set_lo(&mut self, value: u8) {
        self.0 = (self.0 & 0xFF00) | value as u16;
    }
}

/// 8-bit register operand, in the order of the 3-bit opcode field.
///
/// Field value `0b110` is `(HL)` and has no variant here; decode routes it to memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg8 {
    B,
    C,
    D,
    E,
    H,
    L,
    A,
}

impl Reg8 {
    /// Decode a 3-bit register field; `None` means `(HL)`.
    pub fn from_field(field: u8) -> Option<Self> {
        match field & 0x07 {
            0 => Some(Reg8::B),
            1 => Some(Reg8::C),
            2 => Some(Reg8::D),
            3 => Some(Reg8::E),
            4 => Some(Reg8::H),
            5 => Some(Reg8::L),
            6 => None,
            _ => Some(Reg8::A),
        }
    }
}

/// 16-bit register operand for the `rr` field of LD/INC/DEC/ADD HL.
/// PUSH/POP use the same field but with AF in place of SP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg16 {
    BC,
    DE,
    HL,
    SP,
}

impl Reg16 {
    pub fn from_field(field: u8) -> Self {
        match field & 0x03 {
            0 => Reg16::BC,
            1 => Reg16::DE,
            2 => Reg16::HL,
            _ => Reg16::SP,
        }
    }
}

/// Hardware model, selects post-boot register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Model {
    Dmg,
    Cgb,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    pub af: RegisterPair,
    pub bc: RegisterPair,
    pub de: RegisterPair,
    pub hl: RegisterPair,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    /// State left behind by the boot ROM when it hands over at 0x0100.
    pub fn post_boot(model: Model) -> Self {
        match model {
            Model::Dmg => Self {
                af: RegisterPair::new(0x01B0),
                bc: RegisterPair::new(0x0013),
                de: RegisterPair::new(0x00D8),
                hl: RegisterPair::new(0x014D),
                sp: 0xFFFE,
                pc: 0x0100,
            },
            Model::Cgb => Self {
                af: RegisterPair::new(0x1180),
                bc: RegisterPair::new(0x0000),
                de: RegisterPair::new(0xFF56),
                hl: RegisterPair::new(0x000D),
                sp: 0xFFFE,
                pc: 0x0100,
            },
        }
    }

    #[inline]
    pub fn a(&self) -> u8 {
        self.af.hi()
    }

    #[inline]
    pub fn set_a(&mut self, value: u8) {
        self.af.set_hi(value);
    }

    #[inline]
    pub fn f(&self) -> u8 {
        self.af.lo() & 0xF0
    }

    #[inline]
    pub fn set_f(&mut self, value: u8) {
        self.af.set_lo(value & 0xF0);
    }

    pub fn flag(&self, mask: u8) -> bool {
        self.f() & mask != 0
    }

    pub fn get8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::B => self.bc.hi(),
            Reg8::C => self.bc.lo(),
            Reg8::D => self.de.hi(),
            Reg8::E => self.de.lo(),
            Reg8::H => self.hl.hi(),
            Reg8::L => self.hl.lo(),
            Reg8::A => self.af.hi(),
        }
    }

    pub fn set8(&mut self, reg: Reg8, value: u8) {
        match reg {
            Reg8::B => self.bc.set_hi(value),
            Reg8::C => self.bc.set_lo(value),
            Reg8::D => self.de.set_hi(value),
            Reg8::E => self.de.set_lo(value),
            Reg8::H => self.hl.set_hi(value),
            Reg8::L => self.hl.set_lo(value),
            Reg8::A => self.af.set_hi(value),
        }
    }

    pub fn get16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::BC => self.bc.get(),
            Reg16::DE => self.de.get(),
            Reg16::HL => self.hl.get(),
            Reg16::SP => self.sp,
        }
    }

    pub fn set16(&mut self, reg: Reg16, value: u16) {
        match reg {
            Reg16::BC => self.bc.set(value),
            Reg16::DE => self.de.set(value),
            Reg16::HL => self.hl.set(value),
            Reg16::SP => self.sp = value,
        }
    }

    /// AF with the unused flag bits masked off.
    pub fn af(&self) -> u16 {
        self.af.get() & 0xFFF0
    }

    pub fn set_af(&mut self, value: u16) {
        self.af.set(value & 0xFFF0);
    }
}
