//! Flag-exact arithmetic and logic primitives.
//!
//! Every function is pure: it takes its operands (plus the incoming flag byte
//! when the result depends on it) and returns the result together with the new
//! flag byte. Nothing here touches the register file.

use super::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z};

#[inline]
fn z(value: u8) -> u8 {
    if value == 0 {
        FLAG_Z
    } else {
        0
    }
}

#[inline]
fn flag(cond: bool, mask: u8) -> u8 {
    if cond {
        mask
    } else {
        0
    }
}

/// ADD / ADC.
pub fn add8(a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let c = carry_in as u16;
    let sum = a as u16 + b as u16 + c;
    let result = sum as u8;
    let half = (a & 0x0F) as u16 + (b & 0x0F) as u16 + c > 0x0F;
    (result, z(result) | flag(half, FLAG_H) | flag(sum > 0xFF, FLAG_C))
}

/// SUB / SBC / CP.
pub fn sub8(a: u8, b: u8, carry_in: bool) -> (u8, u8) {
    let c = carry_in as u16;
    let result = (a as u16).wrapping_sub(b as u16).wrapping_sub(c) as u8;
    let half = ((a & 0x0F) as u16) < (b & 0x0F) as u16 + c;
    let borrow = (a as u16) < b as u16 + c;
    (
        result,
        z(result) | FLAG_N | flag(half, FLAG_H) | flag(borrow, FLAG_C),
    )
}

/// INC r: carry is left as it was.
pub fn inc8(value: u8, f: u8) -> (u8, u8) {
    let (result, flags) = add8(value, 1, false);
    (result, (flags & !FLAG_C) | (f & FLAG_C))
}

/// DEC r: carry is left as it was.
pub fn dec8(value: u8, f: u8) -> (u8, u8) {
    let (result, flags) = sub8(value, 1, false);
    (result, (flags & !FLAG_C) | (f & FLAG_C))
}

pub fn and8(a: u8, b: u8) -> (u8, u8) {
    let result = a & b;
    (result, z(result) | FLAG_H)
}

pub fn or8(a: u8, b: u8) -> (u8, u8) {
    let result = a | b;
    (result, z(result))
}

pub fn xor8(a: u8, b: u8) -> (u8, u8) {
    let result = a ^ b;
    (result, z(result))
}

/// ADD HL,rr: half-carry from bit 11, carry from bit 15, zero preserved.
pub fn add16_hl(hl: u16, value: u16, f: u8) -> (u16, u8) {
    let (result, carry) = hl.overflowing_add(value);
    let half = (hl & 0x0FFF) + (value & 0x0FFF) > 0x0FFF;
    (
        result,
        (f & FLAG_Z) | flag(half, FLAG_H) | flag(carry, FLAG_C),
    )
}

/// ADD SP,e and LD HL,SP+e: flags come from the unsigned low-byte add, Z and N cleared.
pub fn add_sp_e8(sp: u16, offset: u8) -> (u16, u8) {
    let result = sp.wrapping_add(offset as i8 as i16 as u16);
    let half = (sp & 0x000F) + (offset as u16 & 0x000F) > 0x000F;
    let carry = (sp & 0x00FF) + offset as u16 > 0x00FF;
    (result, flag(half, FLAG_H) | flag(carry, FLAG_C))
}

pub fn rlc(value: u8) -> (u8, u8) {
    let result = value.rotate_left(1);
    (result, z(result) | flag(value & 0x80 != 0, FLAG_C))
}

pub fn rrc(value: u8) -> (u8, u8) {
    let result = value.rotate_right(1);
    (result, z(result) | flag(value & 0x01 != 0, FLAG_C))
}

pub fn rl(value: u8, f: u8) -> (u8, u8) {
    let result = (value << 1) | ((f & FLAG_C != 0) as u8);
    (result, z(result) | flag(value & 0x80 != 0, FLAG_C))
}

pub fn rr(value: u8, f: u8) -> (u8, u8) {
    let result = (value >> 1) | (((f & FLAG_C != 0) as u8) << 7);
    (result, z(result) | flag(value & 0x01 != 0, FLAG_C))
}

pub fn sla(value: u8) -> (u8, u8) {
    let result = value << 1;
    (result, z(result) | flag(value & 0x80 != 0, FLAG_C))
}

/// Arithmetic shift: bit 7 is kept.
pub fn sra(value: u8) -> (u8, u8) {
    let result = (value >> 1) | (value & 0x80);
    (result, z(result) | flag(value & 0x01 != 0, FLAG_C))
}

pub fn srl(value: u8) -> (u8, u8) {
    let result = value >> 1;
    (result, z(result) | flag(value & 0x01 != 0, FLAG_C))
}

pub fn swap(value: u8) -> (u8, u8) {
    let result = value.rotate_left(4);
    (result, z(result))
}

/// BIT n,r: only the flags change.
pub fn bit(n: u8, value: u8, f: u8) -> u8 {
    flag(value & (1 << (n & 7)) == 0, FLAG_Z) | FLAG_H | (f & FLAG_C)
}

pub fn daa(a: u8, f: u8) -> (u8, u8) {
    let subtract = f & FLAG_N != 0;
    let half = f & FLAG_H != 0;
    let mut carry = f & FLAG_C != 0;

    let result = if !subtract {
        let mut adjust = 0u8;
        if half || a & 0x0F > 0x09 {
            adjust |= 0x06;
        }
        if carry || a > 0x99 {
            adjust |= 0x60;
            carry = true;
        }
        a.wrapping_add(adjust)
    } else {
        let mut adjust = 0u8;
        if half {
            adjust |= 0x06;
        }
        if carry {
            adjust |= 0x60;
        }
        a.wrapping_sub(adjust)
    };

    (
        result,
        z(result) | (f & FLAG_N) | flag(carry, FLAG_C),
    )
}

pub fn cpl(a: u8, f: u8) -> (u8, u8) {
    (!a, (f & (FLAG_Z | FLAG_C)) | FLAG_N | FLAG_H)
}

pub fn scf(f: u8) -> u8 {
    (f & FLAG_Z) | FLAG_C
}

pub fn ccf(f: u8) -> u8 {
    (f & FLAG_Z) | ((f & FLAG_C) ^ FLAG_C)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add8_overflow_to_zero() {
        assert_eq!(add8(0x3A, 0xC6, false), (0x00, FLAG_Z | FLAG_H | FLAG_C));
    }

    #[test]
    fn test_add8_with_carry_in() {
        let (r, f) = add8(0x0E, 0x01, true);
        assert_eq!(r, 0x10);
        assert_eq!(f, FLAG_H);
    }

    #[test]
    fn test_sub8_borrow() {
        let (r, f) = sub8(0x3E, 0x40, false);
        assert_eq!(r, 0xFE);
        assert_eq!(f, FLAG_N | FLAG_C);

        let (r, f) = sub8(0x3B, 0x4F, true);
        assert_eq!(r, 0xEB);
        assert_eq!(f, FLAG_N | FLAG_H | FLAG_C);
    }

    #[test]
    fn test_inc_dec_preserve_carry() {
        assert_eq!(inc8(0xFF, FLAG_C), (0x00, FLAG_Z | FLAG_H | FLAG_C));
        assert_eq!(inc8(0xFF, 0), (0x00, FLAG_Z | FLAG_H));
        assert_eq!(dec8(0x01, FLAG_C), (0x00, FLAG_Z | FLAG_N | FLAG_C));
        assert_eq!(dec8(0x10, 0), (0x0F, FLAG_N | FLAG_H));
    }

    #[test]
    fn test_logic_flags() {
        assert_eq!(and8(0xF0, 0x0F), (0x00, FLAG_Z | FLAG_H));
        assert_eq!(or8(0x00, 0x00), (0x00, FLAG_Z));
        assert_eq!(xor8(0xFF, 0x0F), (0xF0, 0));
    }

    #[test]
    fn test_add16_hl_keeps_zero() {
        let (r, f) = add16_hl(0x8A23, 0x0605, FLAG_Z | FLAG_N);
        assert_eq!(r, 0x9028);
        assert_eq!(f, FLAG_Z | FLAG_H);

        let (r, f) = add16_hl(0x8A23, 0x8A23, 0);
        assert_eq!(r, 0x1446);
        assert_eq!(f, FLAG_H | FLAG_C);
    }

    #[test]
    fn test_add_sp_e8_low_byte_flags() {
        // SP=FFF8, e=+2: no carries.
        assert_eq!(add_sp_e8(0xFFF8, 0x02), (0xFFFA, 0));
        // e=-1 on 0x0000 wraps but carries come from the low byte only.
        assert_eq!(add_sp_e8(0x0000, 0xFF), (0xFFFF, 0));
        assert_eq!(add_sp_e8(0x00FF, 0x01), (0x0100, FLAG_H | FLAG_C));
    }

    #[test]
    fn test_rotates() {
        assert_eq!(rlc(0x85), (0x0B, FLAG_C));
        assert_eq!(rrc(0x01), (0x80, FLAG_C));
        assert_eq!(rl(0x80, 0), (0x00, FLAG_Z | FLAG_C));
        assert_eq!(rl(0x11, FLAG_C), (0x23, 0));
        assert_eq!(rr(0x01, 0), (0x00, FLAG_Z | FLAG_C));
        assert_eq!(rr(0x8A, FLAG_C), (0xC5, 0));
    }

    #[test]
    fn test_shifts() {
        assert_eq!(sla(0x80), (0x00, FLAG_Z | FLAG_C));
        assert_eq!(sra(0x8A), (0xC5, 0));
        assert_eq!(sra(0x01), (0x00, FLAG_Z | FLAG_C));
        assert_eq!(srl(0xFF), (0x7F, FLAG_C));
        assert_eq!(swap(0xF0), (0x0F, 0));
        assert_eq!(swap(0x00), (0x00, FLAG_Z));
    }

    #[test]
    fn test_bit_keeps_carry() {
        assert_eq!(bit(7, 0x80, FLAG_C), FLAG_H | FLAG_C);
        assert_eq!(bit(0, 0x80, 0), FLAG_Z | FLAG_H);
    }

    #[test]
    fn test_daa_after_add_and_sub() {
        // 0x45 + 0x38 = 0x7D -> 0x83
        let (sum, f) = add8(0x45, 0x38, false);
        assert_eq!(daa(sum, f), (0x83, 0));

        // 0x83 - 0x38 = 0x4B -> 0x45
        let (diff, f) = sub8(0x83, 0x38, false);
        assert_eq!(daa(diff, f), (0x45, FLAG_N));

        // 0x99 + 0x01 -> 0x00 with carry
        let (sum, f) = add8(0x99, 0x01, false);
        assert_eq!(daa(sum, f), (0x00, FLAG_Z | FLAG_C));
    }

    #[test]
    fn test_cpl_scf_ccf() {
        assert_eq!(cpl(0x35, FLAG_Z), (0xCA, FLAG_Z | FLAG_N | FLAG_H));
        assert_eq!(scf(FLAG_N | FLAG_H), FLAG_C);
        assert_eq!(ccf(FLAG_C | FLAG_Z), FLAG_Z);
        assert_eq!(ccf(0), FLAG_C);
    }
}
