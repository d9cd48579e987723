//! Opcode decode and execution.
//!
//! Opcodes are decoded from their bit fields (`xx yyy zzz`):
//!
//! ```text
//!   x = 00  misc loads, 16-bit INC/DEC/ADD, INC/DEC r, LD r,n, accumulator ops
//!   x = 01  LD r,r'   (0x76 is HALT)
//!   x = 10  ALU A,r   (y selects ADD ADC SUB SBC AND XOR OR CP)
//!   x = 11  jumps, calls, returns, stack, immediate ALU, CB prefix
//! ```
//!
//! Register field value 6 means `(HL)` and goes through the bus.

use super::alu;
use super::registers::{Reg16, Reg8, FLAG_C, FLAG_Z};
use super::{BusLr35902, CpuLr35902, RunState};
use crate::logging::{log, LogCategory, LogLevel};

impl<B: BusLr35902> CpuLr35902<B> {
    /// Read the operand named by a 3-bit register field.
    fn read_r(&mut self, field: u8) -> u8 {
        match Reg8::from_field(field) {
            Some(reg) => self.regs.get8(reg),
            None => self.read(self.regs.hl.get()),
        }
    }

    fn write_r(&mut self, field: u8, val: u8) {
        match Reg8::from_field(field) {
            Some(reg) => self.regs.set8(reg, val),
            None => self.write(self.regs.hl.get(), val),
        }
    }

    /// NZ, Z, NC, C
    fn condition(&self, cc: u8) -> bool {
        match cc & 0x03 {
            0 => !self.regs.flag(FLAG_Z),
            1 => self.regs.flag(FLAG_Z),
            2 => !self.regs.flag(FLAG_C),
            _ => self.regs.flag(FLAG_C),
        }
    }

    /// 8-bit ALU operation on A, selected by the `y` field.
    fn alu_a(&mut self, op: u8, val: u8) {
        let a = self.regs.a();
        let carry = self.regs.flag(FLAG_C);
        let (result, flags) = match op & 0x07 {
            0 => alu::add8(a, val, false),
            1 => alu::add8(a, val, carry),
            2 => alu::sub8(a, val, false),
            3 => alu::sub8(a, val, carry),
            4 => alu::and8(a, val),
            5 => alu::xor8(a, val),
            6 => alu::or8(a, val),
            _ => {
                let (_, flags) = alu::sub8(a, val, false);
                (a, flags)
            }
        };
        self.regs.set_a(result);
        self.regs.set_f(flags);
    }

    fn jump_relative(&mut self, offset: u8) {
        self.tick();
        self.regs.pc = self.regs.pc.wrapping_add(offset as i8 as i16 as u16);
    }

    fn ret(&mut self) {
        let addr = self.pop16();
        self.tick();
        self.regs.pc = addr;
    }

    fn call(&mut self, addr: u16) {
        self.push16(self.regs.pc);
        self.regs.pc = addr;
    }

    /// Decode and execute one opcode whose byte has already been fetched.
    pub(super) fn execute(&mut self, opcode: u8) {
        match opcode >> 6 {
            0b01 => {
                if opcode == 0x76 {
                    self.halt();
                } else {
                    let val = self.read_r(opcode & 0x07);
                    self.write_r((opcode >> 3) & 0x07, val);
                }
            }
            0b10 => {
                let val = self.read_r(opcode & 0x07);
                self.alu_a((opcode >> 3) & 0x07, val);
            }
            0b00 => self.execute_block0(opcode),
            _ => self.execute_block3(opcode),
        }
    }

    fn execute_block0(&mut self, opcode: u8) {
        let y = (opcode >> 3) & 0x07;
        match opcode {
            0x00 => {}
            0x08 => {
                let addr = self.fetch16();
                let sp = self.regs.sp;
                self.write(addr, sp as u8);
                self.write(addr.wrapping_add(1), (sp >> 8) as u8);
            }
            0x10 => self.stop(),
            0x18 => {
                let offset = self.fetch8();
                self.jump_relative(offset);
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                let offset = self.fetch8();
                if self.condition(y) {
                    self.jump_relative(offset);
                }
            }
            // LD rr,nn
            op if op & 0xCF == 0x01 => {
                let val = self.fetch16();
                self.regs.set16(Reg16::from_field(op >> 4), val);
            }
            // ADD HL,rr
            op if op & 0xCF == 0x09 => {
                let val = self.regs.get16(Reg16::from_field(op >> 4));
                let (result, flags) = alu::add16_hl(self.regs.hl.get(), val, self.regs.f());
                self.tick();
                self.regs.hl.set(result);
                self.regs.set_f(flags);
            }
            // LD (BC),A / LD (DE),A / LD (HL+),A / LD (HL-),A
            op if op & 0xCF == 0x02 => {
                let addr = self.indirect_address(op >> 4);
                self.write(addr, self.regs.a());
            }
            // LD A,(BC) / LD A,(DE) / LD A,(HL+) / LD A,(HL-)
            op if op & 0xCF == 0x0A => {
                let addr = self.indirect_address(op >> 4);
                let val = self.read(addr);
                self.regs.set_a(val);
            }
            // INC rr
            op if op & 0xCF == 0x03 => {
                let reg = Reg16::from_field(op >> 4);
                self.tick();
                self.regs.set16(reg, self.regs.get16(reg).wrapping_add(1));
            }
            // DEC rr
            op if op & 0xCF == 0x0B => {
                let reg = Reg16::from_field(op >> 4);
                self.tick();
                self.regs.set16(reg, self.regs.get16(reg).wrapping_sub(1));
            }
            // INC r
            op if op & 0x07 == 0x04 => {
                let val = self.read_r(y);
                let (result, flags) = alu::inc8(val, self.regs.f());
                self.write_r(y, result);
                self.regs.set_f(flags);
            }
            // DEC r
            op if op & 0x07 == 0x05 => {
                let val = self.read_r(y);
                let (result, flags) = alu::dec8(val, self.regs.f());
                self.write_r(y, result);
                self.regs.set_f(flags);
            }
            // LD r,n
            op if op & 0x07 == 0x06 => {
                let val = self.fetch8();
                self.write_r(y, val);
            }
            // RLCA RRCA RLA RRA DAA CPL SCF CCF
            _ => self.accumulator_op(y),
        }
    }

    /// HL post-increment/decrement for the `(rr)` load forms.
    fn indirect_address(&mut self, field: u8) -> u16 {
        match field & 0x03 {
            0 => self.regs.bc.get(),
            1 => self.regs.de.get(),
            2 => {
                let hl = self.regs.hl.get();
                self.regs.hl.set(hl.wrapping_add(1));
                hl
            }
            _ => {
                let hl = self.regs.hl.get();
                self.regs.hl.set(hl.wrapping_sub(1));
                hl
            }
        }
    }

    fn accumulator_op(&mut self, y: u8) {
        let a = self.regs.a();
        let f = self.regs.f();
        let (result, flags) = match y {
            0 => alu::rlc(a),
            1 => alu::rrc(a),
            2 => alu::rl(a, f),
            3 => alu::rr(a, f),
            4 => alu::daa(a, f),
            5 => alu::cpl(a, f),
            6 => (a, alu::scf(f)),
            _ => (a, alu::ccf(f)),
        };
        self.regs.set_a(result);
        // The accumulator rotates always clear Z.
        self.regs
            .set_f(if y < 4 { flags & !FLAG_Z } else { flags });
    }

    fn execute_block3(&mut self, opcode: u8) {
        let y = (opcode >> 3) & 0x07;
        match opcode {
            // RET cc
            0xC0 | 0xC8 | 0xD0 | 0xD8 => {
                self.tick();
                if self.condition(y) {
                    self.ret();
                }
            }
            0xC9 => self.ret(),
            0xD9 => {
                self.ret();
                self.ime = true;
                self.ime_scheduled = false;
            }
            // JP cc,nn
            0xC2 | 0xCA | 0xD2 | 0xDA => {
                let addr = self.fetch16();
                if self.condition(y) {
                    self.tick();
                    self.regs.pc = addr;
                }
            }
            0xC3 => {
                let addr = self.fetch16();
                self.tick();
                self.regs.pc = addr;
            }
            0xE9 => self.regs.pc = self.regs.hl.get(),
            // CALL cc,nn
            0xC4 | 0xCC | 0xD4 | 0xDC => {
                let addr = self.fetch16();
                if self.condition(y) {
                    self.call(addr);
                }
            }
            0xCD => {
                let addr = self.fetch16();
                self.call(addr);
            }
            // POP rr (AF in place of SP)
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let val = self.pop16();
                match (opcode >> 4) & 0x03 {
                    0 => self.regs.bc.set(val),
                    1 => self.regs.de.set(val),
                    2 => self.regs.hl.set(val),
                    _ => self.regs.set_af(val),
                }
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let val = match (opcode >> 4) & 0x03 {
                    0 => self.regs.bc.get(),
                    1 => self.regs.de.get(),
                    2 => self.regs.hl.get(),
                    _ => self.regs.af(),
                };
                self.push16(val);
            }
            // ALU A,n
            op if op & 0x07 == 0x06 => {
                let val = self.fetch8();
                self.alu_a(y, val);
            }
            // RST
            op if op & 0x07 == 0x07 => self.call((y as u16) * 8),
            0xE0 => {
                let offset = self.fetch8();
                self.write(0xFF00 | offset as u16, self.regs.a());
            }
            0xF0 => {
                let offset = self.fetch8();
                let val = self.read(0xFF00 | offset as u16);
                self.regs.set_a(val);
            }
            0xE2 => {
                let addr = 0xFF00 | self.regs.get8(Reg8::C) as u16;
                self.write(addr, self.regs.a());
            }
            0xF2 => {
                let addr = 0xFF00 | self.regs.get8(Reg8::C) as u16;
                let val = self.read(addr);
                self.regs.set_a(val);
            }
            0xEA => {
                let addr = self.fetch16();
                self.write(addr, self.regs.a());
            }
            0xFA => {
                let addr = self.fetch16();
                let val = self.read(addr);
                self.regs.set_a(val);
            }
            0xE8 => {
                let offset = self.fetch8();
                let (result, flags) = alu::add_sp_e8(self.regs.sp, offset);
                self.tick();
                self.tick();
                self.regs.sp = result;
                self.regs.set_f(flags);
            }
            0xF8 => {
                let offset = self.fetch8();
                let (result, flags) = alu::add_sp_e8(self.regs.sp, offset);
                self.tick();
                self.regs.hl.set(result);
                self.regs.set_f(flags);
            }
            0xF9 => {
                self.tick();
                self.regs.sp = self.regs.hl.get();
            }
            0xF3 => {
                self.ime = false;
                self.ime_scheduled = false;
            }
            0xFB => self.ime_scheduled = true,
            0xCB => {
                let cb = self.fetch8();
                self.execute_cb(cb);
            }
            _ => {
                let pc = self.regs.pc.wrapping_sub(1);
                log(LogCategory::CPU, LogLevel::Warn, || {
                    format!("illegal opcode {:02X} at {:04X}, treated as NOP", opcode, pc)
                });
            }
        }
    }

    /// CB-prefixed opcodes: `xx yyy zzz` with x selecting shift/BIT/RES/SET.
    fn execute_cb(&mut self, opcode: u8) {
        let y = (opcode >> 3) & 0x07;
        let z = opcode & 0x07;
        let val = self.read_r(z);
        let f = self.regs.f();

        match opcode >> 6 {
            0b00 => {
                let (result, flags) = match y {
                    0 => alu::rlc(val),
                    1 => alu::rrc(val),
                    2 => alu::rl(val, f),
                    3 => alu::rr(val, f),
                    4 => alu::sla(val),
                    5 => alu::sra(val),
                    6 => alu::swap(val),
                    _ => alu::srl(val),
                };
                self.write_r(z, result);
                self.regs.set_f(flags);
            }
            0b01 => self.regs.set_f(alu::bit(y, val, f)),
            0b10 => self.write_r(z, val & !(1 << y)),
            _ => self.write_r(z, val | (1 << y)),
        }
    }

    fn halt(&mut self) {
        if !self.ime && self.bus.pending_interrupts() != 0 {
            // HALT falls through immediately and the next fetch repeats a byte.
            self.halt_bug = true;
            log(LogCategory::CPU, LogLevel::Debug, || {
                format!("halt bug triggered at PC={:04X}", self.regs.pc)
            });
        } else {
            self.state = RunState::Halted;
        }
    }

    fn stop(&mut self) {
        if self.bus.speed_switch() {
            self.fetch8();
            log(LogCategory::CPU, LogLevel::Debug, || {
                "STOP performed speed switch".to_string()
            });
        } else if self.bus.pending_interrupts() != 0 {
            // Acts as a one-byte NOP.
        } else {
            self.fetch8();
            self.state = RunState::Stopped;
            self.bus.set_stopped(true);
            log(LogCategory::CPU, LogLevel::Debug, || {
                format!("entering STOP at PC={:04X}", self.regs.pc)
            });
        }
    }
}
