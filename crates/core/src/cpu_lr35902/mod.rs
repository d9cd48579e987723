//! Sharp LR35902 CPU core (Game Boy / Game Boy Color CPU)
//!
//! A Z80-like 8-bit CPU with a reduced instruction set, no shadow registers
//! and a handful of Game Boy specific instructions (LDH, SWAP, STOP).
//!
//! # Timing model
//!
//! The core is generic over a [`BusLr35902`]. Every [`BusLr35902::read`] and
//! [`BusLr35902::write`] costs exactly one machine cycle, and
//! [`BusLr35902::tick`] charges one internal cycle with no bus access. The bus
//! implementation advances timers and video on each of these calls, so the
//! rest of the machine sees memory accesses at the cycle they happen.
//!
//! The CPU counts the calls it makes during a [`CpuLr35902::step`] and returns
//! that count, which reproduces the published opcode timings:
//!
//! | Instruction | Accesses | M-cycles |
//! |-------------|----------|----------|
//! | `NOP` | fetch | 1 |
//! | `LD r,(HL)` | fetch, read | 2 |
//! | `INC rr` | fetch, internal | 2 |
//! | `JR e` (taken) | fetch, imm, internal | 3 |
//! | `PUSH rr` | fetch, internal, write, write | 4 |
//! | `CALL nn` | fetch, imm, imm, internal, write, write | 6 |
//! | interrupt | internal x2, write x2, internal | 5 |
//!
//! # Run states
//!
//! - **Running**: fetch, decode, execute.
//! - **Halted**: one idle cycle per step until `IE & IF` is nonzero.
//! - **Stopped**: idle until the bus reports a button press.
//!
//! Interrupts are serviced between instructions when IME is set. `EI` takes
//! effect after the instruction that follows it.

mod execute;

pub mod alu;
pub mod registers;

use serde::{Deserialize, Serialize};

use crate::logging::{log, LogCategory, LogLevel};
pub use registers::{Model, Reg16, Reg8, RegisterPair, Registers};

/// Memory and device interface seen by the LR35902.
pub trait BusLr35902 {
    /// Read a byte; one machine cycle.
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte; one machine cycle.
    fn write(&mut self, addr: u16, val: u8);

    /// One internal machine cycle with no bus access.
    fn tick(&mut self);

    /// `IE & IF & 0x1F`.
    fn pending_interrupts(&self) -> u8;

    /// Clear the highest-priority pending request and return its handler
    /// address, or None once nothing is pending.
    fn acknowledge_interrupt(&mut self) -> Option<u16>;

    /// Called by STOP. Returns true if an armed speed switch was performed.
    fn speed_switch(&mut self) -> bool {
        false
    }

    /// Enter or leave STOP mode.
    fn set_stopped(&mut self, _stopped: bool) {}

    /// Whether a STOP should end (button held).
    fn wake_from_stop(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Running,
    Halted,
    Stopped,
}

/// Serializable CPU state (everything except the bus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuState {
    pub registers: Registers,
    pub ime: bool,
    pub ime_scheduled: bool,
    pub run_state: RunState,
    pub halt_bug: bool,
    pub cycles: u64,
}

/// Sharp LR35902 CPU state
#[derive(Debug)]
pub struct CpuLr35902<B: BusLr35902> {
    pub regs: Registers,
    /// Interrupt Master Enable
    pub ime: bool,
    /// Set by EI, applied after the next instruction
    ime_scheduled: bool,
    pub state: RunState,
    /// Next opcode fetch does not advance PC
    halt_bug: bool,
    /// Total machine cycles executed
    pub cycles: u64,
    /// Machine cycles charged in the current step
    step_cycles: u32,
    pub bus: B,
}

impl<B: BusLr35902> CpuLr35902<B> {
    pub fn new(bus: B) -> Self {
        Self {
            regs: Registers::default(),
            ime: false,
            ime_scheduled: false,
            state: RunState::Running,
            halt_bug: false,
            cycles: 0,
            step_cycles: 0,
            bus,
        }
    }

    /// Reset to the boot ROM entry state: all registers zero, PC = 0x0000.
    pub fn reset(&mut self) {
        self.regs = Registers::default();
        self.ime = false;
        self.ime_scheduled = false;
        self.state = RunState::Running;
        self.halt_bug = false;
        self.cycles = 0;
    }

    /// Reset straight to the state the boot ROM leaves behind.
    pub fn reset_post_boot(&mut self, model: Model) {
        self.reset();
        self.regs = Registers::post_boot(model);
    }

    pub fn snapshot(&self) -> CpuState {
        CpuState {
            registers: self.regs,
            ime: self.ime,
            ime_scheduled: self.ime_scheduled,
            run_state: self.state,
            halt_bug: self.halt_bug,
            cycles: self.cycles,
        }
    }

    pub fn restore(&mut self, state: &CpuState) {
        self.regs = state.registers;
        self.regs.set_af(state.registers.af.get());
        self.ime = state.ime;
        self.ime_scheduled = state.ime_scheduled;
        self.state = state.run_state;
        self.halt_bug = state.halt_bug;
        self.cycles = state.cycles;
    }

    /// Execute one instruction (or one idle cycle, or one interrupt dispatch).
    /// Returns the machine cycles consumed.
    pub fn step(&mut self) -> u32 {
        self.step_cycles = 0;

        match self.state {
            RunState::Stopped => {
                if !self.bus.wake_from_stop() {
                    self.tick();
                    return self.finish_step();
                }
                log(LogCategory::CPU, LogLevel::Debug, || {
                    format!("leaving STOP at PC={:04X}", self.regs.pc)
                });
                self.state = RunState::Running;
                self.bus.set_stopped(false);
            }
            RunState::Halted => {
                // Waking costs a cycle of its own.
                self.tick();
                if self.bus.pending_interrupts() == 0 {
                    return self.finish_step();
                }
                self.state = RunState::Running;
            }
            RunState::Running => {}
        }

        let enable_ime = self.ime_scheduled;

        if self.ime && self.bus.pending_interrupts() != 0 {
            self.service_interrupt();
        } else {
            let opcode = self.fetch_opcode();
            self.execute(opcode);
        }

        if enable_ime && self.ime_scheduled {
            self.ime = true;
            self.ime_scheduled = false;
        }

        self.finish_step()
    }

    fn finish_step(&mut self) -> u32 {
        self.cycles += self.step_cycles as u64;
        self.step_cycles
    }

    /// Push PC and jump to the highest-priority pending vector.
    fn service_interrupt(&mut self) {
        self.tick();
        self.tick();

        let pc = self.regs.pc;
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(self.regs.sp, (pc >> 8) as u8);

        // The high byte push can land on IE and change what is pending.
        let vector = self.bus.acknowledge_interrupt();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(self.regs.sp, pc as u8);

        self.ime = false;
        self.ime_scheduled = false;

        match vector {
            Some(vector) => {
                self.regs.pc = vector;
                log(LogCategory::Interrupts, LogLevel::Trace, || {
                    format!("dispatch vector {:04X} from PC={:04X}", vector, pc)
                });
            }
            None => self.regs.pc = 0x0000,
        }
        self.tick();
    }

    // Bus helpers. Each one charges exactly one machine cycle.

    fn read(&mut self, addr: u16) -> u8 {
        self.step_cycles += 1;
        self.bus.read(addr)
    }

    fn write(&mut self, addr: u16, val: u8) {
        self.step_cycles += 1;
        self.bus.write(addr, val);
    }

    fn tick(&mut self) {
        self.step_cycles += 1;
        self.bus.tick();
    }

    fn fetch_opcode(&mut self) -> u8 {
        let opcode = self.read(self.regs.pc);
        if self.halt_bug {
            self.halt_bug = false;
        } else {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        opcode
    }

    fn fetch8(&mut self) -> u8 {
        let val = self.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self) -> u16 {
        let lo = self.fetch8() as u16;
        let hi = self.fetch8() as u16;
        (hi << 8) | lo
    }

    /// Internal cycle, then high byte, then low byte.
    fn push16(&mut self, val: u16) {
        self.tick();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(self.regs.sp, val as u8);
    }

    fn pop16(&mut self) -> u16 {
        let lo = self.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (hi << 8) | lo
    }
}

impl<B: BusLr35902> crate::Cpu for CpuLr35902<B> {
    fn reset(&mut self) {
        CpuLr35902::reset(self);
    }

    fn step(&mut self) -> u32 {
        CpuLr35902::step(self)
    }
}
