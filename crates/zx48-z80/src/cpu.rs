//! Z80 CPU core with instruction-stepping execution.

#![allow(clippy::cast_possible_truncation)] // Intentional truncation for low byte extraction.
#![allow(clippy::cast_possible_wrap)] // Intentional i8 casts for displacements.
#![allow(clippy::cast_sign_loss)] // Sign-extending displacement adds.

use crate::Bus;
use crate::flags::{CF, PF, SF, ZF};
use crate::registers::Registers;
use crate::timing;

/// Which register bank the current instruction addresses through: plain HL,
/// or IX/IY under a DD/FD prefix. Carried as a parameter through the base
/// decoder so the indexed pages reuse it unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexMode {
    Hl,
    Ix,
    Iy,
}

/// Z80 CPU.
///
/// The CPU does not own the bus; one is passed into every [`Z80::step`],
/// [`Z80::interrupt`] and [`Z80::nmi`] call. `tstates` is a monotonic 64-bit
/// clock that is never reset - absolute tape timing depends on it.
pub struct Z80 {
    /// Register file. Public so snapshot collaborators can restore state.
    pub regs: Registers,
    /// Monotonic T-state clock.
    tstates: u64,
    /// EI executed; interrupts stay masked until one more instruction runs.
    ei_pending: bool,
    /// The instruction currently executing is the arming EI itself.
    ei_armed: bool,
    /// Contention wait states accumulated during the current instruction.
    wait: u32,
}

impl Z80 {
    #[must_use]
    pub fn new() -> Self {
        Self {
            regs: Registers {
                sp: 0xFFFF,
                ..Registers::default()
            },
            tstates: 0,
            ei_pending: false,
            ei_armed: false,
            wait: 0,
        }
    }

    /// Total T-states elapsed since creation. Never reset.
    #[must_use]
    pub const fn tstates(&self) -> u64 {
        self.tstates
    }

    /// Whether the CPU is halted waiting for an interrupt.
    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.regs.halted
    }

    /// Power-on reset. Registers return to their reset values; the T-state
    /// clock keeps running.
    pub fn reset(&mut self) {
        self.regs = Registers {
            sp: 0xFFFF,
            ..Registers::default()
        };
        self.ei_pending = false;
        self.ei_armed = false;
        self.wait = 0;
    }

    /// Execute one instruction and return its T-state cost, contention
    /// included.
    ///
    /// A halted CPU burns 4 T-states per call until an interrupt is
    /// accepted. DD/FD prefixes are folded into the same call: a prefix
    /// chain plus its instruction is one step.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if self.regs.halted {
            self.regs.inc_r();
            self.tstates += u64::from(timing::HALT_STEP);
            return timing::HALT_STEP;
        }

        self.wait = 0;
        self.ei_armed = false;

        let mut cycles = 0u32;
        let mut index = IndexMode::Hl;
        loop {
            let op = self.fetch_op(bus);
            match op {
                0xDD => {
                    index = IndexMode::Ix;
                    cycles += timing::PREFIX;
                }
                0xFD => {
                    index = IndexMode::Iy;
                    cycles += timing::PREFIX;
                }
                0xCB => {
                    cycles += if index == IndexMode::Hl {
                        self.exec_cb(bus)
                    } else {
                        self.exec_index_cb(bus, index)
                    };
                    break;
                }
                0xED => {
                    // ED cancels any DD/FD prefix.
                    cycles += self.exec_ed(bus);
                    break;
                }
                _ => {
                    cycles += self.exec_base(bus, op, index);
                    break;
                }
            }
        }

        cycles += self.wait;
        self.tstates += u64::from(cycles);

        // EI takes effect one instruction late, so EI;RETI cannot be
        // interrupted between the two.
        if self.ei_pending && !self.ei_armed {
            self.regs.iff1 = true;
            self.regs.iff2 = true;
            self.ei_pending = false;
        }

        cycles
    }

    /// Accept a maskable interrupt, if the CPU will take one.
    ///
    /// Returns the T-states consumed, or 0 when interrupts are disabled or
    /// still masked by a pending EI.
    pub fn interrupt<B: Bus>(&mut self, bus: &mut B) -> u32 {
        if !self.regs.iff1 || self.ei_pending {
            return 0;
        }
        self.wait = 0;
        self.regs.halted = false;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.inc_r();

        let pc = self.regs.pc;
        self.push16(bus, pc);

        let base = if self.regs.im == 2 {
            let vector = (u16::from(self.regs.i) << 8) | 0xFF;
            self.regs.pc = self.mem_read16(bus, vector);
            timing::INT_IM2
        } else {
            self.regs.pc = 0x0038;
            timing::INT_IM01
        };

        let cycles = base + self.wait;
        self.tstates += u64::from(cycles);
        cycles
    }

    /// Accept a non-maskable interrupt. Always taken.
    pub fn nmi<B: Bus>(&mut self, bus: &mut B) -> u32 {
        self.wait = 0;
        self.regs.halted = false;
        self.regs.iff2 = self.regs.iff1;
        self.regs.iff1 = false;
        self.regs.inc_r();

        let pc = self.regs.pc;
        self.push16(bus, pc);
        self.regs.pc = 0x0066;

        let cycles = timing::INT_NMI + self.wait;
        self.tstates += u64::from(cycles);
        cycles
    }

    // === Memory access ===

    /// Read a byte, charging contention for the access.
    pub(crate) fn mem_read<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        self.wait += bus.contention(addr);
        bus.read8(addr)
    }

    /// Write a byte, charging contention for the access.
    pub(crate) fn mem_write<B: Bus>(&mut self, bus: &mut B, addr: u16, val: u8) {
        self.wait += bus.contention(addr);
        bus.write8(addr, val);
    }

    /// Little-endian word read; each byte access wraps modulo 2^16.
    pub(crate) fn mem_read16<B: Bus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = self.mem_read(bus, addr);
        let hi = self.mem_read(bus, addr.wrapping_add(1));
        u16::from(lo) | (u16::from(hi) << 8)
    }

    /// Little-endian word write, low byte first.
    pub(crate) fn mem_write16<B: Bus>(&mut self, bus: &mut B, addr: u16, val: u16) {
        self.mem_write(bus, addr, val as u8);
        self.mem_write(bus, addr.wrapping_add(1), (val >> 8) as u8);
    }

    /// Fetch the next opcode byte: PC and R advance.
    fn fetch_op<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let pc = self.regs.pc;
        self.regs.pc = pc.wrapping_add(1);
        self.regs.inc_r();
        self.mem_read(bus, pc)
    }

    /// Fetch an operand byte at PC. No refresh increment.
    pub(crate) fn imm8<B: Bus>(&mut self, bus: &mut B) -> u8 {
        let pc = self.regs.pc;
        self.regs.pc = pc.wrapping_add(1);
        self.mem_read(bus, pc)
    }

    /// Fetch a little-endian operand word at PC.
    pub(crate) fn imm16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.imm8(bus);
        let hi = self.imm8(bus);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    pub(crate) fn push16<B: Bus>(&mut self, bus: &mut B, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mem_write(bus, self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.mem_write(bus, self.regs.sp, val as u8);
    }

    pub(crate) fn pop16<B: Bus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.mem_read(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.mem_read(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from(lo) | (u16::from(hi) << 8)
    }

    // === Decode helpers ===

    /// HL, IX or IY depending on the index mode.
    pub(crate) fn idx(&self, mode: IndexMode) -> u16 {
        match mode {
            IndexMode::Hl => self.regs.hl(),
            IndexMode::Ix => self.regs.ix,
            IndexMode::Iy => self.regs.iy,
        }
    }

    pub(crate) fn set_idx(&mut self, mode: IndexMode, val: u16) {
        match mode {
            IndexMode::Hl => self.regs.set_hl(val),
            IndexMode::Ix => self.regs.ix = val,
            IndexMode::Iy => self.regs.iy = val,
        }
    }

    /// 8-bit register by 3-bit field. Fields 4 and 5 resolve to the index
    /// register halves under a DD/FD prefix (undocumented IXH/IXL/IYH/IYL).
    /// Field 6 is the memory operand and is handled by the caller.
    pub(crate) fn reg8(&self, mode: IndexMode, r: u8) -> u8 {
        match r & 7 {
            0 => self.regs.b,
            1 => self.regs.c,
            2 => self.regs.d,
            3 => self.regs.e,
            4 => (self.idx(mode) >> 8) as u8,
            5 => self.idx(mode) as u8,
            7 => self.regs.a,
            _ => unreachable!("memory operand handled by caller"),
        }
    }

    pub(crate) fn set_reg8(&mut self, mode: IndexMode, r: u8, val: u8) {
        match r & 7 {
            0 => self.regs.b = val,
            1 => self.regs.c = val,
            2 => self.regs.d = val,
            3 => self.regs.e = val,
            4 => {
                let idx = self.idx(mode);
                self.set_idx(mode, (idx & 0x00FF) | (u16::from(val) << 8));
            }
            5 => {
                let idx = self.idx(mode);
                self.set_idx(mode, (idx & 0xFF00) | u16::from(val));
            }
            7 => self.regs.a = val,
            _ => unreachable!("memory operand handled by caller"),
        }
    }

    /// 16-bit register pair by 2-bit field, SP in slot 3.
    pub(crate) fn rp(&self, mode: IndexMode, p: u8) -> u16 {
        match p & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.idx(mode),
            _ => self.regs.sp,
        }
    }

    pub(crate) fn set_rp(&mut self, mode: IndexMode, p: u8, val: u16) {
        match p & 3 {
            0 => self.regs.set_bc(val),
            1 => self.regs.set_de(val),
            2 => self.set_idx(mode, val),
            _ => self.regs.sp = val,
        }
    }

    /// Register pair for PUSH/POP: AF in slot 3.
    pub(crate) fn rp_af(&self, mode: IndexMode, p: u8) -> u16 {
        match p & 3 {
            0 => self.regs.bc(),
            1 => self.regs.de(),
            2 => self.idx(mode),
            _ => self.regs.af(),
        }
    }

    pub(crate) fn set_rp_af(&mut self, mode: IndexMode, p: u8, val: u16) {
        match p & 3 {
            0 => self.regs.set_bc(val),
            1 => self.regs.set_de(val),
            2 => self.set_idx(mode, val),
            _ => self.regs.set_af(val),
        }
    }

    /// Evaluate one of the eight condition codes NZ/Z/NC/C/PO/PE/P/M.
    pub(crate) fn condition(&self, cc: u8) -> bool {
        match cc & 7 {
            0 => self.regs.f & ZF == 0,
            1 => self.regs.f & ZF != 0,
            2 => self.regs.f & CF == 0,
            3 => self.regs.f & CF != 0,
            4 => self.regs.f & PF == 0,
            5 => self.regs.f & PF != 0,
            6 => self.regs.f & SF == 0,
            _ => self.regs.f & SF != 0,
        }
    }

    /// Effective address of the memory operand: HL, or the index register
    /// plus a displacement fetched from the instruction stream.
    pub(crate) fn operand_addr<B: Bus>(&mut self, bus: &mut B, mode: IndexMode) -> u16 {
        match mode {
            IndexMode::Hl => self.regs.hl(),
            _ => {
                let d = self.imm8(bus) as i8;
                self.idx(mode).wrapping_add(d as u16)
            }
        }
    }

    /// Arm the post-EI interrupt delay. Called by the EI handler.
    pub(crate) fn arm_ei(&mut self) {
        self.ei_pending = true;
        self.ei_armed = true;
    }
}

impl Default for Z80 {
    fn default() -> Self {
        Self::new()
    }
}

// Instruction execution split into a separate file for readability.
mod execute;
