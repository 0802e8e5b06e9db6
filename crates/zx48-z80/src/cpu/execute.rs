//! Instruction execution: the base, CB, ED and DDCB/FDCB opcode pages.
//!
//! Dispatch is a dense `match` per page; base T-state costs come from the
//! tables in [`crate::timing`]. The DD/FD pages are not duplicated: the base
//! decoder takes the index mode as a parameter, which also yields the
//! undocumented IXH/IXL/IYH/IYL forms for free.

#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

use crate::alu;
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};
use crate::timing;
use crate::Bus;

use super::{IndexMode, Z80};

impl Z80 {
    /// Execute an unprefixed (or DD/FD-prefixed) instruction.
    pub(super) fn exec_base<B: Bus>(&mut self, bus: &mut B, op: u8, index: IndexMode) -> u32 {
        let mut cycles = u32::from(timing::BASE[op as usize]);
        let y = (op >> 3) & 7;
        let z = op & 7;
        let p = (op >> 4) & 3;

        match op {
            // === Loads and HALT (0x40-0x7F) ===
            0x76 => self.regs.halted = true,
            0x40..=0x7F if z == 6 => {
                // LD r,(HL) / LD r,(IX+d). The destination is always the
                // plain register, even under a prefix.
                let addr = self.operand_addr(bus, index);
                if index != IndexMode::Hl {
                    cycles += timing::INDEX_OPERAND;
                }
                let val = self.mem_read(bus, addr);
                self.set_reg8(IndexMode::Hl, y, val);
            }
            0x40..=0x7F if y == 6 => {
                // LD (HL),r / LD (IX+d),r. The source is the plain register.
                let addr = self.operand_addr(bus, index);
                if index != IndexMode::Hl {
                    cycles += timing::INDEX_OPERAND;
                }
                let val = self.reg8(IndexMode::Hl, z);
                self.mem_write(bus, addr, val);
            }
            0x40..=0x7F => {
                let val = self.reg8(index, z);
                self.set_reg8(index, y, val);
            }

            // === 8-bit arithmetic and logic (0x80-0xBF) ===
            0x80..=0xBF => {
                let operand = if z == 6 {
                    let addr = self.operand_addr(bus, index);
                    if index != IndexMode::Hl {
                        cycles += timing::INDEX_OPERAND;
                    }
                    self.mem_read(bus, addr)
                } else {
                    self.reg8(index, z)
                };
                self.alu_acc(y, operand);
            }

            // === 0x00-0x3F ===
            0x00 => {}
            0x08 => self.regs.ex_af(),
            0x10 => {
                // DJNZ d
                let d = self.imm8(bus) as i8;
                self.regs.b = self.regs.b.wrapping_sub(1);
                if self.regs.b != 0 {
                    self.regs.pc = self.regs.pc.wrapping_add(d as u16);
                    cycles += timing::JR_TAKEN;
                }
            }
            0x18 => {
                let d = self.imm8(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add(d as u16);
            }
            0x20 | 0x28 | 0x30 | 0x38 => {
                // JR cc,d - conditions NZ/Z/NC/C only.
                let d = self.imm8(bus) as i8;
                if self.condition(y - 4) {
                    self.regs.pc = self.regs.pc.wrapping_add(d as u16);
                    cycles += timing::JR_TAKEN;
                }
            }
            0x01 | 0x11 | 0x21 | 0x31 => {
                let val = self.imm16(bus);
                self.set_rp(index, p, val);
            }
            0x09 | 0x19 | 0x29 | 0x39 => {
                // ADD HL,rp (ADD IX,rp under a prefix; slot 2 is then IX).
                let lhs = self.idx(index);
                let rhs = self.rp(index, p);
                let (result, f) = alu::add16(lhs, rhs);
                self.set_idx(index, result);
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | f;
            }
            0x02 => {
                let addr = self.regs.bc();
                self.mem_write(bus, addr, self.regs.a);
            }
            0x12 => {
                let addr = self.regs.de();
                self.mem_write(bus, addr, self.regs.a);
            }
            0x0A => {
                let addr = self.regs.bc();
                self.regs.a = self.mem_read(bus, addr);
            }
            0x1A => {
                let addr = self.regs.de();
                self.regs.a = self.mem_read(bus, addr);
            }
            0x22 => {
                let addr = self.imm16(bus);
                let val = self.idx(index);
                self.mem_write16(bus, addr, val);
            }
            0x2A => {
                let addr = self.imm16(bus);
                let val = self.mem_read16(bus, addr);
                self.set_idx(index, val);
            }
            0x32 => {
                let addr = self.imm16(bus);
                self.mem_write(bus, addr, self.regs.a);
            }
            0x3A => {
                let addr = self.imm16(bus);
                self.regs.a = self.mem_read(bus, addr);
            }
            0x03 | 0x13 | 0x23 | 0x33 => {
                let val = self.rp(index, p).wrapping_add(1);
                self.set_rp(index, p, val);
            }
            0x0B | 0x1B | 0x2B | 0x3B => {
                let val = self.rp(index, p).wrapping_sub(1);
                self.set_rp(index, p, val);
            }
            0x34 => {
                // INC (HL) / INC (IX+d)
                let addr = self.operand_addr(bus, index);
                if index != IndexMode::Hl {
                    cycles += timing::INDEX_OPERAND;
                }
                let (result, f) = alu::inc8(self.mem_read(bus, addr));
                self.mem_write(bus, addr, result);
                self.regs.f = (self.regs.f & CF) | f;
            }
            0x35 => {
                let addr = self.operand_addr(bus, index);
                if index != IndexMode::Hl {
                    cycles += timing::INDEX_OPERAND;
                }
                let (result, f) = alu::dec8(self.mem_read(bus, addr));
                self.mem_write(bus, addr, result);
                self.regs.f = (self.regs.f & CF) | f;
            }
            0x04 | 0x0C | 0x14 | 0x1C | 0x24 | 0x2C | 0x3C => {
                let (result, f) = alu::inc8(self.reg8(index, y));
                self.set_reg8(index, y, result);
                self.regs.f = (self.regs.f & CF) | f;
            }
            0x05 | 0x0D | 0x15 | 0x1D | 0x25 | 0x2D | 0x3D => {
                let (result, f) = alu::dec8(self.reg8(index, y));
                self.set_reg8(index, y, result);
                self.regs.f = (self.regs.f & CF) | f;
            }
            0x36 => {
                // LD (HL),n / LD (IX+d),n - displacement precedes the
                // immediate in the instruction stream.
                let addr = self.operand_addr(bus, index);
                if index != IndexMode::Hl {
                    cycles += timing::INDEX_LD_IMM;
                }
                let val = self.imm8(bus);
                self.mem_write(bus, addr, val);
            }
            0x06 | 0x0E | 0x16 | 0x1E | 0x26 | 0x2E | 0x3E => {
                let val = self.imm8(bus);
                self.set_reg8(index, y, val);
            }
            0x07 => {
                // RLCA: S/Z/PV untouched, H and N cleared.
                let (result, f) = alu::rlc8(self.regs.a);
                self.regs.a = result;
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | (f & (YF | XF | CF));
            }
            0x0F => {
                let (result, f) = alu::rrc8(self.regs.a);
                self.regs.a = result;
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | (f & (YF | XF | CF));
            }
            0x17 => {
                let (result, f) = alu::rl8(self.regs.a, self.regs.f & CF != 0);
                self.regs.a = result;
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | (f & (YF | XF | CF));
            }
            0x1F => {
                let (result, f) = alu::rr8(self.regs.a, self.regs.f & CF != 0);
                self.regs.a = result;
                self.regs.f = (self.regs.f & (SF | ZF | PF)) | (f & (YF | XF | CF));
            }
            0x27 => {
                let (result, f) = alu::daa(self.regs.a, self.regs.f);
                self.regs.a = result;
                self.regs.f = f;
            }
            0x2F => {
                // CPL
                self.regs.a = !self.regs.a;
                self.regs.f = (self.regs.f & (SF | ZF | PF | CF))
                    | HF
                    | NF
                    | (self.regs.a & (YF | XF));
            }
            0x37 => {
                // SCF
                self.regs.f =
                    (self.regs.f & (SF | ZF | PF)) | CF | (self.regs.a & (YF | XF));
            }
            0x3F => {
                // CCF: H takes the old carry.
                let old_carry = self.regs.f & CF != 0;
                let mut f = (self.regs.f & (SF | ZF | PF)) | (self.regs.a & (YF | XF));
                if old_carry {
                    f |= HF;
                } else {
                    f |= CF;
                }
                self.regs.f = f;
            }

            // === 0xC0-0xFF ===
            0xC0 | 0xC8 | 0xD0 | 0xD8 | 0xE0 | 0xE8 | 0xF0 | 0xF8 => {
                if self.condition(y) {
                    self.regs.pc = self.pop16(bus);
                    cycles += timing::RET_TAKEN;
                }
            }
            0xC1 | 0xD1 | 0xE1 | 0xF1 => {
                let val = self.pop16(bus);
                self.set_rp_af(index, p, val);
            }
            0xC9 => self.regs.pc = self.pop16(bus),
            0xD9 => self.regs.exx(),
            0xE9 => self.regs.pc = self.idx(index),
            0xF9 => self.regs.sp = self.idx(index),
            0xC2 | 0xCA | 0xD2 | 0xDA | 0xE2 | 0xEA | 0xF2 | 0xFA => {
                // JP cc,nn - same cost taken or not.
                let target = self.imm16(bus);
                if self.condition(y) {
                    self.regs.pc = target;
                }
            }
            0xC3 => self.regs.pc = self.imm16(bus),
            0xD3 => {
                // OUT (n),A - A supplies the high byte of the port.
                let n = self.imm8(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                bus.port_out(port, self.regs.a);
            }
            0xDB => {
                // IN A,(n) - no flags.
                let n = self.imm8(bus);
                let port = (u16::from(self.regs.a) << 8) | u16::from(n);
                self.regs.a = bus.port_in(port);
            }
            0xE3 => {
                // EX (SP),HL / EX (SP),IX
                let sp = self.regs.sp;
                let stacked = self.mem_read16(bus, sp);
                let val = self.idx(index);
                self.mem_write16(bus, sp, val);
                self.set_idx(index, stacked);
            }
            0xEB => self.regs.ex_de_hl(),
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }
            0xFB => self.arm_ei(),
            0xC4 | 0xCC | 0xD4 | 0xDC | 0xE4 | 0xEC | 0xF4 | 0xFC => {
                let target = self.imm16(bus);
                if self.condition(y) {
                    let pc = self.regs.pc;
                    self.push16(bus, pc);
                    self.regs.pc = target;
                    cycles += timing::CALL_TAKEN;
                }
            }
            0xC5 | 0xD5 | 0xE5 | 0xF5 => {
                let val = self.rp_af(index, p);
                self.push16(bus, val);
            }
            0xCD => {
                let target = self.imm16(bus);
                let pc = self.regs.pc;
                self.push16(bus, pc);
                self.regs.pc = target;
            }
            0xC6 | 0xCE | 0xD6 | 0xDE | 0xE6 | 0xEE | 0xF6 | 0xFE => {
                let val = self.imm8(bus);
                self.alu_acc(y, val);
            }
            0xC7 | 0xCF | 0xD7 | 0xDF | 0xE7 | 0xEF | 0xF7 | 0xFF => {
                let pc = self.regs.pc;
                self.push16(bus, pc);
                self.regs.pc = u16::from(y) * 8;
            }

            // Prefixes are consumed by step(); anything else is covered above.
            _ => unreachable!("prefix bytes dispatched by step()"),
        }
        cycles
    }

    /// Accumulator arithmetic/logic selected by the 3-bit operation field.
    fn alu_acc(&mut self, y: u8, operand: u8) {
        let a = self.regs.a;
        let carry = self.regs.f & CF != 0;
        let (result, f) = match y & 7 {
            0 => alu::add8(a, operand, false),
            1 => alu::add8(a, operand, carry),
            2 => alu::sub8(a, operand, false),
            3 => alu::sub8(a, operand, carry),
            4 => alu::and8(a, operand),
            5 => alu::xor8(a, operand),
            6 => alu::or8(a, operand),
            _ => alu::cp8(a, operand),
        };
        if y & 7 != 7 {
            self.regs.a = result;
        }
        self.regs.f = f;
    }

    /// CB-page rotate/shift selected by the 3-bit operation field.
    fn rot_shift(&self, y: u8, val: u8) -> (u8, u8) {
        match y & 7 {
            0 => alu::rlc8(val),
            1 => alu::rrc8(val),
            2 => alu::rl8(val, self.regs.f & CF != 0),
            3 => alu::rr8(val, self.regs.f & CF != 0),
            4 => alu::sla8(val),
            5 => alu::sra8(val),
            6 => alu::sll8(val),
            _ => alu::srl8(val),
        }
    }

    /// Flags for BIT b. `yx_source` is the operand for register forms and
    /// the high byte of the effective address for memory forms.
    fn bit_flags(&self, bit: u8, val: u8, yx_source: u8) -> u8 {
        let mut f = (self.regs.f & CF) | HF | (yx_source & (YF | XF));
        if val & (1 << bit) == 0 {
            f |= ZF | PF;
        } else if bit == 7 {
            f |= SF;
        }
        f
    }

    /// Execute a CB-prefixed instruction.
    pub(super) fn exec_cb<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_op(bus);
        let cycles = u32::from(timing::CB[op as usize]);
        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;

        if z == 6 {
            let addr = self.regs.hl();
            let val = self.mem_read(bus, addr);
            match x {
                0 => {
                    let (result, f) = self.rot_shift(y, val);
                    self.mem_write(bus, addr, result);
                    self.regs.f = f;
                }
                1 => self.regs.f = self.bit_flags(y, val, (addr >> 8) as u8),
                2 => self.mem_write(bus, addr, val & !(1 << y)),
                _ => self.mem_write(bus, addr, val | (1 << y)),
            }
        } else {
            let val = self.reg8(IndexMode::Hl, z);
            match x {
                0 => {
                    let (result, f) = self.rot_shift(y, val);
                    self.set_reg8(IndexMode::Hl, z, result);
                    self.regs.f = f;
                }
                1 => self.regs.f = self.bit_flags(y, val, val),
                2 => self.set_reg8(IndexMode::Hl, z, val & !(1 << y)),
                _ => self.set_reg8(IndexMode::Hl, z, val | (1 << y)),
            }
        }
        cycles
    }

    /// Execute a DDCB/FDCB instruction: `DD CB d op`.
    ///
    /// Every form operates on (IX+d)/(IY+d). When the register field of a
    /// read-modify-write form is not 6, the result is additionally copied
    /// into that register (undocumented). The displacement and sub-opcode
    /// are operand fetches: R does not advance for them.
    pub(super) fn exec_index_cb<B: Bus>(&mut self, bus: &mut B, index: IndexMode) -> u32 {
        let d = self.imm8(bus) as i8;
        let op = self.imm8(bus);
        let addr = self.idx(index).wrapping_add(d as u16);

        let x = op >> 6;
        let y = (op >> 3) & 7;
        let z = op & 7;

        let val = self.mem_read(bus, addr);
        if x == 1 {
            self.regs.f = self.bit_flags(y, val, (addr >> 8) as u8);
            return timing::INDEX_CB_BIT;
        }

        let result = match x {
            0 => {
                let (result, f) = self.rot_shift(y, val);
                self.regs.f = f;
                result
            }
            2 => val & !(1 << y),
            _ => val | (1 << y),
        };
        self.mem_write(bus, addr, result);
        if z != 6 {
            self.set_reg8(IndexMode::Hl, z, result);
        }
        timing::INDEX_CB_RMW
    }

    /// Execute an ED-prefixed instruction. Undefined opcodes are 8 T-state
    /// NOPs, never errors.
    pub(super) fn exec_ed<B: Bus>(&mut self, bus: &mut B) -> u32 {
        let op = self.fetch_op(bus);
        let mut cycles = u32::from(timing::ED[op as usize]);
        let y = (op >> 3) & 7;
        let p = (op >> 4) & 3;

        match op {
            0x40..=0x7F => match op & 7 {
                0 => {
                    // IN r,(C); y == 6 is the flags-only IN (C) form.
                    let val = bus.port_in(self.regs.bc());
                    if y != 6 {
                        self.set_reg8(IndexMode::Hl, y, val);
                    }
                    self.regs.f = (self.regs.f & CF) | sz53p(val);
                }
                1 => {
                    // OUT (C),r; y == 6 is the undocumented OUT (C),0.
                    let val = if y == 6 { 0 } else { self.reg8(IndexMode::Hl, y) };
                    bus.port_out(self.regs.bc(), val);
                }
                2 => {
                    let hl = self.regs.hl();
                    let rhs = self.rp(IndexMode::Hl, p);
                    let carry = self.regs.f & CF != 0;
                    let (result, f) = if op & 8 == 0 {
                        alu::sbc16(hl, rhs, carry)
                    } else {
                        alu::adc16(hl, rhs, carry)
                    };
                    self.regs.set_hl(result);
                    self.regs.f = f;
                }
                3 => {
                    let addr = self.imm16(bus);
                    if op & 8 == 0 {
                        let val = self.rp(IndexMode::Hl, p);
                        self.mem_write16(bus, addr, val);
                    } else {
                        let val = self.mem_read16(bus, addr);
                        self.set_rp(IndexMode::Hl, p, val);
                    }
                }
                4 => {
                    // NEG (documented at 0x44, mirrored across the page).
                    let (result, f) = alu::sub8(0, self.regs.a, false);
                    self.regs.a = result;
                    self.regs.f = f;
                }
                5 => {
                    // RETN / RETI: both restore IFF1 from IFF2.
                    self.regs.iff1 = self.regs.iff2;
                    self.regs.pc = self.pop16(bus);
                }
                6 => {
                    self.regs.im = match y & 3 {
                        2 => 1,
                        3 => 2,
                        _ => 0,
                    };
                }
                _ => match op {
                    0x47 => self.regs.i = self.regs.a,
                    0x4F => self.regs.r = self.regs.a,
                    0x57 => {
                        self.regs.a = self.regs.i;
                        self.ld_a_ir_flags();
                    }
                    0x5F => {
                        self.regs.a = self.regs.r;
                        self.ld_a_ir_flags();
                    }
                    0x67 => {
                        // RRD: low nibble of (HL) into A, nibbles shuffle right.
                        let addr = self.regs.hl();
                        let m = self.mem_read(bus, addr);
                        let a = self.regs.a;
                        self.mem_write(bus, addr, (a << 4) | (m >> 4));
                        self.regs.a = (a & 0xF0) | (m & 0x0F);
                        self.regs.f = (self.regs.f & CF) | sz53p(self.regs.a);
                    }
                    0x6F => {
                        // RLD: nibbles shuffle left through A.
                        let addr = self.regs.hl();
                        let m = self.mem_read(bus, addr);
                        let a = self.regs.a;
                        self.mem_write(bus, addr, (m << 4) | (a & 0x0F));
                        self.regs.a = (a & 0xF0) | (m >> 4);
                        self.regs.f = (self.regs.f & CF) | sz53p(self.regs.a);
                    }
                    _ => {} // 0x77, 0x7F: NOP
                },
            },

            0xA0 => cycles += self.block_transfer(bus, 1, false),
            0xA8 => cycles += self.block_transfer(bus, -1, false),
            0xB0 => cycles += self.block_transfer(bus, 1, true),
            0xB8 => cycles += self.block_transfer(bus, -1, true),

            0xA1 => cycles += self.block_compare(bus, 1, false),
            0xA9 => cycles += self.block_compare(bus, -1, false),
            0xB1 => cycles += self.block_compare(bus, 1, true),
            0xB9 => cycles += self.block_compare(bus, -1, true),

            0xA2 => cycles += self.block_in(bus, 1, false),
            0xAA => cycles += self.block_in(bus, -1, false),
            0xB2 => cycles += self.block_in(bus, 1, true),
            0xBA => cycles += self.block_in(bus, -1, true),

            0xA3 => cycles += self.block_out(bus, 1, false),
            0xAB => cycles += self.block_out(bus, -1, false),
            0xB3 => cycles += self.block_out(bus, 1, true),
            0xBB => cycles += self.block_out(bus, -1, true),

            _ => {} // Undefined ED opcode: 8 T-state NOP.
        }
        cycles
    }

    /// Flags for LD A,I / LD A,R: S/Z/Y/X from the value, PV = IFF2.
    fn ld_a_ir_flags(&mut self) {
        let mut f = (self.regs.f & CF) | sz53(self.regs.a);
        if self.regs.iff2 {
            f |= PF;
        }
        self.regs.f = f;
    }

    /// LDI/LDD/LDIR/LDDR. Returns the repeat penalty when re-executing.
    fn block_transfer<B: Bus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        let hl = self.regs.hl();
        let de = self.regs.de();
        let val = self.mem_read(bus, hl);
        self.mem_write(bus, de, val);
        self.regs.set_hl(hl.wrapping_add(dir as u16));
        self.regs.set_de(de.wrapping_add(dir as u16));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        // Undocumented: n = transferred byte + A; Y = bit 1, X = bit 3 of n.
        let n = val.wrapping_add(self.regs.a);
        let mut f = self.regs.f & (SF | ZF | CF);
        if n & 0x02 != 0 {
            f |= YF;
        }
        if n & 0x08 != 0 {
            f |= XF;
        }
        if bc != 0 {
            f |= PF;
        }
        self.regs.f = f;

        if repeat && bc != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            timing::BLOCK_REPEAT
        } else {
            0
        }
    }

    /// CPI/CPD/CPIR/CPDR. Z tracks A == (HL); repeats stop on match too.
    fn block_compare<B: Bus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        let hl = self.regs.hl();
        let val = self.mem_read(bus, hl);
        let (diff, sub_f) = alu::sub8(self.regs.a, val, false);
        self.regs.set_hl(hl.wrapping_add(dir as u16));
        let bc = self.regs.bc().wrapping_sub(1);
        self.regs.set_bc(bc);

        // Undocumented: n = A - (HL) - H; Y = bit 1, X = bit 3 of n.
        let n = diff.wrapping_sub(u8::from(sub_f & HF != 0));
        let mut f = (self.regs.f & CF) | (sub_f & (SF | ZF | HF)) | NF;
        if n & 0x02 != 0 {
            f |= YF;
        }
        if n & 0x08 != 0 {
            f |= XF;
        }
        if bc != 0 {
            f |= PF;
        }
        self.regs.f = f;

        if repeat && bc != 0 && sub_f & ZF == 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            timing::BLOCK_REPEAT
        } else {
            0
        }
    }

    /// INI/IND/INIR/INDR. Only Z (from B) and N are defined here.
    fn block_in<B: Bus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        let val = bus.port_in(self.regs.bc());
        let hl = self.regs.hl();
        self.mem_write(bus, hl, val);
        self.regs.set_hl(hl.wrapping_add(dir as u16));
        self.regs.b = self.regs.b.wrapping_sub(1);
        self.block_io_flags();

        if repeat && self.regs.b != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            timing::BLOCK_REPEAT
        } else {
            0
        }
    }

    /// OUTI/OUTD/OTIR/OTDR. B decrements before the port sees it.
    fn block_out<B: Bus>(&mut self, bus: &mut B, dir: i16, repeat: bool) -> u32 {
        let hl = self.regs.hl();
        let val = self.mem_read(bus, hl);
        self.regs.b = self.regs.b.wrapping_sub(1);
        bus.port_out(self.regs.bc(), val);
        self.regs.set_hl(hl.wrapping_add(dir as u16));
        self.block_io_flags();

        if repeat && self.regs.b != 0 {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            timing::BLOCK_REPEAT
        } else {
            0
        }
    }

    /// Block I/O flag update: Z from the decremented B, N set, the rest
    /// untouched.
    fn block_io_flags(&mut self) {
        let mut f = (self.regs.f & !(ZF | NF)) | NF;
        if self.regs.b == 0 {
            f |= ZF;
        }
        self.regs.f = f;
    }
}
