//! Documented T-state costs for every opcode page.
//!
//! Conditional instructions carry their not-taken cost; the executor adds
//! the taken penalty. Indexed-operand and block-repeat penalties are named
//! constants added at the use site.

/// Cost of a DD/FD prefix byte.
pub const PREFIX: u32 = 4;

/// Extra cost of an (IX+d)/(IY+d) operand over the (HL) form, on top of the
/// prefix: displacement fetch plus the internal address add.
pub const INDEX_OPERAND: u32 = 8;

/// Extra cost of LD (IX+d),n over LD (HL),n; the displacement and immediate
/// fetches overlap, so it is cheaper than the general operand penalty.
pub const INDEX_LD_IMM: u32 = 5;

/// DDCB/FDCB BIT on top of the prefix cost.
pub const INDEX_CB_BIT: u32 = 16;

/// DDCB/FDCB read-modify-write on top of the prefix cost.
pub const INDEX_CB_RMW: u32 = 19;

/// Taken JR / DJNZ penalty.
pub const JR_TAKEN: u32 = 5;

/// Taken conditional RET penalty.
pub const RET_TAKEN: u32 = 6;

/// Taken conditional CALL penalty.
pub const CALL_TAKEN: u32 = 7;

/// Penalty when a block instruction repeats (21 vs 16 T-states).
pub const BLOCK_REPEAT: u32 = 5;

/// T-states consumed per step while halted.
pub const HALT_STEP: u32 = 4;

/// Maskable interrupt acceptance in IM 0/1.
pub const INT_IM01: u32 = 13;

/// Maskable interrupt acceptance in IM 2 (vector fetch included).
pub const INT_IM2: u32 = 19;

/// Non-maskable interrupt acceptance.
pub const INT_NMI: u32 = 11;

/// Base page costs. Prefix entries (CB/ED/DD/FD) are dispatched separately
/// and never read from this table.
#[rustfmt::skip]
pub const BASE: [u8; 256] = [
    //  0   1   2   3   4   5   6   7   8   9   A   B   C   D   E   F
        4, 10,  7,  6,  4,  4,  7,  4,  4, 11,  7,  6,  4,  4,  7,  4, // 0x00
        8, 10,  7,  6,  4,  4,  7,  4, 12, 11,  7,  6,  4,  4,  7,  4, // 0x10
        7, 10, 16,  6,  4,  4,  7,  4,  7, 11, 16,  6,  4,  4,  7,  4, // 0x20
        7, 10, 13,  6, 11, 11, 10,  4,  7, 11, 13,  6,  4,  4,  7,  4, // 0x30
        4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x40
        4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x50
        4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x60
        7,  7,  7,  7,  7,  7,  4,  7,  4,  4,  4,  4,  4,  4,  7,  4, // 0x70
        4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x80
        4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0x90
        4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0xA0
        4,  4,  4,  4,  4,  4,  7,  4,  4,  4,  4,  4,  4,  4,  7,  4, // 0xB0
        5, 10, 10, 10, 10, 11,  7, 11,  5, 10, 10,  0, 10, 17,  7, 11, // 0xC0
        5, 10, 10, 11, 10, 11,  7, 11,  5,  4, 10, 11, 10,  0,  7, 11, // 0xD0
        5, 10, 10, 19, 10, 11,  7, 11,  5,  4, 10,  4, 10,  0,  7, 11, // 0xE0
        5, 10, 10,  4, 10, 11,  7, 11,  5,  6, 10,  4, 10,  0,  7, 11, // 0xF0
];

/// CB page costs, fetch of both opcode bytes included.
pub const CB: [u8; 256] = build_cb();

const fn build_cb() -> [u8; 256] {
    let mut t = [8u8; 256];
    let mut op = 0;
    while op < 256 {
        if op & 7 == 6 {
            // (HL) forms: BIT reads only, the rest read-modify-write.
            t[op] = if op >> 6 == 1 { 12 } else { 15 };
        }
        op += 1;
    }
    t
}

/// ED page costs. Undefined entries are the documented 8 T-state NOP.
pub const ED: [u8; 256] = build_ed();

const fn build_ed() -> [u8; 256] {
    let mut t = [8u8; 256];
    let mut op = 0x40;
    while op < 0x80 {
        match op & 7 {
            0 | 1 => t[op] = 12, // IN r,(C) / OUT (C),r
            2 => t[op] = 15,     // SBC/ADC HL,rp
            3 => t[op] = 20,     // LD (nn),rp / LD rp,(nn)
            5 => t[op] = 14,     // RETN / RETI
            7 => {
                t[op] = match op {
                    0x47 | 0x4F | 0x57 | 0x5F => 9, // LD I,A / R,A / A,I / A,R
                    0x67 | 0x6F => 18,              // RRD / RLD
                    _ => 8,
                };
            }
            _ => {} // NEG, IM: 8
        }
        op += 1;
    }
    // Block transfer/compare/IO families; repeats add BLOCK_REPEAT.
    let mut op = 0xA0;
    while op < 0xC0 {
        if op & 7 < 4 {
            t[op] = 16;
        }
        op += 1;
    }
    t
}
