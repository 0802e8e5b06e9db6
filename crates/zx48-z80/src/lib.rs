//! Instruction-stepping Zilog Z80 interpreter.
//!
//! Each call to [`Z80::step`] fetches, decodes and executes exactly one
//! instruction and returns its cost in T-states, including any wait states
//! the bus reports for contended memory. The CPU owns no bus: memory and I/O
//! are reached through the [`Bus`] trait passed to every call, so a machine
//! can wire the CPU to whatever it likes without back-references.
//!
//! The decoder covers the full base set plus the CB/ED/DD/FD/DDCB/FDCB
//! prefix pages, including the undocumented corners real software leans on:
//! IXH/IXL/IYH/IYL register halves, SLL, the DDCB copy-to-register forms,
//! OUT (C),0, and the Y/X flag bits of every result.

mod alu;
mod bus;
mod cpu;
mod flags;
mod registers;
mod timing;

pub use bus::Bus;
pub use cpu::Z80;
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use registers::Registers;
