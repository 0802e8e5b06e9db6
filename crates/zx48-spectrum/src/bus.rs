//! The CPU's view of the machine for the duration of one call.
//!
//! Built fresh from borrows each time the frame driver steps the CPU, so no
//! component ever holds a reference to another. Port decoding is the 48K
//! rule: any port with bit 0 clear is the ULA; everything else floats.

use zx48_z80::Bus;

use crate::memory::Memory;
use crate::ula::Ula;

/// Per-call bus wiring memory and ULA to the CPU.
pub struct SystemBus<'a> {
    pub memory: &'a mut Memory,
    pub ula: &'a mut Ula,
}

impl Bus for SystemBus<'_> {
    fn read8(&mut self, addr: u16) -> u8 {
        self.memory.read8(addr)
    }

    fn write8(&mut self, addr: u16, val: u8) {
        self.memory.write8(addr, val);
    }

    fn port_in(&mut self, port: u16) -> u8 {
        if port & 1 == 0 {
            self.ula.read(port)
        } else {
            self.ula.floating_bus()
        }
    }

    fn port_out(&mut self, port: u16, val: u8) {
        if port & 1 == 0 {
            self.ula.write(val);
        }
    }

    fn contention(&mut self, addr: u16) -> u32 {
        self.ula.contention(addr)
    }
}
