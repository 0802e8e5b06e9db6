//! Frame driver: the machine itself.
//!
//! Owns the CPU, memory, ULA, tape player and beeper, and runs them one
//! 69,888 T-state frame at a time. Per instruction: step the CPU (building a
//! fresh [`SystemBus`] borrow for the call), advance the tape to the CPU's
//! clock and feed its EAR bit to the ULA, tick the ULA beam, and poll the
//! speaker into the beeper. At the frame boundary the pending beeper
//! interval is flushed and the ULA's interrupt is offered to the CPU.
//!
//! Everything is synchronous and deterministic; given the same starting
//! state and the same key/tape-control schedule, two runs are bit-for-bit
//! identical.

use zx48_z80::{Registers, Z80};

use crate::beeper::{Beeper, BeeperSample};
use crate::bus::SystemBus;
use crate::error::LoadError;
use crate::memory::Memory;
use crate::tape::{TapeBlock, TapePlayer};
use crate::ula::{SCANLINES_PER_FRAME, TSTATES_PER_SCANLINE, Ula};

/// T-states in one 50 Hz frame.
pub const TSTATES_PER_FRAME: u32 = SCANLINES_PER_FRAME * TSTATES_PER_SCANLINE;

/// A ZX Spectrum 48K.
pub struct Spectrum {
    cpu: Z80,
    memory: Memory,
    ula: Ula,
    tape: TapePlayer,
    beeper: Beeper,
    frame_count: u64,
}

impl Spectrum {
    /// Build a machine around a 16K ROM image.
    ///
    /// # Errors
    ///
    /// `LoadError::RomSize` unless the image is exactly 16,384 bytes.
    pub fn new(rom: &[u8]) -> Result<Self, LoadError> {
        Ok(Self {
            cpu: Z80::new(),
            memory: Memory::new(rom)?,
            ula: Ula::new(),
            tape: TapePlayer::new(),
            beeper: Beeper::new(),
            frame_count: 0,
        })
    }

    /// Run exactly one frame's worth of T-states.
    ///
    /// The frame budget is a target delta on the monotonic CPU clock, so an
    /// instruction straddling the boundary is never split; the overshoot
    /// simply starts the next frame.
    pub fn run_frame(&mut self) {
        self.ula.begin_frame();
        let target = self.cpu.tstates() + u64::from(TSTATES_PER_FRAME);

        while self.cpu.tstates() < target {
            self.step();
        }

        self.beeper.flush(self.cpu.tstates());

        if self.ula.int_pending() {
            let accepted = {
                let mut bus = SystemBus {
                    memory: &mut self.memory,
                    ula: &mut self.ula,
                };
                self.cpu.interrupt(&mut bus)
            };
            if accepted > 0 {
                self.ula.acknowledge_int();
                self.sync_peripherals(accepted);
            }
        }

        self.frame_count += 1;
    }

    /// Execute a single instruction and keep the peripherals in step.
    /// Returns the T-states consumed.
    pub fn step(&mut self) -> u32 {
        let cycles = {
            let mut bus = SystemBus {
                memory: &mut self.memory,
                ula: &mut self.ula,
            };
            self.cpu.step(&mut bus)
        };
        self.sync_peripherals(cycles);
        cycles
    }

    /// Bring tape, beam and beeper up to the CPU's clock.
    fn sync_peripherals(&mut self, cycles: u32) {
        self.ula.ear_in = self.tape.update(self.cpu.tstates());
        self.ula.tick(cycles);
        self.beeper.update(self.ula.speaker(), self.cpu.tstates());
    }

    /// Completed frame count (the renderer's FLASH toggles every 16).
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    // === CPU and memory access ===

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.cpu
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    #[must_use]
    pub fn ula(&self) -> &Ula {
        &self.ula
    }

    pub fn ula_mut(&mut self) -> &mut Ula {
        &mut self.ula
    }

    /// Restore the CPU register file (snapshot collaborators).
    pub fn set_registers(&mut self, regs: Registers) {
        self.cpu.regs = regs;
    }

    /// Replace all 48K of RAM (snapshot collaborators).
    ///
    /// # Errors
    ///
    /// `LoadError::RamSize` unless the image is exactly 49,152 bytes.
    pub fn restore_ram(&mut self, ram: &[u8]) -> Result<(), LoadError> {
        self.memory.restore_ram(ram)
    }

    // === Keyboard ===

    pub fn key_down(&mut self, row: usize, col: u8) {
        self.ula.key_down(row, col);
    }

    pub fn key_up(&mut self, row: usize, col: u8) {
        self.ula.key_up(row, col);
    }

    pub fn release_all_keys(&mut self) {
        self.ula.release_all();
    }

    // === Tape deck ===

    pub fn insert_tape(&mut self, blocks: Vec<TapeBlock>) {
        self.tape.insert(blocks);
    }

    pub fn eject_tape(&mut self) {
        self.tape.eject();
    }

    pub fn play_tape(&mut self) {
        self.tape.play();
    }

    pub fn pause_tape(&mut self) {
        self.tape.pause();
    }

    pub fn stop_tape(&mut self) {
        self.tape.stop();
    }

    pub fn rewind_tape(&mut self) {
        self.tape.rewind();
    }

    #[must_use]
    pub fn tape(&self) -> &TapePlayer {
        &self.tape
    }

    // === Renderer and audio-sink surfaces ===

    /// Screen bitmap bytes ($4000-$57FF).
    #[must_use]
    pub fn screen(&self) -> &[u8] {
        self.memory.screen()
    }

    /// Attribute bytes ($5800-$5AFF).
    #[must_use]
    pub fn attributes(&self) -> &[u8] {
        self.memory.attributes()
    }

    /// Current border colour.
    #[must_use]
    pub fn border(&self) -> u8 {
        self.ula.border()
    }

    /// This frame's border writes as (frame T-state, colour).
    #[must_use]
    pub fn border_log(&self) -> &[(u32, u8)] {
        self.ula.border_log()
    }

    /// Drain the beeper interval stream.
    pub fn take_audio(&mut self) -> Vec<BeeperSample> {
        self.beeper.take_samples()
    }

    /// Reset the machine. RAM and the monotonic clock survive, as they do
    /// on real hardware.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.ula = Ula::new();
        self.beeper = Beeper::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ROM_SIZE;

    /// Machine with a ROM that disables interrupts and halts.
    fn halted_spectrum() -> Spectrum {
        let mut rom = vec![0u8; ROM_SIZE];
        rom[0] = 0xF3; // DI
        rom[1] = 0x76; // HALT
        Spectrum::new(&rom).expect("ROM is the right size")
    }

    #[test]
    fn rejects_bad_rom() {
        assert!(matches!(
            Spectrum::new(&[0u8; 100]),
            Err(LoadError::RomSize(100))
        ));
    }

    #[test]
    fn frame_advances_the_clock_by_one_frame() {
        let mut spectrum = halted_spectrum();
        let start = spectrum.cpu().tstates();
        spectrum.run_frame();
        let elapsed = spectrum.cpu().tstates() - start;
        // The final HALT step may overshoot by up to one instruction.
        assert!(
            (u64::from(TSTATES_PER_FRAME)..u64::from(TSTATES_PER_FRAME) + 4).contains(&elapsed),
            "frame consumed {elapsed} T-states"
        );
        assert_eq!(spectrum.frame_count(), 1);
    }

    #[test]
    fn interrupt_latched_when_masked_and_taken_after_ei() {
        // DI; HALT: the frame interrupt stays pending.
        let mut spectrum = halted_spectrum();
        spectrum.run_frame();
        assert!(spectrum.ula().int_pending(), "interrupt refused under DI");

        // EI; HALT: taken at the frame boundary.
        let mut rom = vec![0u8; ROM_SIZE];
        rom[0] = 0xFB;
        rom[1] = 0x76;
        // IM1 handler at $0038: EI; HALT again.
        rom[0x38] = 0xFB;
        rom[0x39] = 0x76;
        let mut spectrum = Spectrum::new(&rom).unwrap();
        spectrum.run_frame();
        assert!(!spectrum.ula().int_pending());
        assert_eq!(spectrum.cpu().regs.pc, 0x0038, "vectored to the IM1 handler");
        assert!(!spectrum.cpu().regs.iff1, "IFF1 cleared by acceptance");
    }

    #[test]
    fn beeper_stream_covers_the_frame() {
        let mut spectrum = halted_spectrum();
        spectrum.run_frame();
        let samples = spectrum.take_audio();
        let total: u64 = samples.iter().map(|s| u64::from(s.duration_tstates)).sum();
        assert_eq!(total, spectrum.cpu().tstates());
    }

    #[test]
    fn border_log_cleared_each_frame() {
        // OUT ($FE),A then HALT: one border write in frame 1.
        let mut rom = vec![0u8; ROM_SIZE];
        rom[0] = 0xF3; // DI
        rom[1] = 0x3E; // LD A,2
        rom[2] = 0x02;
        rom[3] = 0xD3; // OUT ($FE),A
        rom[4] = 0xFE;
        rom[5] = 0x76; // HALT
        let mut spectrum = Spectrum::new(&rom).unwrap();
        spectrum.run_frame();
        assert_eq!(spectrum.border_log().len(), 1);
        assert_eq!(spectrum.border(), 2);

        spectrum.run_frame();
        assert!(spectrum.border_log().is_empty(), "log is per-frame");
        assert_eq!(spectrum.border(), 2, "colour itself persists");
    }

    #[test]
    fn determinism_two_runs_match() {
        let build = || {
            let mut rom = vec![0u8; ROM_SIZE];
            // Busy loop poking the screen: LD HL,$4000 / INC (HL) / JR -3
            rom[0] = 0x21;
            rom[1] = 0x00;
            rom[2] = 0x40;
            rom[3] = 0x34;
            rom[4] = 0x18;
            rom[5] = 0xFD;
            Spectrum::new(&rom).unwrap()
        };
        let mut a = build();
        let mut b = build();
        for _ in 0..3 {
            a.run_frame();
            b.run_frame();
        }
        assert_eq!(a.cpu().regs, b.cpu().regs);
        assert_eq!(a.cpu().tstates(), b.cpu().tstates());
        assert_eq!(a.memory().ram(), b.memory().ram());
        assert_eq!(a.border_log(), b.border_log());
    }

    #[test]
    fn reset_preserves_ram_and_clock() {
        let mut spectrum = halted_spectrum();
        spectrum.memory_mut().write8(0x8000, 0xAB);
        spectrum.run_frame();
        let clock = spectrum.cpu().tstates();

        spectrum.reset();
        assert_eq!(spectrum.cpu().regs.pc, 0);
        assert_eq!(spectrum.memory().read8(0x8000), 0xAB);
        assert_eq!(spectrum.cpu().tstates(), clock, "monotonic clock survives");
    }
}
