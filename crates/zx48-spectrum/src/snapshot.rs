//! Snapshot restore surface.
//!
//! Snapshot file parsing belongs to the host; what the core provides is a
//! complete machine-state struct and an all-or-nothing `apply`. Validation
//! runs before any mutation, so a rejected snapshot leaves the machine
//! exactly as it was.

use zx48_z80::Registers;

use crate::error::{LoadError, SnapshotError};
use crate::memory::RAM_SIZE;
use crate::spectrum::Spectrum;

/// Machine state captured by a snapshot.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Hardware mode from the snapshot header. A 48K machine accepts 0
    /// (48K), 1 (48K + Interface 1) and 3 (48K + MGT).
    pub hardware_mode: u8,
    /// Full register file, shadow set and interrupt state included.
    pub registers: Registers,
    /// Border colour.
    pub border: u8,
    /// All 49,152 bytes of RAM.
    pub ram: Vec<u8>,
}

impl Snapshot {
    /// Restore this snapshot into `spectrum`.
    ///
    /// # Errors
    ///
    /// [`SnapshotError::HardwareMode`] for a non-48K hardware mode and
    /// [`LoadError::RamSize`] for a short or long RAM image. The machine is
    /// untouched on error.
    pub fn apply(&self, spectrum: &mut Spectrum) -> Result<(), SnapshotError> {
        match self.hardware_mode {
            0 | 1 | 3 => {}
            mode => return Err(SnapshotError::HardwareMode(mode)),
        }
        if self.ram.len() != RAM_SIZE {
            return Err(LoadError::RamSize(self.ram.len()).into());
        }

        spectrum.restore_ram(&self.ram)?;
        spectrum.set_registers(self.registers);
        spectrum.ula_mut().set_border(self.border);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ROM_SIZE;

    fn make_spectrum() -> Spectrum {
        Spectrum::new(&[0u8; ROM_SIZE]).unwrap()
    }

    fn make_snapshot() -> Snapshot {
        let mut regs = Registers::default();
        regs.pc = 0x8000;
        regs.sp = 0xFF00;
        regs.a = 0x42;
        regs.i = 0x3F;
        regs.iff1 = true;
        regs.iff2 = true;
        regs.im = 1;
        let mut ram = vec![0u8; RAM_SIZE];
        ram[0] = 0xAA; // $4000
        ram[RAM_SIZE - 1] = 0xBB; // $FFFF
        Snapshot {
            hardware_mode: 0,
            registers: regs,
            border: 5,
            ram,
        }
    }

    #[test]
    fn apply_restores_everything() {
        let mut spectrum = make_spectrum();
        make_snapshot().apply(&mut spectrum).unwrap();

        assert_eq!(spectrum.cpu().regs.pc, 0x8000);
        assert_eq!(spectrum.cpu().regs.a, 0x42);
        assert_eq!(spectrum.cpu().regs.im, 1);
        assert!(spectrum.cpu().regs.iff1);
        assert_eq!(spectrum.border(), 5);
        assert_eq!(spectrum.memory().read8(0x4000), 0xAA);
        assert_eq!(spectrum.memory().read8(0xFFFF), 0xBB);
    }

    #[test]
    fn hardware_modes_0_1_3_accepted() {
        for mode in [0, 1, 3] {
            let mut spectrum = make_spectrum();
            let mut snapshot = make_snapshot();
            snapshot.hardware_mode = mode;
            assert!(snapshot.apply(&mut spectrum).is_ok(), "mode {mode}");
        }
    }

    #[test]
    fn other_hardware_modes_rejected() {
        for mode in [2, 4, 5, 0xFF] {
            let mut spectrum = make_spectrum();
            let mut snapshot = make_snapshot();
            snapshot.hardware_mode = mode;
            assert_eq!(
                snapshot.apply(&mut spectrum),
                Err(SnapshotError::HardwareMode(mode))
            );
        }
    }

    #[test]
    fn rejected_snapshot_leaves_machine_untouched() {
        let mut spectrum = make_spectrum();
        spectrum.memory_mut().write8(0x4000, 0x77);
        spectrum.cpu_mut().regs.pc = 0x1234;

        let mut snapshot = make_snapshot();
        snapshot.hardware_mode = 2;
        assert!(snapshot.apply(&mut spectrum).is_err());
        assert_eq!(spectrum.memory().read8(0x4000), 0x77);
        assert_eq!(spectrum.cpu().regs.pc, 0x1234);

        // Bad RAM size is caught before mutation too.
        let mut snapshot = make_snapshot();
        snapshot.ram.truncate(100);
        assert_eq!(
            snapshot.apply(&mut spectrum),
            Err(SnapshotError::Load(LoadError::RamSize(100)))
        );
        assert_eq!(spectrum.memory().read8(0x4000), 0x77);
    }
}
