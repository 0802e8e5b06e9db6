//! Tape: parsed block model, wire-format parsers and the pulse player.
//!
//! A tape is an ordered sequence of [`TapeBlock`]s. The parsers in
//! [`tap`] and [`tzx`] produce that sequence from the two wire formats;
//! [`TapePlayer`] turns it into EAR edges at absolute T-states.

pub mod player;
pub mod tap;
pub mod tzx;

pub use player::TapePlayer;

/// Standard ROM pilot pulse length in T-states.
pub const PILOT_PULSE: u16 = 2168;

/// First sync pulse length.
pub const SYNC1_PULSE: u16 = 667;

/// Second sync pulse length.
pub const SYNC2_PULSE: u16 = 735;

/// Zero-bit pulse length (two pulses per bit).
pub const ZERO_PULSE: u16 = 855;

/// One-bit pulse length (two pulses per bit).
pub const ONE_PULSE: u16 = 1710;

/// Pilot pulses before a header block (flag byte $00).
pub const HEADER_PILOT_COUNT: u16 = 8063;

/// Pilot pulses before a data block (flag byte $FF).
pub const DATA_PILOT_COUNT: u16 = 3223;

/// T-states per millisecond at the 3.5 MHz Spectrum clock.
pub const TSTATES_PER_MS: u32 = 3500;

/// A parsed tape block.
///
/// Signal blocks carry their own timing; control blocks steer the player;
/// informational blocks are skipped during playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapeBlock {
    /// Standard or turbo speed data: pilot tone, two sync pulses, then data
    /// bits as pulse pairs. `used_bits` applies to the final byte (0 means
    /// all eight).
    Standard {
        pilot_pulse: u16,
        sync1: u16,
        sync2: u16,
        zero_pulse: u16,
        one_pulse: u16,
        pilot_count: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// Repeated single pulse.
    PureTone { pulse_len: u16, count: u16 },
    /// Arbitrary pulse lengths, one toggle each.
    PulseSequence { pulses: Vec<u16> },
    /// Data bits without pilot or sync.
    PureData {
        zero_pulse: u16,
        one_pulse: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// One EAR sample per `tstates_per_sample`, MSB first.
    DirectRecording {
        tstates_per_sample: u16,
        used_bits: u8,
        pause_ms: u16,
        data: Vec<u8>,
    },
    /// Silence. `ms == 0` means stop the tape.
    Pause { ms: u16 },
    /// Begin a repeated group of blocks.
    LoopStart { count: u16 },
    /// End of the repeated group.
    LoopEnd,
    /// Relative jump by a signed block offset.
    Jump { offset: i16 },
    /// Stop the tape on 48K machines (which this is).
    StopIf48K,
    // Informational blocks: no playback effect.
    GroupStart { name: String },
    GroupEnd,
    Text { text: String },
    Message { display_secs: u8, text: String },
    ArchiveInfo { entries: Vec<(u8, String)> },
    Hardware,
    Custom { id: String },
    Glue,
}

impl TapeBlock {
    /// A standard-speed block with ROM timings. The pilot count follows the
    /// flag byte: headers get the long tone, data blocks the short one.
    #[must_use]
    pub fn rom_standard(data: Vec<u8>, pause_ms: u16) -> Self {
        let pilot_count = if data.first() == Some(&0x00) {
            HEADER_PILOT_COUNT
        } else {
            DATA_PILOT_COUNT
        };
        TapeBlock::Standard {
            pilot_pulse: PILOT_PULSE,
            sync1: SYNC1_PULSE,
            sync2: SYNC2_PULSE,
            zero_pulse: ZERO_PULSE,
            one_pulse: ONE_PULSE,
            pilot_count,
            used_bits: 8,
            pause_ms,
            data,
        }
    }

    /// Payload bytes for the data-carrying blocks.
    pub(crate) fn data(&self) -> &[u8] {
        match self {
            TapeBlock::Standard { data, .. }
            | TapeBlock::PureData { data, .. }
            | TapeBlock::DirectRecording { data, .. } => data,
            _ => &[],
        }
    }
}
