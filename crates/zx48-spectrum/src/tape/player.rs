//! Tape pulse player: parsed blocks in, EAR edges out.
//!
//! The player schedules every edge at an absolute T-state. Each call to
//! [`TapePlayer::update`] with the CPU's current clock replays all edges up
//! to that instant and returns the resulting EAR level, so the bit a port
//! read observes always reflects tape state at or before the CPU's own
//! T-state. Deck controls take effect on the next update; while the deck is
//! stopped the edge schedule is frozen relative to the CPU clock.

use crate::tape::{TSTATES_PER_MS, TapeBlock};

/// Playback phase within the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Between blocks, or not started.
    Idle,
    Pilot,
    Sync1,
    Sync2,
    Data,
    Tone,
    Pulses,
    Direct,
    Pause,
}

/// Timing snapshot of the block being played.
#[derive(Debug, Clone, Copy, Default)]
struct Active {
    pilot: u64,
    sync1: u64,
    sync2: u64,
    zero: u64,
    one: u64,
    sample: u64,
    used_bits: u8,
    pause_ms: u16,
    data_len: usize,
}

/// The tape pulse engine.
pub struct TapePlayer {
    blocks: Vec<TapeBlock>,
    block_index: usize,
    phase: Phase,
    playing: bool,
    ear: bool,
    /// Absolute T-state of the next edge (or pause deadline).
    next_edge: u64,
    /// Clock value at the previous update.
    last_update: u64,
    cur: Active,
    /// Pilot/tone edges still to emit.
    edges_remaining: u32,
    /// Cursor into a pulse-sequence block.
    pulse_index: usize,
    byte_pos: usize,
    bit_pos: u8,
    /// 0 or 1: two half-pulses per data bit.
    pulse_half: u8,
    /// (body start index, iterations left) per nested loop.
    loop_stack: Vec<(usize, u16)>,
}

impl TapePlayer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            block_index: 0,
            phase: Phase::Idle,
            playing: false,
            ear: false,
            next_edge: 0,
            last_update: 0,
            cur: Active::default(),
            edges_remaining: 0,
            pulse_index: 0,
            byte_pos: 0,
            bit_pos: 0,
            pulse_half: 0,
            loop_stack: Vec::new(),
        }
    }

    /// Insert a tape and rewind to its start.
    pub fn insert(&mut self, blocks: Vec<TapeBlock>) {
        self.blocks = blocks;
        self.rewind();
    }

    /// Remove the tape.
    pub fn eject(&mut self) {
        self.blocks.clear();
        self.rewind();
    }

    /// Start (or resume) playback.
    pub fn play(&mut self) {
        self.playing = true;
    }

    /// Pause playback in place; `play` resumes mid-pulse.
    pub fn pause(&mut self) {
        self.playing = false;
    }

    /// Stop playback. Resuming restarts the current block from its pilot.
    pub fn stop(&mut self) {
        self.playing = false;
        self.phase = Phase::Idle;
        self.ear = false;
    }

    /// Back to the first block.
    pub fn rewind(&mut self) {
        self.playing = false;
        self.block_index = 0;
        self.phase = Phase::Idle;
        self.ear = false;
        self.loop_stack.clear();
        self.pulse_index = 0;
        self.byte_pos = 0;
        self.bit_pos = 0;
        self.pulse_half = 0;
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// All blocks consumed?
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.block_index >= self.blocks.len()
    }

    /// Index of the block being played (for host UI).
    #[must_use]
    pub fn block_index(&self) -> usize {
        self.block_index
    }

    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Current EAR level without advancing time.
    #[must_use]
    pub fn ear(&self) -> bool {
        self.ear
    }

    /// Advance to the CPU's clock and return the EAR level.
    ///
    /// `now` is the monotonic T-state counter; calls must not go backwards.
    pub fn update(&mut self, now: u64) -> bool {
        let elapsed = now.saturating_sub(self.last_update);
        self.last_update = now;

        if !self.playing {
            // Deck stopped: hold the schedule still relative to the clock.
            self.next_edge = self.next_edge.saturating_add(elapsed);
            return self.ear;
        }

        if self.phase == Phase::Idle {
            self.start_block(now);
        }

        while self.playing && self.phase != Phase::Idle && now >= self.next_edge {
            let at = self.next_edge;
            self.step_edge(at);
        }

        self.ear
    }

    /// Process the edge scheduled at `at` and arm the next one.
    fn step_edge(&mut self, at: u64) {
        match self.phase {
            Phase::Pilot => {
                self.ear = !self.ear;
                self.edges_remaining -= 1;
                if self.edges_remaining == 0 {
                    self.phase = Phase::Sync1;
                    self.next_edge = at + self.cur.sync1;
                } else {
                    self.next_edge = at + self.cur.pilot;
                }
            }
            Phase::Sync1 => {
                self.ear = !self.ear;
                self.phase = Phase::Sync2;
                self.next_edge = at + self.cur.sync2;
            }
            Phase::Sync2 => {
                self.ear = !self.ear;
                self.begin_data(at);
            }
            Phase::Data => {
                self.ear = !self.ear;
                self.pulse_half += 1;
                if self.pulse_half == 2 {
                    self.pulse_half = 0;
                    self.advance_bit();
                }
                if self.byte_pos >= self.cur.data_len {
                    self.finish_block(at);
                } else {
                    self.next_edge = at + self.bit_pulse();
                }
            }
            Phase::Tone => {
                self.ear = !self.ear;
                self.edges_remaining -= 1;
                if self.edges_remaining == 0 {
                    self.advance_block(at);
                } else {
                    self.next_edge = at + self.cur.pilot;
                }
            }
            Phase::Pulses => {
                self.ear = !self.ear;
                self.pulse_index += 1;
                if self.pulse_index >= self.pulse_count() {
                    self.advance_block(at);
                } else {
                    self.next_edge = at + self.pulse_at(self.pulse_index);
                }
            }
            Phase::Direct => {
                let byte = self.data_byte(self.byte_pos);
                self.ear = byte >> (7 - self.bit_pos) & 1 != 0;
                self.advance_bit();
                if self.byte_pos >= self.cur.data_len {
                    self.finish_block(at);
                } else {
                    self.next_edge = at + self.cur.sample;
                }
            }
            Phase::Pause => {
                self.ear = false;
                self.advance_block(at);
            }
            Phase::Idle => unreachable!("idle phases never schedule edges"),
        }
    }

    /// Start the data phase of the current block at `at`.
    fn begin_data(&mut self, at: u64) {
        self.byte_pos = 0;
        self.bit_pos = 0;
        self.pulse_half = 0;
        if self.cur.data_len == 0 {
            self.finish_block(at);
        } else {
            self.phase = Phase::Data;
            self.next_edge = at + self.bit_pulse();
        }
    }

    /// Move the bit cursor one bit forward, honouring `used_bits` on the
    /// final byte.
    fn advance_bit(&mut self) {
        self.bit_pos += 1;
        let bits = if self.byte_pos + 1 == self.cur.data_len && self.cur.used_bits != 0 {
            self.cur.used_bits
        } else {
            8
        };
        if self.bit_pos >= bits {
            self.bit_pos = 0;
            self.byte_pos += 1;
        }
    }

    /// Pulse length for the bit under the cursor.
    fn bit_pulse(&self) -> u64 {
        let byte = self.data_byte(self.byte_pos);
        if byte >> (7 - self.bit_pos) & 1 != 0 {
            self.cur.one
        } else {
            self.cur.zero
        }
    }

    fn data_byte(&self, pos: usize) -> u8 {
        self.blocks[self.block_index].data().get(pos).copied().unwrap_or(0)
    }

    fn pulse_count(&self) -> usize {
        match &self.blocks[self.block_index] {
            TapeBlock::PulseSequence { pulses } => pulses.len(),
            _ => 0,
        }
    }

    fn pulse_at(&self, i: usize) -> u64 {
        match &self.blocks[self.block_index] {
            TapeBlock::PulseSequence { pulses } => u64::from(pulses[i]),
            _ => 0,
        }
    }

    /// The current block's signal is done: pause if it asks for one, else
    /// move straight on.
    fn finish_block(&mut self, at: u64) {
        if self.cur.pause_ms > 0 {
            self.phase = Phase::Pause;
            self.ear = false;
            self.next_edge = at + pause_tstates(self.cur.pause_ms);
        } else {
            self.advance_block(at);
        }
    }

    fn advance_block(&mut self, at: u64) {
        self.block_index += 1;
        self.start_block(at);
    }

    /// Enter the block at `block_index`, processing any run of control and
    /// informational blocks until a signal (or pause) arms the schedule.
    fn start_block(&mut self, at: u64) {
        // Control blocks can only chain so far before something must play;
        // a tape that exceeds this is cyclic and would hang the frame loop.
        let mut budget = 100_000u32;
        loop {
            budget -= 1;
            if budget == 0 {
                self.playing = false;
                self.phase = Phase::Idle;
                log::warn!("tape: control blocks never reach a signal, stopping");
                return;
            }
            if self.block_index >= self.blocks.len() {
                self.playing = false;
                self.phase = Phase::Idle;
                log::debug!("tape: end of tape reached");
                return;
            }
            let block = self.blocks[self.block_index].clone();
            match block {
                TapeBlock::Standard {
                    pilot_pulse,
                    sync1,
                    sync2,
                    zero_pulse,
                    one_pulse,
                    pilot_count,
                    used_bits,
                    pause_ms,
                    data,
                } => {
                    if data.is_empty() {
                        self.block_index += 1;
                        continue;
                    }
                    self.cur = Active {
                        pilot: u64::from(pilot_pulse),
                        sync1: u64::from(sync1),
                        sync2: u64::from(sync2),
                        zero: u64::from(zero_pulse),
                        one: u64::from(one_pulse),
                        sample: 0,
                        used_bits,
                        pause_ms,
                        data_len: data.len(),
                    };
                    if pilot_count == 0 {
                        self.phase = Phase::Sync1;
                        self.next_edge = at + self.cur.sync1;
                    } else {
                        self.phase = Phase::Pilot;
                        self.edges_remaining = u32::from(pilot_count) * 2;
                        self.next_edge = at + self.cur.pilot;
                    }
                    return;
                }
                TapeBlock::PureTone { pulse_len, count } => {
                    if count == 0 {
                        self.block_index += 1;
                        continue;
                    }
                    self.cur = Active {
                        pilot: u64::from(pulse_len),
                        ..Active::default()
                    };
                    self.phase = Phase::Tone;
                    self.edges_remaining = u32::from(count);
                    self.next_edge = at + self.cur.pilot;
                    return;
                }
                TapeBlock::PulseSequence { pulses } => {
                    if pulses.is_empty() {
                        self.block_index += 1;
                        continue;
                    }
                    self.cur = Active::default();
                    self.phase = Phase::Pulses;
                    self.pulse_index = 0;
                    self.next_edge = at + u64::from(pulses[0]);
                    return;
                }
                TapeBlock::PureData {
                    zero_pulse,
                    one_pulse,
                    used_bits,
                    pause_ms,
                    data,
                } => {
                    if data.is_empty() {
                        self.block_index += 1;
                        continue;
                    }
                    self.cur = Active {
                        zero: u64::from(zero_pulse),
                        one: u64::from(one_pulse),
                        used_bits,
                        pause_ms,
                        data_len: data.len(),
                        ..Active::default()
                    };
                    self.begin_data(at);
                    return;
                }
                TapeBlock::DirectRecording {
                    tstates_per_sample,
                    used_bits,
                    pause_ms,
                    data,
                } => {
                    if data.is_empty() {
                        self.block_index += 1;
                        continue;
                    }
                    self.cur = Active {
                        sample: u64::from(tstates_per_sample),
                        used_bits,
                        pause_ms,
                        data_len: data.len(),
                        ..Active::default()
                    };
                    self.phase = Phase::Direct;
                    self.byte_pos = 0;
                    self.bit_pos = 0;
                    // First sample applies immediately.
                    self.next_edge = at;
                    return;
                }
                TapeBlock::Pause { ms: 0 } => {
                    // Stop-the-tape marker.
                    self.block_index += 1;
                    self.playing = false;
                    self.phase = Phase::Idle;
                    log::debug!("tape: stop marker");
                    return;
                }
                TapeBlock::Pause { ms } => {
                    self.cur = Active {
                        pause_ms: ms,
                        ..Active::default()
                    };
                    self.phase = Phase::Pause;
                    self.ear = false;
                    self.next_edge = at + pause_tstates(ms);
                    return;
                }
                TapeBlock::LoopStart { count } => {
                    self.loop_stack.push((self.block_index + 1, count.max(1)));
                    self.block_index += 1;
                }
                TapeBlock::LoopEnd => {
                    match self.loop_stack.last_mut() {
                        Some(frame) => {
                            frame.1 -= 1;
                            if frame.1 > 0 {
                                self.block_index = frame.0;
                            } else {
                                self.loop_stack.pop();
                                self.block_index += 1;
                            }
                        }
                        // Unmatched LoopEnd: skip it.
                        None => self.block_index += 1,
                    }
                }
                TapeBlock::Jump { offset } => {
                    if offset == 0 {
                        // A self-jump would spin forever.
                        self.playing = false;
                        self.phase = Phase::Idle;
                        log::debug!("tape: self-referential jump, stopping");
                        return;
                    }
                    let target = self.block_index as i64 + i64::from(offset);
                    if target < 0 {
                        self.block_index = self.blocks.len();
                    } else {
                        self.block_index = target as usize;
                    }
                }
                TapeBlock::StopIf48K => {
                    self.block_index += 1;
                    self.playing = false;
                    self.phase = Phase::Idle;
                    log::debug!("tape: stop-if-48K");
                    return;
                }
                // Informational blocks play no signal.
                TapeBlock::GroupStart { .. }
                | TapeBlock::GroupEnd
                | TapeBlock::Text { .. }
                | TapeBlock::Message { .. }
                | TapeBlock::ArchiveInfo { .. }
                | TapeBlock::Hardware
                | TapeBlock::Custom { .. }
                | TapeBlock::Glue => self.block_index += 1,
            }
        }
    }
}

impl Default for TapePlayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Milliseconds of pause in T-states.
fn pause_tstates(ms: u16) -> u64 {
    u64::from(ms) * u64::from(TSTATES_PER_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tape::{HEADER_PILOT_COUNT, PILOT_PULSE, SYNC1_PULSE};

    /// Walk `player` from `from` to `to` in steps of `step`, counting EAR
    /// transitions.
    fn count_edges(player: &mut TapePlayer, from: u64, to: u64, step: u64) -> u32 {
        let mut last = player.ear();
        let mut edges = 0;
        let mut t = from;
        while t <= to {
            let ear = player.update(t);
            if ear != last {
                edges += 1;
                last = ear;
            }
            t += step;
        }
        edges
    }

    fn playing_player(blocks: Vec<TapeBlock>) -> TapePlayer {
        let mut player = TapePlayer::new();
        player.insert(blocks);
        player.play();
        player
    }

    #[test]
    fn idle_player_holds_level() {
        let mut player = TapePlayer::new();
        assert!(!player.update(1000));
        assert!(!player.update(1_000_000));
        assert!(player.is_finished());
    }

    #[test]
    fn pilot_edges_arrive_on_schedule() {
        let mut player = playing_player(vec![TapeBlock::rom_standard(vec![0x00], 0)]);

        player.update(0);
        assert!(!player.ear(), "no edge before the first pulse ends");

        // First edge exactly at one pilot pulse.
        player.update(u64::from(PILOT_PULSE) - 1);
        assert!(!player.ear());
        player.update(u64::from(PILOT_PULSE));
        assert!(player.ear());

        // Second edge one pulse later.
        player.update(u64::from(PILOT_PULSE) * 2);
        assert!(!player.ear());
    }

    #[test]
    fn header_pilot_runs_into_sync1() {
        // After pilot_count * 2 edges of pilot_pulse each, the next edge is
        // the sync1 pulse, 667 T-states later.
        let mut player = playing_player(vec![TapeBlock::rom_standard(vec![0x00], 0)]);
        player.update(0);

        let pilot_end = u64::from(HEADER_PILOT_COUNT) * 2 * u64::from(PILOT_PULSE);
        player.update(pilot_end);
        let level_after_pilot = player.ear();

        // No edge inside the sync1 pulse...
        player.update(pilot_end + u64::from(SYNC1_PULSE) - 1);
        assert_eq!(player.ear(), level_after_pilot);
        // ...and a toggle exactly at its end.
        player.update(pilot_end + u64::from(SYNC1_PULSE));
        assert_ne!(player.ear(), level_after_pilot);
    }

    #[test]
    fn pure_tone_emits_count_edges() {
        let mut player = playing_player(vec![TapeBlock::PureTone {
            pulse_len: 100,
            count: 7,
        }]);
        let edges = count_edges(&mut player, 0, 2000, 1);
        assert_eq!(edges, 7);
        assert!(player.is_finished());
        assert!(!player.is_playing());
    }

    #[test]
    fn pulse_sequence_respects_each_length() {
        let mut player = playing_player(vec![TapeBlock::PulseSequence {
            pulses: vec![50, 100, 25],
        }]);
        player.update(0);
        player.update(49);
        assert!(!player.ear());
        player.update(50);
        assert!(player.ear());
        player.update(149);
        assert!(player.ear());
        player.update(150);
        assert!(!player.ear());
        player.update(175);
        assert!(player.ear());
    }

    #[test]
    fn pure_data_bits_use_their_pulse_widths() {
        // One byte $80: first bit one_pulse twice, then 7 zero bits.
        let mut player = playing_player(vec![TapeBlock::PureData {
            zero_pulse: 10,
            one_pulse: 20,
            used_bits: 8,
            pause_ms: 0,
            data: vec![0x80],
        }]);
        let edges = count_edges(&mut player, 0, 2 * 20 + 14 * 10 + 10, 1);
        assert_eq!(edges, 16, "8 bits, two pulses per bit");
    }

    #[test]
    fn used_bits_truncates_final_byte() {
        let mut player = playing_player(vec![TapeBlock::PureData {
            zero_pulse: 10,
            one_pulse: 20,
            used_bits: 2,
            pause_ms: 0,
            data: vec![0xC0],
        }]);
        let edges = count_edges(&mut player, 0, 200, 1);
        assert_eq!(edges, 4, "only the top two bits play");
    }

    #[test]
    fn direct_recording_tracks_sample_bits() {
        // $A0 = 1010_0000, 3 used bits, 8 T-states per sample.
        let mut player = playing_player(vec![TapeBlock::DirectRecording {
            tstates_per_sample: 8,
            used_bits: 3,
            pause_ms: 0,
            data: vec![0xA0],
        }]);
        assert!(player.update(0), "first sample is a one");
        assert!(!player.update(8));
        assert!(player.update(16));
        player.update(100);
        assert!(player.is_finished());
    }

    #[test]
    fn pause_block_pins_ear_low_then_advances() {
        let mut player = playing_player(vec![
            TapeBlock::Pause { ms: 2 },
            TapeBlock::PureTone {
                pulse_len: 50,
                count: 1,
            },
        ]);
        assert!(!player.update(0));
        assert!(!player.update(6999), "still inside the pause");
        // Pause ends at 7000; the tone's single edge lands 50 later.
        assert!(!player.update(7000));
        assert!(player.update(7050));
    }

    #[test]
    fn pause_zero_stops_the_deck() {
        let mut player = playing_player(vec![
            TapeBlock::Pause { ms: 0 },
            TapeBlock::PureTone {
                pulse_len: 10,
                count: 2,
            },
        ]);
        player.update(10);
        assert!(!player.is_playing());
        assert!(!player.is_finished(), "tone block still queued");

        // play() resumes with the next block.
        player.play();
        let edges = count_edges(&mut player, 11, 100, 1);
        assert_eq!(edges, 2);
    }

    #[test]
    fn post_block_pause_delays_next_block() {
        let mut player = playing_player(vec![
            TapeBlock::PureData {
                zero_pulse: 10,
                one_pulse: 10,
                used_bits: 1,
                pause_ms: 1,
                data: vec![0x00],
            },
            TapeBlock::PureTone {
                pulse_len: 10,
                count: 1,
            },
        ]);
        // Data: 2 pulses of 10 = edges at 10 and 20; pause 3500 T-states;
        // tone edge 10 after the pause ends.
        player.update(20);
        assert!(!player.update(20 + 3500 + 9));
        assert!(player.update(20 + 3500 + 10));
    }

    #[test]
    fn loop_repeats_body() {
        let mut player = playing_player(vec![
            TapeBlock::LoopStart { count: 3 },
            TapeBlock::PureTone {
                pulse_len: 5,
                count: 2,
            },
            TapeBlock::LoopEnd,
        ]);
        let edges = count_edges(&mut player, 0, 200, 1);
        assert_eq!(edges, 6, "two-pulse tone played three times");
        assert!(player.is_finished());
    }

    #[test]
    fn jump_skips_blocks() {
        let mut player = playing_player(vec![
            TapeBlock::Jump { offset: 2 },
            TapeBlock::PureTone {
                pulse_len: 5,
                count: 100,
            },
            TapeBlock::PureTone {
                pulse_len: 5,
                count: 2,
            },
        ]);
        let edges = count_edges(&mut player, 0, 200, 1);
        assert_eq!(edges, 2, "jump lands past the long tone");
    }

    #[test]
    fn self_jump_stops_instead_of_spinning() {
        let mut player = playing_player(vec![TapeBlock::Jump { offset: 0 }]);
        player.update(10);
        assert!(!player.is_playing());
    }

    #[test]
    fn stop_if_48k_stops() {
        let mut player = playing_player(vec![
            TapeBlock::StopIf48K,
            TapeBlock::PureTone {
                pulse_len: 5,
                count: 2,
            },
        ]);
        player.update(10);
        assert!(!player.is_playing());
        assert_eq!(player.block_index(), 1);
    }

    #[test]
    fn informational_blocks_are_skipped() {
        let mut player = playing_player(vec![
            TapeBlock::Text {
                text: "side A".into(),
            },
            TapeBlock::GroupStart { name: "g".into() },
            TapeBlock::Hardware,
            TapeBlock::GroupEnd,
            TapeBlock::Glue,
            TapeBlock::PureTone {
                pulse_len: 5,
                count: 1,
            },
        ]);
        let edges = count_edges(&mut player, 0, 100, 1);
        assert_eq!(edges, 1);
        assert!(player.is_finished());
    }

    #[test]
    fn deck_pause_freezes_the_schedule() {
        let mut player = playing_player(vec![TapeBlock::PureTone {
            pulse_len: 100,
            count: 2,
        }]);
        player.update(0);
        player.update(99);
        assert!(!player.ear());

        // Stop for ten thousand T-states; the pending edge keeps its
        // remaining distance.
        player.pause();
        player.update(5_000);
        player.update(10_099);
        player.play();
        assert!(!player.update(10_099));
        assert!(player.update(10_100), "one T-state of tape time was left");
    }

    #[test]
    fn rewind_returns_to_block_zero() {
        let mut player = playing_player(vec![TapeBlock::PureTone {
            pulse_len: 10,
            count: 2,
        }]);
        player.update(100);
        assert!(player.is_finished());

        player.rewind();
        assert_eq!(player.block_index(), 0);
        player.play();
        let edges = count_edges(&mut player, 200, 300, 1);
        assert_eq!(edges, 2, "tape plays again after rewind");
    }

    #[test]
    fn empty_data_block_is_skipped_silently() {
        let mut player = playing_player(vec![
            TapeBlock::rom_standard(Vec::new(), 1000),
            TapeBlock::PureTone {
                pulse_len: 5,
                count: 1,
            },
        ]);
        let edges = count_edges(&mut player, 0, 100, 1);
        assert_eq!(edges, 1);
    }
}
