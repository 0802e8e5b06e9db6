//! ULA: border, speaker, keyboard, EAR input, beam position and contention.
//!
//! The ULA owns everything port $FE touches plus the scanline counters that
//! pace the frame. It is ticked with each instruction's T-states; crossing
//! the 311-to-0 scanline wrap latches `int_pending` until the CPU accepts
//! the interrupt.
//!
//! # Contention
//!
//! While the beam is in the display area (scanlines 64-255, line T-state
//! 0-127), CPU access to $4000-$7FFF is delayed by the 8-T-state pattern
//! `[6, 5, 4, 3, 2, 1, 0, 0]`. Accesses anywhere else are free.

/// Scanlines per frame: 64 top border, 192 display, 56 bottom border.
pub const SCANLINES_PER_FRAME: u32 = 312;

/// T-states per scanline.
pub const TSTATES_PER_SCANLINE: u32 = 224;

/// First scanline of the display area.
const FIRST_DISPLAY_LINE: u32 = 64;

/// One past the last display scanline.
const DISPLAY_END_LINE: u32 = 256;

/// Contended T-states at the start of each display scanline.
const CONTENDED_LINE_TSTATES: u32 = 128;

/// Contention delay pattern, repeating every 8 T-states.
const CONTENTION_PATTERN: [u8; 8] = [6, 5, 4, 3, 2, 1, 0, 0];

/// ULA state.
pub struct Ula {
    /// Border colour (0-7).
    border: u8,
    /// Border writes this frame: (frame T-state, colour).
    border_log: Vec<(u32, u8)>,
    /// Keyboard matrix, one byte per half-row. Bit clear = key pressed;
    /// bits 5-7 always read back as 1.
    keyboard: [u8; 8],
    /// EAR input line, driven by the tape player.
    pub ear_in: bool,
    /// Speaker level: MIC or EAR bit of the last port $FE write.
    speaker: bool,
    /// Current scanline (0-311).
    scanline: u32,
    /// T-state within the current scanline (0-223).
    scanline_tstate: u32,
    /// Latched at the frame wrap, cleared on interrupt acceptance.
    int_pending: bool,
    /// Last value the ULA drove onto the data bus.
    floating_bus: u8,
}

impl Ula {
    #[must_use]
    pub fn new() -> Self {
        Self {
            border: 7, // white on power-up
            border_log: Vec::new(),
            keyboard: [0xFF; 8],
            ear_in: false,
            speaker: false,
            scanline: 0,
            scanline_tstate: 0,
            int_pending: false,
            floating_bus: 0xFF,
        }
    }

    /// Read port $FE. `port` selects the keyboard half-rows through its high
    /// byte: each clear bit ANDs that row into the result. Bit 6 carries the
    /// EAR input; bits 5 and 7 read as 1.
    pub fn read(&mut self, port: u16) -> u8 {
        let rows = (port >> 8) as u8;
        let mut result = 0xFF;
        for (row, keys) in self.keyboard.iter().enumerate() {
            if rows & (1 << row) == 0 {
                result &= keys;
            }
        }
        result = if self.ear_in {
            result | 0x40
        } else {
            result & !0x40
        };
        self.floating_bus = result;
        result
    }

    /// Write port $FE: bits 0-2 border, bit 3 MIC, bit 4 speaker. MIC and
    /// EAR are OR'd into a single beeper level.
    pub fn write(&mut self, val: u8) {
        self.border = val & 0x07;
        self.border_log.push((self.frame_tstate(), self.border));
        self.speaker = val & 0x18 != 0;
    }

    /// Advance the beam. Sets `int_pending` on the frame wrap.
    pub fn tick(&mut self, cycles: u32) {
        self.scanline_tstate += cycles;
        while self.scanline_tstate >= TSTATES_PER_SCANLINE {
            self.scanline_tstate -= TSTATES_PER_SCANLINE;
            self.scanline += 1;
            if self.scanline == SCANLINES_PER_FRAME {
                self.scanline = 0;
                self.int_pending = true;
            }
        }
    }

    /// Contention delay for a memory access at the current beam position.
    #[must_use]
    pub fn contention(&self, addr: u16) -> u32 {
        if !(0x4000..0x8000).contains(&addr) {
            return 0;
        }
        if !(FIRST_DISPLAY_LINE..DISPLAY_END_LINE).contains(&self.scanline)
            || self.scanline_tstate >= CONTENDED_LINE_TSTATES
        {
            return 0;
        }
        u32::from(CONTENTION_PATTERN[(self.scanline_tstate & 7) as usize])
    }

    /// T-state position within the frame.
    #[must_use]
    pub fn frame_tstate(&self) -> u32 {
        self.scanline * TSTATES_PER_SCANLINE + self.scanline_tstate
    }

    /// Current scanline (0-311).
    #[must_use]
    pub fn scanline(&self) -> u32 {
        self.scanline
    }

    /// Current border colour.
    #[must_use]
    pub fn border(&self) -> u8 {
        self.border
    }

    /// Set the border without logging a change (snapshot restore).
    pub fn set_border(&mut self, colour: u8) {
        self.border = colour & 0x07;
    }

    /// Border writes this frame, in T-state order, for the renderer.
    #[must_use]
    pub fn border_log(&self) -> &[(u32, u8)] {
        &self.border_log
    }

    /// Clear the border log. The frame driver calls this at frame start.
    pub fn begin_frame(&mut self) {
        self.border_log.clear();
    }

    /// Current speaker level.
    #[must_use]
    pub fn speaker(&self) -> bool {
        self.speaker
    }

    /// Last value the ULA drove on the bus; returned for undecoded ports.
    #[must_use]
    pub fn floating_bus(&self) -> u8 {
        self.floating_bus
    }

    /// Is a frame interrupt waiting to be accepted?
    #[must_use]
    pub fn int_pending(&self) -> bool {
        self.int_pending
    }

    /// The CPU accepted the frame interrupt.
    pub fn acknowledge_int(&mut self) {
        self.int_pending = false;
    }

    /// Press a key. `row` 0-7, `col` 0-4.
    pub fn key_down(&mut self, row: usize, col: u8) {
        if row < 8 && col < 5 {
            self.keyboard[row] &= !(1 << col);
        }
    }

    /// Release a key.
    pub fn key_up(&mut self, row: usize, col: u8) {
        if row < 8 && col < 5 {
            self.keyboard[row] |= 1 << col;
        }
    }

    /// Release every key.
    pub fn release_all(&mut self) {
        self.keyboard = [0xFF; 8];
    }
}

impl Default for Ula {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_69888_tstates() {
        assert_eq!(SCANLINES_PER_FRAME * TSTATES_PER_SCANLINE, 69_888);
    }

    #[test]
    fn tick_wraps_scanlines_and_latches_interrupt() {
        let mut ula = Ula::new();
        ula.tick(TSTATES_PER_SCANLINE * SCANLINES_PER_FRAME - 1);
        assert_eq!(ula.scanline(), 311);
        assert!(!ula.int_pending());

        ula.tick(1);
        assert_eq!(ula.scanline(), 0);
        assert_eq!(ula.frame_tstate(), 0);
        assert!(ula.int_pending());

        ula.acknowledge_int();
        assert!(!ula.int_pending());
    }

    #[test]
    fn tick_carries_partial_lines() {
        let mut ula = Ula::new();
        ula.tick(224 + 10);
        assert_eq!(ula.scanline(), 1);
        assert_eq!(ula.frame_tstate(), 234);
    }

    #[test]
    fn scanline_invariants_hold_through_odd_ticks() {
        let mut ula = Ula::new();
        for step in [1u32, 3, 7, 23, 224, 225, 1000] {
            for _ in 0..500 {
                ula.tick(step);
                assert!(ula.scanline() < SCANLINES_PER_FRAME);
                assert!(ula.frame_tstate() < 69_888);
            }
        }
    }

    #[test]
    fn keyboard_read_no_keys() {
        let mut ula = Ula::new();
        assert_eq!(ula.read(0xFEFE) & 0x1F, 0x1F);
        assert_eq!(ula.read(0x00FE) & 0xA0, 0xA0, "bits 5 and 7 high");
    }

    #[test]
    fn keyboard_read_selected_row_only() {
        let mut ula = Ula::new();
        ula.key_down(1, 0); // 'A'

        // Row 1 selected (A9 clear).
        assert_eq!(ula.read(0xFDFE) & 0x01, 0);
        // Row 0 selected: key invisible.
        assert_eq!(ula.read(0xFEFE) & 0x01, 0x01);

        ula.key_up(1, 0);
        assert_eq!(ula.read(0xFDFE) & 0x01, 0x01);
    }

    #[test]
    fn keyboard_multiple_rows_and_together() {
        let mut ula = Ula::new();
        ula.key_down(0, 0); // Caps Shift
        ula.key_down(4, 2); // '8'

        // Both rows selected: both keys visible.
        let val = ula.read(0xEEFE);
        assert_eq!(val & 0x01, 0);
        assert_eq!(val & 0x04, 0);
    }

    #[test]
    fn release_all_clears_matrix() {
        let mut ula = Ula::new();
        ula.key_down(7, 0);
        ula.key_down(3, 4);
        ula.release_all();
        assert_eq!(ula.read(0x00FE) & 0x1F, 0x1F);
    }

    #[test]
    fn ear_bit_follows_input_line() {
        let mut ula = Ula::new();
        assert_eq!(ula.read(0xFEFE) & 0x40, 0);
        ula.ear_in = true;
        assert_eq!(ula.read(0xFEFE) & 0x40, 0x40);
    }

    #[test]
    fn port_read_refreshes_floating_bus() {
        let mut ula = Ula::new();
        ula.ear_in = true;
        let val = ula.read(0xFEFE);
        assert_eq!(ula.floating_bus(), val);
    }

    #[test]
    fn write_sets_border_speaker_and_log() {
        let mut ula = Ula::new();
        ula.write(0x02);
        assert_eq!(ula.border(), 2);
        assert!(!ula.speaker());

        ula.tick(56_000);
        ula.write(0x05);
        assert_eq!(ula.border_log(), &[(0, 2), (56_000, 5)]);
        assert_eq!(ula.scanline(), 250);

        // MIC alone, then the speaker bit, both drive the beeper level.
        ula.write(0x08);
        assert!(ula.speaker());
        ula.write(0x10);
        assert!(ula.speaker());
        ula.write(0x00);
        assert!(!ula.speaker());
    }

    #[test]
    fn border_log_is_monotonic() {
        let mut ula = Ula::new();
        for (delay, colour) in [(100u32, 1u8), (500, 2), (0, 3), (10_000, 4)] {
            ula.tick(delay);
            ula.write(colour);
        }
        let log = ula.border_log();
        assert!(log.windows(2).all(|w| w[0].0 <= w[1].0));
    }

    #[test]
    fn begin_frame_clears_log() {
        let mut ula = Ula::new();
        ula.write(0x01);
        ula.begin_frame();
        assert!(ula.border_log().is_empty());
    }

    #[test]
    fn contention_in_display_area() {
        let mut ula = Ula::new();
        ula.tick(FIRST_DISPLAY_LINE * TSTATES_PER_SCANLINE);
        assert_eq!(ula.contention(0x4000), 6);
        ula.tick(1);
        assert_eq!(ula.contention(0x4000), 5);
        ula.tick(5);
        assert_eq!(ula.contention(0x4000), 0);
        ula.tick(1);
        assert_eq!(ula.contention(0x4000), 0);
        ula.tick(1);
        // Pattern repeats.
        assert_eq!(ula.contention(0x7FFF), 6);
    }

    #[test]
    fn no_contention_outside_window() {
        let mut ula = Ula::new();
        // Top border.
        assert_eq!(ula.contention(0x4000), 0);

        // Display line but past T-state 128.
        let mut ula = Ula::new();
        ula.tick(FIRST_DISPLAY_LINE * TSTATES_PER_SCANLINE + 128);
        assert_eq!(ula.contention(0x4000), 0);

        // Bottom border.
        let mut ula = Ula::new();
        ula.tick(DISPLAY_END_LINE * TSTATES_PER_SCANLINE);
        assert_eq!(ula.contention(0x4000), 0);
    }

    #[test]
    fn no_contention_outside_contended_range() {
        let mut ula = Ula::new();
        ula.tick(FIRST_DISPLAY_LINE * TSTATES_PER_SCANLINE);
        assert_eq!(ula.contention(0x3FFF), 0);
        assert_eq!(ula.contention(0x8000), 0);
        assert_ne!(ula.contention(0x4000), 0);
        assert_ne!(ula.contention(0x7FFF), 0);
    }
}
