//! Beeper sample producer.
//!
//! Converts speaker-level transitions into a stream of
//! `(level, duration_in_tstates)` intervals. The audio sink resamples to its
//! own rate; the Spectrum clock is 3.5 MHz.

/// One beeper interval: the level that just ended and how long it held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeeperSample {
    /// Output level: `HIGH` or `LOW`.
    pub level: f32,
    /// Interval length in T-states.
    pub duration_tstates: u32,
}

/// Speaker high level.
const HIGH: f32 = 0.5;

/// Speaker low level.
const LOW: f32 = -0.5;

/// Accumulates speaker transitions into the interval stream.
pub struct Beeper {
    level: bool,
    /// Absolute T-state of the last emitted edge.
    edge_tstate: u64,
    samples: Vec<BeeperSample>,
}

impl Beeper {
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: false,
            edge_tstate: 0,
            samples: Vec::new(),
        }
    }

    /// Record the speaker level as of absolute T-state `now`. A level change
    /// emits the interval that just ended.
    pub fn update(&mut self, level: bool, now: u64) {
        if level != self.level {
            self.emit(now);
            self.level = level;
        }
    }

    /// Close out the open interval. The frame driver calls this at the end
    /// of every frame so the sink never starves.
    pub fn flush(&mut self, now: u64) {
        self.emit(now);
    }

    /// Drain the accumulated intervals.
    pub fn take_samples(&mut self) -> Vec<BeeperSample> {
        std::mem::take(&mut self.samples)
    }

    fn emit(&mut self, now: u64) {
        let duration = now.saturating_sub(self.edge_tstate);
        if duration > 0 {
            self.samples.push(BeeperSample {
                level: if self.level { HIGH } else { LOW },
                duration_tstates: duration as u32,
            });
        }
        self.edge_tstate = now;
    }
}

impl Default for Beeper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_flushes_as_one_low_interval() {
        let mut beeper = Beeper::new();
        beeper.update(false, 1000);
        beeper.flush(69_888);
        let samples = beeper.take_samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].level, LOW);
        assert_eq!(samples[0].duration_tstates, 69_888);
    }

    #[test]
    fn transitions_emit_intervals() {
        let mut beeper = Beeper::new();
        beeper.update(true, 100);
        beeper.update(false, 350);
        beeper.flush(1000);

        let samples = beeper.take_samples();
        assert_eq!(
            samples,
            vec![
                BeeperSample { level: LOW, duration_tstates: 100 },
                BeeperSample { level: HIGH, duration_tstates: 250 },
                BeeperSample { level: LOW, duration_tstates: 650 },
            ]
        );
    }

    #[test]
    fn unchanged_level_emits_nothing() {
        let mut beeper = Beeper::new();
        beeper.update(false, 50);
        beeper.update(false, 500);
        assert!(beeper.take_samples().is_empty());
    }

    #[test]
    fn take_samples_drains() {
        let mut beeper = Beeper::new();
        beeper.update(true, 10);
        assert_eq!(beeper.take_samples().len(), 1);
        assert!(beeper.take_samples().is_empty());
    }

    #[test]
    fn durations_sum_to_elapsed_time() {
        let mut beeper = Beeper::new();
        let edges = [(true, 17u64), (false, 203), (true, 5003), (false, 10_000)];
        for (level, at) in edges {
            beeper.update(level, at);
        }
        beeper.flush(69_888);
        let total: u64 = beeper
            .take_samples()
            .iter()
            .map(|s| u64::from(s.duration_tstates))
            .sum();
        assert_eq!(total, 69_888);
    }
}
