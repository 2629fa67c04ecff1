//! Subdivision-based time representation.
//!
//! Files carry their own resolution (`ticks per quarter note`). On ingest,
//! every absolute tick is rescaled once into subdivisions, the engine's
//! fixed internal grid. Playback and UI timing only ever see subdivisions.

/// Subdivisions per quarter note.
pub const SUBDIVISIONS_PER_BEAT: u32 = 32;

/// Beats per bar. Only 4/4 is modelled.
pub const BEATS_PER_BAR: u32 = 4;

/// Subdivisions in one bar.
pub const SUBDIVISIONS_PER_BAR: u32 = SUBDIVISIONS_PER_BEAT * BEATS_PER_BAR;

/// Converts native file ticks into subdivisions.
///
/// The ratio is fixed per file, so a `TickScale` is built once from the
/// header and shared by every channel stream built from that file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickScale {
    ticks_per_beat: u16,
}

impl TickScale {
    /// Create a scale for a file with the given resolution.
    ///
    /// A zero resolution is treated as one tick per beat.
    pub const fn new(ticks_per_beat: u16) -> Self {
        Self {
            ticks_per_beat: if ticks_per_beat == 0 { 1 } else { ticks_per_beat },
        }
    }

    /// Native resolution this scale converts from.
    pub const fn ticks_per_beat(self) -> u16 {
        self.ticks_per_beat
    }

    /// Convert an absolute tick to the nearest subdivision.
    ///
    /// Monotonic: `a <= b` implies `to_subdivision(a) <= to_subdivision(b)`.
    pub fn to_subdivision(self, tick: u64) -> u32 {
        let ppq = self.ticks_per_beat as u64;
        let scaled = (tick * SUBDIVISIONS_PER_BEAT as u64 + ppq / 2) / ppq;
        scaled.min(u32::MAX as u64) as u32
    }

    /// Convert a subdivision back to the nearest native tick.
    pub fn to_tick(self, subdivision: u32) -> u64 {
        let unit = SUBDIVISIONS_PER_BEAT as u64;
        (subdivision as u64 * self.ticks_per_beat as u64 + unit / 2) / unit
    }
}

/// Pattern length for a stream whose last event sits at `max_subdivision`:
/// the start of the next whole bar after it.
pub fn pattern_length(max_subdivision: u32) -> u32 {
    (max_subdivision / SUBDIVISIONS_PER_BAR + 1) * SUBDIVISIONS_PER_BAR
}

/// Round a subdivision down onto a snap grid. A zero grid disables snapping.
pub fn snap(subdivision: u32, grid: u32) -> u32 {
    if grid == 0 {
        return subdivision;
    }
    subdivision - subdivision % grid
}

/// Microseconds between two subdivision ticks at `bpm`.
pub fn subdivision_period_micros(bpm: u32) -> u64 {
    60_000_000 / (bpm.max(1) as u64 * SUBDIVISIONS_PER_BEAT as u64)
}

/// Tempo in beats per minute from a tempo meta-event value.
pub fn micros_to_bpm(micros_per_beat: u32) -> u32 {
    if micros_per_beat == 0 {
        return 0;
    }
    (60_000_000 + micros_per_beat / 2) / micros_per_beat
}

/// Tempo meta-event value for a tempo in beats per minute.
pub fn bpm_to_micros(bpm: u32) -> u32 {
    60_000_000 / bpm.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_resolution_is_identity() {
        let scale = TickScale::new(32);
        for tick in 0..200 {
            assert_eq!(scale.to_subdivision(tick), tick as u32);
        }
    }

    #[test]
    fn rounds_to_nearest() {
        // 96 ppq: 3 ticks per subdivision
        let scale = TickScale::new(96);
        assert_eq!(scale.to_subdivision(0), 0);
        assert_eq!(scale.to_subdivision(1), 0);
        assert_eq!(scale.to_subdivision(2), 1);
        assert_eq!(scale.to_subdivision(96), 32);
    }

    #[test]
    fn scaling_is_monotonic() {
        for ppq in [1u16, 24, 48, 96, 120, 384, 480, 1920] {
            let scale = TickScale::new(ppq);
            let mut prev = 0;
            for tick in 0..5000u64 {
                let sub = scale.to_subdivision(tick);
                assert!(sub >= prev, "ppq {} tick {}", ppq, tick);
                prev = sub;
            }
        }
    }

    #[test]
    fn tick_round_trip_at_high_resolution() {
        let scale = TickScale::new(480);
        for sub in 0..1000 {
            assert_eq!(scale.to_subdivision(scale.to_tick(sub)), sub);
        }
    }

    #[test]
    fn zero_resolution_does_not_divide_by_zero() {
        let scale = TickScale::new(0);
        assert_eq!(scale.ticks_per_beat(), 1);
        assert_eq!(scale.to_subdivision(2), 64);
    }

    #[test]
    fn pattern_length_rounds_to_next_bar() {
        assert_eq!(pattern_length(0), 128);
        assert_eq!(pattern_length(127), 128);
        assert_eq!(pattern_length(128), 256);
        assert_eq!(pattern_length(300), 384);
    }

    #[test]
    fn snap_to_grid() {
        assert_eq!(snap(13, 8), 8);
        assert_eq!(snap(16, 8), 16);
        assert_eq!(snap(13, 0), 13);
    }

    #[test]
    fn tempo_conversions() {
        assert_eq!(subdivision_period_micros(100), 18_750);
        assert_eq!(subdivision_period_micros(120), 15_625);
        assert_eq!(micros_to_bpm(500_000), 120);
        assert_eq!(bpm_to_micros(120), 500_000);
        assert_eq!(micros_to_bpm(bpm_to_micros(100)), 100);
    }
}
