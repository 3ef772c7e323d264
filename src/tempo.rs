//! tempo.rs
//!
//! Tick → real time conversion.
//!
//! A MIDI file measures time in ticks. How long a tick lasts depends on two things:
//! the header's ticks-per-quarter-note (tpqn) and the current tempo, given in
//! microseconds per quarter note. Tempo can change anywhere in the file, so the
//! mapping from ticks to time is piecewise linear: one segment per tempo breakpoint.
//!
//! Each breakpoint caches the elapsed time at its own tick. A query finds the last
//! breakpoint at or before the tick and extends linearly from there.
//!
//! All internal time values are exact rationals of microseconds, so no rounding
//! accumulates however many breakpoints there are. Conversion to seconds happens
//! only at the edges ([`to_seconds`]).
//!
//! Numerators are `u128`: a `u64` tick count times a 24-bit tempo always fits.

use num_rational::Ratio;

use crate::error::Error;

/// Elapsed time in microseconds, kept exact.
pub type Micros = Ratio<u128>;

/// 500,000 µs per quarter note = 120 BPM
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Tempo is a 24-bit field in MIDI.
pub const MAX_TEMPO: u32 = 0xFF_FFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Breakpoint {
    pub tick: u64,
    /// Microseconds per quarter note from this tick on
    pub tempo: u32,
    /// Elapsed time at `tick`
    pub time: Micros,
}

/// Piecewise-linear tick → time mapping.
///
/// Always holds at least one breakpoint: the implicit `{0, 500000}` until a tempo
/// event at tick 0 replaces it.
#[derive(Clone, Debug)]
pub struct TempoMap {
    tpqn: Option<u32>,
    breakpoints: Vec<Breakpoint>,
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TempoMap {
    pub fn new() -> Self {
        Self {
            tpqn: None,
            breakpoints: vec![Breakpoint { tick: 0, tempo: DEFAULT_TEMPO, time: Micros::from_integer(0) }],
        }
    }

    /// Shorthand for `new` followed by `set_ticks_per_quarter_note`.
    pub fn with_ticks_per_quarter_note(tpqn: u32) -> Result<Self, Error> {
        let mut map = Self::new();
        map.set_ticks_per_quarter_note(tpqn)?;
        Ok(map)
    }

    pub fn breakpoints(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    /// Set the conversion denominator from the file header.
    ///
    /// Breakpoints already added are re-timed against the new value.
    pub fn set_ticks_per_quarter_note(&mut self, tpqn: u32) -> Result<(), Error> {
        if tpqn == 0 {
            return Err(Error::InvalidTicksPerQuarterNote(tpqn));
        }
        self.tpqn = Some(tpqn);

        for i in 1..self.breakpoints.len() {
            let prev = self.breakpoints[i - 1];
            self.breakpoints[i].time = prev.time + segment(prev.tempo, self.breakpoints[i].tick - prev.tick, tpqn);
        }
        Ok(())
    }

    /// Append a tempo change.
    ///
    /// Ticks must arrive in non-decreasing order. A second change at the same tick
    /// replaces the first. The elapsed time at `tick` is taken from the map as it
    /// stood before this call, so the old tempo governs up to `tick` and the new
    /// one after it.
    pub fn add_tempo(&mut self, tick: u64, tempo: u32) -> Result<(), Error> {
        let tpqn = self.tpqn.ok_or(Error::MissingHeader)?;
        if tempo == 0 || tempo > MAX_TEMPO {
            return Err(Error::InvalidTempo { tick, tempo });
        }

        // never empty: see `new`
        let last = *self.breakpoints.last().expect("tempo map has a breakpoint");
        if tick < last.tick {
            return Err(Error::TempoOutOfOrder { tick, last: last.tick });
        }
        if tick == last.tick {
            // last write wins; the elapsed time at this tick does not change
            if let Some(bp) = self.breakpoints.last_mut() {
                bp.tempo = tempo;
            }
            return Ok(());
        }

        let time = last.time + segment(last.tempo, tick - last.tick, tpqn);
        log::debug!("tempo {tempo} µs/qn at tick {tick} ({} µs)", time.to_integer());
        self.breakpoints.push(Breakpoint { tick, tempo, time });
        Ok(())
    }

    /// Exact elapsed time at `tick`.
    pub fn time_at_tick(&self, tick: u64) -> Result<Micros, Error> {
        let tpqn = self.tpqn.ok_or(Error::MissingHeader)?;
        let bp = self.breakpoint_at(tick);
        Ok(bp.time + segment(bp.tempo, tick.saturating_sub(bp.tick), tpqn))
    }

    /// Latest breakpoint with `breakpoint.tick <= tick`.
    fn breakpoint_at(&self, tick: u64) -> &Breakpoint {
        // first breakpoint is always at tick 0, so idx >= 1
        let idx = self.breakpoints.partition_point(|bp| bp.tick <= tick);
        &self.breakpoints[idx.saturating_sub(1)]
    }
}

/// Convert exact microseconds to seconds.
pub fn to_seconds(t: Micros) -> f64 {
    *t.numer() as f64 / (*t.denom() as f64 * 1_000_000.0)
}

/// Duration of `ticks` at `tempo`: ticks * tempo / tpqn microseconds.
fn segment(tempo: u32, ticks: u64, tpqn: u32) -> Micros {
    Micros::new(u128::from(ticks) * u128::from(tempo), u128::from(tpqn))
}
