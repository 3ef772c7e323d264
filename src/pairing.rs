//! pairing.rs
//!
//! Turns a stream of note-on/note-off events into discrete notes.
//!
//! MIDI never states how long a note lasts: a note starts with a note-on and
//! ends with the next matching note-off on the same track and pitch. A note-on
//! with velocity 0 counts as a note-off.
//!
//! When the same pitch is struck again before it was released, the open
//! note-ons for that (track, pitch) are kept in a FIFO queue and each off
//! closes the oldest one:
//!
//! ```text
//! on@0  on@10  off@20  off@30   =>   (0, 20) and (10, 30)
//! ```
//!
//! Pairing only looks at ticks, tracks and pitches. Tempo does not matter here.

use std::collections::{HashMap, VecDeque};

use crate::error::NoteError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    On,
    /// Explicit note-off row
    Off,
}

/// One raw note-on/off occurrence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteEvent {
    pub track: u32,
    pub tick: u64,
    pub pitch: u8,
    pub velocity: u8,
    pub edge: Edge,
}

impl NoteEvent {
    pub const fn on(track: u32, tick: u64, pitch: u8, velocity: u8) -> Self {
        Self { track, tick, pitch, velocity, edge: Edge::On }
    }

    pub const fn off(track: u32, tick: u64, pitch: u8) -> Self {
        Self { track, tick, pitch, velocity: 0, edge: Edge::Off }
    }

    /// Ends a note: explicit off, or on with velocity 0.
    pub const fn is_release(&self) -> bool {
        matches!(self.edge, Edge::Off) || self.velocity == 0
    }
}

/// A note with a known duration. `duration_ticks` is always > 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Note {
    pub track: u32,
    pub onset_tick: u64,
    pub pitch: u8,
    pub velocity: u8,
    pub duration_ticks: u64,
}

impl Note {
    pub const fn end_tick(&self) -> u64 {
        self.onset_tick + self.duration_ticks
    }
}

/// What came out of a pairing run.
#[derive(Debug, Default)]
pub struct Pairing {
    /// Notes in the order of their note-on events
    pub notes: Vec<Note>,
    /// Dropped notes, for diagnostics
    pub dropped: Vec<NoteError>,
    /// Releases that found nothing open
    pub stray_releases: usize,
}

/// Open note-on waiting for its release.
#[derive(Clone, Copy, Debug)]
struct Open {
    seq: usize,
    tick: u64,
    velocity: u8,
}

/// Incremental pairer. Feed events in tick order per track, then call `finish`.
#[derive(Debug, Default)]
pub struct NotePairer {
    open: HashMap<(u32, u8), VecDeque<Open>>,
    closed: Vec<(usize, Note)>,
    dropped: Vec<NoteError>,
    stray_releases: usize,
    seq: usize,
}

impl NotePairer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, ev: NoteEvent) {
        let key = (ev.track, ev.pitch);

        if !ev.is_release() {
            self.open.entry(key).or_default().push_back(Open {
                seq: self.seq,
                tick: ev.tick,
                velocity: ev.velocity,
            });
            self.seq += 1;
            return;
        }

        let Some(on) = self.open.get_mut(&key).and_then(VecDeque::pop_front) else {
            self.stray_releases += 1;
            return;
        };

        if ev.tick <= on.tick {
            let err = NoteError::DegenerateDuration {
                track: ev.track,
                tick: on.tick,
                pitch: ev.pitch,
                off_tick: ev.tick,
            };
            log::debug!("dropping {err}");
            self.dropped.push(err);
            return;
        }

        self.closed.push((
            on.seq,
            Note {
                track: ev.track,
                onset_tick: on.tick,
                pitch: ev.pitch,
                velocity: on.velocity,
                duration_ticks: ev.tick - on.tick,
            },
        ));
    }

    /// Close the run. Note-ons still open are dropped, never given an artificial end.
    pub fn finish(mut self) -> Pairing {
        let mut dangling: Vec<(usize, NoteError)> = self
            .open
            .into_iter()
            .flat_map(|((track, pitch), queue)| {
                queue.into_iter().map(move |on| {
                    (on.seq, NoteError::UnmatchedNoteOn { track, tick: on.tick, pitch })
                })
            })
            .collect();
        dangling.sort_by_key(|(seq, _)| *seq);
        for (_, err) in &dangling {
            log::debug!("dropping {err}");
        }
        self.dropped.extend(dangling.into_iter().map(|(_, e)| e));

        self.closed.sort_by_key(|(seq, _)| *seq);
        Pairing {
            notes: self.closed.into_iter().map(|(_, n)| n).collect(),
            dropped: self.dropped,
            stray_releases: self.stray_releases,
        }
    }
}

/// Pair a complete event list in one go.
pub fn pair_notes(events: impl IntoIterator<Item = NoteEvent>) -> Pairing {
    let mut pairer = NotePairer::new();
    for ev in events {
        pairer.push(ev);
    }
    pairer.finish()
}
