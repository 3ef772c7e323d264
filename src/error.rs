//! Error types shared by the conversion pipeline.
//!
//! Three levels, matching how far a failure reaches:
//! - [`Error`] aborts the current input file, the batch moves on.
//! - [`RowError`] skips a single input row.
//! - [`NoteError`] drops a single note and is only ever logged.

use std::{io, path::PathBuf};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no Header row: ticks per quarter note unknown")]
    MissingHeader,
    #[error("invalid ticks per quarter note: {0}")]
    InvalidTicksPerQuarterNote(u32),
    #[error("invalid tempo at tick {tick}: {tempo} µs/qn")]
    InvalidTempo { tick: u64, tempo: u32 },
    #[error("tempo change at tick {tick} precedes breakpoint at tick {last}")]
    TempoOutOfOrder { tick: u64, last: u64 },
    #[error("cannot read {path:?}: {reason}")]
    SourceUnavailable { path: PathBuf, reason: String },
    #[error("not a MIDI or CSV file: {0:?}")]
    UnsupportedExtension(PathBuf),
    #[error("SMPTE timecode division is not supported")]
    UnsupportedTiming,
    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum RowError {
    #[error("line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("line {line}: negative tick {tick}")]
    InvalidTick { line: usize, tick: i64 },
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum NoteError {
    #[error("unmatched note-on: track {track}, tick {tick}, pitch {pitch}")]
    UnmatchedNoteOn { track: u32, tick: u64, pitch: u8 },
    #[error("degenerate note: track {track}, tick {tick}, pitch {pitch}, off at tick {off_tick}")]
    DegenerateDuration {
        track: u32,
        tick: u64,
        pitch: u8,
        off_tick: u64,
    },
}
