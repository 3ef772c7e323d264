//! midi.rs
//!
//! Decodes a Standard MIDI File (SMF) straight into the row model of [`crate::rows`],
//! so `.mid` input needs no external converter.
//!
//! ### Quick primer on SMF timing
//! - Every track event carries a *delta* in ticks since the previous event of the
//!   same track. Summing deltas gives the absolute tick.
//! - The header's metrical division is the ticks-per-quarter-note (PPQ/tpqn).
//! - Tempo meta events say how many microseconds one quarter note lasts.
//!
//! Tracks are numbered from 1 and the header gets track 0, as `midicsv` does, so
//! both input paths produce the same `part` numbers.

use midly::{Format, MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::{
    error::Error,
    rows::{Row, RowKind},
};

/// Flatten a parsed SMF into rows: the header first, then each track in order.
///
/// SMPTE timecode division has no tpqn and is rejected.
pub fn smf_to_rows(smf: &Smf<'_>) -> Result<Vec<Row>, Error> {
    let tpqn = match smf.header.timing {
        Timing::Metrical(t) => u32::from(t.as_int()),
        Timing::Timecode(..) => return Err(Error::UnsupportedTiming),
    };
    let format = match smf.header.format {
        Format::SingleTrack => 0,
        Format::Parallel => 1,
        Format::Sequential => 2,
    };

    let mut rows = vec![Row {
        line: 0,
        track: 0,
        tick: 0,
        kind: RowKind::Header { format, tracks: smf.tracks.len() as u16, tpqn },
    }];

    for (idx, tr) in smf.tracks.iter().enumerate() {
        let track = idx as u32 + 1;
        let mut abs_ticks: u64 = 0;

        for ev in tr {
            abs_ticks += u64::from(ev.delta.as_int());

            let kind = match ev.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(tp)) => RowKind::Tempo { tempo: tp.as_int() },
                TrackEventKind::Midi { message, .. } => match message {
                    // velocity 0 stays a note-on; the pairer treats it as a release
                    MidiMessage::NoteOn { key, vel } => RowKind::NoteOn {
                        pitch: key.as_int(),
                        velocity: vel.as_int(),
                    },
                    MidiMessage::NoteOff { key, .. } => RowKind::NoteOff { pitch: key.as_int() },
                    _ => continue,
                },
                _ => continue,
            };
            rows.push(Row { line: 0, track, tick: abs_ticks, kind });
        }
    }

    Ok(rows)
}
