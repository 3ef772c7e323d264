//! sequencer.rs
//!
//! Drives one input through the pipeline:
//!
//! rows → tempo map (Header + Tempo rows) → note pairing (note rows) →
//! global order by onset tick → formatted records
//!
//! Each input gets its own `TempoMap` and `NotePairer`; nothing is shared
//! between inputs.

use crate::{
    error::{Error, NoteError},
    format::{NoteRecord, format_note},
    pairing::{Note, NoteEvent, pair_notes},
    rows::{Row, RowKind},
    tempo::TempoMap,
};

/// Everything derived from one input's rows.
#[derive(Debug)]
pub struct Sequence {
    pub tempo: TempoMap,
    /// Ordered by onset tick, ties in input order
    pub notes: Vec<Note>,
    /// Note-ons that never saw a release
    pub unmatched: usize,
    /// Pairs released on or before their own onset tick
    pub degenerate: usize,
}

impl Sequence {
    /// Build the tempo map and pair the notes. Fails when no Header row is present.
    pub fn from_rows(rows: &[Row]) -> Result<Self, Error> {
        let tempo = build_tempo_map(rows)?;

        let pairing = pair_notes(rows.iter().filter_map(note_event));
        if pairing.stray_releases > 0 {
            log::debug!("{} note-offs without an open note", pairing.stray_releases);
        }

        let unmatched = pairing
            .dropped
            .iter()
            .filter(|e| matches!(e, NoteError::UnmatchedNoteOn { .. }))
            .count();
        let degenerate = pairing.dropped.len() - unmatched;

        let mut notes = pairing.notes;
        order_by_onset(&mut notes);
        Ok(Self { tempo, notes, unmatched, degenerate })
    }

    /// Render every note with the tempo map.
    pub fn records(&self) -> Result<Vec<NoteRecord>, Error> {
        self.notes.iter().map(|n| format_note(n, &self.tempo)).collect()
    }
}

/// Build the tempo map from Header and Tempo rows.
///
/// The last Header row sets tpqn. Tempo rows are applied in tick order; on equal
/// ticks the later row wins. A zero tempo is skipped.
pub fn build_tempo_map(rows: &[Row]) -> Result<TempoMap, Error> {
    let (format, tracks, tpqn) = rows
        .iter()
        .filter_map(|r| match r.kind {
            RowKind::Header { format, tracks, tpqn } => Some((format, tracks, tpqn)),
            _ => None,
        })
        .last()
        .ok_or(Error::MissingHeader)?;
    log::debug!("SMF format {format}, {tracks} tracks, tpqn {tpqn}");

    let mut map = TempoMap::with_ticks_per_quarter_note(tpqn)?;

    let mut changes: Vec<(u64, u32, usize)> = rows
        .iter()
        .filter_map(|r| match r.kind {
            RowKind::Tempo { tempo } => Some((r.tick, tempo, r.line)),
            _ => None,
        })
        .collect();
    // stable: same-tick changes keep file order
    changes.sort_by_key(|&(tick, ..)| tick);

    for (tick, tempo, line) in changes {
        match map.add_tempo(tick, tempo) {
            Ok(()) => {}
            Err(e @ Error::InvalidTempo { .. }) => log::warn!("line {line}: skipping tempo change, {e}"),
            Err(e) => return Err(e),
        }
    }
    log::debug!("{} tempo breakpoints", map.breakpoints().len());
    Ok(map)
}

fn note_event(row: &Row) -> Option<NoteEvent> {
    match row.kind {
        RowKind::NoteOn { pitch, velocity, .. } => Some(NoteEvent::on(row.track, row.tick, pitch, velocity)),
        RowKind::NoteOff { pitch, .. } => Some(NoteEvent::off(row.track, row.tick, pitch)),
        _ => None,
    }
}

/// Stable sort by onset tick.
pub fn order_by_onset(notes: &mut [Note]) {
    notes.sort_by_key(|n| n.onset_tick);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{format::TimeUnit, rows::parse_text};

    fn rows(text: &str) -> Vec<Row> {
        parse_text(text).collect::<Result<_, _>>().unwrap()
    }

    #[test]
    fn converts_a_small_file() {
        let rows = rows(
            "0, 0, Header, 1, 3, 480\n\
             1, 0, Tempo, 500000\n\
             1, 960, Tempo, 250000\n\
             2, 0, Note_on_c, 0, 60, 100\n\
             2, 480, Note_on_c, 0, 60, 0\n\
             2, 960, Note_on_c, 0, 62, 80\n\
             2, 1440, Note_on_c, 0, 62, 0\n\
             3, 480, Note_on_c, 1, 48, 70\n\
             3, 1920, Note_off_c, 1, 48, 0\n",
        );
        let seq = Sequence::from_rows(&rows).unwrap();
        let got: Vec<_> = seq
            .records()
            .unwrap()
            .iter()
            .map(|r| r.fields(TimeUnit::Micros).join(","))
            .collect();
        assert_eq!(
            got,
            vec![
                "0,0,480,500000,60,C4,100,2",
                "480,500000,1440,1000000,48,C3,70,3",
                "960,1000000,480,250000,62,D4,80,2",
            ]
        );
    }

    #[test]
    fn missing_header_fails() {
        let rows = rows("2, 0, Note_on_c, 0, 60, 100\n2, 10, Note_on_c, 0, 60, 0\n");
        assert!(matches!(Sequence::from_rows(&rows), Err(Error::MissingHeader)));
    }

    #[test]
    fn orders_by_onset_and_keeps_ties_stable() {
        let mut notes: Vec<Note> = [(50, 1), (10, 2), (30, 1), (10, 1)]
            .into_iter()
            .map(|(tick, track)| Note { track, onset_tick: tick, pitch: 60, velocity: 1, duration_ticks: 1 })
            .collect();
        order_by_onset(&mut notes);
        let got: Vec<_> = notes.iter().map(|n| (n.onset_tick, n.track)).collect();
        assert_eq!(got, vec![(10, 2), (10, 1), (30, 1), (50, 1)]);
    }

    #[test]
    fn tempo_rows_out_of_file_order() {
        // a tempo change stored in a later track still lands in tick order
        let rows = rows(
            "0, 0, Header, 1, 2, 100\n\
             1, 200, Tempo, 1000000\n\
             2, 100, Tempo, 2000000\n\
             2, 100, Tempo, 500000\n",
        );
        let map = build_tempo_map(&rows).unwrap();
        let ticks: Vec<_> = map.breakpoints().iter().map(|b| (b.tick, b.tempo)).collect();
        assert_eq!(ticks, vec![(0, 500_000), (100, 500_000), (200, 1_000_000)]);
        assert_eq!(map.time_at_tick(300).unwrap().to_integer(), 2_000_000);
    }

    #[test]
    fn zero_tempo_is_skipped() {
        let rows = rows("0, 0, Header, 0, 1, 480\n1, 0, Tempo, 0\n");
        let map = build_tempo_map(&rows).unwrap();
        assert_eq!(map.time_at_tick(480).unwrap().to_integer(), 500_000);
    }

    #[test]
    fn dropped_notes_are_counted() {
        let rows = rows(
            "0, 0, Header, 0, 1, 480\n\
             1, 0, Note_on_c, 0, 60, 100\n\
             1, 0, Note_on_c, 0, 64, 100\n\
             1, 0, Note_on_c, 0, 64, 0\n",
        );
        let seq = Sequence::from_rows(&rows).unwrap();
        assert!(seq.notes.is_empty());
        assert_eq!((seq.unmatched, seq.degenerate), (1, 1));
    }

    #[test]
    fn retriggered_pitch_releases_oldest_first() {
        let rows = rows(
            "0, 0, Header, 1, 2, 480\n\
             2, 0, Note_on_c, 0, 64, 90\n\
             2, 10, Note_on_c, 0, 64, 80\n\
             2, 20, Note_off_c, 0, 64, 0\n\
             2, 30, Note_on_c, 0, 64, 0\n",
        );
        let seq = Sequence::from_rows(&rows).unwrap();
        let got: Vec<_> = seq
            .notes
            .iter()
            .map(|n| (n.onset_tick, n.end_tick(), n.velocity))
            .collect();
        assert_eq!(got, vec![(0, 20, 90), (10, 30, 80)]);
        assert_eq!((seq.unmatched, seq.degenerate), (0, 0));
    }

    #[test]
    fn huge_ticks_at_slowest_tempo_stay_exact() {
        let rows = rows(
            "0, 0, Header, 1, 2, 480\n\
             1, 0, Tempo, 16777215\n\
             2, 10000000000, Note_on_c, 0, 60, 100\n\
             2, 10000000480, Note_on_c, 0, 60, 0\n",
        );
        let seq = Sequence::from_rows(&rows).unwrap();
        let records = seq.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].start.to_integer(), 10_000_000_000u128 * 16_777_215 / 480);
        assert_eq!(records[0].duration.to_integer(), 16_777_215);
    }

    #[test]
    fn oversized_tempo_row_never_reaches_the_map() {
        let parsed: Vec<_> = parse_text("0, 0, Header, 1, 2, 480\n1, 0, Tempo, 4000000000\n").collect();
        assert!(parsed[1].is_err());
        let rows: Vec<Row> = parsed.into_iter().filter_map(Result::ok).collect();
        let map = build_tempo_map(&rows).unwrap();
        assert_eq!(map.breakpoints().len(), 1);
        assert_eq!(map.time_at_tick(480).unwrap().to_integer(), 500_000);
    }
}
