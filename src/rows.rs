//! rows.rs
//!
//! The input side of the pipeline: a MIDI file flattened into one row per event,
//! in the shape produced by the `midicsv` utility:
//!
//! ```text
//! 0, 0, Header, 1, 2, 480
//! 1, 0, Tempo, 500000
//! 2, 0, Note_on_c, 0, 60, 100
//! 2, 480, Note_on_c, 0, 60, 0
//! ```
//!
//! Only the row types the note pipeline needs are decoded; everything else becomes
//! [`RowKind::Other`] and is ignored downstream.

use csv::{ReaderBuilder, StringRecord, Trim};

use crate::{error::RowError, tempo::MAX_TEMPO};

/// One event row. `line` is 1-based for text input and 0 for rows decoded from SMF.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Row {
    pub line: usize,
    pub track: u32,
    pub tick: u64,
    pub kind: RowKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RowKind {
    /// File header: SMF format, track count, ticks per quarter note
    Header { format: u16, tracks: u16, tpqn: u32 },
    /// Tempo change in microseconds per quarter note
    Tempo { tempo: u32 },
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8 },
    /// Any row type we don't use (Title_t, Control_c, End_track, ...)
    Other,
}

/// Parse a whole midicsv dump.
///
/// Blank lines are skipped. Malformed rows come back as `Err` items in line order
/// so the caller decides whether to log or collect them.
pub fn parse_text(text: &str) -> impl Iterator<Item = Result<Row, RowError>> + '_ {
    ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes())
        .into_records()
        .map(|res| {
            let record = res.map_err(|e| {
                let line = e.position().map_or(0, |p| p.line() as usize);
                malformed(line, e.to_string())
            })?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            parse_record(line, &record)
        })
}

/// Decode one midicsv record.
pub fn parse_record(line: usize, record: &StringRecord) -> Result<Row, RowError> {
    if record.len() < 3 {
        return Err(malformed(line, format!("expected at least 3 fields, got {}", record.len())));
    }

    let track: u32 = field(line, record, 0, "track")?;
    let tick: i64 = field(line, record, 1, "tick")?;
    let tick = u64::try_from(tick).map_err(|_| RowError::InvalidTick { line, tick })?;

    let kind = match &record[2] {
        "Header" => RowKind::Header {
            format: field(line, record, 3, "format")?,
            tracks: field(line, record, 4, "track count")?,
            tpqn: field(line, record, 5, "division")?,
        },
        "Tempo" => {
            let tempo: u32 = field(line, record, 3, "tempo")?;
            if tempo > MAX_TEMPO {
                return Err(malformed(line, format!("tempo out of range: {tempo}")));
            }
            RowKind::Tempo { tempo }
        }
        "Note_on_c" => RowKind::NoteOn {
            pitch: data_byte(line, record, 4, "note")?,
            velocity: data_byte(line, record, 5, "velocity")?,
        },
        "Note_off_c" => RowKind::NoteOff { pitch: data_byte(line, record, 4, "note")? },
        "" => return Err(malformed(line, "empty record type".to_string())),
        _ => RowKind::Other,
    };

    Ok(Row { line, track, tick, kind })
}

fn field<T: std::str::FromStr>(
    line: usize,
    record: &StringRecord,
    idx: usize,
    what: &str,
) -> Result<T, RowError> {
    let raw = record
        .get(idx)
        .ok_or_else(|| malformed(line, format!("missing {what}")))?;
    raw.parse()
        .map_err(|_| malformed(line, format!("{what} is not a number: {raw:?}")))
}

// MIDI data bytes are 7 bit
fn data_byte(line: usize, record: &StringRecord, idx: usize, what: &str) -> Result<u8, RowError> {
    let v: u8 = field(line, record, idx, what)?;
    if v > 127 {
        return Err(malformed(line, format!("{what} out of range: {v}")));
    }
    Ok(v)
}

fn malformed(line: usize, reason: String) -> RowError {
    RowError::Malformed { line, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(text: &str) -> Result<Row, RowError> {
        parse_text(text).next().expect("one row")
    }

    #[test]
    fn parses_known_row_types() {
        let text = "0, 0, Header, 1, 2, 480\n\
                    1, 0, Tempo, 500000\n\
                    2, 0, Note_on_c, 0, 60, 100\n\
                    2, 480, Note_off_c, 0, 60, 64\n";
        let rows: Vec<_> = parse_text(text).collect::<Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].kind, RowKind::Header { format: 1, tracks: 2, tpqn: 480 });
        assert_eq!(rows[1].kind, RowKind::Tempo { tempo: 500_000 });
        assert_eq!(rows[2].kind, RowKind::NoteOn { pitch: 60, velocity: 100 });
        assert_eq!(rows[3].tick, 480);
        assert_eq!(rows[3].kind, RowKind::NoteOff { pitch: 60 });
        assert_eq!(rows[3].line, 4);
    }

    #[test]
    fn unknown_types_are_other() {
        let row = one("1, 0, Title_t, \"Piano, left hand\"").unwrap();
        assert_eq!(row.kind, RowKind::Other);
        let row = one("1,0,Text_t,\"a, b, c\"").unwrap();
        assert_eq!(row.kind, RowKind::Other);
        let row = one("0, 0, End_of_file").unwrap();
        assert_eq!(row.kind, RowKind::Other);
    }

    #[test]
    fn tolerates_spacing() {
        let row = one("2,10,Note_on_c,1,61,90").unwrap();
        assert_eq!(row.track, 2);
        assert_eq!(row.kind, RowKind::NoteOn { pitch: 61, velocity: 90 });
    }

    #[test]
    fn malformed_rows_are_reported() {
        let text = "2, 0, Note_on_c, 0, sixty, 100\n\
                    1, 0, Tempo\n\
                    garbage\n\
                    2, 0, Note_on_c, 0, 200, 100\n";
        let lines: Vec<_> = parse_text(text)
            .map(|r| match r {
                Err(RowError::Malformed { line, .. }) => line,
                other => panic!("expected malformed row, got {other:?}"),
            })
            .collect();
        assert_eq!(lines, vec![1, 2, 3, 4]);
    }

    #[test]
    fn tempo_wider_than_24_bits_is_rejected() {
        assert!(matches!(one("1, 0, Tempo, 4000000000"), Err(RowError::Malformed { .. })));
        assert!(matches!(one("1, 0, Tempo, 16777216"), Err(RowError::Malformed { .. })));
        assert_eq!(one("1, 0, Tempo, 16777215").unwrap().kind, RowKind::Tempo { tempo: MAX_TEMPO });
    }

    #[test]
    fn negative_tick_is_rejected() {
        assert_eq!(
            one("2, -5, Note_on_c, 0, 60, 100"),
            Err(RowError::InvalidTick { line: 1, tick: -5 })
        );
    }

    #[test]
    fn blank_lines_are_skipped() {
        let rows: Vec<_> = parse_text("\n1, 0, Tempo, 400000\n\n").collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].as_ref().unwrap().line, 2);
    }
}
