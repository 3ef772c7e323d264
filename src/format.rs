//! format.rs
//!
//! Renders paired notes into output records: onset and duration in real time,
//! plus a readable pitch name such as `C#4`.

use std::io::Write;

use crate::{
    error::Error,
    pairing::Note,
    tempo::{Micros, TempoMap, to_seconds},
};

const LETTERS: [char; 12] = ['C', 'C', 'D', 'D', 'E', 'F', 'F', 'G', 'G', 'A', 'A', 'B'];
const SHARPS: [&str; 12] = ["", "#", "", "#", "", "", "#", "", "#", "", "#", ""];

/// Sharps-only spelling with octave, MIDI convention (60 = C4).
pub fn pitch_name(pitch: u8) -> String {
    let pc = usize::from(pitch % 12);
    let octave = i32::from(pitch / 12) - 1;
    format!("{}{}{}", LETTERS[pc], SHARPS[pc], octave)
}

/// How time columns are written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeUnit {
    /// Seconds with six decimals, i.e. microsecond resolution
    #[default]
    Seconds,
    /// Whole microseconds, floored
    Micros,
}

impl TimeUnit {
    pub const fn header(self) -> [&'static str; 8] {
        let (start, dur) = match self {
            Self::Seconds => ("start_secs", "dur_secs"),
            Self::Micros => ("start_us", "dur_us"),
        };
        ["start_ticks", start, "dur_ticks", dur, "pitch", "fullNoteOctave", "velocity", "part"]
    }

    fn render(self, t: Micros) -> String {
        match self {
            Self::Seconds => format!("{:.6}", to_seconds(t)),
            Self::Micros => t.to_integer().to_string(),
        }
    }
}

/// One output row.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteRecord {
    pub start_ticks: u64,
    pub start: Micros,
    pub duration_ticks: u64,
    pub duration: Micros,
    pub pitch: u8,
    pub name: String,
    pub velocity: u8,
    pub track: u32,
}

impl NoteRecord {
    /// Output fields in column order.
    pub fn fields(&self, unit: TimeUnit) -> [String; 8] {
        [
            self.start_ticks.to_string(),
            unit.render(self.start),
            self.duration_ticks.to_string(),
            unit.render(self.duration),
            self.pitch.to_string(),
            self.name.clone(),
            self.velocity.to_string(),
            self.track.to_string(),
        ]
    }
}

/// Derive display fields for one note.
pub fn format_note(note: &Note, tempo: &TempoMap) -> Result<NoteRecord, Error> {
    let start = tempo.time_at_tick(note.onset_tick)?;
    let end = tempo.time_at_tick(note.end_tick())?;
    Ok(NoteRecord {
        start_ticks: note.onset_tick,
        start,
        duration_ticks: note.duration_ticks,
        duration: end - start,
        pitch: note.pitch,
        name: pitch_name(note.pitch),
        velocity: note.velocity,
        track: note.track,
    })
}

/// CSV output shared by every input of a run: one header line, then the rows
/// of each input in turn.
pub struct NoteSink<W: Write> {
    writer: csv::Writer<W>,
    unit: TimeUnit,
}

impl<W: Write> NoteSink<W> {
    pub fn new(out: W, unit: TimeUnit) -> Result<Self, Error> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(out);
        writer.write_record(unit.header())?;
        Ok(Self { writer, unit })
    }

    pub fn write(&mut self, records: &[NoteRecord]) -> Result<(), Error> {
        for r in records {
            self.writer.write_record(r.fields(self.unit))?;
        }
        Ok(())
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W, Error> {
        self.writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }
}
