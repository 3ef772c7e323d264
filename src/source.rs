//! source.rs
//!
//! Where rows come from. Dispatch is purely on file extension:
//! - `.csv` is read as a `midicsv` dump
//! - `.mid`, `.midi`, `.kar` are decoded with `midly`, or piped through an
//!   external converter program when one is configured

use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use midly::Smf;

use crate::{
    error::{Error, RowError},
    midi::smf_to_rows,
    rows::{Row, parse_text},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Midi,
}

impl SourceKind {
    /// Classify by extension, case-insensitive. `None` means not ours.
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "mid" | "midi" | "kar" => Some(Self::Midi),
            _ => None,
        }
    }
}

/// Rows read from one input, plus the rows that had to be skipped.
#[derive(Debug, Default)]
pub struct Loaded {
    pub rows: Vec<Row>,
    pub skipped: Vec<RowError>,
}

impl Loaded {
    fn from_text(text: &str) -> Self {
        let mut loaded = Self::default();
        for res in parse_text(text) {
            match res {
                Ok(row) => loaded.rows.push(row),
                Err(e) => {
                    log::warn!("skipping row, {e}");
                    loaded.skipped.push(e);
                }
            }
        }
        loaded
    }
}

/// Reads inputs into rows.
#[derive(Clone, Debug, Default)]
pub struct Source {
    /// External MIDI → CSV converter, e.g. `midicsv`
    pub converter: Option<PathBuf>,
}

impl Source {
    pub const fn new(converter: Option<PathBuf>) -> Self {
        Self { converter }
    }

    pub fn load(&self, path: &Path) -> Result<Loaded, Error> {
        match SourceKind::of(path) {
            Some(SourceKind::Csv) => {
                let text = read_text(path).map_err(|e| unavailable(path, e))?;
                Ok(Loaded::from_text(&text))
            }
            Some(SourceKind::Midi) => match &self.converter {
                Some(program) => {
                    let text = run_converter(program, path).map_err(|e| unavailable(path, e))?;
                    Ok(Loaded::from_text(&text))
                }
                None => {
                    let bytes = fs::read(path)
                        .with_context(|| format!("opening {path:?}"))
                        .map_err(|e| unavailable(path, e))?;
                    let smf = Smf::parse(&bytes)
                        .context("not a valid standard MIDI file")
                        .map_err(|e| unavailable(path, e))?;
                    Ok(Loaded { rows: smf_to_rows(&smf)?, skipped: Vec::new() })
                }
            },
            None => Err(Error::UnsupportedExtension(path.to_path_buf())),
        }
    }
}

// midicsv writes text meta events byte for byte, which need not be UTF-8
fn read_text(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("opening {path:?}"))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn run_converter(program: &Path, path: &Path) -> anyhow::Result<String> {
    let out = Command::new(program)
        .arg(path)
        .output()
        .with_context(|| format!("running {program:?}, is it installed?"))?;
    if !out.status.success() {
        anyhow::bail!(
            "{program:?} exited with {}: {}",
            out.status,
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

fn unavailable(path: &Path, err: anyhow::Error) -> Error {
    Error::SourceUnavailable { path: path.to_path_buf(), reason: format!("{err:#}") }
}
