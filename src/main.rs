use anyhow::{Context, Result};
use clap::Parser;
use std::{
    fs::File,
    io::{BufWriter, Write, stdout},
    path::{Path, PathBuf},
};

mod error;
mod format;
mod midi;
mod pairing;
mod rows;
mod sequencer;
mod source;
mod tempo;

use error::Error;
use format::{NoteSink, TimeUnit};
use sequencer::Sequence;
use source::Source;

/// List the notes of MIDI files with their onset and duration in real time.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Opt {
    /// Input files: midicsv dumps (.csv) or MIDI files (.mid, .midi, .kar)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
    /// Write rows to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Convert MIDI files with this external program (e.g. midicsv) instead of
    /// decoding them directly
    #[arg(long, value_name = "PROGRAM")]
    midicsv: Option<PathBuf>,
    /// Write times as whole microseconds instead of seconds
    #[arg(long, default_value_t = false)]
    micros: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("midi_notes=info"))
        .init();

    let opt = Opt::parse();
    let unit = if opt.micros { TimeUnit::Micros } else { TimeUnit::Seconds };
    let source = Source::new(opt.midicsv.clone());

    let out: Box<dyn Write> = match &opt.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {path:?}"))?,
        )),
        None => Box::new(BufWriter::new(stdout().lock())),
    };
    // one CSV for the whole run: a single header, then every input's rows
    let mut sink = NoteSink::new(out, unit).context("writing output header")?;

    let mut failed = 0usize;
    for path in &opt.inputs {
        match process(&source, path, &mut sink) {
            Ok(()) => {}
            Err(Error::UnsupportedExtension(_)) => {
                log::info!("Ignoring: {} (not a MIDI or CSV file)", path.display());
            }
            Err(e) => {
                log::error!("{}: {e}", path.display());
                failed += 1;
            }
        }
    }
    sink.finish()
        .and_then(|mut out| Ok(out.flush()?))
        .context("flushing output")?;

    if failed > 0 {
        anyhow::bail!("{failed} of {} inputs failed", opt.inputs.len());
    }
    Ok(())
}

/// Convert one input and append its rows to `sink`.
///
/// Nothing is written unless the whole input converted.
fn process<W: Write>(source: &Source, path: &Path, sink: &mut NoteSink<W>) -> Result<(), Error> {
    let loaded = source.load(path)?;
    log::info!("File: {} ({} rows, {} skipped)", path.display(), loaded.rows.len(), loaded.skipped.len());

    let seq = Sequence::from_rows(&loaded.rows)?;
    if seq.unmatched + seq.degenerate > 0 {
        log::info!(
            "{}: dropped {} unterminated and {} empty notes",
            path.display(),
            seq.unmatched,
            seq.degenerate
        );
    }
    let records = seq.records()?;
    sink.write(&records)
}
