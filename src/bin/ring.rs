// bell-choir -- ringing songs on simulated hand-bells
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! `ring` - plays a song file on a choir of simulated hand-bells.

use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex};

use log::{error, info};
use snafu::{ResultExt, Snafu};
use structopt::StructOpt;

use bell_choir::output::sox::{SoxSink, SoxTarget};
use bell_choir::output::MemorySink;
use bell_choir::play::{self, PlayError, PlaybackConfig};
use bell_choir::song::{self, LoadError};

#[derive(Debug, StructOpt)]
#[structopt(name = "ring", about = "Ringing songs on simulated hand-bells")]
struct Opt {
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: usize,

    /// The song, one `<PITCH> <LENGTH>` pair per line, e.g. `A4S 8`.
    #[structopt(parse(from_os_str))]
    song: PathBuf,

    /// Output file (any sox-supported format). Music is played directly if not given.
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,

    /// Length of a whole note in milliseconds.
    #[structopt(long = "measure-ms", default_value = "1000")]
    measure_ms: u32,

    /// Silence after every note in milliseconds.
    #[structopt(long = "gap-ms", default_value = "50")]
    gap_ms: u32,

    /// Ring the song without sending it to sox.
    #[structopt(long)]
    dry_run: bool,
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("{}", source))]
    Load { source: LoadError },
    #[snafu(display("Unable to play the song: {}", source))]
    Play { source: PlayError },
}

impl Error {
    fn exit_code(&self) -> i32 {
        match self {
            Error::Load { .. } => 1,
            Error::Play {
                source: PlayError::OpenSink { .. },
            } => 2,
            Error::Play { .. } => 3,
        }
    }
}

fn main() {
    let opt = Opt::from_args();

    let level = match opt.verbose {
        0 => log::Level::Info,
        1 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    if let Err(err) = simple_logger::init_with_level(level) {
        eprintln!("Unable to set up logging: {}", err);
    }

    if let Err(err) = run(opt) {
        error!("{}", err);
        process::exit(err.exit_code());
    }
}

fn run(opt: Opt) -> Result<(), Error> {
    let parsed = song::load_song(&opt.song).context(Load)?;
    let config = PlaybackConfig {
        measure_length_ms: opt.measure_ms,
        gap_ms: opt.gap_ms,
        ..PlaybackConfig::default()
    };

    if opt.dry_run {
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let stats = play::play_song(parsed.song, config, sink.clone()).context(Play)?;
        let samples = sink.lock().map(|s| s.samples_written()).unwrap_or(0);
        info!(
            "Dry run: {} ringers rang {} notes, {} samples ({:.2} seconds)",
            stats.ringers,
            stats.notes,
            samples,
            samples as f64 / f64::from(config.sample_rate)
        );
        return Ok(());
    }

    let target = match opt.output {
        None => SoxTarget::Play,
        Some(path) => SoxTarget::File(path),
    };
    let sink = Arc::new(Mutex::new(SoxSink::new(config.sample_rate, target)));
    let stats = play::play_song(parsed.song, config, sink).context(Play)?;
    info!(
        "Song played successfully: {} notes on {} ringers",
        stats.notes, stats.ringers
    );
    Ok(())
}
