// bell-choir -- ringing songs on simulated hand-bells
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Play a song on an audio sink.

use std::io;
use std::sync::{Arc, Mutex};

use log::info;
use snafu::{ResultExt, Snafu};

use crate::coordinator::Coordinator;
use crate::note::{Duration, Pitch};
use crate::output::AudioSink;
use crate::ringer::{SharedSink, TurnError};
use crate::song::Song;
use crate::wave::{samples_for_ms, WaveTable};

/// Default sample rate, roughly 48 kHz.
pub const SAMPLE_RATE: u32 = 48 * 1024;

/// How the notes of a song are turned into samples.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlaybackConfig {
    /// Number of samples per second.
    pub sample_rate: u32,
    /// Length of a whole note. No note plays longer than this.
    pub measure_length_ms: u32,
    /// Silence after each note, so that repeated notes can be told apart.
    pub gap_ms: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            measure_length_ms: 1000,
            gap_ms: 50,
        }
    }
}

impl PlaybackConfig {
    /// Number of samples written for a note of the given length.
    pub fn note_samples(&self, duration: Duration) -> usize {
        let ms = duration
            .time_ms(self.measure_length_ms)
            .min(self.measure_length_ms);
        samples_for_ms(self.sample_rate, ms)
    }

    /// Number of silent samples written after every note.
    pub fn gap_samples(&self) -> usize {
        samples_for_ms(self.sample_rate, self.gap_ms.min(self.measure_length_ms))
    }
}

#[derive(Debug, Snafu)]
pub enum PlayError {
    #[snafu(display("Unable to open the audio output: {}", source))]
    OpenSink { source: io::Error },
    #[snafu(display("Unable to start the audio output: {}", source))]
    StartSink { source: io::Error },
    #[snafu(display("Unable to drain the audio output: {}", source))]
    DrainSink { source: io::Error },
    #[snafu(display("Unable to close the audio output: {}", source))]
    CloseSink { source: io::Error },
    #[snafu(display("Unable to start ringer {}: {}", ringer, source))]
    SpawnRinger { ringer: String, source: io::Error },
    #[snafu(display("Playback stopped: {}", source))]
    Turn { source: TurnError },
    #[snafu(display("No ringer holds the bell {}", pitch))]
    Unassigned { pitch: Pitch },
    #[snafu(display("Ringer {} panicked", ringer))]
    RingerPanicked { ringer: String },
}

/// Summary of a finished song.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlayStats {
    pub ringers: usize,
    pub notes: usize,
}

/// Ring a song through `sink`, opening it before the first and closing it after
/// the last note.
///
/// The sink is closed even if playback fails half-way.
pub fn play_song<S>(
    song: Song,
    config: PlaybackConfig,
    sink: Arc<Mutex<S>>,
) -> Result<PlayStats, PlayError>
where
    S: AudioSink + Send + 'static,
{
    info!(
        "playing {} notes at {} Hz, {} ms per measure",
        song.len(),
        config.sample_rate,
        config.measure_length_ms
    );
    with_sink(&sink, |s| s.open()).context(OpenSink)?;

    let result = with_sink(&sink, |s| s.start())
        .context(StartSink)
        .and_then(|()| {
            let waves = Arc::new(WaveTable::new(config.sample_rate, config.measure_length_ms));
            let shared: SharedSink = sink.clone();
            let coordinator = Coordinator::new(song, waves, shared, config)?;
            let ringers = coordinator.roster().len();
            let notes = coordinator.run()?;
            Ok(PlayStats { ringers, notes })
        })
        .and_then(|stats| with_sink(&sink, |s| s.drain()).context(DrainSink).map(|()| stats));

    let closed = with_sink(&sink, |s| s.close()).context(CloseSink);
    let stats = result?;
    closed?;
    Ok(stats)
}

fn with_sink<S, R>(
    sink: &Mutex<S>,
    action: impl FnOnce(&mut S) -> io::Result<R>,
) -> io::Result<R>
where
    S: AudioSink + ?Sized,
{
    let mut guard = sink
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "audio sink lock poisoned"))?;
    action(&mut *guard)
}
