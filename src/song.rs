// bell-choir -- ringing songs on simulated hand-bells
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! A song is a melody of notes, one bell at a time.
//!
//! Songs are written one note per line as `<PITCH> <DENOMINATOR>`, e.g.
//!
//! ```text
//! A4 4
//! B4F 8
//! REST 2
//! ```
//!
//! Lines that cannot be understood are dropped and reported,
//! the rest of the song is still played.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use snafu::{ResultExt, Snafu};

use crate::note::{Duration, Pitch};

/// A single note of a song.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Note {
    /// Which bell is rung
    pub pitch: Pitch,
    /// How long the bell sounds
    pub duration: Duration,
}

impl Note {
    pub fn new(pitch: Pitch, duration: Duration) -> Self {
        Self { pitch, duration }
    }
}

/// A melody, played strictly in order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Song {
    notes: Vec<Note>,
}

impl Song {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The pitches used by the song, in ascending order.
    pub fn distinct_pitches(&self) -> BTreeSet<Pitch> {
        self.notes.iter().map(|note| note.pitch).collect()
    }
}

/// A line of a song file that was dropped.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum LineError {
    #[snafu(display(
        "line {}: {:?} must contain a pitch and a length, found {} tokens",
        line,
        text,
        found
    ))]
    TokenCount {
        line: usize,
        text: String,
        found: usize,
    },
    #[snafu(display("line {}: {:?} has an invalid pitch {:?}", line, text, pitch))]
    UnknownPitch {
        line: usize,
        text: String,
        pitch: String,
    },
    #[snafu(display(
        "line {}: {:?} has an invalid length {:?}, expected 1, 2, 4 or 8",
        line,
        text,
        length
    ))]
    UnsupportedDuration {
        line: usize,
        text: String,
        length: String,
    },
}

impl LineError {
    /// The 1-based number of the offending line.
    pub fn line(&self) -> usize {
        match self {
            LineError::TokenCount { line, .. }
            | LineError::UnknownPitch { line, .. }
            | LineError::UnsupportedDuration { line, .. } => *line,
        }
    }
}

#[derive(Debug, Snafu)]
pub enum LoadError {
    #[snafu(display("Failed to read song {}: {}", path.display(), source))]
    ReadSong { path: PathBuf, source: io::Error },
    #[snafu(display(
        "Song {} is empty or has no valid notes ({} lines rejected)",
        path.display(),
        rejected
    ))]
    NoValidNotes { path: PathBuf, rejected: usize },
}

/// The notes that could be parsed, along with the reasons for dropping the others.
#[derive(Debug, Default)]
pub struct ParsedSong {
    pub song: Song,
    pub diagnostics: Vec<LineError>,
}

/// Parse a song, dropping every line that does not describe a note.
///
/// Pitch and length may be separated by any amount of whitespace, and
/// whitespace around them is ignored. An empty line is reported like any
/// other line without exactly two tokens.
pub fn parse_song(input: &str) -> ParsedSong {
    let mut notes = Vec::new();
    let mut diagnostics = Vec::new();
    for (index, text) in input.lines().enumerate() {
        match parse_line(index + 1, text) {
            Ok(note) => notes.push(note),
            Err(err) => diagnostics.push(err),
        }
    }
    ParsedSong {
        song: Song::new(notes),
        diagnostics,
    }
}

fn parse_line(line: usize, text: &str) -> Result<Note, LineError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let (pitch_str, length_str) = match tokens.as_slice() {
        [pitch, length] => (*pitch, *length),
        _ => {
            return Err(LineError::TokenCount {
                line,
                text: text.to_string(),
                found: tokens.len(),
            })
        }
    };

    let pitch = pitch_str
        .parse::<Pitch>()
        .map_err(|_| LineError::UnknownPitch {
            line,
            text: text.to_string(),
            pitch: pitch_str.to_string(),
        })?;
    let duration = length_str
        .parse::<u32>()
        .ok()
        .and_then(Duration::from_denominator)
        .ok_or_else(|| LineError::UnsupportedDuration {
            line,
            text: text.to_string(),
            length: length_str.to_string(),
        })?;
    Ok(Note::new(pitch, duration))
}

/// Read a song file.
///
/// Rejected lines are logged and returned as diagnostics. A file without a single
/// valid note is an error, while an empty [`Song`] built in code is a valid song.
pub fn load_song(path: &Path) -> Result<ParsedSong, LoadError> {
    let input = fs::read_to_string(path).context(ReadSong { path })?;
    let parsed = parse_song(&input);
    for diagnostic in parsed.diagnostics.iter() {
        warn!("dropping note: {}", diagnostic);
    }
    if parsed.song.is_empty() {
        return Err(LoadError::NoValidNotes {
            path: path.to_path_buf(),
            rejected: parsed.diagnostics.len(),
        });
    }
    info!(
        "loaded {} notes from {} ({} lines rejected)",
        parsed.song.len(),
        path.display(),
        parsed.diagnostics.len()
    );
    Ok(parsed)
}
