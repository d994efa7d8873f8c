// bell-choir -- ringing songs on simulated hand-bells
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Ringers are the members of the choir, each holding one or two bells.
//!
//! A ringer runs on its own thread but only ever plays when it is handed a turn.
//! Handing over a turn is a rendezvous on a zero-capacity channel: the
//! [`RingerHandle`] sends a turn, the ringer takes the next note off the shared
//! queue, plays it and replies with the outcome. Until the reply arrives the
//! caller is blocked, so at most one bell sounds at any time.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error};
use snafu::Snafu;

use crate::note::Pitch;
use crate::output::AudioSink;
use crate::play::PlaybackConfig;
use crate::song::Note;
use crate::wave::WaveTable;

/// The audio output shared by all ringers of a choir.
pub type SharedSink = Arc<Mutex<dyn AudioSink + Send>>;

/// The notes still to be played, front first.
pub type NoteQueue = Arc<Mutex<VecDeque<Note>>>;

/// The bells held by one ringer: one or two distinct pitches.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Assignment {
    first: Pitch,
    second: Option<Pitch>,
}

impl Assignment {
    pub fn single(pitch: Pitch) -> Self {
        Self {
            first: pitch,
            second: None,
        }
    }

    /// # Panics
    ///
    /// If both pitches are the same.
    pub fn pair(first: Pitch, second: Pitch) -> Self {
        assert_ne!(first, second, "a ringer cannot hold the same bell twice");
        Self {
            first,
            second: Some(second),
        }
    }

    pub fn contains(&self, pitch: Pitch) -> bool {
        self.first == pitch || self.second == Some(pitch)
    }

    pub fn pitches(&self) -> impl Iterator<Item = Pitch> {
        std::iter::once(self.first).chain(self.second)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.second {
            Some(second) => write!(f, "notes: {} and {}", self.first, second),
            None => write!(f, "note: {}", self.first),
        }
    }
}

/// Everything the ringers of one choir share.
#[derive(Clone)]
pub struct RingerContext {
    pub queue: NoteQueue,
    pub sink: SharedSink,
    pub waves: Arc<WaveTable>,
    pub config: PlaybackConfig,
}

/// Where a ringer is in its life cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RingerState {
    /// Waiting for a turn.
    Idle,
    /// Holding a turn, i.e. playing a note.
    Playing,
    /// The thread has exited.
    Terminated,
}

#[derive(Debug, Snafu)]
pub enum TurnError {
    #[snafu(display("{} failed to play its note: {}", ringer, source))]
    WriteNote { ringer: String, source: io::Error },
    #[snafu(display("{} was given a turn but no notes were left", ringer))]
    QueueExhausted { ringer: String },
    #[snafu(display("{} is no longer running", ringer))]
    Stopped { ringer: String },
}

/// The right to play the note at the front of the queue.
struct Turn;

enum TurnOutcome {
    Played(Note),
    Failed(io::Error),
    Exhausted,
}

/// The worker half, living on the ringer's thread.
struct Ringer {
    name: String,
    assignment: Assignment,
    context: RingerContext,
    turns: Receiver<Turn>,
    outcomes: Sender<TurnOutcome>,
}

impl Ringer {
    fn run(self) {
        // The handle hanging up is the stop signal, also while we are blocked here.
        while self.turns.recv().is_ok() {
            let next = self
                .context
                .queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let note = match next {
                Some(note) => note,
                None => {
                    error!("{} was given a turn but the song is over", self.name);
                    let _ = self.outcomes.send(TurnOutcome::Exhausted);
                    break;
                }
            };
            debug_assert!(
                self.assignment.contains(note.pitch),
                "{} was handed {} which it does not hold",
                self.name,
                note.pitch
            );
            let outcome = match self.play(note) {
                Ok(()) => TurnOutcome::Played(note),
                Err(err) => TurnOutcome::Failed(err),
            };
            if self.outcomes.send(outcome).is_err() {
                break;
            }
        }
        debug!("{} exiting.", self.name);
    }

    /// Write the note, cut to at most one measure, followed by a short silence.
    fn play(&self, note: Note) -> io::Result<()> {
        debug!("{} is playing note: {}", self.name, note.pitch);
        let config = &self.context.config;
        let wave = self.context.waves.get(note.pitch);
        let rest = self.context.waves.get(Pitch::REST);
        let note_len = config.note_samples(note.duration).min(wave.len());
        let gap_len = config.gap_samples().min(rest.len());

        let mut sink = self
            .context
            .sink
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audio sink lock poisoned"))?;
        sink.write(&wave[..note_len])?;
        sink.write(&rest[..gap_len])
    }
}

/// Controls a ringer running on its own thread.
pub struct RingerHandle {
    name: String,
    assignment: Assignment,
    turns: Option<Sender<Turn>>,
    outcomes: Receiver<TurnOutcome>,
    in_turn: AtomicBool,
    thread: Option<JoinHandle<()>>,
}

impl RingerHandle {
    /// Start a ringer. It waits for its first turn right away.
    pub fn spawn(
        name: String,
        assignment: Assignment,
        context: RingerContext,
    ) -> io::Result<Self> {
        let (turn_sender, turn_receiver) = crossbeam_channel::bounded(0);
        let (outcome_sender, outcome_receiver) = crossbeam_channel::bounded(0);
        let ringer = Ringer {
            name: name.clone(),
            assignment,
            context,
            turns: turn_receiver,
            outcomes: outcome_sender,
        };
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || ringer.run())?;

        Ok(Self {
            name,
            assignment,
            turns: Some(turn_sender),
            outcomes: outcome_receiver,
            in_turn: AtomicBool::new(false),
            thread: Some(thread),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn assignment(&self) -> Assignment {
        self.assignment
    }

    pub fn state(&self) -> RingerState {
        match &self.thread {
            Some(thread) if !thread.is_finished() => {
                if self.in_turn.load(Ordering::SeqCst) {
                    RingerState::Playing
                } else {
                    RingerState::Idle
                }
            }
            _ => RingerState::Terminated,
        }
    }

    /// Let the ringer play the note at the front of the queue,
    /// blocking until it has been written to the sink.
    ///
    /// # Panics
    ///
    /// If the ringer is still busy with a previous turn. Turns are handed out
    /// one at a time, so this is always a bug in the caller.
    pub fn give_turn(&self) -> Result<Note, TurnError> {
        if self.in_turn.swap(true, Ordering::SeqCst) {
            panic!(
                "Attempt to give a turn to {} before it completed the current turn",
                self.name
            );
        }
        let result = self.take_turn();
        self.in_turn.store(false, Ordering::SeqCst);
        result
    }

    fn take_turn(&self) -> Result<Note, TurnError> {
        let stopped = || TurnError::Stopped {
            ringer: self.name.clone(),
        };
        let turns = self.turns.as_ref().ok_or_else(stopped)?;
        turns.send(Turn).map_err(|_| stopped())?;
        match self.outcomes.recv() {
            Ok(TurnOutcome::Played(note)) => Ok(note),
            Ok(TurnOutcome::Failed(source)) => Err(TurnError::WriteNote {
                ringer: self.name.clone(),
                source,
            }),
            Ok(TurnOutcome::Exhausted) => Err(TurnError::QueueExhausted {
                ringer: self.name.clone(),
            }),
            Err(_) => Err(stopped()),
        }
    }

    /// Ask the ringer to exit. Wakes it up if it is waiting for a turn;
    /// calling it again has no effect.
    pub fn stop(&mut self) {
        if self.turns.take().is_some() {
            debug!("stopping {}", self.name);
        }
    }

    /// Stop the ringer and wait for its thread to exit.
    /// Fails if the ringer panicked.
    pub fn join(mut self) -> thread::Result<()> {
        self.stop();
        match self.thread.take() {
            Some(thread) => thread.join(),
            None => Ok(()),
        }
    }
}

impl Drop for RingerHandle {
    fn drop(&mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl fmt::Debug for RingerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingerHandle")
            .field("name", &self.name)
            .field("assignment", &self.assignment)
            .field("state", &self.state())
            .finish()
    }
}
