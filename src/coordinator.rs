// bell-choir -- ringing songs on simulated hand-bells
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! The coordinator hands out the bells and conducts the song.
//!
//! Every distinct pitch of the song is held by exactly one ringer, two pitches
//! per ringer in ascending order. The song is then played by handing a turn to
//! the owner of each note, one note at a time.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use log::{error, info, trace};

use crate::note::Pitch;
use crate::play::{PlayError, PlaybackConfig};
use crate::ringer::{Assignment, RingerContext, RingerHandle, SharedSink};
use crate::song::Song;
use crate::wave::WaveTable;

pub struct Coordinator {
    song: Song,
    ringers: Vec<RingerHandle>,
    /// Index into `ringers` of the owner of each pitch.
    owners: HashMap<Pitch, usize>,
}

impl Coordinator {
    /// Split the pitches into groups of two, the last ringer gets a single
    /// bell if the number of pitches is odd.
    pub fn assign(pitches: &BTreeSet<Pitch>) -> Vec<Assignment> {
        let pitches: Vec<Pitch> = pitches.iter().copied().collect();
        pitches
            .chunks(2)
            .map(|chunk| match *chunk {
                [first, second] => Assignment::pair(first, second),
                [single] => Assignment::single(single),
                _ => unreachable!("chunks of two are never empty"),
            })
            .collect()
    }

    /// Hand out the bells of `song` and start one ringer per assignment.
    pub fn new(
        song: Song,
        waves: Arc<WaveTable>,
        sink: SharedSink,
        config: PlaybackConfig,
    ) -> Result<Self, PlayError> {
        let context = RingerContext {
            queue: Arc::new(Mutex::new(song.notes().iter().copied().collect())),
            sink,
            waves,
            config,
        };

        let mut ringers = Vec::new();
        let mut owners = HashMap::new();
        for (index, assignment) in Self::assign(&song.distinct_pitches())
            .into_iter()
            .enumerate()
        {
            let name = format!("Member-{}", index);
            info!("{} is responsible for {}", name, assignment);
            owners.extend(assignment.pitches().map(|pitch| (pitch, index)));
            let ringer = RingerHandle::spawn(name.clone(), assignment, context.clone())
                .map_err(|source| PlayError::SpawnRinger {
                    ringer: name,
                    source,
                })?;
            ringers.push(ringer);
        }

        Ok(Self {
            song,
            ringers,
            owners,
        })
    }

    pub fn roster(&self) -> &[RingerHandle] {
        &self.ringers
    }

    pub fn owner_of(&self, pitch: Pitch) -> Option<&RingerHandle> {
        self.owners.get(&pitch).map(|&index| &self.ringers[index])
    }

    /// Play the whole song, then stop all ringers and wait for them to exit.
    /// Returns the number of notes played.
    pub fn run(mut self) -> Result<usize, PlayError> {
        info!("Song starting...");
        let played = self.ring_all();
        let shutdown = self.shutdown();
        let played = played?;
        shutdown?;
        info!("Song finished after {} notes", played);
        Ok(played)
    }

    fn ring_all(&self) -> Result<usize, PlayError> {
        let total = self.song.len();
        for (number, note) in self.song.notes().iter().enumerate() {
            let ringer = self
                .owner_of(note.pitch)
                .ok_or(PlayError::Unassigned { pitch: note.pitch })?;
            trace!("note {}/{}: {} to {}", number + 1, total, note.pitch, ringer.name());
            ringer
                .give_turn()
                .map_err(|source| PlayError::Turn { source })?;
        }
        Ok(total)
    }

    fn shutdown(&mut self) -> Result<(), PlayError> {
        for ringer in self.ringers.iter_mut() {
            ringer.stop();
        }
        let mut result = Ok(());
        for ringer in self.ringers.drain(..) {
            let name = ringer.name().to_string();
            if ringer.join().is_err() {
                error!("{} panicked", name);
                if result.is_ok() {
                    result = Err(PlayError::RingerPanicked { ringer: name });
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::output::MemorySink;
    use crate::ringer::RingerState;
    use crate::song::parse_song;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn config() -> PlaybackConfig {
        PlaybackConfig {
            sample_rate: 8000,
            measure_length_ms: 1000,
            gap_ms: 50,
        }
    }

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    fn coordinator(song: &str, sink: &Arc<Mutex<MemorySink>>) -> (Coordinator, Arc<WaveTable>) {
        let config = config();
        let waves = Arc::new(WaveTable::new(config.sample_rate, config.measure_length_ms));
        let shared: SharedSink = sink.clone();
        let coordinator =
            Coordinator::new(parse_song(song).song, waves.clone(), shared, config).unwrap();
        (coordinator, waves)
    }

    /// Run on a helper thread so a deadlock fails the test instead of hanging it.
    fn run_within_timeout(coordinator: Coordinator) -> usize {
        let (sender, receiver) = crossbeam_channel::bounded(1);
        std::thread::spawn(move || {
            let _ = sender.send(coordinator.run().ok());
        });
        receiver.recv_timeout(TIMEOUT).unwrap().unwrap()
    }

    /// The pitches in the order they reached the sink, skipping the gaps.
    fn sounded(sink: &MemorySink, waves: &WaveTable) -> Vec<Pitch> {
        sink.writes()
            .step_by(2)
            .map(|samples| {
                Pitch::all()
                    .find(|&p| waves.get(p).starts_with(samples))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn assignments_partition_the_pitches() {
        for n in 0..=Pitch::COUNT {
            let pitches: BTreeSet<Pitch> = Pitch::all().take(n).collect();
            let assignments = Coordinator::assign(&pitches);
            assert_eq!(assignments.len(), (n + 1) / 2);

            let assigned: Vec<Pitch> = assignments.iter().flat_map(|a| a.pitches()).collect();
            assert_eq!(assigned.len(), n);
            assert_eq!(assigned.iter().copied().collect::<BTreeSet<_>>(), pitches);

            for (i, a) in assignments.iter().enumerate() {
                let single = a.pitches().count() == 1;
                assert_eq!(single, n % 2 == 1 && i == assignments.len() - 1);
            }
        }
    }

    #[test]
    fn roster_does_not_depend_on_note_order() {
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let (first, _) = coordinator("B4 4\nA4 4\nC4 4", &sink);
        let (second, _) = coordinator("C4 8\nA4 2\nB4 4\nC4 4", &sink);
        let roster = |c: &Coordinator| -> Vec<Assignment> {
            c.roster().iter().map(RingerHandle::assignment).collect()
        };
        assert_eq!(roster(&first), roster(&second));
        assert_eq!(
            roster(&first),
            vec![
                Assignment::pair(pitch("A4"), pitch("B4")),
                Assignment::single(pitch("C4"))
            ]
        );
    }

    #[test]
    fn every_pitch_has_one_owner() {
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let (coordinator, _) = coordinator("A4 4\nREST 4\nC5 2\nD5S 8\nA4 4\nG6 1", &sink);
        assert_eq!(coordinator.roster().len(), 3);
        for name in &["REST", "A4", "C5", "D5S", "G6"] {
            let owners = coordinator
                .roster()
                .iter()
                .filter(|r| r.assignment().contains(pitch(name)))
                .count();
            assert_eq!(owners, 1);
            assert!(coordinator.owner_of(pitch(name)).is_some());
        }
        assert!(coordinator.owner_of(pitch("B4")).is_none());
        assert_eq!(coordinator.roster()[0].name(), "Member-0");
        assert!(coordinator
            .roster()
            .iter()
            .all(|r| r.state() == RingerState::Idle));
    }

    #[test]
    fn note_without_owner_stops_the_song() {
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let (mut coordinator, _) = coordinator("A4 4\nB4 4", &sink);
        coordinator.song = parse_song("A4 4\nC5 4\nB4 4").song;
        match coordinator.run() {
            Err(PlayError::Unassigned { pitch: p }) => assert_eq!(p, pitch("C5")),
            other => panic!("unexpected result {:?}", other),
        }
        // only the first note reached the sink
        assert_eq!(sink.lock().unwrap().writes().count(), 2);
    }

    #[test]
    fn single_ringer_plays_in_order() {
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let (coordinator, waves) = coordinator("A4 4\nB4 4\nA4 4", &sink);
        assert_eq!(coordinator.roster().len(), 1);
        assert_eq!(run_within_timeout(coordinator), 3);

        let sink = sink.lock().unwrap();
        let writes: Vec<&[i8]> = sink.writes().collect();
        let a4 = &waves.get(pitch("A4"))[..2000];
        let b4 = &waves.get(pitch("B4"))[..2000];
        let gap = &waves.get(Pitch::REST)[..400];
        assert_eq!(writes, vec![a4, gap, b4, gap, a4, gap]);
    }

    #[test]
    fn melody_order_is_preserved_across_ringers() {
        let song = "E5 4\nD5 4\nC5 4\nD5 4\nE5 4\nE5 4\nE5 2\n\
                    D5 4\nD5 4\nD5 2\nE5 4\nG5 4\nG5 2\nREST 8\n\
                    E5 4\nD5 4\nC5 4\nD5 4\nE5 4\nE5 4\nE5 4\nE5 4\n\
                    D5 4\nD5 4\nE5 4\nD5 4\nC5 1\nA4S 8\nB4F 8";
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let (coordinator, waves) = coordinator(song, &sink);
        // REST, A4S, C5, D5, E5, G5
        assert_eq!(coordinator.roster().len(), 3);
        let expected = parse_song(song).song;
        assert_eq!(run_within_timeout(coordinator), expected.len());

        let sink = sink.lock().unwrap();
        let pitches: Vec<Pitch> = expected.notes().iter().map(|n| n.pitch).collect();
        assert_eq!(sounded(&sink, &waves), pitches);

        let lengths: Vec<usize> = sink.writes().step_by(2).map(|s| s.len()).collect();
        let expected_lengths: Vec<usize> = expected
            .notes()
            .iter()
            .map(|n| config().note_samples(n.duration))
            .collect();
        assert_eq!(lengths, expected_lengths);
    }

    #[test]
    fn empty_song() {
        let sink = Arc::new(Mutex::new(MemorySink::new()));
        let (coordinator, _) = coordinator("", &sink);
        assert!(coordinator.roster().is_empty());
        assert_eq!(run_within_timeout(coordinator), 0);
        assert!(sink.lock().unwrap().events().is_empty());
    }
}
