// bell-choir -- ringing songs on simulated hand-bells
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Definitions of what a pitch and a note length are.

use std::fmt;
use std::str::FromStr;

use snafu::Snafu;

/// Frequency of A4, the lowest bell in the set.
pub const FREQUENCY_A4_HZ: f64 = 440.0;

/// Names of the half steps within one octave, starting from A.
/// The boolean marks the sharpened variants.
const HALF_STEPS: [(char, bool); 12] = [
    ('A', false),
    ('A', true),
    ('B', false),
    ('C', false),
    ('C', true),
    ('D', false),
    ('D', true),
    ('E', false),
    ('F', false),
    ('F', true),
    ('G', false),
    ('G', true),
];

/// Number of sounding bells. Octaves 4 to 7 are complete, octave 8 only has A, A♯ and B.
const TONE_COUNT: u8 = 4 * 12 + 3;

/// A "pitch" is one bell of the hand-bell set, or silence.
///
/// Index 0 is the rest, every other index counts half steps above A4 (plus one).
/// Flat names are aliases and never produce a distinct pitch, so equality
/// of two pitches always means they sound the same.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pitch(u8);

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ParsePitchError {
    #[snafu(display("{:?} is not a pitch of the bell set", name))]
    UnknownPitch { name: String },
}

impl Pitch {
    /// Silence.
    pub const REST: Pitch = Pitch(0);

    /// Number of distinct pitches, including the rest.
    pub const COUNT: usize = TONE_COUNT as usize + 1;

    /// The pitch `half_steps` above A4, if the bell set has it.
    ///
    /// # Examples
    ///
    /// ```
    /// use bell_choir::note::Pitch;
    ///
    /// assert_eq!(Pitch::from_half_steps(0), "A4".parse().ok());
    /// assert_eq!(Pitch::from_half_steps(50), "B8".parse().ok());
    /// assert_eq!(Pitch::from_half_steps(51), None);
    /// ```
    pub fn from_half_steps(half_steps: u8) -> Option<Pitch> {
        if half_steps < TONE_COUNT {
            Some(Pitch(half_steps + 1))
        } else {
            None
        }
    }

    /// Half steps above A4, `None` for the rest.
    pub fn half_steps(self) -> Option<u8> {
        self.0.checked_sub(1)
    }

    pub fn is_rest(self) -> bool {
        self == Pitch::REST
    }

    /// Dense index in `0..Pitch::COUNT`, convenient for lookup tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// All pitches in ascending order, starting with the rest.
    pub fn all() -> impl Iterator<Item = Pitch> {
        (0..=TONE_COUNT).map(Pitch)
    }

    /// Frequency of the bell in Hz, `None` for the rest.
    ///
    /// # Examples
    ///
    /// ```
    /// use bell_choir::note::Pitch;
    ///
    /// assert_eq!(Pitch::from_half_steps(0).unwrap().frequency(), Some(440.0));
    /// assert_eq!(Pitch::from_half_steps(12).unwrap().frequency(), Some(880.0));
    /// assert_eq!(Pitch::REST.frequency(), None);
    /// ```
    pub fn frequency(self) -> Option<f64> {
        self.half_steps()
            .map(|steps| FREQUENCY_A4_HZ * 2.0f64.powf(f64::from(steps) / 12.0))
    }

    /// Parse a name of the format `<letter><octave>[S|F]`, or `REST`.
    ///
    /// Flat names are normalized to the bell they share, which is
    /// the sharp (or natural) one half step lower within the same octave.
    fn named_str(name: &str) -> Option<Pitch> {
        if name == "REST" {
            return Some(Pitch::REST);
        }

        let mut chars = name.chars();
        let letter = chars.next()?;
        let octave = chars.next()?.to_digit(10)? as u8;
        let modifier = chars.next();
        if chars.next().is_some() || !(4..=8).contains(&octave) {
            return None;
        }

        let natural = HALF_STEPS
            .iter()
            .position(|&(l, sharp)| l == letter && !sharp)? as u8;
        let offset = match modifier {
            None => natural,
            Some('S') if HALF_STEPS[natural as usize + 1] == (letter, true) => natural + 1,
            // A flat wraps around to the G sharp of the same octave
            Some('F') if octave < 8 => (natural + 11) % 12,
            _ => return None,
        };
        Pitch::from_half_steps((octave - 4) * 12 + offset)
    }
}

impl FromStr for Pitch {
    type Err = ParsePitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pitch::named_str(s).ok_or_else(|| ParsePitchError::UnknownPitch { name: s.to_string() })
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.half_steps() {
            None => write!(f, "REST"),
            Some(steps) => {
                let (letter, sharp) = HALF_STEPS[steps as usize % 12];
                let octave = 4 + steps / 12;
                write!(f, "{}{}{}", letter, octave, if sharp { "S" } else { "" })
            }
        }
    }
}

/// The length of a note as a fraction of a measure.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Duration {
    Whole,
    Half,
    Quarter,
    Eighth,
}

impl Duration {
    /// Convert the denominator used in song files (`4` for a quarter note).
    /// Only whole, half, quarter and eighth notes are supported.
    ///
    /// # Examples
    ///
    /// ```
    /// use bell_choir::note::Duration;
    ///
    /// assert_eq!(Duration::from_denominator(4), Some(Duration::Quarter));
    /// assert_eq!(Duration::from_denominator(3), None);
    /// ```
    pub fn from_denominator(denominator: u32) -> Option<Duration> {
        match denominator {
            1 => Some(Duration::Whole),
            2 => Some(Duration::Half),
            4 => Some(Duration::Quarter),
            8 => Some(Duration::Eighth),
            _ => None,
        }
    }

    pub fn denominator(self) -> u32 {
        match self {
            Duration::Whole => 1,
            Duration::Half => 2,
            Duration::Quarter => 4,
            Duration::Eighth => 8,
        }
    }

    /// Playback time in milliseconds when a whole measure lasts `measure_length_ms`.
    pub fn time_ms(self, measure_length_ms: u32) -> u32 {
        measure_length_ms / self.denominator()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    #[test]
    fn canonical_names_round_trip() {
        for p in Pitch::all() {
            assert_eq!(pitch(&p.to_string()), p);
        }
        assert_eq!(Pitch::all().count(), Pitch::COUNT);
    }

    #[test]
    fn names_follow_half_steps() {
        assert_eq!(pitch("REST"), Pitch::REST);
        assert_eq!(pitch("A4").half_steps(), Some(0));
        assert_eq!(pitch("A4S").half_steps(), Some(1));
        assert_eq!(pitch("C4").half_steps(), Some(3));
        assert_eq!(pitch("G4S").half_steps(), Some(11));
        assert_eq!(pitch("A5").half_steps(), Some(12));
        assert_eq!(pitch("G7S").half_steps(), Some(47));
        assert_eq!(pitch("B8").half_steps(), Some(50));
    }

    #[test]
    fn flats_alias_their_neighbour() {
        assert_eq!(pitch("A4F"), pitch("G4S"));
        assert_eq!(pitch("B4F"), pitch("A4S"));
        assert_eq!(pitch("C5F"), pitch("B5"));
        assert_eq!(pitch("D6F"), pitch("C6S"));
        assert_eq!(pitch("E7F"), pitch("D7S"));
        assert_eq!(pitch("F4F"), pitch("E4"));
        assert_eq!(pitch("G7F"), pitch("F7S"));
        assert_eq!(pitch("B4F").to_string(), "A4S");
    }

    #[test]
    fn unknown_names() {
        for name in &["", "X9", "H4", "A3", "A9", "B4S", "E5S", "C8", "A8F", "A4SS", "a4", "Rest"] {
            assert_eq!(
                name.parse::<Pitch>(),
                Err(ParsePitchError::UnknownPitch {
                    name: name.to_string()
                }),
                "{:?} should not parse",
                name
            );
        }
    }

    #[test]
    fn rest_sorts_first() {
        assert!(Pitch::REST < pitch("A4"));
        assert!(pitch("A4") < pitch("C4"));
        assert!(Pitch::REST.is_rest());
    }

    #[test]
    fn duration_times() {
        assert_eq!(Duration::Whole.time_ms(1000), 1000);
        assert_eq!(Duration::Half.time_ms(1000), 500);
        assert_eq!(Duration::Quarter.time_ms(1000), 250);
        assert_eq!(Duration::Eighth.time_ms(1000), 125);
        assert_eq!(Duration::Eighth.time_ms(2000), 250);
        for &d in &[1, 2, 4, 8] {
            let duration = Duration::from_denominator(d).unwrap();
            assert_eq!(duration.denominator(), d);
            assert_eq!(duration.time_ms(800), 800 / d);
        }
    }

    #[test]
    fn unsupported_denominators() {
        for &d in &[0, 3, 5, 16] {
            assert_eq!(Duration::from_denominator(d), None);
        }
    }
}
