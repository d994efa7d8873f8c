// bell-choir -- ringing songs on simulated hand-bells
// Copyright (C) 2020  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation.
//
// A copy of the license can be found in the LICENSE file in the root of
// this repository.

//! Easy interface for getting sound to play using a sox subprocess.

use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use log::{debug, warn};

use super::AudioSink;

/// Where sox sends the audio.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SoxTarget {
    /// The default speakers, through sox' `play`.
    Play,
    /// Any file format sox can write, chosen by the extension.
    File(PathBuf),
}

/// Streams raw signed 8-bit mono samples into sox.
pub struct SoxSink {
    sample_rate: u32,
    target: SoxTarget,
    player: Option<Child>,
    audio_stream: Option<ChildStdin>,
    buffer: Vec<u8>,
}

impl SoxSink {
    /// Create a sink, sox is only started once the sink is opened.
    pub fn new(sample_rate: u32, target: SoxTarget) -> Self {
        Self {
            sample_rate,
            target,
            player: None,
            audio_stream: None,
            buffer: Vec::new(),
        }
    }

    fn not_open() -> io::Error {
        io::Error::new(io::ErrorKind::NotConnected, "sox is not running")
    }
}

impl AudioSink for SoxSink {
    fn open(&mut self) -> io::Result<()> {
        let sample_rate_str = format!("{}", self.sample_rate);
        let input_args = &[
            "-R", // make the output reproducible
            "--channels",
            "1",
            "--rate",
            &sample_rate_str,
            "--bits",
            "8",
            "--encoding",
            "signed-integer",
            "--type",
            "raw",
            "/dev/stdin",
        ];

        // For properly recording the sox dependency on nix:
        let (play, sox) = if let Some(sox_bin) = option_env!("NIX_SOX_BIN") {
            debug!("using sox from nix store {}", sox_bin);
            let play = Path::new(sox_bin).join("play");
            let sox = Path::new(sox_bin).join("sox");
            (play, sox)
        } else {
            ("play".into(), "sox".into())
        };

        let mut player = match &self.target {
            SoxTarget::Play => Command::new(&play)
                .args(input_args)
                .stdin(Stdio::piped())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?,
            SoxTarget::File(outfile) => Command::new(&sox)
                .args(input_args)
                .arg(outfile)
                .stdin(Stdio::piped())
                .spawn()?,
        };
        debug!("started sox for {:?} at {} Hz", self.target, self.sample_rate);

        self.audio_stream = Some(player.stdin.take().expect("Used stdin(Stdio::piped())"));
        self.player = Some(player);
        Ok(())
    }

    fn start(&mut self) -> io::Result<()> {
        // sox starts playing as soon as samples arrive
        if self.audio_stream.is_none() {
            return Err(Self::not_open());
        }
        Ok(())
    }

    fn write(&mut self, samples: &[i8]) -> io::Result<()> {
        let audio_stream = self.audio_stream.as_mut().ok_or_else(Self::not_open)?;
        self.buffer.clear();
        self.buffer.extend(samples.iter().map(|&s| s as u8));
        audio_stream.write_all(&self.buffer)
    }

    fn drain(&mut self) -> io::Result<()> {
        if let Some(mut audio_stream) = self.audio_stream.take() {
            audio_stream.flush()?;
        }
        // sox exits once its input is closed and everything was played
        if let Some(mut player) = self.player.take() {
            let status = player.wait()?;
            if !status.success() {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("sox exited with {}", status),
                ));
            }
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.audio_stream = None;
        if let Some(mut player) = self.player.take() {
            warn!("closing sox before all audio was drained");
            player.kill()?;
            player.wait()?;
        }
        Ok(())
    }
}

impl Drop for SoxSink {
    fn drop(&mut self) {
        if self.player.is_some() {
            let _ = self.close();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn unopened() -> SoxSink {
        SoxSink::new(8000, SoxTarget::File(PathBuf::from("unused.wav")))
    }

    #[test]
    fn writing_requires_an_open_stream() {
        let mut sink = unopened();
        assert_eq!(
            sink.start().unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
        assert_eq!(
            sink.write(&[0]).unwrap_err().kind(),
            io::ErrorKind::NotConnected
        );
    }

    #[test]
    fn finishing_an_unopened_sink_is_a_no_op() {
        let mut sink = unopened();
        sink.drain().unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
    }
}
