//! Destinations for the rendered audio.

pub mod sox;

use std::io;

/// Something that plays signed 8-bit mono samples.
///
/// A sink goes through `open`, `start`, any number of `write`s, `drain` and
/// `close`, exactly once per song.
pub trait AudioSink {
    /// Acquire the underlying device. Fails if the audio output is unavailable.
    fn open(&mut self) -> io::Result<()>;
    fn start(&mut self) -> io::Result<()>;
    fn write(&mut self, samples: &[i8]) -> io::Result<()>;
    /// Block until everything written so far was played.
    fn drain(&mut self) -> io::Result<()>;
    fn close(&mut self) -> io::Result<()>;
}

/// Everything that happened to a [`MemorySink`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkEvent {
    Open,
    Start,
    Write(Vec<i8>),
    Drain,
    Close,
}

/// A sink that keeps all samples in memory instead of playing them.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Vec<SinkEvent>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    /// The buffers passed to `write`, in order.
    pub fn writes(&self) -> impl Iterator<Item = &[i8]> {
        self.events.iter().filter_map(|event| match event {
            SinkEvent::Write(samples) => Some(samples.as_slice()),
            _ => None,
        })
    }

    /// Total number of samples written.
    pub fn samples_written(&self) -> usize {
        self.writes().map(|samples| samples.len()).sum()
    }
}

impl AudioSink for MemorySink {
    fn open(&mut self) -> io::Result<()> {
        self.events.push(SinkEvent::Open);
        Ok(())
    }

    fn start(&mut self) -> io::Result<()> {
        self.events.push(SinkEvent::Start);
        Ok(())
    }

    fn write(&mut self, samples: &[i8]) -> io::Result<()> {
        self.events.push(SinkEvent::Write(samples.to_vec()));
        Ok(())
    }

    fn drain(&mut self) -> io::Result<()> {
        self.events.push(SinkEvent::Drain);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.events.push(SinkEvent::Close);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn memory_sink_records_lifecycle() {
        let mut sink = MemorySink::new();
        sink.open().unwrap();
        sink.start().unwrap();
        sink.write(&[1, 2, 3]).unwrap();
        sink.write(&[0; 5]).unwrap();
        sink.drain().unwrap();
        sink.close().unwrap();

        assert_eq!(sink.events().len(), 6);
        assert_eq!(sink.events()[0], SinkEvent::Open);
        assert_eq!(sink.events()[5], SinkEvent::Close);
        assert_eq!(sink.writes().collect::<Vec<_>>(), vec![&[1, 2, 3][..], &[0; 5][..]]);
        assert_eq!(sink.samples_written(), 8);
    }
}
