//! Message streams: [`Codec`] over record framing over optional 1014 blocking.
//!
//! ```text
//! write: Message -> Codec::pack -> RecordWriter -> [BlockWriter] -> sink
//! read:  source -> [BlockReader] -> RecordReader -> Codec::unpack -> Message
//! ```

use crate::block::{BlockReader, BlockWriter};
use crate::codec::{Codec, CodecError};
use crate::frame::{FrameError, RecordReader, RecordWriter, DEFAULT_MAX_RECORD_LEN};
use crate::value::Message;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// Physical layout of a message file. Both ends of a file must use the same one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileLayout {
    /// Length-prefixed records only.
    Vbs,
    /// Length-prefixed records inside 1014-byte blocks.
    #[default]
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    pub layout: FileLayout,
    /// Records declaring a longer length are rejected as corrupt.
    pub max_record_len: u32,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions { layout: FileLayout::default(), max_record_len: DEFAULT_MAX_RECORD_LEN }
    }
}

impl StreamOptions {
    pub fn vbs() -> Self {
        StreamOptions { layout: FileLayout::Vbs, ..Self::default() }
    }

    pub fn blocked() -> Self {
        StreamOptions { layout: FileLayout::Blocked, ..Self::default() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("record {index}: {source}")]
    Codec {
        index: usize,
        #[source]
        source: CodecError,
    },
}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        StreamError::Frame(FrameError::Io(e))
    }
}

#[derive(Debug)]
enum Source<R> {
    Plain(R),
    Blocked(BlockReader<R>),
}

impl<R: Read> Read for Source<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            Source::Blocked(r) => r.read(buf),
        }
    }
}

#[derive(Debug)]
enum Sink<W: Write> {
    Plain(W),
    Blocked(BlockWriter<W>),
}

impl<W: Write> Sink<W> {
    fn finish(self) -> io::Result<W> {
        match self {
            Sink::Plain(w) => Ok(w),
            Sink::Blocked(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for Sink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Plain(w) => w.write(buf),
            Sink::Blocked(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Plain(w) => w.flush(),
            Sink::Blocked(w) => w.flush(),
        }
    }
}

/// Lazily decodes one message per record.
///
/// A record that fails to decode yields `Err(StreamError::Codec)` and the next call moves
/// on to the following record. A framing error ends the stream.
#[derive(Debug)]
pub struct MessageReader<R> {
    records: RecordReader<Source<R>>,
    codec: Codec,
    index: usize,
}

impl<R: Read> MessageReader<R> {
    pub fn new(input: R, codec: Codec, options: StreamOptions) -> Self {
        let source = match options.layout {
            FileLayout::Vbs => Source::Plain(input),
            FileLayout::Blocked => Source::Blocked(BlockReader::new(input)),
        };
        MessageReader {
            records: RecordReader::with_max_record_len(source, options.max_record_len),
            codec,
            index: 0,
        }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Records read so far, including ones that failed to decode.
    pub fn records_read(&self) -> usize {
        self.index
    }

    pub fn read_message(&mut self) -> Result<Option<Message>, StreamError> {
        let Some(record) = self.records.read_record()? else {
            debug!(records = self.index, "message stream ended");
            return Ok(None);
        };
        let index = self.index;
        self.index += 1;
        self.codec
            .unpack(&record)
            .map(Some)
            .map_err(|source| StreamError::Codec { index, source })
    }
}

impl<R: Read> Iterator for MessageReader<R> {
    type Item = Result<Message, StreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_message().transpose()
    }
}

/// Encodes messages into a record stream.
///
/// [`finish`](MessageWriter::finish) writes the end-of-stream record and pads the final
/// block. Dropping the writer does the same on a best-effort basis so that error paths
/// still leave a terminated file.
#[derive(Debug)]
pub struct MessageWriter<W: Write> {
    records: RecordWriter<Sink<W>>,
    codec: Codec,
    index: usize,
}

impl<W: Write> MessageWriter<W> {
    pub fn new(output: W, codec: Codec, options: StreamOptions) -> Self {
        let sink = match options.layout {
            FileLayout::Vbs => Sink::Plain(output),
            FileLayout::Blocked => Sink::Blocked(BlockWriter::new(output)),
        };
        MessageWriter { records: RecordWriter::new(sink), codec, index: 0 }
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Messages written so far.
    pub fn messages_written(&self) -> usize {
        self.index
    }

    pub fn write_message(&mut self, message: &Message) -> Result<(), StreamError> {
        let index = self.index;
        let record = self
            .codec
            .pack(message)
            .map_err(|source| StreamError::Codec { index, source })?;
        self.records.write_record(&record)?;
        self.index += 1;
        Ok(())
    }

    pub fn finish(self) -> Result<W, StreamError> {
        debug!(messages = self.index, "finishing message stream");
        let sink = self.records.finish()?;
        Ok(sink.finish()?)
    }
}

/// Open a message file for reading with buffered I/O.
pub fn open_reader<P: AsRef<Path>>(
    path: P,
    codec: Codec,
    options: StreamOptions,
) -> io::Result<MessageReader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(MessageReader::new(BufReader::new(file), codec, options))
}

/// Create (or truncate) a message file for writing with buffered I/O.
pub fn create_writer<P: AsRef<Path>>(
    path: P,
    codec: Codec,
    options: StreamOptions,
) -> io::Result<MessageWriter<BufWriter<File>>> {
    let file = File::create(path)?;
    Ok(MessageWriter::new(BufWriter::new(file), codec, options))
}
