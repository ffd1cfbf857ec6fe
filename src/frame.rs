//! Record framing: each record is a 4-byte big-endian length followed by that many bytes.
//! A zero length marks the end of the stream.
//!
//! Running out of input at a record boundary, inside a length header or inside a payload
//! all read as end-of-stream. The format has no way to tell a truncated file from a
//! complete one that lost its terminator.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{self, Read, Write};
use tracing::{debug, warn};

pub const LENGTH_HEADER_LEN: usize = 4;
/// Default ceiling on a single record's declared length.
pub const DEFAULT_MAX_RECORD_LEN: u32 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    #[error("record length {length} exceeds limit {limit} (header {header:02X?})")]
    RecordTooLong {
        length: u32,
        limit: u32,
        header: [u8; LENGTH_HEADER_LEN],
    },
    #[error("empty records cannot be written: a zero length ends the stream")]
    EmptyRecord,
    #[error("record of {0} bytes does not fit a 4-byte length")]
    RecordOverflow(usize),
}

/// Read from `r` until `buf` is full or input ends; returns the number of bytes read.
pub(crate) fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Pulls length-prefixed records from a byte source.
#[derive(Debug)]
pub struct RecordReader<R> {
    inner: R,
    max_record_len: u32,
    done: bool,
}

impl<R: Read> RecordReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_max_record_len(inner, DEFAULT_MAX_RECORD_LEN)
    }

    pub fn with_max_record_len(inner: R, max_record_len: u32) -> Self {
        RecordReader { inner, max_record_len, done: false }
    }

    /// Next record without its length header, or `None` at end of stream.
    pub fn read_record(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        if self.done {
            return Ok(None);
        }
        let mut header = [0u8; LENGTH_HEADER_LEN];
        let n = read_full(&mut self.inner, &mut header)?;
        if n < LENGTH_HEADER_LEN {
            if n > 0 {
                warn!(bytes = n, "input ends inside a record length header");
            }
            return Ok(self.finish());
        }
        let length = BigEndian::read_u32(&header);
        if length == 0 {
            debug!("end-of-stream record");
            return Ok(self.finish());
        }
        if length > self.max_record_len {
            self.done = true;
            return Err(FrameError::RecordTooLong { length, limit: self.max_record_len, header });
        }
        let mut record = vec![0u8; length as usize];
        let n = read_full(&mut self.inner, &mut record)?;
        if n < record.len() {
            warn!(declared = length, available = n, "input ends inside a record");
            return Ok(self.finish());
        }
        Ok(Some(record))
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn finish(&mut self) -> Option<Vec<u8>> {
        self.done = true;
        None
    }
}

impl<R: Read> Iterator for RecordReader<R> {
    type Item = Result<Vec<u8>, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Writes length-prefixed records. The end-of-stream record is written by [`finish`],
/// or on drop if `finish` was never called.
///
/// [`finish`]: RecordWriter::finish
#[derive(Debug)]
pub struct RecordWriter<W: Write> {
    inner: Option<W>,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        RecordWriter { inner: Some(inner) }
    }

    pub fn write_record(&mut self, record: &[u8]) -> Result<(), FrameError> {
        if record.is_empty() {
            return Err(FrameError::EmptyRecord);
        }
        let length = u32::try_from(record.len()).map_err(|_| FrameError::RecordOverflow(record.len()))?;
        let w = self.inner_mut()?;
        w.write_u32::<BigEndian>(length)?;
        w.write_all(record)?;
        Ok(())
    }

    /// Write the end-of-stream record, flush, and hand back the sink.
    pub fn finish(mut self) -> Result<W, FrameError> {
        let mut w = self.inner.take().ok_or_else(writer_finished)?;
        w.write_u32::<BigEndian>(0)?;
        w.flush()?;
        Ok(w)
    }

    fn inner_mut(&mut self) -> io::Result<&mut W> {
        self.inner.as_mut().ok_or_else(writer_finished)
    }
}

fn writer_finished() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "writer already finished")
}

impl<W: Write> Drop for RecordWriter<W> {
    fn drop(&mut self) {
        if let Some(w) = self.inner.as_mut() {
            debug!("record writer dropped without finish, writing end-of-stream record");
            if let Err(e) = w.write_u32::<BigEndian>(0).and_then(|_| w.flush()) {
                warn!(error = %e, "could not terminate record stream");
            }
        }
    }
}
