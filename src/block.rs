//! Fixed physical blocking ("1014 blocking") used by IPM batch files.
//!
//! The byte stream is cut into 1012-byte payload blocks, each followed by two `0x40` pad
//! bytes. The last block is padded out to full size when the writer finishes.

use crate::frame::read_full;
use std::io::{self, Read, Write};
use tracing::{debug, warn};

pub const BLOCK_PAYLOAD_LEN: usize = 1012;
pub const BLOCK_TRAILER_LEN: usize = 2;
pub const BLOCK_LEN: usize = BLOCK_PAYLOAD_LEN + BLOCK_TRAILER_LEN;
pub const PAD_BYTE: u8 = 0x40;

/// Splits written bytes into padded 1014-byte blocks.
#[derive(Debug)]
pub struct BlockWriter<W: Write> {
    inner: Option<W>,
    remaining: usize,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(inner: W) -> Self {
        BlockWriter { inner: Some(inner), remaining: BLOCK_PAYLOAD_LEN }
    }

    /// Pad and close the current block, flush, and hand back the sink.
    pub fn finish(mut self) -> io::Result<W> {
        let mut w = self
            .inner
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already finished"))?;
        close_block(&mut w, self.remaining)?;
        Ok(w)
    }
}

fn close_block<W: Write>(w: &mut W, remaining: usize) -> io::Result<()> {
    w.write_all(&vec![PAD_BYTE; remaining + BLOCK_TRAILER_LEN])?;
    w.flush()
}

impl<W: Write> Write for BlockWriter<W> {
    fn write(&mut self, mut buf: &[u8]) -> io::Result<usize> {
        let written = buf.len();
        let w = self
            .inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "writer already finished"))?;
        while !buf.is_empty() {
            let n = buf.len().min(self.remaining);
            w.write_all(&buf[..n])?;
            buf = &buf[n..];
            self.remaining -= n;
            if self.remaining == 0 {
                w.write_all(&[PAD_BYTE; BLOCK_TRAILER_LEN])?;
                self.remaining = BLOCK_PAYLOAD_LEN;
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.inner.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl<W: Write> Drop for BlockWriter<W> {
    fn drop(&mut self) {
        if let Some(w) = self.inner.as_mut() {
            debug!("block writer dropped without finish, padding final block");
            if let Err(e) = close_block(w, self.remaining) {
                warn!(error = %e, "could not pad final block");
            }
        }
    }
}

/// Strips the block trailers, yielding the 1012-byte payloads as one stream.
///
/// A block shorter than 1014 bytes (a truncated file) reads as end of stream and its bytes
/// are discarded.
#[derive(Debug)]
pub struct BlockReader<R> {
    inner: R,
    block: Vec<u8>,
    pos: usize,
    len: usize,
    eof: bool,
}

impl<R: Read> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        BlockReader { inner, block: vec![0u8; BLOCK_LEN], pos: 0, len: 0, eof: false }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fill(&mut self) -> io::Result<()> {
        let n = read_full(&mut self.inner, &mut self.block)?;
        if n < BLOCK_LEN {
            if n > 0 {
                warn!(bytes = n, "discarding short final block");
            }
            self.eof = true;
            self.len = 0;
        } else {
            self.len = BLOCK_PAYLOAD_LEN;
        }
        self.pos = 0;
        Ok(())
    }
}

impl<R: Read> Read for BlockReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos == self.len {
            if self.eof {
                return Ok(0);
            }
            self.fill()?;
            if self.eof {
                return Ok(0);
            }
        }
        let n = buf.len().min(self.len - self.pos);
        buf[..n].copy_from_slice(&self.block[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_stream_still_writes_one_block() {
        let out = BlockWriter::new(Vec::new()).finish().expect("finish");
        assert_eq!(out.len(), BLOCK_LEN);
        assert!(out.iter().all(|&b| b == PAD_BYTE));
    }

    #[test]
    fn trailer_after_every_payload() {
        let mut w = BlockWriter::new(Vec::new());
        w.write_all(&[1u8; BLOCK_PAYLOAD_LEN + 1]).expect("write");
        let out = w.finish().expect("finish");
        assert_eq!(out.len(), 2 * BLOCK_LEN);
        assert_eq!(&out[BLOCK_PAYLOAD_LEN..BLOCK_LEN], &[PAD_BYTE, PAD_BYTE]);
        assert_eq!(out[BLOCK_LEN], 1);
        assert_eq!(out[BLOCK_LEN + 1], PAD_BYTE);
    }

    #[test]
    fn short_block_is_end_of_stream() {
        let mut data = vec![7u8; BLOCK_LEN];
        data.extend_from_slice(&[9u8; 100]);
        let mut out = Vec::new();
        BlockReader::new(&data[..]).read_to_end(&mut out).expect("read");
        assert_eq!(out, vec![7u8; BLOCK_PAYLOAD_LEN]);
    }
}
