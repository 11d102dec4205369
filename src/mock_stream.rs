use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};

/// An in-memory transport for driving [`Client`](crate::Client) and the sync engines in tests.
///
/// Reads are served from a scripted buffer and everything written is captured in `written_buf`
/// for assertions on the exact command bytes.
#[derive(Default)]
pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    pub written_buf: Vec<u8>,
    eof_on_read: bool,
    read_delay: usize,
}

impl MockStream {
    pub fn new(read_buf: Vec<u8>) -> MockStream {
        MockStream::default().with_buf(read_buf)
    }

    pub fn with_buf(mut self, read_buf: Vec<u8>) -> MockStream {
        self.read_buf = read_buf;
        self
    }

    pub fn with_eof(mut self) -> MockStream {
        self.eof_on_read = true;
        self
    }

    /// Serve the first read one byte at a time, to exercise partial-read handling.
    pub fn with_delay(mut self) -> MockStream {
        self.read_delay = 1;
        self
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_on_read {
            return Ok(0);
        }
        let remaining = &self.read_buf[self.read_pos..];
        if remaining.is_empty() {
            return Err(Error::new(ErrorKind::UnexpectedEof, "EOF"));
        }
        let mut len = min(buf.len(), remaining.len());
        if self.read_delay > 0 {
            self.read_delay -= 1;
            len = min(len, 1);
        }
        buf[..len].copy_from_slice(&remaining[..len]);
        self.read_pos += len;
        Ok(len)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written_buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
