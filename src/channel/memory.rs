//! Memory-backed and null terminal channels
//!
//! Memory channels terminate a decorator stack in a byte buffer; null
//! channels discard writes and deliver no content. The null input channel is
//! what a message carries when it legitimately has no body.

use super::{
    Error, IBinaryChannel, MessageContentIBinaryChannel, MessageContentOBinaryChannel,
    OBinaryChannel, Result,
};

/// Input channel reading from an in-memory buffer
pub struct MemoryIBinaryChannel {
    data: Vec<u8>,
    position: usize,
    closed: bool,
}

impl MemoryIBinaryChannel {
    /// Create a channel delivering `data`
    pub fn new(data: Vec<u8>) -> Self {
        MemoryIBinaryChannel {
            data,
            position: 0,
            closed: false,
        }
    }

    /// Number of bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl IBinaryChannel for MemoryIBinaryChannel {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }

        let n = self.remaining().min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl MessageContentIBinaryChannel for MemoryIBinaryChannel {
    fn has_more_content(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(self.remaining() > 0)
    }
}

/// Output channel collecting bytes into an internally grown buffer
pub struct MemoryOBinaryChannel {
    buffer: Vec<u8>,
    closed: bool,
    aborted: bool,
}

impl MemoryOBinaryChannel {
    /// Create an empty channel
    pub fn new() -> Self {
        MemoryOBinaryChannel {
            buffer: Vec::new(),
            closed: false,
            aborted: false,
        }
    }

    /// Create a channel continuing a caller-supplied buffer
    pub fn with_buffer(buffer: Vec<u8>) -> Self {
        MemoryOBinaryChannel {
            buffer,
            closed: false,
            aborted: false,
        }
    }

    /// The bytes written so far
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Whether the channel was aborted instead of closed
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Consume the channel and return its buffer
    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for MemoryOBinaryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl OBinaryChannel for MemoryOBinaryChannel {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.buffer.extend_from_slice(buf);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl MessageContentOBinaryChannel for MemoryOBinaryChannel {
    fn abort(&mut self, _message: Option<&str>) -> Result<()> {
        // No framing to convey the abort; the buffer is simply cut short.
        self.aborted = true;
        self.closed = true;
        Ok(())
    }
}

/// Input channel with no content
pub struct NullIBinaryChannel {
    closed: bool,
}

impl NullIBinaryChannel {
    /// Create a channel that is at end-of-stream from the start
    pub fn new() -> Self {
        NullIBinaryChannel { closed: false }
    }
}

impl Default for NullIBinaryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl IBinaryChannel for NullIBinaryChannel {
    fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(0)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl MessageContentIBinaryChannel for NullIBinaryChannel {
    fn has_more_content(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(false)
    }
}

/// Output channel discarding everything written to it
pub struct NullOBinaryChannel {
    closed: bool,
}

impl NullOBinaryChannel {
    /// Create a discarding channel
    pub fn new() -> Self {
        NullOBinaryChannel { closed: false }
    }
}

impl Default for NullOBinaryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl OBinaryChannel for NullOBinaryChannel {
    fn write(&mut self, _buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl MessageContentOBinaryChannel for NullOBinaryChannel {
    fn abort(&mut self, _message: Option<&str>) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_input_reads_all() {
        let mut channel = MemoryIBinaryChannel::new(b"Hello".to_vec());
        let mut buf = [0u8; 3];

        assert_eq!(channel.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"Hel");
        assert_eq!(channel.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(channel.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_memory_input_has_more_content() {
        let mut channel = MemoryIBinaryChannel::new(b"x".to_vec());
        assert!(channel.has_more_content().unwrap());

        let mut buf = [0u8; 1];
        channel.read(&mut buf).unwrap();
        assert!(!channel.has_more_content().unwrap());
    }

    #[test]
    fn test_memory_input_read_after_close() {
        let mut channel = MemoryIBinaryChannel::new(b"x".to_vec());
        channel.close().unwrap();

        let mut buf = [0u8; 1];
        assert!(matches!(channel.read(&mut buf), Err(Error::Closed)));
    }

    #[test]
    fn test_memory_output_collects() {
        let mut channel = MemoryOBinaryChannel::new();
        channel.write(b"Hello, ").unwrap();
        channel.write(b"World").unwrap();
        channel.close().unwrap();

        assert_eq!(channel.bytes(), b"Hello, World");
        assert!(matches!(channel.write(b"x"), Err(Error::Closed)));
    }

    #[test]
    fn test_memory_output_abort() {
        let mut channel = MemoryOBinaryChannel::new();
        channel.write(b"partial").unwrap();
        channel.abort(Some("gave up")).unwrap();

        assert!(channel.is_aborted());
        assert!(matches!(channel.write(b"x"), Err(Error::Closed)));
    }

    #[test]
    fn test_null_channels() {
        let mut input = NullIBinaryChannel::new();
        let mut buf = [0u8; 8];
        assert_eq!(input.read(&mut buf).unwrap(), 0);
        assert!(!input.has_more_content().unwrap());

        let mut output = NullOBinaryChannel::new();
        output.write(b"discarded").unwrap();
        output.flush().unwrap();
        output.close().unwrap();
        assert!(matches!(output.write(b"x"), Err(Error::Closed)));
    }
}
