//! Length-prefixed content-transfer channels
//!
//! Frames a message body as a single 64-bit big-endian length followed by
//! exactly that many payload bytes. The length must be known before the
//! first byte hits the wire, so the output side buffers the entire payload
//! in memory and emits prefix plus payload on close.
//!
//! The input side enforces the declared length: bytes beyond it belong to
//! the next message and are never delivered, even when the inner channel has
//! more available. A second constructor takes an externally declared length
//! instead of reading a prefix, which is how Content-Length bodies are read.

use bytes::BufMut;

use super::memory::MemoryOBinaryChannel;
use super::{
    Error, IBinaryChannel, MessageContentIBinaryChannel, MessageContentOBinaryChannel,
    OBinaryChannel, Result,
};

/// Output channel emitting one length-prefixed frame on close
pub struct LengthPrefixedMessageContentOBinaryChannel<C: OBinaryChannel> {
    inner: C,
    payload: MemoryOBinaryChannel,
    closed: bool,
}

impl<C: OBinaryChannel> LengthPrefixedMessageContentOBinaryChannel<C> {
    /// Wrap `inner`
    pub fn new(inner: C) -> Self {
        LengthPrefixedMessageContentOBinaryChannel {
            inner,
            payload: MemoryOBinaryChannel::new(),
            closed: false,
        }
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: OBinaryChannel> OBinaryChannel for LengthPrefixedMessageContentOBinaryChannel<C> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.payload.write(buf)
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        // Nothing can reach the wire before the length is known.
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        let payload = self.payload.bytes();
        let mut prefix = bytes::BytesMut::with_capacity(8);
        prefix.put_u64(payload.len() as u64);

        self.inner.write(&prefix)?;
        self.inner.write(payload)?;
        self.inner.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl<C: OBinaryChannel> MessageContentOBinaryChannel
    for LengthPrefixedMessageContentOBinaryChannel<C>
{
    fn abort(&mut self, _message: Option<&str>) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        // Nothing was flushed yet, so aborting just discards the buffer.
        self.closed = true;
        Ok(())
    }
}

/// Input channel delivering exactly the declared number of bytes
pub struct LengthPrefixedMessageContentIBinaryChannel<C: IBinaryChannel> {
    inner: C,
    declared: Option<u64>,
    delivered: u64,
    closed: bool,
}

impl<C: IBinaryChannel> LengthPrefixedMessageContentIBinaryChannel<C> {
    /// Wrap `inner`; the 64-bit prefix is read before the first payload byte
    pub fn new(inner: C) -> Self {
        LengthPrefixedMessageContentIBinaryChannel {
            inner,
            declared: None,
            delivered: 0,
            closed: false,
        }
    }

    /// Wrap `inner` with an externally declared length and no prefix on the
    /// stream
    pub fn with_declared_length(inner: C, length: u64) -> Self {
        LengthPrefixedMessageContentIBinaryChannel {
            inner,
            declared: Some(length),
            delivered: 0,
            closed: false,
        }
    }

    /// The declared content length, once known
    pub fn declared_length(&mut self) -> Result<u64> {
        self.ensure_declared()
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }

    fn ensure_declared(&mut self) -> Result<u64> {
        if let Some(declared) = self.declared {
            return Ok(declared);
        }

        let mut prefix = [0u8; 8];
        let mut have = 0;
        while have < 8 {
            let n = self.inner.read(&mut prefix[have..])?;
            if n == 0 {
                return Err(Error::InvalidLengthPrefix(format!(
                    "stream ended after {} of 8 prefix bytes",
                    have
                )));
            }
            have += n;
        }

        let declared = u64::from_be_bytes(prefix);
        self.declared = Some(declared);
        Ok(declared)
    }
}

impl<C: IBinaryChannel> IBinaryChannel for LengthPrefixedMessageContentIBinaryChannel<C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }

        let declared = self.ensure_declared()?;
        let remaining = declared - self.delivered;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = (remaining.min(buf.len() as u64)) as usize;
        let n = self.inner.read(&mut buf[..want])?;
        if n == 0 {
            return Err(Error::UnexpectedEos);
        }
        self.delivered += n as u64;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl<C: IBinaryChannel> MessageContentIBinaryChannel
    for LengthPrefixedMessageContentIBinaryChannel<C>
{
    fn has_more_content(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Closed);
        }
        let declared = self.ensure_declared()?;
        Ok(self.delivered < declared)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{read_to_end, MemoryIBinaryChannel, MemoryOBinaryChannel};
    use super::*;

    #[test]
    fn test_round_trip() {
        let mut writer =
            LengthPrefixedMessageContentOBinaryChannel::new(MemoryOBinaryChannel::new());
        writer.write(b"Hello, ").unwrap();
        writer.write(b"World").unwrap();
        writer.close().unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire.len(), 8 + 12);
        assert_eq!(&wire[..8], &12u64.to_be_bytes());

        let mut reader =
            LengthPrefixedMessageContentIBinaryChannel::new(MemoryIBinaryChannel::new(wire));
        assert_eq!(reader.declared_length().unwrap(), 12);
        assert_eq!(read_to_end(&mut reader).unwrap(), b"Hello, World");
    }

    #[test]
    fn test_empty_payload() {
        let mut writer =
            LengthPrefixedMessageContentOBinaryChannel::new(MemoryOBinaryChannel::new());
        writer.close().unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, 0u64.to_be_bytes());

        let mut reader =
            LengthPrefixedMessageContentIBinaryChannel::new(MemoryIBinaryChannel::new(wire));
        assert!(!reader.has_more_content().unwrap());
        assert_eq!(read_to_end(&mut reader).unwrap(), b"");
    }

    #[test]
    fn test_stops_at_declared_length() {
        // The inner channel has bytes belonging to the next message.
        let mut wire = Vec::new();
        wire.extend_from_slice(&5u64.to_be_bytes());
        wire.extend_from_slice(b"HelloNEXT-MESSAGE");

        let mut reader =
            LengthPrefixedMessageContentIBinaryChannel::new(MemoryIBinaryChannel::new(wire));

        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"Hello");

        // One byte past the declared length: end of stream, not the next
        // message's bytes.
        assert_eq!(reader.read(&mut buf[..1]).unwrap(), 0);
        assert!(!reader.has_more_content().unwrap());

        let mut inner = reader.into_inner();
        assert_eq!(read_to_end(&mut inner).unwrap(), b"NEXT-MESSAGE");
    }

    #[test]
    fn test_declared_length_constructor() {
        let inner = MemoryIBinaryChannel::new(b"abcdefgh".to_vec());
        let mut reader =
            LengthPrefixedMessageContentIBinaryChannel::with_declared_length(inner, 4);

        assert_eq!(read_to_end(&mut reader).unwrap(), b"abcd");
        assert!(!reader.has_more_content().unwrap());
    }

    #[test]
    fn test_truncated_prefix() {
        let mut reader = LengthPrefixedMessageContentIBinaryChannel::new(
            MemoryIBinaryChannel::new(vec![0, 0, 0]),
        );
        let mut buf = [0u8; 4];
        assert!(matches!(
            reader.read(&mut buf),
            Err(Error::InvalidLengthPrefix(_))
        ));
    }

    #[test]
    fn test_truncated_payload() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&10u64.to_be_bytes());
        wire.extend_from_slice(b"short");

        let mut reader =
            LengthPrefixedMessageContentIBinaryChannel::new(MemoryIBinaryChannel::new(wire));
        let mut buf = [0u8; 64];
        assert_eq!(reader.read(&mut buf).unwrap(), 5);
        assert!(matches!(reader.read(&mut buf), Err(Error::UnexpectedEos)));
    }

    #[test]
    fn test_read_after_close() {
        let mut reader = LengthPrefixedMessageContentIBinaryChannel::with_declared_length(
            MemoryIBinaryChannel::new(b"data".to_vec()),
            4,
        );
        reader.close().unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(reader.read(&mut buf), Err(Error::Closed)));
    }
}
