//! Deflate content-transfer channels
//!
//! Compression decorators over zlib (via `flate2`'s raw `Compress` /
//! `Decompress` state machines). The deflater stages input in a fixed
//! buffer and emits compressed output when the buffer fills or on explicit
//! flush; close performs the final flush-with-finish. The inflater pulls
//! compressed bytes from the inner channel into an input buffer,
//! decompresses into an output buffer and serves reads from it.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use super::{
    Error, IBinaryChannel, MessageContentIBinaryChannel, MessageContentOBinaryChannel,
    OBinaryChannel, Result,
};

/// Size of the fixed staging buffers
const BUFFER_SIZE: usize = 4096;

/// Output channel compressing bytes written through it
pub struct DeflaterMessageContentOBinaryChannel<C: OBinaryChannel> {
    inner: C,
    compress: Compress,
    staged: Vec<u8>,
    closed: bool,
}

impl<C: OBinaryChannel> DeflaterMessageContentOBinaryChannel<C> {
    /// Wrap `inner` with default compression level
    pub fn new(inner: C) -> Self {
        Self::with_level(inner, Compression::default())
    }

    /// Wrap `inner` with an explicit compression level
    pub fn with_level(inner: C, level: Compression) -> Self {
        DeflaterMessageContentOBinaryChannel {
            inner,
            compress: Compress::new(level, true),
            staged: Vec::with_capacity(BUFFER_SIZE),
            closed: false,
        }
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Push the staged input through zlib, writing produced bytes downstream
    fn run(&mut self, flush: FlushCompress) -> Result<()> {
        let mut offset = 0;

        loop {
            let before_in = self.compress.total_in();
            let before_out = self.compress.total_out();
            let mut out = [0u8; BUFFER_SIZE];

            let status = self
                .compress
                .compress(&self.staged[offset..], &mut out, flush)
                .map_err(|e| Error::Compression(e.to_string()))?;

            offset += (self.compress.total_in() - before_in) as usize;
            let produced = (self.compress.total_out() - before_out) as usize;
            if produced > 0 {
                self.inner.write(&out[..produced])?;
            }

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    if offset >= self.staged.len() && produced == 0 {
                        if flush == FlushCompress::Finish {
                            // Finish must run until StreamEnd.
                            continue;
                        }
                        break;
                    }
                }
            }
        }

        self.staged.clear();
        Ok(())
    }
}

impl<C: OBinaryChannel> OBinaryChannel for DeflaterMessageContentOBinaryChannel<C> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }

        self.staged.extend_from_slice(buf);
        if self.staged.len() >= BUFFER_SIZE {
            self.run(FlushCompress::None)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.run(FlushCompress::Sync)?;
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.run(FlushCompress::Finish)?;
        self.inner.flush()?;
        self.closed = true;
        Ok(())
    }
}

impl<C: OBinaryChannel> MessageContentOBinaryChannel for DeflaterMessageContentOBinaryChannel<C> {
    fn abort(&mut self, _message: Option<&str>) -> Result<()> {
        if self.closed {
            return Err(Error::Closed);
        }
        // The zlib stream has no abort marker; the staged input is dropped
        // and the stream is simply left unterminated.
        self.staged.clear();
        self.closed = true;
        Ok(())
    }
}

/// Input channel decompressing bytes read through it
pub struct InflaterMessageContentIBinaryChannel<C: IBinaryChannel> {
    inner: C,
    decompress: Decompress,
    in_buf: Vec<u8>,
    out_buf: Vec<u8>,
    inner_eos: bool,
    finished: bool,
    closed: bool,
}

impl<C: IBinaryChannel> InflaterMessageContentIBinaryChannel<C> {
    /// Wrap `inner`
    pub fn new(inner: C) -> Self {
        InflaterMessageContentIBinaryChannel {
            inner,
            decompress: Decompress::new(true),
            in_buf: Vec::new(),
            out_buf: Vec::new(),
            inner_eos: false,
            finished: false,
            closed: false,
        }
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }

    /// Decompress until at least one output byte is pending or the stream
    /// is finished
    fn fill_out(&mut self) -> Result<()> {
        while self.out_buf.is_empty() && !self.finished {
            if self.in_buf.is_empty() && !self.inner_eos {
                let mut temp = [0u8; BUFFER_SIZE];
                let n = self.inner.read(&mut temp)?;
                if n == 0 {
                    self.inner_eos = true;
                } else {
                    self.in_buf.extend_from_slice(&temp[..n]);
                }
            }

            let before_in = self.decompress.total_in();
            let before_out = self.decompress.total_out();
            let mut out = [0u8; BUFFER_SIZE];

            let status = self
                .decompress
                .decompress(&self.in_buf, &mut out, FlushDecompress::None)
                .map_err(|e| Error::Compression(e.to_string()))?;

            let consumed = (self.decompress.total_in() - before_in) as usize;
            let produced = (self.decompress.total_out() - before_out) as usize;
            self.in_buf.drain(..consumed);
            self.out_buf.extend_from_slice(&out[..produced]);

            if status == Status::StreamEnd {
                self.finished = true;
            } else if consumed == 0 && produced == 0 && self.inner_eos {
                return Err(Error::UnexpectedEos);
            }
        }
        Ok(())
    }
}

impl<C: IBinaryChannel> IBinaryChannel for InflaterMessageContentIBinaryChannel<C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::Closed);
        }
        if buf.is_empty() {
            return Ok(0);
        }

        self.fill_out()?;
        if self.out_buf.is_empty() {
            return Ok(0);
        }

        let n = self.out_buf.len().min(buf.len());
        buf[..n].copy_from_slice(&self.out_buf[..n]);
        self.out_buf.drain(..n);
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

impl<C: IBinaryChannel> MessageContentIBinaryChannel for InflaterMessageContentIBinaryChannel<C> {
    fn has_more_content(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.fill_out()?;
        Ok(!self.out_buf.is_empty())
    }
}
