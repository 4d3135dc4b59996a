//! Instrumentation channel decorators
//!
//! Counting channels accumulate byte totals; progress channels report the
//! running total to a listener on every read or write. Neither changes the
//! bytes flowing through.

use super::{
    IBinaryChannel, MessageContentIBinaryChannel, MessageContentOBinaryChannel, OBinaryChannel,
    Result,
};

/// Listener receiving running byte totals from a progress channel
pub trait ProgressListener: Send + Sync {
    /// Called with the total number of bytes transferred so far
    fn progress(&self, total_bytes: u64);
}

impl<T: ProgressListener + ?Sized> ProgressListener for std::sync::Arc<T> {
    fn progress(&self, total_bytes: u64) {
        (**self).progress(total_bytes)
    }
}

/// Input channel counting the bytes read through it
pub struct CountingIBinaryChannel<C: IBinaryChannel> {
    inner: C,
    count: u64,
}

impl<C: IBinaryChannel> CountingIBinaryChannel<C> {
    /// Wrap `inner` with a zeroed counter
    pub fn new(inner: C) -> Self {
        CountingIBinaryChannel { inner, count: 0 }
    }

    /// Bytes read since construction or the last reset
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Zero the counter without touching the underlying stream
    pub fn reset_count(&mut self) {
        self.count = 0;
    }

    /// Get a reference to the inner channel
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: IBinaryChannel> IBinaryChannel for CountingIBinaryChannel<C> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl<C: MessageContentIBinaryChannel> MessageContentIBinaryChannel for CountingIBinaryChannel<C> {
    fn has_more_content(&mut self) -> Result<bool> {
        self.inner.has_more_content()
    }

    fn is_abortable(&self) -> bool {
        self.inner.is_abortable()
    }

    fn is_aborted(&self) -> bool {
        self.inner.is_aborted()
    }

    fn abort_message(&self) -> Option<&str> {
        self.inner.abort_message()
    }
}

/// Output channel counting the bytes written through it
pub struct CountingOBinaryChannel<C: OBinaryChannel> {
    inner: C,
    count: u64,
}

impl<C: OBinaryChannel> CountingOBinaryChannel<C> {
    /// Wrap `inner` with a zeroed counter
    pub fn new(inner: C) -> Self {
        CountingOBinaryChannel { inner, count: 0 }
    }

    /// Bytes written since construction or the last reset
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Zero the counter without touching the underlying stream
    pub fn reset_count(&mut self) {
        self.count = 0;
    }

    /// Get a reference to the inner channel
    pub fn get_ref(&self) -> &C {
        &self.inner
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: OBinaryChannel> OBinaryChannel for CountingOBinaryChannel<C> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write(buf)?;
        self.count += buf.len() as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl<C: MessageContentOBinaryChannel> MessageContentOBinaryChannel for CountingOBinaryChannel<C> {
    fn is_abortable(&self) -> bool {
        self.inner.is_abortable()
    }

    fn abort(&mut self, message: Option<&str>) -> Result<()> {
        self.inner.abort(message)
    }
}

/// Input channel reporting the running total to a listener on every read
pub struct ProgressIBinaryChannel<C: IBinaryChannel, L: ProgressListener> {
    inner: C,
    listener: L,
    total: u64,
}

impl<C: IBinaryChannel, L: ProgressListener> ProgressIBinaryChannel<C, L> {
    /// Wrap `inner`, reporting to `listener`
    pub fn new(inner: C, listener: L) -> Self {
        ProgressIBinaryChannel {
            inner,
            listener,
            total: 0,
        }
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: IBinaryChannel, L: ProgressListener> IBinaryChannel for ProgressIBinaryChannel<C, L> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.total += n as u64;
            self.listener.progress(self.total);
        }
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl<C: MessageContentIBinaryChannel, L: ProgressListener> MessageContentIBinaryChannel
    for ProgressIBinaryChannel<C, L>
{
    fn has_more_content(&mut self) -> Result<bool> {
        self.inner.has_more_content()
    }

    fn is_abortable(&self) -> bool {
        self.inner.is_abortable()
    }

    fn is_aborted(&self) -> bool {
        self.inner.is_aborted()
    }

    fn abort_message(&self) -> Option<&str> {
        self.inner.abort_message()
    }
}

/// Output channel reporting the running total to a listener on every write
pub struct ProgressOBinaryChannel<C: OBinaryChannel, L: ProgressListener> {
    inner: C,
    listener: L,
    total: u64,
}

impl<C: OBinaryChannel, L: ProgressListener> ProgressOBinaryChannel<C, L> {
    /// Wrap `inner`, reporting to `listener`
    pub fn new(inner: C, listener: L) -> Self {
        ProgressOBinaryChannel {
            inner,
            listener,
            total: 0,
        }
    }

    /// Consume the decorator and return the inner channel
    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: OBinaryChannel, L: ProgressListener> OBinaryChannel for ProgressOBinaryChannel<C, L> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write(buf)?;
        if !buf.is_empty() {
            self.total += buf.len() as u64;
            self.listener.progress(self.total);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

impl<C: MessageContentOBinaryChannel, L: ProgressListener> MessageContentOBinaryChannel
    for ProgressOBinaryChannel<C, L>
{
    fn is_abortable(&self) -> bool {
        self.inner.is_abortable()
    }

    fn abort(&mut self, message: Option<&str>) -> Result<()> {
        self.inner.abort(message)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{MemoryIBinaryChannel, MemoryOBinaryChannel};
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct RecordingListener {
        last: AtomicU64,
        calls: AtomicU64,
    }

    impl RecordingListener {
        fn new() -> Self {
            RecordingListener {
                last: AtomicU64::new(0),
                calls: AtomicU64::new(0),
            }
        }
    }

    impl ProgressListener for RecordingListener {
        fn progress(&self, total_bytes: u64) {
            self.last.store(total_bytes, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_counting_input() {
        let inner = MemoryIBinaryChannel::new(vec![0u8; 100]);
        let mut channel = CountingIBinaryChannel::new(inner);

        let mut buf = [0u8; 60];
        channel.read(&mut buf).unwrap();
        channel.read(&mut buf).unwrap();
        assert_eq!(channel.count(), 100);

        channel.reset_count();
        assert_eq!(channel.count(), 0);
    }

    #[test]
    fn test_counting_output() {
        let mut channel = CountingOBinaryChannel::new(MemoryOBinaryChannel::new());
        channel.write(b"Hello").unwrap();
        channel.write(b"World").unwrap();
        assert_eq!(channel.count(), 10);
        assert_eq!(channel.get_ref().bytes(), b"HelloWorld");
    }

    #[test]
    fn test_progress_output_reports_running_total() {
        let listener = Arc::new(RecordingListener::new());
        let mut channel =
            ProgressOBinaryChannel::new(MemoryOBinaryChannel::new(), Arc::clone(&listener));

        channel.write(b"abc").unwrap();
        channel.write(b"de").unwrap();
        channel.write(b"").unwrap();

        assert_eq!(listener.last.load(Ordering::SeqCst), 5);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_progress_input_reports_running_total() {
        let listener = Arc::new(RecordingListener::new());
        let inner = MemoryIBinaryChannel::new(b"abcdef".to_vec());
        let mut channel = ProgressIBinaryChannel::new(inner, Arc::clone(&listener));

        let mut buf = [0u8; 4];
        channel.read(&mut buf).unwrap();
        channel.read(&mut buf).unwrap();
        channel.read(&mut buf).unwrap();

        assert_eq!(listener.last.load(Ordering::SeqCst), 6);
        assert_eq!(listener.calls.load(Ordering::SeqCst), 2);
    }
}
