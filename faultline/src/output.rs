//! Side-channel output written while a request is being handled.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};
use tracing::debug;

/// A buffer for stray diagnostic output produced while handling a request.
///
/// The error handling middleware inserts a fresh `OutputBuffer` into the
/// extensions of every request it sees. Handlers and lower layers may write
/// into it, but whatever they write never reaches the client: the buffer is
/// emptied once the middleware is done with the request, whether the request
/// succeeded, failed or panicked.
///
/// # Examples
///
/// ```
/// use std::io::Write;
///
/// use faultline::OutputBuffer;
///
/// let mut buffer = OutputBuffer::new();
/// write!(buffer, "debug: user {} not cached", 42).unwrap();
///
/// assert_eq!(buffer.contents(), "debug: user 42 not cached");
/// ```
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<BytesMut>>,
}

impl OutputBuffer {
    /// Creates a new, empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `data` to the buffer.
    pub fn write_bytes<T: AsRef<[u8]>>(&self, data: T) {
        self.lock().extend_from_slice(data.as_ref());
    }

    /// Returns a copy of everything written so far.
    #[must_use]
    pub fn contents(&self) -> Bytes {
        Bytes::copy_from_slice(&self.lock())
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes and returns everything written so far.
    pub fn take(&self) -> Bytes {
        self.lock().split().freeze()
    }

    // A writer that panicked mid-write leaves a valid byte buffer behind.
    fn lock(&self) -> MutexGuard<'_, BytesMut> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl io::Write for OutputBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Discards the contents of an [`OutputBuffer`] when dropped.
#[derive(Debug)]
#[must_use = "output is discarded as soon as the capture is dropped"]
pub(crate) struct OutputCapture {
    buffer: OutputBuffer,
}

impl OutputCapture {
    pub(crate) fn new(buffer: OutputBuffer) -> Self {
        Self { buffer }
    }
}

impl Drop for OutputCapture {
    fn drop(&mut self) {
        let discarded = self.buffer.take();
        if !discarded.is_empty() {
            debug!(bytes = discarded.len(), "discarded side-channel output");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    #[test]
    fn clones_share_contents() {
        let buffer = OutputBuffer::new();
        let mut writer = buffer.clone();

        writer.write_all(b"partial ").unwrap();
        buffer.write_bytes("output");

        assert_eq!(buffer.contents(), "partial output");
        assert_eq!(writer.len(), 14);
    }

    #[test]
    fn take_empties_buffer() {
        let buffer = OutputBuffer::new();
        buffer.write_bytes("stray");

        assert_eq!(buffer.take(), "stray");
        assert!(buffer.is_empty());
        assert_eq!(buffer.take(), "");
    }

    #[test]
    fn capture_discards_on_drop() {
        let buffer = OutputBuffer::new();
        let capture = OutputCapture::new(buffer.clone());
        buffer.write_bytes("<pre>dump</pre>");

        drop(capture);

        assert!(buffer.is_empty());
    }

    #[test]
    fn capture_discards_on_unwind() {
        let buffer = OutputBuffer::new();
        let writer = buffer.clone();

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _capture = OutputCapture::new(writer.clone());
            writer.write_bytes("half-written page");
            panic!("handler exploded");
        }));

        assert!(result.is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn poisoned_buffer_is_usable() {
        let buffer = OutputBuffer::new();
        let inner = Arc::clone(&buffer.inner);

        let result = catch_unwind(AssertUnwindSafe(|| {
            let _guard = inner.lock().unwrap();
            panic!("poison");
        }));

        assert!(result.is_err());
        buffer.write_bytes("still works");
        assert_eq!(buffer.take(), "still works");
    }
}
