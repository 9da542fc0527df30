//! Byte source and byte sink contracts connecting the wire to handlers.
//!
//! Both interfaces are suspension points: socket backed implementations
//! return to the reactor while waiting for I/O. All futures are local to
//! the owning core and deliberately not `Send`.

use futures_util::future::LocalBoxFuture;

use crate::errors::HttpResult;
use crate::packet::Packet;
use crate::sharedstring::{SharedString, SharedStringBuilder};

/// Future type returned by stream operations.
pub type StreamFuture<'a, T> = LocalBoxFuture<'a, HttpResult<T>>;

/// One read step: a view of bytes plus the end-of-stream flag.
#[derive(Debug, Default)]
pub struct ReadResult {
    pub data: SharedString,
    pub is_end: bool,
}

impl ReadResult {
    pub fn new(data: SharedString, is_end: bool) -> ReadResult {
        ReadResult { data, is_end }
    }

    /// Final data of the stream.
    pub fn end(data: SharedString) -> ReadResult {
        ReadResult { data, is_end: true }
    }

    /// Empty terminal result; reading past end keeps yielding this.
    pub fn eof() -> ReadResult {
        ReadResult {
            data: SharedString::new(),
            is_end: true,
        }
    }
}

/// A lazy byte source.
pub trait InputStream {
    /// Next piece of data. The returned view stays valid for as long as
    /// its owner is held, independent of further reads.
    fn read(&mut self) -> StreamFuture<'_, ReadResult>;

    /// Total remaining size if known. Precise when the implementation can
    /// know it, an approximation otherwise.
    fn size_hint(&self) -> Option<usize> {
        None
    }
}

/// A byte sink; the sink decides framing.
pub trait OutputStream {
    /// Best-effort append of a packet's fragments.
    fn write(&mut self, data: Packet) -> StreamFuture<'_, ()>;
}

/// Read a stream to its end and return the concatenated content.
pub async fn read_all(stream: &mut (dyn InputStream + '_)) -> HttpResult<SharedString> {
    let size_hint = stream.size_hint().unwrap_or(0);
    let first = stream.read().await?;
    if first.is_end {
        // single-buffer body, hand the view through without a copy
        return Ok(first.data);
    }
    let mut builder = SharedStringBuilder::with_capacity(size_hint.max(first.data.len()));
    builder.append(first.data.as_bytes());
    loop {
        let result = stream.read().await?;
        builder.append(result.data.as_bytes());
        if result.is_end {
            return Ok(builder.build());
        }
    }
}

/// Write a whole packet to a sink.
pub async fn write_all(
    stream: &mut (dyn OutputStream + '_),
    data: impl Into<Packet>,
) -> HttpResult<()> {
    stream.write(data.into()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instream::SharedStringInputStream;

    #[tokio::test]
    async fn test_read_all_single_buffer() {
        let mut stream = SharedStringInputStream::default();
        stream.reset(SharedString::from_static("hello"));
        assert_eq!(read_all(&mut stream).await.unwrap(), "hello");
        // past the end the stream keeps reporting an empty terminal result
        let result = stream.read().await.unwrap();
        assert!(result.is_end);
        assert!(result.data.is_empty());
    }
}
