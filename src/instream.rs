//! Memory backed input stream implementations.

use futures_util::future;

use crate::packet::Packet;
use crate::pool::Recyclable;
use crate::sharedstring::SharedString;
use crate::stream::{InputStream, ReadResult, StreamFuture};

/// Input stream over a single buffer or string.
#[derive(Default)]
pub struct SharedStringInputStream {
    data: SharedString,
    size_hint: usize,
    consumed: bool,
}

impl SharedStringInputStream {
    pub fn reset(&mut self, data: SharedString) {
        self.size_hint = data.len();
        self.data = data;
        self.consumed = false;
    }
}

impl InputStream for SharedStringInputStream {
    fn read(&mut self) -> StreamFuture<'_, ReadResult> {
        let result = if self.consumed {
            ReadResult::eof()
        } else {
            self.consumed = true;
            ReadResult::end(std::mem::take(&mut self.data))
        };
        Box::pin(future::ready(Ok(result)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.size_hint)
    }
}

impl Recyclable for SharedStringInputStream {
    fn free_resources(&mut self) {
        self.data.clear();
        self.size_hint = 0;
        self.consumed = false;
    }
}

/// Input stream over a sequence of buffers, yielded one per read.
#[derive(Default)]
pub struct BuffersInputStream {
    buffers: Vec<SharedString>,
    index: usize,
    size_hint: usize,
}

impl BuffersInputStream {
    pub fn reset(&mut self, buffers: Vec<SharedString>) {
        self.size_hint = buffers.iter().map(|b| b.len()).sum();
        self.buffers = buffers;
        self.index = 0;
    }
}

impl InputStream for BuffersInputStream {
    fn read(&mut self) -> StreamFuture<'_, ReadResult> {
        let result = if self.index >= self.buffers.len() {
            ReadResult::eof()
        } else {
            let data = std::mem::take(&mut self.buffers[self.index]);
            self.index += 1;
            ReadResult::new(data, self.index >= self.buffers.len())
        };
        Box::pin(future::ready(Ok(result)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.size_hint)
    }
}

impl Recyclable for BuffersInputStream {
    fn free_resources(&mut self) {
        self.buffers.clear();
        self.index = 0;
        self.size_hint = 0;
    }
}

/// Input stream over the fragments of a packet.
#[derive(Default)]
pub struct PacketInputStream {
    fragments: Vec<SharedString>,
    index: usize,
    size_hint: usize,
}

impl PacketInputStream {
    pub fn reset(&mut self, packet: Packet) {
        self.size_hint = packet.len();
        self.fragments = packet.fragments().to_vec();
        self.index = 0;
    }
}

impl InputStream for PacketInputStream {
    fn read(&mut self) -> StreamFuture<'_, ReadResult> {
        let result = if self.index >= self.fragments.len() {
            ReadResult::eof()
        } else {
            let data = std::mem::take(&mut self.fragments[self.index]);
            self.index += 1;
            ReadResult::new(data, self.index >= self.fragments.len())
        };
        Box::pin(future::ready(Ok(result)))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.size_hint)
    }
}

impl Recyclable for PacketInputStream {
    fn free_resources(&mut self) {
        self.fragments.clear();
        self.index = 0;
        self.size_hint = 0;
    }
}
