//! Ordered fragment sequences written to a socket with one gather-write.

use std::io::IoSlice;

use crate::sharedstring::SharedString;

/// An ordered sequence of [`SharedString`] fragments.
///
/// Appending never copies fragment bytes; writing a packet to a socket is
/// a vectored write over the fragments.
#[derive(Default)]
pub struct Packet {
    fragments: Vec<SharedString>,
    total_bytes: usize,
}

impl Packet {
    pub fn new() -> Packet {
        Packet::default()
    }

    /// Append one fragment; empty fragments are dropped.
    pub fn append(&mut self, fragment: impl Into<SharedString>) -> &mut Self {
        let fragment = fragment.into();
        if !fragment.is_empty() {
            self.total_bytes += fragment.len();
            self.fragments.push(fragment);
        }
        self
    }

    /// Concatenate another packet's fragments onto this one.
    pub fn append_packet(&mut self, mut other: Packet) -> &mut Self {
        self.total_bytes += other.total_bytes;
        self.fragments.append(&mut other.fragments);
        self
    }

    /// Total number of payload bytes over all fragments.
    pub fn len(&self) -> usize {
        self.total_bytes
    }

    pub fn is_empty(&self) -> bool {
        self.total_bytes == 0
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn fragments(&self) -> &[SharedString] {
        &self.fragments
    }

    /// Drop all fragments, releasing their owners.
    pub fn clear(&mut self) {
        self.fragments.clear();
        self.total_bytes = 0;
    }

    /// Take the content, leaving this packet empty.
    pub fn take(&mut self) -> Packet {
        std::mem::take(self)
    }

    /// Borrow the fragments as io slices for a vectored write, skipping
    /// `offset` bytes already written.
    pub(crate) fn io_slices_from<'a>(&'a self, offset: usize, out: &mut Vec<IoSlice<'a>>) {
        out.clear();
        let mut skip = offset;
        for fragment in &self.fragments {
            let bytes = fragment.as_bytes();
            if skip >= bytes.len() {
                skip -= bytes.len();
                continue;
            }
            out.push(IoSlice::new(&bytes[skip..]));
            skip = 0;
        }
    }

    /// Copy all fragments into one contiguous string. Test and diagnostic
    /// use only, the hot path never concatenates.
    pub fn to_shared_string(&self) -> SharedString {
        let mut builder = crate::sharedstring::SharedStringBuilder::with_capacity(self.total_bytes);
        for fragment in &self.fragments {
            builder.append(fragment.as_bytes());
        }
        builder.build()
    }
}

impl From<SharedString> for Packet {
    fn from(s: SharedString) -> Packet {
        let mut packet = Packet::new();
        packet.append(s);
        packet
    }
}

impl From<&'static str> for Packet {
    fn from(s: &'static str) -> Packet {
        Packet::from(SharedString::from_static(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_concatenate() {
        let mut a = Packet::new();
        a.append("hello").append(" ");
        let mut b = Packet::new();
        b.append("world");
        a.append_packet(b);
        assert_eq!(a.len(), 11);
        assert_eq!(a.fragment_count(), 3);
        assert_eq!(a.to_shared_string(), "hello world");
    }

    #[test]
    fn test_empty_fragments_are_dropped() {
        let mut p = Packet::new();
        p.append("").append("x");
        assert_eq!(p.fragment_count(), 1);
    }

    #[test]
    fn test_io_slices_with_offset() {
        let mut p = Packet::new();
        p.append("abc").append("def");
        let mut slices = Vec::new();
        p.io_slices_from(4, &mut slices);
        assert_eq!(slices.len(), 1);
        assert_eq!(&*slices[0], b"ef");
        p.io_slices_from(0, &mut slices);
        assert_eq!(slices.len(), 2);
    }
}
