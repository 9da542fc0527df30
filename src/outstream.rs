//! Memory backed output stream implementations.

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future;

use crate::errors::HttpError;
use crate::packet::Packet;
use crate::pool::Recyclable;
use crate::sharedstring::SharedStringBuilder;
use crate::stream::{OutputStream, StreamFuture};

/// Output stream appending everything to a shared string builder.
#[derive(Default)]
pub struct StringOutputStream {
    target: Option<Rc<RefCell<SharedStringBuilder>>>,
}

impl StringOutputStream {
    pub fn reset(&mut self, target: Rc<RefCell<SharedStringBuilder>>) {
        self.target = Some(target);
    }
}

impl OutputStream for StringOutputStream {
    fn write(&mut self, data: Packet) -> StreamFuture<'_, ()> {
        let result = match &self.target {
            Some(target) => {
                let mut builder = target.borrow_mut();
                for fragment in data.fragments() {
                    builder.append(fragment.as_bytes());
                }
                Ok(())
            },
            None => Err(HttpError::Logic("write to null stream")),
        };
        Box::pin(future::ready(result))
    }
}

impl Recyclable for StringOutputStream {
    fn free_resources(&mut self) {
        self.target = None;
    }
}

/// Output stream appending fragments to a shared packet.
#[derive(Default)]
pub struct PacketOutputStream {
    target: Option<Rc<RefCell<Packet>>>,
}

impl PacketOutputStream {
    pub fn reset(&mut self, target: Rc<RefCell<Packet>>) {
        self.target = Some(target);
    }
}

impl OutputStream for PacketOutputStream {
    fn write(&mut self, data: Packet) -> StreamFuture<'_, ()> {
        let result = match &self.target {
            Some(target) => {
                target.borrow_mut().append_packet(data);
                Ok(())
            },
            None => Err(HttpError::Logic("write to null stream")),
        };
        Box::pin(future::ready(result))
    }
}

impl Recyclable for PacketOutputStream {
    fn free_resources(&mut self) {
        self.target = None;
    }
}

/// The sink a response owns before the connection binds a real one.
#[derive(Default)]
pub struct NullOutputStream;

impl OutputStream for NullOutputStream {
    fn write(&mut self, _data: Packet) -> StreamFuture<'_, ()> {
        Box::pin(future::ready(Err(HttpError::Logic("write to null stream"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sharedstring::SharedString;
    use crate::stream::write_all;

    #[tokio::test]
    async fn test_string_output_stream_collects_fragments() {
        let target = Rc::new(RefCell::new(SharedStringBuilder::new()));
        let mut stream = StringOutputStream::default();
        stream.reset(target.clone());
        let mut packet = Packet::new();
        packet.append("hello ").append("world");
        write_all(&mut stream, packet).await.unwrap();
        assert_eq!(target.borrow_mut().build(), "hello world");
    }

    #[tokio::test]
    async fn test_unbound_stream_fails_with_logic_error() {
        let mut stream = StringOutputStream::default();
        let err = write_all(&mut stream, Packet::from("x")).await.unwrap_err();
        assert!(matches!(err, HttpError::Logic(_)));
    }

    #[tokio::test]
    async fn test_packet_output_stream() {
        let target = Rc::new(RefCell::new(Packet::new()));
        let mut stream = PacketOutputStream::default();
        stream.reset(target.clone());
        write_all(&mut stream, Packet::from(SharedString::from_static("ab")))
            .await
            .unwrap();
        assert_eq!(target.borrow().to_shared_string(), "ab");
    }
}
