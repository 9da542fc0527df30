//! The per-connection state machine: accept → parse → dispatch → write →
//! keep-alive or close.
//!
//! One task per accepted socket, serving pipelined requests strictly in
//! arrival order. The socket read side is shared (through a per-core
//! `Rc`) between the connection loop, which parses request heads, and the
//! request body stream handed to the pipeline; the write side is owned by
//! the response writer, which buffers fragments up to a high-water mark
//! and gather-writes them without copying.

use std::cell::{Cell, RefCell};
use std::io::{self, IoSlice};
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use bytes::BytesMut;
use http::StatusCode;
use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Notify;

use crate::config::HttpServerConfiguration;
use crate::constants;
use crate::container::ServiceContainer;
use crate::context::HttpContext;
use crate::dateutils::format_now_for_http_header;
use crate::errors::{HttpError, HttpResult};
use crate::handler::{HandlerChain, HttpServerRequestHandler};
use crate::metrics::HttpServerMetrics;
use crate::packet::Packet;
use crate::parser::{
    BodyFraming, ChunkedDecoder, FeedResult, HttpParserState, HttpRequestParser,
};
use crate::pool::{Recyclable, Reusable};
use crate::request::HttpRequest;
use crate::response::{HttpResponse, ResponseBody};
use crate::sharedstring::SharedString;
use crate::stream::{InputStream, OutputStream, ReadResult, StreamFuture};

/// Cooperative stop flag shared by everything on one server instance.
pub(crate) struct StopSignal {
    stopping: Cell<bool>,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> StopSignal {
        StopSignal {
            stopping: Cell::new(false),
            notify: Notify::new(),
        }
    }

    pub fn trigger(&self) {
        self.stopping.set(true);
        self.notify.notify_waiters();
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.get()
    }

    /// Resolves at the next suspension point once stop was triggered.
    pub async fn wait(&self) {
        if self.stopping.get() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Read side of the connection: socket plus the rolling buffer of bytes
/// received but not yet consumed.
pub(crate) struct SocketSource {
    reader: OwnedReadHalf,
    buffer: SharedString,
    eof: bool,
    read_buffer_size: usize,
    metrics: Rc<HttpServerMetrics>,
}

impl SocketSource {
    fn new(
        reader: OwnedReadHalf,
        read_buffer_size: usize,
        metrics: Rc<HttpServerMetrics>,
    ) -> SocketSource {
        SocketSource {
            reader,
            buffer: SharedString::new(),
            eof: false,
            read_buffer_size,
            metrics,
        }
    }

    /// Buffered bytes if any, else one socket read. Empty result = EOF.
    async fn fill(&mut self) -> io::Result<SharedString> {
        if !self.buffer.is_empty() {
            return Ok(std::mem::take(&mut self.buffer));
        }
        if self.eof {
            return Ok(SharedString::new());
        }
        let mut buf = BytesMut::with_capacity(self.read_buffer_size);
        let n = match self.reader.read_buf(&mut buf).await {
            Ok(n) => n,
            Err(e) => {
                self.metrics.read_error();
                return Err(e);
            },
        };
        if n == 0 {
            self.eof = true;
            return Ok(SharedString::new());
        }
        Ok(SharedString::from(buf.freeze()))
    }

    /// Push unconsumed bytes back; they are returned by the next `fill`.
    fn unread(&mut self, data: SharedString) {
        debug_assert!(self.buffer.is_empty());
        self.buffer = data;
    }

    fn has_buffered(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Request body input stream over the remaining buffered bytes plus
/// further socket reads, honoring the framing the parser decided.
#[derive(Default)]
pub(crate) struct RequestBodyStream {
    source: Option<Rc<RefCell<SocketSource>>>,
    stop: Option<Rc<StopSignal>>,
    framing: BodyFraming,
    remaining: u64,
    decoder: ChunkedDecoder,
    finished: bool,
}

impl RequestBodyStream {
    pub fn reset_with(
        &mut self,
        source: Rc<RefCell<SocketSource>>,
        stop: Rc<StopSignal>,
        framing: BodyFraming,
    ) {
        self.source = Some(source);
        self.stop = Some(stop);
        self.framing = framing;
        self.remaining = match framing {
            BodyFraming::ContentLength(n) => n,
            _ => 0,
        };
        self.decoder.reset();
        self.finished = matches!(framing, BodyFraming::None)
            || matches!(framing, BodyFraming::ContentLength(0));
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    async fn fill(&mut self) -> HttpResult<SharedString> {
        let Some(source) = self.source.clone() else {
            return Err(HttpError::Logic("read from unbound body stream"));
        };
        let stop = self.stop.clone();
        let fill = async move {
            let mut source = source.borrow_mut();
            source.fill().await
        };
        match stop {
            Some(stop) => {
                tokio::select! {
                    _ = stop.wait() => Err(HttpError::Cancelled),
                    result = fill => result.map_err(HttpError::from),
                }
            },
            None => fill.await.map_err(HttpError::from),
        }
    }

    fn unread(&self, data: SharedString) {
        if let Some(source) = &self.source {
            source.borrow_mut().unread(data);
        }
    }
}

impl InputStream for RequestBodyStream {
    fn read(&mut self) -> StreamFuture<'_, ReadResult> {
        Box::pin(async move {
            if self.finished {
                return Ok(ReadResult::eof());
            }
            match self.framing {
                BodyFraming::None => {
                    self.finished = true;
                    Ok(ReadResult::eof())
                },
                BodyFraming::ContentLength(_) => {
                    let data = self.fill().await?;
                    if data.is_empty() {
                        return Err(HttpError::Io(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "connection closed inside request body",
                        )));
                    }
                    let take = self.remaining.min(data.len() as u64) as usize;
                    let output = data.slice(..take);
                    if take < data.len() {
                        self.unread(data.slice(take..));
                    }
                    self.remaining -= take as u64;
                    let is_end = self.remaining == 0;
                    self.finished = is_end;
                    Ok(ReadResult::new(output, is_end))
                },
                BodyFraming::Chunked => {
                    loop {
                        let mut data = self.fill().await?;
                        if data.is_empty() {
                            return Err(HttpError::Io(io::Error::new(
                                io::ErrorKind::UnexpectedEof,
                                "connection closed inside chunked body",
                            )));
                        }
                        let step = self.decoder.decode(&mut data).map_err(HttpError::from)?;
                        if !data.is_empty() {
                            self.unread(data);
                        }
                        if step.done {
                            self.finished = true;
                            return Ok(ReadResult::eof());
                        }
                        if !step.output.is_empty() {
                            return Ok(ReadResult::new(step.output, false));
                        }
                    }
                },
            }
        })
    }

    fn size_hint(&self) -> Option<usize> {
        match self.framing {
            BodyFraming::None => Some(0),
            BodyFraming::ContentLength(_) => Some(self.remaining as usize),
            BodyFraming::Chunked => None,
        }
    }
}

impl Recyclable for RequestBodyStream {
    fn free_resources(&mut self) {
        self.source = None;
        self.stop = None;
        self.framing = BodyFraming::None;
        self.remaining = 0;
        self.decoder.reset();
        self.finished = false;
    }
}

/// Write side of the connection: fragment queue, header serialization and
/// the gather-write loop.
pub(crate) struct ResponseWriter {
    writer: OwnedWriteHalf,
    stop: Rc<StopSignal>,
    metrics: Rc<HttpServerMetrics>,
    server_header: SharedString,
    high_water_mark: usize,
    queue: Packet,
    response: Option<HttpResponse>,
    wire_started: Rc<Cell<bool>>,
    keep_alive: bool,
    chunked: bool,
}

impl ResponseWriter {
    fn new(
        writer: OwnedWriteHalf,
        stop: Rc<StopSignal>,
        metrics: Rc<HttpServerMetrics>,
        server_header: SharedString,
        high_water_mark: usize,
    ) -> ResponseWriter {
        ResponseWriter {
            writer,
            stop,
            metrics,
            server_header,
            high_water_mark,
            queue: Packet::new(),
            response: None,
            wire_started: Rc::new(Cell::new(false)),
            keep_alive: true,
            chunked: false,
        }
    }

    /// Arm the writer for the next response on this connection.
    fn begin_response(
        &mut self,
        response: HttpResponse,
        keep_alive: bool,
        wire_started: Rc<Cell<bool>>,
    ) {
        debug_assert!(self.queue.is_empty());
        self.queue.clear();
        self.response = Some(response);
        self.keep_alive = keep_alive;
        self.wire_started = wire_started;
        self.chunked = false;
    }

    /// Buffer body fragments; once the queue passes the high-water mark
    /// the response starts streaming and the call suspends until the
    /// socket drained.
    async fn write_packet(&mut self, packet: Packet) -> HttpResult<()> {
        if !self.wire_started.get() {
            self.queue.append_packet(packet);
            if self.queue.len() > self.high_water_mark {
                self.start_streaming().await?;
            }
            return Ok(());
        }
        let packet = if self.chunked {
            Self::wrap_chunk(packet)
        } else {
            packet
        };
        self.queue.append_packet(packet);
        if self.queue.len() >= self.high_water_mark {
            self.flush_queued().await?;
        }
        Ok(())
    }

    /// Put headers on the wire before the body is complete. Without a
    /// content length the rest of the body goes out chunked.
    async fn start_streaming(&mut self) -> HttpResult<()> {
        let Some(response) = self.response.take() else {
            return Err(HttpError::Logic("response already finalized"));
        };
        let body = self.queue.take();
        let head = self.build_head(response, None);
        self.queue = head;
        if self.chunked {
            self.queue.append_packet(Self::wrap_chunk(body));
        } else {
            self.queue.append_packet(body);
        }
        self.wire_started.set(true);
        self.flush_queued().await
    }

    /// Complete the response: compute framing for a fully buffered body,
    /// or terminate the chunked stream, then flush everything.
    async fn finalize(&mut self) -> HttpResult<()> {
        if !self.wire_started.get() {
            let Some(response) = self.response.take() else {
                return Err(HttpError::Logic("response already finalized"));
            };
            let body = self.queue.take();
            let head = self.build_head(response, Some(body.len()));
            self.queue = head;
            self.queue.append_packet(body);
            self.wire_started.set(true);
        } else {
            self.response = None;
            if self.chunked {
                self.queue
                    .append(SharedString::from_static("0\r\n\r\n"));
            }
        }
        self.flush_queued().await
    }

    /// Emit a bare status reply outside the pipeline (parse errors, 408).
    async fn write_bare_status(&mut self, status: StatusCode) -> HttpResult<()> {
        let phrase = status
            .canonical_reason()
            .map(SharedString::from_static)
            .unwrap_or_default();
        let mut head = Packet::new();
        head.append(constants::HTTP_1_1)
            .append(constants::SPACE)
            .append(constants::integer(status.as_u16() as usize))
            .append(constants::SPACE)
            .append(phrase.share())
            .append(constants::CRLF);
        append_header(&mut head, &constants::DATE, &format_now_for_http_header());
        append_header(&mut head, &constants::SERVER, &self.server_header);
        append_header(
            &mut head,
            &constants::CONTENT_TYPE,
            &constants::TEXT_PLAIN_UTF8,
        );
        append_header(
            &mut head,
            &constants::CONTENT_LENGTH,
            &SharedString::from_int(phrase.len()),
        );
        append_header(&mut head, &constants::CONNECTION, &constants::CLOSE);
        head.append(constants::CRLF);
        head.append(phrase);
        self.queue.append_packet(head);
        self.flush_queued().await
    }

    fn build_head(&mut self, mut response: HttpResponse, body_len: Option<usize>) -> Packet {
        if response.version().is_empty() {
            response.set_version(constants::HTTP_1_1);
        }
        if response.status_code().is_empty() {
            response.set_status(StatusCode::OK);
        }
        {
            let mut headers = response.headers_mut();
            if headers.date().is_empty() {
                headers.set_date(format_now_for_http_header());
            }
            if headers.server().is_empty() {
                headers.set_server(self.server_header.share());
            }
            if headers.connection().is_empty() {
                headers.set_connection(if self.keep_alive {
                    constants::KEEP_ALIVE
                } else {
                    constants::CLOSE
                });
            }
            if headers.content_length().is_empty() {
                match body_len {
                    // the handler neither set a length nor streamed,
                    // the accumulated body decides it
                    Some(len) => headers.set_content_length(SharedString::from_int(len)),
                    None => {
                        self.chunked = true;
                        headers.set_transfer_encoding(constants::CHUNKED);
                    },
                }
            }
        }
        let mut head = Packet::new();
        head.append(response.version())
            .append(constants::SPACE)
            .append(response.status_code())
            .append(constants::SPACE)
            .append(response.status_message())
            .append(constants::CRLF);
        let headers = response.headers();
        headers.for_each(|key, value| append_header(&mut head, key, value));
        for (key, value) in headers.addition_headers() {
            append_header(&mut head, key, value);
        }
        head.append(constants::CRLF);
        head
    }

    fn wrap_chunk(packet: Packet) -> Packet {
        if packet.is_empty() {
            return packet;
        }
        let mut framed = Packet::new();
        framed.append(SharedString::from(format!("{:x}\r\n", packet.len())));
        framed.append_packet(packet);
        framed.append(constants::CRLF);
        framed
    }

    /// Gather-write the whole queue to the socket.
    async fn flush_queued(&mut self) -> HttpResult<()> {
        let packet = self.queue.take();
        let mut offset = 0;
        let mut slices: Vec<IoSlice> = Vec::new();
        let stop = self.stop.clone();
        while offset < packet.len() {
            packet.io_slices_from(offset, &mut slices);
            let result = tokio::select! {
                _ = stop.wait() => None,
                written = self.writer.write_vectored(&slices) => Some(written),
            };
            match result {
                None => return Err(HttpError::Cancelled),
                Some(Ok(0)) => {
                    self.metrics.write_error();
                    return Err(HttpError::Io(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "socket refused response bytes",
                    )));
                },
                Some(Ok(n)) => offset += n,
                Some(Err(e)) => {
                    self.metrics.write_error();
                    return Err(HttpError::Io(e));
                },
            }
        }
        Ok(())
    }
}

fn append_header(packet: &mut Packet, key: &SharedString, value: &SharedString) {
    packet
        .append(key.share())
        .append(constants::COLON_SPACE)
        .append(value.share())
        .append(constants::CRLF);
}

/// Response body output stream bound to the connection's writer; emits
/// fragments directly, no intermediate copy.
#[derive(Default)]
pub(crate) struct ResponseBodyStream {
    writer: Option<Rc<RefCell<ResponseWriter>>>,
}

impl ResponseBodyStream {
    pub fn reset_with(&mut self, writer: Rc<RefCell<ResponseWriter>>) {
        self.writer = Some(writer);
    }
}

impl OutputStream for ResponseBodyStream {
    fn write(&mut self, data: Packet) -> StreamFuture<'_, ()> {
        Box::pin(async move {
            let Some(writer) = self.writer.clone() else {
                return Err(HttpError::Logic("write to null stream"));
            };
            let mut writer = writer.borrow_mut();
            writer.write_packet(data).await
        })
    }
}

impl Recyclable for ResponseBodyStream {
    fn free_resources(&mut self) {
        self.writer = None;
    }
}

/// Everything a connection task needs from its server.
pub(crate) struct ConnectionShared {
    pub config: Rc<HttpServerConfiguration>,
    pub metrics: Rc<HttpServerMetrics>,
    pub pipeline: Rc<Vec<Rc<dyn HttpServerRequestHandler>>>,
    pub container: ServiceContainer,
    pub stop: Rc<StopSignal>,
}

/// Serve one accepted socket to completion.
pub(crate) async fn serve_connection(
    shared: Rc<ConnectionShared>,
    stream: TcpStream,
    peer: SocketAddr,
) {
    let _ = stream.set_nodelay(true);
    shared.metrics.connection_accepted();
    if let Err(e) = drive_connection(&shared, stream, peer).await {
        match &e {
            HttpError::Cancelled => debug!("connection {} cancelled by stop", peer),
            _ => debug!("connection {} closed on error: {}", peer, e),
        }
    }
    shared.metrics.connection_closed();
}

async fn drive_connection(
    shared: &Rc<ConnectionShared>,
    stream: TcpStream,
    peer: SocketAddr,
) -> HttpResult<()> {
    let config = &shared.config;
    let (read_half, write_half) = stream.into_split();
    let source = Rc::new(RefCell::new(SocketSource::new(
        read_half,
        config.read_buffer_size,
        shared.metrics.clone(),
    )));
    let writer = Rc::new(RefCell::new(ResponseWriter::new(
        write_half,
        shared.stop.clone(),
        shared.metrics.clone(),
        config.server_header.share(),
        config.write_high_water_mark,
    )));
    let mut parser = HttpRequestParser::new(
        config.max_header_field_size,
        config.max_initial_request_bytes,
    );

    loop {
        let mut request = HttpRequest::new();
        let mut response = HttpResponse::new();
        parser.reset();

        // read until the parser has the full request head
        loop {
            let timeout = if parser.started() || source.borrow().has_buffered() {
                config.request_header_timeout
            } else {
                config.keep_alive_idle_timeout
            };
            let Some(data) = fill_with_timeout(&source, &shared.stop, timeout).await? else {
                // no progress on headers in time: 408 when a partial head
                // was received, silent close for an idle connection
                if parser.started() {
                    let _ = writer
                        .borrow_mut()
                        .write_bare_status(StatusCode::REQUEST_TIMEOUT)
                        .await;
                }
                return Ok(());
            };
            if data.is_empty() {
                // EOF; nothing to answer, whether or not a partial head
                // arrived
                return Ok(());
            }
            match parser.feed(&mut request, data) {
                Ok(FeedResult::NeedMore) => continue,
                Ok(FeedResult::HeadersDone { remaining }) => {
                    if !remaining.is_empty() {
                        source.borrow_mut().unread(remaining);
                    }
                    break;
                },
                Err(failure) => {
                    // parse errors are protocol errors, not read errors
                    info!("protocol error from {}: {}", peer, failure);
                    let _ = writer.borrow_mut().write_bare_status(failure.status()).await;
                    return Ok(());
                },
            }
        }
        parser.set_state(HttpParserState::Body);

        // body stream over leftover bytes + future socket reads
        let body = Reusable::<RequestBodyStream>::acquire();
        body.get_mut()
            .reset_with(source.clone(), shared.stop.clone(), parser.body_framing());
        if let Some(rc) = body.share_rc() {
            let stream_rc: Rc<RefCell<dyn InputStream>> = rc;
            request.set_body_stream(stream_rc);
        }

        // bind the response to the socket gather-writer
        let wire_started = Rc::new(Cell::new(false));
        response.set_wire_started_flag(wire_started.clone());
        let keep_alive_default = parser.keep_alive() && !shared.stop.is_stopping();
        writer
            .borrow_mut()
            .begin_response(response.share(), keep_alive_default, wire_started);
        let out = Reusable::<ResponseBodyStream>::acquire();
        out.get_mut().reset_with(writer.clone());
        if let Some(rc) = out.share_rc() {
            let stream_rc: Rc<RefCell<dyn OutputStream>> = rc;
            response.set_body_stream(stream_rc);
        }

        // dispatch through the pipeline, cursor 0
        let mut context =
            HttpContext::new(request, response, shared.container.clone(), peer);
        let pipeline = shared.pipeline.clone();
        HandlerChain::new(&pipeline).invoke_next(&mut context).await?;
        let (request, response) = context.into_parts();

        // drain the pending body source into the writer, then finalize
        write_pending_body(&writer, &response).await?;
        writer.borrow_mut().finalize().await?;
        shared.metrics.request_served();
        parser.set_state(HttpParserState::Done);

        // a pipelined request must not see its predecessor's body bytes
        if !drain_request_body(&body, config.request_header_timeout).await {
            return Ok(());
        }

        let response_close = response
            .headers()
            .connection()
            .eq_ignore_ascii_case(b"close");
        let keep_alive = parser.keep_alive() && !response_close && !shared.stop.is_stopping();

        // recycle envelopes before their streams so the stream slots see
        // unique ownership
        drop(request);
        drop(response);
        drop(body);
        drop(out);

        if !keep_alive {
            return Ok(());
        }
    }
}

/// Read with timeout and stop cancellation; `None` = timed out.
async fn fill_with_timeout(
    source: &Rc<RefCell<SocketSource>>,
    stop: &Rc<StopSignal>,
    timeout: Duration,
) -> HttpResult<Option<SharedString>> {
    let source = source.clone();
    let fill = async move {
        let mut source = source.borrow_mut();
        source.fill().await
    };
    tokio::select! {
        _ = stop.wait() => Err(HttpError::Cancelled),
        result = tokio::time::timeout(timeout, fill) => match result {
            Err(_) => Ok(None),
            Ok(Ok(data)) => Ok(Some(data)),
            Ok(Err(e)) => Err(HttpError::Io(e)),
        },
    }
}

/// Feed the response's pending body source (literal, appender or stream)
/// into the writer.
async fn write_pending_body(
    writer: &Rc<RefCell<ResponseWriter>>,
    response: &HttpResponse,
) -> HttpResult<()> {
    match response.take_pending_body() {
        ResponseBody::None => Ok(()),
        ResponseBody::Literal(body) => {
            let mut writer = writer.borrow_mut();
            writer.write_packet(Packet::from(body)).await
        },
        ResponseBody::Appender(mut appender) => loop {
            let piece = appender();
            if piece.is_empty() {
                return Ok(());
            }
            let mut writer = writer.borrow_mut();
            writer.write_packet(Packet::from(piece)).await?;
            drop(writer);
        },
        ResponseBody::Stream(stream) => {
            let mut stream = stream.borrow_mut();
            loop {
                let result = stream.read().await?;
                if !result.data.is_empty() {
                    let mut writer = writer.borrow_mut();
                    writer.write_packet(Packet::from(result.data)).await?;
                }
                if result.is_end {
                    return Ok(());
                }
            }
        },
    }
}

/// Consume whatever the handler left of the request body. Returns false
/// when the connection should close instead (drain failed or timed out).
async fn drain_request_body(body: &Reusable<RequestBodyStream>, timeout: Duration) -> bool {
    if body.get().finished() {
        return true;
    }
    let drain = async {
        let mut body = body.get_mut();
        loop {
            match body.read().await {
                Ok(result) if result.is_end => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    };
    matches!(tokio::time::timeout(timeout, drain).await, Ok(true))
}
