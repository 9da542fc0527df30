//! Incremental HTTP/1.1 request parsing.
//!
//! The parser runs over the connection's rolling read buffer: each fill
//! resumes where the previous one stopped, and tokens are published as
//! zero-copy views into the buffer once their end byte is seen. Lines are
//! CRLF terminated; bare LF is tolerated.

use std::fmt;

use http::StatusCode;
use memchr::memchr;

use crate::constants;
use crate::errors::HttpError;
use crate::request::HttpRequest;
use crate::sharedstring::{SharedString, SharedStringBuilder};

/// Parser states; byte-driven transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpParserState {
    RequestLine,
    HeaderLine,
    HeadersDone,
    Body,
    Done,
}

/// How the request body is framed on the wire, decided from the headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyFraming {
    /// No body (the default for requests).
    #[default]
    None,
    /// Exactly this many bytes follow the headers.
    ContentLength(u64),
    /// `<hex-size>\r\n<bytes>\r\n` repeated until `0\r\n\r\n`.
    Chunked,
}

/// Parse failures; fatal for the connection, not for the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    BadRequestLine,
    BadHeader,
    HeaderFieldTooLarge,
    HeadersTooLarge,
    BadChunk,
}

impl ParseFailure {
    /// The status of the 4xx reply sent before closing.
    pub fn status(self) -> StatusCode {
        match self {
            ParseFailure::BadRequestLine => StatusCode::BAD_REQUEST,
            ParseFailure::BadHeader => StatusCode::BAD_REQUEST,
            ParseFailure::HeaderFieldTooLarge => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
            ParseFailure::HeadersTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ParseFailure::BadChunk => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ParseFailure::BadRequestLine => "bad request line",
            ParseFailure::BadHeader => "bad header",
            ParseFailure::HeaderFieldTooLarge => "header field too large",
            ParseFailure::HeadersTooLarge => "request headers too large",
            ParseFailure::BadChunk => "bad chunk size",
        };
        f.write_str(msg)
    }
}

impl From<ParseFailure> for HttpError {
    fn from(failure: ParseFailure) -> HttpError {
        match failure {
            ParseFailure::BadRequestLine => HttpError::Protocol("bad request line"),
            ParseFailure::BadHeader => HttpError::Protocol("bad header"),
            ParseFailure::HeaderFieldTooLarge => HttpError::Length("header field too large"),
            ParseFailure::HeadersTooLarge => HttpError::Length("request headers too large"),
            ParseFailure::BadChunk => HttpError::Protocol("bad chunk size"),
        }
    }
}

/// Outcome of one [`HttpRequestParser::feed`] call.
#[derive(Debug)]
pub enum FeedResult {
    /// The current fill was consumed; more bytes are needed.
    NeedMore,
    /// Headers are complete; `remaining` holds unconsumed buffered bytes
    /// (body and possibly pipelined requests).
    HeadersDone { remaining: SharedString },
}

/// Incremental parser of the request line and headers.
pub struct HttpRequestParser {
    state: HttpParserState,
    partial: SharedStringBuilder,
    header_bytes: usize,
    framing: BodyFraming,
    keep_alive: bool,
    max_header_field_size: usize,
    max_initial_request_bytes: usize,
}

impl HttpRequestParser {
    pub fn new(max_header_field_size: usize, max_initial_request_bytes: usize) -> Self {
        HttpRequestParser {
            state: HttpParserState::RequestLine,
            partial: SharedStringBuilder::new(),
            header_bytes: 0,
            framing: BodyFraming::None,
            keep_alive: true,
            max_header_field_size,
            max_initial_request_bytes,
        }
    }

    /// Prepare for the next request on a kept-alive connection.
    pub fn reset(&mut self) {
        self.state = HttpParserState::RequestLine;
        self.partial = SharedStringBuilder::new();
        self.header_bytes = 0;
        self.framing = BodyFraming::None;
        self.keep_alive = true;
    }

    pub fn state(&self) -> HttpParserState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: HttpParserState) {
        self.state = state;
    }

    /// Valid once the state reached `HeadersDone`.
    pub fn body_framing(&self) -> BodyFraming {
        self.framing
    }

    /// Keep-alive decision from version and `Connection` header.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Whether any byte of the current request head was consumed.
    pub fn started(&self) -> bool {
        self.state != HttpParserState::RequestLine
            || !self.partial.is_empty()
            || self.header_bytes > 0
    }

    /// Drive the state machine with one fill of the rolling buffer.
    pub fn feed(
        &mut self,
        request: &mut HttpRequest,
        mut data: SharedString,
    ) -> Result<FeedResult, ParseFailure> {
        loop {
            match memchr(b'\n', data.as_bytes()) {
                None => {
                    self.account_header_bytes(data.len())?;
                    if self.partial.len() + data.len() > self.max_header_field_size {
                        return Err(ParseFailure::HeaderFieldTooLarge);
                    }
                    self.partial.append(data.as_bytes());
                    return Ok(FeedResult::NeedMore);
                },
                Some(index) => {
                    self.account_header_bytes(index + 1)?;
                    let mut line = if self.partial.is_empty() {
                        data.slice(..index)
                    } else {
                        if self.partial.len() + index > self.max_header_field_size {
                            return Err(ParseFailure::HeaderFieldTooLarge);
                        }
                        self.partial.append(&data.as_bytes()[..index]);
                        self.partial.build()
                    };
                    if line.as_bytes().last() == Some(&b'\r') {
                        line = line.slice(..line.len() - 1);
                    }
                    if line.len() > self.max_header_field_size {
                        return Err(ParseFailure::HeaderFieldTooLarge);
                    }
                    data = data.slice(index + 1..);
                    self.process_line(request, line)?;
                    if self.state == HttpParserState::HeadersDone {
                        return Ok(FeedResult::HeadersDone { remaining: data });
                    }
                },
            }
        }
    }

    fn account_header_bytes(&mut self, count: usize) -> Result<(), ParseFailure> {
        self.header_bytes += count;
        if self.header_bytes > self.max_initial_request_bytes {
            return Err(ParseFailure::HeadersTooLarge);
        }
        Ok(())
    }

    fn process_line(
        &mut self,
        request: &mut HttpRequest,
        line: SharedString,
    ) -> Result<(), ParseFailure> {
        match self.state {
            HttpParserState::RequestLine => {
                if line.is_empty() {
                    // tolerate empty lines ahead of the request line
                    return Ok(());
                }
                self.parse_request_line(request, line)?;
                self.state = HttpParserState::HeaderLine;
                Ok(())
            },
            HttpParserState::HeaderLine => {
                if line.is_empty() {
                    self.finish_headers(request)?;
                    self.state = HttpParserState::HeadersDone;
                    return Ok(());
                }
                let Some(colon) = memchr(b':', line.as_bytes()) else {
                    return Err(ParseFailure::BadHeader);
                };
                let name = line.slice(..colon);
                let value = line.slice(colon + 1..).trim();
                if name.is_empty() {
                    return Err(ParseFailure::BadHeader);
                }
                request.set_header(name, value);
                Ok(())
            },
            _ => Err(ParseFailure::BadRequestLine),
        }
    }

    fn parse_request_line(
        &mut self,
        request: &mut HttpRequest,
        line: SharedString,
    ) -> Result<(), ParseFailure> {
        let bytes = line.as_bytes();
        let Some(first_space) = memchr(b' ', bytes) else {
            return Err(ParseFailure::BadRequestLine);
        };
        let Some(second_space) =
            memchr(b' ', &bytes[first_space + 1..]).map(|i| i + first_space + 1)
        else {
            return Err(ParseFailure::BadRequestLine);
        };
        let method = line.slice(..first_space);
        let url = line.slice(first_space + 1..second_space);
        let version = line.slice(second_space + 1..);
        if method.is_empty() || url.is_empty() || !version.starts_with(b"HTTP/") {
            return Err(ParseFailure::BadRequestLine);
        }
        if memchr(b' ', version.as_bytes()).is_some() {
            return Err(ParseFailure::BadRequestLine);
        }
        request.set_method(method);
        request.set_url(url);
        request.set_version(version);
        Ok(())
    }

    fn finish_headers(&mut self, request: &mut HttpRequest) -> Result<(), ParseFailure> {
        // keep-alive: http/1.1 defaults on, http/1.0 defaults off;
        // the Connection header overrides either way
        let version_11 = request.version() == constants::HTTP_1_1;
        let connection = request.headers().connection().share();
        self.keep_alive = if connection.eq_ignore_ascii_case(b"close") {
            false
        } else if connection.eq_ignore_ascii_case(b"keep-alive") {
            true
        } else {
            version_11
        };
        // body framing: chunked wins over content-length, default is none
        let headers = request.headers();
        if headers
            .get_header(b"Transfer-Encoding")
            .eq_ignore_ascii_case(b"chunked")
        {
            self.framing = BodyFraming::Chunked;
        } else {
            let content_length = headers.content_length().share();
            if content_length.is_empty() {
                self.framing = BodyFraming::None;
            } else {
                match content_length.to_uint() {
                    Ok(length) => self.framing = BodyFraming::ContentLength(length),
                    Err(_) => return Err(ParseFailure::BadHeader),
                }
            }
        }
        Ok(())
    }
}

/// Incremental decoder of chunked body framing. Trailers are ignored.
#[derive(Default)]
pub(crate) struct ChunkedDecoder {
    state: ChunkState,
}

#[derive(Default, Clone, Copy)]
enum ChunkState {
    #[default]
    Size,
    SizeInProgress {
        value: u64,
        in_extension: bool,
    },
    SizeCr {
        value: u64,
    },
    Data {
        remaining: u64,
    },
    DataEnd,
    DataEndCr,
    Trailer {
        line_len: usize,
    },
    TrailerCr {
        line_len: usize,
    },
    Done,
}

/// One decode step: decoded payload bytes (possibly empty) plus the
/// end-of-body flag.
#[derive(Debug)]
pub(crate) struct DecodeStep {
    pub output: SharedString,
    pub done: bool,
}

impl ChunkedDecoder {
    pub fn reset(&mut self) {
        self.state = ChunkState::Size;
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, ChunkState::Done)
    }

    /// Consume framing bytes from the front of `data`; returns as soon as
    /// a run of payload bytes is available or the terminal chunk was seen.
    pub fn decode(&mut self, data: &mut SharedString) -> Result<DecodeStep, ParseFailure> {
        loop {
            let bytes = data.as_bytes();
            if bytes.is_empty() {
                return Ok(DecodeStep {
                    output: SharedString::new(),
                    done: self.is_done(),
                });
            }
            match self.state {
                ChunkState::Size => {
                    self.state = ChunkState::SizeInProgress {
                        value: 0,
                        in_extension: false,
                    };
                },
                ChunkState::SizeInProgress {
                    mut value,
                    mut in_extension,
                } => {
                    let mut consumed = 0;
                    let mut next_state = None;
                    for &b in bytes {
                        consumed += 1;
                        match b {
                            b'\r' => {
                                next_state = Some(ChunkState::SizeCr { value });
                                break;
                            },
                            b'\n' => {
                                next_state = Some(Self::size_done(value));
                                break;
                            },
                            b';' => in_extension = true,
                            _ if in_extension => {},
                            _ => {
                                let Some(digit) = hex_digit(b) else {
                                    return Err(ParseFailure::BadChunk);
                                };
                                if value > u64::MAX / 16 {
                                    return Err(ParseFailure::BadChunk);
                                }
                                value = value * 16 + digit as u64;
                            },
                        }
                    }
                    *data = data.slice(consumed..);
                    self.state = next_state.unwrap_or(ChunkState::SizeInProgress {
                        value,
                        in_extension,
                    });
                },
                ChunkState::SizeCr { value } => {
                    if bytes[0] != b'\n' {
                        return Err(ParseFailure::BadChunk);
                    }
                    *data = data.slice(1..);
                    self.state = Self::size_done(value);
                },
                ChunkState::Data { remaining } => {
                    let take = (remaining.min(bytes.len() as u64)) as usize;
                    let output = data.slice(..take);
                    *data = data.slice(take..);
                    let remaining = remaining - take as u64;
                    self.state = if remaining == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data { remaining }
                    };
                    return Ok(DecodeStep {
                        output,
                        done: false,
                    });
                },
                ChunkState::DataEnd => {
                    let consumed = match bytes[0] {
                        b'\r' => {
                            self.state = ChunkState::DataEndCr;
                            1
                        },
                        b'\n' => {
                            self.state = ChunkState::Size;
                            1
                        },
                        _ => return Err(ParseFailure::BadChunk),
                    };
                    *data = data.slice(consumed..);
                },
                ChunkState::DataEndCr => {
                    if bytes[0] != b'\n' {
                        return Err(ParseFailure::BadChunk);
                    }
                    *data = data.slice(1..);
                    self.state = ChunkState::Size;
                },
                ChunkState::Trailer { line_len } => {
                    let consumed = match bytes[0] {
                        b'\r' => {
                            self.state = ChunkState::TrailerCr { line_len };
                            1
                        },
                        b'\n' if line_len == 0 => {
                            self.state = ChunkState::Done;
                            1
                        },
                        b'\n' => {
                            self.state = ChunkState::Trailer { line_len: 0 };
                            1
                        },
                        _ => {
                            self.state = ChunkState::Trailer {
                                line_len: line_len + 1,
                            };
                            1
                        },
                    };
                    *data = data.slice(consumed..);
                },
                ChunkState::TrailerCr { line_len } => {
                    if bytes[0] != b'\n' {
                        return Err(ParseFailure::BadChunk);
                    }
                    *data = data.slice(1..);
                    self.state = if line_len == 0 {
                        ChunkState::Done
                    } else {
                        ChunkState::Trailer { line_len: 0 }
                    };
                },
                ChunkState::Done => {
                    return Ok(DecodeStep {
                        output: SharedString::new(),
                        done: true,
                    });
                },
            }
            if self.is_done() {
                return Ok(DecodeStep {
                    output: SharedString::new(),
                    done: true,
                });
            }
        }
    }

    fn size_done(value: u64) -> ChunkState {
        if value == 0 {
            ChunkState::Trailer { line_len: 0 }
        } else {
            ChunkState::Data { remaining: value }
        }
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> HttpRequestParser {
        HttpRequestParser::new(8192, 524_288)
    }

    fn feed_all(
        parser: &mut HttpRequestParser,
        request: &mut HttpRequest,
        data: &'static str,
    ) -> Result<FeedResult, ParseFailure> {
        parser.feed(request, SharedString::from_static(data))
    }

    #[test]
    fn test_parse_simple_request() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let result = feed_all(
            &mut parser,
            &mut request,
            "GET /path?x=1 HTTP/1.1\r\nHost: example.com\r\nX-Custom: v\r\n\r\n",
        )
        .unwrap();
        match result {
            FeedResult::HeadersDone { remaining } => assert!(remaining.is_empty()),
            _ => panic!("expected headers done"),
        }
        assert_eq!(request.method(), "GET");
        assert_eq!(request.url(), "/path?x=1");
        assert_eq!(request.version(), "HTTP/1.1");
        assert_eq!(request.get_header(b"Host"), "example.com");
        assert_eq!(request.get_header(b"X-Custom"), "v");
        assert_eq!(parser.body_framing(), BodyFraming::None);
        assert!(parser.keep_alive());
    }

    #[test]
    fn test_incremental_feeding_across_token_boundaries() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        for piece in ["GE", "T / HT", "TP/1.1\r\nHo", "st: x\r", "\n"] {
            match feed_all(&mut parser, &mut request, piece).unwrap() {
                FeedResult::NeedMore => {},
                _ => panic!("should still need more"),
            }
        }
        match feed_all(&mut parser, &mut request, "\r\nrest").unwrap() {
            FeedResult::HeadersDone { remaining } => assert_eq!(remaining, "rest"),
            _ => panic!("expected headers done"),
        }
        assert_eq!(request.method(), "GET");
        assert_eq!(request.get_header(b"Host"), "x");
    }

    #[test]
    fn test_lf_terminated_lines_are_tolerated() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let result = feed_all(&mut parser, &mut request, "GET / HTTP/1.0\nHost: x\n\n").unwrap();
        assert!(matches!(result, FeedResult::HeadersDone { .. }));
        // http/1.0 defaults to close
        assert!(!parser.keep_alive());
    }

    #[test]
    fn test_connection_header_overrides_defaults() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        feed_all(
            &mut parser,
            &mut request,
            "GET / HTTP/1.1\r\nConnection: close\r\n\r\n",
        )
        .unwrap();
        assert!(!parser.keep_alive());

        let mut parser = HttpRequestParser::new(8192, 524_288);
        let mut request = HttpRequest::new();
        feed_all(
            &mut parser,
            &mut request,
            "GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n",
        )
        .unwrap();
        assert!(parser.keep_alive());
    }

    #[test]
    fn test_content_length_framing() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let result = feed_all(
            &mut parser,
            &mut request,
            "POST / HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello world",
        )
        .unwrap();
        assert_eq!(parser.body_framing(), BodyFraming::ContentLength(11));
        match result {
            FeedResult::HeadersDone { remaining } => assert_eq!(remaining, "hello world"),
            _ => panic!("expected headers done"),
        }
    }

    #[test]
    fn test_chunked_wins_over_content_length() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        feed_all(
            &mut parser,
            &mut request,
            "POST / HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n",
        )
        .unwrap();
        assert_eq!(parser.body_framing(), BodyFraming::Chunked);
    }

    #[test]
    fn test_malformed_request_line() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let err = feed_all(&mut parser, &mut request, "NOT-A-REQUEST\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseFailure::BadRequestLine);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_header_without_colon() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let err =
            feed_all(&mut parser, &mut request, "GET / HTTP/1.1\r\nbroken\r\n\r\n").unwrap_err();
        assert_eq!(err, ParseFailure::BadHeader);
    }

    #[test]
    fn test_bad_content_length_is_a_header_error() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let err = feed_all(
            &mut parser,
            &mut request,
            "GET / HTTP/1.1\r\nContent-Length: abc\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err, ParseFailure::BadHeader);
    }

    #[test]
    fn test_header_field_size_limit() {
        let mut parser = HttpRequestParser::new(16, 524_288);
        let mut request = HttpRequest::new();
        let err = feed_all(
            &mut parser,
            &mut request,
            "GET / HTTP/1.1\r\nX-Long: aaaaaaaaaaaaaaaaaaaaaaaaa\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err, ParseFailure::HeaderFieldTooLarge);
        assert_eq!(err.status(), StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE);
    }

    #[test]
    fn test_total_header_size_limit() {
        let mut parser = HttpRequestParser::new(8192, 32);
        let mut request = HttpRequest::new();
        let err = feed_all(
            &mut parser,
            &mut request,
            "GET / HTTP/1.1\r\nX-A: 1\r\nX-B: 2\r\n\r\n",
        )
        .unwrap_err();
        assert_eq!(err, ParseFailure::HeadersTooLarge);
    }

    #[test]
    fn test_leading_empty_lines_are_skipped() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let result =
            feed_all(&mut parser, &mut request, "\r\n\r\nGET / HTTP/1.1\r\n\r\n").unwrap();
        assert!(matches!(result, FeedResult::HeadersDone { .. }));
        assert_eq!(request.method(), "GET");
    }

    #[test]
    fn test_parsed_views_share_the_fill_buffer() {
        let mut parser = parser();
        let mut request = HttpRequest::new();
        let fill = SharedString::copy_from("GET /abc HTTP/1.1\r\nHost: h\r\n\r\n");
        parser.feed(&mut request, fill.share()).unwrap();
        let url = request.url();
        assert_eq!(url, "/abc");
        // the url view points into the fill buffer, no copy happened
        assert_eq!(url.data_ptr() as usize, fill.data_ptr() as usize + 4);
    }

    #[test]
    fn test_serialize_and_reparse_yields_equivalent_request() {
        let raw = "POST /submit?k=v HTTP/1.1\r\nHost: example.com\r\nContent-Length: 0\r\n\
                   X-Custom: one\r\nCookie: s=1\r\n\r\n";
        let mut parser = parser();
        let mut first = HttpRequest::new();
        feed_all(&mut parser, &mut first, raw).unwrap();

        // serialize the parsed request line + headers back to wire form
        let mut builder = SharedStringBuilder::new();
        builder
            .append(first.method().as_bytes())
            .append(b" ")
            .append(first.url().as_bytes())
            .append(b" ")
            .append(first.version().as_bytes())
            .append(b"\r\n");
        first.headers().for_each(|key, value| {
            builder
                .append(key.as_bytes())
                .append(b": ")
                .append(value.as_bytes())
                .append(b"\r\n");
        });
        builder.append(b"\r\n");
        let serialized = builder.build();

        let mut reparser = HttpRequestParser::new(8192, 524_288);
        let mut second = HttpRequest::new();
        reparser.feed(&mut second, serialized).unwrap();

        assert_eq!(first.method(), second.method());
        assert_eq!(first.url(), second.url());
        assert_eq!(first.version(), second.version());
        let mut expected = Vec::new();
        first
            .headers()
            .for_each(|k, v| expected.push((k.share(), v.share())));
        for (key, value) in expected {
            assert_eq!(second.get_header(key.as_bytes()), value);
        }
    }

    #[test]
    fn test_chunked_decoder_two_chunks() {
        let mut decoder = ChunkedDecoder::default();
        let mut data = SharedString::from_static("5\r\nhello\r\n6\r\n world\r\n0\r\n\r\nNEXT");
        let mut collected = Vec::new();
        loop {
            let step = decoder.decode(&mut data).unwrap();
            if !step.output.is_empty() {
                collected.push(step.output);
            }
            if step.done {
                break;
            }
        }
        let body: Vec<u8> = collected
            .iter()
            .flat_map(|s| s.as_bytes().to_vec())
            .collect();
        assert_eq!(body, b"hello world");
        // pipelined bytes after the terminal chunk stay in the buffer
        assert_eq!(data, "NEXT");
    }

    #[test]
    fn test_chunked_decoder_incremental() {
        let mut decoder = ChunkedDecoder::default();
        let mut body = Vec::new();
        for piece in ["5\r", "\nhe", "llo\r\n", "0\r\n", "\r\n"] {
            let mut data = SharedString::from_static(piece);
            loop {
                let step = decoder.decode(&mut data).unwrap();
                body.extend_from_slice(step.output.as_bytes());
                if step.done || (step.output.is_empty() && data.is_empty()) {
                    break;
                }
            }
        }
        assert!(decoder.is_done());
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_chunked_decoder_ignores_trailers_and_extensions() {
        let mut decoder = ChunkedDecoder::default();
        let mut data =
            SharedString::from_static("5;ext=1\r\nhello\r\n0\r\nX-Trailer: v\r\n\r\n");
        let mut body = Vec::new();
        loop {
            let step = decoder.decode(&mut data).unwrap();
            body.extend_from_slice(step.output.as_bytes());
            if step.done {
                break;
            }
        }
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_chunked_decoder_rejects_bad_size() {
        let mut decoder = ChunkedDecoder::default();
        let mut data = SharedString::from_static("zz\r\nhello\r\n");
        assert_eq!(decoder.decode(&mut data).unwrap_err(), ParseFailure::BadChunk);
    }
}
