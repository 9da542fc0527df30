//! End-to-end tests driving a real server instance over raw sockets.

use std::net::SocketAddr;
use std::time::Duration;

use http::StatusCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::LocalSet;

use cpv_framework::{
    HandlerChain, HandlerFuture, HttpContext, HttpServer, HttpServerBuilder,
    HttpServerConfiguration, HttpServerRequestHandler,
};

const TEXT_PLAIN: &str = "text/plain;charset=utf-8";

/// Replies `"hello"` to every request.
struct HelloHandler;

impl HttpServerRequestHandler for HelloHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        context
            .response_mut()
            .reply(StatusCode::OK, TEXT_PLAIN, "hello");
        Box::pin(futures_util::future::ready(Ok(())))
    }
}

/// Echoes the request body.
struct EchoHandler;

impl HttpServerRequestHandler for EchoHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let body = context.request().read_body().await?;
            context
                .response_mut()
                .reply(StatusCode::OK, TEXT_PLAIN, body);
            Ok(())
        })
    }
}

/// Replies with the request path when it matches, else delegates.
struct RouteHandler(&'static str);

impl HttpServerRequestHandler for RouteHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            let path = context.request().uri().get_path().share();
            if path == self.0 {
                context.response_mut().reply(StatusCode::OK, TEXT_PLAIN, path);
                Ok(())
            } else {
                next.invoke_next(context).await
            }
        })
    }
}

/// Always fails with a formatting error.
struct FailingHandler;

impl HttpServerRequestHandler for FailingHandler {
    fn handle<'a>(
        &'a self,
        _context: &'a mut HttpContext,
        _next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        Box::pin(futures_util::future::ready(Err(
            cpv_framework::HttpError::Format("value is not convertible".to_string()),
        )))
    }
}

fn any_local() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

async fn start(builder: HttpServerBuilder) -> (HttpServer, SocketAddr) {
    let _ = env_logger::builder().is_test(true).try_init();
    let server = builder.listen_on(any_local()).build();
    server.start().await.unwrap();
    let addr = server.local_addresses()[0];
    (server, addr)
}

/// Read one full response: headers, then either `Content-Length` bytes or
/// a complete chunked body.
async fn read_response(stream: &mut TcpStream) -> String {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 4096];
    loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..pos]).to_string();
            let chunked = head
                .lines()
                .any(|l| l.to_ascii_lowercase().starts_with("transfer-encoding: chunked"));
            if chunked {
                if buf.ends_with(b"0\r\n\r\n") {
                    return String::from_utf8_lossy(&buf).to_string();
                }
            } else {
                let content_length = head
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length: ")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + content_length {
                    return String::from_utf8_lossy(&buf[..pos + 4 + content_length]).to_string();
                }
            }
        }
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut tmp))
            .await
            .expect("timed out reading response")
            .expect("read failed");
        if n == 0 {
            return String::from_utf8_lossy(&buf).to_string();
        }
        buf.extend_from_slice(&tmp[..n]);
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn read_eof(stream: &mut TcpStream) -> bool {
    let mut tmp = [0u8; 64];
    match tokio::time::timeout(Duration::from_secs(5), stream.read(&mut tmp)).await {
        Ok(Ok(0)) => true,
        _ => false,
    }
}

#[tokio::test]
async fn test_keep_alive_serves_two_requests_on_one_socket() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(HelloHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            for _ in 0..2 {
                client
                    .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
                    .await
                    .unwrap();
                let response = read_response(&mut client).await;
                assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
                assert!(response.contains("Content-Length: 5\r\n"), "{response}");
                assert!(response.contains("Connection: keep-alive\r\n"), "{response}");
                assert!(response.contains("Server: cpv-framework\r\n"), "{response}");
                assert!(response.contains("Date: "), "{response}");
                assert!(response.ends_with("\r\n\r\nhello"), "{response}");
            }
            assert_eq!(server.metrics().requests_served(), 2);
            assert_eq!(server.metrics().total_connections(), 1);
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_chunked_request_body_is_reassembled() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(EchoHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(
                    b"POST /echo HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n\
                      5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
                )
                .await
                .unwrap();
            let response = read_response(&mut client).await;
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
            assert!(response.contains("Content-Length: 11\r\n"), "{response}");
            assert!(response.ends_with("\r\n\r\nhello world"), "{response}");
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_unmatched_route_falls_through_to_404() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(RouteHandler("/known"))).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"GET /unknown HTTP/1.1\r\nHost: x\r\n\r\n")
                .await
                .unwrap();
            let response = read_response(&mut client).await;
            assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"), "{response}");
            assert!(response.ends_with("\r\n\r\nNot Found"), "{response}");
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_handler_failure_becomes_500_with_error_id() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(FailingHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
                .await
                .unwrap();
            let response = read_response(&mut client).await;
            assert!(
                response.starts_with("HTTP/1.1 500 Internal Server Error\r\n"),
                "{response}"
            );
            let body_start = response.find("\r\n\r\n").unwrap() + 4;
            let body = &response[body_start..];
            let id = body
                .strip_prefix("Internal Server Error\nID: ")
                .expect("body should carry the error id");
            assert_eq!(id.len(), 36, "{id}");
            assert_eq!(id.matches('-').count(), 4, "{id}");
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_connection_close_is_honored() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(HelloHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"GET /a HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
            let response = read_response(&mut client).await;
            assert!(response.contains("Connection: close\r\n"), "{response}");
            assert!(response.ends_with("hello"), "{response}");
            assert!(read_eof(&mut client).await, "socket should be closed");
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_malformed_request_line_gets_400_and_close() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(HelloHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(b"NOT-A-REQUEST\r\n\r\n").await.unwrap();
            let response = read_response(&mut client).await;
            assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
            assert!(response.ends_with("\r\n\r\nBad Request"), "{response}");
            assert!(read_eof(&mut client).await, "socket should be closed");
            // parse errors are neither read errors nor served requests
            assert_eq!(server.metrics().read_errors(), 0);
            assert_eq!(server.metrics().requests_served(), 0);
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_pipelined_requests_answered_in_order() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(
                HttpServer::builder()
                    .handler(RouteHandler("/a"))
                    .handler(RouteHandler("/b")),
            )
            .await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(
                    b"GET /a HTTP/1.1\r\nHost: x\r\n\r\nGET /b HTTP/1.1\r\nHost: x\r\n\r\n",
                )
                .await
                .unwrap();
            let first = read_response(&mut client).await;
            let second = read_response(&mut client).await;
            assert!(first.ends_with("\r\n\r\n/a"), "{first}");
            assert!(second.ends_with("\r\n\r\n/b"), "{second}");
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_content_length_body_is_bounded() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(EchoHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            // pipelined second request directly after the 5 body bytes
            client
                .write_all(
                    b"POST / HTTP/1.1\r\nHost: x\r\nContent-Length: 5\r\n\r\nabcdeGET / HTTP/1.1\r\nHost: x\r\nContent-Length: 0\r\n\r\n",
                )
                .await
                .unwrap();
            let first = read_response(&mut client).await;
            let second = read_response(&mut client).await;
            // the first handler saw exactly 5 bytes, not the next request
            assert!(first.ends_with("\r\n\r\nabcde"), "{first}");
            assert!(second.contains("Content-Length: 0\r\n"), "{second}");
            server.stop().await;
        })
        .await;
}

/// Streams more than the high-water mark, forcing chunked framing.
struct StreamingHandler;

impl HttpServerRequestHandler for StreamingHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            context.response_mut().set_status(StatusCode::OK);
            for _ in 0..4 {
                context.response().write_body("0123456789").await?;
            }
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_streaming_past_high_water_switches_to_chunked() {
    LocalSet::new()
        .run_until(async {
            let config = HttpServerConfiguration::new().write_high_water_mark(16);
            let (server, addr) = start(
                HttpServer::builder()
                    .configuration(config)
                    .handler(StreamingHandler),
            )
            .await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
                .await
                .unwrap();
            let response = read_response(&mut client).await;
            assert!(
                response.contains("Transfer-Encoding: chunked\r\n"),
                "{response}"
            );
            assert!(response.ends_with("0\r\n\r\n"), "{response}");
            assert_eq!(response.matches("0123456789").count(), 4, "{response}");
            server.stop().await;
        })
        .await;
}

/// Builds the body with an appender function called until it runs dry.
struct AppenderHandler;

impl HttpServerRequestHandler for AppenderHandler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        context.response_mut().set_status(StatusCode::OK);
        let mut pieces = vec!["one ", "two ", "three"].into_iter();
        context.response_mut().set_body_appender(move || {
            pieces
                .next()
                .map(cpv_framework::SharedString::from_static)
                .unwrap_or_default()
        });
        Box::pin(futures_util::future::ready(Ok(())))
    }
}

#[tokio::test]
async fn test_appender_body_is_measured_and_sent() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(AppenderHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
                .await
                .unwrap();
            let response = read_response(&mut client).await;
            assert!(response.contains("Content-Length: 13\r\n"), "{response}");
            assert!(response.ends_with("\r\n\r\none two three"), "{response}");
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_header_read_timeout_replies_408() {
    LocalSet::new()
        .run_until(async {
            let config = HttpServerConfiguration::new()
                .request_header_timeout(Duration::from_millis(100))
                .keep_alive_idle_timeout(Duration::from_millis(100));
            let (server, addr) = start(
                HttpServer::builder()
                    .configuration(config)
                    .handler(HelloHandler),
            )
            .await;
            // partial request head, then silence
            let mut client = TcpStream::connect(addr).await.unwrap();
            client.write_all(b"GET / HT").await.unwrap();
            let response = read_response(&mut client).await;
            assert!(
                response.starts_with("HTTP/1.1 408 Request Timeout\r\n"),
                "{response}"
            );

            // an idle connection is closed silently
            let mut idle = TcpStream::connect(addr).await.unwrap();
            let mut tmp = [0u8; 16];
            let n = tokio::time::timeout(Duration::from_secs(5), idle.read(&mut tmp))
                .await
                .expect("timed out")
                .expect("read failed");
            assert_eq!(n, 0, "idle connection should close without a reply");
            server.stop().await;
        })
        .await;
}

#[tokio::test]
async fn test_stop_is_graceful_and_idempotent() {
    LocalSet::new()
        .run_until(async {
            let (server, addr) = start(HttpServer::builder().handler(HelloHandler)).await;
            let mut client = TcpStream::connect(addr).await.unwrap();
            client
                .write_all(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n")
                .await
                .unwrap();
            let response = read_response(&mut client).await;
            assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
            server.stop().await;
            server.stop().await;
            assert!(
                TcpStream::connect(addr).await.is_err(),
                "listener should be released after stop"
            );
        })
        .await;
}
