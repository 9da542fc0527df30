//! Per-core, shared-nothing HTTP/1.1 server framework over a
//! run-to-completion reactor.
//!
//! Each server instance owns one core: it runs on a current-thread tokio
//! runtime inside a [`tokio::task::LocalSet`], with its own pools, its own
//! metrics and its own slice of accepted connections. Nothing is shared
//! across cores; run one instance per core and let the OS distribute
//! accepts.
//!
//! The hot path is zero-copy end to end: the parser publishes
//! [`SharedString`] views into pooled connection buffers, the envelopes
//! keep those buffers alive, and responses are gather-written fragment by
//! fragment without intermediate copies.
//!
//! ```rust ignore
//! use cpv_framework::{HttpServer, handler_fn};
//! use http::StatusCode;
//!
//! let server = HttpServer::builder()
//!     .listen("127.0.0.1:8000")
//!     .handler(handler_fn(|context: &mut cpv_framework::HttpContext| {
//!         Box::pin(async move {
//!             context.response_mut().reply(
//!                 StatusCode::OK,
//!                 "text/plain;charset=utf-8",
//!                 "hello",
//!             );
//!             Ok(())
//!         })
//!     }))
//!     .build();
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     server.start().await?;
//!     // ... until shutdown ...
//!     server.stop().await;
//!     Ok::<_, cpv_framework::HttpError>(())
//! });
//! ```

pub mod constants;
pub mod container;
pub mod cookies;
pub mod dateutils;
pub mod form;
pub mod instream;
pub mod logging;
pub mod metrics;
pub mod netutils;
pub mod outstream;
pub mod params;
pub mod pool;
pub mod uri;

mod config;
mod connection;
mod context;
mod errors;
mod handler;
mod handler_404;
mod handler_500;
mod headers;
mod packet;
mod parser;
mod request;
mod response;
mod server;
mod sharedstring;
mod stream;

pub use crate::config::HttpServerConfiguration;
pub use crate::container::{ServiceContainer, ServiceLifetime, ServiceStorage};
pub use crate::context::HttpContext;
pub use crate::errors::{HttpError, HttpResult};
pub use crate::handler::{
    FnHandler, HandlerChain, HandlerFuture, HttpServerRequestHandler, handler_fn,
};
pub use crate::handler_404::HttpServerRequest404Handler;
pub use crate::handler_500::HttpServerRequest500Handler;
pub use crate::headers::{HttpRequestHeaders, HttpResponseHeaders};
pub use crate::logging::LogLevel;
pub use crate::metrics::{HttpServerMetrics, MetricKind, MetricSample};
pub use crate::packet::Packet;
pub use crate::params::ParameterSource;
pub use crate::parser::{BodyFraming, HttpParserState, HttpRequestParser, ParseFailure};
pub use crate::pool::{Recyclable, Reusable};
pub use crate::request::HttpRequest;
pub use crate::response::{HttpResponse, SetCookie};
pub use crate::server::{HttpServer, HttpServerBuilder};
pub use crate::sharedstring::{SharedString, SharedStringBuilder};
pub use crate::stream::{InputStream, OutputStream, ReadResult, StreamFuture, read_all, write_all};
