//! The handler at the tail of every pipeline.

use futures_util::future;
use http::StatusCode;

use crate::constants;
use crate::context::HttpContext;
use crate::handler::{HandlerChain, HandlerFuture, HttpServerRequestHandler};

/// Replies 404 Not Found; reached when no earlier handler produced a
/// response.
#[derive(Default)]
pub struct HttpServerRequest404Handler;

impl HttpServerRequestHandler for HttpServerRequest404Handler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        context.response_mut().reply(
            StatusCode::NOT_FOUND,
            constants::TEXT_PLAIN_UTF8,
            constants::NOT_FOUND,
        );
        Box::pin(future::ready(Ok(())))
    }
}
