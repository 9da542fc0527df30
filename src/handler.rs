//! The request handler contract and the chain-with-cursor plumbing.

use std::rc::Rc;

use futures_util::future::{self, LocalBoxFuture};

use crate::context::HttpContext;
use crate::errors::{HttpError, HttpResult};

/// Future returned by a handler.
pub type HandlerFuture<'a> = LocalBoxFuture<'a, HttpResult<()>>;

/// One element of the request pipeline.
///
/// A handler may terminate the chain by producing a response and not
/// touching `next`, delegate by returning `next.invoke_next(context)`
/// (possibly wrapped with pre/post logic), or transform the body and
/// headers on the way through.
pub trait HttpServerRequestHandler: 'static {
    fn handle<'a>(&'a self, context: &'a mut HttpContext, next: HandlerChain<'a>)
    -> HandlerFuture<'a>;
}

/// The rest of the pipeline after the current handler: the cursor is the
/// front of the slice.
#[derive(Clone, Copy)]
pub struct HandlerChain<'a> {
    handlers: &'a [Rc<dyn HttpServerRequestHandler>],
}

impl<'a> HandlerChain<'a> {
    pub fn new(handlers: &'a [Rc<dyn HttpServerRequestHandler>]) -> HandlerChain<'a> {
        HandlerChain { handlers }
    }

    /// Number of handlers left to run.
    pub fn remaining(&self) -> usize {
        self.handlers.len()
    }

    /// Invoke the next handler, advancing the cursor.
    pub fn invoke_next(self, context: &'a mut HttpContext) -> HandlerFuture<'a> {
        match self.handlers.split_first() {
            Some((head, rest)) => head.handle(context, HandlerChain { handlers: rest }),
            // the tail 404 handler never delegates, so a well-formed
            // pipeline cannot run off the end
            None => Box::pin(future::ready(Err(HttpError::Logic(
                "handler chain exhausted",
            )))),
        }
    }
}

/// Adapter turning an async closure into a terminating handler.
pub struct FnHandler<F>(F);

impl<F> HttpServerRequestHandler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut HttpContext) -> HandlerFuture<'a> + 'static,
{
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        _next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        (self.0)(context)
    }
}

/// Wrap an async closure as a handler that terminates the chain.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut HttpContext) -> HandlerFuture<'a> + 'static,
{
    FnHandler(f)
}
