//! The exception filter at position 0 of every pipeline.

use http::StatusCode;
use log::error;
use uuid::Uuid;

use crate::constants;
use crate::context::HttpContext;
use crate::errors::{HttpError, HttpResult};
use crate::handler::{HandlerChain, HandlerFuture, HttpServerRequestHandler};
use crate::packet::Packet;
use crate::sharedstring::{SharedString, SharedStringBuilder};

/// Invokes the rest of the chain and turns any failure into a 500 reply
/// carrying a fresh error id; the same id goes to the log together with
/// the failure.
#[derive(Default)]
pub struct HttpServerRequest500Handler;

impl HttpServerRequestHandler for HttpServerRequest500Handler {
    fn handle<'a>(
        &'a self,
        context: &'a mut HttpContext,
        next: HandlerChain<'a>,
    ) -> HandlerFuture<'a> {
        Box::pin(async move {
            match next.invoke_next(context).await {
                Ok(()) => Ok(()),
                Err(e) => reply_500(context, e).await,
            }
        })
    }
}

async fn reply_500(context: &mut HttpContext, e: HttpError) -> HttpResult<()> {
    // generate a time ordered uuid as error id
    let error_id = Uuid::now_v7().to_string();
    error!("http server request error, ID: {}\n{}", error_id, e);
    if context.response().headers_sent() {
        // headers are already on the wire; append the id to the content
        // (the client sees it in the body) and close the connection after
        let mut tail = Packet::new();
        tail.append(constants::LF)
            .append(SharedString::from_static("ID: "))
            .append(SharedString::from(error_id));
        context.response().write_body(tail).await?;
        context
            .response_mut()
            .set_header(constants::CONNECTION, constants::CLOSE);
        return Ok(());
    }
    let mut body = SharedStringBuilder::with_capacity(64);
    body.append(constants::INTERNAL_SERVER_ERROR.as_bytes())
        .append(b"\nID: ")
        .append(error_id.as_bytes());
    // a content length set by the failed handler no longer matches
    context
        .response_mut()
        .headers_mut()
        .set_content_length(SharedString::new());
    context.response_mut().reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        constants::TEXT_PLAIN_UTF8,
        body.build(),
    );
    Ok(())
}
