//! The response envelope.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;
use std::time::SystemTime;

use http::StatusCode;

use crate::constants;
use crate::dateutils::format_time_for_http_header;
use crate::errors::{HttpError, HttpResult};
use crate::headers::HttpResponseHeaders;
use crate::packet::Packet;
use crate::pool::{Recyclable, Reusable};
use crate::sharedstring::{SharedString, SharedStringBuilder};
use crate::stream::{InputStream, OutputStream};

/// Pending body source set through the convenience setters; the
/// connection drains it when the pipeline completes. The three modes are
/// mutually exclusive, the last setter wins.
#[derive(Default)]
pub(crate) enum ResponseBody {
    #[default]
    None,
    Literal(SharedString),
    /// Called repeatedly until it returns an empty string.
    Appender(Box<dyn FnMut() -> SharedString>),
    Stream(Rc<RefCell<dyn InputStream>>),
}

/// Members of [`HttpResponse`], recycled through the per-core pool.
#[derive(Default)]
pub struct HttpResponseData {
    version: SharedString,
    status_code: SharedString,
    status_message: SharedString,
    headers: HttpResponseHeaders,
    body_stream: Option<Rc<RefCell<dyn OutputStream>>>,
    pending_body: ResponseBody,
    underlying_buffers: Vec<SharedString>,
    wire_started: Option<Rc<Cell<bool>>>,
}

impl Recyclable for HttpResponseData {
    fn free_resources(&mut self) {
        self.version.clear();
        self.status_code.clear();
        self.status_message.clear();
        self.headers.clear();
        self.body_stream = None;
        self.pending_body = ResponseBody::None;
        self.underlying_buffers.clear();
        self.wire_started = None;
    }
}

/// Options of [`HttpResponse::set_cookie`].
#[derive(Default)]
pub struct SetCookie {
    pub key: SharedString,
    pub value: SharedString,
    pub path: SharedString,
    pub domain: SharedString,
    pub expires: Option<SystemTime>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SharedString,
}

impl SetCookie {
    pub fn new(key: impl Into<SharedString>, value: impl Into<SharedString>) -> SetCookie {
        SetCookie {
            key: key.into(),
            value: value.into(),
            ..SetCookie::default()
        }
    }

    pub fn path(mut self, path: impl Into<SharedString>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<SharedString>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn expires(mut self, expires: SystemTime) -> Self {
        self.expires = Some(expires);
        self
    }

    pub fn http_only(mut self) -> Self {
        self.http_only = true;
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn same_site(mut self, same_site: impl Into<SharedString>) -> Self {
        self.same_site = same_site.into();
        self
    }
}

/// The response under construction for one request.
///
/// Lifecycle matches the request envelope: acquired together, recycled
/// once the response bytes are on the wire.
pub struct HttpResponse {
    data: Reusable<HttpResponseData>,
}

impl HttpResponse {
    pub fn new() -> HttpResponse {
        HttpResponse {
            data: Reusable::acquire(),
        }
    }

    /// A second handle to the same envelope, used by the connection's
    /// socket writer.
    pub(crate) fn share(&self) -> HttpResponse {
        HttpResponse {
            data: self.data.clone(),
        }
    }

    pub fn version(&self) -> SharedString {
        self.data.get().version.share()
    }

    pub fn set_version(&mut self, version: impl Into<SharedString>) {
        self.data.get_mut().version = version.into();
    }

    pub fn status_code(&self) -> SharedString {
        self.data.get().status_code.share()
    }

    pub fn status_message(&self) -> SharedString {
        self.data.get().status_message.share()
    }

    /// Set status code and the canonical reason phrase in one go.
    pub fn set_status(&mut self, code: StatusCode) {
        let mut d = self.data.get_mut();
        d.status_code = constants::integer(code.as_u16() as usize);
        d.status_message = code
            .canonical_reason()
            .map(SharedString::from_static)
            .unwrap_or_default();
    }

    pub fn set_status_code(&mut self, code: impl Into<SharedString>) {
        self.data.get_mut().status_code = code.into();
    }

    pub fn set_status_message(&mut self, message: impl Into<SharedString>) {
        self.data.get_mut().status_message = message.into();
    }

    pub fn headers(&self) -> Ref<'_, HttpResponseHeaders> {
        Ref::map(self.data.get(), |d| &d.headers)
    }

    pub fn headers_mut(&mut self) -> RefMut<'_, HttpResponseHeaders> {
        RefMut::map(self.data.get_mut(), |d| &mut d.headers)
    }

    pub fn get_header(&self, key: &[u8]) -> SharedString {
        self.data.get().headers.get_header(key)
    }

    pub fn set_header(&mut self, key: impl Into<SharedString>, value: impl Into<SharedString>) {
        self.data.get_mut().headers.set_header(key, value);
    }

    /// The body output stream bound by the connection. Writing to it
    /// starts streaming: headers go on the wire and later header changes
    /// are ignored.
    pub fn body_stream(&self) -> Option<Rc<RefCell<dyn OutputStream>>> {
        self.data.get().body_stream.clone()
    }

    pub fn set_body_stream(&mut self, stream: Rc<RefCell<dyn OutputStream>>) {
        self.data.get_mut().body_stream = Some(stream);
    }

    /// Write directly to the body output stream.
    pub async fn write_body(&self, data: impl Into<Packet>) -> HttpResult<()> {
        let Some(stream) = self.body_stream() else {
            return Err(HttpError::Logic("write to null stream"));
        };
        let mut stream = stream.borrow_mut();
        stream.write(data.into()).await
    }

    /// Set the body to literal bytes.
    pub fn set_body(&mut self, body: impl Into<SharedString>) {
        self.data.get_mut().pending_body = ResponseBody::Literal(body.into());
    }

    /// Set the body to an appender function, called until it returns an
    /// empty string.
    pub fn set_body_appender(&mut self, appender: impl FnMut() -> SharedString + 'static) {
        self.data.get_mut().pending_body = ResponseBody::Appender(Box::new(appender));
    }

    /// Set the body to be copied from an input stream.
    pub fn set_body_source(&mut self, source: Rc<RefCell<dyn InputStream>>) {
        self.data.get_mut().pending_body = ResponseBody::Stream(source);
    }

    pub(crate) fn take_pending_body(&self) -> ResponseBody {
        std::mem::take(&mut self.data.get_mut().pending_body)
    }

    /// Set status, content type and a literal body in one call.
    pub fn reply(
        &mut self,
        code: StatusCode,
        content_type: impl Into<SharedString>,
        body: impl Into<SharedString>,
    ) {
        self.set_status(code);
        self.headers_mut().set_content_type(content_type);
        self.set_body(body);
    }

    /// Reply 302 Found with the given location.
    pub fn redirect_to(&mut self, location: impl Into<SharedString>) {
        self.set_status(StatusCode::FOUND);
        self.headers_mut().set_location(location);
    }

    /// Reply 301 Moved Permanently with the given location.
    pub fn redirect_to_permanently(&mut self, location: impl Into<SharedString>) {
        self.set_status(StatusCode::MOVED_PERMANENTLY);
        self.headers_mut().set_location(location);
    }

    /// Add or replace a cookie on the client.
    ///
    /// The whole `Set-Cookie` value is built into one allocated buffer
    /// attached to the envelope; multiple cookies may be set on one
    /// response.
    pub fn set_cookie(&mut self, cookie: &SetCookie) {
        // Set-Cookie: {}={}; Path={}; Domain={}; Expires={}; HttpOnly; Secure; SameSite={}
        let mut builder = SharedStringBuilder::with_capacity(
            cookie.key.len()
                + cookie.value.len()
                + cookie.path.len()
                + cookie.domain.len()
                + cookie.same_site.len()
                + crate::dateutils::HTTP_HEADER_TIME_LENGTH
                + 57,
        );
        builder.append(cookie.key.as_bytes());
        if !cookie.value.is_empty() {
            builder.append(b"=");
            builder.append(cookie.value.as_bytes());
        }
        if !cookie.path.is_empty() {
            builder.append(b"; Path=");
            builder.append(cookie.path.as_bytes());
        }
        if !cookie.domain.is_empty() {
            builder.append(b"; Domain=");
            builder.append(cookie.domain.as_bytes());
        }
        if let Some(expires) = cookie.expires {
            builder.append(b"; Expires=");
            builder.append(format_time_for_http_header(expires).as_bytes());
        }
        if cookie.http_only {
            builder.append(b"; HttpOnly");
        }
        if cookie.secure {
            builder.append(b"; Secure");
        }
        if !cookie.same_site.is_empty() {
            builder.append(b"; SameSite=");
            builder.append(cookie.same_site.as_bytes());
        }
        let value = builder.build();
        let mut d = self.data.get_mut();
        d.underlying_buffers.push(value.share());
        d.headers.add_addition_header(constants::SET_COOKIE, value);
    }

    /// Remove a cookie on the client (empty value, epoch expiry).
    pub fn remove_cookie(
        &mut self,
        key: impl Into<SharedString>,
        path: impl Into<SharedString>,
        domain: impl Into<SharedString>,
    ) {
        self.set_cookie(
            &SetCookie::new(key, SharedString::new())
                .path(path)
                .domain(domain)
                .expires(SystemTime::UNIX_EPOCH),
        );
    }

    /// Whether response headers already reached the wire.
    pub fn headers_sent(&self) -> bool {
        self.data
            .get()
            .wire_started
            .as_ref()
            .map(|flag| flag.get())
            .unwrap_or(false)
    }

    pub(crate) fn set_wire_started_flag(&mut self, flag: Rc<Cell<bool>>) {
        self.data.get_mut().wire_started = Some(flag);
    }

    /// Attach a buffer whose lifetime must extend to the end of the
    /// response.
    pub fn add_underlying_buffer(&mut self, buffer: SharedString) {
        self.data.get_mut().underlying_buffers.push(buffer);
    }
}

impl Default for HttpResponse {
    fn default() -> HttpResponse {
        HttpResponse::new()
    }
}
