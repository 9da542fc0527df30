//! The request envelope.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::cookies::HttpRequestCookies;
use crate::errors::HttpResult;
use crate::form::HttpForm;
use crate::headers::HttpRequestHeaders;
use crate::pool::{Recyclable, Reusable};
use crate::sharedstring::SharedString;
use crate::stream::{InputStream, read_all};
use crate::uri::HttpRequestUri;

/// Members of [`HttpRequest`], recycled through the per-core pool.
#[derive(Default)]
pub struct HttpRequestData {
    method: SharedString,
    url: SharedString,
    version: SharedString,
    headers: HttpRequestHeaders,
    body_stream: Option<Rc<RefCell<dyn InputStream>>>,
    // lazy parse caches, keyed by the pointer of their source view
    source_of_uri: Option<usize>,
    uri: HttpRequestUri,
    source_of_cookies: Option<usize>,
    cookies: HttpRequestCookies,
    form: Option<HttpForm>,
    underlying_buffers: Vec<SharedString>,
}

impl Recyclable for HttpRequestData {
    fn free_resources(&mut self) {
        self.method.clear();
        self.url.clear();
        self.version.clear();
        self.headers.clear();
        self.body_stream = None;
        self.source_of_uri = None;
        self.uri.clear();
        self.source_of_cookies = None;
        self.cookies.clear();
        self.form = None;
        self.underlying_buffers.clear();
    }
}

/// A parsed request: request line, headers and the body input stream.
///
/// Acquired from the per-core pool when a connection begins a new request
/// and recycled once the response has been fully written. All string
/// views borrow from buffers the envelope itself keeps alive.
pub struct HttpRequest {
    data: Reusable<HttpRequestData>,
}

impl HttpRequest {
    pub fn new() -> HttpRequest {
        HttpRequest {
            data: Reusable::acquire(),
        }
    }

    pub fn method(&self) -> SharedString {
        self.data.get().method.share()
    }

    pub fn set_method(&mut self, method: impl Into<SharedString>) {
        self.data.get_mut().method = method.into();
    }

    pub fn url(&self) -> SharedString {
        self.data.get().url.share()
    }

    pub fn set_url(&mut self, url: impl Into<SharedString>) {
        self.data.get_mut().url = url.into();
    }

    pub fn version(&self) -> SharedString {
        self.data.get().version.share()
    }

    pub fn set_version(&mut self, version: impl Into<SharedString>) {
        self.data.get_mut().version = version.into();
    }

    pub fn headers(&self) -> Ref<'_, HttpRequestHeaders> {
        Ref::map(self.data.get(), |d| &d.headers)
    }

    pub fn headers_mut(&mut self) -> RefMut<'_, HttpRequestHeaders> {
        RefMut::map(self.data.get_mut(), |d| &mut d.headers)
    }

    pub fn get_header(&self, key: &[u8]) -> SharedString {
        self.data.get().headers.get_header(key)
    }

    pub fn set_header(&mut self, key: impl Into<SharedString>, value: impl Into<SharedString>) {
        self.data.get_mut().headers.set_header(key, value);
    }

    /// The parsed request target. Parsed on first access; re-parsed when
    /// the underlying `url` view was replaced since.
    pub fn uri(&self) -> Ref<'_, HttpRequestUri> {
        {
            let mut d = self.data.get_mut();
            let source = d.url.data_ptr() as usize;
            if d.source_of_uri != Some(source) {
                d.source_of_uri = Some(source);
                d.uri.clear();
                let url = d.url.share();
                d.uri.parse(&url);
            }
        }
        Ref::map(self.data.get(), |d| &d.uri)
    }

    /// The parsed `Cookie` header. Same lazy semantics as [`uri`].
    ///
    /// [`uri`]: HttpRequest::uri
    pub fn cookies(&self) -> Ref<'_, HttpRequestCookies> {
        {
            let mut d = self.data.get_mut();
            let header = d.headers.cookie().share();
            let source = header.data_ptr() as usize;
            if d.source_of_cookies != Some(source) {
                d.source_of_cookies = Some(source);
                d.cookies.clear();
                d.cookies.parse(&header);
            }
        }
        Ref::map(self.data.get(), |d| &d.cookies)
    }

    /// The body input stream installed by the connection.
    pub fn body_stream(&self) -> Option<Rc<RefCell<dyn InputStream>>> {
        self.data.get().body_stream.clone()
    }

    pub fn set_body_stream(&mut self, stream: Rc<RefCell<dyn InputStream>>) {
        self.data.get_mut().body_stream = Some(stream);
    }

    /// Read the whole body. A request without a body yields empty.
    pub async fn read_body(&self) -> HttpResult<SharedString> {
        let Some(stream) = self.body_stream() else {
            return Ok(SharedString::new());
        };
        let mut stream = stream.borrow_mut();
        read_all(&mut *stream).await
    }

    /// Read the whole body and parse it as an url-encoded form; the form
    /// stays available through [`form`].
    ///
    /// [`form`]: HttpRequest::form
    pub async fn read_body_as_form(&self) -> HttpResult<()> {
        let body = self.read_body().await?;
        let mut form = HttpForm::new();
        form.parse_url_encoded(&body);
        self.data.get_mut().form = Some(form);
        Ok(())
    }

    /// The form materialized by [`read_body_as_form`], if any.
    ///
    /// [`read_body_as_form`]: HttpRequest::read_body_as_form
    pub fn form(&self) -> Option<Ref<'_, HttpForm>> {
        Ref::filter_map(self.data.get(), |d| d.form.as_ref()).ok()
    }

    /// Attach a buffer whose lifetime must extend to the end of the
    /// request (setters taking borrowed views rely on this).
    pub fn add_underlying_buffer(&mut self, buffer: SharedString) {
        self.data.get_mut().underlying_buffers.push(buffer);
    }
}

impl Default for HttpRequest {
    fn default() -> HttpRequest {
        HttpRequest::new()
    }
}
