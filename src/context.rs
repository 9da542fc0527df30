//! Per-request context handed through the handler pipeline.

use std::net::SocketAddr;

use crate::container::{ServiceContainer, ServiceStorage};
use crate::errors::HttpResult;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Bundles everything one request dispatch needs: the envelopes, the
/// per-core service container, the per-request service storage and the
/// client address.
pub struct HttpContext {
    request: HttpRequest,
    response: HttpResponse,
    container: ServiceContainer,
    storage: ServiceStorage,
    client_address: SocketAddr,
}

impl HttpContext {
    pub fn new(
        request: HttpRequest,
        response: HttpResponse,
        container: ServiceContainer,
        client_address: SocketAddr,
    ) -> HttpContext {
        HttpContext {
            request,
            response,
            container,
            storage: ServiceStorage::new(),
            client_address,
        }
    }

    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut HttpRequest {
        &mut self.request
    }

    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut HttpResponse {
        &mut self.response
    }

    pub fn container(&self) -> &ServiceContainer {
        &self.container
    }

    pub fn service_storage(&self) -> &ServiceStorage {
        &self.storage
    }

    /// Resolve a service honoring its registered lifetime; storage
    /// persistent services live for this request.
    pub fn get_service<T: Clone + 'static>(&self) -> HttpResult<T> {
        self.container.get::<T>(&self.storage)
    }

    pub fn get_many_services<T: Clone + 'static>(&self, out: &mut Vec<T>) -> HttpResult<()> {
        self.container.get_many::<T>(&self.storage, out)
    }

    pub fn client_address(&self) -> SocketAddr {
        self.client_address
    }

    pub(crate) fn into_parts(self) -> (HttpRequest, HttpResponse) {
        (self.request, self.response)
    }
}
