//! Parameter descriptors for extracting values out of a request.

use crate::request::HttpRequest;
use crate::sharedstring::SharedString;

/// Where a handler parameter comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterSource {
    /// The n-th path segment of the request target.
    PathFragment(usize),
    /// A query string parameter.
    Query(SharedString),
    /// A request header.
    Header(SharedString),
    /// A field of the url-encoded body form; resolves to empty until
    /// [`HttpRequest::read_body_as_form`] materialized the form.
    Form(SharedString),
}

impl ParameterSource {
    /// Look the parameter up on a request; empty when absent.
    pub fn lookup(&self, request: &HttpRequest) -> SharedString {
        match self {
            ParameterSource::PathFragment(index) => request.uri().get_path_fragment(*index),
            ParameterSource::Query(name) => request.uri().get_query_parameter(name.as_bytes()),
            ParameterSource::Header(name) => request.get_header(name.as_bytes()),
            ParameterSource::Form(name) => request
                .form()
                .map(|form| form.get(name.as_bytes()))
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_sources() {
        let mut request = HttpRequest::new();
        request.set_url("/users/42?sort=asc");
        request.set_header(SharedString::from_static("X-Token"), "t0k3n");

        assert_eq!(
            ParameterSource::PathFragment(1).lookup(&request),
            "42"
        );
        assert_eq!(
            ParameterSource::Query(SharedString::from_static("sort")).lookup(&request),
            "asc"
        );
        assert_eq!(
            ParameterSource::Header(SharedString::from_static("X-Token")).lookup(&request),
            "t0k3n"
        );
        // the body form was never read, form parameters resolve to empty
        assert!(
            ParameterSource::Form(SharedString::from_static("name"))
                .lookup(&request)
                .is_empty()
        );
        assert!(ParameterSource::PathFragment(9).lookup(&request).is_empty());
    }
}
