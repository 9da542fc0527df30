//! Zero-copy view of a request target.

use memchr::memchr;

use crate::form::HttpForm;
use crate::sharedstring::SharedString;

/// Path, path fragments and decoded query parameters of a request url.
///
/// Parsed lazily from the raw request target; all views share the target's
/// owner. Path fragments are the raw segments between `/`, query
/// parameters are url-decoded.
#[derive(Default)]
pub struct HttpRequestUri {
    path: SharedString,
    query_string: SharedString,
    path_fragments: Vec<SharedString>,
    query_parameters: HttpForm,
}

impl HttpRequestUri {
    /// Split and parse the raw request target.
    pub fn parse(&mut self, url: &SharedString) {
        match memchr(b'?', url.as_bytes()) {
            Some(index) => {
                self.path = url.slice(..index);
                self.query_string = url.slice(index + 1..);
                self.query_parameters.parse_url_encoded(&self.query_string);
            },
            None => {
                self.path = url.share();
            },
        }
        let path_bytes = self.path.as_bytes();
        let mut mark = 0;
        for index in 0..=path_bytes.len() {
            if index == path_bytes.len() || path_bytes[index] == b'/' {
                if index > mark {
                    self.path_fragments.push(self.path.slice(mark..index));
                }
                mark = index + 1;
            }
        }
    }

    pub fn get_path(&self) -> &SharedString {
        &self.path
    }

    pub fn get_query_string(&self) -> &SharedString {
        &self.query_string
    }

    /// Path segment by index; empty when out of range.
    pub fn get_path_fragment(&self, index: usize) -> SharedString {
        self.path_fragments
            .get(index)
            .map(SharedString::share)
            .unwrap_or_default()
    }

    pub fn get_path_fragments(&self) -> &[SharedString] {
        &self.path_fragments
    }

    /// Decoded query parameter; empty when absent.
    pub fn get_query_parameter(&self, key: &[u8]) -> SharedString {
        self.query_parameters.get(key)
    }

    pub fn get_query_parameters(&self) -> &HttpForm {
        &self.query_parameters
    }

    pub fn clear(&mut self) {
        self.path.clear();
        self.query_string.clear();
        self.path_fragments.clear();
        self.query_parameters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_only() {
        let mut uri = HttpRequestUri::default();
        uri.parse(&SharedString::from_static("/a/b/c"));
        assert_eq!(uri.get_path(), &"/a/b/c");
        assert!(uri.get_query_string().is_empty());
        assert_eq!(uri.get_path_fragment(0), "a");
        assert_eq!(uri.get_path_fragment(1), "b");
        assert_eq!(uri.get_path_fragment(2), "c");
        assert!(uri.get_path_fragment(3).is_empty());
    }

    #[test]
    fn test_parse_with_query() {
        let mut uri = HttpRequestUri::default();
        uri.parse(&SharedString::from_static("/search?q=hello+world&page=2"));
        assert_eq!(uri.get_path(), &"/search");
        assert_eq!(uri.get_query_string(), &"q=hello+world&page=2");
        assert_eq!(uri.get_query_parameter(b"q"), "hello world");
        assert_eq!(uri.get_query_parameter(b"page"), "2");
        assert!(uri.get_query_parameter(b"missing").is_empty());
    }

    #[test]
    fn test_fragments_share_the_url_owner() {
        let url = SharedString::copy_from("/users/42");
        let mut uri = HttpRequestUri::default();
        uri.parse(&url);
        let id = uri.get_path_fragment(1);
        assert_eq!(id, "42");
        assert_eq!(id.data_ptr() as usize, url.data_ptr() as usize + 7);
    }

    #[test]
    fn test_root_path_has_no_fragments() {
        let mut uri = HttpRequestUri::default();
        uri.parse(&SharedString::from_static("/"));
        assert!(uri.get_path_fragments().is_empty());
    }
}
