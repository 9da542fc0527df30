//! Shared constant strings, matching the wire bytes they serialize to.

use once_cell::sync::Lazy;

use crate::sharedstring::SharedString;

/// Default value of the `Server` response header.
pub const CPV_FRAMEWORK: SharedString = SharedString::from_static("cpv-framework");

// common separators
pub const SPACE: SharedString = SharedString::from_static(" ");
pub const COLON_SPACE: SharedString = SharedString::from_static(": ");
pub const LF: SharedString = SharedString::from_static("\n");
pub const CRLF: SharedString = SharedString::from_static("\r\n");
pub const AMPERSAND: SharedString = SharedString::from_static("&");
pub const EQUALS_SIGN: SharedString = SharedString::from_static("=");

// http versions
pub const HTTP_1_0: SharedString = SharedString::from_static("HTTP/1.0");
pub const HTTP_1_1: SharedString = SharedString::from_static("HTTP/1.1");

// header names
pub const HOST: SharedString = SharedString::from_static("Host");
pub const CONTENT_TYPE: SharedString = SharedString::from_static("Content-Type");
pub const CONTENT_LENGTH: SharedString = SharedString::from_static("Content-Length");
pub const CONTENT_ENCODING: SharedString = SharedString::from_static("Content-Encoding");
pub const TRANSFER_ENCODING: SharedString = SharedString::from_static("Transfer-Encoding");
pub const CONNECTION: SharedString = SharedString::from_static("Connection");
pub const PRAGMA: SharedString = SharedString::from_static("Pragma");
pub const CACHE_CONTROL: SharedString = SharedString::from_static("Cache-Control");
pub const UPGRADE_INSECURE_REQUESTS: SharedString =
    SharedString::from_static("Upgrade-Insecure-Requests");
pub const DNT: SharedString = SharedString::from_static("DNT");
pub const USER_AGENT: SharedString = SharedString::from_static("User-Agent");
pub const ACCEPT: SharedString = SharedString::from_static("Accept");
pub const ACCEPT_ENCODING: SharedString = SharedString::from_static("Accept-Encoding");
pub const ACCEPT_LANGUAGE: SharedString = SharedString::from_static("Accept-Language");
pub const COOKIE: SharedString = SharedString::from_static("Cookie");
pub const X_REQUESTED_WITH: SharedString = SharedString::from_static("X-Requested-With");
pub const DATE: SharedString = SharedString::from_static("Date");
pub const SERVER: SharedString = SharedString::from_static("Server");
pub const VARY: SharedString = SharedString::from_static("Vary");
pub const ETAG: SharedString = SharedString::from_static("ETag");
pub const SET_COOKIE: SharedString = SharedString::from_static("Set-Cookie");
pub const EXPIRES: SharedString = SharedString::from_static("Expires");
pub const LAST_MODIFIED: SharedString = SharedString::from_static("Last-Modified");
pub const LOCATION: SharedString = SharedString::from_static("Location");

// common header values
pub const KEEP_ALIVE: SharedString = SharedString::from_static("keep-alive");
pub const CLOSE: SharedString = SharedString::from_static("close");
pub const CHUNKED: SharedString = SharedString::from_static("chunked");
pub const TEXT_PLAIN_UTF8: SharedString =
    SharedString::from_static("text/plain;charset=utf-8");

// status phrases used by the core itself
pub const OK: SharedString = SharedString::from_static("OK");
pub const FOUND: SharedString = SharedString::from_static("Found");
pub const MOVED_PERMANENTLY: SharedString = SharedString::from_static("Moved Permanently");
pub const BAD_REQUEST: SharedString = SharedString::from_static("Bad Request");
pub const NOT_FOUND: SharedString = SharedString::from_static("Not Found");
pub const REQUEST_TIMEOUT: SharedString = SharedString::from_static("Request Timeout");
pub const PAYLOAD_TOO_LARGE: SharedString = SharedString::from_static("Payload Too Large");
pub const HEADER_FIELDS_TOO_LARGE: SharedString =
    SharedString::from_static("Request Header Fields Too Large");
pub const INTERNAL_SERVER_ERROR: SharedString =
    SharedString::from_static("Internal Server Error");

/// Largest integer whose string form is served from the shared table.
pub const MAX_CONSTANT_INTEGER: usize = 4096;

static INTEGERS: Lazy<Vec<SharedString>> = Lazy::new(|| {
    (0..=MAX_CONSTANT_INTEGER)
        .map(|i| SharedString::from(i.to_string()))
        .collect()
});

/// String form of an integer; values above the table bound allocate.
pub fn integer(value: usize) -> SharedString {
    if value <= MAX_CONSTANT_INTEGER {
        INTEGERS[value].share()
    } else {
        SharedString::from(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_table_boundary() {
        assert_eq!(integer(0), "0");
        assert_eq!(integer(MAX_CONSTANT_INTEGER), "4096");
        // inside the bound the table entry is shared, the pointer is stable
        assert_eq!(
            integer(100).data_ptr(),
            integer(100).data_ptr()
        );
        // one above the bound allocates a fresh buffer each time
        let a = integer(MAX_CONSTANT_INTEGER + 1);
        let b = integer(MAX_CONSTANT_INTEGER + 1);
        assert_eq!(a, b);
        assert_ne!(a.data_ptr(), b.data_ptr());
    }
}
