//! Parsed view of a request's `Cookie` header.

use std::collections::BTreeMap;

use crate::sharedstring::SharedString;

/// Cookies parsed lazily from the `Cookie` header the first time they are
/// queried.
#[derive(Default)]
pub struct HttpRequestCookies {
    cookies: BTreeMap<SharedString, SharedString>,
}

impl HttpRequestCookies {
    /// Cookie value for the key; empty when the key does not exist.
    pub fn get(&self, key: &[u8]) -> SharedString {
        self.cookies
            .get(key)
            .map(SharedString::share)
            .unwrap_or_default()
    }

    /// All parsed cookies.
    pub fn get_all(&self) -> &BTreeMap<SharedString, SharedString> {
        &self.cookies
    }

    /// Parse the value of a `Cookie` header. Accepted shapes:
    /// `key`, `key=value`, `key=value; other=value; key-only`.
    /// A bare token is stored as a key with an empty value.
    pub fn parse(&mut self, header: &SharedString) {
        let bytes = header.as_bytes();
        let mut mark = 0;
        let mut key = SharedString::new();
        for (index, &b) in bytes.iter().enumerate() {
            if b == b'=' {
                key = header.slice(mark..index).trim();
                mark = index + 1;
            } else if b == b';' {
                let value = header.slice(mark..index).trim();
                mark = index + 1;
                if !key.is_empty() {
                    self.cookies.insert(std::mem::take(&mut key), value);
                } else if !value.is_empty() {
                    self.cookies.insert(value, SharedString::new());
                }
            }
        }
        if mark < bytes.len() {
            let value = header.slice(mark..).trim();
            if !key.is_empty() {
                self.cookies.insert(key, value);
            } else if !value.is_empty() {
                self.cookies.insert(value, SharedString::new());
            }
        }
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }
}
