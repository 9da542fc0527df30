//! Url-encoded form handling and percent coding helpers.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode, percent_encode};

use crate::constants;
use crate::packet::Packet;
use crate::sharedstring::{SharedString, SharedStringBuilder};

/// Bytes escaped in form values: everything except ALPHA / DIGIT / `-_.~`.
const FORM_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Url-encode arbitrary bytes; space becomes `+`. Returns a shared view
/// of the input when nothing needs escaping.
pub fn url_encode(source: &SharedString) -> SharedString {
    let bytes = source.as_bytes();
    let clean = bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~'));
    if clean {
        return source.share();
    }
    let mut builder = SharedStringBuilder::with_capacity(bytes.len() + 16);
    for (index, segment) in bytes.split(|&b| b == b' ').enumerate() {
        if index > 0 {
            builder.append(b"+");
        }
        for piece in percent_encode(segment, FORM_ENCODE_SET) {
            builder.append_str(piece);
        }
    }
    builder.build()
}

/// Url-decode; `+` becomes space, stray `%` passes through literally.
/// Returns a shared view of the input when nothing is escaped.
pub fn url_decode(source: &SharedString) -> SharedString {
    let bytes = source.as_bytes();
    if !bytes.contains(&b'+') && !bytes.contains(&b'%') {
        return source.share();
    }
    let plus_replaced: Vec<u8> = bytes
        .iter()
        .map(|&b| if b == b'+' { b' ' } else { b })
        .collect();
    SharedString::from(percent_decode(&plus_replaced).collect::<Vec<u8>>())
}

/// A parsed url-encoded form: parameter name to one or more values.
#[derive(Default)]
pub struct HttpForm {
    parameters: BTreeMap<SharedString, Vec<SharedString>>,
}

impl HttpForm {
    pub fn new() -> HttpForm {
        HttpForm::default()
    }

    /// Parse an url-encoded body into this form.
    ///
    /// Quirk kept for compatibility with existing clients: a bare key with
    /// no `=` is stored as a *value under the empty key* (so `a&b` yields
    /// `"" => ["a", "b"]`), and `a=1&&b=2` records an empty-key/empty-value
    /// entry. Consumers wanting strict semantics should skip the empty key.
    pub fn parse_url_encoded(&mut self, body: &SharedString) {
        let bytes = body.as_bytes();
        let mut mark = 0;
        let mut key = SharedString::new();
        let mut has_key = false;
        for (index, &b) in bytes.iter().enumerate() {
            if b == b'=' {
                key = url_decode(&body.slice(mark..index));
                has_key = true;
                mark = index + 1;
            } else if b == b'&' {
                let value = url_decode(&body.slice(mark..index));
                self.add(std::mem::take(&mut key), value);
                has_key = false;
                mark = index + 1;
            }
        }
        if mark < bytes.len() || has_key {
            let value = url_decode(&body.slice(mark..));
            self.add(key, value);
        }
    }

    /// Append the url-encoded representation to a packet.
    pub fn build_url_encoded(&self, packet: &mut Packet) {
        let mut first = true;
        for (key, values) in &self.parameters {
            for value in values {
                if first {
                    first = false;
                } else {
                    packet.append(constants::AMPERSAND);
                }
                packet.append(url_encode(key));
                packet.append(constants::EQUALS_SIGN);
                packet.append(url_encode(value));
            }
        }
    }

    pub fn add(&mut self, key: SharedString, value: SharedString) {
        self.parameters.entry(key).or_default().push(value);
    }

    /// First value for the key; empty when absent.
    pub fn get(&self, key: &[u8]) -> SharedString {
        self.parameters
            .get(key)
            .and_then(|values| values.first())
            .map(SharedString::share)
            .unwrap_or_default()
    }

    /// All values for the key.
    pub fn get_many(&self, key: &[u8]) -> &[SharedString] {
        self.parameters
            .get(key)
            .map(|values| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn parameters(&self) -> &BTreeMap<SharedString, Vec<SharedString>> {
        &self.parameters
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn clear(&mut self) {
        self.parameters.clear();
    }
}
