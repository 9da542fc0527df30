//! Header collections with fast-path fixed fields.
//!
//! Well known header names are stored in dedicated fields for O(1) access;
//! everything else lands in a remainder map. Lookup prefers the fixed
//! fields. Names match case-insensitively.

use std::collections::HashMap;

use crate::constants;
use crate::sharedstring::SharedString;

macro_rules! header_collection {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            extra { $( $efield:ident : $ety:ty ),* }
            fields { $( $field:ident, $getter:ident, $setter:ident => $cname:ident; )+ }
        }
    ) => {
        $(#[$meta])*
        #[derive(Default)]
        pub struct $name {
            remain: HashMap<SharedString, SharedString>,
            $( $efield: $ety, )*
            $( $field: SharedString, )+
        }

        impl $name {
            fn fixed_field(&self, key: &[u8]) -> Option<&SharedString> {
                $(
                    if key.eq_ignore_ascii_case(constants::$cname.as_bytes()) {
                        return Some(&self.$field);
                    }
                )+
                None
            }

            fn fixed_field_mut(&mut self, key: &[u8]) -> Option<&mut SharedString> {
                $(
                    if key.eq_ignore_ascii_case(constants::$cname.as_bytes()) {
                        return Some(&mut self.$field);
                    }
                )+
                None
            }

            /// Set a header value.
            pub fn set_header(
                &mut self,
                key: impl Into<SharedString>,
                value: impl Into<SharedString>,
            ) {
                let key = key.into();
                let value = value.into();
                match self.fixed_field_mut(key.as_bytes()) {
                    Some(field) => *field = value,
                    None => {
                        self.remain.insert(key, value);
                    },
                }
            }

            /// Get a header value; empty when the header is absent.
            pub fn get_header(&self, key: &[u8]) -> SharedString {
                if let Some(field) = self.fixed_field(key) {
                    return field.share();
                }
                self.remain
                    .get(key)
                    .map(SharedString::share)
                    .unwrap_or_default()
            }

            /// Remove a header.
            pub fn remove_header(&mut self, key: &[u8]) {
                match self.fixed_field_mut(key) {
                    Some(field) => field.clear(),
                    None => {
                        self.remain.remove(key);
                    },
                }
            }

            /// Maximum count of headers, may be greater than actual count.
            pub fn max_size(&self) -> usize {
                let fixed = 0usize $( + { let _ = stringify!($field); 1 })+;
                fixed + self.remain.len()
            }

            /// Clear all headers in this collection.
            pub fn clear(&mut self) {
                self.remain.clear();
                $( self.$efield = <$ety>::default(); )*
                $( self.$field.clear(); )+
            }

            /// Visit every non-empty header as (name, value), fixed fields
            /// first in declaration order, then the remainder.
            pub fn for_each(&self, mut f: impl FnMut(&SharedString, &SharedString)) {
                $(
                    if !self.$field.is_empty() {
                        f(&constants::$cname, &self.$field);
                    }
                )+
                for (key, value) in &self.remain {
                    f(key, value);
                }
            }

            $(
                pub fn $getter(&self) -> &SharedString {
                    &self.$field
                }

                pub fn $setter(&mut self, value: impl Into<SharedString>) {
                    self.$field = value.into();
                }
            )+
        }
    };
}

header_collection! {
    /// Headers of a request, fast-path fields per the well known set sent
    /// by browsers.
    pub struct HttpRequestHeaders {
        extra { }
        fields {
            host, host, set_host => HOST;
            content_type, content_type, set_content_type => CONTENT_TYPE;
            content_length, content_length, set_content_length => CONTENT_LENGTH;
            connection, connection, set_connection => CONNECTION;
            pragma, pragma, set_pragma => PRAGMA;
            cache_control, cache_control, set_cache_control => CACHE_CONTROL;
            upgrade_insecure_requests, upgrade_insecure_requests,
                set_upgrade_insecure_requests => UPGRADE_INSECURE_REQUESTS;
            dnt, dnt, set_dnt => DNT;
            user_agent, user_agent, set_user_agent => USER_AGENT;
            accept, accept, set_accept => ACCEPT;
            accept_encoding, accept_encoding, set_accept_encoding => ACCEPT_ENCODING;
            accept_language, accept_language, set_accept_language => ACCEPT_LANGUAGE;
            cookie, cookie, set_cookie => COOKIE;
            x_requested_with, x_requested_with, set_x_requested_with => X_REQUESTED_WITH;
        }
    }
}

header_collection! {
    /// Headers of a response, fast-path fields per the set the server
    /// itself emits.
    pub struct HttpResponseHeaders {
        extra { additions: Vec<(SharedString, SharedString)> }
        fields {
            date, date, set_date => DATE;
            content_type, content_type, set_content_type => CONTENT_TYPE;
            content_length, content_length, set_content_length => CONTENT_LENGTH;
            content_encoding, content_encoding, set_content_encoding => CONTENT_ENCODING;
            transfer_encoding, transfer_encoding, set_transfer_encoding => TRANSFER_ENCODING;
            connection, connection, set_connection => CONNECTION;
            server, server, set_server => SERVER;
            vary, vary, set_vary => VARY;
            etag, etag, set_etag => ETAG;
            cache_control, cache_control, set_cache_control => CACHE_CONTROL;
            expires, expires, set_expires => EXPIRES;
            last_modified, last_modified, set_last_modified => LAST_MODIFIED;
            location, location, set_location => LOCATION;
        }
    }
}

impl HttpResponseHeaders {
    /// Append an addition header; unlike fixed fields the same name may
    /// repeat (`Set-Cookie` is the canonical case).
    pub fn add_addition_header(
        &mut self,
        key: impl Into<SharedString>,
        value: impl Into<SharedString>,
    ) {
        self.additions.push((key.into(), value.into()));
    }

    pub fn addition_headers(&self) -> &[(SharedString, SharedString)] {
        &self.additions
    }
}
