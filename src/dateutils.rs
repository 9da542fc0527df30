//! RFC 7231 date formatting for http headers.

use std::cell::RefCell;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::sharedstring::SharedString;

/// Length of a formatted header time, e.g. `Thu, 01 Jan 1970 00:00:00 GMT`.
pub const HTTP_HEADER_TIME_LENGTH: usize = 29;

const HTTP_HEADER_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

thread_local! {
    // the Date header changes once a second; cache the last formatted value
    static LAST_FORMATTED: RefCell<(i64, SharedString)> =
        RefCell::new((i64::MIN, SharedString::new()));
}

/// Format a time for a http header. The result is always 29 bytes.
pub fn format_time_for_http_header(time: SystemTime) -> SharedString {
    let seconds = time
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    LAST_FORMATTED.with(|last| {
        let mut last = last.borrow_mut();
        if last.0 != seconds {
            let formatted = DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_secs(seconds as u64))
                .format(HTTP_HEADER_TIME_FORMAT)
                .to_string();
            *last = (seconds, SharedString::from(formatted));
        }
        last.1.share()
    })
}

/// Format the current time for a http header.
pub fn format_now_for_http_header() -> SharedString {
    format_time_for_http_header(SystemTime::now())
}

/// Parse a header time produced by [`format_time_for_http_header`].
pub fn parse_http_header_time(value: &[u8]) -> Option<SystemTime> {
    let text = std::str::from_utf8(value).ok()?;
    let parsed = NaiveDateTime::parse_from_str(text, HTTP_HEADER_TIME_FORMAT).ok()?;
    let seconds = parsed.and_utc().timestamp();
    if seconds < 0 {
        return None;
    }
    Some(UNIX_EPOCH + Duration::from_secs(seconds as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_formatting() {
        let s = format_time_for_http_header(UNIX_EPOCH);
        assert_eq!(s, "Thu, 01 Jan 1970 00:00:00 GMT");
        assert_eq!(s.len(), HTTP_HEADER_TIME_LENGTH);
    }

    #[test]
    fn test_length_is_always_29() {
        for seconds in [0u64, 1, 951827696, 4102444800] {
            let t = UNIX_EPOCH + Duration::from_secs(seconds);
            assert_eq!(
                format_time_for_http_header(t).len(),
                HTTP_HEADER_TIME_LENGTH
            );
        }
    }

    #[test]
    fn test_round_trip() {
        let t = UNIX_EPOCH + Duration::from_secs(951827696);
        let formatted = format_time_for_http_header(t);
        assert_eq!(parse_http_header_time(formatted.as_bytes()), Some(t));
    }

    #[test]
    fn test_same_second_reuses_cached_string() {
        let t = UNIX_EPOCH + Duration::from_secs(1234567890);
        let a = format_time_for_http_header(t);
        let b = format_time_for_http_header(t);
        assert_eq!(a.data_ptr(), b.data_ptr());
    }
}
