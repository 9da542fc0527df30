//! Http server configuration.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use crate::errors::{HttpError, HttpResult};
use crate::logging::LogLevel;
use crate::sharedstring::SharedString;

/// Configuration of a http server instance.
///
/// Built in place with the chained setters, then handed to
/// [`crate::server::HttpServer`]. Listeners are fixed for the server's
/// lifetime; there is no runtime reconfiguration.
pub struct HttpServerConfiguration {
    /// Addresses to listen on, `"ip:port"` or `":port"`.
    pub(crate) listen_addresses: Vec<String>,
    /// Pre-resolved listen addresses (port 0 allowed, for tests).
    pub(crate) listen_socket_addresses: Vec<SocketAddr>,
    /// Upper bound of request line + headers; beyond it the request is
    /// refused with 413.
    pub(crate) max_initial_request_bytes: usize,
    /// Upper bound of a single header line; beyond it the request is
    /// refused with 431.
    pub(crate) max_header_field_size: usize,
    /// How long a request may take to deliver its full header block
    /// before the connection is closed with 408.
    pub(crate) request_header_timeout: Duration,
    /// How long an idle keep-alive connection is kept before a silent
    /// close.
    pub(crate) keep_alive_idle_timeout: Duration,
    /// Size of each socket read.
    pub(crate) read_buffer_size: usize,
    /// Buffered response bytes beyond which writes start draining to the
    /// socket (and suspend until it drains).
    pub(crate) write_high_water_mark: usize,
    /// Listen backlog passed to the socket.
    pub(crate) listen_backlog: u32,
    /// Value of the `Server` header when handlers do not set one.
    pub(crate) server_header: SharedString,
    /// Level parsed from `logging.log_level`, if configured.
    pub(crate) log_level: Option<LogLevel>,
}

impl Default for HttpServerConfiguration {
    fn default() -> HttpServerConfiguration {
        HttpServerConfiguration {
            listen_addresses: Vec::new(),
            listen_socket_addresses: Vec::new(),
            max_initial_request_bytes: 524_288,
            max_header_field_size: 8_192,
            request_header_timeout: Duration::from_secs(60),
            keep_alive_idle_timeout: Duration::from_secs(60),
            read_buffer_size: 16_384,
            write_high_water_mark: 65_536,
            listen_backlog: 65_535,
            server_header: crate::constants::CPV_FRAMEWORK,
            log_level: None,
        }
    }
}

impl HttpServerConfiguration {
    pub fn new() -> HttpServerConfiguration {
        HttpServerConfiguration::default()
    }

    /// Add a listen address.
    pub fn listen(self, address: impl Into<String>) -> Self {
        let mut this = self;
        this.listen_addresses.push(address.into());
        this
    }

    /// Add an already resolved listen address.
    pub fn listen_on(self, address: SocketAddr) -> Self {
        let mut this = self;
        this.listen_socket_addresses.push(address);
        this
    }

    pub fn max_initial_request_bytes(self, bytes: usize) -> Self {
        let mut this = self;
        this.max_initial_request_bytes = bytes;
        this
    }

    pub fn max_header_field_size(self, bytes: usize) -> Self {
        let mut this = self;
        this.max_header_field_size = bytes;
        this
    }

    pub fn request_header_timeout(self, timeout: Duration) -> Self {
        let mut this = self;
        this.request_header_timeout = timeout;
        this
    }

    pub fn keep_alive_idle_timeout(self, timeout: Duration) -> Self {
        let mut this = self;
        this.keep_alive_idle_timeout = timeout;
        this
    }

    pub fn read_buffer_size(self, bytes: usize) -> Self {
        let mut this = self;
        this.read_buffer_size = bytes;
        this
    }

    pub fn write_high_water_mark(self, bytes: usize) -> Self {
        let mut this = self;
        this.write_high_water_mark = bytes;
        this
    }

    pub fn server_header(self, value: impl Into<SharedString>) -> Self {
        let mut this = self;
        this.server_header = value.into();
        this
    }

    /// Populate from the flat settings map of the configuration
    /// collaborator. Recognized keys: `httpd.listen_hostname`,
    /// `httpd.listen_port`, `logging.log_level`.
    pub fn from_settings(settings: &BTreeMap<String, String>) -> HttpResult<Self> {
        let mut config = HttpServerConfiguration::default();
        let hostname = settings
            .get("httpd.listen_hostname")
            .map(String::as_str)
            .unwrap_or("");
        if let Some(port) = settings.get("httpd.listen_port") {
            let address = format!("{}:{}", hostname, port);
            // validate eagerly so a bad setting fails at startup
            crate::netutils::parse_listen_address(&address)?;
            config.listen_addresses.push(address);
        } else if !hostname.is_empty() {
            return Err(HttpError::Format(
                "httpd.listen_hostname is set without httpd.listen_port".to_string(),
            ));
        }
        if let Some(level) = settings.get("logging.log_level") {
            config.log_level = Some(level.parse()?);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let config = HttpServerConfiguration::new()
            .listen("127.0.0.1:8000")
            .listen(":8001")
            .max_header_field_size(1024);
        assert_eq!(config.listen_addresses.len(), 2);
        assert_eq!(config.max_header_field_size, 1024);
        assert_eq!(config.server_header, "cpv-framework");
    }

    #[test]
    fn test_from_settings() {
        let mut settings = BTreeMap::new();
        settings.insert("httpd.listen_hostname".to_string(), "127.0.0.1".to_string());
        settings.insert("httpd.listen_port".to_string(), "8000".to_string());
        settings.insert("logging.log_level".to_string(), "Notice".to_string());
        let config = HttpServerConfiguration::from_settings(&settings).unwrap();
        assert_eq!(config.listen_addresses, vec!["127.0.0.1:8000".to_string()]);
        assert_eq!(config.log_level, Some(LogLevel::Notice));
    }

    #[test]
    fn test_from_settings_rejects_bad_values() {
        let mut settings = BTreeMap::new();
        settings.insert("httpd.listen_port".to_string(), "99999".to_string());
        assert!(HttpServerConfiguration::from_settings(&settings).is_err());

        let mut settings = BTreeMap::new();
        settings.insert("logging.log_level".to_string(), "Chatty".to_string());
        assert!(HttpServerConfiguration::from_settings(&settings).is_err());
    }
}
