//! Listen address parsing.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::errors::{HttpError, HttpResult};

/// Parse a socket listen address of the form `"ip:port"` or `":port"`
/// (port alone listens on `0.0.0.0`). The port must be in `[1, 65535]`.
/// IPv6 addresses are not supported in this revision.
pub fn parse_listen_address(address: &str) -> HttpResult<SocketAddr> {
    let Some(index) = address.rfind(':') else {
        return Err(HttpError::Format(format!(
            "no ':' in listen address: {}",
            address
        )));
    };
    let (host, port) = (&address[..index], &address[index + 1..]);
    let ip = if host.is_empty() {
        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    } else {
        match host.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => {
                return Err(HttpError::NotImplemented(
                    "ipv6 address is unsupported for now",
                ));
            },
            Ok(ip) => ip,
            Err(_) if host.contains(':') => {
                return Err(HttpError::NotImplemented(
                    "ipv6 address is unsupported for now",
                ));
            },
            Err(_) => {
                return Err(HttpError::Format(format!(
                    "invalid listen ip address: {}",
                    address
                )));
            },
        }
    };
    let port = match port.parse::<u32>() {
        Ok(port) if (1..=0xffff).contains(&port) => port as u16,
        _ => {
            return Err(HttpError::Format(format!(
                "invalid listen port: {}",
                address
            )));
        },
    };
    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_and_port() {
        assert_eq!(
            parse_listen_address("127.0.0.1:8000").unwrap(),
            "127.0.0.1:8000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_port_only_means_any_host() {
        assert_eq!(
            parse_listen_address(":8000").unwrap(),
            "0.0.0.0:8000".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(
            parse_listen_address("8000"),
            Err(HttpError::Format(_))
        ));
        assert!(matches!(
            parse_listen_address("nonsense:8000"),
            Err(HttpError::Format(_))
        ));
        assert!(matches!(
            parse_listen_address("127.0.0.1:0"),
            Err(HttpError::Format(_))
        ));
        assert!(matches!(
            parse_listen_address("127.0.0.1:65536"),
            Err(HttpError::Format(_))
        ));
        assert!(matches!(
            parse_listen_address("127.0.0.1:x"),
            Err(HttpError::Format(_))
        ));
    }

    #[test]
    fn test_ipv6_is_not_implemented() {
        assert!(matches!(
            parse_listen_address("::1:8000"),
            Err(HttpError::NotImplemented(_))
        ));
        assert!(matches!(
            parse_listen_address("2001:db8::1:8000"),
            Err(HttpError::NotImplemented(_))
        ));
    }
}
