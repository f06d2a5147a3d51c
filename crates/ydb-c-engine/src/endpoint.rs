//!
//! Endpoint Parsing
//!
//! Accepted forms: `host:port`, `grpc://host:port`, `grpcs://host:port`.
//! IPv6 hosts go in brackets (`[::1]:2136`).
//!

use std::fmt;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid endpoint '{endpoint}': {reason}")]
pub struct EndpointError {
    pub endpoint: String,
    pub reason: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub secure: bool,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Self, EndpointError> {
        let invalid = |reason: &'static str| EndpointError {
            endpoint: text.to_string(),
            reason,
        };

        let (secure, rest) = if let Some(rest) = text.strip_prefix("grpcs://") {
            (true, rest)
        } else if let Some(rest) = text.strip_prefix("grpc://") {
            (false, rest)
        } else if text.contains("://") {
            return Err(invalid("unsupported scheme"));
        } else {
            (false, text)
        };

        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let (host, port) = rest.rsplit_once(':').ok_or_else(|| invalid("missing port"))?;
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(invalid("missing host"));
        }
        if host.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(invalid("malformed host"));
        }
        let port: u16 = port.parse().map_err(|_| invalid("port is not a number in 1..=65535"))?;
        if port == 0 {
            return Err(invalid("port is not a number in 1..=65535"));
        }

        Ok(Self {
            secure,
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = if self.secure { "grpcs" } else { "grpc" };
        if self.host.contains(':') {
            write!(f, "{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            write!(f, "{}://{}:{}", scheme, self.host, self.port)
        }
    }
}
