use std::fmt;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// TCP endpoint of the control channel.
///
/// The peer connects to this address and the host bridge listens on it.
/// Serialised as its `tcp://host:port` text so file, environment, and
/// command-line layers share one representation.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "String", into = "String")]
pub struct PeerEndpoint {
    host: String,
    port: u16,
}

impl PeerEndpoint {
    /// Builds a TCP endpoint.
    #[must_use]
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Host name or address literal.
    #[must_use]
    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    /// TCP port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Resolves the endpoint to the first usable socket address.
    ///
    /// # Errors
    ///
    /// Returns the resolver error, or `AddrNotAvailable` when the host
    /// resolves to no addresses.
    pub fn resolve(&self) -> io::Result<SocketAddr> {
        let mut addrs = (self.host.as_str(), self.port).to_socket_addrs()?;
        addrs
            .find(|addr| matches!(addr, SocketAddr::V4(_) | SocketAddr::V6(_)))
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no resolved addresses"))
    }
}

impl fmt::Display for PeerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tcp://{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(input)?;
        if url.scheme() != "tcp" {
            return Err(EndpointParseError::UnsupportedScheme(
                url.scheme().to_owned(),
            ));
        }
        let host = url
            .host_str()
            .ok_or_else(|| EndpointParseError::MissingHost(input.to_owned()))?;
        let port = url
            .port()
            .ok_or_else(|| EndpointParseError::MissingPort(input.to_owned()))?;
        Ok(Self::tcp(host, port))
    }
}

impl TryFrom<String> for PeerEndpoint {
    type Error = EndpointParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PeerEndpoint> for String {
    fn from(endpoint: PeerEndpoint) -> Self {
        endpoint.to_string()
    }
}

/// Errors encountered while parsing a [`PeerEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Scheme was not `tcp`.
    #[error("unsupported endpoint scheme '{0}'")]
    UnsupportedScheme(String),
    /// Host name was missing.
    #[error("missing TCP host in '{0}'")]
    MissingHost(String),
    /// Port was missing from the address.
    #[error("missing TCP port in '{0}'")]
    MissingPort(String),
    /// URL failed to parse.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_parse() {
        let endpoint = PeerEndpoint::tcp("localhost", 12346);
        assert_eq!(endpoint.to_string(), "tcp://localhost:12346");
        let parsed: PeerEndpoint = endpoint.to_string().parse().expect("parse endpoint");
        assert_eq!(parsed, endpoint);
    }

    #[test]
    fn rejects_unix_scheme() {
        let error = "unix:///tmp/spray.sock"
            .parse::<PeerEndpoint>()
            .expect_err("unix endpoints are not supported");
        assert!(matches!(error, EndpointParseError::UnsupportedScheme(_)));
    }

    #[test]
    fn rejects_missing_port() {
        let error = "tcp://127.0.0.1"
            .parse::<PeerEndpoint>()
            .expect_err("port is required");
        assert!(matches!(error, EndpointParseError::MissingPort(_)));
    }

    #[test]
    fn resolves_loopback_literal() {
        let endpoint = PeerEndpoint::tcp("127.0.0.1", 4100);
        let addr = endpoint.resolve().expect("resolve loopback");
        assert_eq!(addr.port(), 4100);
        assert!(addr.ip().is_loopback());
    }
}
