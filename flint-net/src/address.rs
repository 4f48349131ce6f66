//! Node endpoint addresses

use flint_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// Network endpoint of a cluster node: a host name or IP literal plus a TCP port.
///
/// Construction validates both parts, so an `Address` always has a non-empty
/// host and a port in `1..=65535`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    host: String,
    port: u16,
}

impl Address {
    /// Create a new address
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        let host = host.into().trim().to_string();
        if host.is_empty() {
            return Err(Error::InvalidArgument("Address host cannot be empty".to_string()));
        }
        // brackets only appear in the `[v6]:port` text form, never in a host
        if host.contains(|c: char| c == '[' || c == ']') {
            return Err(Error::InvalidArgument(format!("Invalid host: {}", host)));
        }
        if port == 0 {
            return Err(Error::InvalidArgument(format!(
                "Invalid port 0 for host {}",
                host
            )));
        }
        Ok(Self { host, port })
    }

    /// Create an address from a port number wider than `u16`, rejecting values
    /// outside the TCP range
    pub fn with_port(host: impl Into<String>, port: i64) -> Result<Self> {
        let port = u16::try_from(port)
            .map_err(|_| Error::InvalidArgument(format!("Port {} is out of range", port)))?;
        Self::new(host, port)
    }

    /// Host name or IP literal
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Check if the host is an IP literal rather than a name
    pub fn is_ip(&self) -> bool {
        self.host.parse::<IpAddr>().is_ok()
    }

    /// Form accepted by `tokio::net::TcpStream::connect`
    pub fn to_connect_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let invalid = || Error::InvalidArgument(format!("Invalid address: {}", s));

        let (host, port) = if let Some(rest) = s.strip_prefix('[') {
            // [v6]:port
            let (host, rest) = rest.split_once(']').ok_or_else(invalid)?;
            let port = rest.strip_prefix(':').ok_or_else(invalid)?;
            (host, port)
        } else {
            let (host, port) = s.rsplit_once(':').ok_or_else(invalid)?;
            if host.contains(':') {
                return Err(invalid());
            }
            (host, port)
        };

        let port: u16 = port.parse().map_err(|_| invalid())?;
        Self::new(host, port)
    }
}

impl TryFrom<String> for Address {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl TryFrom<SocketAddr> for Address {
    type Error = Error;

    fn try_from(addr: SocketAddr) -> Result<Self> {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Parse a list of `host:port` strings
pub fn parse_addresses<I, S>(items: I) -> Result<Vec<Address>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items.into_iter().map(|s| s.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_address_validation() {
        assert!(Address::new("", 3344).is_err());
        assert!(Address::new("   ", 3344).is_err());
        assert!(Address::new("localhost", 0).is_err());
        assert!(Address::with_port("localhost", 65536).is_err());
        assert!(Address::with_port("localhost", -1).is_err());

        assert!(Address::new("[::1]", 3344).is_err());

        let padded = Address::new(" node-a ", 3344).unwrap();
        assert_eq!(padded.host(), "node-a");
        assert_eq!(padded, Address::new("node-a", 3344).unwrap());

        let addr = Address::new("localhost", 3344).unwrap();
        assert_eq!(addr.host(), "localhost");
        assert_eq!(addr.port(), 3344);
        assert!(!addr.is_ip());
    }

    #[test]
    fn test_address_parsing() {
        let addr: Address = "127.0.0.1:3345".parse().unwrap();
        assert_eq!(addr.host(), "127.0.0.1");
        assert_eq!(addr.port(), 3345);
        assert!(addr.is_ip());

        let v6: Address = "[::1]:10800".parse().unwrap();
        assert_eq!(v6.host(), "::1");
        assert_eq!(v6.to_string(), "[::1]:10800");

        assert!("localhost".parse::<Address>().is_err());
        assert!("localhost:abc".parse::<Address>().is_err());
        assert!("::1:10800".parse::<Address>().is_err());
        assert!(":3344".parse::<Address>().is_err());
        assert!("a]:1".parse::<Address>().is_err());
        assert!("[a:1".parse::<Address>().is_err());
        assert!("[[::1]]:1".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_serde_uses_string_form() {
        let addr = Address::new("node.example", 3344).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"node.example:3344\"");

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<Address>("\"node.example:0\"").is_err());
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(host in "[a-z][a-z0-9.-]{0,20}", port in 1u16..=u16::MAX) {
            let addr = Address::new(host, port).unwrap();
            let parsed: Address = addr.to_string().parse().unwrap();
            prop_assert_eq!(parsed, addr);
        }

        #[test]
        fn prop_parsed_port_always_valid(s in "\\PC{0,30}") {
            if let Ok(addr) = s.parse::<Address>() {
                prop_assert!(addr.port() >= 1);
                prop_assert!(!addr.host().is_empty());
                prop_assert_eq!(addr.host(), addr.host().trim());
                prop_assert!(!addr.host().contains(|c: char| c == '[' || c == ']'));
            }
        }
    }
}
