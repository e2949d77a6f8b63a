use crate::protocol::Version;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default SOCKS5 listening port
pub const DEFAULT_PORT: u16 = 1081;

/// ServerConfig holds everything a Socks5Server needs before binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub version: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::local(DEFAULT_PORT)
    }
}

/// ServerConfig implementation block
impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            version: Version::SOCKS5 as u8,
        }
    }

    /// local listens on the loopback interface only
    pub fn local(port: u16) -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port))
    }

    /// global listens on all interfaces
    pub fn global(port: u16) -> Self {
        Self::new(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_loopback_on_1081() {
        let config = ServerConfig::default();
        assert_eq!(config.listen_addr, "127.0.0.1:1081".parse().unwrap());
        assert_eq!(config.version, 5);
    }

    #[test]
    fn global_binds_every_interface() {
        let config = ServerConfig::global(9050);
        assert_eq!(config.listen_addr, "0.0.0.0:9050".parse().unwrap());
    }
}
