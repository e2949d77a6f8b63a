use crate::error::{Result, SocksError};
use crate::protocol::AddressType;
use async_trait::async_trait;
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tracing::debug;

/// Address represents a network address or domain to be used as the
/// SOCKS5 target address
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    IPv4(Ipv4Addr),
    DomainName(String),
    IPv6(Ipv6Addr),
}

impl Address {
    pub fn address_type(&self) -> AddressType {
        match self {
            Address::IPv4(_) => AddressType::IPv4,
            Address::DomainName(_) => AddressType::DomainName,
            Address::IPv6(_) => AddressType::IPv6,
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::IPv4(ip) => write!(f, "{ip}"),
            Address::DomainName(domain) => write!(f, "{domain}"),
            Address::IPv6(ip) => write!(f, "[{ip}]"),
        }
    }
}

/// Endpoint is the concrete socket address a request resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub addr: SocketAddr,
}

impl Endpoint {
    /// address_type is the normalized type: domain names become IPv4 or
    /// IPv6 depending on what the lookup returned
    pub fn address_type(&self) -> AddressType {
        match self.addr {
            SocketAddr::V4(_) => AddressType::IPv4,
            SocketAddr::V6(_) => AddressType::IPv6,
        }
    }
}

/// Resolve looks up the IP addresses of a host name
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// SystemResolver resolves through the operating system via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 0)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// resolve turns a requested address and port into a dialable endpoint.
/// IP addresses are used as-is, domain names go through the resolver and
/// the first returned address wins
pub async fn resolve(resolver: &dyn Resolve, address: &Address, port: u16) -> Result<Endpoint> {
    let ip = match address {
        Address::IPv4(ip) => IpAddr::V4(*ip),
        Address::IPv6(ip) => IpAddr::V6(*ip),
        Address::DomainName(host) => {
            let ips = resolver
                .lookup(host)
                .await
                .map_err(|source| SocksError::Resolve {
                    host: host.clone(),
                    source,
                })?;

            let ip = ips
                .first()
                .copied()
                .ok_or_else(|| SocksError::NoAddresses { host: host.clone() })?;

            debug!("resolved {host} to {ip} ({} candidates)", ips.len());
            ip
        }
    };

    Ok(Endpoint {
        addr: SocketAddr::new(ip, port),
    })
}
