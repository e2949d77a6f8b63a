use crate::address::Address;
use crate::error::{Result, SocksError};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt};

// RSV: Fields marked RESERVED (RSV) must be set to X'00'.
pub const RSV: u8 = 0x00;

/// AddressType represents the SOCKS5 address types:
/// IPv4, Domain Name, IPv6
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    IPv4 = 0x01,
    DomainName = 0x03,
    IPv6 = 0x04,
}

/// AddressType implementation block
impl AddressType {
    /// from_byte converts a byte to its related network address type
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(AddressType::IPv4),
            0x03 => Some(AddressType::DomainName),
            0x04 => Some(AddressType::IPv6),
            _ => None,
        }
    }
}

/// Version represents available SOCKS proxy versions.
/// Only SOCKS5 is spoken here
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    SOCKS5 = 0x05,
}

/// AuthMethod represents available SOCKS5
/// authentication methods
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth = 0x00,
    // 0x01 GSSAPI and 0x02 username/password are never selected
    // 0x03 - 0x7f: IANA reserved
    // 0x80 - 0xFE: private methods
    NoAcceptable = 0xFF,
}

/// Command represents SOCKS5 protocol commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

/// Command implementation block
impl Command {
    /// from_byte converts a byte to its related SOCKS5 protocol command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Command::Connect),
            0x02 => Some(Command::Bind),
            0x03 => Some(Command::UdpAssociate),
            _ => None,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Succeeded = 0x00,
    ServerFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TtlExpired = 0x06,
    CommandNotSupported = 0x07,
    AddrTypeUnsupported = 0x08,
    // 0x09 - 0xFF: unassigned
}

/// Greeting is the client hello: version and the offered auth methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    pub version: u8,
    pub methods: Vec<u8>,
}

/// RequestHeader is the fixed 4 byte prefix of a client request.
/// Command and address type are kept raw so unknown values can be
/// reported back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub command: u8,
    pub address_type: u8,
}

/// Codec reads and writes SOCKS5 frames for one protocol version
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    version: u8,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(Version::SOCKS5 as u8)
    }
}

/// Codec implementation block
impl Codec {
    pub fn new(version: u8) -> Self {
        Self { version }
    }

    fn ensure_version(&self, got: u8) -> Result<()> {
        if got != self.version {
            return Err(SocksError::InvalidVersion {
                expected: self.version,
                got,
            });
        }
        Ok(())
    }

    /// decode_greeting reads the client hello
    pub async fn decode_greeting<R>(&self, reader: &mut R) -> Result<Greeting>
    where
        R: AsyncRead + Unpin,
    {
        // ClientHello format
        // +----+----------+----------+
        // |VER | NMETHODS | METHODS  |
        // +----+----------+----------+
        // | 1  |    1     | 1 to 255 |
        // +----+----------+----------+
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf).await?;

        let version = buf[0];
        let n_methods = buf[1];

        self.ensure_version(version)?;

        if n_methods == 0 {
            return Err(SocksError::InvalidMethodCount);
        }

        let mut methods = vec![0u8; n_methods as usize];
        reader.read_exact(&mut methods).await?;

        Ok(Greeting { version, methods })
    }

    /// encode_method_selection builds the server choice frame
    pub fn encode_method_selection(&self, method: AuthMethod) -> [u8; 2] {
        // +----+--------+
        // |VER | METHOD |
        // +----+--------+
        // | 1  |   1    |
        // +----+--------+
        [self.version, method as u8]
    }

    /// decode_request_header reads VER, CMD, RSV and ATYP
    pub async fn decode_request_header<R>(&self, reader: &mut R) -> Result<RequestHeader>
    where
        R: AsyncRead + Unpin,
    {
        // SOCKS5 request format
        // +----+-----+-------+------+----------+----------+
        // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
        // +----+-----+-------+------+----------+----------+
        // | 1  |  1  | X'00' |  1   | Variable |    2     |
        // +----+-----+-------+------+----------+----------+
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).await?;

        self.ensure_version(buf[0])?;
        // RSV is ignored

        Ok(RequestHeader {
            command: buf[1],
            address_type: buf[3],
        })
    }

    /// decode_address reads DST.ADDR for the given address type byte
    pub async fn decode_address<R>(&self, address_type: u8, reader: &mut R) -> Result<Address>
    where
        R: AsyncRead + Unpin,
    {
        match AddressType::from_byte(address_type) {
            Some(AddressType::IPv4) => {
                let mut addr = [0u8; 4];
                reader.read_exact(&mut addr).await?;
                Ok(Address::IPv4(Ipv4Addr::from(addr)))
            }
            Some(AddressType::DomainName) => {
                // First octet contains the number of octets to follow
                let mut len = [0u8; 1];
                reader.read_exact(&mut len).await?;

                let mut domain = vec![0u8; len[0] as usize];
                reader.read_exact(&mut domain).await?;
                Ok(Address::DomainName(String::from_utf8(domain)?))
            }
            Some(AddressType::IPv6) => {
                let mut addr = [0u8; 16];
                reader.read_exact(&mut addr).await?;
                Ok(Address::IPv6(Ipv6Addr::from(addr)))
            }
            None => Err(SocksError::UnsupportedAddressType(address_type)),
        }
    }

    /// decode_port reads DST.PORT in network order
    pub async fn decode_port<R>(&self, reader: &mut R) -> Result<u16>
    where
        R: AsyncRead + Unpin,
    {
        let mut port_buf = [0u8; 2];
        reader.read_exact(&mut port_buf).await?;
        Ok(u16::from_be_bytes(port_buf))
    }

    /// encode_reply builds a reply frame carrying the given bound address
    pub fn encode_reply(&self, reply_code: ReplyCode, bound_addr: SocketAddr) -> Vec<u8> {
        // SOCKS5 reply format
        // +----+-----+-------+------+----------+----------+
        // |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
        // +----+-----+-------+------+----------+----------+
        // | 1  |  1  | X'00' |  1   | Variable |    2     |
        // +----+-----+-------+------+----------+----------+
        let mut reply = vec![self.version, reply_code as u8, RSV];

        match bound_addr {
            SocketAddr::V4(addr) => {
                reply.push(AddressType::IPv4 as u8);
                reply.extend_from_slice(&addr.ip().octets());
                reply.extend_from_slice(&addr.port().to_be_bytes());
            }
            SocketAddr::V6(addr) => {
                reply.push(AddressType::IPv6 as u8);
                reply.extend_from_slice(&addr.ip().octets());
                reply.extend_from_slice(&addr.port().to_be_bytes());
            }
        }

        reply
    }

    /// encode_failure_reply builds a reply with the unspecified 0.0.0.0:0 bound address
    pub fn encode_failure_reply(&self, reply_code: ReplyCode) -> Vec<u8> {
        self.encode_reply(reply_code, SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greeting_accepts_any_method_count_in_range() {
        let codec = Codec::default();

        for n in [1u8, 2, 128, 255] {
            let mut frame = vec![0x05, n];
            frame.extend(std::iter::repeat_n(0x02, n as usize));

            let greeting = codec.decode_greeting(&mut frame.as_slice()).await.unwrap();
            assert_eq!(greeting.version, 5);
            assert_eq!(greeting.methods.len(), n as usize);
        }

        assert_eq!(codec.encode_method_selection(AuthMethod::NoAuth), [0x05, 0x00]);
    }

    #[tokio::test]
    async fn greeting_with_zero_methods_is_rejected() {
        let codec = Codec::default();
        let err = codec
            .decode_greeting(&mut [0x05u8, 0x00].as_slice())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::InvalidMethodCount));
    }

    #[tokio::test]
    async fn greeting_with_wrong_version_is_rejected() {
        let codec = Codec::default();
        let err = codec
            .decode_greeting(&mut [0x04u8, 0x01, 0x00].as_slice())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SocksError::InvalidVersion {
                expected: 5,
                got: 4
            }
        ));
    }

    #[tokio::test]
    async fn truncated_greeting_is_a_connection_error() {
        let codec = Codec::default();
        let err = codec
            .decode_greeting(&mut [0x05u8, 0x03, 0x00].as_slice())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::Io(_)));
    }

    #[tokio::test]
    async fn request_header_ignores_reserved_byte() {
        let codec = Codec::default();
        let header = codec
            .decode_request_header(&mut [0x05u8, 0x01, 0xAB, 0x03].as_slice())
            .await
            .unwrap();
        assert_eq!(
            header,
            RequestHeader {
                command: 0x01,
                address_type: 0x03
            }
        );

        let err = codec
            .decode_request_header(&mut [0x04u8, 0x01, 0x00, 0x01].as_slice())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::InvalidVersion { .. }));
    }

    #[tokio::test]
    async fn decodes_each_address_type() {
        let codec = Codec::default();

        let addr = codec
            .decode_address(0x01, &mut [10u8, 0, 0, 1].as_slice())
            .await
            .unwrap();
        assert_eq!(addr, Address::IPv4(Ipv4Addr::new(10, 0, 0, 1)));

        let mut domain = vec![11u8];
        domain.extend_from_slice(b"example.com");
        let addr = codec
            .decode_address(0x03, &mut domain.as_slice())
            .await
            .unwrap();
        assert_eq!(addr, Address::DomainName("example.com".into()));

        let v6 = Ipv6Addr::LOCALHOST.octets();
        let addr = codec.decode_address(0x04, &mut v6.as_slice()).await.unwrap();
        assert_eq!(addr, Address::IPv6(Ipv6Addr::LOCALHOST));

        let err = codec
            .decode_address(0x05, &mut [0u8; 4].as_slice())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::UnsupportedAddressType(0x05)));
    }

    #[tokio::test]
    async fn non_utf8_domain_is_rejected() {
        let codec = Codec::default();
        let err = codec
            .decode_address(0x03, &mut [2u8, 0xff, 0xfe].as_slice())
            .await
            .unwrap_err();
        assert!(matches!(err, SocksError::InvalidDomain(_)));
    }

    #[tokio::test]
    async fn reply_body_decodes_back_to_bound_address() {
        let codec = Codec::default();
        let reply = codec.encode_reply(ReplyCode::Succeeded, "127.0.0.1:8080".parse().unwrap());

        assert_eq!(&reply[..4], &[0x05, 0x00, 0x00, 0x01]);

        let mut body = &reply[4..];
        let addr = codec.decode_address(reply[3], &mut body).await.unwrap();
        let port = codec.decode_port(&mut body).await.unwrap();

        assert_eq!(addr, Address::IPv4(Ipv4Addr::LOCALHOST));
        assert_eq!(port, 8080);
        assert!(body.is_empty());
    }

    #[test]
    fn failure_reply_uses_unspecified_ipv4() {
        let codec = Codec::default();
        assert_eq!(
            codec.encode_failure_reply(ReplyCode::CommandNotSupported),
            vec![0x05, 0x07, 0x00, 0x01, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn ipv6_reply_carries_sixteen_address_bytes() {
        let codec = Codec::default();
        let reply = codec.encode_reply(ReplyCode::Succeeded, "[::1]:443".parse().unwrap());
        assert_eq!(reply.len(), 4 + 16 + 2);
        assert_eq!(reply[3], AddressType::IPv6 as u8);
        assert_eq!(&reply[20..], &443u16.to_be_bytes());
    }
}
