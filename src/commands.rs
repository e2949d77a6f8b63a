use crate::address::{self, Address, Resolve};
use crate::error::{Result, SocksError};
use crate::protocol::{Codec, Command};
use crate::relay::relay;
use std::fmt;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tracing::{debug, info, warn};

/// Request is a fully read client request. The command stays raw until
/// it is routed so unknown values can still be answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: u8,
    pub address: Address,
    pub port: u16,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cmd=0x{:02x} {}:{}",
            self.command, self.address, self.port
        )
    }
}

/// read_request reads a complete request: header, destination address and port
pub async fn read_request<S>(codec: &Codec, stream: &mut S) -> Result<Request>
where
    S: AsyncRead + Unpin,
{
    let header = codec.decode_request_header(stream).await?;
    let address = codec.decode_address(header.address_type, stream).await?;
    let port = codec.decode_port(stream).await?;

    Ok(Request {
        command: header.command,
        address,
        port,
    })
}

/// handle_command routes a request to its command handler. Only CONNECT
/// is served; it returns the freshly dialed outbound stream
pub async fn handle_command(resolver: &dyn Resolve, request: &Request) -> Result<TcpStream> {
    match Command::from_byte(request.command) {
        Some(Command::Connect) => handle_connect_cmd(resolver, request).await,
        Some(Command::Bind) => {
            warn!("BIND not supported");
            Err(SocksError::UnsupportedCommand(request.command))
        }
        Some(Command::UdpAssociate) => {
            warn!("UDP ASSOCIATE not supported");
            Err(SocksError::UnsupportedCommand(request.command))
        }
        None => {
            warn!("unknown command 0x{:02x}", request.command);
            Err(SocksError::UnsupportedCommand(request.command))
        }
    }
}

// ================
// CONNECT COMMAND
// ================

/// handle_connect_cmd resolves the target and opens the outbound connection
async fn handle_connect_cmd(resolver: &dyn Resolve, request: &Request) -> Result<TcpStream> {
    let endpoint = address::resolve(resolver, &request.address, request.port).await?;

    debug!(
        "dialing {} ({:?} -> {:?}) for {}",
        endpoint.addr,
        request.address.address_type(),
        endpoint.address_type(),
        request
    );

    TcpStream::connect(endpoint.addr)
        .await
        .map_err(|source| SocksError::Dial {
            target: endpoint.addr,
            source,
        })
}

/// Connect holds both ends of an established CONNECT session
pub struct Connect<S> {
    pub inbound: S,
    pub outbound: TcpStream,
}

/// Connect implementation block
impl<S> Connect<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// run relays between the streams until both sides are done
    pub async fn run(self) -> Result<()> {
        let (from_client, from_server) = relay(self.inbound, self.outbound).await?;

        info!(
            "connection closed: {} bytes from client, {} bytes from server",
            from_client, from_server
        );

        Ok(())
    }
}
