use crate::{
    address::{Resolve, SystemResolver},
    config::ServerConfig,
    protocol::Codec,
    session::Session,
};
use anyhow::{Result, bail};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Socks5Server represents a SOCKS5 server and houses related
/// configuration data
pub struct Socks5Server {
    pub config: ServerConfig,
    resolver: Arc<dyn Resolve>,
    listener: Option<TcpListener>,
}

/// Socks5Server implementation block
impl Socks5Server {
    /// new is a constructor for the Socks5Server type
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            resolver: Arc::new(SystemResolver),
            listener: None,
        }
    }

    /// with_resolver swaps the host name resolver used for domain requests
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = resolver;
        self
    }

    /// bind to the listen address, fails when called twice
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.listener.is_some() {
            bail!("[ERR] server is already bound");
        }

        // Instantiate tokio listener
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        let addr = listener.local_addr()?;

        info!("SOCKS5 proxy listening on {:?}", addr);

        self.listener = Some(listener);
        Ok(addr)
    }

    /// run listens for incoming connections and spawns a session for each
    pub async fn run(&mut self) -> Result<()> {
        let listener = match self.listener.take() {
            Some(listener) => listener,
            None => {
                self.bind().await?;
                match self.listener.take() {
                    Some(listener) => listener,
                    None => bail!("[ERR] listener missing after bind"),
                }
            }
        };

        let codec = Codec::new(self.config.version);

        loop {
            // Accept incoming connection
            let (inbound, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("accept error: {}", e);
                    continue;
                }
            };

            let session = Session::new(codec, Arc::clone(&self.resolver), peer_addr);

            // Spawn async task
            tokio::spawn(async move {
                info!("new client: {}", peer_addr);

                if let Err(e) = session.run(inbound).await {
                    error!("connection error: {}", e);
                }
            });
        }
    }
}
