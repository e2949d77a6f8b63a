//! Per-connection SOCKS5 state machine.
//!
//! A session moves strictly forward through
//! `Greeting -> RequestHeader -> Dialing -> Replying -> Relaying -> Closed`.
//! Every state owns the connection handles it needs, so a failed or
//! finished session has nothing left to close twice.

use crate::address::Resolve;
use crate::commands::{self, Connect, Request};
use crate::error::{Result, SocksError};
use crate::protocol::{AuthMethod, Codec, ReplyCode};
use std::{
    fmt,
    net::{Ipv4Addr, SocketAddr},
    sync::Arc,
};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
};
use tracing::{debug, info, warn};

/// Phase tags the current state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Greeting,
    RequestHeader,
    Dialing,
    Replying,
    Relaying,
    Closed,
}

impl Phase {
    /// may_reply is true while the client is waiting for a request reply
    /// that has not been sent yet
    fn may_reply(self) -> bool {
        matches!(self, Phase::RequestHeader | Phase::Dialing)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Greeting => "greeting",
            Phase::RequestHeader => "request header",
            Phase::Dialing => "dialing",
            Phase::Replying => "replying",
            Phase::Relaying => "relaying",
            Phase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// State is the value threaded through a session
pub enum State<S> {
    Greeting { client: S },
    RequestHeader { client: S },
    Dialing { client: S, request: Request },
    Replying { client: S, remote: TcpStream },
    Relaying { client: S, remote: TcpStream },
    Closed,
}

impl<S> State<S> {
    pub fn phase(&self) -> Phase {
        match self {
            State::Greeting { .. } => Phase::Greeting,
            State::RequestHeader { .. } => Phase::RequestHeader,
            State::Dialing { .. } => Phase::Dialing,
            State::Replying { .. } => Phase::Replying,
            State::Relaying { .. } => Phase::Relaying,
            State::Closed => Phase::Closed,
        }
    }
}

/// Session drives one client connection
pub struct Session {
    codec: Codec,
    resolver: Arc<dyn Resolve>,
    peer: SocketAddr,
}

/// Session implementation block
impl Session {
    pub fn new(codec: Codec, resolver: Arc<dyn Resolve>, peer: SocketAddr) -> Self {
        Self {
            codec,
            resolver,
            peer,
        }
    }

    /// run takes the client through every phase until the session is closed
    pub async fn run<S>(&self, client: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut state = State::Greeting { client };

        while state.phase() != Phase::Closed {
            state = self.step(state).await?;
        }

        info!("closing connection from {}", self.peer);
        Ok(())
    }

    /// step advances by exactly one phase. On error both connections have
    /// already been closed and the failure reply, if any, has been sent
    pub async fn step<S>(&self, state: State<S>) -> Result<State<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let phase = state.phase();

        match state {
            State::Greeting { mut client } => match self.greet(&mut client).await {
                Ok(()) => Ok(State::RequestHeader { client }),
                Err(e) => Err(self.abort(client, phase, e).await),
            },
            State::RequestHeader { mut client } => {
                match commands::read_request(&self.codec, &mut client).await {
                    Ok(request) => {
                        debug!("{} requested {}", self.peer, request);
                        Ok(State::Dialing { client, request })
                    }
                    Err(e) => Err(self.abort(client, phase, e).await),
                }
            }
            State::Dialing { client, request } => {
                match commands::handle_command(self.resolver.as_ref(), &request).await {
                    Ok(remote) => Ok(State::Replying { client, remote }),
                    Err(e) => Err(self.abort(client, phase, e).await),
                }
            }
            State::Replying { mut client, remote } => {
                let bound = self.bound_addr(&remote);
                match self.reply_success(&mut client, bound).await {
                    Ok(()) => Ok(State::Relaying { client, remote }),
                    Err(e) => {
                        drop(remote);
                        Err(self.abort(client, phase, e).await)
                    }
                }
            }
            State::Relaying { client, remote } => {
                let connect = Connect {
                    inbound: client,
                    outbound: remote,
                };
                connect.run().await?;
                Ok(State::Closed)
            }
            State::Closed => Ok(State::Closed),
        }
    }

    /// greet reads the client hello and always selects no authentication
    async fn greet<S>(&self, client: &mut S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let greeting = self.codec.decode_greeting(client).await?;
        debug!("{} offered methods {:?}", self.peer, greeting.methods);

        client
            .write_all(&self.codec.encode_method_selection(AuthMethod::NoAuth))
            .await?;
        Ok(())
    }

    /// bound_addr is the local address of the outbound connection, or
    /// 0.0.0.0:0 when the socket can no longer report it
    fn bound_addr(&self, remote: &TcpStream) -> SocketAddr {
        match remote.local_addr() {
            Ok(bound) => bound,
            Err(e) => {
                debug!("{}: no local address for outbound socket: {}", self.peer, e);
                SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
            }
        }
    }

    /// reply_success reports the bound address of the outbound connection
    async fn reply_success<S>(&self, client: &mut S, bound: SocketAddr) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        debug!("{} connected, bound to {}", self.peer, bound);

        client
            .write_all(&self.codec.encode_reply(ReplyCode::Succeeded, bound))
            .await?;
        Ok(())
    }

    /// abort sends a best-effort failure reply when the phase still allows
    /// one, closes the client and hands the error back
    async fn abort<S>(&self, mut client: S, phase: Phase, err: SocksError) -> SocksError
    where
        S: AsyncWrite + Unpin,
    {
        warn!("{} failed during {}: {}", self.peer, phase, err);

        if phase.may_reply() {
            if let Some(code) = err.reply_code() {
                let reply = self.codec.encode_failure_reply(code);
                if let Err(e) = client.write_all(&reply).await {
                    debug!("{}: could not send failure reply: {}", self.peer, e);
                }
            }
        }

        if let Err(e) = client.shutdown().await {
            debug!("{}: shutdown failed: {}", self.peer, e);
        }
        err
    }
}
