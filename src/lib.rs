//! A lightweight SOCKS5 proxy library
//!
//! ## SOCKS5 Implementation
//!
//! - Features:
//!     - CONNECT
//!     - No Authentication (always selected)
//!     - IPv4, IPv6 and domain name targets, with a pluggable resolver
//!     - Full-duplex relay with half-close on each direction
//!     - Async using tokio, one task per client
//! - BIND and UDP ASSOCIATE are answered with "command not supported"
//! - [SOCKS5 (RFC 1928)](https://datatracker.ietf.org/doc/html/rfc1928)
//!
//! # Example
//! ```no_run
//! use minisocks::{ServerConfig, Socks5Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Socks5Server::new(ServerConfig::local(1081));
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod address;
pub mod commands;
pub mod config;
pub mod error;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod session;

// Re-export main types at crate root for convenience
pub use address::{Address, Endpoint, Resolve, SystemResolver};
pub use config::{DEFAULT_PORT, ServerConfig};
pub use error::SocksError;
pub use protocol::{AddressType, AuthMethod, Codec, Command, ReplyCode, Version};
pub use server::Socks5Server;
pub use session::{Phase, Session};
