use anyhow::{Context, Result};
use clap::Parser;
use minisocks::{DEFAULT_PORT, ServerConfig, Socks5Server};
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "A lightweight SOCKS5 proxy", long_about = None)]
struct Args {
    /// Listener port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Listen on all interfaces instead of loopback
    #[arg(short, long)]
    global: bool,

    /// Explicit listener address, overrides --port and --global
    #[arg(short, long)]
    listen: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse args
    let args = Args::parse();

    // Initialize tracing subscriber
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match args.listen {
        Some(listen) => {
            let addr: SocketAddr = listen
                .parse()
                .with_context(|| format!("[ERR] invalid listen address: {listen}"))?;
            ServerConfig::new(addr)
        }
        None if args.global => ServerConfig::global(args.port),
        None => ServerConfig::local(args.port),
    };

    // Instantiate server
    let mut server = Socks5Server::new(config);

    // Run it
    info!("Starting SOCKS5 proxy: {}", server.config.listen_addr);
    server.run().await
}
