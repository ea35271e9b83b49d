use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_derive::Parser;
use tracing::Level;

use hextun::forward::{ForwardConfig, TcpForwarder};
use hextun::receiver::ReceiverEndpoint;
use hextun::transport::UdpTransport;

/// Remote end of the tunnel: observes inbound addressed packets, reassembles
/// the byte stream and forwards it to the destination service.
#[derive(Parser)]
struct Args {
    #[clap(long)]
    bind_address: String,

    #[clap(long)]
    listen_port: u16,

    #[clap(long)]
    target_host: String,

    #[clap(long)]
    target_port: u16,

    #[clap(long, default_value_t = 4)]
    max_workers: usize,

    /// attempts per chunk before giving up on the destination
    #[clap(long, default_value_t = 3)]
    max_forward_attempts: u32,

    /// seconds between forwarding attempts
    #[clap(long, default_value_t = 1)]
    forward_retry_delay: u64,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let transport = Arc::new(UdpTransport::bind(&args.bind_address, args.listen_port).await?);

    let forwarder = Arc::new(TcpForwarder::new(Arc::new(ForwardConfig {
        target_host: args.target_host,
        target_port: args.target_port,
        max_attempts: args.max_forward_attempts,
        retry_delay: Duration::from_secs(args.forward_retry_delay),
    })));

    let endpoint = Arc::new(ReceiverEndpoint::new(transport, forwarder, args.max_workers));
    endpoint.recv_loop().await
}
