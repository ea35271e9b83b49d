use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_derive::Parser;
use tracing::Level;

use hextun::send_tracker::SendTrackerConfig;
use hextun::sender::{SenderConfig, SenderEndpoint};
use hextun::transport::UdpTransport;

/// Local end of the tunnel: accepts stream connections and emits their bytes
/// as address-encoded frames towards the remote peer.
#[derive(Parser)]
struct Args {
    #[clap(long)]
    bind_address: String,

    #[clap(long)]
    listen_port: u16,

    #[clap(long)]
    remote_address: String,

    #[clap(long)]
    remote_port: u16,

    /// seconds before the first retransmission of a NACK'ed frame
    #[clap(long, default_value_t = 1)]
    initial_retransmission_delay: u64,

    /// upper bound in seconds for the retransmission backoff
    #[clap(long, default_value_t = 16)]
    retransmission_ceiling: u64,

    /// milliseconds between consecutive frames of one local connection
    #[clap(long, default_value_t = 100)]
    frame_interval: u64,

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

    let transport = Arc::new(UdpTransport::bind("::", 0).await?);

    let endpoint = SenderEndpoint::new(
        Arc::new(SenderConfig {
            remote_addr: args.remote_address,
            remote_port: args.remote_port,
            frame_interval: Duration::from_millis(args.frame_interval),
        }),
        Arc::new(SendTrackerConfig {
            initial_retransmission_delay: Duration::from_secs(args.initial_retransmission_delay),
            retransmission_ceiling: Duration::from_secs(args.retransmission_ceiling),
        }),
        transport,
    );

    endpoint.run(&args.bind_address, args.listen_port).await
}
