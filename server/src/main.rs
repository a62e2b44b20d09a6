use clap::Parser;
use log::info;
use server::network::Server;
use shared::{ControllerConfig, NetConfig};

#[derive(Parser)]
#[command(name = "server")]
#[command(about = "Authoritative host for the networked character controller")]
struct Args {
    /// Address to bind the UDP socket to
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Fixed simulation rate (ticks per second)
    #[arg(short, long, default_value = "50")]
    tick_rate: u32,

    /// Maximum number of connected peers
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Seconds of silence before a peer is dropped
    #[arg(long, default_value = "5")]
    timeout: u64,

    /// Controller tunables for spawned actors (JSON)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    let actor_config = match &args.config {
        Some(path) => ControllerConfig::load(path)?,
        None => ControllerConfig::default(),
    };
    let net = NetConfig {
        tick_hz: args.tick_rate,
        max_clients: args.max_clients,
        client_timeout_secs: args.timeout,
        ..NetConfig::default()
    };

    info!("Starting host on {} at {} Hz", args.bind, net.tick_hz);

    let mut server = Server::new(&args.bind, net, actor_config).await?;
    server.run().await?;

    Ok(())
}
