use clap::Parser;
use client::input::{InputDevice, ScriptedDevice, WanderDevice};
use client::network::Client;
use log::info;
use shared::NetConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Drive the actor with a wandering bot instead of staying idle
    #[arg(short = 'b', long)]
    bot: bool,

    /// Seed for the bot's input
    #[arg(long, default_value = "1")]
    seed: u64,

    /// Network tunables (JSON)
    #[arg(short = 'c', long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let net = match &args.config {
        Some(path) => NetConfig::load(path)?,
        None => NetConfig::default(),
    };

    let device: Box<dyn InputDevice + Send> = if args.bot {
        info!("Bot input, seed {}", args.seed);
        Box::new(WanderDevice::new(args.seed))
    } else {
        Box::new(ScriptedDevice::default())
    };

    info!("Connecting to: {}", args.server);

    let mut client = Client::new(&args.server, net, device, args.bot).await?;
    client.run().await?;

    Ok(())
}
