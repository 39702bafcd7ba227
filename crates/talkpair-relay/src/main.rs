use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use talkpair_common::RelayError;
use talkpair_relay::{hub, serve, Coordinator};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "talkpair-relay", about = "Matchmaking and signaling relay for TalkPair")]
struct Args {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind (overrides the config file).
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> talkpair_common::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "talkpair_relay=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = talkpair_config::load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let addr = config.server.socket_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| RelayError::Bind {
            addr: addr.clone(),
            source,
        })?;

    tracing::info!("talkpair-relay listening on {}", addr);

    let (handle, _hub_task) = hub::spawn(Coordinator::new(config.limits.max_name_len));

    // Periodic occupancy log.
    let stats_hub = handle.clone();
    let interval = Duration::from_secs(config.stats.interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match stats_hub.stats().await {
                Ok(stats) => tracing::info!(
                    connections = stats.connections,
                    registered = stats.registered,
                    waiting = stats.waiting,
                    pairs = stats.pairs,
                    "Stats tick"
                ),
                Err(_) => break,
            }
        }
    });

    serve(listener, handle, config.limits.outbound_buffer).await;
    Ok(())
}
