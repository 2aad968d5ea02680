use clap::Parser;
use courier_core::CourierConfig;
use courier_server::cli::{Cli, Commands};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = Cli::parse().into_command();
    let mut cfg = CourierConfig::from_env()?;
    courier_core::o11y::init_tracing(cfg.log_format)?;

    match cmd {
        Commands::Serve {
            host,
            port,
            database_path,
        } => {
            if let Some(path) = database_path {
                cfg.store.database_path = path;
            }
            let addr: SocketAddr = format!("{host}:{port}").parse()?;
            let state = courier_server::backends::build_state(&cfg).await?;
            courier_server::server::serve(addr, state, cfg.refresh.drain_timeout).await?;
        }
        Commands::RefreshAll { database_path } => {
            if let Some(path) = database_path {
                cfg.store.database_path = path;
            }
            let state = courier_server::backends::build_state(&cfg).await?;
            let ack = state.refresher.refresh_all().await?;
            tracing::info!(
                batch_id = %ack.batch_id,
                scheduled = ack.scheduled,
                "waiting for refresh tasks"
            );
            state.refresher.drain().await;
            println!("{}", serde_json::to_string_pretty(&state.refresher.stats())?);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg.redacted())?);
        }
    }

    Ok(())
}
