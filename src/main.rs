//! plugbot - plugin-driven IRC bot.

use anyhow::Context;
use plugbot::{Client, Config, config, plugins};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "plugbot.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = config::validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        server = %config.server.address(),
        nick = %config.identity.nick,
        channel = %config.bot.channel,
        "Starting plugbot"
    );

    let plugin_config = config.plugins.clone();
    let client = Client::new(config)?;
    for (name, plugin) in plugins::from_config(&plugin_config) {
        client
            .load_plugin(name, plugin)
            .await
            .with_context(|| format!("loading plugin {name}"))?;
    }

    client.connect().await.context("connecting")?;

    let shutdown = client.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                if let Err(e) = shutdown.quit("Shutting down").await {
                    warn!(error = %e, "Quit failed");
                }
            }
            Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
        }
    });

    client.run_forever().await?;
    info!("plugbot stopped");
    Ok(())
}
