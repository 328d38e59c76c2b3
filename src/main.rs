use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use saved_feed::cli::{commands, Cli, Commands};
use saved_feed::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.cache.database = Some(database);
    }

    match cli.command {
        Commands::Daemon {
            output,
            interval,
            listen,
        } => {
            if let Some(interval) = interval {
                config.cache.update_interval = interval;
            }
            if listen.is_some() {
                config.server.listen = listen;
            }
            config.validate()?;
            saved_feed::daemon::run(&config, output).await?;
        }
        Commands::Sync => {
            commands::sync_once(&config).await?;
        }
        Commands::Render { output } => {
            commands::render(&config, output.as_deref())?;
        }
        Commands::List => {
            commands::list_items(&config)?;
        }
    }

    Ok(())
}
