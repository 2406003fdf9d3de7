use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use feedstash::app::AppContext;
use feedstash::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout only carries command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feedstash=info")))
        .init();

    let cli = Cli::parse();
    let ctx = AppContext::new()?;

    match cli.command {
        Commands::Fetch(args) => {
            commands::fetch_feed(&ctx, &args).await?;
        }
        Commands::Show(args) => {
            commands::show_items(&ctx, &args)?;
        }
        Commands::Partitions { target, from, to } => {
            commands::list_feed_partitions(&ctx, &target, from, to)?;
        }
        Commands::Serve { bind } => {
            commands::serve(&ctx, bind.as_deref()).await?;
        }
    }

    Ok(())
}
