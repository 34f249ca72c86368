use clap::Parser;
use gallery_api::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gallery_api=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port }) => {
            gallery_api::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Migrate { command }) => {
            gallery_api::cli::migrate::run(&cli.config, command).await?;
        }
        Some(Commands::User { command }) => {
            gallery_api::cli::user::run(&cli.config, command).await?;
        }
        Some(Commands::Album { command }) => {
            gallery_api::cli::container::run_album(&cli.config, command).await?;
        }
        Some(Commands::Category { command }) => {
            gallery_api::cli::container::run_category(&cli.config, command).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
