//! reactor-chat CLI entry point

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    reactor_chat::config::load_dotenv();

    // Logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = reactor_chat::cli::Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(reactor_chat::cli::run(cli))
}
