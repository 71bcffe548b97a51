use anyhow::Result;
use clap::Parser;

use ldes::cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    dispatch(cli.command)
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Extract(args) => ldes::cli::extract::run(&args),
        Commands::Resolve {
            mention,
            class,
            config,
        } => ldes::cli::resolve::run(&mention, &class, config.as_deref()),
        Commands::Defaults => ldes::cli::defaults::run(),
    }
}
