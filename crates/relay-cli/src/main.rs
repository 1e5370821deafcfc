use anyhow::Result;
use relay_cli::{Cli, Commands, Parser};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.tracing_level())
        .with_writer(std::io::stderr)
        .init();

    let db = cli.open_database()?;

    match cli.command {
        Commands::Session { subcommand } => subcommand.run(&db),
        Commands::Action { subcommand } => subcommand.run(&db).await,
        Commands::Handoff { subcommand } => subcommand.run(&db),
    }
}
