//! Flu CLI - Command line tool for flu surveillance snapshots and analytics.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "flu-cli",
    version,
    about = "Influenza surveillance data toolkit"
)]
struct Cli {
    #[command(subcommand)]
    command: flu_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    flu_cmd::run(cli.command).await
}
