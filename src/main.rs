use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Multi-wallet trading automation for L2 ecosystems")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// Path to the accounts CSV file
    #[arg(long, default_value = "accounts.csv")]
    accounts: String,

    /// Verbose logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(if args.debug { "debug" } else { "info" })
        .init();

    drover::app::run(&args.config, &args.accounts).await
}
