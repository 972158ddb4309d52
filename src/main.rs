mod cli;
mod hotkey;

use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Listen => {
            if let Err(e) = hotkey::run(cli.display.as_deref()) {
                tracing::error!(error = %e, "listener failed");
                eprintln!("xigrab listen: {e}");
                std::process::exit(1);
            }
        }
        Command::Devices => {
            if let Err(e) = hotkey::list_devices(cli.display.as_deref()) {
                tracing::error!(error = %e, "device listing failed");
                eprintln!("xigrab devices: {e}");
                std::process::exit(1);
            }
        }
    }
}
