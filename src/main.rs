//! cortex-fetch entry point
//!
//! Parses the command line, runs the selected command and turns failures
//! into a readable message and a non-zero exit status.
//!
//! - `install` - resolve dependencies, fetch snapshots, write the build plan
//! - `tree` - display the last resolution

use anyhow::Result;
use clap::Parser;
use cortex_fetch::cli;
use cortex_fetch::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            user_friendly_error(e).display();
            std::process::exit(1);
        }
    }
}
