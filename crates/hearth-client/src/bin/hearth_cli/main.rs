//! hearth-cli: command-line client for the Hearth API.

mod args;
mod error;
mod handlers;
mod io;
mod print;

#[cfg(test)]
mod tests;

use clap::Parser;

use args::{Cli, Commands};
use error::CliError;
use handlers::build_client;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let mut client = build_client(&cli)?;

    match cli.command {
        Commands::Session(cmd) => handlers::session(&mut client, cmd.action).await?,
        Commands::Feed => handlers::feed(&client).await?,
        Commands::Me => handlers::me(&client).await?,
        Commands::Posts(cmd) => handlers::posts(&client, cmd.action).await?,
        Commands::Moderation(cmd) => handlers::moderation(&client, cmd.action).await?,
        Commands::Users(cmd) => handlers::users(&client, cmd.action).await?,
        Commands::Friends(cmd) => handlers::friends(&client, cmd.action).await?,
        Commands::Follow(cmd) => handlers::follow(&client, cmd.action).await?,
        Commands::Health => handlers::health(&client).await?,
    }

    Ok(())
}
