// Axial CLI
// Expand and validate axis/matrix project definitions

mod commands;
mod logging;
mod output;

use clap::{ArgAction, Parser, Subcommand};
use color_eyre::Result;

use commands::expand::ExpandArgs;
use commands::validate::ValidateArgs;

#[derive(Parser, Debug)]
#[command(name = "axial", version, about = "Expand axis/matrix CI project definitions")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the build variants, tasks and dependency edges of a project
    Expand(ExpandArgs),

    /// Check that a project loads and expands cleanly
    Validate(ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init(cli.verbose)?;

    match cli.command {
        Command::Expand(args) => commands::expand::execute(args).await,
        Command::Validate(args) => commands::validate::execute(args).await,
    }
}
