//! caseforge - Two-model test-case generation from requirement descriptions
//!
//! A writer model drafts test cases as a markdown pipe table, a reviewer
//! model critiques them until it approves, and the approved table is
//! projected to markdown and xlsx files.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod tracing_setup;
mod ui;

use commands::config::ConfigArgs;
use commands::doc::DocArgs;
use commands::generate::GenerateArgs;

#[derive(Parser, Debug)]
#[command(name = "caseforge")]
#[command(about = "Generate reviewed test cases from requirement descriptions")]
#[command(version)]
struct Cli {
    /// Suppress progress indicators (useful for scripting/piping)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate test cases from a requirement description
    Generate(GenerateArgs),
    /// Extract text from a requirement document, describing embedded images
    Doc(DocArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present, before anything reads credentials
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_setup::init(cli.debug).ok();
    ui::init_quiet_mode(cli.quiet);

    match cli.command {
        Commands::Generate(args) => commands::generate::run(args).await,
        Commands::Doc(args) => commands::doc::run(args).await,
        Commands::Config(args) => commands::config::run(args),
    }
}
