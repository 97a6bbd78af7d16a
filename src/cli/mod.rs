pub mod commands;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mike")]
#[command(about = "MIKE CLI - administer the carcass records server")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Replace the master password used for API login")]
    SetPassword {
        #[arg(help = "New master password")]
        password: String,
    },

    #[command(about = "Load site records from a JSON file")]
    Import {
        #[arg(help = "JSON file holding one record or an array of records")]
        file: PathBuf,
        #[arg(long, help = "Fail on existing keys instead of replacing them")]
        insert_only: bool,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::SetPassword { password } => commands::password::handle(&password, output_format).await,
        Commands::Import { file, insert_only } => {
            commands::import::handle(&file, insert_only, output_format).await
        }
    }
}
