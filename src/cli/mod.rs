pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "canvas")]
#[command(about = "Page Canvas CLI - manage pages, build viewer data and merge site config")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Page operations against the configured provider")]
    Pages {
        #[command(subcommand)]
        cmd: commands::pages::PagesCommands,
    },

    #[command(about = "Static viewer build steps")]
    Viewer {
        #[command(subcommand)]
        cmd: commands::viewer::ViewerCommands,
    },

    #[command(about = "Site configuration")]
    Site {
        #[command(subcommand)]
        cmd: commands::site::SiteCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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
        Commands::Pages { cmd } => commands::pages::handle(cmd, output_format).await,
        Commands::Viewer { cmd } => commands::viewer::handle(cmd, output_format).await,
        Commands::Site { cmd } => commands::site::handle(cmd, output_format).await,
    }
}
