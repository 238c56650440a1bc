use anyhow::Context;
use clap::Subcommand;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::cli::utils::{output_document, read_input};
use crate::cli::OutputFormat;
use crate::site::{config_path, extend_framework_config, load_site_config};

#[derive(Subcommand)]
pub enum SiteCommands {
    #[command(about = "Print the base framework config with the site config applied")]
    Merge {
        #[arg(long, default_value = ".", help = "Site directory containing config.yaml")]
        dir: PathBuf,
        #[arg(long, help = "Base config file (YAML or JSON); empty object when omitted")]
        base: Option<PathBuf>,
    },

    #[command(about = "Show the parsed site config")]
    Show {
        #[arg(long, default_value = ".", help = "Site directory containing config.yaml")]
        dir: PathBuf,
    },
}

pub async fn handle(cmd: SiteCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SiteCommands::Merge { dir, base } => {
            let base: Value = match base {
                Some(path) => {
                    let raw = read_input(Some(path.as_path()))?;
                    serde_yaml::from_str(&raw).with_context(|| format!("invalid base config {}", path.display()))?
                }
                None => json!({}),
            };
            output_document(&output_format, &extend_framework_config(&dir, base))
        }
        SiteCommands::Show { dir } => {
            let site = load_site_config(&dir)
                .ok_or_else(|| anyhow::anyhow!("No readable site config at {}", config_path(&dir).display()))?;
            output_document(&output_format, &site)
        }
    }
}
