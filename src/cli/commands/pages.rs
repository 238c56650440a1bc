use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::{output_document, output_empty_collection, output_success, read_input};
use crate::cli::OutputFormat;
use crate::model::{Page, VersionId};
use crate::provider::{source_provider, SharedProvider};

#[derive(Subcommand)]
pub enum PagesCommands {
    #[command(about = "List all pages")]
    List,

    #[command(about = "Show the current state of a page")]
    Show {
        #[arg(help = "Page name")]
        name: String,
    },

    #[command(about = "List prior versions of a page, newest first")]
    Versions {
        #[arg(help = "Page name")]
        name: String,
    },

    #[command(about = "Save a page from a YAML or JSON file (stdin when omitted)")]
    Save {
        #[arg(help = "Input file path, or - for stdin")]
        input: Option<PathBuf>,
    },

    #[command(about = "Delete a page and its history")]
    Delete {
        #[arg(help = "Page name")]
        name: String,
    },

    #[command(about = "Make a prior version current again")]
    Restore {
        #[arg(help = "Page name")]
        name: String,
        #[arg(help = "Version identifier")]
        version: String,
    },
}

pub async fn handle(cmd: PagesCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let provider = source_provider()?;
    execute(&provider, cmd, &output_format).await
}

async fn execute(provider: &SharedProvider, cmd: PagesCommands, output_format: &OutputFormat) -> anyhow::Result<()> {
    match cmd {
        PagesCommands::List => {
            let mut pages = provider.list_pages().await?;
            if pages.is_empty() {
                return output_empty_collection(output_format, "pages", "No pages found");
            }
            pages.sort_by(|a, b| a.metadata.name.cmp(&b.metadata.name));
            match output_format {
                OutputFormat::Json => output_document(output_format, &pages),
                OutputFormat::Text => {
                    for page in &pages {
                        println!("{}\t{}", page.name(), page.spec.title.as_deref().unwrap_or("-"));
                    }
                    Ok(())
                }
            }
        }
        PagesCommands::Show { name } => {
            let page = provider
                .get_page(&name)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Page '{}' not found", name))?;
            output_document(output_format, &page)
        }
        PagesCommands::Versions { name } => {
            let versions = provider.list_versions(&name).await?;
            if versions.is_empty() {
                return output_empty_collection(output_format, "versions", &format!("No versions of '{}'", name));
            }
            match output_format {
                OutputFormat::Json => output_document(output_format, &versions),
                OutputFormat::Text => {
                    for version in &versions {
                        println!("{}\t{}", version.version, version.timestamp);
                    }
                    Ok(())
                }
            }
        }
        PagesCommands::Save { input } => {
            let raw = read_input(input.as_deref())?;
            // YAML parser also accepts JSON input
            let page: Page = serde_yaml::from_str(&raw)?;
            let saved = provider.save_page(page).await?;
            output_success(
                output_format,
                &format!("Page '{}' saved", saved.name()),
                Some(json!({ "name": saved.name() })),
            )
        }
        PagesCommands::Delete { name } => {
            provider.delete_page(&name).await?;
            output_success(output_format, &format!("Page '{}' deleted", name), Some(json!({ "name": name })))
        }
        PagesCommands::Restore { name, version } => {
            let page = provider.restore_version(&name, &VersionId::new(version.clone())).await?;
            output_success(
                output_format,
                &format!("Page '{}' restored to version {}", page.name(), version),
                Some(json!({ "name": page.name(), "version": version })),
            )
        }
    }
}
