use clap::Subcommand;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::viewer::{build, BuildOptions};

#[derive(Subcommand)]
pub enum ViewerCommands {
    #[command(about = "Fetch pages and write pages-data.json and routes.json")]
    Build {
        #[arg(long, env = "NUXT_PUBLIC_API_BASE_URL", help = "API base URL, e.g. https://editor.example.com/api")]
        api_base_url: Option<String>,
        #[arg(long, default_value = ".generated", help = "Output directory")]
        out_dir: PathBuf,
        #[arg(long, env = "PAGE_CANVAS_TOKEN", help = "Bearer token for the pages API")]
        token: Option<String>,
    },
}

pub async fn handle(cmd: ViewerCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        ViewerCommands::Build {
            api_base_url,
            out_dir,
            token,
        } => {
            let summary = build(&BuildOptions {
                api_base_url,
                token,
                out_dir,
            })
            .await?;
            output_success(
                &output_format,
                &format!(
                    "Wrote {} pages and {} routes to {}",
                    summary.pages,
                    summary.routes,
                    summary.out_dir.display()
                ),
                Some(json!({ "build": summary })),
            )
        }
    }
}
