//! `caseforge doc` - extract requirement text from an uploaded document.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use caseforge_core::{CaseError, CaseforgeConfig};
use caseforge_doc::{parse_document, substitute};
use caseforge_llm::ChatClient;

use crate::ui;

#[derive(Args, Debug)]
pub struct DocArgs {
    /// Requirement document (.docx or .txt)
    #[arg(value_name = "PATH")]
    input: PathBuf,

    /// Write the extracted text here instead of stdout
    #[arg(long = "out", value_name = "PATH")]
    output: Option<PathBuf>,

    /// Keep image placeholders instead of calling the vision model
    #[arg(long)]
    no_recognize: bool,
}

pub async fn run(args: DocArgs) -> Result<()> {
    let parsed = parse_document(&args.input)?;

    let text = if args.no_recognize || parsed.images.is_empty() {
        parsed.plain_text()
    } else {
        match recognition_config()? {
            Some(config) => {
                let client = ChatClient::new(
                    config.writer.clone(),
                    Duration::from_secs(config.generation.request_timeout_secs),
                )?;

                let pb = ui::spinner(format!("正在识别文档中的 {} 张图片...", parsed.images.len()));
                let text = substitute(&parsed, &client).await;
                ui::finish_success(pb, format!("图片识别完成，共 {} 张", parsed.images.len()));
                text
            }
            None => parsed.plain_text(),
        }
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("{}", path.display());
        }
        None => println!("{text}"),
    }

    Ok(())
}

/// A usable model config, or `None` when recognition should be skipped.
///
/// A missing or incomplete config degrades to the placeholder text rather
/// than failing the extraction; only a present-but-unreadable config file is
/// an error.
fn recognition_config() -> Result<Option<CaseforgeConfig>> {
    let config = match CaseforgeConfig::load() {
        Ok(config) => config,
        Err(CaseError::ConfigNotFound { .. }) => {
            warn!("no model configured, leaving image placeholders in place");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    if let Err(err) = config.validate_credentials() {
        warn!(%err, "model credentials incomplete, leaving image placeholders in place");
        return Ok(None);
    }

    Ok(Some(config))
}
