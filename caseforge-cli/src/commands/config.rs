//! `caseforge config` - manage `~/.caseforge/config.toml`.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};

use caseforge_core::CaseforgeConfig;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a starter config file
    Init {
        /// Overwrite an existing config file
        #[arg(long, short)]
        force: bool,
    },
    /// Print the current configuration (credentials redacted)
    Show,
    /// Print the config file path
    Path,
    /// Set a single configuration value
    Set {
        /// Key, e.g. writer.model, reviewer.base_url, generation.max_turns
        key: String,
        value: String,
    },
    /// Check that the configuration loads and has credentials
    Validate,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Init { force } => run_init(force),
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => {
            println!("{}", CaseforgeConfig::config_path().display());
            Ok(())
        }
        ConfigCommands::Set { key, value } => run_set(&key, &value),
        ConfigCommands::Validate => run_validate(),
    }
}

fn run_init(force: bool) -> Result<()> {
    let path = CaseforgeConfig::config_path();
    if path.exists() && !force {
        bail!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    CaseforgeConfig::example().save()?;
    println!("Created config at {}", path.display());
    println!("Edit it to point at your model endpoints, or set the referenced environment variables.");
    Ok(())
}

fn run_show() -> Result<()> {
    let mut config = CaseforgeConfig::load()?;

    if !config.writer.api_key.is_empty() {
        config.writer.api_key = "<redacted>".to_owned();
    }
    if let Some(reviewer) = config.reviewer.as_mut() {
        if !reviewer.api_key.is_empty() {
            reviewer.api_key = "<redacted>".to_owned();
        }
    }

    print!(
        "{}",
        toml::to_string_pretty(&config).context("failed to render config")?
    );
    Ok(())
}

fn run_set(key: &str, value: &str) -> Result<()> {
    let mut config = CaseforgeConfig::load()?;

    match key {
        "writer.api_key" => config.writer.api_key = value.to_owned(),
        "writer.base_url" => config.writer.base_url = value.to_owned(),
        "writer.model" => config.writer.model = value.to_owned(),
        "writer.max_tokens" => config.writer.max_tokens = parse(key, value)?,
        "writer.temperature" => config.writer.temperature = parse(key, value)?,
        "writer.top_p" => config.writer.top_p = parse(key, value)?,
        "reviewer.api_key" | "reviewer.base_url" | "reviewer.model"
        | "reviewer.max_tokens" | "reviewer.temperature" | "reviewer.top_p" => {
            let Some(reviewer) = config.reviewer.as_mut() else {
                bail!("no [reviewer] section in the config; add one before setting {key}");
            };
            match key {
                "reviewer.api_key" => reviewer.api_key = value.to_owned(),
                "reviewer.base_url" => reviewer.base_url = value.to_owned(),
                "reviewer.model" => reviewer.model = value.to_owned(),
                "reviewer.max_tokens" => reviewer.max_tokens = parse(key, value)?,
                "reviewer.temperature" => reviewer.temperature = parse(key, value)?,
                _ => reviewer.top_p = parse(key, value)?,
            }
        }
        "generation.max_turns" => config.generation.max_turns = parse(key, value)?,
        "generation.sentinel" => config.generation.sentinel = value.to_owned(),
        "generation.request_timeout_secs" => {
            config.generation.request_timeout_secs = parse(key, value)?
        }
        _ => bail!("unknown config key: {key}"),
    }

    config.save()?;
    println!("Set {key}");
    Ok(())
}

fn run_validate() -> Result<()> {
    let config = CaseforgeConfig::load()?;
    config.validate_credentials()?;
    println!("Config OK: writer={}", config.writer.model);
    if let Some(reviewer) = &config.reviewer {
        println!("Reviewer: {}", reviewer.model);
    } else {
        println!("No reviewer configured; generation runs a single writer turn.");
    }
    Ok(())
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))
}
