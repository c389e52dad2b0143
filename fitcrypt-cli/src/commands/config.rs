use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::Context;
use crate::config::Config;
use crate::output::print_success;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },
}

pub async fn run(action: ConfigCommand, ctx: &Context) -> Result<()> {
    match action {
        ConfigCommand::Show => show(ctx).await,
        ConfigCommand::Set { key, value } => set(key, value).await,
    }
}

async fn show(ctx: &Context) -> Result<()> {
    let config = Config::load()?;

    if ctx.json_output {
        #[derive(serde::Serialize)]
        struct Output {
            path: String,
            key_dir: String,
            cache_dir: String,
            poly_modulus_degree: usize,
            backend: String,
        }
        return crate::output::print_json(&Output {
            path: Config::config_path()?.display().to_string(),
            key_dir: ctx.key_dir()?.display().to_string(),
            cache_dir: ctx.cache_dir()?.display().to_string(),
            poly_modulus_degree: ctx.params()?.poly_modulus_degree(),
            backend: ctx.resolve_backend_id()?.to_string(),
        });
    }

    println!("{}", "Configuration:".bold());
    println!("  {}: {}", "file".dimmed(), Config::config_path()?.display());
    println!(
        "  {}: {}",
        "key_dir".dimmed(),
        config.key_dir.as_deref().unwrap_or("(default)")
    );
    println!("    {}", format!("In effect: {}", ctx.key_dir()?.display()).bright_black());
    println!(
        "  {}: {}",
        "cache_dir".dimmed(),
        config.cache_dir.as_deref().unwrap_or("(default)")
    );
    println!("    {}", format!("In effect: {}", ctx.cache_dir()?.display()).bright_black());
    println!(
        "  {}: {}",
        "poly_modulus_degree".dimmed(),
        config
            .poly_modulus_degree
            .map(|d| d.to_string())
            .unwrap_or_else(|| "(default 8192)".into())
    );
    println!("    {}", "Valid: 4096, 8192".bright_black());
    println!(
        "  {}: {}",
        "default_backend".dimmed(),
        config.default_backend.as_deref().unwrap_or("mock")
    );

    println!();
    println!("{}", "To set a value:".dimmed());
    println!("  fitcrypt config set <key> <value>");

    Ok(())
}

async fn set(key: String, value: String) -> Result<()> {
    let mut config = Config::load()?;

    match key.as_str() {
        "key_dir" => config.key_dir = Some(value.clone()),
        "cache_dir" => config.cache_dir = Some(value.clone()),
        "poly_modulus_degree" => {
            let degree: usize = value
                .parse()
                .map_err(|_| anyhow::anyhow!("poly_modulus_degree must be a number"))?;
            fitcrypt_core::EncryptionParams::new(degree)?;
            config.poly_modulus_degree = Some(degree);
        }
        "default_backend" => {
            value
                .parse::<fitcrypt_core::BackendId>()
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            config.default_backend = Some(value.clone());
        }
        _ => {
            anyhow::bail!(
                "Unknown config key '{key}'.\n\n\
                Valid keys:\n  \
                  key_dir              (e.g., ~/fitcrypt/keys)\n  \
                  cache_dir            (e.g., /srv/fitcrypt/cache)\n  \
                  poly_modulus_degree  (4096 or 8192)\n  \
                  default_backend      (mock)"
            );
        }
    }

    config.save()?;

    print_success(format!("Set {key} = {value}"));

    Ok(())
}
