use anyhow::{Context as _, Result};
use clap::Subcommand;
use colored::Colorize;
use serde::Serialize;
use tracing::{debug, instrument};

use fitcrypt_core::{generate_keys, load_evaluation_keys, load_keys};
use fitcrypt_storage::publish as publish_keys;

use super::Context;
use crate::output::{print_field, print_json, print_success, print_warning};

#[derive(Subcommand)]
pub enum KeysCommand {
    /// Generate a fresh key bundle
    Generate {
        /// Replace an existing bundle; ciphertexts under it become unreadable
        #[arg(long)]
        force: bool,
    },
    /// Show the current key bundle
    Show,
    /// Copy the evaluation keys into the server key cache
    Publish,
}

pub async fn run(action: KeysCommand, ctx: &Context) -> Result<()> {
    match action {
        KeysCommand::Generate { force } => generate(force, ctx).await,
        KeysCommand::Show => show(ctx).await,
        KeysCommand::Publish => publish(ctx).await,
    }
}

#[derive(Serialize)]
struct KeysOutput {
    key_id: String,
    backend: String,
    slot_count: usize,
    key_dir: String,
}

#[instrument(skip(ctx))]
async fn generate(force: bool, ctx: &Context) -> Result<()> {
    let paths = ctx.key_paths()?;
    let existing = paths.all().iter().any(|(_, path)| path.exists());
    if existing && !force {
        anyhow::bail!(
            "A key bundle already exists in {}. Pass --force to replace it \
             (ciphertexts encrypted under it will be lost)",
            ctx.key_dir()?.display()
        );
    }

    let backend = ctx.create_backend()?;
    debug!("Backend initialized: {}", backend.name());
    let bundle = generate_keys(backend.as_ref(), &paths).context("Failed to generate keys")?;

    let output = KeysOutput {
        key_id: bundle.key_id().to_base58(),
        backend: backend.name().to_string(),
        slot_count: backend.params().slot_count(),
        key_dir: ctx.key_dir()?.display().to_string(),
    };
    if ctx.json_output {
        print_json(&output)?;
    } else {
        print_success(format!("Generated key bundle {}", output.key_id.bold()));
        print_field("Backend", &output.backend);
        print_field("Slots", output.slot_count);
        print_field("Directory", &output.key_dir);
        if existing {
            print_warning(
                "The previous bundle was replaced; its ciphertexts can no longer be decrypted",
            );
        }
    }
    Ok(())
}

async fn show(ctx: &Context) -> Result<()> {
    let backend = ctx.create_backend()?;
    let paths = ctx.key_paths()?;
    let key_dir = ctx.key_dir()?;
    let bundle = load_keys(backend.as_ref(), &paths).with_context(|| {
        format!(
            "No usable key bundle in {}; run `fitcrypt keys generate`",
            key_dir.display()
        )
    })?;

    let output = KeysOutput {
        key_id: bundle.key_id().to_base58(),
        backend: backend.name().to_string(),
        slot_count: backend.params().slot_count(),
        key_dir: key_dir.display().to_string(),
    };
    if ctx.json_output {
        print_json(&output)?;
    } else {
        println!("{}", "Key bundle:".bold());
        print_field("Key id", &output.key_id);
        print_field("Backend", &output.backend);
        print_field("Slots", output.slot_count);
        for (artifact, path) in paths.all() {
            print_field(artifact.label(), path.display());
        }
    }
    Ok(())
}

#[instrument(skip(ctx))]
async fn publish(ctx: &Context) -> Result<()> {
    let backend = ctx.create_backend()?;
    let keys = load_evaluation_keys(backend.as_ref(), &ctx.key_paths()?)
        .context("Failed to load evaluation keys; run `fitcrypt keys generate`")?;

    let cache = ctx.key_cache().await?;
    let key_id = publish_keys(&cache, &keys).await?;

    if ctx.json_output {
        #[derive(Serialize)]
        struct Output {
            key_id: String,
            cache_dir: String,
        }
        print_json(&Output {
            key_id: key_id.to_base58(),
            cache_dir: ctx.cache_dir()?.display().to_string(),
        })?;
    } else {
        print_success(format!("Published evaluation keys {}", key_id.to_base58().bold()));
        print_field("Cache", ctx.cache_dir()?.display());
    }
    Ok(())
}
