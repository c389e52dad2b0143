use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use fitcrypt_core::StatsCircuit;
use fitcrypt_storage::{fetch, key_id_from_base58};

use super::Context;
use crate::files::{EncryptedRunFile, ResultsFile, read_json, sibling, write_json};
use crate::output::{print_json, print_success};

#[derive(Args)]
pub struct ComputeArgs {
    /// Encrypted run produced by `fitcrypt encrypt`
    pub input: PathBuf,
    /// Output file [default: <run>.results.json]
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: ComputeArgs, ctx: &Context) -> Result<()> {
    let file: EncryptedRunFile = read_json(&args.input)?;
    let key_id = key_id_from_base58(&file.key_id)?;

    let backend = ctx.create_backend()?;
    let cache = ctx.key_cache().await?;
    let keys = fetch(&cache, backend.as_ref(), &key_id)
        .await
        .with_context(|| format!("No usable evaluation keys for {key_id}; run `fitcrypt keys publish`"))?;

    let mut circuit = StatsCircuit::new(backend, keys)?;
    let run = &file.run;
    let stats = circuit
        .compute_stats_wire(
            &run.position_xy,
            &run.position_zt,
            &run.summary_mask,
            &run.motion,
        )
        .context("Statistics circuit failed")?;
    info!(key_id = %key_id, "Statistics computed");

    let output_path = args.output.unwrap_or_else(|| sibling(&args.input, "results"));
    write_json(
        &output_path,
        &ResultsFile {
            key_id: file.key_id.clone(),
            stats,
        },
    )?;

    if ctx.json_output {
        #[derive(Serialize)]
        struct Output {
            input: String,
            output: String,
            key_id: String,
        }
        print_json(&Output {
            input: args.input.display().to_string(),
            output: output_path.display().to_string(),
            key_id: file.key_id,
        })?;
    } else {
        print_success(format!(
            "Computed statistics {} → {}",
            args.input.display(),
            output_path.display()
        ));
    }

    Ok(())
}
