use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use fitcrypt_core::StatsCircuit;
use fitcrypt_storage::fetch;

use super::Context;
use crate::files::{SummaryFile, read_json, sibling, write_json};
use crate::output::{print_json, print_success};

#[derive(Args)]
pub struct AddArgs {
    /// First results or summary file
    pub a: PathBuf,
    /// Second results or summary file
    pub b: PathBuf,
    /// Output file [default: <a>.sum.json]
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: AddArgs, ctx: &Context) -> Result<()> {
    let a: SummaryFile = read_json(&args.a)?;
    let b: SummaryFile = read_json(&args.b)?;
    let key_id = a.key_id()?;
    if b.key_id()? != key_id {
        anyhow::bail!(
            "Summaries belong to different keys ({} and {})",
            a.key_id,
            b.key_id
        );
    }

    let backend = ctx.create_backend()?;
    let cache = ctx.key_cache().await?;
    let keys = fetch(&cache, backend.as_ref(), &key_id)
        .await
        .with_context(|| format!("No usable evaluation keys for {key_id}; run `fitcrypt keys publish`"))?;

    let mut circuit = StatsCircuit::new(backend, keys)?;
    let summary = circuit
        .add_ciphers_wire(&a.summary, &b.summary)
        .context("Adding summaries failed")?;

    let output_path = args.output.unwrap_or_else(|| sibling(&args.a, "sum"));
    write_json(
        &output_path,
        &SummaryFile {
            key_id: a.key_id.clone(),
            summary,
            stats: None,
            ml_score: None,
        },
    )?;

    if ctx.json_output {
        #[derive(Serialize)]
        struct Output {
            output: String,
            key_id: String,
        }
        print_json(&Output {
            output: output_path.display().to_string(),
            key_id: a.key_id,
        })?;
    } else {
        print_success(format!(
            "Added {} + {} → {}",
            args.a.display(),
            args.b.display(),
            output_path.display()
        ));
    }

    Ok(())
}
