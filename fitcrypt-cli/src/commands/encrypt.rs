use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use fitcrypt_core::{ClientCodec, RunRecording, load_keys};

use super::Context;
use crate::files::{EncryptedRunFile, read_json, sibling, write_json};
use crate::output::{print_field, print_json, print_success};

#[derive(Args)]
pub struct EncryptArgs {
    /// Recorded run (JSON)
    pub run: PathBuf,
    /// Output file [default: <run>.enc.json]
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

pub async fn run(args: EncryptArgs, ctx: &Context) -> Result<()> {
    let recording: RunRecording = read_json(&args.run)?;

    let backend = ctx.create_backend()?;
    let bundle = load_keys(backend.as_ref(), &ctx.key_paths()?)
        .context("Failed to load keys; run `fitcrypt keys generate`")?;
    let codec = ClientCodec::new(backend.as_ref(), &bundle);

    let frames = recording
        .pack(codec.slot_count())
        .context("Run does not fit the circuit layout")?;
    debug!(samples = recording.timestamps.len(), "Run packed");
    let wire = frames.encrypt_to_wire(&codec).context("Encryption failed")?;

    let output_path = args.output.unwrap_or_else(|| sibling(&args.run, "enc"));
    let file = EncryptedRunFile {
        key_id: bundle.key_id().to_base58(),
        run: wire,
    };
    write_json(&output_path, &file)?;

    if ctx.json_output {
        #[derive(Serialize)]
        struct Output {
            input: String,
            output: String,
            key_id: String,
            samples: usize,
        }
        print_json(&Output {
            input: args.run.display().to_string(),
            output: output_path.display().to_string(),
            key_id: file.key_id,
            samples: recording.timestamps.len(),
        })?;
    } else {
        print_success(format!(
            "Encrypted {} → {}",
            args.run.display(),
            output_path.display()
        ));
        print_field("Samples", recording.timestamps.len());
        print_field("Key id", &file.key_id);
    }

    Ok(())
}
