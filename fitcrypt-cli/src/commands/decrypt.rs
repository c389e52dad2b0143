use anyhow::{Context as _, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use fitcrypt_core::{ClientCodec, RunReport, SummaryBreakdown, load_keys};

use super::Context;
use crate::files::{SummaryFile, read_json};
use crate::output::{print_field, print_info, print_json};

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Args)]
pub struct DecryptArgs {
    /// Results file from `fitcrypt compute`, or a summary from `fitcrypt add`
    pub input: PathBuf,
}

#[derive(Serialize)]
struct Output {
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RunReport>,
    summary: SummaryBreakdown,
}

pub async fn run(args: DecryptArgs, ctx: &Context) -> Result<()> {
    let file: SummaryFile = read_json(&args.input)?;

    let backend = ctx.create_backend()?;
    let bundle = load_keys(backend.as_ref(), &ctx.key_paths()?)
        .context("Failed to load keys; run `fitcrypt keys generate`")?;
    if file.key_id()? != bundle.key_id() {
        anyhow::bail!(
            "{} was encrypted under key {}, this install holds {}",
            args.input.display(),
            file.key_id,
            bundle.key_id()
        );
    }
    let codec = ClientCodec::new(backend.as_ref(), &bundle);

    let summary = codec.decrypt_wire(&file.summary).context("Failed to decrypt summary")?;
    let report = match (&file.stats, &file.ml_score) {
        (Some(stats), Some(ml_score)) => Some(RunReport::from_decrypted(
            &codec.decrypt_wire(stats).context("Failed to decrypt stats")?,
            &summary,
            &codec
                .decrypt_wire(ml_score)
                .context("Failed to decrypt movement score")?,
        )),
        _ => None,
    };
    let output = Output {
        report,
        summary: SummaryBreakdown::from_decrypted(&summary),
    };

    if ctx.json_output {
        print_json(&output)?;
    } else {
        print_pretty(&output);
    }
    Ok(())
}

fn print_pretty(output: &Output) {
    if let Some(report) = &output.report {
        println!("{}", "Run:".bold());
        print_field("Time", format!("{:.1} s", report.total_time_sec));
        print_field("Distance", format!("{:.2}", report.total_distance));
        if let Some(pace) = report.average_pace {
            print_field("Pace", format!("{pace:.2} s/unit"));
        }
        print_field(
            "Movement",
            format!("{:.1}%", report.movement_probability * 100.0),
        );
        if let (Some(year), Some(day)) = (report.year, report.day_of_year) {
            print_field("Date", format!("{year}, day {day}"));
        }
        print_field("Elevation gain", format!("{:.1}", report.elevation_gain));
        println!();
    } else {
        print_info("Summary only: no per-run statistics in this file");
    }

    println!("{}", "By weekday:".bold());
    for (name, (duration, distance)) in WEEKDAYS.iter().zip(&output.summary.by_day_of_week) {
        if *duration > 0.5 || *distance > 0.5 {
            print_field(name, format!("{duration:.1} s, {distance:.2} squared distance"));
        }
    }
}
