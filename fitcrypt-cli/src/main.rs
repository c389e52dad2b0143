use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;
mod config;
mod files;
mod output;

#[derive(Parser)]
#[command(name = "fitcrypt")]
#[command(about = "Fitness statistics over homomorphically encrypted telemetry")]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(long, global = true)]
    json: bool,

    /// Directory holding this install's key bundle
    #[arg(long, global = true, env = "FITCRYPT_KEY_DIR")]
    key_dir: Option<PathBuf>,

    /// Server-side cache of published evaluation keys
    #[arg(long, global = true, env = "FITCRYPT_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Polynomial modulus degree: 4096 or 8192
    #[arg(long, global = true, env = "FITCRYPT_POLY_DEGREE")]
    poly_degree: Option<usize>,

    /// HE backend: "mock" (testing only), "seal" (not yet available)
    #[arg(long, global = true, env = "FITCRYPT_BACKEND")]
    backend: Option<String>,

    /// Enable debug instrumentation (timing, detailed logs)
    #[arg(long, global = true, env = "FITCRYPT_DEBUG")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the key bundle
    Keys {
        #[command(subcommand)]
        action: commands::keys::KeysCommand,
    },
    /// Pack and encrypt a recorded run
    Encrypt(commands::encrypt::EncryptArgs),
    /// Compute statistics over an encrypted run (server)
    Compute(commands::compute::ComputeArgs),
    /// Add two encrypted summaries (server)
    Add(commands::add::AddArgs),
    /// Decrypt results or summaries into a report
    Decrypt(commands::decrypt::DecryptArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fitcrypt=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fitcrypt=warn"))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(fmt::time::uptime())
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context {
        json_output: cli.json,
        key_dir_override: cli.key_dir,
        cache_dir_override: cli.cache_dir,
        poly_degree_override: cli.poly_degree,
        backend_override: cli.backend,
    };

    match cli.command {
        Commands::Keys { action } => commands::keys::run(action, &ctx).await,
        Commands::Encrypt(args) => commands::encrypt::run(args, &ctx).await,
        Commands::Compute(args) => commands::compute::run(args, &ctx).await,
        Commands::Add(args) => commands::add::run(args, &ctx).await,
        Commands::Decrypt(args) => commands::decrypt::run(args, &ctx).await,
        Commands::Config { action } => commands::config::run(action, &ctx).await,
    }
}
