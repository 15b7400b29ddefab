use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "dcd")]
#[command(about = "DivCapture Desk CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum UnusedKeys {
    Warn,
    Fail,
}

impl From<UnusedKeys> for dcd_config::UnusedKeyPolicy {
    fn from(v: UnusedKeys) -> Self {
        match v {
            UnusedKeys::Warn => dcd_config::UnusedKeyPolicy::Warn,
            UnusedKeys::Fail => dcd_config::UnusedKeyPolicy::Fail,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Simulate the strategy once and write run artifacts
    Backtest {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Artifacts root; the run lands in <out>/<run_id>/
        #[arg(long, default_value = "exports")]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = UnusedKeys::Warn)]
        unused_keys: UnusedKeys,
    },

    /// Run every (days_after_dividend, days_before_earnings) pair in /sweep
    Sweep {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long, default_value = "exports")]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = UnusedKeys::Warn)]
        unused_keys: UnusedKeys,
    },

    /// Print the daily top-N by market cap as date,rank,ticker
    Rank {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long, value_enum, default_value_t = UnusedKeys::Warn)]
        unused_keys: UnusedKeys,
    },

    /// Print first/last/count of every series per ticker
    Coverage {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Download series from EODHD into a CSV data directory
    Fetch {
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        #[arg(long)]
        out_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let loaded = dcd_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Backtest {
            config_paths,
            out,
            unused_keys,
        } => {
            commands::backtest::run_backtest(&config_paths, &out, unused_keys.into()).await?;
        }

        Commands::Sweep {
            config_paths,
            out,
            unused_keys,
        } => {
            commands::backtest::run_sweep(&config_paths, &out, unused_keys.into()).await?;
        }

        Commands::Rank {
            config_paths,
            unused_keys,
        } => {
            commands::data::rank(&config_paths, unused_keys.into()).await?;
        }

        Commands::Coverage { config_paths } => {
            commands::data::coverage(&config_paths).await?;
        }

        Commands::Fetch {
            config_paths,
            out_dir,
        } => {
            commands::data::fetch(&config_paths, &out_dir).await?;
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays `key=value` only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
