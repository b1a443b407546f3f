// payrecon CLI - marketplace sales vs. payments reconciliation

mod exit_codes;
mod inspect;
mod recon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use payrecon_config::Settings;
use tracing_subscriber::EnvFilter;

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use recon::ReconCommands;

#[derive(Parser)]
#[command(name = "payrecon")]
#[command(about = "Reconcile marketplace sales reports against settlement reports")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "PAYRECON_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the sheets and columns of a report file
    #[command(after_help = "\
Examples:
  payrecon inspect amazon_sales.csv
  payrecon inspect settlements.xlsx --sheet \"Order Payments\"
  payrecon inspect settlements.xlsx --json")]
    Inspect {
        /// CSV/TSV or spreadsheet file
        file: PathBuf,

        /// Read this sheet's header instead of the first sheet's
        #[arg(long)]
        sheet: Option<String>,

        /// Output JSON to stdout
        #[arg(long)]
        json: bool,
    },

    #[command(flatten)]
    Recon(ReconCommands),
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Logs go to stderr so `--json` output on stdout stays clean.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,payrecon={level},payrecon_io={level},payrecon_recon={level},payrecon_config={level}"
        ))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: Option<PathBuf>) -> Settings {
    match path {
        Some(path) => Settings::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default settings");
            Settings::default()
        }),
        None => Settings::load(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Inspect { file, sheet, json } => inspect::cmd_inspect(file, sheet, json),
        Commands::Recon(cmd) => recon::cmd_recon(cmd, load_settings(cli.settings)),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
