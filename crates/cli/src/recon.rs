//! `payrecon run` / `payrecon validate`: job-driven reconciliation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Subcommand;
use payrecon_config::Settings;
use payrecon_recon::config::{parse_tolerance, MarketplaceJob};
use payrecon_recon::{
    format, Marketplace, ReconError, ReconJob, ReconOptions, ReconResult, ReconSession, ReportRole,
    ReportTables, ValidationIssue,
};
use serde::Serialize;

use crate::exit_codes::{
    recon_exit_code, EXIT_FILE_READ, EXIT_RECON_DISCREPANCIES, EXIT_RECON_INCOMPLETE,
    EXIT_RECON_RUNTIME,
};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Reconcile the marketplaces of a TOML job file
    #[command(after_help = "\
Examples:
  payrecon run october.job.toml
  payrecon run october.job.toml --marketplace amazon --json
  payrecon run october.job.toml --tolerance 0.50 --strict
  payrecon run october.job.toml --export variance.xlsx")]
    Run {
        /// Path to the job file
        job: PathBuf,

        /// Only this marketplace (table key or label)
        #[arg(long)]
        marketplace: Option<String>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the variance report (.xlsx workbook or .csv discrepancy table)
        #[arg(long)]
        export: Option<PathBuf>,

        /// Override the tolerance amount, e.g. 0.50
        #[arg(long)]
        tolerance: Option<String>,

        /// Abort a marketplace that takes longer than this
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Exit non-zero when any discrepancy is found
        #[arg(long)]
        strict: bool,
    },

    /// Load a job's files and check every mapping without reconciling
    #[command(after_help = "\
Examples:
  payrecon validate october.job.toml")]
    Validate {
        /// Path to the job file
        job: PathBuf,
    },
}

pub fn cmd_recon(cmd: ReconCommands, settings: Settings) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { job, marketplace, json, output, export, tolerance, timeout_ms, strict } => {
            let overrides = Overrides { tolerance, timeout_ms };
            let outputs = Outputs { json, output, export };
            cmd_run(job, marketplace, overrides, outputs, strict, &settings)
        }
        ReconCommands::Validate { job } => cmd_validate(job, &settings),
    }
}

struct Overrides {
    tolerance: Option<String>,
    timeout_ms: Option<u64>,
}

struct Outputs {
    json: bool,
    output: Option<PathBuf>,
    export: Option<PathBuf>,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    job: &'a str,
    session_id: String,
    results: &'a [ReconResult],
}

fn recon_err(e: ReconError) -> CliError {
    let code = recon_exit_code(&e);
    let hint = match &e {
        ReconError::Validation(_) => Some("run `payrecon validate <job>` to list every mapping issue"),
        ReconError::MissingColumn { .. } => Some("run `payrecon inspect <file>` to see the available columns"),
        ReconError::TimedOut { .. } => Some("raise timeout_ms in the job or pass --timeout-ms"),
        _ => None,
    };
    let err = CliError::new(code, e.to_string());
    match hint {
        Some(h) => err.with_hint(h),
        None => err,
    }
}

fn runtime_err(msg: impl Into<String>) -> CliError {
    CliError::new(EXIT_RECON_RUNTIME, msg)
}

/// Read and validate the job; returns it with the directory its paths are relative to.
fn load_job(path: &Path) -> Result<(ReconJob, PathBuf), CliError> {
    let input = std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_FILE_READ, format!("cannot read job {}: {e}", path.display())))?;
    let job = ReconJob::from_toml(&input).map_err(recon_err)?;
    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((job, base_dir))
}

/// Settings defaults, then the job, then command-line flags.
fn resolve_options(job: &ReconJob, settings: &Settings, overrides: &Overrides) -> Result<ReconOptions, CliError> {
    let tolerance_minor = parse_tolerance(&settings.recon.tolerance).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring tolerance from settings");
        0
    });
    let defaults = ReconOptions {
        tolerance_minor,
        timeout: settings.recon.timeout_ms.map(Duration::from_millis),
    };
    let mut options = job.options_or(defaults).map_err(recon_err)?;

    if let Some(raw) = &overrides.tolerance {
        options.tolerance_minor =
            parse_tolerance(raw).map_err(|e| CliError::usage(format!("--tolerance: {e}")))?;
    }
    if let Some(ms) = overrides.timeout_ms {
        if ms == 0 {
            return Err(CliError::usage("--timeout-ms must be positive"));
        }
        options.timeout = Some(Duration::from_millis(ms));
    }
    Ok(options)
}

/// Marketplaces to run: the one asked for, or all of them with the
/// settings' preferred order first.
fn select<'a>(
    job: &'a ReconJob,
    only: Option<&str>,
    settings: &Settings,
) -> Result<Vec<(Marketplace, &'a MarketplaceJob)>, CliError> {
    if let Some(name) = only {
        let (key, mj) = job.find(name).ok_or_else(|| {
            let known: Vec<&str> = job.marketplaces.keys().map(String::as_str).collect();
            CliError::usage(format!("marketplace '{name}' is not in job '{}'", job.name))
                .with_hint(format!("available: {}", known.join(", ")))
        })?;
        return Ok(vec![(mj.marketplace(key), mj)]);
    }

    let mut all: Vec<(Marketplace, &MarketplaceJob)> =
        job.marketplaces.iter().map(|(key, mj)| (mj.marketplace(key), mj)).collect();
    let rank = |m: &Marketplace| {
        settings
            .marketplaces
            .iter()
            .position(|p| p.eq_ignore_ascii_case(m.as_str()))
            .unwrap_or(usize::MAX)
    };
    all.sort_by_key(|(m, _)| rank(m));
    Ok(all)
}

fn cmd_run(
    job_path: PathBuf,
    only: Option<String>,
    overrides: Overrides,
    outputs: Outputs,
    strict: bool,
    settings: &Settings,
) -> Result<(), CliError> {
    let (job, base_dir) = load_job(&job_path)?;
    let options = resolve_options(&job, settings, &overrides)?;
    let selected = select(&job, only.as_deref(), settings)?;

    let mut session = ReconSession::new();
    let mut results = Vec::with_capacity(selected.len());
    for (marketplace, mj) in &selected {
        mj.apply(marketplace, &mut session, &base_dir).map_err(recon_err)?;
        let result = session.reconcile(marketplace, &options).map_err(recon_err)?;
        results.push(result);
    }
    tracing::info!(
        job = %job.name,
        session = %session.id(),
        marketplaces = results.len(),
        cache_hits = session.cache_stats().hits,
        "job complete"
    );

    // Output
    if outputs.json || outputs.output.is_some() {
        let payload = RunOutput {
            job: &job.name,
            session_id: session.id().to_string(),
            results: &results,
        };
        let json_str = serde_json::to_string_pretty(&payload)
            .map_err(|e| runtime_err(format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = outputs.output {
            std::fs::write(path, &json_str)
                .map_err(|e| runtime_err(format!("cannot write output: {e}")))?;
            eprintln!("wrote {}", path.display());
        }
        if outputs.json {
            println!("{json_str}");
        }
    }

    if let Some(ref target) = outputs.export {
        let multiple = results.len() > 1;
        for result in &results {
            let path = export_path(target, &result.meta.marketplace, multiple, settings);
            let tables = format(result).to_tables();
            payrecon_io::export(&tables.sheets(), ReportTables::PRIMARY, &path)
                .map_err(|e| runtime_err(e.to_string()))?;
            eprintln!("wrote {}", path.display());
        }
    }

    // Human summary to stderr
    if !outputs.json {
        for result in &results {
            eprint!("{}", format(result).render_text());
        }
    }

    let discrepancies: usize = results.iter().map(|r| r.summary.discrepancies).sum();
    if strict && discrepancies > 0 {
        return Err(CliError::new(
            EXIT_RECON_DISCREPANCIES,
            format!("{discrepancies} discrepancy(ies) found"),
        ));
    }
    Ok(())
}

/// `--export out` gets the configured default extension; several
/// marketplaces get one file each, suffixed with the marketplace name.
fn export_path(target: &Path, marketplace: &Marketplace, multiple: bool, settings: &Settings) -> PathBuf {
    let ext = target
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| settings.export.format.extension().to_string());
    if !multiple {
        return target.with_extension(ext);
    }
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "variance".into());
    let slug: String = marketplace
        .as_str()
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    target.with_file_name(format!("{stem}-{slug}.{ext}"))
}

fn cmd_validate(job_path: PathBuf, settings: &Settings) -> Result<(), CliError> {
    let (job, base_dir) = load_job(&job_path)?;
    let selected = select(&job, None, settings)?;

    let mut session = ReconSession::new();
    for (marketplace, mj) in &selected {
        mj.apply(marketplace, &mut session, &base_dir).map_err(recon_err)?;
    }

    let issues: Vec<ValidationIssue> = selected.iter().flat_map(|(m, _)| session.issues(m)).collect();
    if !issues.is_empty() {
        for issue in &issues {
            eprintln!("  {issue}");
        }
        return Err(CliError::new(
            EXIT_RECON_INCOMPLETE,
            format!("{} mapping issue(s)", issues.len()),
        )
        .with_hint("name the missing columns in the job file"));
    }

    for (marketplace, _) in &selected {
        let mapping = |role| session.mapping(marketplace, role);
        let sheets: Vec<String> = ReportRole::ALL
            .iter()
            .filter_map(|&r| mapping(r).and_then(|m| m.active_sheet().map(|s| format!("{}={s}", r))))
            .collect();
        eprintln!("  {marketplace}: {}", sheets.join(", "));
    }
    eprintln!(
        "valid: job '{}' with {} marketplace(s)",
        job.name,
        selected.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_path_single_keeps_name() {
        let s = Settings::default();
        let p = export_path(Path::new("out/variance.csv"), &"Amazon".into(), false, &s);
        assert_eq!(p, PathBuf::from("out/variance.csv"));
    }

    #[test]
    fn export_path_defaults_extension_from_settings() {
        let s = Settings::default();
        let p = export_path(Path::new("variance"), &"Amazon".into(), false, &s);
        assert_eq!(p, PathBuf::from("variance.xlsx"));
    }

    #[test]
    fn export_path_per_marketplace() {
        let s = Settings::default();
        let p = export_path(Path::new("variance.xlsx"), &"Flip Kart".into(), true, &s);
        assert_eq!(p, PathBuf::from("variance-flip-kart.xlsx"));
    }
}
