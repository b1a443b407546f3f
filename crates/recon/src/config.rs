use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use payrecon_io::{IoError, SpreadsheetHandle};
use serde::Deserialize;

use crate::amount::parse_minor;
use crate::engine::ReconOptions;
use crate::error::ReconError;
use crate::model::{BindingRole, Marketplace, ReportRole};
use crate::session::ReconSession;

// ---------------------------------------------------------------------------
// Top-level job
// ---------------------------------------------------------------------------

/// A reconciliation job: which files to load per marketplace and how their
/// columns map. File paths are relative to the job file.
#[derive(Debug, Deserialize)]
pub struct ReconJob {
    pub name: String,
    /// Falls back to the caller's default when absent.
    #[serde(default)]
    pub tolerance: Option<ToleranceConfig>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    pub marketplaces: BTreeMap<String, MarketplaceJob>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketplaceJob {
    /// Display name; the table key when absent.
    #[serde(default)]
    pub label: Option<String>,
    pub sales: ReportSource,
    pub previous_payments: ReportSource,
    pub upcoming_payments: ReportSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportSource {
    pub file: String,
    /// Defaults to the first sheet.
    #[serde(default)]
    pub sheet: Option<String>,
    pub order_id: String,
    /// Falls back to the column recognized from the header when absent.
    #[serde(default)]
    pub amount: Option<String>,
}

// ---------------------------------------------------------------------------
// Tolerance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ToleranceConfig {
    /// Decimal amount, e.g. "0.50". Strictly greater differences are reported.
    pub amount: String,
}

/// Parse a tolerance amount into minor units. Negative values are rejected.
pub fn parse_tolerance(raw: &str) -> Result<i64, ReconError> {
    match parse_minor(raw) {
        Some(v) if v >= 0 => Ok(v),
        Some(_) => Err(ReconError::ConfigValidation(format!("tolerance must not be negative, got '{raw}'"))),
        None => Err(ReconError::ConfigValidation(format!("tolerance is not a number: '{raw}'"))),
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconJob {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let job: ReconJob = toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        job.validate()?;
        Ok(job)
    }

    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::ConfigParse(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml(&input)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }

        if self.marketplaces.is_empty() {
            return Err(ReconError::ConfigValidation("at least one marketplace is required".into()));
        }

        self.tolerance_minor()?;

        if self.timeout_ms == Some(0) {
            return Err(ReconError::ConfigValidation("timeout_ms must be positive".into()));
        }

        let mut labels = BTreeMap::new();
        for (key, job) in &self.marketplaces {
            let label = job.marketplace(key);
            if label.as_str().is_empty() {
                return Err(ReconError::ConfigValidation(format!("marketplace '{key}': label is empty")));
            }
            if let Some(other) = labels.insert(label.clone(), key) {
                return Err(ReconError::ConfigValidation(format!(
                    "marketplaces '{other}' and '{key}' share the label '{label}'"
                )));
            }

            for (role, source) in job.sources() {
                let at = format!("marketplaces.{key}.{role}");
                if source.file.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!("{at}: file must not be empty")));
                }
                if source.order_id.trim().is_empty() {
                    return Err(ReconError::ConfigValidation(format!("{at}: order_id must not be empty")));
                }
                if source.amount.as_deref() == Some(source.order_id.as_str()) {
                    return Err(ReconError::ConfigValidation(format!(
                        "{at}: order_id and amount both name '{}'",
                        source.order_id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Tolerance in minor units, `None` when the job does not set one.
    pub fn tolerance_minor(&self) -> Result<Option<i64>, ReconError> {
        self.tolerance.as_ref().map(|t| parse_tolerance(&t.amount)).transpose()
    }

    /// Run options from the job alone (tolerance 0, no timeout by default).
    pub fn options(&self) -> Result<ReconOptions, ReconError> {
        self.options_or(ReconOptions::default())
    }

    /// Run options with `defaults` filling whatever the job leaves unset.
    pub fn options_or(&self, defaults: ReconOptions) -> Result<ReconOptions, ReconError> {
        Ok(ReconOptions {
            tolerance_minor: self.tolerance_minor()?.unwrap_or(defaults.tolerance_minor),
            timeout: self.timeout_ms.map(Duration::from_millis).or(defaults.timeout),
        })
    }

    /// Find a marketplace by table key or label (case-insensitive).
    pub fn find(&self, name: &str) -> Option<(&String, &MarketplaceJob)> {
        self.marketplaces.iter().find(|(key, job)| {
            key.eq_ignore_ascii_case(name) || job.marketplace(key).as_str().eq_ignore_ascii_case(name)
        })
    }
}

impl MarketplaceJob {
    pub fn marketplace(&self, key: &str) -> Marketplace {
        Marketplace::new(self.label.as_deref().unwrap_or(key))
    }

    pub fn sources(&self) -> [(ReportRole, &ReportSource); 3] {
        [
            (ReportRole::Sales, &self.sales),
            (ReportRole::PreviousPayments, &self.previous_payments),
            (ReportRole::UpcomingPayments, &self.upcoming_payments),
        ]
    }

    /// Upload this marketplace's files into `session` and apply the
    /// configured sheet and bindings.
    pub fn apply(
        &self,
        marketplace: &Marketplace,
        session: &mut ReconSession,
        base_dir: &Path,
    ) -> Result<(), ReconError> {
        for (report, source) in self.sources() {
            let path = base_dir.join(&source.file);
            let handle = SpreadsheetHandle::open(&path).map_err(|source| ReconError::File { report, source })?;
            let name = handle.name().to_string();

            let inspection = session.upload_handle(marketplace, report, handle);
            if let Some(message) = inspection.error {
                return Err(ReconError::File {
                    report,
                    source: IoError::Corrupt { name, message },
                });
            }

            if let Some(sheet) = &source.sheet {
                session.set_sheet(marketplace, report, sheet)?;
            }
            session.set_binding(marketplace, report, BindingRole::OrderId, &source.order_id)?;
            if let Some(amount) = &source.amount {
                session.set_binding(marketplace, report, BindingRole::Amount, amount)?;
            }
            tracing::debug!(%marketplace, %report, file = %path.display(), "job source applied");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
