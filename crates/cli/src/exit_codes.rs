//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                   |
//! |---------|-----------|-----------------------------------------------|
//! | 0       | Universal | Success                                       |
//! | 1       | Universal | General error (unspecified)                   |
//! | 2       | Universal | CLI usage error (bad args)                    |
//! | 3       | Universal | Input file unreadable, corrupt or unsupported |
//! | 10-19   | recon     | Job and reconciliation outcomes               |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` or the command's error handling

use payrecon_recon::ReconError;

// =============================================================================
// Universal (0-3)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unknown marketplace.
pub const EXIT_USAGE: u8 = 2;

/// A job file or report file could not be read or parsed as a spreadsheet.
pub const EXIT_FILE_READ: u8 = 3;

// =============================================================================
// Recon (10-19)
// =============================================================================

/// Job file failed to parse or validate.
pub const EXIT_RECON_INVALID_CONFIG: u8 = 10;

/// A mapping is incomplete: missing file, sheet, or column binding.
pub const EXIT_RECON_INCOMPLETE: u8 = 11;

/// Discrepancies found and `--strict` was given.
pub const EXIT_RECON_DISCREPANCIES: u8 = 12;

/// Reconciliation exceeded its wall-clock budget.
pub const EXIT_RECON_TIMEOUT: u8 = 13;

/// Any other failure while reconciling or writing results.
pub const EXIT_RECON_RUNTIME: u8 = 14;

/// Map a ReconError to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => EXIT_RECON_INVALID_CONFIG,
        ReconError::ColumnCollision { .. } => EXIT_RECON_INVALID_CONFIG,
        ReconError::Validation(_) | ReconError::MissingColumn { .. } => EXIT_RECON_INCOMPLETE,
        ReconError::File { .. } => EXIT_FILE_READ,
        ReconError::TimedOut { .. } => EXIT_RECON_TIMEOUT,
        ReconError::AmountOverflow { .. } => EXIT_RECON_RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrecon_recon::{ReportRole, ValidationError};

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_FILE_READ,
            EXIT_RECON_INVALID_CONFIG,
            EXIT_RECON_INCOMPLETE,
            EXIT_RECON_DISCREPANCIES,
            EXIT_RECON_TIMEOUT,
            EXIT_RECON_RUNTIME,
        ];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn recon_errors_map_to_registry() {
        assert_eq!(
            recon_exit_code(&ReconError::Validation(ValidationError(vec![]))),
            EXIT_RECON_INCOMPLETE
        );
        assert_eq!(
            recon_exit_code(&ReconError::TimedOut { elapsed_ms: 2, limit_ms: 1 }),
            EXIT_RECON_TIMEOUT
        );
        assert_eq!(
            recon_exit_code(&ReconError::AmountOverflow { context: "variance".into() }),
            EXIT_RECON_RUNTIME
        );
        assert_eq!(
            recon_exit_code(&ReconError::ColumnCollision {
                report: ReportRole::Sales,
                column: "Order ID".into()
            }),
            EXIT_RECON_INVALID_CONFIG
        );
    }
}
