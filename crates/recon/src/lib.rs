//! `payrecon-recon`: column mapping and sales-vs-payments reconciliation.
//!
//! Mapping sessions bind semantic roles to uploaded columns; the engine joins
//! the three mapped reports of one marketplace by order id and reports the
//! variance. File parsing lives in `payrecon-io`.

pub mod aggregate;
pub mod amount;
pub mod cache;
pub mod config;
pub mod deadline;
pub mod engine;
pub mod error;
pub mod mapping;
pub mod model;
pub mod report;
pub mod session;
pub mod summary;

pub use config::ReconJob;
pub use engine::{reconcile, ReconOptions};
pub use error::{ReconError, ValidationError, ValidationIssue};
pub use mapping::MappingSession;
pub use model::{
    BindingRole, Discrepancy, DiscrepancyFlag, Marketplace, OrphanPayment, ReconResult,
    ReportMapping, ReportRole,
};
pub use report::{format, ReportTables, VarianceReport};
pub use session::ReconSession;
