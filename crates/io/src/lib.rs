// File I/O: upload handles, introspection, table loading, export

pub mod csv;
pub mod error;
pub mod export;
pub mod handle;
pub mod introspect;
pub mod table;
pub mod xlsx;

pub use error::IoError;
pub use export::export;
pub use handle::{FileFormat, FileId, SpreadsheetHandle};
pub use introspect::{
    inspect, inspect_handle, load_table, read_sheet_columns, Inspection, ERROR_SENTINEL,
    SINGLE_SHEET, UNSELECTED,
};
pub use table::Table;
pub use xlsx::SheetOut;
