//! File I/O: upload decoding and report rendering.

mod csv;
pub mod report;
pub mod table;
mod xlsx;

pub use report::{render, Report, ReportError, XLSX_CONTENT_TYPE};
pub use table::{read_table, TableError, TableFormat};
