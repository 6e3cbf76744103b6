pub mod report;
pub use report::{open_store, status, PostSource, ReportService, StatusReport, UpdateSheetReport};
