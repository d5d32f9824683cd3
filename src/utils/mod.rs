pub mod logging;
pub mod report;

pub use report::QualityReport;
