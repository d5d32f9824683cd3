pub mod archive_bundler;
pub mod assessment_service;
pub mod credential_store;
pub mod spreadsheet;
pub mod usage_tracker;

pub use archive_bundler::{ArchiveBundler, ArchiveItem, ArchiveSource, ZipBundler};
pub use assessment_service::AssessmentService;
pub use credential_store::{CredentialStore, Credentials, FileCredentialStore, MemoryCredentialStore};
pub use spreadsheet::{FirstColumnParser, HeaderLinkParser, ParsedSheet, SpreadsheetParser};
pub use usage_tracker::UsageTracker;
