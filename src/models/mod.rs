pub mod batch_result;
pub mod outcome;
pub mod progress;
pub mod usage;
pub mod work_item;

pub use batch_result::{BatchResult, BatchSummary};
pub use outcome::{AssessmentOutcome, QualityPolicy};
pub use progress::{ProcessingPhase, ProcessingProgress};
pub use usage::{UsageRecord, UsageReport, UsageSource, UsageStats};
pub use work_item::{Payload, WorkItem};
