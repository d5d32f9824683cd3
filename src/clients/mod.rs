pub mod mock_client;
pub mod scoring_client;

pub use mock_client::{MockCall, MockScoringApi};
pub use scoring_client::{ApiResponse, FileUpload, ScoringApi, SightengineClient};
