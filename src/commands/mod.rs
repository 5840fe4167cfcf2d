pub mod create_dirs;
pub mod download;
pub mod query;

pub use create_dirs::run_create_dirs;
pub use download::{DownloadPlan, DownloadSummary, EventLogSync};
pub use query::run_query;
