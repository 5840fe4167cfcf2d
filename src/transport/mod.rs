pub mod event_log;
pub mod query;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a SOQL query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPage {
    #[serde(default)]
    pub total_size: u64,
    #[serde(default = "default_done")]
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

/// The fields of an `EventLogFile` row needed to place and fetch its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLogRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "LogDate")]
    pub log_date: String,
    #[serde(rename = "EventType")]
    pub event_type: String,
}

/// `{base}/services/data/v{version}`
pub fn data_api_base(base_url: &str, api_version: &str) -> String {
    format!(
        "{}/services/data/v{}",
        base_url.trim_end_matches('/'),
        api_version
    )
}
