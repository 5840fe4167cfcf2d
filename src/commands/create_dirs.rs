use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::LayoutConfig;
use crate::layout::create_directory_structure;

/// Build `EVENT_LOG_BASE_DIR/<year>/<quarter>/<sprint>/<dir>` for every mapped event type.
pub fn run_create_dirs(
    layout: &LayoutConfig,
    financial_year: &str,
    quarter: &str,
    sprint_name: &str,
) -> Result<Vec<PathBuf>> {
    let base_dir = layout.require_base_dir()?;
    create_directory_structure(
        base_dir,
        financial_year,
        quarter,
        sprint_name,
        &layout.event_types,
    )
    .with_context(|| format!("creating sprint directories under {base_dir}"))
}
