//! Directory and file naming for downloaded event logs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;

/// `2024-03-01T00:00:00.000+0000` -> `2024-03-01`.
pub fn format_log_date(log_date: &str) -> &str {
    log_date.split('T').next().unwrap_or(log_date)
}

/// Event types may contain `/`, which cannot appear in a file name.
pub fn sanitize_event_type(event_type: &str) -> String {
    event_type.replace('/', "_")
}

/// Mapped directory name, or the upper-cased event type when unmapped.
pub fn directory_name_for(mapping: &BTreeMap<String, String>, event_type: &str) -> String {
    match mapping.get(event_type) {
        Some(name) => name.clone(),
        None => {
            warn!(event_type = %event_type, "unmapped event type, using upper-case name");
            event_type.to_uppercase()
        }
    }
}

pub fn output_file_name(formatted_date: &str, event_type: &str) -> String {
    format!("{formatted_date}_{event_type}.csv")
}

/// Replace a leading `~` with `$HOME`. Other paths pass through untouched.
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME");
    match (path, home) {
        ("~", Some(home)) => PathBuf::from(home),
        (p, Some(home)) if p.starts_with("~/") => PathBuf::from(home).join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Every `base/financial_year/quarter/sprint/<dir>` for the mapped directory names.
pub fn sprint_directories(
    base_dir: &str,
    financial_year: &str,
    quarter: &str,
    sprint_name: &str,
    mapping: &BTreeMap<String, String>,
) -> Vec<PathBuf> {
    let sprint_root = expand_home(base_dir)
        .join(financial_year)
        .join(quarter)
        .join(sprint_name);

    mapping
        .values()
        .map(|dir_name| sprint_root.join(dir_name))
        .collect()
}

/// Create the sprint tree; existing directories are left alone.
pub fn create_directory_structure(
    base_dir: &str,
    financial_year: &str,
    quarter: &str,
    sprint_name: &str,
    mapping: &BTreeMap<String, String>,
) -> Result<Vec<PathBuf>> {
    let dirs = sprint_directories(base_dir, financial_year, quarter, sprint_name, mapping);
    for dir in &dirs {
        std::fs::create_dir_all(dir)?;
        info!(path = %dir.display(), "directory created");
    }
    Ok(dirs)
}

/// Where one record's log lands, relative to the download root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileTarget {
    pub directory: PathBuf,
    pub file_name: String,
}

impl LogFileTarget {
    pub fn resolve(
        download_root: &Path,
        mapping: &BTreeMap<String, String>,
        log_date: &str,
        event_type: &str,
    ) -> Self {
        let valid_event_type = sanitize_event_type(event_type);
        let directory = download_root.join(directory_name_for(mapping, &valid_event_type));
        let file_name = output_file_name(format_log_date(log_date), &valid_event_type);
        Self {
            directory,
            file_name,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mapping() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("Login".to_string(), "LOGIN_EVENTS".to_string()),
            ("API".to_string(), "API_CALLS".to_string()),
        ])
    }

    #[test]
    fn test_format_log_date() {
        assert_eq!(format_log_date("2024-03-01T00:00:00.000+0000"), "2024-03-01");
        assert_eq!(format_log_date("2024-03-01"), "2024-03-01");
    }

    #[test]
    fn test_sanitize_event_type() {
        assert_eq!(sanitize_event_type("Lightning/Page"), "Lightning_Page");
        assert_eq!(sanitize_event_type("Login"), "Login");
    }

    #[test]
    fn test_directory_name_for_unmapped_upper_cases() {
        let m = mapping();
        assert_eq!(directory_name_for(&m, "Login"), "LOGIN_EVENTS");
        assert_eq!(directory_name_for(&m, "ReportExport"), "REPORTEXPORT");
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("2024-03-01", "Login"), "2024-03-01_Login.csv");
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/var/logs"), PathBuf::from("/var/logs"));
        assert_eq!(expand_home("relative/dir"), PathBuf::from("relative/dir"));
        if let Some(home) = std::env::var_os("HOME") {
            assert_eq!(expand_home("~/logs"), PathBuf::from(home).join("logs"));
        }
    }

    #[test]
    fn test_sprint_directories_layout() {
        let dirs = sprint_directories("/data", "FY24", "Q1", "Sprint-3", &mapping());
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/data/FY24/Q1/Sprint-3/API_CALLS"),
                PathBuf::from("/data/FY24/Q1/Sprint-3/LOGIN_EVENTS"),
            ]
        );
    }

    #[test]
    fn test_create_directory_structure_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().to_str().unwrap();

        let first = create_directory_structure(base, "FY24", "Q2", "S1", &mapping()).unwrap();
        let second = create_directory_structure(base, "FY24", "Q2", "S1", &mapping()).unwrap();

        assert_eq!(first, second);
        for dir in first {
            assert!(dir.is_dir(), "{} missing", dir.display());
        }
    }

    #[test]
    fn test_log_file_target_resolve() {
        let target = LogFileTarget::resolve(
            Path::new("/sprint"),
            &mapping(),
            "2024-03-01T00:00:00.000+0000",
            "Login",
        );
        assert_eq!(target.directory, PathBuf::from("/sprint/LOGIN_EVENTS"));
        assert_eq!(target.path(), PathBuf::from("/sprint/LOGIN_EVENTS/2024-03-01_Login.csv"));
    }

    #[test]
    fn test_log_file_target_sanitizes_before_mapping() {
        let m = BTreeMap::from([("Lightning_Page".to_string(), "LIGHTNING".to_string())]);
        let target =
            LogFileTarget::resolve(Path::new("/s"), &m, "2024-01-02T10:00:00Z", "Lightning/Page");
        assert_eq!(target.path(), PathBuf::from("/s/LIGHTNING/2024-01-02_Lightning_Page.csv"));
    }
}
