//! Per-pass monitor log written next to the tracked address file.
//!
//! Each persisted pass becomes its own JSON file so an operator can audit
//! what the sweep saw without a log aggregator.

use crate::store::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracker_core::AccountId;
use tracing::debug;

/// One account's outcome within a polling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountCheck {
    pub address_id: AccountId,
    pub previous_balance: String,
    /// `None` when the account was skipped (no subscribers) or the fetch
    /// fell back before producing a balance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_balance: Option<String>,
    pub subscriber_count: usize,
    pub change_detected: bool,
}

/// Full record of a single polling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassReport {
    pub timestamp: DateTime<Utc>,
    pub checks: Vec<AccountCheck>,
}

impl PassReport {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            checks: Vec::new(),
        }
    }

    pub fn record(&mut self, check: AccountCheck) {
        self.checks.push(check);
    }

    pub fn check_count(&self) -> usize {
        self.checks.len()
    }

    pub fn has_changes(&self) -> bool {
        self.checks.iter().any(|c| c.change_detected)
    }
}

impl Default for PassReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes pass reports as timestamped JSON files under the data directory.
pub struct MonitorLog {
    dir: PathBuf,
}

impl MonitorLog {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// Persist one report. The filename embeds the pass timestamp with
    /// characters unfit for filenames replaced.
    pub async fn persist(&self, report: &PassReport) -> Result<PathBuf, StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let stamp: String = report
            .timestamp
            .to_rfc3339()
            .chars()
            .map(|c| if c == ':' || c == '.' { '-' } else { c })
            .collect();
        let path = self.dir.join(format!("monitor-log-{stamp}.json"));
        let bytes = serde_json::to_vec_pretty(report)?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), checks = report.check_count(), "Wrote monitor log");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_check(changed: bool) -> AccountCheck {
        AccountCheck {
            address_id: AccountId::new("ACC"),
            previous_balance: "100".to_string(),
            new_balance: Some("150".to_string()),
            subscriber_count: 2,
            change_detected: changed,
        }
    }

    #[test]
    fn has_changes_reflects_any_detected_change() {
        let mut report = PassReport::new();
        report.record(sample_check(false));
        assert!(!report.has_changes());
        report.record(sample_check(true));
        assert!(report.has_changes());
        assert_eq!(report.check_count(), 2);
    }

    #[test]
    fn checks_serialize_in_camel_case() {
        let value = serde_json::to_value(sample_check(true)).unwrap();
        assert_eq!(value["addressId"], "ACC");
        assert_eq!(value["previousBalance"], "100");
        assert_eq!(value["newBalance"], "150");
        assert_eq!(value["subscriberCount"], 2);
        assert_eq!(value["changeDetected"], true);
    }

    #[tokio::test]
    async fn persist_writes_a_timestamped_file() {
        let dir = std::env::temp_dir().join(format!(
            "tracker-monitor-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let log = MonitorLog::new(&dir);

        let mut report = PassReport::new();
        report.record(sample_check(true));
        let path = log.persist(&report).await.unwrap();

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("monitor-log-"));
        assert!(name.ends_with(".json"));
        assert!(!name.contains(':'));

        let bytes = tokio::fs::read(&path).await.unwrap();
        let loaded: PassReport = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(loaded.check_count(), 1);
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
