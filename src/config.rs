use crate::calc::Thresholds;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "attendanced.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Seed for the generated attendance history.
    pub seed: u64,

    /// Window for `attendance.recent` when the request gives none.
    pub recent_days: usize,

    /// Fixed "today" for recent views; defaults to the local date.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_date: Option<NaiveDate>,

    pub thresholds: Thresholds,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            seed: 20240115,
            recent_days: 7,
            anchor_date: None,
            thresholds: Thresholds::default(),
        }
    }
}

impl DaemonConfig {
    pub fn workspace_file(workspace: &Path) -> PathBuf {
        workspace.join(CONFIG_FILE)
    }

    /// Load from `path`; a missing or broken file means defaults.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Failed to parse config {}: {}", path.display(), e),
            },
            Err(e) => tracing::warn!("Failed to read config {}: {}", path.display(), e),
        }
        Self::default()
    }

    pub fn today(&self) -> NaiveDate {
        self.anchor_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }
}
