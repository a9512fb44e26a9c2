use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stackgraph::ExecutionReport;
use std::fs;
use std::path::Path;

// ============================================================================
// State Structures
// ============================================================================

/// Outcome of the last apply, persisted next to the stack file
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    /// Stack the report belongs to
    pub stack: String,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,

    /// Report of the last run
    pub report: ExecutionReport,
}

impl StateFile {
    pub fn new(stack: impl Into<String>, report: ExecutionReport) -> Self {
        Self {
            stack: stack.into(),
            last_updated: Utc::now(),
            report,
        }
    }

    /// Load state from disk, or None if the file doesn't exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            log::debug!("State file {} does not exist", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: StateFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        log::debug!("Loaded state from {}", path.display());
        Ok(Some(state))
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize state to JSON")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stackgraph::{
        Outputs, ProviderError, ReportEntry, ResourceError, ResourceStatus, RunStatus,
    };
    use tempfile::TempDir;

    fn aborted_report() -> ExecutionReport {
        let mut outputs = Outputs::new();
        outputs.insert("bucket_arn".into(), json!("arn:aws:s3:::blog"));
        ExecutionReport {
            status: RunStatus::Aborted,
            entries: vec![
                ReportEntry {
                    name: "storage".into(),
                    status: ResourceStatus::Applied,
                    outputs,
                    error: None,
                    resumed: false,
                },
                ReportEntry {
                    name: "network".into(),
                    status: ResourceStatus::Failed,
                    outputs: Outputs::new(),
                    error: Some(ResourceError::Provider(ProviderError::transient("throttled"))),
                    resumed: false,
                },
            ],
        }
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = TempDir::new().unwrap();
        let loaded = StateFile::load(&dir.path().join("blog.state.json")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("blog.state.json");

        StateFile::new("blog", aborted_report()).save(&path).unwrap();
        let loaded = StateFile::load(&path).unwrap().unwrap();

        assert_eq!(loaded.stack, "blog");
        assert_eq!(loaded.report, aborted_report());
        assert_eq!(
            loaded.report.outputs_of("storage").unwrap()["bucket_arn"],
            "arn:aws:s3:::blog"
        );
    }

    #[test]
    fn test_load_corrupt_file_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blog.state.json");
        fs::write(&path, "{not json").unwrap();

        let err = StateFile::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }
}
