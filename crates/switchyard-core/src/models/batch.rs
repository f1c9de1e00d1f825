use serde::{Deserialize, Serialize};

use super::file::CanonicalFileRecord;
use crate::storage_types::ProviderKind;

/// One failed file within a batch upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFileError {
    /// Position of the file in the submitted batch
    pub index: usize,
    pub file_name: String,
    pub attempted_providers: Vec<ProviderKind>,
    pub message: String,
}

/// Result of a batch upload: successes in input order plus per-file errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadBatchResult {
    pub records: Vec<CanonicalFileRecord>,
    pub errors: Vec<BatchFileError>,
}

impl UploadBatchResult {
    pub fn success_count(&self) -> usize {
        self.records.len()
    }

    pub fn failed_file_names(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.file_name.as_str()).collect()
    }

    pub fn is_complete_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Progress of a running batch, reported after each file completes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchProgress {
    /// Completed share of the batch in `0.0..=1.0`; an empty batch counts as done.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}
