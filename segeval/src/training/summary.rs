//! Run summary and per-epoch history persisted next to the checkpoint.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use super::aggregator::EpochRecord;
use crate::error::SegEvalResult;

/// What `summary.json` holds once a run has improved at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "best_mIoU")]
    pub best_miou: f64,
    /// Path of the best checkpoint.
    pub weights: String,
    pub dice_weight: f64,
    pub fg_class: usize,
}

impl RunSummary {
    /// Write the summary as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns I/O or serialization errors.
    pub fn save(&self, path: &Path) -> SegEvalResult<()> {
        write_json(self, path)
    }

    /// Read a summary written by [`RunSummary::save`].
    ///
    /// # Errors
    ///
    /// Returns I/O or deserialization errors.
    pub fn load(path: &Path) -> SegEvalResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Write the per-epoch history as a pretty JSON array.
///
/// # Errors
///
/// Returns I/O or serialization errors.
pub fn save_history(history: &[EpochRecord], path: &Path) -> SegEvalResult<()> {
    write_json(&history, path)
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> SegEvalResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("segeval_summary_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_summary_field_names() {
        let summary = RunSummary {
            best_miou: 0.75,
            weights: "runs/best_unetplusplus_spot67.mpk".to_string(),
            dice_weight: 0.5,
            fg_class: 1,
        };

        let value = serde_json::to_value(&summary).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();

        assert_eq!(keys, ["best_mIoU", "dice_weight", "fg_class", "weights"]);
        assert_eq!(object["best_mIoU"], 0.75);
    }

    #[test]
    fn test_save_and_load() {
        let dir = temp_dir("roundtrip");
        let path = dir.join("nested").join("summary.json");
        let summary = RunSummary {
            best_miou: 0.5,
            weights: "w.mpk".to_string(),
            dice_weight: 0.0,
            fg_class: 2,
        };

        summary.save(&path).unwrap();
        assert_eq!(RunSummary::load(&path).unwrap(), summary);

        fs::remove_dir_all(dir).unwrap();
    }
}
