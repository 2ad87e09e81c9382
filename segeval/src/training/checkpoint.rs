//! Model checkpoint persistence.

use std::path::Path;

use burn::{
    module::Module,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::Backend,
};

use crate::error::{SegEvalError, SegEvalResult};

/// Where the training driver persists the best model.
pub trait CheckpointStore<B: Backend, M: Module<B>> {
    /// Persist `model` at `path`.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::Checkpoint)` if the model cannot be written.
    fn save(&mut self, model: &M, path: &Path) -> SegEvalResult<()>;

    /// Load the record at `path` into `model`.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::Checkpoint)` if the record is missing or
    /// does not match the model structure.
    fn load(&self, model: M, path: &Path, device: &B::Device) -> SegEvalResult<M>;
}

/// Checkpoints stored as named MessagePack files with full precision.
#[derive(Debug, Default, Clone)]
pub struct FileCheckpointStore {
    recorder: NamedMpkFileRecorder<FullPrecisionSettings>,
}

impl FileCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B: Backend, M: Module<B>> CheckpointStore<B, M> for FileCheckpointStore {
    fn save(&mut self, model: &M, path: &Path) -> SegEvalResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        model
            .clone()
            .save_file(path.to_path_buf(), &self.recorder)
            .map_err(|e| SegEvalError::Checkpoint {
                reason: format!("failed to save {}: {e}", path.display()),
            })?;

        tracing::debug!(path = %path.display(), "checkpoint written");
        Ok(())
    }

    fn load(&self, model: M, path: &Path, device: &B::Device) -> SegEvalResult<M> {
        model
            .load_file(path.to_path_buf(), &self.recorder, device)
            .map_err(|e| SegEvalError::Checkpoint {
                reason: format!("failed to load {}: {e}", path.display()),
            })
    }
}
