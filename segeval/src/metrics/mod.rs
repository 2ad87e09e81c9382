//! Evaluation metrics for segmentation runs.
//!
//! Two IoU flavours live here and are kept apart on purpose:
//! [`mean_class_iou`] is a per-batch macro metric averaged over batches,
//! while [`BinaryMetrics::from_confusion`] works on pixel totals gathered by
//! a [`ConfusionAccumulator`].

pub mod confusion;
pub mod derivation;
pub mod running;

pub use confusion::{ConfusionAccumulator, ConfusionCounts};
pub use derivation::{mean_class_iou, predict_mask, BinaryMetrics};
pub use running::RunningMean;
