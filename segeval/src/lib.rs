//! # segeval
//!
//! Segmentation training and evaluation on Burn: a cross-entropy plus Dice
//! loss, pixel-total confusion metrics, per-batch mean IoU, and an epoch
//! driver that keeps the checkpoint with the best validation mIoU.

pub mod config;
pub mod dataset;
pub mod error;
pub mod losses;
pub mod metrics;
pub mod models;
pub mod training;

pub use config::{DatasetKind, ModelKind, RunConfig};
#[cfg(feature = "dataset")]
pub use dataset::{make_dataset, SegDataset, Split};
pub use dataset::{SegBatch, SegBatcher, SegItem};
pub use error::{SegEvalError, SegEvalResult};
pub use losses::{CompositeLoss, CompositeLossConfig, DiceLoss, DiceLossConfig};
pub use metrics::{
    mean_class_iou, predict_mask, BinaryMetrics, ConfusionAccumulator, ConfusionCounts,
    RunningMean,
};
pub use models::{SegNet, SegNetConfig, SegmentationModel};
pub use training::{
    evaluate, fit, CheckpointStore, EpochAggregator, EpochRecord, FileCheckpointStore,
    RunOutcome, RunSummary, ValidationReport,
};
