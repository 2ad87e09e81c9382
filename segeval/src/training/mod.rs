//! # Training and Evaluation
//!
//! - `passes`: per-epoch training and validation bookkeeping
//! - `aggregator`: epoch records and best-mIoU tracking
//! - `summary`: the persisted run summary and history
//! - `checkpoint`: model persistence
//! - `driver`: the `fit` and `evaluate` loops over Burn data loaders

pub mod aggregator;
pub mod checkpoint;
pub mod driver;
pub mod passes;
pub mod summary;

pub use aggregator::{Decision, EpochAggregator, EpochRecord, RunOutcome};
pub use checkpoint::{CheckpointStore, FileCheckpointStore};
pub use driver::{evaluate, fit};
pub use passes::{TrainPass, ValPass, ValidationReport};
pub use summary::{save_history, RunSummary};
