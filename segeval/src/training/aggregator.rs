//! Epoch-level bookkeeping: combine the passes of one epoch into a record,
//! track the best validation mIoU and decide when to persist a checkpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    passes::{TrainPass, ValPass, ValidationReport},
    summary::RunSummary,
};
use crate::{
    config::RunConfig,
    error::SegEvalResult,
    metrics::{BinaryMetrics, ConfusionCounts},
};

/// Everything measured during one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// One-based epoch number.
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    #[serde(rename = "val_mIoU")]
    pub mean_iou: f64,
    pub foreground: BinaryMetrics,
    pub confusion: ConfusionCounts,
}

impl EpochRecord {
    #[must_use]
    pub const fn new(epoch: usize, train_loss: f64, report: &ValidationReport) -> Self {
        Self {
            epoch,
            train_loss,
            val_loss: report.val_loss,
            mean_iou: report.mean_iou,
            foreground: report.foreground,
            confusion: report.confusion,
        }
    }
}

impl fmt::Display for EpochRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {:03} | train_loss={:.4} | val_loss={:.4} | val_mIoU={:.4} | {}",
            self.epoch, self.train_loss, self.val_loss, self.mean_iou, self.foreground
        )
    }
}

/// Outcome of closing an epoch.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Decision {
    pub record: EpochRecord,
    /// The epoch beat every previous one; the caller persists the model.
    pub improved: bool,
}

/// Final state of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    /// `None` when no epoch was ever decided.
    pub summary: Option<RunSummary>,
    pub history: Vec<EpochRecord>,
}

/// Aggregates epochs and tracks the best validation mIoU seen so far.
#[derive(Debug, Clone)]
pub struct EpochAggregator {
    num_classes: usize,
    fg_class: usize,
    epsilon: f64,
    dice_weight: f64,
    weights: String,
    best: Option<RunSummary>,
    history: Vec<EpochRecord>,
}

impl EpochAggregator {
    /// Create an aggregator for a validated run configuration.
    ///
    /// # Errors
    ///
    /// Returns the validation error of `config`.
    pub fn new(config: &RunConfig) -> SegEvalResult<Self> {
        config.validate()?;
        Ok(Self {
            num_classes: config.num_classes,
            fg_class: config.fg_class,
            epsilon: config.epsilon,
            dice_weight: f64::from(config.dice_weight),
            weights: config.best_checkpoint_path().display().to_string(),
            best: None,
            history: Vec::new(),
        })
    }

    pub const fn train_pass(&self) -> TrainPass {
        TrainPass::new()
    }

    /// A fresh validation pass; totals never carry over between epochs.
    pub const fn val_pass(&self) -> ValPass {
        ValPass::new(self.num_classes, self.fg_class, self.epsilon)
    }

    /// Close an epoch.
    ///
    /// Improvement is strict: an epoch that only ties the best mIoU keeps
    /// the earlier checkpoint.
    pub fn decide(&mut self, epoch: usize, train: &TrainPass, val: ValPass) -> Decision {
        self.submit(EpochRecord::new(epoch, train.mean_loss(), &val.finish()))
    }

    /// Close an epoch from an already assembled record.
    pub fn submit(&mut self, record: EpochRecord) -> Decision {
        let improved = self
            .best
            .as_ref()
            .is_none_or(|best| record.mean_iou > best.best_miou);

        if improved {
            self.best = Some(RunSummary {
                best_miou: record.mean_iou,
                weights: self.weights.clone(),
                dice_weight: self.dice_weight,
                fg_class: self.fg_class,
            });
        }

        self.history.push(record.clone());
        Decision { record, improved }
    }

    pub const fn best(&self) -> Option<&RunSummary> {
        self.best.as_ref()
    }

    pub fn history(&self) -> &[EpochRecord] {
        &self.history
    }

    #[must_use]
    pub fn finish(self) -> RunOutcome {
        RunOutcome {
            summary: self.best,
            history: self.history,
        }
    }
}
