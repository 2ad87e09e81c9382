//! Per-epoch training and validation passes.
//!
//! A pass is created fresh for every epoch and consumed when the epoch is
//! decided, so a failed pass can never leak partial totals into the next one.

use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::{
    error::SegEvalResult,
    losses::CompositeLoss,
    metrics::{
        mean_class_iou, predict_mask, BinaryMetrics, ConfusionAccumulator, ConfusionCounts,
        RunningMean,
    },
};

/// Loss bookkeeping for one training pass.
#[derive(Debug, Clone, Default)]
pub struct TrainPass {
    loss: RunningMean,
}

impl TrainPass {
    pub const fn new() -> Self {
        Self {
            loss: RunningMean::new(),
        }
    }

    /// Compute the composite loss of one batch and record its value.
    ///
    /// The returned tensor is still attached to the graph; the caller runs
    /// the backward pass and the optimizer step.
    ///
    /// # Errors
    ///
    /// Propagates shape errors from the loss; nothing is recorded then.
    pub fn step<B: Backend>(
        &mut self,
        loss_fn: &CompositeLoss<B>,
        scores: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> SegEvalResult<Tensor<B, 1>> {
        let batch_size = scores.dims()[0];
        let loss = loss_fn.forward(scores, targets)?;
        let value = loss.clone().detach().into_scalar().elem::<f64>();
        self.record(value, batch_size);
        Ok(loss)
    }

    /// Record an already computed mean batch loss.
    pub fn record(&mut self, loss: f64, batch_size: usize) {
        self.loss.push(loss, batch_size);
    }

    /// Per-sample mean loss over the pass.
    #[must_use]
    pub fn mean_loss(&self) -> f64 {
        self.loss.value()
    }

    pub const fn samples(&self) -> usize {
        self.loss.weight()
    }
}

/// Aggregated result of one validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Per-sample mean validation loss.
    pub val_loss: f64,
    /// Mean over batches of the per-batch class-mean IoU.
    pub mean_iou: f64,
    /// Foreground statistics derived from the pixel totals.
    pub foreground: BinaryMetrics,
    /// Foreground pixel totals the statistics were derived from.
    pub confusion: ConfusionCounts,
    pub samples: usize,
}

/// Metric bookkeeping for one validation pass.
#[derive(Debug, Clone)]
pub struct ValPass {
    num_classes: usize,
    fg_class: usize,
    epsilon: f64,
    confusion: ConfusionAccumulator,
    batch_iou: RunningMean,
    loss: RunningMean,
}

impl ValPass {
    pub const fn new(num_classes: usize, fg_class: usize, epsilon: f64) -> Self {
        Self {
            num_classes,
            fg_class,
            epsilon,
            confusion: ConfusionAccumulator::new(),
            batch_iou: RunningMean::new(),
            loss: RunningMean::new(),
        }
    }

    /// Score one validation batch.
    ///
    /// Every value is computed before any running total changes, so a
    /// rejected batch leaves the pass exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::ShapeMismatch)` for malformed batches.
    pub fn step<B: Backend>(
        &mut self,
        loss_fn: &CompositeLoss<B>,
        scores: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> SegEvalResult<()> {
        let batch_size = scores.dims()[0];
        let loss = loss_fn
            .forward(scores.clone(), targets.clone())?
            .into_scalar()
            .elem::<f64>();

        let predictions = predict_mask(scores);
        let batch_iou = mean_class_iou(
            predictions.clone(),
            targets.clone(),
            self.num_classes,
            self.epsilon,
        )?;
        self.confusion.update(predictions, targets, self.fg_class)?;

        self.batch_iou.push(batch_iou, 1);
        self.loss.push(loss, batch_size);
        Ok(())
    }

    /// Samples scored so far.
    pub const fn samples(&self) -> usize {
        self.loss.weight()
    }

    pub const fn confusion(&self) -> &ConfusionAccumulator {
        &self.confusion
    }

    /// Close the pass and derive its metrics.
    #[must_use]
    pub fn finish(self) -> ValidationReport {
        let confusion = self.confusion.totals();
        ValidationReport {
            val_loss: self.loss.value(),
            mean_iou: self.batch_iou.value(),
            foreground: BinaryMetrics::from_confusion(&confusion, self.epsilon),
            confusion,
            samples: self.loss.weight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    /// Scores whose arg-max reproduces `ids` exactly for two classes.
    fn scores_for(ids: &Tensor<TestBackend, 3, Int>) -> Tensor<TestBackend, 4> {
        let fg = ids.clone().float().unsqueeze_dim::<4>(1);
        let bg = fg.clone().neg().add_scalar(1.0);
        Tensor::cat(vec![bg, fg], 1).mul_scalar(20.0)
    }

    #[test]
    fn test_totals_recall_beats_naive_batch_average() {
        let device = Default::default();
        let loss_fn = CompositeLoss::<TestBackend>::with_dice_weight(0.0, &device);
        let mut pass = ValPass::new(2, 1, 1e-7);

        // 10 background pixels, predicted correctly: recall for this batch alone is 0/eps = 0.
        let background = Tensor::<TestBackend, 3, Int>::zeros([1, 2, 5], &device);
        pass.step(&loss_fn, scores_for(&background), background)
            .unwrap();

        // 2 foreground pixels, predicted correctly: recall for this batch alone is ~1.
        let foreground = Tensor::<TestBackend, 3, Int>::ones([1, 1, 2], &device);
        pass.step(&loss_fn, scores_for(&foreground), foreground)
            .unwrap();

        let report = pass.finish();
        let naive_recall = (0.0 + 1.0) / 2.0;

        assert_eq!(report.confusion, ConfusionCounts::new(2, 0, 10, 0));
        assert!((report.foreground.recall - 1.0).abs() < 1e-6);
        assert!((report.foreground.recall - naive_recall).abs() > 0.4);
        assert_eq!(report.samples, 2);
    }

    #[test]
    fn test_rejected_batch_leaves_pass_untouched() {
        let device = Default::default();
        let loss_fn = CompositeLoss::<TestBackend>::with_dice_weight(0.0, &device);
        let mut pass = ValPass::new(2, 1, 1e-7);

        let ids = Tensor::<TestBackend, 3, Int>::from_ints([[[1, 0], [0, 1]]], &device);
        pass.step(&loss_fn, scores_for(&ids), ids.clone()).unwrap();

        let bad_targets = Tensor::<TestBackend, 3, Int>::zeros([1, 3, 3], &device);
        assert!(pass.step(&loss_fn, scores_for(&ids), bad_targets).is_err());

        assert_eq!(pass.confusion().batches(), 1);
        let report = pass.finish();
        assert_eq!(report.samples, 1);
        assert_eq!(report.confusion.total(), 4);
    }

    #[test]
    fn test_unmapped_mask_values_fail_the_batch() {
        let device = Default::default();
        let loss_fn = CompositeLoss::<TestBackend>::with_dice_weight(0.0, &device);
        let mut pass = ValPass::new(2, 1, 1e-7);

        let ids = Tensor::<TestBackend, 3, Int>::from_ints([[[1, 0], [0, 1]]], &device);
        let raw = Tensor::<TestBackend, 3, Int>::from_ints([[[255, 0], [0, 255]]], &device);

        assert!(matches!(
            pass.step(&loss_fn, scores_for(&ids), raw),
            Err(crate::error::SegEvalError::ShapeMismatch { .. })
        ));
        assert_eq!(pass.samples(), 0);
        assert_eq!(pass.confusion().batches(), 0);
    }

    #[test]
    fn test_train_pass_weights_by_batch_size() {
        let mut pass = TrainPass::new();
        pass.record(0.5, 4);
        pass.record(2.0, 1);

        assert!((pass.mean_loss() - 0.8).abs() < 1e-12);
        assert_eq!(pass.samples(), 5);
    }

    #[test]
    fn test_train_pass_step_records_loss() {
        let device = Default::default();
        let loss_fn = CompositeLoss::<TestBackend>::with_dice_weight(1.0, &device);
        let ids = Tensor::<TestBackend, 3, Int>::from_ints([[[1, 0], [0, 1]]], &device);
        let mut pass = TrainPass::new();

        let loss = pass.step(&loss_fn, scores_for(&ids), ids).unwrap();
        let value = loss.into_scalar().elem::<f64>();

        assert_eq!(pass.samples(), 1);
        assert!((pass.mean_loss() - value).abs() < 1e-9);
    }
}
