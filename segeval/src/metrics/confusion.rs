//! Confusion counting for a single target class.
//!
//! Counts are accumulated as running totals over every batch of an epoch.
//! Averaging per-batch ratios instead would weight a tiny trailing batch the
//! same as a full one.

use std::ops::{Add, AddAssign};

use burn::tensor::{backend::Backend, ElementConversion, Int, Tensor};
use serde::{Deserialize, Serialize};

use crate::error::{SegEvalError, SegEvalResult};

/// True/false positive/negative tallies for one class.
///
/// `total()` always equals the number of pixels compared so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positives: u64,
    pub false_positives: u64,
    pub true_negatives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    pub const fn new(
        true_positives: u64,
        false_positives: u64,
        true_negatives: u64,
        false_negatives: u64,
    ) -> Self {
        Self {
            true_positives,
            false_positives,
            true_negatives,
            false_negatives,
        }
    }

    /// Number of pixels these counts cover.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Count one batch of predicted ids against truth ids for `class_id`.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::ShapeMismatch)` if the two masks differ in shape.
    pub fn from_masks<B: Backend>(
        predictions: Tensor<B, 3, Int>,
        targets: Tensor<B, 3, Int>,
        class_id: usize,
    ) -> SegEvalResult<Self> {
        check_mask_dims(&predictions, &targets)?;

        let [batch, height, width] = predictions.dims();
        let pixels = (batch * height * width) as u64;

        let preds_binary = predictions.equal_elem(class_id as i64).int();
        let targets_binary = targets.equal_elem(class_id as i64).int();

        let tp = sum_int(preds_binary.clone() * targets_binary.clone());
        let pred_positives = sum_int(preds_binary);
        let actual_positives = sum_int(targets_binary);

        let fp = pred_positives - tp;
        let fn_val = actual_positives - tp;
        let tn = pixels - tp - fp - fn_val;

        Ok(Self::new(tp, fp, tn, fn_val))
    }
}

impl Add for ConfusionCounts {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            true_positives: self.true_positives + rhs.true_positives,
            false_positives: self.false_positives + rhs.false_positives,
            true_negatives: self.true_negatives + rhs.true_negatives,
            false_negatives: self.false_negatives + rhs.false_negatives,
        }
    }
}

impl AddAssign for ConfusionCounts {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Running confusion totals over a sequence of batches.
///
/// One accumulator belongs to one (metric scope, epoch). Start every epoch
/// from a fresh or [`reset`](Self::reset) accumulator.
#[derive(Debug, Clone, Default)]
pub struct ConfusionAccumulator {
    totals: ConfusionCounts,
    batches: usize,
}

impl ConfusionAccumulator {
    pub const fn new() -> Self {
        Self {
            totals: ConfusionCounts::new(0, 0, 0, 0),
            batches: 0,
        }
    }

    /// Add one batch of predictions for `class_id` to the running totals.
    ///
    /// The totals are left untouched when the batch is rejected.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::ShapeMismatch)` if the two masks differ in shape.
    pub fn update<B: Backend>(
        &mut self,
        predictions: Tensor<B, 3, Int>,
        targets: Tensor<B, 3, Int>,
        class_id: usize,
    ) -> SegEvalResult<()> {
        let counts = ConfusionCounts::from_masks(predictions, targets, class_id)?;
        self.add_counts(counts);
        Ok(())
    }

    /// Add counts that were computed ahead of time.
    pub fn add_counts(&mut self, counts: ConfusionCounts) {
        self.totals += counts;
        self.batches += 1;
    }

    pub const fn totals(&self) -> ConfusionCounts {
        self.totals
    }

    /// Number of batches folded into the totals.
    pub const fn batches(&self) -> usize {
        self.batches
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

pub(crate) fn check_mask_dims<B: Backend>(
    predictions: &Tensor<B, 3, Int>,
    targets: &Tensor<B, 3, Int>,
) -> SegEvalResult<()> {
    let pred_dims = predictions.dims();
    let target_dims = targets.dims();
    if pred_dims != target_dims {
        return Err(SegEvalError::shape(
            format!("{pred_dims:?} (prediction)"),
            format!("{target_dims:?} (truth)"),
        ));
    }
    Ok(())
}

fn sum_int<B: Backend>(tensor: Tensor<B, 3, Int>) -> u64 {
    tensor.sum().into_scalar().elem::<i64>().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn mask(data: [[[i32; 2]; 2]; 1]) -> Tensor<TestBackend, 3, Int> {
        Tensor::from_ints(data, &Default::default())
    }

    #[test]
    fn test_two_by_two_scenario() {
        let pred = mask([[[1, 1], [0, 0]]]);
        let truth = mask([[[1, 0], [0, 0]]]);

        let counts = ConfusionCounts::from_masks(pred, truth, 1).unwrap();

        assert_eq!(counts, ConfusionCounts::new(1, 1, 2, 0));
        assert_eq!(counts.total(), 4);
    }

    #[test]
    fn test_totals_add_up_across_batches() {
        let device = Default::default();
        let mut acc = ConfusionAccumulator::new();

        acc.update(
            mask([[[1, 1], [0, 0]]]),
            mask([[[1, 0], [0, 1]]]),
            1,
        )
        .unwrap();
        acc.update(
            Tensor::<TestBackend, 3, Int>::zeros([3, 4, 5], &device),
            Tensor::<TestBackend, 3, Int>::ones([3, 4, 5], &device),
            1,
        )
        .unwrap();

        let totals = acc.totals();
        assert_eq!(totals.total(), 4 + 60);
        assert_eq!(totals.true_positives, 1);
        assert_eq!(totals.false_negatives, 61);
        assert_eq!(acc.batches(), 2);
    }

    #[test]
    fn test_batch_order_does_not_matter() {
        let a = (mask([[[1, 1], [0, 0]]]), mask([[[1, 0], [0, 0]]]));
        let b = (mask([[[0, 1], [1, 1]]]), mask([[[0, 1], [1, 0]]]));

        let mut forward = ConfusionAccumulator::new();
        forward.update(a.0.clone(), a.1.clone(), 1).unwrap();
        forward.update(b.0.clone(), b.1.clone(), 1).unwrap();

        let mut backward = ConfusionAccumulator::new();
        backward.update(b.0, b.1, 1).unwrap();
        backward.update(a.0, a.1, 1).unwrap();

        assert_eq!(forward.totals(), backward.totals());
    }

    #[test]
    fn test_shape_mismatch_leaves_totals_untouched() {
        let device = Default::default();
        let mut acc = ConfusionAccumulator::new();
        acc.update(mask([[[1, 1], [0, 0]]]), mask([[[1, 0], [0, 0]]]), 1)
            .unwrap();
        let before = acc.totals();

        let result = acc.update(
            Tensor::<TestBackend, 3, Int>::zeros([1, 2, 3], &device),
            Tensor::<TestBackend, 3, Int>::zeros([1, 3, 2], &device),
            1,
        );

        assert!(matches!(result, Err(SegEvalError::ShapeMismatch { .. })));
        assert_eq!(acc.totals(), before);
        assert_eq!(acc.batches(), 1);
    }

    #[test]
    fn test_reset() {
        let mut acc = ConfusionAccumulator::new();
        acc.add_counts(ConfusionCounts::new(1, 2, 3, 4));
        acc.reset();
        assert_eq!(acc.totals().total(), 0);
        assert_eq!(acc.batches(), 0);
    }
}
