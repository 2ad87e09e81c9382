//! Metric derivation from confusion counts and from raw mask pairs.
//!
//! Epsilon is added to numerator and/or denominator exactly as written in
//! each formula. Results are never clamped, so values stay comparable
//! across runs.

use std::fmt;

use burn::tensor::{activation::softmax, backend::Backend, ElementConversion, Int, Tensor};
use serde::{Deserialize, Serialize};

use super::confusion::{check_mask_dims, ConfusionCounts};
use crate::error::SegEvalResult;

/// Binary-style statistics for one (foreground) class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub iou: f64,
    pub dice: f64,
    pub recall: f64,
    pub precision: f64,
    pub accuracy: f64,
}

impl BinaryMetrics {
    /// Derive every statistic from one confusion tuple.
    ///
    /// A class absent from both prediction and truth (`tp = fp = fn = 0`)
    /// gives `iou = dice = recall = precision = 0` and an accuracy of
    /// `tn / (tn + eps)`.
    #[must_use]
    pub fn from_confusion(counts: &ConfusionCounts, eps: f64) -> Self {
        let tp = counts.true_positives as f64;
        let fp = counts.false_positives as f64;
        let tn = counts.true_negatives as f64;
        let fn_val = counts.false_negatives as f64;

        Self {
            recall: tp / (tp + fn_val + eps),
            precision: tp / (tp + fp + eps),
            accuracy: (tp + tn) / (tp + fp + tn + fn_val + eps),
            dice: 2.0 * tp / (2.0 * tp + fp + fn_val + eps),
            iou: tp / (tp + fp + fn_val + eps),
        }
    }
}

impl fmt::Display for BinaryMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fg_IoU={:.4} | fg_Dice={:.4} | fg_Recall={:.4} | fg_Precision={:.4} | fg_Accuracy={:.4}",
            self.iou, self.dice, self.recall, self.precision, self.accuracy
        )
    }
}

/// Mean over classes of `(|pred=c ∧ truth=c| + eps) / (|pred=c ∨ truth=c| + eps)`.
///
/// This is a per-batch macro metric: callers average it again across
/// batches, so each batch counts equally regardless of its pixel count.
/// That differs on purpose from the pixel-weighted confusion totals.
///
/// # Errors
///
/// Returns `Err(SegEvalError::ShapeMismatch)` if the two masks differ in shape.
pub fn mean_class_iou<B: Backend>(
    predictions: Tensor<B, 3, Int>,
    targets: Tensor<B, 3, Int>,
    num_classes: usize,
    eps: f64,
) -> SegEvalResult<f64> {
    check_mask_dims(&predictions, &targets)?;
    if num_classes == 0 {
        return Ok(0.0);
    }

    let mut iou_sum = 0.0;
    for class_id in 0..num_classes {
        let pred_c = predictions.clone().equal_elem(class_id as i64).int();
        let target_c = targets.clone().equal_elem(class_id as i64).int();

        let intersection = (pred_c.clone() * target_c.clone())
            .sum()
            .into_scalar()
            .elem::<i64>() as f64;
        let union = (pred_c.sum() + target_c.sum())
            .into_scalar()
            .elem::<i64>() as f64
            - intersection;

        if union == 0.0 {
            tracing::debug!(class_id, "class absent from prediction and truth in batch");
        }

        iou_sum += (intersection + eps) / (union + eps);
    }

    Ok(iou_sum / num_classes as f64)
}

/// Arg-max over softmax-normalized scores: `[B, C, H, W]` to class ids `[B, H, W]`.
pub fn predict_mask<B: Backend>(scores: Tensor<B, 4>) -> Tensor<B, 3, Int> {
    softmax(scores, 1).argmax(1).squeeze::<3>(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    const EPS: f64 = 1e-7;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-5,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_perfect_agreement() {
        let metrics = BinaryMetrics::from_confusion(&ConfusionCounts::new(10, 0, 5, 0), EPS);

        assert_close(metrics.recall, 1.0);
        assert_close(metrics.precision, 1.0);
        assert_close(metrics.accuracy, 1.0);
        assert_close(metrics.dice, 1.0);
        assert_close(metrics.iou, 1.0);
    }

    #[test]
    fn test_absent_class_is_finite() {
        let metrics = BinaryMetrics::from_confusion(&ConfusionCounts::new(0, 0, 16, 0), EPS);

        assert!(metrics.iou.is_finite());
        assert_close(metrics.iou, 0.0);
        assert_close(metrics.dice, 0.0);
        assert_close(metrics.accuracy, 1.0);
    }

    #[test]
    fn test_two_by_two_scenario() {
        let metrics = BinaryMetrics::from_confusion(&ConfusionCounts::new(1, 1, 2, 0), EPS);

        assert_close(metrics.recall, 1.0);
        assert_close(metrics.precision, 0.5);
        assert_close(metrics.accuracy, 0.75);
        assert_close(metrics.dice, 2.0 / 3.0);
        assert_close(metrics.iou, 0.5);
    }

    #[test]
    fn test_no_clamping_beyond_epsilon() {
        let metrics = BinaryMetrics::from_confusion(&ConfusionCounts::new(1, 0, 0, 0), 0.5);
        // 1 / 1.5, not rounded up to 1.
        assert_close(metrics.iou, 1.0 / 1.5);
    }

    #[test]
    fn test_mean_class_iou() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 3, Int>::from_ints([[[1, 1], [0, 0]]], &device);
        let truth = Tensor::<TestBackend, 3, Int>::from_ints([[[1, 0], [0, 0]]], &device);

        let miou = mean_class_iou(pred, truth, 2, EPS).unwrap();

        // background: 2/3, foreground: 1/2
        assert_close(miou, (2.0 / 3.0 + 0.5) / 2.0);
    }

    #[test]
    fn test_mean_class_iou_absent_class() {
        let device = Default::default();
        let pred = Tensor::<TestBackend, 3, Int>::zeros([1, 2, 2], &device);
        let truth = Tensor::<TestBackend, 3, Int>::zeros([1, 2, 2], &device);

        let miou = mean_class_iou(pred, truth, 3, EPS).unwrap();

        // Background is perfect; the two absent classes resolve to eps / eps.
        assert!(miou.is_finite());
        assert_close(miou, 1.0);
    }

    #[test]
    fn test_predict_mask() {
        let device = Default::default();
        let scores = Tensor::<TestBackend, 4>::from_floats(
            [[[[2.0, -1.0], [0.0, 0.5]], [[-2.0, 3.0], [1.0, 0.0]]]],
            &device,
        );

        let mask = predict_mask(scores);

        assert_eq!(mask.dims(), [1, 2, 2]);
        let values = mask.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(values, vec![0, 1, 1, 0]);
    }
}
