//! Multi-class soft Dice loss.

use burn::{prelude::*, tensor::activation::softmax};

use crate::error::{SegEvalError, SegEvalResult};

/// Configuration for Dice Loss function.
#[derive(Config, Debug)]
pub struct DiceLossConfig {
    #[config(default = 1e-6)]
    pub epsilon: f32,
}

/// Soft Dice loss over softmax probabilities and one-hot truth.
///
/// Per class c, with sums over batch and spatial axes:
/// `dice_c = (2 * Σ(p_c * y_c) + eps) / (Σp_c + Σy_c + eps)`,
/// and the loss is `1 - mean_c(dice_c)`.
#[derive(Module, Debug)]
pub struct DiceLoss<B: Backend> {
    pub epsilon: f32,
    _phantom: std::marker::PhantomData<B>,
}

impl DiceLossConfig {
    /// Initialize a new Dice loss function with the given configuration.
    pub const fn init<B: Backend>(&self) -> DiceLoss<B> {
        DiceLoss {
            epsilon: self.epsilon,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<B: Backend> Default for DiceLoss<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> DiceLoss<B> {
    /// Create a new Dice loss function with default configuration.
    pub fn new() -> Self {
        DiceLossConfig::new().init()
    }

    /// Calculate the Dice loss.
    ///
    /// # Arguments
    /// * `scores` - Raw class scores with shape [N, C, H, W], C >= 2
    /// * `targets` - Ground truth class ids with shape [N, H, W]
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::ShapeMismatch)` if the batch or spatial
    /// dims disagree, if C < 2, or if a truth id falls outside `[0, C)`.
    pub fn forward(
        &self,
        scores: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> SegEvalResult<Tensor<B, 1>> {
        check_score_dims(&scores, &targets)?;
        let [_, num_classes, _, _] = scores.dims();
        if num_classes < 2 {
            return Err(SegEvalError::shape(
                "at least 2 classes on the score axis",
                format!("{num_classes} classes"),
            ));
        }
        check_class_range(&targets, num_classes)?;

        // Channel-last layout keeps the softmax on the trailing axis.
        let probs = softmax(scores.permute([0, 2, 3, 1]), 3);
        let one_hot = one_hot(targets, num_classes);

        let intersection = sum_per_class(probs.clone() * one_hot.clone());
        let union = sum_per_class(probs) + sum_per_class(one_hot);

        let dice = intersection
            .mul_scalar(2.0)
            .add_scalar(self.epsilon)
            .div(union.add_scalar(self.epsilon));

        Ok(dice.mean().neg().add_scalar(1.0))
    }
}

/// Ensure `scores` is [N, C, H, W] and `targets` is [N, H, W].
pub(crate) fn check_score_dims<B: Backend>(
    scores: &Tensor<B, 4>,
    targets: &Tensor<B, 3, Int>,
) -> SegEvalResult<()> {
    let [n, c, h, w] = scores.dims();
    let target_dims = targets.dims();
    if target_dims != [n, h, w] {
        return Err(SegEvalError::shape(
            format!("truth [{n}, {h}, {w}] for scores [{n}, {c}, {h}, {w}]"),
            format!("truth {target_dims:?}"),
        ));
    }
    Ok(())
}

/// Ensure every truth id lies in `[0, num_classes)`.
pub(crate) fn check_class_range<B: Backend>(
    targets: &Tensor<B, 3, Int>,
    num_classes: usize,
) -> SegEvalResult<()> {
    let min = targets.clone().min().into_scalar().elem::<i64>();
    let max = targets.clone().max().into_scalar().elem::<i64>();
    if min < 0 || max >= num_classes as i64 {
        return Err(SegEvalError::shape(
            format!("class ids in [0, {num_classes})"),
            format!("class ids in [{min}, {max}]"),
        ));
    }
    Ok(())
}

/// Expand [N, H, W] ids into a [N, H, W, C] float one-hot tensor.
fn one_hot<B: Backend>(targets: Tensor<B, 3, Int>, num_classes: usize) -> Tensor<B, 4> {
    let targets = targets.unsqueeze_dim::<4>(3);
    let planes = (0..num_classes)
        .map(|class_id| targets.clone().equal_elem(class_id as i64).float())
        .collect();
    Tensor::cat(planes, 3)
}

/// Sum a [N, H, W, C] tensor over every axis except C.
fn sum_per_class<B: Backend>(tensor: Tensor<B, 4>) -> Tensor<B, 1> {
    let [_, _, _, num_classes] = tensor.dims();
    tensor
        .sum_dim(0)
        .sum_dim(1)
        .sum_dim(2)
        .reshape([num_classes])
}
