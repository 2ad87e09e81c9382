//! Composite segmentation loss: cross-entropy plus weighted Dice.
//!
//! Both terms read the same score tensor and the same truth ids.
//! Cross-entropy applies log-softmax internally and Dice applies softmax,
//! so their gradients with respect to the scores can be added directly.
//!
//! ```rust,ignore
//! let loss = CompositeLossConfig::new().with_dice_weight(0.5).init(&device);
//! let value = loss.forward(scores, targets)?;
//! ```

use burn::{
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    prelude::*,
};

use super::dice::{check_class_range, check_score_dims, DiceLoss, DiceLossConfig};
use crate::error::SegEvalResult;

/// Configuration for Composite Loss function.
#[derive(Config, Debug)]
pub struct CompositeLossConfig {
    /// Weight of the Dice term. Zero skips the Dice computation entirely.
    #[config(default = 0.0)]
    pub dice_weight: f32,
    #[config(default = 1e-6)]
    pub epsilon: f32,
}

/// `cross_entropy(scores, truth) + dice_weight * dice(scores, truth)`.
#[derive(Module, Debug)]
pub struct CompositeLoss<B: Backend> {
    pub dice_weight: f32,
    pub ce_loss: CrossEntropyLoss<B>,
    pub dice_loss: DiceLoss<B>,
}

impl CompositeLossConfig {
    /// Initialize a new composite loss with the given configuration.
    pub fn init<B: Backend>(&self, device: &B::Device) -> CompositeLoss<B> {
        CompositeLoss {
            dice_weight: self.dice_weight,
            ce_loss: CrossEntropyLossConfig::new().init(device),
            dice_loss: DiceLossConfig::new().with_epsilon(self.epsilon).init(),
        }
    }
}

// Note: No Default implementation since the cross-entropy module needs a device

impl<B: Backend> CompositeLoss<B> {
    /// Create a new composite loss with the given Dice weight.
    pub fn with_dice_weight(dice_weight: f32, device: &B::Device) -> Self {
        CompositeLossConfig::new()
            .with_dice_weight(dice_weight)
            .init(device)
    }

    /// Calculate the composite loss.
    ///
    /// # Arguments
    /// * `scores` - Raw class scores with shape [N, C, H, W]
    /// * `targets` - Ground truth class ids with shape [N, H, W]
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::ShapeMismatch)` if the tensors disagree in
    /// batch or spatial dims, if a truth id falls outside `[0, C)`, or if the
    /// Dice term rejects the scores.
    pub fn forward(
        &self,
        scores: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> SegEvalResult<Tensor<B, 1>> {
        let ce = self.cross_entropy(scores.clone(), targets.clone())?;

        if self.dice_weight == 0.0 {
            return Ok(ce);
        }

        let dice = self.dice_loss.forward(scores, targets)?;
        Ok(ce + dice.mul_scalar(self.dice_weight))
    }

    /// Pixel-wise categorical cross-entropy averaged over every pixel.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::ShapeMismatch)` if the tensors disagree in
    /// batch or spatial dims, or if a truth id falls outside `[0, C)`.
    pub fn cross_entropy(
        &self,
        scores: Tensor<B, 4>,
        targets: Tensor<B, 3, Int>,
    ) -> SegEvalResult<Tensor<B, 1>> {
        check_score_dims(&scores, &targets)?;
        let [n, c, h, w] = scores.dims();
        check_class_range(&targets, c)?;

        // [N, C, H, W] -> [N*H*W, C] rows of logits, one per pixel.
        let logits = scores.permute([0, 2, 3, 1]).reshape([n * h * w, c]);
        let targets = targets.reshape([n * h * w]);

        Ok(self.ce_loss.forward(logits, targets))
    }
}
