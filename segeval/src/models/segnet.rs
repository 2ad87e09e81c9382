//! Baseline encoder / context-head segmentation network.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    prelude::*,
};

use super::{
    blocks::{DoubleConv, DoubleConvConfig},
    heads::{AtrousHeadConfig, ContextHead, PyramidHeadConfig, SkipDecoderConfig},
    SegmentationModel,
};
use crate::{
    config::{ModelKind, RunConfig},
    error::{SegEvalError, SegEvalResult},
};

/// Configuration for [`SegNet`].
#[derive(Config, Debug)]
pub struct SegNetConfig {
    /// Architecture family; selects the context head.
    pub kind: ModelKind,
    pub num_classes: usize,
    /// Channels of the first encoder stage; deeper stages use 2x and 4x.
    #[config(default = "32")]
    pub width: usize,
}

impl SegNetConfig {
    /// Build the network configuration a run asks for.
    pub fn from_run(config: &RunConfig) -> Self {
        Self::new(config.model.clone(), config.num_classes).with_width(config.width)
    }

    /// Initializes a `SegNet` model.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::InvalidConfiguration)` if `width` is zero
    /// or fewer than two classes are requested.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SegEvalResult<SegNet<B>> {
        if self.width == 0 || self.num_classes < 2 {
            return Err(SegEvalError::InvalidConfiguration {
                reason: format!(
                    "SegNet needs width > 0 and at least 2 classes, got width={} classes={}",
                    self.width, self.num_classes
                ),
            });
        }

        let w = self.width;
        let head = match self.kind {
            ModelKind::UnetPlusPlus => ContextHead::Skip(SkipDecoderConfig::new(w).init(device)),
            ModelKind::DeepLabV3Plus => ContextHead::Atrous(AtrousHeadConfig::new(w).init(device)),
            ModelKind::PspNet => ContextHead::Pyramid(PyramidHeadConfig::new(w).init(device)),
        };

        Ok(SegNet {
            stage1: DoubleConvConfig::new(3, w).init(device),
            stage2: DoubleConvConfig::new(w, 2 * w).init(device),
            stage3: DoubleConvConfig::new(2 * w, 4 * w).init(device),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            head,
            classifier: Conv2dConfig::new([w, self.num_classes], [1, 1]).init(device),
        })
    }
}

/// Three-stage encoder, a context head and a 1x1 classifier.
#[derive(Module, Debug)]
pub struct SegNet<B: Backend> {
    stage1: DoubleConv<B>,
    stage2: DoubleConv<B>,
    stage3: DoubleConv<B>,
    pool: MaxPool2d,
    head: ContextHead<B>,
    classifier: Conv2d<B>,
}

impl<B: Backend> SegNet<B> {
    /// Images `[N, 3, H, W]` to raw class scores `[N, C, H, W]`.
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        let e1 = self.stage1.forward(images);
        let e2 = self.stage2.forward(self.pool.forward(e1.clone()));
        let e3 = self.stage3.forward(self.pool.forward(e2.clone()));

        self.classifier.forward(self.head.forward([e1, e2, e3]))
    }
}

impl<B: Backend> SegmentationModel<B> for SegNet<B> {
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4> {
        Self::forward(self, images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_scores_match_input_resolution_for_every_kind() {
        let device = Default::default();
        for kind in [
            ModelKind::UnetPlusPlus,
            ModelKind::DeepLabV3Plus,
            ModelKind::PspNet,
        ] {
            let model = SegNetConfig::new(kind, 3)
                .with_width(4)
                .init::<TestBackend>(&device)
                .unwrap();

            let scores = model.forward(Tensor::zeros([2, 3, 12, 10], &device));

            assert_eq!(scores.dims(), [2, 3, 12, 10]);
        }
    }

    #[test]
    fn test_rejects_zero_width() {
        let device = Default::default();
        let result = SegNetConfig::new(ModelKind::PspNet, 2)
            .with_width(0)
            .init::<TestBackend>(&device);

        assert!(matches!(
            result,
            Err(SegEvalError::InvalidConfiguration { .. })
        ));
    }
}
