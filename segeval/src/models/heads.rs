//! Context heads that turn encoder features into full-resolution features.
//!
//! Every head receives the three encoder stages `[e1, e2, e3]` at strides
//! 1, 2 and 4 with `w`, `2w` and `4w` channels, and returns `w` channels at
//! the spatial size of `e1`.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Relu,
    },
    prelude::*,
};

use super::blocks::{resize_like, ConvBnRelu, ConvBnReluConfig, DoubleConv, DoubleConvConfig};

/// Encoder features at strides 1, 2 and 4.
pub type Features<B> = [Tensor<B, 4>; 3];

/// Skip-connection decoder: upsample and fuse with every shallower stage.
#[derive(Config, Debug)]
pub struct SkipDecoderConfig {
    width: usize,
}

impl SkipDecoderConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> SkipDecoder<B> {
        let w = self.width;
        SkipDecoder {
            fuse2: DoubleConvConfig::new(4 * w + 2 * w, 2 * w).init(device),
            fuse1: DoubleConvConfig::new(2 * w + w, w).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct SkipDecoder<B: Backend> {
    fuse2: DoubleConv<B>,
    fuse1: DoubleConv<B>,
}

impl<B: Backend> SkipDecoder<B> {
    pub fn forward(&self, [e1, e2, e3]: Features<B>) -> Tensor<B, 4> {
        let d2 = self
            .fuse2
            .forward(Tensor::cat(vec![resize_like(e3, &e2), e2], 1));
        self.fuse1
            .forward(Tensor::cat(vec![resize_like(d2, &e1), e1], 1))
    }
}

/// Atrous pyramid over the deepest stage, fused with the shallowest one.
#[derive(Config, Debug)]
pub struct AtrousHeadConfig {
    width: usize,
    #[config(default = "[2, 4]")]
    dilations: [usize; 2],
}

impl AtrousHeadConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> AtrousHead<B> {
        let w = self.width;
        let in_channels = 4 * w;
        let branch = 2 * w;

        let mut branches = vec![ConvBnReluConfig::new(in_channels, branch)
            .with_kernel_size(1)
            .init(device)];
        branches.extend(self.dilations.iter().map(|&dilation| {
            ConvBnReluConfig::new(in_channels, branch)
                .with_dilation(dilation)
                .init(device)
        }));

        AtrousHead {
            branches,
            global_pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            // A 1x1 map has no spatial statistics to normalize, so no BatchNorm here.
            global_conv: Conv2dConfig::new([in_channels, branch], [1, 1]).init(device),
            global_relu: Relu::new(),
            project: ConvBnReluConfig::new(branch * (self.dilations.len() + 2), branch)
                .with_kernel_size(1)
                .init(device),
            low_level: ConvBnReluConfig::new(w, w).with_kernel_size(1).init(device),
            refine: DoubleConvConfig::new(branch + w, w).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct AtrousHead<B: Backend> {
    branches: Vec<ConvBnRelu<B>>,
    global_pool: AdaptiveAvgPool2d,
    global_conv: Conv2d<B>,
    global_relu: Relu,
    project: ConvBnRelu<B>,
    low_level: ConvBnRelu<B>,
    refine: DoubleConv<B>,
}

impl<B: Backend> AtrousHead<B> {
    pub fn forward(&self, [e1, _, e3]: Features<B>) -> Tensor<B, 4> {
        let mut pyramid: Vec<_> = self
            .branches
            .iter()
            .map(|branch| branch.forward(e3.clone()))
            .collect();

        let global = self.global_pool.forward(e3.clone());
        let global = self.global_relu.forward(self.global_conv.forward(global));
        pyramid.push(resize_like(global, &e3));

        let context = self.project.forward(Tensor::cat(pyramid, 1));
        let low_level = self.low_level.forward(e1);
        self.refine
            .forward(Tensor::cat(vec![resize_like(context, &low_level), low_level], 1))
    }
}

/// Pyramid pooling over the deepest stage.
#[derive(Config, Debug)]
pub struct PyramidHeadConfig {
    width: usize,
    #[config(default = "[1, 2, 4]")]
    bins: [usize; 3],
}

impl PyramidHeadConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> PyramidHead<B> {
        let w = self.width;
        let stages = self
            .bins
            .iter()
            .map(|&bin| PoolStage {
                pool: AdaptiveAvgPool2dConfig::new([bin, bin]).init(),
                conv: Conv2dConfig::new([4 * w, w], [1, 1]).init(device),
                relu: Relu::new(),
            })
            .collect();

        PyramidHead {
            stages,
            bottleneck: ConvBnReluConfig::new(4 * w + self.bins.len() * w, 2 * w).init(device),
            refine: ConvBnReluConfig::new(2 * w, w).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct PoolStage<B: Backend> {
    pool: AdaptiveAvgPool2d,
    conv: Conv2d<B>,
    relu: Relu,
}

impl<B: Backend> PoolStage<B> {
    pub fn forward(&self, x: &Tensor<B, 4>) -> Tensor<B, 4> {
        let pooled = self.relu.forward(self.conv.forward(self.pool.forward(x.clone())));
        resize_like(pooled, x)
    }
}

#[derive(Module, Debug)]
pub struct PyramidHead<B: Backend> {
    stages: Vec<PoolStage<B>>,
    bottleneck: ConvBnRelu<B>,
    refine: ConvBnRelu<B>,
}

impl<B: Backend> PyramidHead<B> {
    pub fn forward(&self, [e1, _, e3]: Features<B>) -> Tensor<B, 4> {
        let mut pyramid = vec![e3.clone()];
        pyramid.extend(self.stages.iter().map(|stage| stage.forward(&e3)));

        let context = self.bottleneck.forward(Tensor::cat(pyramid, 1));
        self.refine.forward(resize_like(context, &e1))
    }
}

/// The context head selected for a model kind.
#[derive(Module, Debug)]
pub enum ContextHead<B: Backend> {
    Skip(SkipDecoder<B>),
    Atrous(AtrousHead<B>),
    Pyramid(PyramidHead<B>),
}

impl<B: Backend> ContextHead<B> {
    pub fn forward(&self, features: Features<B>) -> Tensor<B, 4> {
        match self {
            Self::Skip(head) => head.forward(features),
            Self::Atrous(head) => head.forward(features),
            Self::Pyramid(head) => head.forward(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn features(width: usize) -> Features<TestBackend> {
        let device = Default::default();
        [
            Tensor::ones([1, width, 8, 8], &device),
            Tensor::ones([1, 2 * width, 4, 4], &device),
            Tensor::ones([1, 4 * width, 2, 2], &device),
        ]
    }

    #[test]
    fn test_every_head_returns_width_channels_at_full_resolution() {
        let device = Default::default();
        let heads: [ContextHead<TestBackend>; 3] = [
            ContextHead::Skip(SkipDecoderConfig::new(4).init(&device)),
            ContextHead::Atrous(AtrousHeadConfig::new(4).init(&device)),
            ContextHead::Pyramid(PyramidHeadConfig::new(4).init(&device)),
        ];

        for head in heads {
            assert_eq!(head.forward(features(4)).dims(), [1, 4, 8, 8]);
        }
    }
}
