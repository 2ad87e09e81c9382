//! Convolutional building blocks shared by the encoder and the context heads.

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        BatchNorm, BatchNormConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
    tensor::{
        module::interpolate,
        ops::{InterpolateMode, InterpolateOptions},
    },
};

/// Configuration for [`ConvBnRelu`].
#[derive(Config, Debug)]
pub struct ConvBnReluConfig {
    in_channels: usize,
    out_channels: usize,
    #[config(default = "3")]
    kernel_size: usize,
    #[config(default = "1")]
    dilation: usize,
}

impl ConvBnReluConfig {
    /// Initializes a `ConvBnRelu` block that preserves spatial size.
    pub fn init<B: Backend>(&self, device: &Device<B>) -> ConvBnRelu<B> {
        let padding = self.dilation * (self.kernel_size - 1) / 2;
        let conv = Conv2dConfig::new(
            [self.in_channels, self.out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_dilation([self.dilation, self.dilation])
        .with_bias(false)
        .init(device);

        ConvBnRelu {
            conv,
            bn: BatchNormConfig::new(self.out_channels).init(device),
            relu: Relu::new(),
        }
    }
}

/// Convolution followed by batch normalization and ReLU.
#[derive(Module, Debug)]
pub struct ConvBnRelu<B: Backend> {
    conv: Conv2d<B>,
    bn: BatchNorm<B, 2>,
    relu: Relu,
}

impl<B: Backend> ConvBnRelu<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.relu.forward(self.bn.forward(self.conv.forward(x)))
    }
}

/// Two stacked 3x3 [`ConvBnRelu`] blocks.
#[derive(Config, Debug)]
pub struct DoubleConvConfig {
    in_channels: usize,
    out_channels: usize,
}

impl DoubleConvConfig {
    pub fn init<B: Backend>(&self, device: &Device<B>) -> DoubleConv<B> {
        DoubleConv {
            first: ConvBnReluConfig::new(self.in_channels, self.out_channels).init(device),
            second: ConvBnReluConfig::new(self.out_channels, self.out_channels).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    first: ConvBnRelu<B>,
    second: ConvBnRelu<B>,
}

impl<B: Backend> DoubleConv<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.second.forward(self.first.forward(x))
    }
}

/// Resize `x` to the spatial size of `like`.
pub fn resize_like<B: Backend>(x: Tensor<B, 4>, like: &Tensor<B, 4>) -> Tensor<B, 4> {
    let [_, _, h, w] = like.dims();
    resize(x, [h, w])
}

/// Nearest-neighbour resize of `x` to `[h, w]`; a no-op when it already has
/// that size.
///
/// The `ndarray` backend only differentiates nearest interpolation.
pub fn resize<B: Backend>(x: Tensor<B, 4>, size: [usize; 2]) -> Tensor<B, 4> {
    let [_, _, h, w] = x.dims();
    if [h, w] == size {
        return x;
    }
    interpolate(x, size, InterpolateOptions::new(InterpolateMode::Nearest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_dilated_block_keeps_spatial_size() {
        let device = Default::default();
        let block = ConvBnReluConfig::new(3, 5)
            .with_dilation(4)
            .init::<TestBackend>(&device);

        let output = block.forward(Tensor::zeros([2, 3, 9, 7], &device));

        assert_eq!(output.dims(), [2, 5, 9, 7]);
    }

    #[test]
    fn test_resize_backward_on_ndarray() {
        type AD = burn::backend::Autodiff<TestBackend>;
        let device = Default::default();
        let x = Tensor::<AD, 4>::ones([1, 2, 3, 3], &device).require_grad();

        let grads = resize(x.clone(), [6, 5]).sum().backward();
        let grad = x.grad(&grads).unwrap();

        // Every output pixel routes its gradient to exactly one input pixel.
        assert_eq!(grad.dims(), [1, 2, 3, 3]);
        assert_eq!(grad.sum().into_scalar(), 60.0);
    }

    #[test]
    fn test_resize_like() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::ones([1, 2, 3, 3], &device);
        let like = Tensor::<TestBackend, 4>::zeros([1, 1, 6, 5], &device);

        assert_eq!(resize_like(x, &like).dims(), [1, 2, 6, 5]);
    }
}
