//! # Segmentation Models
//!
//! - `blocks`: convolution building blocks
//! - `heads`: skip, atrous and pyramid context heads
//! - `segnet`: the baseline network assembling them per [`ModelKind`](crate::config::ModelKind)

pub mod blocks;
pub mod heads;
pub mod segnet;

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

pub use segnet::{SegNet, SegNetConfig};

/// A network mapping images to per-pixel class scores.
pub trait SegmentationModel<B: Backend>: Module<B> {
    /// Images `[N, 3, H, W]` in `[0, 1]` to raw scores `[N, C, H, W]`.
    fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}
