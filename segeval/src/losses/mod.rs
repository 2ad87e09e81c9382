//! Loss functions for segmentation training.
//!
//! - `dice`: multi-class soft Dice over softmax probabilities
//! - `composite`: pixel-wise cross-entropy plus weighted Dice

pub mod composite;
pub mod dice;

pub use composite::{CompositeLoss, CompositeLossConfig};
pub use dice::{DiceLoss, DiceLossConfig};
