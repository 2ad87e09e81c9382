//! segeval command-line tools
//!
//! - `train`: train a segmentation model, keeping the best checkpoint by validation mIoU
//! - `evaluate`: score a checkpoint on a dataset split
//!
//! ## Usage
//!
//! ```bash
//! # Train with flags
//! cargo run --bin train -- --dataset spot67 --root data/spot67 --model unet++ --out-dir runs
//!
//! # Train from a config file, overriding the Dice weight
//! cargo run --bin train -- --config run.json --dice-weight 0.5
//!
//! # Evaluate the best checkpoint on the test split
//! cargo run --bin evaluate -- --config runs/config.json --split test
//!
//! # Train on the GPU
//! cargo run --bin train --features wgpu --no-default-features -- --config run.json
//! ```

pub mod backend;
pub mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    tensor::backend::Backend,
};
use segeval::{RunConfig, SegBatch, SegBatcher, SegDataset, SegNet, SegNetConfig};
use tracing_subscriber::EnvFilter;

pub use backend::{create_device, get_backend_name, SelectedBackend, SelectedDevice, TrainingBackend};
pub use config::RunArgs;

/// Install the `fmt` subscriber; `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Wrap a dataset in a batched loader for backend `B`.
pub fn build_loader<B: Backend>(
    dataset: SegDataset,
    config: &RunConfig,
    shuffle: bool,
) -> Arc<dyn DataLoader<B, SegBatch<B>>> {
    let builder = DataLoaderBuilder::new(SegBatcher::new())
        .batch_size(config.batch_size)
        .num_workers(config.num_workers);
    let builder = if shuffle {
        builder.shuffle(config.seed)
    } else {
        builder
    };
    builder.build(dataset)
}

/// Seed backend `B` with `config.seed`, then build the configured network.
///
/// # Errors
///
/// Returns an error if the network configuration is rejected.
pub fn init_model<B: Backend>(config: &RunConfig, device: &B::Device) -> Result<SegNet<B>> {
    B::seed(config.seed);
    SegNetConfig::from_run(config)
        .init::<B>(device)
        .context("Failed to initialize model")
}
