//! Segmentation training
//!
//! Trains the selected architecture with AdamW on the composite
//! cross-entropy + Dice loss, validates every epoch and keeps the checkpoint
//! with the best validation mIoU.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin train -- --dataset maxar_izmir --root data/izmir --model pspnet \
//!     --list-dir lists --epochs 30 --dice-weight 0.5 --out-dir runs/izmir
//! ```

use anyhow::{Context, Result};
use burn::{config::Config, optim::AdamWConfig};
use clap::Parser;
use segeval::{fit, make_dataset, FileCheckpointStore, Split};
use segeval_cli::{
    build_loader, create_device, get_backend_name, init_model, init_tracing, RunArgs,
    SelectedBackend, TrainingBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    run: RunArgs,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args.run.resolve()?;

    tracing::info!(
        backend = get_backend_name(),
        dataset = config.dataset.slug(),
        model = config.model.name(),
        root = %config.root.display(),
        out_dir = %config.out_dir.display(),
        "configuration loaded"
    );

    std::fs::create_dir_all(&config.out_dir).with_context(|| {
        format!(
            "Failed to create output directory at {}",
            config.out_dir.display()
        )
    })?;
    let config_path = config.out_dir.join("config.json");
    config
        .save(&config_path)
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let size = Some(config.img_size);
    let list_dir = config.list_dir.as_deref();
    let train_dataset = make_dataset(&config.dataset, &config.root, Split::Train, size, list_dir)
        .context("Failed to create training dataset")?;
    let valid_dataset = make_dataset(&config.dataset, &config.root, Split::Val, size, list_dir)
        .context("Failed to create validation dataset")?;

    let train_loader = build_loader::<TrainingBackend>(train_dataset, &config, true);
    let valid_loader = build_loader::<SelectedBackend>(valid_dataset, &config, false);

    let device = create_device();
    let model = init_model::<TrainingBackend>(&config, &device)?;
    let mut store = FileCheckpointStore::new();

    let (_, outcome) = fit(
        &config,
        model,
        AdamWConfig::new().init(),
        train_loader.as_ref(),
        valid_loader.as_ref(),
        &mut store,
        &device,
    )
    .context("Training failed")?;

    match outcome.summary {
        Some(summary) => tracing::info!(
            best_miou = summary.best_miou,
            weights = %summary.weights,
            summary = %config.summary_path().display(),
            "run complete"
        ),
        None => tracing::warn!("no epoch completed; nothing was saved"),
    }

    Ok(())
}
