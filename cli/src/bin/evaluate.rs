//! Checkpoint evaluation
//!
//! Loads a trained checkpoint and runs one validation pass over a dataset
//! split, printing the report as JSON.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin evaluate -- --config runs/izmir/config.json --split test
//! ```

use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use clap::{Parser, ValueEnum};
use segeval::{evaluate, make_dataset, CheckpointStore, FileCheckpointStore, Split};
use segeval_cli::{
    build_loader, create_device, get_backend_name, init_model, init_tracing, RunArgs,
    SelectedBackend,
};

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SplitArg {
    Train,
    Val,
    Test,
}

impl From<SplitArg> for Split {
    fn from(split: SplitArg) -> Self {
        match split {
            SplitArg::Train => Self::Train,
            SplitArg::Val => Self::Val,
            SplitArg::Test => Self::Test,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(flatten)]
    run: RunArgs,

    /// Checkpoint to evaluate; defaults to the run's best checkpoint
    #[arg(long)]
    weights: Option<PathBuf>,

    /// Dataset split to score
    #[arg(long, value_enum, default_value = "val")]
    split: SplitArg,

    /// Also write the JSON report to this file
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = args.run.resolve()?;
    let weights = args
        .weights
        .clone()
        .unwrap_or_else(|| config.best_checkpoint_path());

    ensure!(
        weights.is_file(),
        "Checkpoint file not found: {}",
        weights.display()
    );

    let split = Split::from(args.split);
    tracing::info!(
        backend = get_backend_name(),
        weights = %weights.display(),
        %split,
        "evaluating checkpoint"
    );

    let dataset = make_dataset(
        &config.dataset,
        &config.root,
        split,
        Some(config.img_size),
        config.list_dir.as_deref(),
    )
    .with_context(|| format!("Failed to create {split} dataset"))?;
    let loader = build_loader::<SelectedBackend>(dataset, &config, false);

    let device = create_device();
    let model = init_model::<SelectedBackend>(&config, &device)?;
    let model = CheckpointStore::<SelectedBackend, _>::load(
        &FileCheckpointStore::new(),
        model,
        &weights,
        &device,
    )
    .context("Failed to load checkpoint")?;

    let report = evaluate(&config, &model, loader.as_ref(), &device).context("Evaluation failed")?;

    let json = serde_json::to_string_pretty(&report)?;
    if let Some(output) = &args.output {
        std::fs::write(output, &json)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
    }
    println!("{json}");

    Ok(())
}
