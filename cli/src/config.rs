//! Run configuration from a JSON file and command-line overrides.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use burn::config::Config;
use clap::Args;
use segeval::{DatasetKind, ModelKind, RunConfig};

/// Flags shared by the `train` and `evaluate` binaries.
///
/// Without `--config`, `--dataset`, `--root` and `--model` are required.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Run configuration file (JSON); the flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Dataset layout: spot67 or maxar_izmir
    #[arg(long)]
    pub dataset: Option<DatasetKind>,

    /// Dataset root containing images/ and masks/
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Architecture: unet++, deeplabv3+ or pspnet
    #[arg(long)]
    pub model: Option<ModelKind>,

    /// Directory holding {dataset}_{split}.txt stem lists
    #[arg(long)]
    pub list_dir: Option<PathBuf>,

    #[arg(long)]
    pub img_size: Option<u32>,

    #[arg(long)]
    pub num_classes: Option<usize>,

    /// Class scored by the foreground statistics
    #[arg(long)]
    pub fg_class: Option<usize>,

    /// Weight of the Dice term; 0 trains with cross-entropy only
    #[arg(long)]
    pub dice_weight: Option<f32>,

    /// Base channel width of the network
    #[arg(long)]
    pub width: Option<usize>,

    #[arg(long)]
    pub epochs: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Learning rate
    #[arg(long = "lr")]
    pub learning_rate: Option<f64>,

    /// Output directory for checkpoints, summary and history
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    #[arg(long)]
    pub num_workers: Option<usize>,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl RunArgs {
    /// Build the validated run configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be read, required
    /// flags are missing, or the result fails validation.
    pub fn resolve(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::load(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => {
                let (Some(dataset), Some(root), Some(model)) =
                    (&self.dataset, &self.root, &self.model)
                else {
                    bail!("--dataset, --root and --model are required without --config");
                };
                RunConfig::new(dataset.clone(), root.clone(), model.clone())
            }
        };

        if let Some(dataset) = &self.dataset {
            config.dataset = dataset.clone();
        }
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(list_dir) = &self.list_dir {
            config.list_dir = Some(list_dir.clone());
        }
        if let Some(out_dir) = &self.out_dir {
            config.out_dir = out_dir.clone();
        }
        if let Some(img_size) = self.img_size {
            config.img_size = img_size;
        }
        if let Some(num_classes) = self.num_classes {
            config.num_classes = num_classes;
        }
        if let Some(fg_class) = self.fg_class {
            config.fg_class = fg_class;
        }
        if let Some(dice_weight) = self.dice_weight {
            config.dice_weight = dice_weight;
        }
        if let Some(width) = self.width {
            config.width = width;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(num_workers) = self.num_workers {
            config.num_workers = num_workers;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        config.validate().context("Invalid run configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        run: RunArgs,
    }

    #[test]
    fn test_flags_build_config() {
        let cli = Cli::parse_from([
            "train",
            "--dataset",
            "maxar_izmir",
            "--root",
            "data",
            "--model",
            "deeplabv3+",
            "--dice-weight",
            "0.5",
            "--lr",
            "0.01",
        ]);

        let config = cli.run.resolve().unwrap();

        assert_eq!(config.dataset, DatasetKind::MaxarIzmir);
        assert_eq!(config.model, ModelKind::DeepLabV3Plus);
        assert_eq!(config.dice_weight, 0.5);
        assert_eq!(config.learning_rate, 0.01);
        assert_eq!(config.epochs, 30);
    }

    #[test]
    fn test_missing_required_flags() {
        let cli = Cli::parse_from(["train", "--root", "data"]);
        assert!(cli.run.resolve().is_err());
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = Cli::parse_from([
            "train",
            "--dataset",
            "spot67",
            "--root",
            "data",
            "--model",
            "pspnet",
            "--fg-class",
            "2",
        ]);
        assert!(cli.run.resolve().is_err());
    }

    #[test]
    fn test_file_config_with_override() {
        let dir = std::env::temp_dir().join(format!("segeval_cli_cfg_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("run.json");
        RunConfig::new(DatasetKind::Spot67, "data".into(), ModelKind::PspNet)
            .with_epochs(7)
            .save(&path)
            .unwrap();

        let cli = Cli::parse_from([
            "train",
            "--config",
            path.to_str().unwrap(),
            "--batch-size",
            "16",
        ]);
        let config = cli.run.resolve().unwrap();

        assert_eq!(config.epochs, 7);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.model, ModelKind::PspNet);

        std::fs::remove_dir_all(dir).unwrap();
    }
}
