//! Core run configuration.
//!
//! [`RunConfig`] gathers everything the training driver needs before the
//! first epoch: data location, model choice, loss mixing, foreground class
//! and the optimisation schedule. Use [`RunConfig::validate`] to reject
//! inconsistent settings eagerly.

use std::path::PathBuf;

use burn::prelude::*;

use super::enums::{DatasetKind, ModelKind};
use crate::error::{SegEvalError, SegEvalResult};

/// Main configuration for a training run.
#[derive(Config, Debug)]
pub struct RunConfig {
    /// Which dataset layout and split list prefix to use.
    pub dataset: DatasetKind,
    /// Dataset root directory containing `images/` and `masks/`.
    pub root: PathBuf,
    /// Which architecture to build.
    pub model: ModelKind,
    /// Directory holding `{dataset}_{split}.txt` stem lists.
    #[config(default = "None")]
    pub list_dir: Option<PathBuf>,
    /// Output directory for checkpoints and the run summary.
    #[config(default = "PathBuf::from(\"runs\")")]
    pub out_dir: PathBuf,
    /// Side length images and masks are resized to.
    #[config(default = 512)]
    pub img_size: u32,
    /// Number of segmentation classes (background included).
    #[config(default = 2)]
    pub num_classes: usize,
    /// Class treated as positive for the binary foreground statistics.
    #[config(default = 1)]
    pub fg_class: usize,
    /// Weight of the Dice term in the composite loss. Zero disables it.
    #[config(default = 0.0)]
    pub dice_weight: f32,
    /// Smoothing added to metric numerators and denominators.
    #[config(default = 1e-7)]
    pub epsilon: f64,
    /// Base channel width of the baseline network.
    #[config(default = 32)]
    pub width: usize,
    #[config(default = 30)]
    pub epochs: usize,
    #[config(default = 4)]
    pub batch_size: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    #[config(default = 4)]
    pub num_workers: usize,
    /// Random seed for reproducibility.
    #[config(default = 42)]
    pub seed: u64,
}

impl RunConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegEvalError::ClassOutOfRange)` if the foreground class
    /// does not exist, and `Err(SegEvalError::InvalidConfiguration)` for any
    /// other inconsistent value.
    pub fn validate(&self) -> SegEvalResult<()> {
        if self.num_classes < 2 {
            return Err(SegEvalError::InvalidConfiguration {
                reason: format!("num_classes must be >= 2, got {}", self.num_classes),
            });
        }

        if self.fg_class >= self.num_classes {
            return Err(SegEvalError::ClassOutOfRange {
                class_id: self.fg_class,
                num_classes: self.num_classes,
            });
        }

        if !(self.dice_weight >= 0.0 && self.dice_weight.is_finite()) {
            return Err(SegEvalError::InvalidConfiguration {
                reason: format!(
                    "dice_weight must be finite and >= 0, got {}",
                    self.dice_weight
                ),
            });
        }

        if !(self.epsilon > 0.0 && self.epsilon < 1e-2) {
            return Err(SegEvalError::InvalidConfiguration {
                reason: format!("epsilon must lie in (0, 1e-2), got {}", self.epsilon),
            });
        }

        if self.batch_size == 0 || self.epochs == 0 {
            return Err(SegEvalError::InvalidConfiguration {
                reason: "batch_size and epochs must be greater than 0".to_string(),
            });
        }

        if self.learning_rate <= 0.0 {
            return Err(SegEvalError::InvalidConfiguration {
                reason: format!("learning_rate must be positive, got {}", self.learning_rate),
            });
        }

        // Pooling pyramids and the skip decoder halve the input at least twice.
        if self.img_size < 8 || self.width == 0 {
            return Err(SegEvalError::InvalidConfiguration {
                reason: format!(
                    "img_size must be >= 8 and width > 0, got {} and {}",
                    self.img_size, self.width
                ),
            });
        }

        Ok(())
    }

    /// Path of the checkpoint written whenever validation mIoU improves.
    #[must_use]
    pub fn best_checkpoint_path(&self) -> PathBuf {
        self.out_dir.join(format!(
            "best_{}_{}.mpk",
            self.model.slug(),
            self.dataset.slug()
        ))
    }

    #[must_use]
    pub fn summary_path(&self) -> PathBuf {
        self.out_dir.join("summary.json")
    }

    #[must_use]
    pub fn history_path(&self) -> PathBuf {
        self.out_dir.join("history.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RunConfig {
        RunConfig::new(
            DatasetKind::Spot67,
            PathBuf::from("data"),
            ModelKind::UnetPlusPlus,
        )
    }

    #[test]
    fn test_default_configuration_is_valid() {
        assert!(base().validate().is_ok());
    }

    #[test]
    fn test_foreground_class_out_of_range() {
        let config = base().with_num_classes(2).with_fg_class(2);

        match config.validate() {
            Err(SegEvalError::ClassOutOfRange {
                class_id,
                num_classes,
            }) => {
                assert_eq!(class_id, 2);
                assert_eq!(num_classes, 2);
            }
            other => panic!("Expected ClassOutOfRange error, got {other:?}"),
        }
    }

    #[test]
    fn test_single_class_rejected() {
        let config = base().with_num_classes(1).with_fg_class(0);
        assert!(matches!(
            config.validate(),
            Err(SegEvalError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_negative_dice_weight_rejected() {
        let config = base().with_dice_weight(-0.5);
        match config.validate() {
            Err(SegEvalError::InvalidConfiguration { reason }) => {
                assert!(reason.contains("dice_weight"));
            }
            other => panic!("Expected InvalidConfiguration error, got {other:?}"),
        }
    }

    #[test]
    fn test_checkpoint_name() {
        let config = RunConfig::new(
            DatasetKind::MaxarIzmir,
            PathBuf::from("data"),
            ModelKind::DeepLabV3Plus,
        )
        .with_out_dir(PathBuf::from("out"));
        assert_eq!(
            config.best_checkpoint_path(),
            PathBuf::from("out/best_deeplabv3plus_maxar_izmir.mpk")
        );
    }
}
