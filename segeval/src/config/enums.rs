//! Enumeration types for run configuration.
//!
//! Dataset and model identifiers are closed sets resolved once, when the
//! configuration is built. An unknown name fails at startup, never mid-run.

use std::str::FromStr;

use burn::prelude::*;

use crate::error::SegEvalError;

/// Defines the source dataset.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum DatasetKind {
    /// SPOT 6/7 building footprints.
    Spot67,
    /// MAXAR imagery over Izmir.
    MaxarIzmir,
}

impl DatasetKind {
    /// Identifier used in split list names and checkpoint names.
    #[must_use]
    pub const fn slug(&self) -> &'static str {
        match self {
            Self::Spot67 => "spot67",
            Self::MaxarIzmir => "maxar_izmir",
        }
    }
}

impl FromStr for DatasetKind {
    type Err = SegEvalError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "spot67" => Ok(Self::Spot67),
            "maxar_izmir" => Ok(Self::MaxarIzmir),
            _ => Err(SegEvalError::UnknownDataset {
                name: name.to_string(),
            }),
        }
    }
}

/// Defines the segmentation architecture.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum ModelKind {
    /// U-Net++ style encoder/decoder with skip connections.
    UnetPlusPlus,
    /// DeepLabv3+ style atrous pyramid.
    DeepLabV3Plus,
    /// PSPNet style pooling pyramid.
    PspNet,
}

impl ModelKind {
    /// Canonical user-facing name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UnetPlusPlus => "unet++",
            Self::DeepLabV3Plus => "deeplabv3+",
            Self::PspNet => "pspnet",
        }
    }

    /// File-system safe identifier (`+` spelled out).
    #[must_use]
    pub fn slug(&self) -> String {
        self.name().replace('+', "plus")
    }
}

impl FromStr for ModelKind {
    type Err = SegEvalError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "unet++" | "unetpp" | "unetplusplus" | "u-net++" => Ok(Self::UnetPlusPlus),
            "deeplabv3+" | "deeplab" | "deeplabv3plus" => Ok(Self::DeepLabV3Plus),
            "pspnet" | "psp" => Ok(Self::PspNet),
            _ => Err(SegEvalError::UnknownModel {
                name: name.to_string(),
            }),
        }
    }
}
