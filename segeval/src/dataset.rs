//! Segmentation datasets and batching.
//!
//! Items keep raw host buffers and the [`SegBatcher`] turns them into
//! tensors, so a dataset can be shared by loaders on different backends.
//!
//! On disk a dataset root holds `images/*.png` (RGB) and `masks/*.png`
//! (grayscale class ids, 0 = background). An optional list file
//! `{list_dir}/{dataset}_{split}.txt` restricts and orders the stems.

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Int, Tensor, TensorData},
};

#[cfg(feature = "dataset")]
pub use self::files::{make_dataset, SegDataset, Split};

/// One image/mask pair, already resized.
#[derive(Debug, Clone, PartialEq)]
pub struct SegItem {
    /// Channel-first RGB values in `[0, 1]`, length `3 * height * width`.
    pub image: Vec<f32>,
    /// Row-major class ids, length `height * width`.
    pub mask: Vec<i64>,
    pub height: usize,
    pub width: usize,
    /// File stem the pair was read from.
    pub stem: String,
}

/// A batch of images and their truth masks.
#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    /// Images with shape [N, 3, H, W] in `[0, 1]`.
    pub images: Tensor<B, 4>,
    /// Class ids with shape [N, H, W].
    pub masks: Tensor<B, 3, Int>,
}

/// Stacks [`SegItem`]s into a [`SegBatch`].
#[derive(Debug, Clone, Default)]
pub struct SegBatcher;

impl SegBatcher {
    pub const fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, SegItem, SegBatch<B>> for SegBatcher {
    fn batch(&self, items: Vec<SegItem>, device: &B::Device) -> SegBatch<B> {
        let mut images = Vec::with_capacity(items.len());
        let mut masks = Vec::with_capacity(items.len());

        for item in items {
            let (h, w) = (item.height, item.width);
            images.push(Tensor::<B, 3>::from_data(
                TensorData::new(item.image, [3, h, w]),
                device,
            ));
            masks.push(Tensor::<B, 2, Int>::from_data(
                TensorData::new(item.mask, [h, w]),
                device,
            ));
        }

        SegBatch {
            images: Tensor::stack(images, 0),
            masks: Tensor::stack(masks, 0),
        }
    }
}

#[cfg(feature = "dataset")]
mod files {
    use std::{
        fmt,
        path::{Path, PathBuf},
    };

    use burn::data::dataset::Dataset;
    use image::{imageops::FilterType, DynamicImage};
    use walkdir::WalkDir;

    use super::SegItem;
    use crate::{
        config::DatasetKind,
        error::{SegEvalError, SegEvalResult},
    };

    /// Dataset split, used to pick the stem list file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Split {
        Train,
        Val,
        Test,
    }

    impl Split {
        pub const fn as_str(self) -> &'static str {
            match self {
                Self::Train => "train",
                Self::Val => "val",
                Self::Test => "test",
            }
        }
    }

    impl fmt::Display for Split {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// Image/mask pairs read lazily from a dataset root.
    #[derive(Debug, Clone)]
    pub struct SegDataset {
        items: Vec<(PathBuf, PathBuf)>,
        size: Option<u32>,
    }

    impl SegDataset {
        /// Index a dataset root.
        ///
        /// With a `split_list` that exists, its non-empty lines are the stems in
        /// order. Otherwise every `images/*.png` is used, sorted by name.
        ///
        /// # Errors
        ///
        /// Returns `Err(SegEvalError::Dataset)` if the directories are missing,
        /// a listed image or its mask does not exist or has an unreadable
        /// header, or nothing was found.
        pub fn new(
            root: impl AsRef<Path>,
            split_list: Option<&Path>,
            size: Option<u32>,
        ) -> SegEvalResult<Self> {
            let root = root.as_ref();
            let image_dir = root.join("images");
            let mask_dir = root.join("masks");

            for dir in [&image_dir, &mask_dir] {
                if !dir.is_dir() {
                    return Err(SegEvalError::Dataset {
                        message: format!("directory does not exist: {}", dir.display()),
                    });
                }
            }

            let stems = match split_list.filter(|path| path.exists()) {
                Some(list) => read_stem_list(list)?,
                None => scan_stems(&image_dir)?,
            };

            let mut items = Vec::with_capacity(stems.len());
            for stem in stems {
                let image = image_dir.join(format!("{stem}.png"));
                let mask = mask_dir.join(format!("{stem}.png"));
                for path in [&image, &mask] {
                    if !path.is_file() {
                        return Err(SegEvalError::Dataset {
                            message: format!("missing file for stem '{stem}': {}", path.display()),
                        });
                    }
                    // Header only; full decoding stays lazy.
                    image::image_dimensions(path).map_err(|e| SegEvalError::Dataset {
                        message: format!("unreadable image for stem '{stem}': {}: {e}", path.display()),
                    })?;
                }
                items.push((image, mask));
            }

            if items.is_empty() {
                return Err(SegEvalError::Dataset {
                    message: format!("no image/mask pairs found in {}", root.display()),
                });
            }

            tracing::info!(pairs = items.len(), root = %root.display(), "indexed dataset");
            Ok(Self { items, size })
        }

        /// Decode the pair at `index`.
        ///
        /// # Errors
        ///
        /// Returns `Err(SegEvalError::Dataset)` for an out-of-range index or an
        /// undecodable file.
        pub fn load(&self, index: usize) -> SegEvalResult<SegItem> {
            let (image_path, mask_path) =
                self.items.get(index).ok_or_else(|| SegEvalError::Dataset {
                    message: format!("index {index} out of range for {} items", self.items.len()),
                })?;

            let image = open(image_path)?;
            let mask = open(mask_path)?;

            let (image, mask) = match self.size {
                Some(size) => (
                    image.resize_exact(size, size, FilterType::Triangle),
                    mask.resize_exact(size, size, FilterType::Nearest),
                ),
                None => (image, mask),
            };

            let image = image.to_rgb8();
            let mask = mask.to_luma8();
            if image.dimensions() != mask.dimensions() {
                return Err(SegEvalError::shape(
                    format!("mask {:?} matching its image", image.dimensions()),
                    format!("mask {:?} for {}", mask.dimensions(), mask_path.display()),
                ));
            }

            let (width, height) = image.dimensions();
            let (width, height) = (width as usize, height as usize);
            let plane = width * height;

            // HWC bytes to CHW floats in [0, 1].
            let mut chw = vec![0.0f32; 3 * plane];
            for (pixel_index, pixel) in image.pixels().enumerate() {
                for (channel, value) in pixel.0.iter().enumerate() {
                    chw[channel * plane + pixel_index] = f32::from(*value) / 255.0;
                }
            }

            Ok(SegItem {
                image: chw,
                mask: mask.into_raw().into_iter().map(i64::from).collect(),
                height,
                width,
                stem: stem_of(image_path),
            })
        }
    }

    /// A pair that fails to decode yields `None`, which ends the loader's
    /// iteration; the training driver reports the short epoch as an error.
    impl Dataset<SegItem> for SegDataset {
        fn get(&self, index: usize) -> Option<SegItem> {
            match self.load(index) {
                Ok(item) => Some(item),
                Err(error) => {
                    tracing::error!(index, %error, "failed to load dataset item");
                    None
                }
            }
        }

        fn len(&self) -> usize {
            self.items.len()
        }
    }

    /// Build the dataset for `kind` and `split`.
    ///
    /// The stem list is looked up as `{list_dir}/{kind.slug()}_{split}.txt`.
    ///
    /// # Errors
    ///
    /// See [`SegDataset::new`].
    pub fn make_dataset(
        kind: &DatasetKind,
        root: impl AsRef<Path>,
        split: Split,
        size: Option<u32>,
        list_dir: Option<&Path>,
    ) -> SegEvalResult<SegDataset> {
        let split_list =
            list_dir.map(|dir| dir.join(format!("{}_{}.txt", kind.slug(), split.as_str())));
        tracing::debug!(dataset = kind.slug(), %split, list = ?split_list, "building dataset");
        SegDataset::new(root, split_list.as_deref(), size)
    }

    fn read_stem_list(path: &Path) -> SegEvalResult<Vec<String>> {
        let content = std::fs::read_to_string(path)?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn scan_stems(image_dir: &Path) -> SegEvalResult<Vec<String>> {
        let mut stems = Vec::new();
        for entry in WalkDir::new(image_dir).min_depth(1).max_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| SegEvalError::Dataset {
                message: format!("failed to read {}: {e}", image_dir.display()),
            })?;
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "png") {
                stems.push(stem_of(path));
            }
        }
        Ok(stems)
    }

    fn stem_of(path: &Path) -> String {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn open(path: &Path) -> SegEvalResult<DynamicImage> {
        image::open(path).map_err(|e| SegEvalError::Dataset {
            message: format!("failed to decode {}: {e}", path.display()),
        })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::ElementConversion;

    type TestBackend = NdArray<f32>;

    fn item(fill: f32, id: i64) -> SegItem {
        SegItem {
            image: vec![fill; 3 * 2 * 3],
            mask: vec![id; 2 * 3],
            height: 2,
            width: 3,
            stem: String::new(),
        }
    }

    #[test]
    fn test_batcher_stacks_items() {
        let device = Default::default();
        let batch: SegBatch<TestBackend> =
            SegBatcher::new().batch(vec![item(0.5, 0), item(1.0, 1)], &device);

        assert_eq!(batch.images.dims(), [2, 3, 2, 3]);
        assert_eq!(batch.masks.dims(), [2, 2, 3]);
        assert_eq!(batch.masks.sum().into_scalar().elem::<i64>(), 6);
    }
}
