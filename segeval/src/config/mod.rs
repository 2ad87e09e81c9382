//! Configuration module.
//!
//! - `core`: the run configuration and its validation
//! - `enums`: closed dataset and model identifiers

pub mod core;
pub mod enums;

pub use self::core::RunConfig;
pub use self::enums::{DatasetKind, ModelKind};
