//! # phonodist Core
//!
//! Core library for phonodist, a phonetic feature and distance toolkit.
//!
//! This crate provides the fundamental data structures and algorithms:
//!
//! - [`Ternary`] / [`FeatureVector`] - Positive, negative or undefined feature values
//! - [`Normalizer`] - IPA symbol canonicalization
//! - [`FeatureSystem`] - Symbol to feature vector table loaded from TSV/CSV
//! - [`SystemCatalog`] - Lazily loaded default system plus named custom systems
//! - [`ConfigStore`] - Validated runtime options
//! - [`minimal_matrix`] / [`class_features`] - Set-level feature inference
//!
//! ## Example
//!
//! ```rust
//! use phonodist_core::{FeatureSystem, OnError, Ternary};
//!
//! let system = FeatureSystem::bundled().unwrap();
//!
//! // ASCII "g" is an alias of IPA "ɡ"
//! let g = system.lookup("g", OnError::Raise).unwrap().unwrap();
//! assert_eq!(g.dim(), system.dim());
//!
//! let nasals = system
//!     .reverse_lookup(&[("nasal", Ternary::Positive), ("syllabic", Ternary::Negative)], false)
//!     .unwrap();
//! assert!(nasals.contains(&"m".to_string()));
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod lazy;
pub mod matrix;
pub mod normalize;
pub mod table;
pub mod vector;

pub use catalog::SystemCatalog;
pub use config::{Config, ConfigKey, ConfigStore, ConfigValue, OnError};
pub use error::{ConfigError, DataError, Error, FormatError, LookupError, RegistryError, Result};
pub use features::{FeatureAssignment, FeatureSystem, TableFormat, BUNDLED_TABLE, DEFAULT_SYSTEM};
pub use inference::{class_features, minimal_matrix, MinimalMatrix};
pub use lazy::{InitStatus, SingleFlight};
pub use matrix::DistanceMatrix;
pub use normalize::{is_valid_ipa, NormalizeOptions, Normalizer};
pub use vector::{FeatureVector, Ternary};
