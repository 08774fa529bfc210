//! # phonodist
//!
//! Phonetic feature vectors and distances for IPA symbols.
//!
//! phonodist maps IPA symbols to ternary distinctive-feature vectors, measures
//! distances between them under interchangeable metrics, and infers which
//! features distinguish or unite a set of sounds.
//!
//! ## Quick Start
//!
//! ```rust
//! use phonodist::prelude::*;
//!
//! let ctx = Phonodist::new();
//!
//! // p and b differ only in voicing: 1 of 23 features
//! let d = ctx.calculate_distance("p", "b", Some("hamming"), Some(true)).unwrap().unwrap();
//! assert!((d - 1.0 / 23.0).abs() < 1e-12);
//!
//! // The smallest feature set telling t and d apart
//! let minimal = ctx.minimal_matrix(&["t", "d"], false).unwrap();
//! assert_eq!(minimal.features, vec!["voice"]);
//!
//! // A full matrix over a few symbols
//! let matrix = ctx.build_distance_matrix(Some(&["p", "b", "m"][..]), None, None).unwrap();
//! assert_eq!(matrix.labels(), &["p", "b", "m"]);
//! ```
//!
//! ## Crate Structure
//!
//! phonodist is composed of several crates:
//!
//! - [`phonodist-core`](https://docs.rs/phonodist-core) - Feature tables, normalization, configuration, inference
//! - [`phonodist-similarity`](https://docs.rs/phonodist-similarity) - Metrics, k-means, cached engine, matrices
//! - [`phonodist-storage`](https://docs.rs/phonodist-storage) - Matrix and configuration files
//!
//! ## Features
//!
//! - **Ternary Features**: positive, negative and undefined values, never a nullable bool
//! - **IPA Normalization**: idempotent canonicalization of diacritics, length marks, tones and aliases
//! - **Pluggable Metrics**: hamming, jaccard, euclidean, manhattan, cosine, k-means, or your own
//! - **Parallel Matrices**: pairwise distances computed across threads with an LRU cache
//! - **Feature Inference**: minimal distinguishing features and shared class features

pub mod context;

pub use context::Phonodist;

// Re-export core types
pub use phonodist_core::{
    class_features, is_valid_ipa, minimal_matrix, Config, ConfigError, ConfigKey, ConfigStore, ConfigValue, DataError,
    DistanceMatrix, Error, FeatureAssignment, FeatureSystem, FeatureVector, FormatError, InitStatus, LookupError,
    MinimalMatrix, NormalizeOptions, Normalizer, OnError, RegistryError, Result, SystemCatalog, TableFormat, Ternary,
};

// Re-export similarity
pub use phonodist_similarity::{
    build_distance_matrix, CacheStats, ClusterModel, DistanceEngine, DistanceMetric, MetricParams, MetricRegistry,
};

// Re-export storage
pub use phonodist_storage::{
    load_config, load_distance_matrix, read_matrix, save_config, save_distance_matrix, write_matrix, MatrixFormat,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DistanceMatrix, DistanceMetric, Error, FeatureSystem, FeatureVector, MatrixFormat, MetricParams, OnError,
        Phonodist, Result, Ternary,
    };
}
