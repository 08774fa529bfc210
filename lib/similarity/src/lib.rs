//! # phonodist Similarity
//!
//! Distance computation between phonetic symbols.
//!
//! ## Features
//!
//! - **Metrics**: hamming, jaccard, euclidean, manhattan, cosine and a k-means
//!   centroid metric, behind the [`DistanceMetric`] trait
//! - **Registry**: custom metrics registered by name, with revision tracking
//! - **Caching**: bounded LRU cache of pairwise results sized by configuration
//! - **Matrices**: full distance matrices computed in parallel
//!
//! ## Example
//!
//! ```rust
//! use phonodist_core::FeatureSystem;
//! use phonodist_similarity::{build_distance_matrix, DistanceEngine};
//! use std::sync::Arc;
//!
//! let system = Arc::new(FeatureSystem::bundled().unwrap());
//! let engine = DistanceEngine::standalone(system);
//!
//! // p and b differ only in voicing
//! let d = engine.calculate_distance("p", "b", Some("hamming"), Some(false)).unwrap();
//! assert_eq!(d, Some(1.0));
//!
//! let matrix = build_distance_matrix(&engine, Some(&["p", "b", "m"][..]), None, None).unwrap();
//! assert_eq!(matrix.len(), 3);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────>│   Engine    │<────│   Config    │
//! │  (metrics)  │     │ (pair dist) │     │   Store     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                       │         │
//!              ┌────────┘         └────────┐
//!              v                           v
//!       ┌─────────────┐             ┌─────────────┐
//!       │  LRU Cache  │             │ Model Store │
//!       │   (pairs)   │             │  (k-means)  │
//!       └─────────────┘             └─────────────┘
//! ```

pub mod cache;
pub mod distance;
pub mod engine;
pub mod kmeans;
pub mod matrix;
pub mod registry;

// Re-export main types for convenience
pub use cache::{CacheStats, PairCache, PairKey};
pub use distance::{
    cosine_distance, euclidean_distance, hamming_distance, jaccard_distance, manhattan_distance, Cosine,
    DistanceMetric, Euclidean, FnMetric, Hamming, Jaccard, KMeansDistance, Manhattan, MetricParams,
};
pub use engine::{DistanceEngine, PreparedMetric};
pub use kmeans::{ClusterModel, KMeansOptions, ModelStore};
pub use matrix::build_distance_matrix;
pub use registry::{MetricRegistry, RegisteredMetric, BUILTIN_METHODS};
