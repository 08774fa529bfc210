//! # phonodist Storage
//!
//! Persistence for distance matrices (TSV, CSV, JSON) and configuration
//! documents. Every file is written atomically: readers see either the old
//! content or the new, never a partial write.

pub mod config_io;
pub mod matrix_io;

pub use config_io::{load_config, save_config};
pub use matrix_io::{
    load_distance_matrix, read_matrix, save_distance_matrix, write_matrix, MatrixFormat, MatrixMetadata,
};
