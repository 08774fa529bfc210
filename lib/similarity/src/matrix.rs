//! Full distance matrices
//!
//! Labels are resolved up front, the metric is prepared once (so k-means
//! trains before any worker starts), then the pairs are spread across the
//! rayon pool and joined before the matrix is assembled.

use crate::engine::DistanceEngine;
use phonodist_core::{DistanceMatrix, FeatureVector, OnError, Result};
use rayon::prelude::*;

/// Build a square distance matrix.
///
/// # Arguments
/// * `engine` - Engine whose system, metrics and cache are used
/// * `symbols` - Symbols in output order; every symbol of the system when `None`
/// * `method` - Metric name; the configured default when `None`
/// * `normalize` - Scale into [0, 1]; the configured default when `None`
///
/// Input symbols are deduplicated by canonical form and labelled with it.
/// Unknown symbols fail under `on_error = raise` and are skipped otherwise.
pub fn build_distance_matrix<S: AsRef<str>>(
    engine: &DistanceEngine,
    symbols: Option<&[S]>,
    method: Option<&str>,
    normalize: Option<bool>,
) -> Result<DistanceMatrix> {
    let system = engine.system();
    let entries: Vec<(&str, &FeatureVector)> = match symbols {
        None => system.iter().collect(),
        Some(symbols) => {
            let on_error = engine.config().on_error();
            let mut entries: Vec<(&str, &FeatureVector)> = Vec::with_capacity(symbols.len());
            for symbol in symbols {
                match system.entry(symbol.as_ref(), on_error)? {
                    Some(entry) if !entries.iter().any(|(seen, _)| *seen == entry.0) => entries.push(entry),
                    Some(_) => {}
                    None => {
                        if on_error == OnError::Warn {
                            tracing::warn!("Skipping '{}' in distance matrix", symbol.as_ref());
                        }
                    }
                }
            }
            entries
        }
    };

    let prepared = engine.prepare(method, normalize)?;
    let symmetric = prepared.is_symmetric();
    let n = entries.len();

    let cells: Vec<(usize, usize)> = (0..n)
        .flat_map(|i| (0..n).map(move |j| (i, j)))
        .filter(|&(i, j)| if symmetric { i < j } else { i != j })
        .collect();

    let values: Vec<f64> = cells
        .par_iter()
        .map(|&(i, j)| engine.distance_prepared(&prepared, entries[i], entries[j]))
        .collect::<Result<Vec<f64>>>()?;

    let mut matrix = DistanceMatrix::zeros(entries.iter().map(|(label, _)| label.to_string()).collect());
    for (&(i, j), value) in cells.iter().zip(values) {
        if symmetric {
            matrix.set_symmetric(i, j, value);
        } else {
            matrix.set(i, j, value);
        }
    }

    tracing::debug!(
        "Built {}x{} distance matrix with method '{}'",
        n,
        n,
        prepared.method()
    );
    Ok(matrix)
}
