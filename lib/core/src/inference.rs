//! Set-level feature inference
//!
//! [`minimal_matrix`] finds the smallest feature subset that tells every
//! symbol of a set apart; [`class_features`] finds the values a whole set
//! shares.

use crate::config::OnError;
use crate::error::Result;
use crate::features::{FeatureAssignment, FeatureSystem};
use crate::vector::{FeatureVector, Ternary};
use serde::{Deserialize, Serialize};

/// Result of [`minimal_matrix`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimalMatrix {
    /// Chosen features, in declared order
    pub features: Vec<String>,
    /// One row per distinct input symbol, in input order
    pub rows: Vec<(String, FeatureAssignment)>,
    /// Symbols no feature of the system can tell apart. Feature-identical
    /// symbols form one group; any other inseparable pair (possible when
    /// undefined values are dropped) is reported as a group of two.
    pub indistinguishable: Vec<Vec<String>>,
}

impl MinimalMatrix {
    pub fn get(&self, symbol: &str) -> Option<&FeatureAssignment> {
        self.rows
            .iter()
            .find(|(label, _)| label == symbol)
            .map(|(_, assignment)| assignment)
    }

    /// True when every pair of symbols is distinguished
    pub fn is_complete(&self) -> bool {
        self.indistinguishable.is_empty()
    }
}

/// Smallest feature subset whose projection is pairwise distinct.
///
/// Subsets are tried by increasing size, and within one size in
/// lexicographic order of feature index, so the first hit is both minimal and
/// the lowest-index candidate. With `drop_undefined` two values separate only
/// when both are defined; otherwise undefined is a value of its own.
/// Symbols that no feature separates are grouped in
/// [`MinimalMatrix::indistinguishable`] and left out of the search.
pub fn minimal_matrix<S: AsRef<str>>(
    system: &FeatureSystem,
    symbols: &[S],
    drop_undefined: bool,
    on_error: OnError,
) -> Result<MinimalMatrix> {
    let entries = resolve(system, symbols, on_error)?;
    let n = entries.len();

    // Pairs some feature separates, each with the features that do. Only
    // identical vectors are merged into groups: with `drop_undefined`,
    // "nothing separates" is not transitive, so other inseparable pairs are
    // reported as they are.
    let mut pairs: Vec<Vec<usize>> = Vec::new();
    let mut identical = UnionFind::new(n);
    let mut inseparable: Vec<Vec<usize>> = Vec::new();
    for i in 0..n {
        for j in i + 1..n {
            let separating: Vec<usize> = (0..system.dim())
                .filter(|&f| separates(entries[i].1, entries[j].1, f, drop_undefined))
                .collect();
            if !separating.is_empty() {
                pairs.push(separating);
            } else if entries[i].1 == entries[j].1 {
                identical.union(i, j);
            } else {
                inseparable.push(vec![i, j]);
            }
        }
    }

    let mut candidates: Vec<usize> = pairs.iter().flatten().copied().collect();
    candidates.sort_unstable();
    candidates.dedup();

    let chosen = search(&candidates, &pairs);
    tracing::debug!(
        "Minimal matrix over {} symbols uses {} of {} features",
        n,
        chosen.len(),
        system.dim()
    );

    let names = system.feature_names();
    let rows = entries
        .iter()
        .map(|(symbol, vector)| {
            let assignment = chosen
                .iter()
                .map(|&f| (names[f].clone(), vector.as_slice()[f]))
                .collect();
            (symbol.to_string(), assignment)
        })
        .collect();

    let mut groups: Vec<Vec<usize>> = identical
        .groups()
        .into_iter()
        .filter(|group| group.len() > 1)
        .chain(inseparable)
        .collect();
    groups.sort();
    let indistinguishable = groups
        .into_iter()
        .map(|group| group.into_iter().map(|i| entries[i].0.to_string()).collect())
        .collect();

    Ok(MinimalMatrix {
        features: chosen.iter().map(|&f| names[f].clone()).collect(),
        rows,
        indistinguishable,
    })
}

/// Features on which every symbol agrees, in declared order.
///
/// Without `drop_undefined`, undefined agrees with undefined. With it,
/// undefined values are ignored and a feature is kept when at least one
/// defined value exists and all defined values agree.
pub fn class_features<S: AsRef<str>>(
    system: &FeatureSystem,
    symbols: &[S],
    drop_undefined: bool,
    on_error: OnError,
) -> Result<FeatureAssignment> {
    let entries = resolve(system, symbols, on_error)?;
    if entries.is_empty() {
        return Ok(FeatureAssignment::new());
    }

    let mut shared = FeatureAssignment::new();
    for (f, name) in system.feature_names().iter().enumerate() {
        let mut values = entries
            .iter()
            .map(|(_, vector)| vector.as_slice()[f])
            .filter(|value| !drop_undefined || value.is_defined());
        let Some(first) = values.next() else {
            continue;
        };
        if values.all(|value| value == first) {
            shared.push(name.clone(), first);
        }
    }
    Ok(shared)
}

// Canonical, deduplicated entries in input order
fn resolve<'a, S: AsRef<str>>(
    system: &'a FeatureSystem,
    symbols: &[S],
    on_error: OnError,
) -> Result<Vec<(&'a str, &'a FeatureVector)>> {
    let mut entries: Vec<(&str, &FeatureVector)> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if let Some(entry) = system.entry(symbol.as_ref(), on_error)? {
            if !entries.iter().any(|(seen, _)| *seen == entry.0) {
                entries.push(entry);
            }
        }
    }
    Ok(entries)
}

fn separates(a: &FeatureVector, b: &FeatureVector, feature: usize, drop_undefined: bool) -> bool {
    let (x, y): (Ternary, Ternary) = (a.as_slice()[feature], b.as_slice()[feature]);
    if drop_undefined {
        x.is_defined() && y.is_defined() && x != y
    } else {
        x != y
    }
}

fn search(candidates: &[usize], pairs: &[Vec<usize>]) -> Vec<usize> {
    if pairs.is_empty() {
        return Vec::new();
    }
    for size in 1..=candidates.len() {
        let mut combination = Combinations::new(candidates.len(), size);
        while let Some(picked) = combination.next_indices() {
            let covers = pairs
                .iter()
                .all(|separating| picked.iter().any(|&c| separating.contains(&candidates[c])));
            if covers {
                return picked.iter().map(|&c| candidates[c]).collect();
            }
        }
    }
    // Every remaining pair has a separating candidate, so the full set covers
    candidates.to_vec()
}

/// k-combinations of `0..n` in lexicographic order
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    started: bool,
}

impl Combinations {
    fn new(n: usize, k: usize) -> Self {
        Self {
            n,
            indices: (0..k).collect(),
            started: false,
        }
    }

    fn next_indices(&mut self) -> Option<&[usize]> {
        let k = self.indices.len();
        if k > self.n {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.indices);
        }
        let mut i = k;
        while i > 0 {
            i -= 1;
            if self.indices[i] < self.n - k + i {
                self.indices[i] += 1;
                for j in i + 1..k {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
                return Some(&self.indices);
            }
        }
        None
    }
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra.max(rb)] = ra.min(rb);
        }
    }

    // Members in ascending order, groups ordered by first member
    fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut by_root: Vec<Vec<usize>> = vec![Vec::new(); n];
        for i in 0..n {
            let root = self.find(i);
            by_root[root].push(i);
        }
        by_root.into_iter().filter(|g| !g.is_empty()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, LookupError};
    use crate::features::TableFormat;

    fn bundled() -> FeatureSystem {
        FeatureSystem::bundled().unwrap()
    }

    #[test]
    fn test_minimal_matrix_t_d() {
        let system = bundled();
        let result = minimal_matrix(&system, &["t", "d"], false, OnError::Raise).unwrap();
        assert_eq!(result.features, vec!["voice"]);
        assert_eq!(result.get("t").unwrap().get("voice"), Some(Ternary::Negative));
        assert_eq!(result.get("d").unwrap().get("voice"), Some(Ternary::Positive));
        assert!(result.is_complete());
    }

    #[test]
    fn test_minimal_matrix_lowest_index_wins() {
        let system = bundled();
        let result = minimal_matrix(&system, &["p", "b", "t"], false, OnError::Raise).unwrap();
        assert_eq!(result.features, vec!["voice", "labial"]);
        let labels: Vec<_> = result.rows.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(labels, vec!["p", "b", "t"]);
    }

    #[test]
    fn test_minimal_matrix_reports_identical_symbols() {
        let text = "sound\tvoice\tnasal\nm\t+\t+\nn\t+\t+\np\t-\t-\n";
        let system = FeatureSystem::parse("tiny", text, &TableFormat::tsv()).unwrap();
        let result = minimal_matrix(&system, &["m", "n", "p"], false, OnError::Raise).unwrap();
        assert_eq!(result.indistinguishable, vec![vec!["m".to_string(), "n".to_string()]]);
        assert_eq!(result.features, vec!["voice"]);
        assert!(!result.is_complete());
    }

    #[test]
    fn test_minimal_matrix_drop_undefined() {
        let text = "sound\tround\tvoice\na\t\t+\no\t+\t+\ne\t-\t-\n";
        let system = FeatureSystem::parse("tiny", text, &TableFormat::tsv()).unwrap();

        // Undefined is a value of its own: round alone separates all three
        let strict = minimal_matrix(&system, &["a", "o", "e"], false, OnError::Raise).unwrap();
        assert_eq!(strict.features, vec!["round"]);

        // Without it, a/o need nothing and are indistinguishable
        let loose = minimal_matrix(&system, &["a", "o", "e"], true, OnError::Raise).unwrap();
        assert_eq!(loose.indistinguishable, vec![vec!["a".to_string(), "o".to_string()]]);
        assert_eq!(loose.features, vec!["voice"]);
    }

    #[test]
    fn test_minimal_matrix_inseparable_pairs_not_merged() {
        let text = "sound\tround\na\t\no\t+\ne\t-\n";
        let system = FeatureSystem::parse("tiny", text, &TableFormat::tsv()).unwrap();
        let result = minimal_matrix(&system, &["a", "o", "e"], true, OnError::Raise).unwrap();

        // o and e differ in round; only a is ambiguous against each of them
        assert_eq!(result.features, vec!["round"]);
        assert_eq!(
            result.indistinguishable,
            vec![
                vec!["a".to_string(), "o".to_string()],
                vec!["a".to_string(), "e".to_string()],
            ]
        );
        assert!(!result
            .indistinguishable
            .iter()
            .any(|group| group.contains(&"o".to_string()) && group.contains(&"e".to_string())));
    }

    #[test]
    fn test_minimal_matrix_dedup_and_unknown() {
        let system = bundled();
        let result = minimal_matrix(&system, &["g", "ɡ", "k", "zz"], false, OnError::Ignore).unwrap();
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.features, vec!["voice"]);

        assert!(matches!(
            minimal_matrix(&system, &["zz"], false, OnError::Raise),
            Err(Error::Lookup(LookupError::UnknownSymbol { .. }))
        ));

        let single = minimal_matrix(&system, &["k"], false, OnError::Raise).unwrap();
        assert!(single.features.is_empty());
        assert_eq!(single.rows.len(), 1);
    }

    #[test]
    fn test_class_features() {
        let system = bundled();
        let strict = class_features(&system, &["p", "b"], false, OnError::Raise).unwrap();
        assert_eq!(strict.len(), system.dim() - 1);
        assert_eq!(strict.get("voice"), None);
        assert_eq!(strict.get("anterior"), Some(Ternary::Undefined));

        let loose = class_features(&system, &["p", "b"], true, OnError::Raise).unwrap();
        assert_eq!(loose.get("anterior"), None);
        assert_eq!(loose.get("labial"), Some(Ternary::Positive));
        assert_eq!(loose.len(), system.dim() - 7);

        let coronals = class_features(&system, &["t", "d", "s", "z"], true, OnError::Raise).unwrap();
        assert_eq!(coronals.get("coronal"), Some(Ternary::Positive));
        assert_eq!(coronals.get("anterior"), Some(Ternary::Positive));
        assert_eq!(coronals.get("voice"), None);
        assert_eq!(coronals.get("continuant"), None);

        let empty: [&str; 0] = [];
        assert!(class_features(&system, &empty, false, OnError::Raise).unwrap().is_empty());
    }

    #[test]
    fn test_combinations_lexicographic() {
        let mut combos = Combinations::new(4, 2);
        let mut seen = Vec::new();
        while let Some(c) = combos.next_indices() {
            seen.push(c.to_vec());
        }
        assert_eq!(
            seen,
            vec![vec![0, 1], vec![0, 2], vec![0, 3], vec![1, 2], vec![1, 3], vec![2, 3]]
        );
    }
}
