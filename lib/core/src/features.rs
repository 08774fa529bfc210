//! Feature systems
//!
//! A [`FeatureSystem`] is an immutable table mapping canonical symbols to
//! ternary [`FeatureVector`]s, parsed from a delimited source:
//!
//! ```text
//! sound   voice   labial  coronal
//! p       -       +       -
//! b       +       +       -
//! t       -       -       +
//! ```
//!
//! Cells are `+` (positive), `-` (negative) or blank/`0` (undefined). Symbols
//! are canonicalized with the system's [`Normalizer`] at load time and again
//! on every lookup, so `"g"` finds the row written as `ɡ`.

use crate::config::OnError;
use crate::error::{DataError, Error, LookupError, Result};
use crate::normalize::Normalizer;
use crate::table::split_record;
use crate::vector::{FeatureVector, Ternary};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use uuid::Uuid;

/// Default feature table shipped with the crate
pub const BUNDLED_TABLE: &str = include_str!("../data/features.tsv");

/// Name under which the bundled system is registered
pub const DEFAULT_SYSTEM: &str = "default";

/// Layout of a delimited feature table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    pub delimiter: char,
    /// Header name of the symbol column; the first column when unset
    pub symbol_column: Option<String>,
    /// Columns that are neither the symbol nor a feature
    pub metadata_columns: Vec<String>,
    /// Optional column holding one alternative spelling per symbol
    pub alias_column: Option<String>,
}

impl Default for TableFormat {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            symbol_column: None,
            metadata_columns: ["name", "description", "note", "alias"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            alias_column: Some("alias".to_string()),
        }
    }
}

impl TableFormat {
    pub fn tsv() -> Self {
        Self::default()
    }

    pub fn csv() -> Self {
        Self {
            delimiter: ',',
            ..Self::default()
        }
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_symbol_column(mut self, column: impl Into<String>) -> Self {
        self.symbol_column = Some(column.into());
        self
    }
}

/// Ordered feature → value pairs; a partial view of one or more vectors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureAssignment {
    entries: Vec<(String, Ternary)>,
}

impl FeatureAssignment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: impl Into<String>, value: Ternary) {
        self.entries.push((feature.into(), value));
    }

    pub fn get(&self, feature: &str) -> Option<Ternary> {
        self.entries
            .iter()
            .find(|(name, _)| name == feature)
            .map(|(_, value)| *value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn features(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Ternary)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl FromIterator<(String, Ternary)> for FeatureAssignment {
    fn from_iter<I: IntoIterator<Item = (String, Ternary)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Immutable symbol → feature vector table
#[derive(Debug, Clone)]
pub struct FeatureSystem {
    id: Uuid,
    name: String,
    features: Vec<String>,
    feature_index: AHashMap<String, usize>,
    symbols: Vec<String>,
    vectors: Vec<FeatureVector>,
    index: AHashMap<String, usize>,
    aliases: AHashMap<String, usize>,
    normalizer: Normalizer,
}

impl FeatureSystem {
    /// The table embedded in the crate
    pub fn bundled() -> Result<Self> {
        Self::parse(
            DEFAULT_SYSTEM,
            BUNDLED_TABLE,
            &TableFormat::tsv().with_symbol_column("sound"),
        )
    }

    pub fn parse(name: &str, text: &str, format: &TableFormat) -> Result<Self> {
        Self::parse_with(name, text, format, Normalizer::default())
    }

    pub fn from_reader<R: Read>(name: &str, mut reader: R, format: &TableFormat) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Self::parse(name, &text, format)
    }

    /// Load a custom table from disk
    pub fn from_path<P: AsRef<Path>>(name: &str, path: P, format: &TableFormat) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse(name, &text, format)
    }

    /// Parse with a caller-supplied normalizer
    pub fn parse_with(
        name: &str,
        text: &str,
        format: &TableFormat,
        normalizer: Normalizer,
    ) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(_, line)| !line.trim().is_empty());

        let (_, header_line) = lines.next().ok_or_else(|| DataError::EmptySource {
            system: name.to_string(),
        })?;
        let header: Vec<String> = split_record(header_line.trim_start_matches('\u{feff}'), format.delimiter)
            .into_iter()
            .map(|cell| cell.trim().to_string())
            .collect();

        let symbol_col = match &format.symbol_column {
            Some(column) => header.iter().position(|h| h == column).ok_or_else(|| {
                DataError::MissingSymbolColumn {
                    system: name.to_string(),
                    column: column.clone(),
                }
            })?,
            None => 0,
        };
        let alias_col = format
            .alias_column
            .as_ref()
            .and_then(|column| header.iter().position(|h| h == column))
            .filter(|&col| col != symbol_col);

        let mut feature_cols = Vec::new();
        let mut features = Vec::new();
        let mut feature_index = AHashMap::new();
        for (col, column) in header.iter().enumerate() {
            if col == symbol_col || Some(col) == alias_col || format.metadata_columns.contains(column) {
                continue;
            }
            if feature_index.insert(column.clone(), features.len()).is_some() {
                return Err(DataError::DuplicateFeature {
                    system: name.to_string(),
                    feature: column.clone(),
                }
                .into());
            }
            feature_cols.push(col);
            features.push(column.clone());
        }
        if features.is_empty() {
            return Err(DataError::NoFeatures {
                system: name.to_string(),
            }
            .into());
        }

        let mut symbols = Vec::new();
        let mut vectors = Vec::new();
        let mut index: AHashMap<String, usize> = AHashMap::new();
        let mut first_lines: Vec<usize> = Vec::new();
        let mut raw_aliases = Vec::new();

        for (line, row) in lines {
            let cells = split_record(row, format.delimiter);
            if cells.len() != header.len() {
                return Err(DataError::InconsistentRow {
                    line,
                    expected: header.len(),
                    actual: cells.len(),
                }
                .into());
            }

            let symbol = normalizer.normalize(&cells[symbol_col]);
            if symbol.is_empty() {
                return Err(DataError::EmptySymbol { line }.into());
            }
            if let Some(&existing) = index.get(&symbol) {
                return Err(DataError::DuplicateSymbol {
                    symbol,
                    line,
                    first_line: first_lines[existing],
                }
                .into());
            }

            let mut values = Vec::with_capacity(feature_cols.len());
            for &col in &feature_cols {
                let value = Ternary::from_cell(&cells[col]).ok_or_else(|| DataError::InvalidCell {
                    line,
                    column: header[col].clone(),
                    value: cells[col].clone(),
                })?;
                values.push(value);
            }

            if let Some(col) = alias_col {
                let alias = normalizer.normalize(&cells[col]);
                if !alias.is_empty() {
                    raw_aliases.push((alias, symbols.len()));
                }
            }

            index.insert(symbol.clone(), symbols.len());
            first_lines.push(line);
            symbols.push(symbol);
            vectors.push(FeatureVector::new(values));
        }

        if symbols.is_empty() {
            return Err(DataError::EmptySystem {
                system: name.to_string(),
            }
            .into());
        }

        // A real symbol always wins over another row's alias
        let mut aliases = AHashMap::new();
        for (alias, row) in raw_aliases {
            if !index.contains_key(&alias) {
                aliases.entry(alias).or_insert(row);
            }
        }

        tracing::info!(
            "Loaded feature system '{}' with {} symbols and {} features",
            name,
            symbols.len(),
            features.len()
        );

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            features,
            feature_index,
            symbols,
            vectors,
            index,
            aliases,
            normalizer,
        })
    }

    /// Unique identity of this loaded table
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn feature_index(&self, feature: &str) -> Option<usize> {
        self.feature_index.get(feature).copied()
    }

    /// Number of features per vector
    pub fn dim(&self) -> usize {
        self.features.len()
    }

    /// Canonical symbols in declared order
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn canonical(&self, symbol: &str) -> String {
        self.normalizer.normalize(symbol)
    }

    /// Row index of a symbol after normalization and alias resolution
    pub fn position(&self, symbol: &str) -> Option<usize> {
        let canonical = self.canonical(symbol);
        self.index
            .get(&canonical)
            .or_else(|| self.aliases.get(&canonical))
            .copied()
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.position(symbol).is_some()
    }

    pub fn vector_at(&self, row: usize) -> Option<(&str, &FeatureVector)> {
        Some((self.symbols.get(row)?.as_str(), self.vectors.get(row)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureVector)> {
        self.symbols
            .iter()
            .map(|s| s.as_str())
            .zip(self.vectors.iter())
    }

    /// Canonical symbol and vector, with unknown symbols handled per `on_error`
    pub fn entry(&self, symbol: &str, on_error: OnError) -> Result<Option<(&str, &FeatureVector)>> {
        match self.position(symbol) {
            Some(row) => Ok(self.vector_at(row)),
            None => match on_error {
                OnError::Raise => Err(self.unknown_symbol(symbol)),
                OnError::Warn => {
                    tracing::warn!("Symbol '{}' not found in feature system '{}'", symbol, self.name);
                    Ok(None)
                }
                OnError::Ignore => Ok(None),
            },
        }
    }

    pub fn lookup(&self, symbol: &str, on_error: OnError) -> Result<Option<&FeatureVector>> {
        Ok(self.entry(symbol, on_error)?.map(|(_, vector)| vector))
    }

    /// Strict lookup: unknown symbols always fail
    pub fn vector(&self, symbol: &str) -> Result<&FeatureVector> {
        self.position(symbol)
            .map(|row| &self.vectors[row])
            .ok_or_else(|| self.unknown_symbol(symbol))
    }

    /// Feature name → value pairs of one symbol, in declared order
    pub fn to_feature_map(&self, symbol: &str) -> Result<FeatureAssignment> {
        let vector = self.vector(symbol)?;
        Ok(self
            .features
            .iter()
            .cloned()
            .zip(vector.iter())
            .collect())
    }

    /// Symbols whose vectors satisfy every constraint, in declared order.
    ///
    /// Without `drop_undefined` values must be equal, so a symbol that leaves a
    /// constrained feature undefined does not match a defined request. With
    /// `drop_undefined` a symbol's undefined values match anything and
    /// undefined-valued constraints are ignored.
    pub fn reverse_lookup<K: AsRef<str>>(
        &self,
        constraints: &[(K, Ternary)],
        drop_undefined: bool,
    ) -> Result<Vec<String>> {
        let resolved = self.resolve_constraints(constraints)?;
        let resolved: Vec<(usize, Ternary)> = resolved
            .into_iter()
            .filter(|(_, wanted)| !(drop_undefined && !wanted.is_defined()))
            .collect();

        Ok(self
            .iter()
            .filter(|(_, vector)| {
                resolved.iter().all(|&(col, wanted)| {
                    let actual = vector.as_slice()[col];
                    actual == wanted || (drop_undefined && !actual.is_defined())
                })
            })
            .map(|(symbol, _)| symbol.to_string())
            .collect())
    }

    /// Best-matching symbol by fraction of constraints satisfied.
    /// Returns `None` when the best score is below `threshold`; ties keep
    /// declared order.
    pub fn closest_symbol<K: AsRef<str>>(
        &self,
        constraints: &[(K, Ternary)],
        threshold: f64,
    ) -> Result<Option<(String, f64)>> {
        let resolved = self.resolve_constraints(constraints)?;
        if resolved.is_empty() {
            return Ok(None);
        }

        let mut best: Option<(&str, f64)> = None;
        for (symbol, vector) in self.iter() {
            let matched = resolved
                .iter()
                .filter(|&&(col, wanted)| vector.as_slice()[col] == wanted)
                .count();
            let score = matched as f64 / resolved.len() as f64;
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((symbol, score));
            }
        }

        Ok(best
            .filter(|&(_, score)| score >= threshold)
            .map(|(symbol, score)| (symbol.to_string(), score)))
    }

    /// Derive a new system holding only the rows accepted by `keep`
    pub fn filter<F>(&self, name: &str, keep: F) -> FeatureSystem
    where
        F: Fn(&str, &FeatureVector) -> bool,
    {
        let mut symbols = Vec::new();
        let mut vectors = Vec::new();
        let mut index = AHashMap::new();
        let mut remap = AHashMap::new();
        for (row, (symbol, vector)) in self.iter().enumerate() {
            if keep(symbol, vector) {
                remap.insert(row, symbols.len());
                index.insert(symbol.to_string(), symbols.len());
                symbols.push(symbol.to_string());
                vectors.push(vector.clone());
            }
        }
        let aliases = self
            .aliases
            .iter()
            .filter_map(|(alias, row)| remap.get(row).map(|&new| (alias.clone(), new)))
            .collect();

        FeatureSystem {
            id: Uuid::new_v4(),
            name: name.to_string(),
            features: self.features.clone(),
            feature_index: self.feature_index.clone(),
            symbols,
            vectors,
            index,
            aliases,
            normalizer: self.normalizer.clone(),
        }
    }

    fn resolve_constraints<K: AsRef<str>>(&self, constraints: &[(K, Ternary)]) -> Result<Vec<(usize, Ternary)>> {
        constraints
            .iter()
            .map(|(feature, value)| {
                let feature = feature.as_ref();
                self.feature_index(feature)
                    .map(|col| (col, *value))
                    .ok_or_else(|| {
                        LookupError::UnknownFeature {
                            feature: feature.to_string(),
                            system: self.name.clone(),
                        }
                        .into()
                    })
            })
            .collect()
    }

    fn unknown_symbol(&self, symbol: &str) -> Error {
        LookupError::UnknownSymbol {
            symbol: symbol.to_string(),
            system: self.name.clone(),
        }
        .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::is_click;

    const SMALL: &str = "sound\tvoice\tlabial\tcoronal\tname\n\
                         p\t-\t+\t-\tvoiceless bilabial stop\n\
                         b\t+\t+\t-\tvoiced bilabial stop\n\
                         t\t-\t-\t+\tvoiceless alveolar stop\n\
                         ʔ\t-\t\t\tglottal stop\n";

    fn small() -> FeatureSystem {
        FeatureSystem::parse("small", SMALL, &TableFormat::tsv()).unwrap()
    }

    #[test]
    fn test_parse_small_table() {
        let system = small();
        assert_eq!(system.feature_names(), &["voice", "labial", "coronal"]);
        assert_eq!(system.symbols(), &["p", "b", "t", "ʔ"]);
        assert_eq!(system.dim(), 3);
        let glottal = system.vector("ʔ").unwrap();
        assert_eq!(
            glottal.as_slice(),
            &[Ternary::Negative, Ternary::Undefined, Ternary::Undefined]
        );
    }

    #[test]
    fn test_bundled_system() {
        let system = FeatureSystem::bundled().unwrap();
        assert_eq!(system.name(), DEFAULT_SYSTEM);
        assert_eq!(system.dim(), 23);
        assert!(system.len() > 40);
        // ASCII g resolves through the alias table, precomposed ã through NFD
        assert!(system.contains("g"));
        assert!(system.contains("ã"));
        assert!(system.contains("ʧ"));
        assert!(system.contains("a:"));
        let p = system.vector("p").unwrap();
        let b = system.vector("b").unwrap();
        let differing: Vec<_> = system
            .feature_names()
            .iter()
            .zip(p.iter().zip(b.iter()))
            .filter(|(_, (x, y))| x != y)
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(differing, vec!["voice"]);
    }

    #[test]
    fn test_duplicate_symbol_is_fatal() {
        let text = "sound\tvoice\na\t+\nã\t-\na\u{0303}\t+\n";
        let err = FeatureSystem::parse("dup", text, &TableFormat::tsv()).unwrap_err();
        match err {
            Error::Data(DataError::DuplicateSymbol { symbol, line, first_line }) => {
                assert_eq!(symbol, "a\u{0303}");
                assert_eq!(line, 4);
                assert_eq!(first_line, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_inconsistent_rows_are_fatal() {
        let text = "sound\tvoice\tnasal\nm\t+\t+\nb\t+\n";
        assert!(matches!(
            FeatureSystem::parse("bad", text, &TableFormat::tsv()),
            Err(Error::Data(DataError::InconsistentRow { line: 3, expected: 3, actual: 2 }))
        ));

        let text = "sound\tvoice\tvoice\nm\t+\t+\n";
        assert!(matches!(
            FeatureSystem::parse("bad", text, &TableFormat::tsv()),
            Err(Error::Data(DataError::DuplicateFeature { .. }))
        ));

        let text = "sound\tvoice\nm\tyes\n";
        assert!(matches!(
            FeatureSystem::parse("bad", text, &TableFormat::tsv()),
            Err(Error::Data(DataError::InvalidCell { line: 2, .. }))
        ));

        assert!(matches!(
            FeatureSystem::parse("bad", "\n\n", &TableFormat::tsv()),
            Err(Error::Data(DataError::EmptySource { .. }))
        ));
    }

    #[test]
    fn test_header_only_table_is_fatal() {
        let err = FeatureSystem::parse("hollow", "sound\tvoice\tnasal\n\n", &TableFormat::tsv()).unwrap_err();
        assert_eq!(
            err,
            Error::Data(DataError::EmptySystem {
                system: "hollow".to_string()
            })
        );
    }

    #[test]
    fn test_lookup_on_error_modes() {
        let system = small();
        assert!(system.lookup("b", OnError::Raise).unwrap().is_some());
        assert!(matches!(
            system.lookup("q", OnError::Raise),
            Err(Error::Lookup(LookupError::UnknownSymbol { symbol, .. })) if symbol == "q"
        ));
        assert_eq!(system.lookup("q", OnError::Warn).unwrap(), None);
        assert_eq!(system.lookup("q", OnError::Ignore).unwrap(), None);
    }

    #[test]
    fn test_reverse_lookup() {
        let system = small();
        let voiceless = system
            .reverse_lookup(&[("voice", Ternary::Negative)], false)
            .unwrap();
        assert_eq!(voiceless, vec!["p", "t", "ʔ"]);

        let non_labial = system
            .reverse_lookup(&[("labial", Ternary::Negative)], false)
            .unwrap();
        assert_eq!(non_labial, vec!["t"]);

        let wildcard = system
            .reverse_lookup(&[("labial", Ternary::Negative)], true)
            .unwrap();
        assert_eq!(wildcard, vec!["t", "ʔ"]);

        assert!(matches!(
            system.reverse_lookup(&[("sonorant", Ternary::Positive)], false),
            Err(Error::Lookup(LookupError::UnknownFeature { .. }))
        ));
    }

    #[test]
    fn test_closest_symbol() {
        let system = small();
        let best = system
            .closest_symbol(&[("voice", Ternary::Positive), ("labial", Ternary::Positive)], 1.0)
            .unwrap();
        assert_eq!(best, Some(("b".to_string(), 1.0)));

        let none = system
            .closest_symbol(
                &[("voice", Ternary::Positive), ("coronal", Ternary::Positive)],
                1.0,
            )
            .unwrap();
        assert_eq!(none, None);
    }

    #[test]
    fn test_custom_format_and_aliases() {
        let text = "phoneme,alias,voice,nasal\nm,,+,+\nŋ,ng,+,+\n";
        let format = TableFormat::csv().with_symbol_column("phoneme");
        let system = FeatureSystem::parse("csv", text, &format).unwrap();
        assert_eq!(system.feature_names(), &["voice", "nasal"]);
        assert_eq!(system.vector("ng").unwrap(), system.vector("ŋ").unwrap());

        let missing = TableFormat::csv().with_symbol_column("grapheme");
        assert!(matches!(
            FeatureSystem::parse("csv", text, &missing),
            Err(Error::Data(DataError::MissingSymbolColumn { .. }))
        ));
    }

    #[test]
    fn test_filter_subsystem() {
        let system = FeatureSystem::bundled().unwrap();
        let no_clicks = system.filter("no-clicks", |symbol, _| !is_click(symbol));
        assert_eq!(no_clicks.len(), system.len() - 1);
        assert_ne!(no_clicks.id(), system.id());
        assert!(no_clicks.contains("g"));
    }

    #[test]
    fn test_to_feature_map() {
        let system = small();
        let assignment = system.to_feature_map("b").unwrap();
        assert_eq!(assignment.get("voice"), Some(Ternary::Positive));
        assert_eq!(assignment.features().collect::<Vec<_>>(), vec!["voice", "labial", "coronal"]);
    }
}
