use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for every phonodist operation.
///
/// `Clone` so that a failed lazy initialization can hand the same error to
/// every caller that waited on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Malformed feature tables. Always fatal at load time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataError {
    #[error("Feature table '{system}' is empty")]
    EmptySource { system: String },

    #[error("Symbol column '{column}' not found in header of '{system}'")]
    MissingSymbolColumn { system: String, column: String },

    #[error("Feature table '{system}' declares no feature columns")]
    NoFeatures { system: String },

    #[error("Feature column '{feature}' declared twice in '{system}'")]
    DuplicateFeature { system: String, feature: String },

    #[error("Line {line}: expected {expected} cells, found {actual}")]
    InconsistentRow { line: usize, expected: usize, actual: usize },

    #[error("Line {line}: empty symbol")]
    EmptySymbol { line: usize },

    #[error("Line {line}: symbol '{symbol}' already defined on line {first_line}")]
    DuplicateSymbol { symbol: String, line: usize, first_line: usize },

    #[error("Line {line}, column '{column}': invalid ternary value '{value}'")]
    InvalidCell { line: usize, column: String, value: String },

    #[error("Feature system '{system}' has no symbols")]
    EmptySystem { system: String },

    #[error("Feature system name '{system}' is reserved for the default system")]
    ReservedName { system: String },
}

/// Unknown symbols or features. Severity of unknown symbols is governed by `on_error`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Symbol '{symbol}' not found in feature system '{system}'")]
    UnknownSymbol { symbol: String, system: String },

    #[error("Feature '{feature}' not found in feature system '{system}'")]
    UnknownFeature { feature: String, system: String },

    #[error("Feature system '{0}' not found")]
    UnknownSystem(String),
}

/// Invalid configuration. Always raised, never silenced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value '{value}' for '{key}': expected {expected}")]
    InvalidValue { key: String, value: String, expected: String },

    #[error("Invalid alias '{alias}' -> '{target}': {reason}")]
    InvalidAlias { alias: String, target: String, reason: String },
}

/// Metric registry failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Distance method '{0}' is already registered")]
    Conflict(String),

    #[error("Unknown distance method '{0}'")]
    Unknown(String),

    #[error("Distance method '{0}' requires a trained model")]
    Untrained(String),
}

/// Unreadable matrix files.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Unknown matrix format '{0}'")]
    UnknownFormat(String),

    #[error("Cannot detect matrix format of '{0}'")]
    Undetectable(String),

    #[error("Matrix source is empty")]
    Empty,

    #[error("Line {line}: invalid number '{value}'")]
    InvalidNumber { line: usize, value: String },

    #[error("Line {line}: expected label '{expected}', found '{actual}'")]
    LabelMismatch { line: usize, expected: String, actual: String },

    #[error("Matrix is not square: {labels} labels, {rows} rows of width {width}")]
    NotSquare { labels: usize, rows: usize, width: usize },
}
