// Distance matrix serialization.
//
// Tabular layout (TSV/CSV): a header of a blank corner cell followed by the
// labels, then one row per label: the label and its values.
// JSON layout: {"labels": [...], "matrix": [[...]], "metadata": {...}}.

use atomicwrites::{AtomicFile, OverwriteBehavior};
use phonodist_core::table::{join_record, split_record};
use phonodist_core::{DistanceMatrix, Error, FormatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::path::Path;
use std::str::FromStr;

/// Tolerance used when recording whether a saved matrix is symmetric
const SYMMETRY_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixFormat {
    Tsv,
    Csv,
    Json,
}

impl MatrixFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatrixFormat::Tsv => "tsv",
            MatrixFormat::Csv => "csv",
            MatrixFormat::Json => "json",
        }
    }

    /// Guess from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "tsv" | "tab" => Some(MatrixFormat::Tsv),
            "csv" => Some(MatrixFormat::Csv),
            "json" => Some(MatrixFormat::Json),
            _ => None,
        }
    }

    /// Guess from file content
    pub fn detect(text: &str) -> Option<Self> {
        let text = text.trim_start_matches('\u{feff}');
        if text.trim_start().starts_with('{') {
            return Some(MatrixFormat::Json);
        }
        // The header starts with a blank corner cell, so keep leading delimiters
        let header = text.lines().find(|line| !line.trim().is_empty())?;
        if header.contains('\t') {
            Some(MatrixFormat::Tsv)
        } else if header.contains(',') {
            Some(MatrixFormat::Csv)
        } else {
            None
        }
    }

    fn delimiter(&self) -> Option<char> {
        match self {
            MatrixFormat::Tsv => Some('\t'),
            MatrixFormat::Csv => Some(','),
            MatrixFormat::Json => None,
        }
    }
}

impl fmt::Display for MatrixFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatrixFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsv" | "tab" => Ok(MatrixFormat::Tsv),
            "csv" => Ok(MatrixFormat::Csv),
            "json" => Ok(MatrixFormat::Json),
            other => Err(FormatError::UnknownFormat(other.to_string()).into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixMetadata {
    pub size: usize,
    pub symmetric: bool,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl MatrixMetadata {
    pub fn describe(matrix: &DistanceMatrix) -> Self {
        Self {
            size: matrix.len(),
            symmetric: matrix.is_symmetric(SYMMETRY_TOLERANCE),
            min: matrix.min(),
            max: matrix.max(),
            mean: matrix.mean(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct MatrixDocument {
    #[serde(alias = "phonemes")]
    labels: Vec<String>,
    matrix: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<MatrixMetadata>,
}

/// Write a matrix to any writer.
///
/// `precision` fixes the number of decimals in tabular output; `None` writes
/// the shortest text that reads back to the same `f64`. JSON always keeps
/// full precision.
///
/// Tabular formats cannot represent a matrix without labels, so an empty
/// matrix fails with [`FormatError::Empty`]; JSON stores it as empty arrays.
pub fn write_matrix<W: Write>(
    matrix: &DistanceMatrix,
    mut writer: W,
    format: MatrixFormat,
    precision: Option<usize>,
) -> Result<()> {
    match format.delimiter() {
        Some(_) if matrix.is_empty() => return Err(FormatError::Empty.into()),
        Some(delimiter) => {
            let mut header = Vec::with_capacity(matrix.len() + 1);
            header.push(String::new());
            header.extend(matrix.labels().iter().cloned());
            writeln!(writer, "{}", join_record(&header, delimiter))?;

            for (label, row) in matrix.labels().iter().zip(matrix.rows()) {
                let mut fields = Vec::with_capacity(row.len() + 1);
                fields.push(label.clone());
                fields.extend(row.iter().map(|&v| format_value(v, precision)));
                writeln!(writer, "{}", join_record(&fields, delimiter))?;
            }
        }
        None => {
            let document = MatrixDocument {
                labels: matrix.labels().to_vec(),
                matrix: matrix.rows().map(|row| row.to_vec()).collect(),
                metadata: Some(MatrixMetadata::describe(matrix)),
            };
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writeln!(writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Read a matrix from any reader, detecting the format from content when
/// `format` is `None`
pub fn read_matrix<R: Read>(mut reader: R, format: Option<MatrixFormat>) -> Result<DistanceMatrix> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_matrix(&text, format)
}

/// Atomically write a matrix to `path`.
///
/// The format falls back to the file extension, then to TSV.
pub fn save_distance_matrix<P: AsRef<Path>>(
    matrix: &DistanceMatrix,
    path: P,
    format: Option<MatrixFormat>,
    precision: Option<usize>,
) -> Result<()> {
    let path = path.as_ref();
    let format = format
        .or_else(|| MatrixFormat::from_path(path))
        .unwrap_or(MatrixFormat::Tsv);

    let mut buffer = Vec::new();
    write_matrix(matrix, &mut buffer, format, precision)?;
    write_atomic(path, &buffer)?;

    tracing::info!(
        "Saved {}x{} distance matrix to {:?} as {}",
        matrix.len(),
        matrix.len(),
        path,
        format
    );
    Ok(())
}

/// Load a matrix saved by [`save_distance_matrix`] or a compatible tool.
///
/// The format falls back to the file extension, then to content detection.
pub fn load_distance_matrix<P: AsRef<Path>>(path: P, format: Option<MatrixFormat>) -> Result<DistanceMatrix> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
    let format = format.or_else(|| MatrixFormat::from_path(path));
    let matrix = parse_matrix(&text, format)?;
    tracing::info!(
        "Loaded {}x{} distance matrix from {:?}",
        matrix.len(),
        matrix.len(),
        path
    );
    Ok(matrix)
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|file| file.write_all(bytes))
        .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))
}

fn parse_matrix(text: &str, format: Option<MatrixFormat>) -> Result<DistanceMatrix> {
    if text.trim().is_empty() {
        return Err(FormatError::Empty.into());
    }
    let format = match format {
        Some(format) => format,
        None => MatrixFormat::detect(text).ok_or_else(|| {
            let head: String = text.lines().next().unwrap_or_default().chars().take(40).collect();
            FormatError::Undetectable(head)
        })?,
    };

    match format.delimiter() {
        Some(delimiter) => parse_tabular(text, delimiter),
        None => {
            let document: MatrixDocument = serde_json::from_str(text)?;
            DistanceMatrix::from_rows(document.labels, document.matrix)
        }
    }
}

fn parse_tabular(text: &str, delimiter: char) -> Result<DistanceMatrix> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty());

    let (_, header) = lines.next().ok_or(FormatError::Empty)?;
    let labels: Vec<String> = split_record(header.trim_start_matches('\u{feff}'), delimiter)
        .into_iter()
        .skip(1)
        .map(|label| label.trim().to_string())
        .collect();

    let mut rows = Vec::with_capacity(labels.len());
    for (line, record) in lines {
        let mut cells = split_record(record, delimiter).into_iter();
        let label = cells.next().unwrap_or_default();
        let label = label.trim();
        if let Some(expected) = labels.get(rows.len()) {
            if expected != label {
                return Err(FormatError::LabelMismatch {
                    line,
                    expected: expected.clone(),
                    actual: label.to_string(),
                }
                .into());
            }
        }

        let values = cells
            .map(|cell| {
                let cell = cell.trim();
                cell.parse::<f64>().map_err(|_| {
                    Error::from(FormatError::InvalidNumber {
                        line,
                        value: cell.to_string(),
                    })
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        rows.push(values);
    }

    DistanceMatrix::from_rows(labels, rows)
}

fn format_value(value: f64, precision: Option<usize>) -> String {
    match precision {
        Some(decimals) => format!("{:.*}", decimals, value),
        None => value.to_string(),
    }
}
