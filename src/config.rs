use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// How many leading rows are scored when looking for the header row
    pub header_scan_rows: usize,
    /// Header detection stops early once a row reaches this confidence
    pub header_confidence_threshold: f64,
    /// How many leading lines are sampled for CSV delimiter detection
    pub delimiter_sample_lines: usize,
    /// Workbook sheet to read; the first sheet when unset
    pub sheet_name: Option<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: 10,
            header_confidence_threshold: 0.75,
            delimiter_sample_lines: 5,
            sheet_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeOptions {
    pub strict_account_format: bool,
    pub auto_normalize_names: bool,
    pub max_lines: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            strict_account_format: false,
            auto_normalize_names: true,
            max_lines: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub balance_tolerance: f64,
    pub strict_account_format: bool,
    pub ignore_warnings: bool,
    /// An account is an outlier when its largest amount exceeds this multiple
    /// of the median magnitude of all non-zero accounts
    pub outlier_median_multiplier: f64,
    /// Minimum number of non-zero accounts before outliers are looked for
    pub outlier_min_population: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            balance_tolerance: 1.0,
            strict_account_format: false,
            ignore_warnings: false,
            outlier_median_multiplier: 100.0,
            outlier_min_population: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblyOptions {
    pub balance_tolerance: f64,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self {
            balance_tolerance: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingOptions {
    pub parser: ParserConfig,
    pub normalize: NormalizeOptions,
    pub validation: ValidationOptions,
    pub assembly: AssemblyOptions,
}

impl ProcessingOptions {
    /// Strict account-code checking in both the normalizer and the validator.
    pub fn strict() -> Self {
        let mut options = Self::default();
        options.normalize.strict_account_format = true;
        options.validation.strict_account_format = true;
        options
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
