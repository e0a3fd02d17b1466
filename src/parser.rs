//! Format detection and raw row extraction for trial-balance exports.
//!
//! Accepts CSV (auto-detected delimiter) and Excel workbooks, locates the header
//! row by keyword scoring and builds a [`ColumnMapping`] for the eight
//! trial-balance columns.

use crate::config::ParserConfig;
use crate::error::{Result, TrialBalanceError};
use crate::schema::{CellValue, ColumnMapping, ColumnRole, RawLine};
use crate::utils::{looks_numeric, parse_amount};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;

const DELIMITER_CANDIDATES: [u8; 4] = [b',', b';', b'|', b'\t'];

static CODE_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cont|conturi|cod|simbol|account|acct|code)\b").expect("valid regex")
});
static NAME_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(denumire|\bnume\b|\bname\b|descriere|description|explicati)")
        .expect("valid regex")
});
static DEBIT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(debit|\bsd\b|\brd\b|\bdr\b)").expect("valid regex"));
static CREDIT_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(credit|\bsc\b|\brc\b|\bcr\b)").expect("valid regex"));

static CODE_COLUMN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(nr\.?\s*)?(simbol\s*)?(cont|cod(\s*cont)?|account(\s*(code|no\.?|number))?|code|acct)\.?$",
    )
    .expect("valid regex")
});
static TURNOVER_STAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\brd\b|\brc\b|rulaj|turnover|movement|mi[sș]c[aă]ri)").expect("valid regex")
});
static OPENING_STAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(init|[iî]nceput|opening|precedent|anterior|\bini\b)").expect("valid regex")
});
static CLOSING_STAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(final|sf[aâ]r[sș]it|closing|\bend\b)").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Csv,
    Excel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStrategy {
    Header,
    Positional,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseMetadata {
    pub file_name: String,
    pub format: FileFormat,
    pub delimiter: Option<char>,
    pub sheet_name: Option<String>,
    /// 0-based index of the header among the non-empty source rows
    pub header_row: usize,
    pub data_start_row: usize,
    pub header_confidence: f64,
    pub mapping_strategy: MappingStrategy,
    pub headers: Vec<String>,
    pub total_rows: usize,
    pub data_rows: usize,
    pub skipped_blank_rows: usize,
    pub parsed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub raw_lines: Vec<RawLine>,
    pub mapping: ColumnMapping,
    pub metadata: ParseMetadata,
    /// Non-fatal problems (unreadable records, incomplete column mapping)
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaderDetection {
    pub row_index: usize,
    pub confidence: f64,
}

/// A source row before role-aware coercion.
struct SourceRow {
    line_number: usize,
    cells: Vec<CellValue>,
}

pub struct TrialBalanceParser {
    config: ParserConfig,
}

impl Default for TrialBalanceParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl TrialBalanceParser {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }

    pub fn parse(&self, bytes: &[u8], file_name: &str, mime_type: &str) -> Result<ParseOutcome> {
        let format = detect_format(file_name, mime_type).ok_or_else(|| {
            TrialBalanceError::UnsupportedFormat {
                mime_type: mime_type.to_string(),
                file_name: file_name.to_string(),
            }
        })?;

        if bytes.is_empty() {
            return Err(TrialBalanceError::EmptyFile(file_name.to_string()));
        }

        let mut errors = Vec::new();
        let (rows, delimiter, sheet_name) = match format {
            FileFormat::Csv => {
                let (rows, delimiter) = self.read_csv(bytes, &mut errors);
                (rows, Some(delimiter as char), None)
            }
            FileFormat::Excel => {
                let (rows, sheet) = self.read_workbook(bytes)?;
                (rows, None, Some(sheet))
            }
        };

        if rows.is_empty() {
            return Err(TrialBalanceError::NoDataRows(file_name.to_string()));
        }

        let leading: Vec<Vec<CellValue>> = rows
            .iter()
            .take(self.config.header_scan_rows)
            .map(|r| r.cells.clone())
            .collect();
        let header = detect_header(&leading, &self.config);
        let width = rows.iter().map(|r| r.cells.len()).max().unwrap_or(0);
        let headers: Vec<String> = (0..width)
            .map(|i| {
                rows[header.row_index]
                    .cells
                    .get(i)
                    .and_then(CellValue::as_text)
                    .map(|s| s.trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        let keys = column_keys(&headers);

        let (mapping, strategy) = build_column_mapping(&headers, &keys);
        if !mapping.is_complete() {
            let missing: Vec<String> = mapping.missing_roles().iter().map(|r| r.to_string()).collect();
            warn!("Incomplete column mapping for {}: missing {}", file_name, missing.join(", "));
            errors.push(format!("Column mapping incomplete, missing: {}", missing.join(", ")));
        }

        let code_key = mapping.get(ColumnRole::AccountCode);
        let name_key = mapping.get(ColumnRole::AccountName);

        let data_start_row = header.row_index + 1;
        let mut raw_lines = Vec::new();
        let mut skipped_blank_rows = 0;

        for row in rows.iter().skip(data_start_row) {
            let values: BTreeMap<String, CellValue> = keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    let cell = row.cells.get(i).cloned().unwrap_or(CellValue::Null);
                    let value = if code_key == Some(key.as_str()) {
                        code_cell(cell)
                    } else if name_key == Some(key.as_str()) {
                        cell
                    } else {
                        coerce_cell(cell)
                    };
                    (key.clone(), value)
                })
                .collect();

            let line = RawLine {
                line_number: row.line_number,
                values,
            };

            if line.is_blank() {
                skipped_blank_rows += 1;
                continue;
            }
            raw_lines.push(line);
        }

        if raw_lines.is_empty() {
            return Err(TrialBalanceError::NoDataRows(file_name.to_string()));
        }

        info!(
            "Parsed {} ({:?}): header row {} (confidence {:.2}), {} data rows, mapping {:?}",
            file_name,
            format,
            header.row_index,
            header.confidence,
            raw_lines.len(),
            strategy
        );

        let metadata = ParseMetadata {
            file_name: file_name.to_string(),
            format,
            delimiter,
            sheet_name,
            header_row: header.row_index,
            data_start_row,
            header_confidence: header.confidence,
            mapping_strategy: strategy,
            headers,
            total_rows: rows.len(),
            data_rows: raw_lines.len(),
            skipped_blank_rows,
            parsed_at: Utc::now(),
        };

        Ok(ParseOutcome {
            raw_lines,
            mapping,
            metadata,
            errors,
        })
    }

    fn read_csv(&self, bytes: &[u8], errors: &mut Vec<String>) -> (Vec<SourceRow>, u8) {
        let decoded = String::from_utf8_lossy(bytes);
        let text = decoded.trim_start_matches('\u{feff}');
        let delimiter = detect_delimiter(text, self.config.delimiter_sample_lines);
        debug!("Detected CSV delimiter {:?}", delimiter as char);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            match record {
                Ok(record) => {
                    let line_number = record
                        .position()
                        .map(|p| p.line() as usize)
                        .unwrap_or(index + 1);
                    let cells = record
                        .iter()
                        .map(|field| {
                            let field = field.trim();
                            if field.is_empty() {
                                CellValue::Null
                            } else {
                                CellValue::Text(field.to_string())
                            }
                        })
                        .collect();
                    rows.push(SourceRow { line_number, cells });
                }
                Err(e) => errors.push(format!("Unreadable CSV record: {}", e)),
            }
        }

        (rows, delimiter)
    }

    fn read_workbook(&self, bytes: &[u8]) -> Result<(Vec<SourceRow>, String)> {
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| TrialBalanceError::WorkbookError(e.to_string()))?;

        let sheet_name = match &self.config.sheet_name {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| TrialBalanceError::WorkbookError("workbook has no sheets".to_string()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(|e| TrialBalanceError::WorkbookError(e.to_string()))?;
        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);

        let rows = range
            .rows()
            .enumerate()
            .map(|(i, cells)| SourceRow {
                line_number: first_row + i + 1,
                cells: cells.iter().map(workbook_cell).collect(),
            })
            .filter(|row| row.cells.iter().any(|c| !c.is_null()))
            .collect();

        Ok((rows, sheet_name))
    }
}

pub fn parse(bytes: &[u8], file_name: &str, mime_type: &str) -> Result<ParseOutcome> {
    TrialBalanceParser::default().parse(bytes, file_name, mime_type)
}

pub fn detect_format(file_name: &str, mime_type: &str) -> Option<FileFormat> {
    let mime = mime_type.trim().to_ascii_lowercase();
    let csv_name = file_name.to_ascii_lowercase().ends_with(".csv");

    if mime.is_empty() || mime == "application/octet-stream" {
        // Generic upload type, go by the file extension
        return mime_guess::from_path(file_name)
            .iter()
            .find_map(|guess| format_for_mime(&guess.essence_str().to_ascii_lowercase(), csv_name));
    }

    format_for_mime(&mime, csv_name)
}

fn format_for_mime(mime: &str, csv_name: bool) -> Option<FileFormat> {
    match mime {
        "text/csv" | "application/csv" | "text/plain" | "text/comma-separated-values" => {
            Some(FileFormat::Csv)
        }
        // Browsers on Windows report CSV uploads as ms-excel
        "application/vnd.ms-excel" if csv_name => Some(FileFormat::Csv),
        "application/vnd.ms-excel"
        | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel.sheet.macroenabled.12"
        | "application/vnd.ms-excel.sheet.binary.macroenabled.12"
        | "application/vnd.oasis.opendocument.spreadsheet" => Some(FileFormat::Excel),
        _ => None,
    }
}

/// Picks the candidate delimiter occurring most often in the first lines.
/// Falls back to `,` when none occurs.
pub fn detect_delimiter(text: &str, sample_lines: usize) -> u8 {
    let sample: Vec<&str> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(sample_lines)
        .collect();

    let mut best = (b',', 0usize);
    for candidate in DELIMITER_CANDIDATES {
        let count: usize = sample
            .iter()
            .map(|line| line.bytes().filter(|b| *b == candidate).count())
            .sum();
        if count > best.1 {
            best = (candidate, count);
        }
    }

    best.0
}

/// Scores the leading rows by header keyword presence and returns the best one.
pub fn detect_header(rows: &[Vec<CellValue>], config: &ParserConfig) -> HeaderDetection {
    let mut best = HeaderDetection {
        row_index: 0,
        confidence: 0.0,
    };

    for (index, row) in rows.iter().take(config.header_scan_rows).enumerate() {
        let confidence = header_confidence(row);
        if confidence > best.confidence {
            best = HeaderDetection {
                row_index: index,
                confidence,
            };
        }
        if confidence >= config.header_confidence_threshold {
            break;
        }
    }

    best
}

fn header_confidence(row: &[CellValue]) -> f64 {
    let texts: Vec<&str> = row
        .iter()
        .filter_map(|c| match c {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        })
        .collect();

    let matches = [&CODE_KEYWORD, &NAME_KEYWORD, &DEBIT_KEYWORD, &CREDIT_KEYWORD]
        .iter()
        .filter(|pattern| texts.iter().any(|t| pattern.is_match(t)))
        .count();

    matches as f64 / 4.0
}

/// Header texts become column keys; blank or repeated headers get `column_<n>`.
fn column_keys(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            if header.is_empty() || !seen.insert(header.clone()) {
                format!("column_{}", i + 1)
            } else {
                header.clone()
            }
        })
        .collect()
}

pub fn build_column_mapping(headers: &[String], keys: &[String]) -> (ColumnMapping, MappingStrategy) {
    let mut mapping = ColumnMapping::new();

    for (header, key) in headers.iter().zip(keys.iter()) {
        if let Some(role) = role_for_header(header) {
            mapping.assign(role, key.clone());
        }
    }

    if !mapping.is_complete() && headers.len() >= ColumnRole::ALL.len() {
        debug!(
            "Only {} of 8 columns matched by header, using positional layout",
            mapping.resolved_count()
        );
        return (ColumnMapping::positional(keys), MappingStrategy::Positional);
    }

    (mapping, MappingStrategy::Header)
}

fn role_for_header(header: &str) -> Option<ColumnRole> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }
    if CODE_COLUMN.is_match(header) {
        return Some(ColumnRole::AccountCode);
    }
    if NAME_KEYWORD.is_match(header) {
        return Some(ColumnRole::AccountName);
    }

    let debit = DEBIT_KEYWORD.is_match(header);
    let credit = CREDIT_KEYWORD.is_match(header);
    if debit == credit {
        return None;
    }

    let role = if TURNOVER_STAGE.is_match(header) {
        if debit {
            ColumnRole::TurnoverDebit
        } else {
            ColumnRole::TurnoverCredit
        }
    } else if OPENING_STAGE.is_match(header) {
        if debit {
            ColumnRole::OpeningDebit
        } else {
            ColumnRole::OpeningCredit
        }
    } else if CLOSING_STAGE.is_match(header) {
        if debit {
            ColumnRole::ClosingDebit
        } else {
            ColumnRole::ClosingCredit
        }
    } else {
        return None;
    };

    Some(role)
}

/// Numeric-looking text becomes a number, blank text becomes null.
pub fn coerce_cell(cell: CellValue) -> CellValue {
    match cell {
        CellValue::Text(text) => coerce_text(&text),
        other => other,
    }
}

pub fn coerce_text(text: &str) -> CellValue {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return CellValue::Null;
    }
    if looks_numeric(trimmed) {
        if let Some(value) = parse_amount(trimmed) {
            return CellValue::Number(value);
        }
    }
    CellValue::Text(trimmed.to_string())
}

/// Account codes stay text. A numeric workbook cell loses trailing zeros
/// (`512.10` is stored as 512.1), so a one-digit analytic suffix is padded
/// back to the two-digit form.
pub fn code_cell(cell: CellValue) -> CellValue {
    match cell {
        CellValue::Number(value) => {
            let text = value.to_string();
            match text.split_once('.') {
                Some((_, suffix)) if suffix.len() == 1 => CellValue::Text(format!("{}0", text)),
                _ => CellValue::Text(text),
            }
        }
        other => other,
    }
}

fn workbook_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Null,
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                CellValue::Null
            } else {
                CellValue::Text(trimmed.to_string())
            }
        }
        other => CellValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::Text(c.to_string())).collect()
    }

    const ROMANIAN_HEADER: [&str; 8] = [
        "Cont", "Denumire", "SD init", "SC init", "RD", "RC", "SD final", "SC final",
    ];

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("tb.csv", "text/csv"), Some(FileFormat::Csv));
        assert_eq!(detect_format("tb.csv", "application/vnd.ms-excel"), Some(FileFormat::Csv));
        assert_eq!(detect_format("tb.xls", "application/vnd.ms-excel"), Some(FileFormat::Excel));
        assert_eq!(
            detect_format(
                "tb.xlsx",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            ),
            Some(FileFormat::Excel)
        );
        assert_eq!(detect_format("tb.XLSX", "application/octet-stream"), Some(FileFormat::Excel));
        assert_eq!(detect_format("tb.pdf", "application/pdf"), None);
        assert_eq!(detect_format("tb.bin", "application/octet-stream"), None);
        assert_eq!(detect_format("balanta.csv", ""), Some(FileFormat::Csv));
        assert_eq!(detect_format("balanta.ods", ""), Some(FileFormat::Excel));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3\n", 5), b';');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3\n", 5), b'|');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3\n", 5), b'\t');
        assert_eq!(detect_delimiter("a,b\n1,2\n", 5), b',');
        assert_eq!(detect_delimiter("single column\n", 5), b',');
    }

    #[test]
    fn test_detect_header_skips_title_rows() {
        let rows = vec![
            text_row(&["Balanta de verificare"]),
            text_row(&["SC Exemplu SRL", "2024"]),
            text_row(&ROMANIAN_HEADER),
            text_row(&["101", "Capital", "", "100"]),
        ];

        let detection = detect_header(&rows, &ParserConfig::default());
        assert_eq!(detection.row_index, 2);
        assert_eq!(detection.confidence, 1.0);
    }

    #[test]
    fn test_detect_header_defaults_to_first_row() {
        let rows = vec![text_row(&["101", "x"]), text_row(&["102", "y"])];
        let detection = detect_header(&rows, &ParserConfig::default());
        assert_eq!(detection.row_index, 0);
        assert_eq!(detection.confidence, 0.0);
    }

    #[test]
    fn test_mapping_from_romanian_headers() {
        let headers: Vec<String> = ROMANIAN_HEADER.iter().map(|s| s.to_string()).collect();
        let keys = column_keys(&headers);
        let (mapping, strategy) = build_column_mapping(&headers, &keys);

        assert_eq!(strategy, MappingStrategy::Header);
        assert!(mapping.is_complete());
        assert_eq!(mapping.get(ColumnRole::OpeningDebit), Some("SD init"));
        assert_eq!(mapping.get(ColumnRole::TurnoverCredit), Some("RC"));
        assert_eq!(mapping.get(ColumnRole::ClosingCredit), Some("SC final"));
    }

    #[test]
    fn test_mapping_from_english_headers() {
        let headers: Vec<String> = [
            "Account",
            "Description",
            "Opening Debit",
            "Opening Credit",
            "Turnover Debit",
            "Turnover Credit",
            "Closing Debit",
            "Closing Credit",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let keys = column_keys(&headers);
        let (mapping, strategy) = build_column_mapping(&headers, &keys);

        assert_eq!(strategy, MappingStrategy::Header);
        assert_eq!(mapping.get(ColumnRole::AccountCode), Some("Account"));
        assert_eq!(mapping.get(ColumnRole::AccountName), Some("Description"));
        assert_eq!(mapping.get(ColumnRole::TurnoverDebit), Some("Turnover Debit"));
    }

    #[test]
    fn test_mapping_falls_back_to_positional() {
        let headers: Vec<String> = ["A", "B", "C", "D", "E", "F", "G", "H"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let keys = column_keys(&headers);
        let (mapping, strategy) = build_column_mapping(&headers, &keys);

        assert_eq!(strategy, MappingStrategy::Positional);
        assert_eq!(mapping.get(ColumnRole::AccountCode), Some("A"));
        assert_eq!(mapping.get(ColumnRole::ClosingCredit), Some("H"));
    }

    #[test]
    fn test_column_keys_for_blank_and_duplicate_headers() {
        let headers: Vec<String> = ["Cont", "", "Cont"].iter().map(|s| s.to_string()).collect();
        assert_eq!(column_keys(&headers), vec!["Cont", "column_2", "column_3"]);
    }

    #[test]
    fn test_coerce_text() {
        assert_eq!(coerce_text("1.234,50"), CellValue::Number(1234.5));
        assert_eq!(coerce_text("  "), CellValue::Null);
        assert_eq!(coerce_text("Capital"), CellValue::Text("Capital".to_string()));
    }

    #[test]
    fn test_code_cell_keeps_codes_as_text() {
        assert_eq!(code_cell(CellValue::Number(401.0)), CellValue::Text("401".to_string()));
        assert_eq!(code_cell(CellValue::Number(512.1)), CellValue::Text("512.10".to_string()));
        assert_eq!(code_cell(CellValue::Number(401.01)), CellValue::Text("401.01".to_string()));
        assert_eq!(
            code_cell(CellValue::Text("4111.001".to_string())),
            CellValue::Text("4111.001".to_string())
        );
        assert_eq!(code_cell(CellValue::Null), CellValue::Null);
    }

    #[test]
    fn test_parse_csv_end_to_end() {
        let csv = "Cont;Denumire;SD init;SC init;RD;RC;SD final;SC final\n\
                   101;Capital subscris;0;1000;0;0;0;1000\n\
                   ;;;;;;;\n\
                   5121;Conturi la banci;1000;0;0;0;1000;0\n";

        let outcome = parse(csv.as_bytes(), "balanta.csv", "text/csv").unwrap();

        assert_eq!(outcome.metadata.format, FileFormat::Csv);
        assert_eq!(outcome.metadata.delimiter, Some(';'));
        assert_eq!(outcome.metadata.header_row, 0);
        assert_eq!(outcome.metadata.data_start_row, 1);
        assert_eq!(outcome.raw_lines.len(), 2);
        assert_eq!(outcome.metadata.skipped_blank_rows, 1);
        assert!(outcome.errors.is_empty());

        let first = &outcome.raw_lines[0];
        assert_eq!(first.line_number, 2);
        assert_eq!(first.get("Cont"), Some(&CellValue::Text("101".to_string())));
        assert_eq!(first.get("SC init"), Some(&CellValue::Number(1000.0)));
    }

    #[test]
    fn test_parse_rejects_unsupported_type() {
        let result = parse(b"%PDF-1.4", "report.pdf", "application/pdf");
        assert!(matches!(result, Err(TrialBalanceError::UnsupportedFormat { .. })));
    }

    #[test]
    fn test_parse_rejects_header_only_file() {
        let csv = "Cont,Denumire,SD init,SC init,RD,RC,SD final,SC final\n";
        let result = parse(csv.as_bytes(), "tb.csv", "text/csv");
        assert!(matches!(result, Err(TrialBalanceError::NoDataRows(_))));
    }

    #[test]
    fn test_parse_rejects_empty_file() {
        let result = parse(b"", "tb.csv", "text/csv");
        assert!(matches!(result, Err(TrialBalanceError::EmptyFile(_))));
    }

    // Sheet "Balanta": row 1 empty, title in A2, header in row 3, accounts in
    // rows 4, 6 and 7 with row 5 left blank. Code 101 and 512.10 are numeric
    // cells, 401.01 is text. Sheet "Note" holds a single remark.
    const WORKBOOK: &[u8] = include_bytes!("../tests/fixtures/balanta.xlsx");
    const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

    #[test]
    fn test_parse_workbook() {
        let outcome = parse(WORKBOOK, "balanta.xlsx", XLSX_MIME).unwrap();

        assert_eq!(outcome.metadata.format, FileFormat::Excel);
        assert_eq!(outcome.metadata.delimiter, None);
        assert_eq!(outcome.metadata.sheet_name.as_deref(), Some("Balanta"));
        assert_eq!(outcome.metadata.header_row, 1);
        assert_eq!(outcome.metadata.data_start_row, 2);
        assert_eq!(outcome.metadata.header_confidence, 1.0);
        assert_eq!(outcome.metadata.mapping_strategy, MappingStrategy::Header);
        assert_eq!(outcome.metadata.headers, ROMANIAN_HEADER.to_vec());
        assert!(outcome.mapping.is_complete());
        assert!(outcome.errors.is_empty());

        let line_numbers: Vec<usize> = outcome.raw_lines.iter().map(|l| l.line_number).collect();
        assert_eq!(line_numbers, vec![4, 6, 7]);

        let capital = &outcome.raw_lines[0];
        assert_eq!(capital.get("Cont"), Some(&CellValue::Text("101".to_string())));
        assert_eq!(
            capital.get("Denumire"),
            Some(&CellValue::Text("Capital subscris varsat".to_string()))
        );
        assert_eq!(capital.get("SC init"), Some(&CellValue::Number(100000.0)));

        let bank = &outcome.raw_lines[1];
        assert_eq!(bank.get("Cont"), Some(&CellValue::Text("512.10".to_string())));
        assert_eq!(bank.get("RC"), Some(&CellValue::Number(20000.5)));
        assert_eq!(bank.get("SD final"), Some(&CellValue::Number(129999.5)));

        let supplier = &outcome.raw_lines[2];
        assert_eq!(supplier.get("Cont"), Some(&CellValue::Text("401.01".to_string())));
        assert_eq!(supplier.get("SC final"), Some(&CellValue::Number(29999.5)));
    }

    #[test]
    fn test_parse_workbook_named_sheet() {
        let config = ParserConfig {
            sheet_name: Some("Note".to_string()),
            ..ParserConfig::default()
        };
        let result = TrialBalanceParser::new(config).parse(WORKBOOK, "balanta.xlsx", XLSX_MIME);
        assert!(matches!(result, Err(TrialBalanceError::NoDataRows(_))));

        let config = ParserConfig {
            sheet_name: Some("Lipsa".to_string()),
            ..ParserConfig::default()
        };
        let result = TrialBalanceParser::new(config).parse(WORKBOOK, "balanta.xlsx", XLSX_MIME);
        assert!(matches!(result, Err(TrialBalanceError::WorkbookError(_))));
    }

    #[test]
    fn test_parse_rejects_corrupt_workbook() {
        let result = parse(b"definitely not a zip", "tb.xlsx", "application/octet-stream");
        assert!(matches!(result, Err(TrialBalanceError::WorkbookError(_))));
    }
}
