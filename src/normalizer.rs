use crate::config::NormalizeOptions;
use crate::schema::{
    Account, CellValue, ColumnMapping, ColumnRole, IssueKind, RawLine, ValidationIssue,
};
use crate::utils::parse_amount;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CODE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{1,3})?$").expect("valid regex"));
static STRICT_CODE_SHAPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[1-8]\d{1,2}(\.\d{2,3})?$").expect("valid regex"));
static NAME_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\-().]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizationOutcome {
    pub accounts: Vec<Account>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub processed_lines: usize,
    pub successful_lines: usize,
}

pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    pub fn normalize(&self, raw_lines: &[RawLine], mapping: &ColumnMapping) -> NormalizationOutcome {
        if raw_lines.len() > self.options.max_lines {
            warn!(
                "Trial balance has {} lines, only the first {} are normalized",
                raw_lines.len(),
                self.options.max_lines
            );
        }

        let mut accounts = Vec::new();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut processed_lines = 0;

        for line in raw_lines.iter().take(self.options.max_lines) {
            processed_lines += 1;
            match self.normalize_line(line, mapping, &mut warnings) {
                Ok(account) => accounts.push(account),
                Err(issue) => {
                    debug!("Dropping line {}: {}", line.line_number, issue.message);
                    errors.push(issue);
                }
            }
        }

        let successful_lines = accounts.len();
        info!(
            "Normalized {} of {} lines ({} errors, {} warnings)",
            successful_lines,
            processed_lines,
            errors.len(),
            warnings.len()
        );

        NormalizationOutcome {
            accounts,
            errors,
            warnings,
            processed_lines,
            successful_lines,
        }
    }

    fn normalize_line(
        &self,
        line: &RawLine,
        mapping: &ColumnMapping,
        warnings: &mut Vec<ValidationIssue>,
    ) -> Result<Account, ValidationIssue> {
        let cell = |role: ColumnRole| mapping.get(role).and_then(|key| line.get(key));

        let raw_code = cell(ColumnRole::AccountCode)
            .and_then(CellValue::as_text)
            .filter(|s| !s.trim().is_empty());
        let raw_name = cell(ColumnRole::AccountName)
            .and_then(CellValue::as_text)
            .filter(|s| !s.trim().is_empty());

        let (raw_code, raw_name) = match (raw_code, raw_name) {
            (Some(code), Some(name)) => (code, name),
            (code, _) => {
                let missing = if code.is_none() { "account code" } else { "account name" };
                return Err(ValidationIssue::error(
                    IssueKind::MissingRequiredField,
                    format!("Line {} is missing the {}", line.line_number, missing),
                )
                .at_line(line.line_number)
                .with_suggestion("Fill in both the account code and the account name"));
            }
        };

        let account_code =
            normalize_account_code(&raw_code, self.options.strict_account_format).map_err(|reason| {
                ValidationIssue::error(IssueKind::InvalidAccountCode, reason)
                    .at_line(line.line_number)
                    .with_details(serde_json::json!({ "raw_code": raw_code }))
                    .with_suggestion("Use a chart-of-accounts code such as 401 or 401.01")
            })?;

        let account_name = if self.options.auto_normalize_names {
            normalize_account_name(&raw_name)
        } else {
            raw_name.trim().to_string()
        };
        if account_name.is_empty() {
            return Err(ValidationIssue::error(
                IssueKind::MissingRequiredField,
                format!("Line {} is missing the account name", line.line_number),
            )
            .at_line(line.line_number)
            .for_account(account_code));
        }

        let account = Account {
            account_code,
            account_name,
            opening_debit: coerce_amount(cell(ColumnRole::OpeningDebit)),
            opening_credit: coerce_amount(cell(ColumnRole::OpeningCredit)),
            turnover_debit: coerce_amount(cell(ColumnRole::TurnoverDebit)),
            turnover_credit: coerce_amount(cell(ColumnRole::TurnoverCredit)),
            closing_debit: coerce_amount(cell(ColumnRole::ClosingDebit)),
            closing_credit: coerce_amount(cell(ColumnRole::ClosingCredit)),
        };

        for (label, debit, credit) in [
            ("opening", account.opening_debit, account.opening_credit),
            ("closing", account.closing_debit, account.closing_credit),
        ] {
            if debit > 0.0 && credit > 0.0 {
                warnings.push(
                    ValidationIssue::warning(
                        IssueKind::DualBalance,
                        format!(
                            "Account {} has both debit and credit {} balances",
                            account.account_code, label
                        ),
                    )
                    .at_line(line.line_number)
                    .for_account(account.account_code.clone())
                    .with_details(serde_json::json!({ "debit": debit, "credit": credit })),
                );
            }
        }

        Ok(account)
    }
}

pub fn normalize(
    raw_lines: &[RawLine],
    mapping: &ColumnMapping,
    options: &NormalizeOptions,
) -> NormalizationOutcome {
    Normalizer::new(options.clone()).normalize(raw_lines, mapping)
}

/// Strips everything but digits and dots, then checks the code shape.
pub fn normalize_account_code(raw: &str, strict: bool) -> Result<String, String> {
    let code: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if !is_valid_account_code(&code, strict) {
        if strict {
            if let Some(first) = code.chars().next() {
                if !('1'..='8').contains(&first) {
                    return Err(format!(
                        "Account code '{}' has class digit '{}', expected 1-8",
                        raw.trim(),
                        first
                    ));
                }
            }
        }
        return Err(format!("Invalid account code format: '{}'", raw.trim()));
    }

    Ok(code)
}

pub fn is_valid_account_code(code: &str, strict: bool) -> bool {
    if strict {
        STRICT_CODE_SHAPE.is_match(code)
    } else {
        CODE_SHAPE.is_match(code)
    }
}

pub fn normalize_account_name(raw: &str) -> String {
    let stripped = NAME_DISALLOWED.replace_all(raw, "");
    let collapsed = WHITESPACE.replace_all(stripped.trim(), " ");

    collapsed
        .split(' ')
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let is_acronym = word.chars().count() <= 3
        && word.chars().any(char::is_alphabetic)
        && word.chars().all(|c| !c.is_alphabetic() || c.is_uppercase());
    if is_acronym {
        return word.to_string();
    }

    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Amounts are positional: the absolute value is kept and unreadable input is 0.
pub fn coerce_amount(cell: Option<&CellValue>) -> f64 {
    let value = match cell {
        Some(CellValue::Number(n)) => *n,
        Some(CellValue::Text(s)) => parse_amount(s).unwrap_or(0.0),
        Some(CellValue::Null) | None => 0.0,
    };

    if value.is_finite() {
        value.abs()
    } else {
        0.0
    }
}
