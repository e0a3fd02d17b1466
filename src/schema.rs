use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single spreadsheet/CSV cell after coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Null,
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Text(s) => Some(s.clone()),
            CellValue::Null => None,
        }
    }
}

/// One data row of the source file, keyed by column key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    /// 1-based row number in the source file
    pub line_number: usize,
    pub values: BTreeMap<String, CellValue>,
}

impl RawLine {
    pub fn get(&self, key: &str) -> Option<&CellValue> {
        self.values.get(key)
    }

    pub fn is_blank(&self) -> bool {
        self.values.values().all(CellValue::is_null)
    }
}

/// The eight semantic columns of a trial balance, in canonical positional order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    AccountCode,
    AccountName,
    OpeningDebit,
    OpeningCredit,
    TurnoverDebit,
    TurnoverCredit,
    ClosingDebit,
    ClosingCredit,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 8] = [
        ColumnRole::AccountCode,
        ColumnRole::AccountName,
        ColumnRole::OpeningDebit,
        ColumnRole::OpeningCredit,
        ColumnRole::TurnoverDebit,
        ColumnRole::TurnoverCredit,
        ColumnRole::ClosingDebit,
        ColumnRole::ClosingCredit,
    ];
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnRole::AccountCode => "account code",
            ColumnRole::AccountName => "account name",
            ColumnRole::OpeningDebit => "opening debit",
            ColumnRole::OpeningCredit => "opening credit",
            ColumnRole::TurnoverDebit => "turnover debit",
            ColumnRole::TurnoverCredit => "turnover credit",
            ColumnRole::ClosingDebit => "closing debit",
            ColumnRole::ClosingCredit => "closing credit",
        };
        f.write_str(label)
    }
}

/// Role → column key assignment, built once per file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub columns: BTreeMap<ColumnRole, String>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps every role to the column at the same canonical position.
    pub fn positional(keys: &[String]) -> Self {
        let columns = ColumnRole::ALL
            .iter()
            .zip(keys.iter())
            .map(|(role, key)| (*role, key.clone()))
            .collect();
        Self { columns }
    }

    pub fn assign(&mut self, role: ColumnRole, key: impl Into<String>) -> bool {
        if self.columns.contains_key(&role) {
            return false;
        }
        self.columns.insert(role, key.into());
        true
    }

    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        self.columns.get(&role).map(String::as_str)
    }

    pub fn resolved_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_complete(&self) -> bool {
        self.columns.len() == ColumnRole::ALL.len()
    }

    pub fn missing_roles(&self) -> Vec<ColumnRole> {
        ColumnRole::ALL
            .iter()
            .copied()
            .filter(|role| !self.columns.contains_key(role))
            .collect()
    }
}

/// A canonical trial-balance account. Amounts are always non-negative: the
/// side of a balance is given by which field is populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_code: String,
    pub account_name: String,
    pub opening_debit: f64,
    pub opening_credit: f64,
    pub turnover_debit: f64,
    pub turnover_credit: f64,
    pub closing_debit: f64,
    pub closing_credit: f64,
}

impl Account {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            account_code: code.into(),
            account_name: name.into(),
            opening_debit: 0.0,
            opening_credit: 0.0,
            turnover_debit: 0.0,
            turnover_credit: 0.0,
            closing_debit: 0.0,
            closing_credit: 0.0,
        }
    }

    pub fn with_opening(mut self, debit: f64, credit: f64) -> Self {
        self.opening_debit = debit;
        self.opening_credit = credit;
        self
    }

    pub fn with_turnover(mut self, debit: f64, credit: f64) -> Self {
        self.turnover_debit = debit;
        self.turnover_credit = credit;
        self
    }

    pub fn with_closing(mut self, debit: f64, credit: f64) -> Self {
        self.closing_debit = debit;
        self.closing_credit = credit;
        self
    }

    /// Leading chart-of-accounts class digit, if the code starts with one.
    pub fn class_digit(&self) -> Option<u8> {
        self.account_code
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8)
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.account_code.starts_with(prefix)
    }

    pub fn opening_net(&self) -> f64 {
        self.opening_debit - self.opening_credit
    }

    pub fn turnover_net(&self) -> f64 {
        self.turnover_debit - self.turnover_credit
    }

    pub fn closing_net(&self) -> f64 {
        self.closing_debit - self.closing_credit
    }

    pub fn amounts(&self) -> [(&'static str, f64); 6] {
        [
            ("opening_debit", self.opening_debit),
            ("opening_credit", self.opening_credit),
            ("turnover_debit", self.turnover_debit),
            ("turnover_credit", self.turnover_credit),
            ("closing_debit", self.closing_debit),
            ("closing_credit", self.closing_credit),
        ]
    }

    pub fn is_zero(&self) -> bool {
        self.amounts().iter().all(|(_, v)| *v == 0.0)
    }

    /// Largest absolute value across the six amount fields.
    pub fn magnitude(&self) -> f64 {
        self.amounts()
            .iter()
            .map(|(_, v)| v.abs())
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    // Normalization
    MissingRequiredField,
    InvalidAccountCode,
    DualBalance,
    // Critical validation
    EmptyAccounts,
    OpeningImbalance,
    TurnoverImbalance,
    ClosingImbalance,
    InvalidNumber,
    DuplicateAccounts,
    // Advisory validation
    MissingAccountClass,
    AccountEquationMismatch,
    ZeroBalanceAccount,
    NegativeAmount,
    Outlier,
    DuplicateAccountName,
    MissingSyntheticAccount,
    IncompleteAccountName,
}

/// A structured finding from normalization or validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    pub fn error(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Error, message)
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>) -> Self {
        Self::new(kind, Severity::Warning, message)
    }

    fn new(kind: IssueKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            severity,
            line_number: None,
            account_code: None,
            details: None,
            suggestion: None,
        }
    }

    pub fn at_line(mut self, line_number: usize) -> Self {
        self.line_number = Some(line_number);
        self
    }

    pub fn for_account(mut self, code: impl Into<String>) -> Self {
        self.account_code = Some(code.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}
