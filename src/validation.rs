//! Acceptance gate for normalized trial balances.
//!
//! Critical checks decide `is_valid`; warning checks are advisory and can be
//! switched off with `ignore_warnings`. Every check runs over the whole batch so
//! all problems are reported in a single pass.

use crate::chart_of_accounts::synthetic_parent;
use crate::config::ValidationOptions;
use crate::normalizer::is_valid_account_code;
use crate::schema::{Account, IssueKind, ValidationIssue};
use crate::utils::median;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Instant;

type Check = fn(&[Account], &ValidationOptions) -> Vec<ValidationIssue>;

const CRITICAL_CHECKS: [(&str, Check); 7] = [
    ("non_empty", check_not_empty),
    ("opening_balance", check_opening_balance),
    ("turnover_balance", check_turnover_balance),
    ("closing_balance", check_closing_balance),
    ("account_code_format", check_code_format),
    ("finite_amounts", check_finite_amounts),
    ("unique_account_codes", check_duplicate_codes),
];

const WARNING_CHECKS: [(&str, Check); 9] = [
    ("class_coverage", check_class_coverage),
    ("dual_balances", check_dual_balances),
    ("account_equation", check_account_equation),
    ("dormant_accounts", check_zero_accounts),
    ("negative_amounts", check_negative_amounts),
    ("outliers", check_outliers),
    ("duplicate_names", check_duplicate_names),
    ("synthetic_parents", check_synthetic_parents),
    ("account_names", check_incomplete_names),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationStatistics {
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
    /// Advisory checks that produced at least one warning
    pub warning_checks: usize,
    pub accounts_checked: usize,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub statistics: ValidationStatistics,
}

pub struct Validator {
    options: ValidationOptions,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn validate(&self, accounts: &[Account]) -> ValidationReport {
        let started_at = Utc::now();
        let timer = Instant::now();

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut total_checks = 0;
        let mut failed_checks = 0;
        let mut warning_checks = 0;

        for (name, check) in CRITICAL_CHECKS {
            total_checks += 1;
            let issues = check(accounts, &self.options);
            if !issues.is_empty() {
                debug!("Critical check '{}' failed with {} issue(s)", name, issues.len());
                failed_checks += 1;
                errors.extend(issues);
            }
        }

        if !self.options.ignore_warnings {
            for (name, check) in WARNING_CHECKS {
                total_checks += 1;
                let issues = check(accounts, &self.options);
                if !issues.is_empty() {
                    debug!("Advisory check '{}' raised {} warning(s)", name, issues.len());
                    warning_checks += 1;
                    warnings.extend(issues);
                }
            }
        }

        let is_valid = errors.is_empty();
        let statistics = ValidationStatistics {
            total_checks,
            passed_checks: total_checks - failed_checks - warning_checks,
            failed_checks,
            warning_checks,
            accounts_checked: accounts.len(),
            duration_ms: timer.elapsed().as_millis() as u64,
            started_at,
        };

        info!(
            "Validated {} accounts: valid={}, {} errors, {} warnings",
            accounts.len(),
            is_valid,
            errors.len(),
            warnings.len()
        );

        ValidationReport {
            is_valid,
            errors,
            warnings,
            statistics,
        }
    }
}

pub fn validate(accounts: &[Account], options: &ValidationOptions) -> ValidationReport {
    Validator::new(options.clone()).validate(accounts)
}

fn check_not_empty(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    if accounts.is_empty() {
        vec![ValidationIssue::error(IssueKind::EmptyAccounts, "The trial balance contains no accounts")
            .with_suggestion("Check that the file has data rows below the header")]
    } else {
        Vec::new()
    }
}

fn balance_issue(
    kind: IssueKind,
    label: &str,
    debit: f64,
    credit: f64,
    tolerance: f64,
) -> Vec<ValidationIssue> {
    let difference = debit - credit;
    // NaN sums must fail too
    if difference.abs() <= tolerance {
        return Vec::new();
    }

    vec![ValidationIssue::error(
        kind,
        format!(
            "Total {} debit ({:.2}) does not equal total {} credit ({:.2}); difference {:.2}",
            label, debit, label, credit, difference
        ),
    )
    .with_details(json!({
        "total_debit": debit,
        "total_credit": credit,
        "difference": difference,
        "tolerance": tolerance,
    }))]
}

fn check_opening_balance(accounts: &[Account], options: &ValidationOptions) -> Vec<ValidationIssue> {
    let debit = accounts.iter().map(|a| a.opening_debit).sum();
    let credit = accounts.iter().map(|a| a.opening_credit).sum();
    balance_issue(IssueKind::OpeningImbalance, "opening", debit, credit, options.balance_tolerance)
}

fn check_turnover_balance(accounts: &[Account], options: &ValidationOptions) -> Vec<ValidationIssue> {
    let debit = accounts.iter().map(|a| a.turnover_debit).sum();
    let credit = accounts.iter().map(|a| a.turnover_credit).sum();
    balance_issue(IssueKind::TurnoverImbalance, "turnover", debit, credit, options.balance_tolerance)
}

fn check_closing_balance(accounts: &[Account], options: &ValidationOptions) -> Vec<ValidationIssue> {
    let debit = accounts.iter().map(|a| a.closing_debit).sum();
    let credit = accounts.iter().map(|a| a.closing_credit).sum();
    balance_issue(IssueKind::ClosingImbalance, "closing", debit, credit, options.balance_tolerance)
}

fn check_code_format(accounts: &[Account], options: &ValidationOptions) -> Vec<ValidationIssue> {
    accounts
        .iter()
        .filter(|a| !is_valid_account_code(&a.account_code, options.strict_account_format))
        .map(|a| {
            ValidationIssue::error(
                IssueKind::InvalidAccountCode,
                format!("Account code '{}' does not follow the chart of accounts format", a.account_code),
            )
            .for_account(a.account_code.clone())
        })
        .collect()
}

fn check_finite_amounts(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for account in accounts {
        for (field, value) in account.amounts() {
            if !value.is_finite() {
                issues.push(
                    ValidationIssue::error(
                        IssueKind::InvalidNumber,
                        format!("Account {} has a non-numeric {}", account.account_code, field),
                    )
                    .for_account(account.account_code.clone())
                    .with_details(json!({ "field": field })),
                );
            }
        }
    }
    issues
}

fn check_duplicate_codes(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for account in accounts {
        *counts.entry(account.account_code.as_str()).or_default() += 1;
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|(code, count)| {
            ValidationIssue::error(
                IssueKind::DuplicateAccounts,
                format!("Account code {} appears {} times", code, count),
            )
            .for_account(code)
            .with_details(json!({ "count": count }))
            .with_suggestion("Merge the duplicated rows into a single account")
        })
        .collect()
}

fn check_class_coverage(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    let present: HashSet<u8> = accounts.iter().filter_map(Account::class_digit).collect();

    (1..=7u8)
        .filter(|class| !present.contains(class))
        .map(|class| {
            ValidationIssue::warning(
                IssueKind::MissingAccountClass,
                format!("No accounts found for chart class {}", class),
            )
            .with_details(json!({ "class": class }))
        })
        .collect()
}

fn check_dual_balances(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for account in accounts {
        for (label, debit, credit) in [
            ("opening", account.opening_debit, account.opening_credit),
            ("closing", account.closing_debit, account.closing_credit),
        ] {
            if debit > 0.0 && credit > 0.0 {
                issues.push(
                    ValidationIssue::warning(
                        IssueKind::DualBalance,
                        format!(
                            "Account {} carries both a debit and a credit {} balance",
                            account.account_code, label
                        ),
                    )
                    .for_account(account.account_code.clone())
                    .with_suggestion("Report only the net balance on one side"),
                );
            }
        }
    }
    issues
}

fn check_account_equation(accounts: &[Account], options: &ValidationOptions) -> Vec<ValidationIssue> {
    accounts
        .iter()
        .filter_map(|account| {
            let expected = account.opening_net() + account.turnover_net();
            let actual = account.closing_net();
            let difference = expected - actual;
            if difference.abs() <= options.balance_tolerance {
                return None;
            }
            Some(
                ValidationIssue::warning(
                    IssueKind::AccountEquationMismatch,
                    format!(
                        "Account {}: opening + turnover ({:.2}) does not match closing ({:.2})",
                        account.account_code, expected, actual
                    ),
                )
                .for_account(account.account_code.clone())
                .with_details(json!({
                    "expected_closing_net": expected,
                    "closing_net": actual,
                    "difference": difference,
                })),
            )
        })
        .collect()
}

fn check_zero_accounts(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    accounts
        .iter()
        .filter(|a| a.is_zero())
        .map(|a| {
            ValidationIssue::warning(
                IssueKind::ZeroBalanceAccount,
                format!("Account {} has no balances or turnover", a.account_code),
            )
            .for_account(a.account_code.clone())
        })
        .collect()
}

fn check_negative_amounts(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    accounts
        .iter()
        .filter(|a| a.amounts().iter().any(|(_, v)| *v < 0.0))
        .map(|a| {
            let fields: Vec<&str> = a
                .amounts()
                .iter()
                .filter(|(_, v)| *v < 0.0)
                .map(|(f, _)| *f)
                .collect();
            ValidationIssue::warning(
                IssueKind::NegativeAmount,
                format!("Account {} has negative amounts", a.account_code),
            )
            .for_account(a.account_code.clone())
            .with_details(json!({ "fields": fields }))
            .with_suggestion("Move the amount to the opposite side instead of using a sign")
        })
        .collect()
}

/// Flags accounts whose largest amount exceeds `outlier_median_multiplier`
/// times the median magnitude of the non-zero accounts.
fn check_outliers(accounts: &[Account], options: &ValidationOptions) -> Vec<ValidationIssue> {
    let magnitudes: Vec<f64> = accounts
        .iter()
        .map(Account::magnitude)
        .filter(|m| *m > 0.0 && m.is_finite())
        .collect();

    if magnitudes.len() < options.outlier_min_population {
        return Vec::new();
    }
    let Some(median) = median(&magnitudes) else {
        return Vec::new();
    };
    let threshold = median * options.outlier_median_multiplier;

    accounts
        .iter()
        .filter(|a| a.magnitude().is_finite() && a.magnitude() > threshold)
        .map(|a| {
            ValidationIssue::warning(
                IssueKind::Outlier,
                format!(
                    "Account {} has an unusually large amount ({:.2}, median {:.2})",
                    a.account_code,
                    a.magnitude(),
                    median
                ),
            )
            .for_account(a.account_code.clone())
            .with_details(json!({
                "magnitude": a.magnitude(),
                "median": median,
                "threshold": threshold,
            }))
            .with_suggestion("Check for a misplaced decimal separator")
        })
        .collect()
}

fn check_duplicate_names(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    let mut by_name: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for account in accounts {
        by_name
            .entry(account.account_name.trim().to_lowercase())
            .or_default()
            .insert(account.account_code.as_str());
    }

    by_name
        .into_iter()
        .filter(|(_, codes)| codes.len() > 1)
        .map(|(name, codes)| {
            let codes: Vec<&str> = codes.into_iter().collect();
            ValidationIssue::warning(
                IssueKind::DuplicateAccountName,
                format!("Name '{}' is used by accounts {}", name, codes.join(", ")),
            )
            .with_details(json!({ "codes": codes }))
        })
        .collect()
}

fn check_synthetic_parents(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    let codes: HashSet<&str> = accounts.iter().map(|a| a.account_code.as_str()).collect();

    accounts
        .iter()
        .filter_map(|a| {
            let parent = synthetic_parent(&a.account_code)?;
            if codes.contains(parent) {
                return None;
            }
            Some(
                ValidationIssue::warning(
                    IssueKind::MissingSyntheticAccount,
                    format!(
                        "Analytic account {} has no synthetic account {} in the trial balance",
                        a.account_code, parent
                    ),
                )
                .for_account(a.account_code.clone())
                .with_details(json!({ "parent": parent })),
            )
        })
        .collect()
}

fn check_incomplete_names(accounts: &[Account], _: &ValidationOptions) -> Vec<ValidationIssue> {
    accounts
        .iter()
        .filter(|a| a.account_name.trim().chars().count() < 3)
        .map(|a| {
            ValidationIssue::warning(
                IssueKind::IncompleteAccountName,
                format!("Account {} has an incomplete name '{}'", a.account_code, a.account_name),
            )
            .for_account(a.account_code.clone())
        })
        .collect()
}
