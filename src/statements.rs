//! Balance sheet and income statement assembly from trial-balance accounts.
//!
//! Both statements are built in independent passes over the same account list.
//! Accounts whose statement amount is zero produce no line. Groups appear in a
//! fixed order (assets, liabilities, equity; revenues, expenses) and lines are
//! sorted by account code within their group.

use crate::config::AssemblyOptions;
use crate::error::Result;
use crate::schema::Account;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementCategory {
    Assets,
    Liabilities,
    Equity,
    Revenues,
    Expenses,
}

impl StatementCategory {
    pub fn label(&self) -> &'static str {
        match self {
            StatementCategory::Assets => "Assets",
            StatementCategory::Liabilities => "Liabilities",
            StatementCategory::Equity => "Equity",
            StatementCategory::Revenues => "Revenues",
            StatementCategory::Expenses => "Expenses",
        }
    }
}

/// Statement subcategory. Declaration order is presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementSection {
    IntangibleAssets,
    TangibleAssets,
    FinancialAssets,
    DepreciationAndImpairment,
    Inventory,
    Receivables,
    Banks,
    CashOnHand,
    OtherTreasury,

    FinancialDebt,
    Suppliers,
    Payroll,
    FiscalLiabilities,
    OtherLiabilities,

    ShareCapital,
    Reserves,
    RetainedEarnings,
    CurrentYearResult,
    OtherEquity,

    OperatingRevenue,
    FinancialRevenue,
    ExtraordinaryRevenue,

    OperatingExpenses,
    FinancialExpenses,
    ExtraordinaryExpenses,
    IncomeTax,
}

impl StatementSection {
    pub fn category(&self) -> StatementCategory {
        use StatementSection::*;
        match self {
            IntangibleAssets | TangibleAssets | FinancialAssets | DepreciationAndImpairment
            | Inventory | Receivables | Banks | CashOnHand | OtherTreasury => {
                StatementCategory::Assets
            }
            FinancialDebt | Suppliers | Payroll | FiscalLiabilities | OtherLiabilities => {
                StatementCategory::Liabilities
            }
            ShareCapital | Reserves | RetainedEarnings | CurrentYearResult | OtherEquity => {
                StatementCategory::Equity
            }
            OperatingRevenue | FinancialRevenue | ExtraordinaryRevenue => {
                StatementCategory::Revenues
            }
            OperatingExpenses | FinancialExpenses | ExtraordinaryExpenses | IncomeTax => {
                StatementCategory::Expenses
            }
        }
    }

    pub fn label(&self) -> &'static str {
        use StatementSection::*;
        match self {
            IntangibleAssets => "Intangible assets",
            TangibleAssets => "Tangible assets",
            FinancialAssets => "Financial assets",
            DepreciationAndImpairment => "Depreciation and impairment",
            Inventory => "Inventory",
            Receivables => "Receivables",
            Banks => "Bank accounts",
            CashOnHand => "Cash on hand",
            OtherTreasury => "Other treasury",
            FinancialDebt => "Financial debt",
            Suppliers => "Suppliers",
            Payroll => "Payroll liabilities",
            FiscalLiabilities => "Fiscal liabilities",
            OtherLiabilities => "Other liabilities",
            ShareCapital => "Share capital",
            Reserves => "Reserves",
            RetainedEarnings => "Retained earnings",
            CurrentYearResult => "Current year result",
            OtherEquity => "Other equity",
            OperatingRevenue => "Operating revenue",
            FinancialRevenue => "Financial revenue",
            ExtraordinaryRevenue => "Extraordinary revenue",
            OperatingExpenses => "Operating expenses",
            FinancialExpenses => "Financial expenses",
            ExtraordinaryExpenses => "Extraordinary expenses",
            IncomeTax => "Income tax",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    pub account_code: String,
    pub description: String,
    pub amount: f64,
    /// 1-based position within the group
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementGroup {
    pub category: StatementCategory,
    pub subcategory: StatementSection,
    pub lines: Vec<StatementLine>,
    pub subtotal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub groups: Vec<StatementGroup>,
    pub total_assets: f64,
    pub total_liabilities: f64,
    pub total_equity: f64,
    pub total_liabilities_and_equity: f64,
    pub balance_difference: f64,
    pub is_balanced: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub groups: Vec<StatementGroup>,
    pub total_revenues: f64,
    pub total_expenses: f64,
    pub operating_revenue: f64,
    pub operating_expense: f64,
    /// Same value as `operating_profit`; there is no separate cost-of-sales grouping.
    pub gross_profit: f64,
    pub operating_profit: f64,
    pub profit_before_tax: f64,
    pub net_profit: f64,
    pub tax_expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatements {
    pub balance_sheet: BalanceSheet,
    pub income_statement: IncomeStatement,
}

fn equity_section(code: &str) -> StatementSection {
    if code.starts_with("101") {
        StatementSection::ShareCapital
    } else if ["104", "105", "106"].iter().any(|p| code.starts_with(p)) {
        StatementSection::Reserves
    } else if code.starts_with("117") {
        StatementSection::RetainedEarnings
    } else if code.starts_with("121") {
        StatementSection::CurrentYearResult
    } else {
        StatementSection::OtherEquity
    }
}

fn fixed_asset_section(code: &str) -> StatementSection {
    if code.starts_with("20") {
        StatementSection::IntangibleAssets
    } else if ["21", "22", "23"].iter().any(|p| code.starts_with(p)) {
        StatementSection::TangibleAssets
    } else if code.starts_with("26") || code.starts_with("27") {
        StatementSection::FinancialAssets
    } else {
        StatementSection::DepreciationAndImpairment
    }
}

fn liability_section(code: &str) -> StatementSection {
    if code.starts_with("401") {
        StatementSection::Suppliers
    } else if code.starts_with("421") || code.starts_with("423") {
        StatementSection::Payroll
    } else if code.starts_with("44") && !code.starts_with("442") {
        StatementSection::FiscalLiabilities
    } else if code.starts_with("45") {
        StatementSection::FinancialDebt
    } else {
        StatementSection::OtherLiabilities
    }
}

fn treasury_section(code: &str) -> StatementSection {
    if code.starts_with("51") {
        StatementSection::Banks
    } else if code.starts_with("53") {
        StatementSection::CashOnHand
    } else {
        StatementSection::OtherTreasury
    }
}

/// Balance sheet placement and amount for one account, or `None` if it belongs elsewhere.
fn balance_sheet_entry(account: &Account) -> Option<(StatementSection, f64)> {
    let code = account.account_code.as_str();
    let net = account.closing_net();

    match account.class_digit()? {
        1 => Some((equity_section(code), -net)),
        2 => Some((fixed_asset_section(code), net)),
        3 => Some((StatementSection::Inventory, net)),
        4 => {
            let section = if code.starts_with("401") {
                StatementSection::Suppliers
            } else if code.starts_with("411") || net >= 0.0 {
                StatementSection::Receivables
            } else {
                liability_section(code)
            };
            Some((section, net.abs()))
        }
        5 => Some((treasury_section(code), net)),
        _ => None,
    }
}

fn income_statement_entry(account: &Account) -> Option<(StatementSection, f64)> {
    let code = account.account_code.as_str();
    let amount = account.closing_net().abs();

    let section = match account.class_digit()? {
        7 if code.starts_with("76") => StatementSection::FinancialRevenue,
        7 if code.starts_with("77") => StatementSection::ExtraordinaryRevenue,
        7 => StatementSection::OperatingRevenue,
        6 if code.starts_with("66") => StatementSection::FinancialExpenses,
        6 if code.starts_with("67") => StatementSection::ExtraordinaryExpenses,
        6 if code.starts_with("69") => StatementSection::IncomeTax,
        6 => StatementSection::OperatingExpenses,
        _ => return None,
    };
    Some((section, amount))
}

fn build_groups(
    accounts: &[Account],
    place: impl Fn(&Account) -> Option<(StatementSection, f64)>,
) -> Vec<StatementGroup> {
    let mut sections: BTreeMap<StatementSection, Vec<(&Account, f64)>> = BTreeMap::new();

    for account in accounts {
        if let Some((section, amount)) = place(account) {
            if amount == 0.0 {
                continue;
            }
            sections.entry(section).or_default().push((account, amount));
        }
    }

    sections
        .into_iter()
        .map(|(section, mut entries)| {
            entries.sort_by(|a, b| a.0.account_code.cmp(&b.0.account_code));
            let lines: Vec<StatementLine> = entries
                .into_iter()
                .enumerate()
                .map(|(i, (account, amount))| StatementLine {
                    account_code: account.account_code.clone(),
                    description: account.account_name.clone(),
                    amount,
                    order: i + 1,
                })
                .collect();
            let subtotal = lines.iter().map(|l| l.amount).sum();

            StatementGroup {
                category: section.category(),
                subcategory: section,
                lines,
                subtotal,
            }
        })
        .collect()
}

fn category_total(groups: &[StatementGroup], category: StatementCategory) -> f64 {
    groups
        .iter()
        .filter(|g| g.category == category)
        .map(|g| g.subtotal)
        .sum()
}

fn section_total(groups: &[StatementGroup], section: StatementSection) -> f64 {
    groups
        .iter()
        .filter(|g| g.subcategory == section)
        .map(|g| g.subtotal)
        .sum()
}

pub fn build_balance_sheet(accounts: &[Account], options: &AssemblyOptions) -> BalanceSheet {
    let groups = build_groups(accounts, balance_sheet_entry);

    let total_assets = category_total(&groups, StatementCategory::Assets);
    let total_liabilities = category_total(&groups, StatementCategory::Liabilities);
    let total_equity = category_total(&groups, StatementCategory::Equity);
    let total_liabilities_and_equity = total_liabilities + total_equity;
    let balance_difference = total_assets - total_liabilities_and_equity;
    let is_balanced = balance_difference.abs() <= options.balance_tolerance;

    if !is_balanced {
        warn!(
            "Balance sheet does not balance: assets {:.2}, liabilities and equity {:.2}, difference {:.2}",
            total_assets, total_liabilities_and_equity, balance_difference
        );
    }

    BalanceSheet {
        groups,
        total_assets,
        total_liabilities,
        total_equity,
        total_liabilities_and_equity,
        balance_difference,
        is_balanced,
    }
}

pub fn build_income_statement(accounts: &[Account]) -> IncomeStatement {
    let groups = build_groups(accounts, income_statement_entry);

    let total_revenues = category_total(&groups, StatementCategory::Revenues);
    let total_expenses = category_total(&groups, StatementCategory::Expenses);
    let operating_revenue = section_total(&groups, StatementSection::OperatingRevenue);
    let operating_expense = section_total(&groups, StatementSection::OperatingExpenses);
    let tax_expense = section_total(&groups, StatementSection::IncomeTax);
    let operating_profit = operating_revenue - operating_expense;

    IncomeStatement {
        groups,
        total_revenues,
        total_expenses,
        operating_revenue,
        operating_expense,
        gross_profit: operating_profit,
        operating_profit,
        profit_before_tax: total_revenues - (total_expenses - tax_expense),
        net_profit: total_revenues - total_expenses,
        tax_expense,
    }
}

pub fn assemble(accounts: &[Account], options: &AssemblyOptions) -> FinancialStatements {
    let balance_sheet = build_balance_sheet(accounts, options);
    let income_statement = build_income_statement(accounts);

    info!(
        "Assembled statements: {} balance sheet groups, {} income statement groups, net profit {:.2}",
        balance_sheet.groups.len(),
        income_statement.groups.len(),
        income_statement.net_profit
    );

    FinancialStatements {
        balance_sheet,
        income_statement,
    }
}

fn push_groups_markdown(output: &mut String, groups: &[StatementGroup], category: StatementCategory) {
    output.push_str(&format!("## {}\n\n", category.label()));
    for group in groups.iter().filter(|g| g.category == category) {
        output.push_str(&format!("### {}\n\n", group.subcategory.label()));
        output.push_str("| # | Account | Description | Amount |\n");
        output.push_str("|---|---|---|---:|\n");
        for line in &group.lines {
            output.push_str(&format!(
                "| {} | {} | {} | {:.2} |\n",
                line.order, line.account_code, line.description, line.amount
            ));
        }
        output.push_str(&format!("\n**Subtotal:** {:.2}\n\n", group.subtotal));
    }
}

impl BalanceSheet {
    pub fn to_markdown(&self) -> String {
        let mut output = String::from("# Balance Sheet\n\n");

        push_groups_markdown(&mut output, &self.groups, StatementCategory::Assets);
        output.push_str(&format!("**Total assets:** {:.2}\n\n", self.total_assets));
        push_groups_markdown(&mut output, &self.groups, StatementCategory::Liabilities);
        output.push_str(&format!("**Total liabilities:** {:.2}\n\n", self.total_liabilities));
        push_groups_markdown(&mut output, &self.groups, StatementCategory::Equity);
        output.push_str(&format!("**Total equity:** {:.2}\n\n", self.total_equity));

        output.push_str(&format!(
            "**Total liabilities and equity:** {:.2}\n\n",
            self.total_liabilities_and_equity
        ));
        if !self.is_balanced {
            output.push_str(&format!(
                "> Unbalanced: difference of {:.2}\n",
                self.balance_difference
            ));
        }
        output
    }
}

impl IncomeStatement {
    pub fn to_markdown(&self) -> String {
        let mut output = String::from("# Income Statement\n\n");

        push_groups_markdown(&mut output, &self.groups, StatementCategory::Revenues);
        output.push_str(&format!("**Total revenues:** {:.2}\n\n", self.total_revenues));
        push_groups_markdown(&mut output, &self.groups, StatementCategory::Expenses);
        output.push_str(&format!("**Total expenses:** {:.2}\n\n", self.total_expenses));

        output.push_str("## Results\n\n");
        output.push_str(&format!("- Operating profit: {:.2}\n", self.operating_profit));
        output.push_str(&format!("- Profit before tax: {:.2}\n", self.profit_before_tax));
        output.push_str(&format!("- Income tax: {:.2}\n", self.tax_expense));
        output.push_str(&format!("- Net profit: {:.2}\n", self.net_profit));
        output
    }
}

impl FinancialStatements {
    /// One row per statement line, both statements in a single table.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "statement",
            "category",
            "subcategory",
            "order",
            "account_code",
            "description",
            "amount",
        ])?;

        let statements = [
            ("balance_sheet", &self.balance_sheet.groups),
            ("income_statement", &self.income_statement.groups),
        ];
        for (statement, groups) in statements {
            for group in groups {
                for line in &group.lines {
                    writer.write_record([
                        statement,
                        group.category.label(),
                        group.subcategory.label(),
                        line.order.to_string().as_str(),
                        line.account_code.as_str(),
                        line.description.as_str(),
                        format!("{:.2}", line.amount).as_str(),
                    ])?;
                }
            }
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
