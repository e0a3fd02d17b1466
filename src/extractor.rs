//! Classification of validated accounts into the fixed `FinancialComponents`
//! aggregate consumed by the KPI engine.

use crate::schema::Account;
use serde::{Deserialize, Serialize};

pub const COMPONENT_BALANCE_TOLERANCE: f64 = 10.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialComponents {
    pub total_assets: f64,
    pub current_assets: f64,
    pub fixed_assets: f64,
    pub inventory: f64,
    pub accounts_receivable: f64,
    pub cash_and_equivalents: f64,
    pub total_liabilities: f64,
    pub current_liabilities: f64,
    pub accounts_payable: f64,
    pub shareholders_equity: f64,
    pub revenue: f64,
    pub sales_revenue: f64,
    pub cogs: f64,
    pub operating_expenses: f64,
    pub interest_expense: f64,
    pub depreciation: f64,
    pub operating_income: f64,
    pub net_income: f64,
    pub total_taxes: f64,
    pub average_total_assets: f64,
    pub average_current_assets: f64,
    pub average_inventory: f64,
    pub average_accounts_receivable: f64,
    pub average_accounts_payable: f64,
    pub average_shareholders_equity: f64,
}

impl FinancialComponents {
    pub const FIELD_NAMES: [&'static str; 25] = [
        "total_assets",
        "current_assets",
        "fixed_assets",
        "inventory",
        "accounts_receivable",
        "cash_and_equivalents",
        "total_liabilities",
        "current_liabilities",
        "accounts_payable",
        "shareholders_equity",
        "revenue",
        "sales_revenue",
        "cogs",
        "operating_expenses",
        "interest_expense",
        "depreciation",
        "operating_income",
        "net_income",
        "total_taxes",
        "average_total_assets",
        "average_current_assets",
        "average_inventory",
        "average_accounts_receivable",
        "average_accounts_payable",
        "average_shareholders_equity",
    ];

    pub fn get(&self, field: &str) -> Option<f64> {
        let value = match field {
            "total_assets" => self.total_assets,
            "current_assets" => self.current_assets,
            "fixed_assets" => self.fixed_assets,
            "inventory" => self.inventory,
            "accounts_receivable" => self.accounts_receivable,
            "cash_and_equivalents" => self.cash_and_equivalents,
            "total_liabilities" => self.total_liabilities,
            "current_liabilities" => self.current_liabilities,
            "accounts_payable" => self.accounts_payable,
            "shareholders_equity" => self.shareholders_equity,
            "revenue" => self.revenue,
            "sales_revenue" => self.sales_revenue,
            "cogs" => self.cogs,
            "operating_expenses" => self.operating_expenses,
            "interest_expense" => self.interest_expense,
            "depreciation" => self.depreciation,
            "operating_income" => self.operating_income,
            "net_income" => self.net_income,
            "total_taxes" => self.total_taxes,
            "average_total_assets" => self.average_total_assets,
            "average_current_assets" => self.average_current_assets,
            "average_inventory" => self.average_inventory,
            "average_accounts_receivable" => self.average_accounts_receivable,
            "average_accounts_payable" => self.average_accounts_payable,
            "average_shareholders_equity" => self.average_shareholders_equity,
            _ => return None,
        };
        Some(value)
    }

    pub fn is_field(name: &str) -> bool {
        Self::FIELD_NAMES.contains(&name)
    }
}

/// Balance-sheet accumulator for one pass (opening or closing balances).
#[derive(Debug, Clone, Copy, Default)]
struct BalanceTotals {
    total_assets: f64,
    current_assets: f64,
    fixed_assets: f64,
    inventory: f64,
    accounts_receivable: f64,
    cash_and_equivalents: f64,
    total_liabilities: f64,
    current_liabilities: f64,
    accounts_payable: f64,
    shareholders_equity: f64,
}

impl BalanceTotals {
    /// Adds one account balance. `net` is debit - credit.
    fn add(mut self, account: &Account, net: f64) -> Self {
        let amount = net.abs();
        match account.class_digit() {
            Some(1) => self.shareholders_equity += -net,
            Some(2) => {
                self.fixed_assets += amount;
                self.total_assets += amount;
            }
            Some(3) => {
                self.inventory += amount;
                self.current_assets += amount;
                self.total_assets += amount;
            }
            Some(4) => {
                if account.has_prefix("401") {
                    self.accounts_payable += amount;
                    self.current_liabilities += amount;
                    self.total_liabilities += amount;
                } else if account.has_prefix("411") || net >= 0.0 {
                    self.accounts_receivable += amount;
                    self.current_assets += amount;
                    self.total_assets += amount;
                } else {
                    // Not mirrored into total_liabilities, unlike 401
                    self.current_liabilities += amount;
                }
            }
            Some(5) => {
                self.cash_and_equivalents += amount;
                self.current_assets += amount;
                self.total_assets += amount;
            }
            _ => {}
        }
        self
    }
}

/// Income-statement accumulator, closing balances only.
#[derive(Debug, Clone, Copy, Default)]
struct ResultTotals {
    revenue: f64,
    sales_revenue: f64,
    cogs: f64,
    operating_expenses: f64,
    interest_expense: f64,
    depreciation: f64,
    total_taxes: Option<f64>,
}

impl ResultTotals {
    fn add(mut self, account: &Account) -> Self {
        let amount = account.closing_net().abs();
        match account.class_digit() {
            Some(6) => {
                if account.has_prefix("60") {
                    self.cogs += amount;
                } else if account.has_prefix("666") {
                    self.interest_expense += amount;
                } else if account.has_prefix("681") {
                    self.depreciation += amount;
                } else {
                    self.operating_expenses += amount;
                }
                if account.has_prefix("691") && self.total_taxes.is_none() {
                    self.total_taxes = Some(amount);
                }
            }
            Some(7) => {
                self.revenue += amount;
                if account.has_prefix("707") {
                    self.sales_revenue += amount;
                }
            }
            _ => {}
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ExtractionState {
    opening: BalanceTotals,
    closing: BalanceTotals,
    results: ResultTotals,
}

/// Single pass over the accounts; class 8 (memo accounts) is ignored.
pub fn extract(accounts: &[Account]) -> FinancialComponents {
    let state = accounts
        .iter()
        .fold(ExtractionState::default(), |state, account| ExtractionState {
            opening: state.opening.add(account, account.opening_net()),
            closing: state.closing.add(account, account.closing_net()),
            results: state.results.add(account),
        });

    let closing = state.closing;
    let opening = state.opening;
    let results = state.results;
    let average = |o: f64, c: f64| (o + c) / 2.0;

    FinancialComponents {
        total_assets: closing.total_assets,
        current_assets: closing.current_assets,
        fixed_assets: closing.fixed_assets,
        inventory: closing.inventory,
        accounts_receivable: closing.accounts_receivable,
        cash_and_equivalents: closing.cash_and_equivalents,
        total_liabilities: closing.total_liabilities,
        current_liabilities: closing.current_liabilities,
        accounts_payable: closing.accounts_payable,
        shareholders_equity: closing.shareholders_equity,
        revenue: results.revenue,
        sales_revenue: results.sales_revenue,
        cogs: results.cogs,
        operating_expenses: results.operating_expenses,
        interest_expense: results.interest_expense,
        depreciation: results.depreciation,
        operating_income: results.revenue - results.cogs - results.operating_expenses,
        net_income: results.revenue
            - (results.cogs
                + results.operating_expenses
                + results.interest_expense
                + results.depreciation),
        total_taxes: results.total_taxes.unwrap_or(0.0),
        average_total_assets: average(opening.total_assets, closing.total_assets),
        average_current_assets: average(opening.current_assets, closing.current_assets),
        average_inventory: average(opening.inventory, closing.inventory),
        average_accounts_receivable: average(
            opening.accounts_receivable,
            closing.accounts_receivable,
        ),
        average_accounts_payable: average(opening.accounts_payable, closing.accounts_payable),
        average_shareholders_equity: average(
            opening.shareholders_equity,
            closing.shareholders_equity,
        ),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentVerification {
    pub is_balanced: bool,
    /// total_assets - (total_liabilities + shareholders_equity)
    pub difference: f64,
    pub warnings: Vec<String>,
}

/// Advisory sanity checks on an extracted aggregate.
pub fn verify_components(components: &FinancialComponents) -> ComponentVerification {
    let difference =
        components.total_assets - (components.total_liabilities + components.shareholders_equity);
    let is_balanced = difference.abs() <= COMPONENT_BALANCE_TOLERANCE;

    let mut warnings = Vec::new();
    if !is_balanced {
        warnings.push(format!(
            "Assets ({:.2}) do not equal liabilities ({:.2}) plus equity ({:.2}); difference {:.2}",
            components.total_assets,
            components.total_liabilities,
            components.shareholders_equity,
            difference
        ));
    }
    for (label, value) in [
        ("Total assets", components.total_assets),
        ("Total liabilities", components.total_liabilities),
        ("Shareholders' equity", components.shareholders_equity),
    ] {
        if value < 0.0 {
            warnings.push(format!("{} is negative ({:.2})", label, value));
        }
    }
    if components.revenue == 0.0 {
        warnings.push("Revenue is zero".to_string());
    }
    if components.total_assets == 0.0 {
        warnings.push("Total assets are zero".to_string());
    }

    ComponentVerification {
        is_balanced,
        difference,
        warnings,
    }
}
