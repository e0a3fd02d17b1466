use crate::error::Result;
use crate::schema::Account;
use serde::{Deserialize, Serialize};

/// Top-level classes of the Romanian chart of accounts (OMFP 1802/2014).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountClass {
    Capital,
    FixedAssets,
    Inventory,
    ThirdParties,
    Treasury,
    Expenses,
    Revenues,
    OffBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementSide {
    BalanceSheet,
    IncomeStatement,
    OffBalance,
}

impl AccountClass {
    pub const ALL: [AccountClass; 8] = [
        AccountClass::Capital,
        AccountClass::FixedAssets,
        AccountClass::Inventory,
        AccountClass::ThirdParties,
        AccountClass::Treasury,
        AccountClass::Expenses,
        AccountClass::Revenues,
        AccountClass::OffBalance,
    ];

    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(AccountClass::Capital),
            2 => Some(AccountClass::FixedAssets),
            3 => Some(AccountClass::Inventory),
            4 => Some(AccountClass::ThirdParties),
            5 => Some(AccountClass::Treasury),
            6 => Some(AccountClass::Expenses),
            7 => Some(AccountClass::Revenues),
            8 => Some(AccountClass::OffBalance),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        code.chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .and_then(|d| Self::from_digit(d as u8))
    }

    pub fn digit(&self) -> u8 {
        match self {
            AccountClass::Capital => 1,
            AccountClass::FixedAssets => 2,
            AccountClass::Inventory => 3,
            AccountClass::ThirdParties => 4,
            AccountClass::Treasury => 5,
            AccountClass::Expenses => 6,
            AccountClass::Revenues => 7,
            AccountClass::OffBalance => 8,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AccountClass::Capital => "Capital accounts",
            AccountClass::FixedAssets => "Fixed assets",
            AccountClass::Inventory => "Inventory and work in progress",
            AccountClass::ThirdParties => "Third-party accounts",
            AccountClass::Treasury => "Treasury accounts",
            AccountClass::Expenses => "Expense accounts",
            AccountClass::Revenues => "Revenue accounts",
            AccountClass::OffBalance => "Off-balance-sheet accounts",
        }
    }

    pub fn side(&self) -> StatementSide {
        match self {
            AccountClass::Expenses | AccountClass::Revenues => StatementSide::IncomeStatement,
            AccountClass::OffBalance => StatementSide::OffBalance,
            _ => StatementSide::BalanceSheet,
        }
    }
}

/// `401.01` → `Some("401")`; synthetic codes have no parent.
pub fn synthetic_parent(code: &str) -> Option<&str> {
    code.split_once('.').map(|(parent, _)| parent)
}

pub fn is_analytic(code: &str) -> bool {
    synthetic_parent(code).is_some()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub code: String,
    pub name: String,
    pub closing_net: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSection {
    pub class: AccountClass,
    pub accounts: Vec<AccountEntry>,
}

/// Accounts of one trial balance grouped by chart class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartOfAccounts {
    pub sections: Vec<ClassSection>,
    /// Accounts whose code does not start with a class digit 1-8
    pub unclassified: Vec<AccountEntry>,
}

impl ChartOfAccounts {
    pub fn from_accounts(accounts: &[Account]) -> Self {
        let mut sections: Vec<ClassSection> = AccountClass::ALL
            .iter()
            .map(|class| ClassSection {
                class: *class,
                accounts: Vec::new(),
            })
            .collect();
        let mut unclassified = Vec::new();

        for account in accounts {
            let entry = AccountEntry {
                code: account.account_code.clone(),
                name: account.account_name.clone(),
                closing_net: account.closing_net(),
            };

            match AccountClass::from_code(&account.account_code) {
                Some(class) => sections[(class.digit() - 1) as usize].accounts.push(entry),
                None => unclassified.push(entry),
            }
        }

        for section in &mut sections {
            section.accounts.sort_by(|a, b| a.code.cmp(&b.code));
        }
        unclassified.sort_by(|a, b| a.code.cmp(&b.code));

        Self {
            sections,
            unclassified,
        }
    }

    pub fn section(&self, class: AccountClass) -> &ClassSection {
        &self.sections[(class.digit() - 1) as usize]
    }

    /// Balance-sheet and income-statement classes (1-7) with no accounts.
    pub fn missing_classes(&self) -> Vec<AccountClass> {
        self.sections
            .iter()
            .filter(|s| s.class != AccountClass::OffBalance && s.accounts.is_empty())
            .map(|s| s.class)
            .collect()
    }

    pub fn total_accounts(&self) -> usize {
        self.sections.iter().map(|s| s.accounts.len()).sum::<usize>() + self.unclassified.len()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "class",
            "class_name",
            "account_code",
            "account_name",
            "closing_net",
        ])?;

        for section in &self.sections {
            for account in &section.accounts {
                writer.write_record([
                    section.class.digit().to_string().as_str(),
                    section.class.label(),
                    account.code.as_str(),
                    account.name.as_str(),
                    format!("{:.2}", account.closing_net).as_str(),
                ])?;
            }
        }

        for account in &self.unclassified {
            writer.write_record([
                "",
                "Unclassified",
                account.code.as_str(),
                account.name.as_str(),
                format!("{:.2}", account.closing_net).as_str(),
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Chart of Accounts\n\n");
        output.push_str(&format!("**Accounts:** {}\n\n", self.total_accounts()));

        for section in &self.sections {
            if section.accounts.is_empty() {
                continue;
            }
            output.push_str(&format!(
                "## Class {} - {}\n\n",
                section.class.digit(),
                section.class.label()
            ));
            for account in &section.accounts {
                // analytic accounts sit under their synthetic parent
                let indent = if is_analytic(&account.code) { "  " } else { "" };
                output.push_str(&format!("{}- {} {}\n", indent, account.code, account.name));
            }
            output.push('\n');
        }

        if !self.unclassified.is_empty() {
            output.push_str("## Unclassified\n\n");
            for account in &self.unclassified {
                output.push_str(&format!("- {} {}\n", account.code, account.name));
            }
            output.push('\n');
        }

        output
    }
}
