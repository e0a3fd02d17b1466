//! # Trial Balance Engine
//!
//! A library for importing Romanian trial balances (balanta de verificare) from CSV
//! or Excel exports and turning them into validated accounts, financial components,
//! KPIs and statements.
//!
//! ## Core Concepts
//!
//! - **Raw Lines**: Rows read from the uploaded file, keyed by column, with a detected column mapping
//! - **Accounts**: Canonical records with opening, turnover and closing debit/credit amounts
//! - **Validation Gate**: Exhaustive critical checks (balance equations, duplicates, bad numbers) plus advisory warnings
//! - **Financial Components**: Aggregates derived from the chart-of-accounts class of each account
//! - **KPIs**: Arithmetic formulas over the components, evaluated by a restricted evaluator
//! - **Statements**: Balance sheet and income statement grouped by statutory subcategory
//!
//! ## Example
//!
//! ```rust,ignore
//! use trial_balance_engine::*;
//!
//! let bytes = std::fs::read("balanta_2024.csv")?;
//! let options = ProcessingOptions::default();
//!
//! let import = TrialBalanceProcessor::import(&bytes, "balanta_2024.csv", "text/csv", &options)?;
//! if !import.validation.is_valid {
//!     for issue in &import.validation.errors {
//!         eprintln!("{}", issue.message);
//!     }
//! }
//!
//! let analysis = TrialBalanceProcessor::analyze(
//!     import.accounts(),
//!     &standard_kpi_definitions(),
//!     &options,
//! );
//! println!("{}", analysis.statements.balance_sheet.to_markdown());
//! ```

pub mod chart_of_accounts;
pub mod config;
pub mod error;
pub mod extractor;
pub mod formula;
pub mod kpi;
pub mod normalizer;
pub mod parser;
pub mod schema;
pub mod statements;
pub mod utils;
pub mod validation;

pub use chart_of_accounts::{AccountClass, AccountEntry, ChartOfAccounts, StatementSide};
pub use config::{
    AssemblyOptions, NormalizeOptions, ParserConfig, ProcessingOptions, ValidationOptions,
};
pub use error::{Result, TrialBalanceError};
pub use extractor::{extract, verify_components, ComponentVerification, FinancialComponents};
pub use formula::{evaluate, FormulaError};
pub use kpi::{
    calculate, calculate_batch, standard_kpi_definitions, Formula, KpiCalculationResult,
    KpiDefinition, KpiDefinitionRow, KpiEngine, KpiMetadata, KpiUnit,
};
pub use normalizer::{normalize, NormalizationOutcome, Normalizer};
pub use parser::{FileFormat, MappingStrategy, ParseMetadata, ParseOutcome, TrialBalanceParser};
pub use schema::*;
pub use statements::{
    assemble, build_balance_sheet, build_income_statement, BalanceSheet, FinancialStatements,
    IncomeStatement, StatementCategory, StatementGroup, StatementLine, StatementSection,
};
pub use validation::{validate, ValidationReport, ValidationStatistics, Validator};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Everything produced by reading one uploaded file up to the validation gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub metadata: ParseMetadata,
    pub mapping: ColumnMapping,
    /// Non-fatal parser problems
    pub parse_errors: Vec<String>,
    pub normalization: NormalizationOutcome,
    pub validation: ValidationReport,
}

impl ImportOutcome {
    pub fn accounts(&self) -> &[Account] {
        &self.normalization.accounts
    }

    /// True when the accounts passed the gate and may be persisted.
    pub fn is_acceptable(&self) -> bool {
        self.validation.is_valid
    }

    pub fn chart_of_accounts(&self) -> ChartOfAccounts {
        ChartOfAccounts::from_accounts(self.accounts())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutcome {
    pub components: FinancialComponents,
    pub verification: ComponentVerification,
    pub kpis: Vec<KpiCalculationResult>,
    pub statements: FinancialStatements,
}

impl AnalysisOutcome {
    pub fn kpi(&self, code: &str) -> Option<&KpiCalculationResult> {
        self.kpis.iter().find(|k| k.kpi_code == code)
    }
}

pub struct TrialBalanceProcessor;

impl TrialBalanceProcessor {
    /// Parses, normalizes and validates one file. Only unreadable input is an `Err`;
    /// data-quality problems are reported in the outcome.
    pub fn import(
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
        options: &ProcessingOptions,
    ) -> Result<ImportOutcome> {
        info!("Importing trial balance from {} ({})", file_name, mime_type);

        let parsed = TrialBalanceParser::new(options.parser.clone()).parse(bytes, file_name, mime_type)?;
        debug!(
            "Parsed {} data rows using {:?} column mapping",
            parsed.metadata.data_rows, parsed.metadata.mapping_strategy
        );
        for error in &parsed.errors {
            warn!("Parse problem in {}: {}", file_name, error);
        }

        let normalization =
            Normalizer::new(options.normalize.clone()).normalize(&parsed.raw_lines, &parsed.mapping);
        let validation = Validator::new(options.validation.clone()).validate(&normalization.accounts);

        info!(
            "Import of {} finished: {}/{} lines normalized, valid = {}, {} errors, {} warnings",
            file_name,
            normalization.successful_lines,
            normalization.processed_lines,
            validation.is_valid,
            validation.errors.len(),
            validation.warnings.len()
        );

        Ok(ImportOutcome {
            metadata: parsed.metadata,
            mapping: parsed.mapping,
            parse_errors: parsed.errors,
            normalization,
            validation,
        })
    }

    pub fn analyze(
        accounts: &[Account],
        definitions: &[KpiDefinition],
        options: &ProcessingOptions,
    ) -> AnalysisOutcome {
        let components = extract(accounts);
        let verification = verify_components(&components);

        if !verification.is_balanced {
            debug!(
                "Extracted components off balance by {:.2}",
                verification.difference
            );
        }
        for warning in &verification.warnings {
            debug!("Component check: {}", warning);
        }

        let kpis = KpiEngine::new(&components).calculate_batch(definitions);
        let failed = kpis.iter().filter(|k| !k.is_ok()).count();
        if failed > 0 {
            warn!("{} of {} KPIs could not be calculated", failed, kpis.len());
        }

        let statements = assemble(accounts, &options.assembly);

        AnalysisOutcome {
            components,
            verification,
            kpis,
            statements,
        }
    }
}

pub fn import_trial_balance(
    bytes: &[u8],
    file_name: &str,
    mime_type: &str,
    options: &ProcessingOptions,
) -> Result<ImportOutcome> {
    TrialBalanceProcessor::import(bytes, file_name, mime_type, options)
}

pub fn analyze_accounts(
    accounts: &[Account],
    definitions: &[KpiDefinition],
    options: &ProcessingOptions,
) -> AnalysisOutcome {
    TrialBalanceProcessor::analyze(accounts, definitions, options)
}
