use crate::error::{Result, TrialBalanceError};
use crate::extractor::FinancialComponents;
use crate::formula::evaluate;
use crate::utils::round_to;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const PERCENTAGE_SANITY_LIMIT: f64 = 10_000.0;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z_][A-Za-z0-9_]*\b").expect("valid regex"));
static ARITHMETIC_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d\s+\-*/%().]*$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum KpiUnit {
    #[schemars(description = "Value expressed in percent (0-100 scale)")]
    Percentage,
    #[schemars(description = "Plain ratio between two amounts")]
    Ratio,
    #[schemars(description = "Monetary amount")]
    Currency,
    #[schemars(description = "Number of days")]
    Days,
    #[schemars(description = "Number of times (turnover multiples)")]
    Times,
    #[serde(other)]
    #[schemars(description = "Any other numeric value")]
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Formula {
    #[schemars(
        description = "Primary arithmetic expression over FinancialComponents field names and intermediate names, e.g. 'current_assets / current_liabilities'"
    )]
    pub formula: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(
        description = "Named helper expressions evaluated against FinancialComponents only (they cannot reference each other); their results are usable in the primary formula"
    )]
    pub intermediate: BTreeMap<String, String>,
}

impl Formula {
    pub fn new(formula: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            intermediate: BTreeMap::new(),
        }
    }

    pub fn with_intermediate(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.intermediate.insert(name.into(), expression.into());
        self
    }

    /// The formula string must be present and non-blank.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.formula.trim().is_empty() {
            return Err("formula expression is empty".to_string());
        }
        if let Some((name, _)) = self.intermediate.iter().find(|(_, e)| e.trim().is_empty()) {
            return Err(format!("intermediate '{}' has an empty expression", name));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KpiDefinition {
    #[schemars(description = "Unique KPI code, e.g. 'current_ratio'")]
    pub code: String,

    #[serde(default)]
    #[schemars(description = "Human readable name")]
    pub name: Option<String>,

    #[schemars(description = "Grouping such as liquidity, profitability, leverage, efficiency")]
    pub category: String,

    pub unit: KpiUnit,

    pub formula: Formula,
}

impl KpiDefinition {
    pub fn new(
        code: impl Into<String>,
        category: impl Into<String>,
        unit: KpiUnit,
        formula: Formula,
    ) -> Self {
        Self {
            code: code.into(),
            name: None,
            category: category.into(),
            unit,
            formula,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(TrialBalanceError::InvalidKpiDefinition {
                code: self.code.clone(),
                details: "code is empty".to_string(),
            });
        }
        self.formula
            .validate()
            .map_err(|details| TrialBalanceError::InvalidKpiDefinition {
                code: self.code.clone(),
                details,
            })
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(KpiDefinition)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }
}

/// A KPI definition as read from storage, with the formula still JSON-encoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiDefinitionRow {
    pub code: String,
    pub name: Option<String>,
    pub category: String,
    pub unit: String,
    pub formula_json: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FormulaPayload {
    Structured(Formula),
    Expression(String),
}

impl TryFrom<KpiDefinitionRow> for KpiDefinition {
    type Error = TrialBalanceError;

    fn try_from(row: KpiDefinitionRow) -> Result<Self> {
        let formula = match serde_json::from_str::<FormulaPayload>(&row.formula_json) {
            Ok(FormulaPayload::Structured(formula)) => formula,
            Ok(FormulaPayload::Expression(expression)) => Formula::new(expression),
            Err(e) => {
                return Err(TrialBalanceError::InvalidKpiDefinition {
                    code: row.code,
                    details: format!("formula JSON is malformed: {}", e),
                })
            }
        };
        let unit: KpiUnit =
            serde_json::from_value(serde_json::Value::String(row.unit.trim().to_lowercase()))?;

        let definition = KpiDefinition {
            code: row.code,
            name: row.name,
            category: row.category,
            unit,
            formula,
        };
        definition.validate()?;
        Ok(definition)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KpiMetadata {
    /// FinancialComponents fields referenced by the formula or its intermediates
    pub components_used: Vec<String>,
    pub intermediate_values: BTreeMap<String, f64>,
    pub warnings: Vec<String>,
    pub formula: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_trace: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiCalculationResult {
    pub kpi_code: String,
    pub unit: KpiUnit,
    pub value: Option<f64>,
    pub metadata: KpiMetadata,
    pub error: Option<String>,
    pub calculated_at: DateTime<Utc>,
}

impl KpiCalculationResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Evaluates KPI definitions against one set of financial components.
pub struct KpiEngine<'a> {
    components: &'a FinancialComponents,
    debug: bool,
}

impl<'a> KpiEngine<'a> {
    pub fn new(components: &'a FinancialComponents) -> Self {
        Self {
            components,
            debug: false,
        }
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn calculate(&self, definition: &KpiDefinition) -> KpiCalculationResult {
        let formula = &definition.formula;
        let mut metadata = KpiMetadata {
            components_used: referenced_components(formula),
            formula: formula.formula.clone(),
            debug_trace: self.debug.then(Vec::new),
            ..KpiMetadata::default()
        };

        if let Err(details) = formula.validate() {
            return finish(definition, None, metadata, Some(details));
        }

        for (name, expression) in &formula.intermediate {
            let outcome = self.evaluate_expression(
                expression,
                |id| self.components.get(id),
                &mut metadata,
            );
            match outcome {
                Ok(value) if value.is_finite() => {
                    metadata.intermediate_values.insert(name.clone(), value);
                }
                Ok(_) => {
                    let error = format!("Intermediate '{}' evaluated to a non-finite value", name);
                    return finish(definition, None, metadata, Some(error));
                }
                Err(e) => {
                    let error = format!("Intermediate '{}' failed: {}", name, e);
                    return finish(definition, None, metadata, Some(error));
                }
            }
        }

        let intermediates = metadata.intermediate_values.clone();
        let outcome = self.evaluate_expression(
            &formula.formula,
            |id| intermediates.get(id).copied().or_else(|| self.components.get(id)),
            &mut metadata,
        );

        let value = match outcome {
            Ok(value) => value,
            Err(e) => return finish(definition, None, metadata, Some(e)),
        };

        if value.is_nan() {
            return finish(
                definition,
                None,
                metadata,
                Some("Formula result is not a number (0 / 0)".to_string()),
            );
        }
        if value.is_infinite() {
            return finish(
                definition,
                None,
                metadata,
                Some("Division by zero in formula".to_string()),
            );
        }

        if definition.unit == KpiUnit::Percentage && value.abs() > PERCENTAGE_SANITY_LIMIT {
            warn!(
                "KPI {} produced an implausible percentage: {}",
                definition.code, value
            );
            metadata.warnings.push(format!(
                "Percentage value {:.2} exceeds {:.0}",
                value, PERCENTAGE_SANITY_LIMIT
            ));
        }

        finish(definition, Some(round_to(value, 4)), metadata, None)
    }

    pub fn calculate_batch(&self, definitions: &[KpiDefinition]) -> Vec<KpiCalculationResult> {
        definitions.iter().map(|d| self.calculate(d)).collect()
    }

    /// Substitutes identifiers, checks the result is plain arithmetic, evaluates it.
    fn evaluate_expression(
        &self,
        expression: &str,
        resolve: impl Fn(&str) -> Option<f64>,
        metadata: &mut KpiMetadata,
    ) -> std::result::Result<f64, String> {
        let mut unresolved = Vec::new();
        let substituted = IDENTIFIER.replace_all(expression, |caps: &regex::Captures| {
            let identifier = &caps[0];
            match resolve(identifier) {
                Some(value) if value < 0.0 => format!("({})", value),
                Some(value) => value.to_string(),
                None => {
                    unresolved.push(identifier.to_string());
                    "0".to_string()
                }
            }
        });

        for identifier in unresolved {
            warn!("Unknown identifier '{}' in formula, using 0", identifier);
            metadata
                .warnings
                .push(format!("Unknown identifier '{}' replaced with 0", identifier));
        }

        if let Some(trace) = metadata.debug_trace.as_mut() {
            trace.push(format!("{} => {}", expression, substituted));
        }
        if self.debug {
            debug!("Evaluating '{}' as '{}'", expression, substituted);
        }

        if !ARITHMETIC_ONLY.is_match(&substituted) {
            return Err(format!(
                "Formula contains invalid characters after substitution: '{}'",
                substituted
            ));
        }

        evaluate(&substituted).map_err(|e| e.to_string())
    }
}

fn finish(
    definition: &KpiDefinition,
    value: Option<f64>,
    metadata: KpiMetadata,
    error: Option<String>,
) -> KpiCalculationResult {
    if let Some(error) = &error {
        debug!("KPI {} failed: {}", definition.code, error);
    }
    KpiCalculationResult {
        kpi_code: definition.code.clone(),
        unit: definition.unit,
        value,
        metadata,
        error,
        calculated_at: Utc::now(),
    }
}

fn referenced_components(formula: &Formula) -> Vec<String> {
    let mut used = BTreeSet::new();

    for expression in formula.intermediate.values() {
        for m in IDENTIFIER.find_iter(expression) {
            if FinancialComponents::is_field(m.as_str()) {
                used.insert(m.as_str().to_string());
            }
        }
    }
    for m in IDENTIFIER.find_iter(&formula.formula) {
        let id = m.as_str();
        if FinancialComponents::is_field(id) && !formula.intermediate.contains_key(id) {
            used.insert(id.to_string());
        }
    }

    used.into_iter().collect()
}

pub fn calculate(
    definition: &KpiDefinition,
    components: &FinancialComponents,
    debug: bool,
) -> KpiCalculationResult {
    KpiEngine::new(components).with_debug(debug).calculate(definition)
}

pub fn calculate_batch(
    definitions: &[KpiDefinition],
    components: &FinancialComponents,
) -> Vec<KpiCalculationResult> {
    KpiEngine::new(components).calculate_batch(definitions)
}

/// Built-in catalogue of common ratios over `FinancialComponents`.
pub fn standard_kpi_definitions() -> Vec<KpiDefinition> {
    vec![
        KpiDefinition::new(
            "current_ratio",
            "liquidity",
            KpiUnit::Ratio,
            Formula::new("current_assets / current_liabilities"),
        )
        .with_name("Current ratio"),
        KpiDefinition::new(
            "quick_ratio",
            "liquidity",
            KpiUnit::Ratio,
            Formula::new("(current_assets - inventory) / current_liabilities"),
        )
        .with_name("Quick ratio"),
        KpiDefinition::new(
            "cash_ratio",
            "liquidity",
            KpiUnit::Ratio,
            Formula::new("cash_and_equivalents / current_liabilities"),
        )
        .with_name("Cash ratio"),
        KpiDefinition::new(
            "gross_margin",
            "profitability",
            KpiUnit::Percentage,
            Formula::new("gross_profit / revenue * 100").with_intermediate("gross_profit", "revenue - cogs"),
        )
        .with_name("Gross margin"),
        KpiDefinition::new(
            "operating_margin",
            "profitability",
            KpiUnit::Percentage,
            Formula::new("operating_income / revenue * 100"),
        )
        .with_name("Operating margin"),
        KpiDefinition::new(
            "net_margin",
            "profitability",
            KpiUnit::Percentage,
            Formula::new("net_income / revenue * 100"),
        )
        .with_name("Net profit margin"),
        KpiDefinition::new(
            "roa",
            "profitability",
            KpiUnit::Percentage,
            Formula::new("net_income / average_total_assets * 100"),
        )
        .with_name("Return on assets"),
        KpiDefinition::new(
            "roe",
            "profitability",
            KpiUnit::Percentage,
            Formula::new("net_income / average_shareholders_equity * 100"),
        )
        .with_name("Return on equity"),
        KpiDefinition::new(
            "debt_to_equity",
            "leverage",
            KpiUnit::Ratio,
            Formula::new("total_liabilities / shareholders_equity"),
        )
        .with_name("Debt to equity"),
        KpiDefinition::new(
            "interest_coverage",
            "leverage",
            KpiUnit::Times,
            Formula::new("operating_income / interest_expense"),
        )
        .with_name("Interest coverage"),
        KpiDefinition::new(
            "asset_turnover",
            "efficiency",
            KpiUnit::Times,
            Formula::new("revenue / average_total_assets"),
        )
        .with_name("Asset turnover"),
        KpiDefinition::new(
            "inventory_turnover",
            "efficiency",
            KpiUnit::Times,
            Formula::new("cogs / average_inventory"),
        )
        .with_name("Inventory turnover"),
        KpiDefinition::new(
            "days_sales_outstanding",
            "efficiency",
            KpiUnit::Days,
            Formula::new("average_accounts_receivable / revenue * 365"),
        )
        .with_name("Days sales outstanding"),
        KpiDefinition::new(
            "days_payables_outstanding",
            "efficiency",
            KpiUnit::Days,
            Formula::new("average_accounts_payable / cogs * 365"),
        )
        .with_name("Days payables outstanding"),
    ]
}
