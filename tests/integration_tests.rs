use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use trial_balance_engine::*;

const HEADER: &str = "Cont;Denumire;SD init;SC init;RD;RC;SD final;SC final";

/// One year of a small trading company. Result accounts are not yet closed into 121.
const FULL_YEAR: &str = "\
Cont;Denumire;SD init;SC init;RD;RC;SD final;SC final
101;Capital subscris varsat;0;50000;0;0;0;50000
117;Rezultatul reportat;0;20000;0;0;0;20000
213;Instalatii tehnice si mijloace de transport;50000;0;20000;0;70000;0
281;Amortizari privind imobilizarile corporale;0;10000;0;15000;0;25000
371;Marfuri;30000;0;70000;60000;40000;0
401;Furnizori;0;30000;80000;90000;0;40000
411;Clienti;25000;0;238000;228000;35000;0
444;Impozitul pe venit;0;0;0;8000;0;8000
512;Conturi curente la banci;5000;0;228000;160000;73000;0
607;Cheltuieli privind marfurile;0;0;60000;0;60000;0
641;Cheltuieli cu salariile personalului;0;0;40000;0;40000;0
666;Cheltuieli privind dobanzile;0;0;2000;0;2000;0
681;Cheltuieli de exploatare privind amortizarile;0;0;15000;0;15000;0
691;Cheltuieli cu impozitul pe profit;0;0;8000;0;8000;0
707;Venituri din vanzarea marfurilor;0;0;0;200000;0;200000
";

fn csv_file(rows: &[&str]) -> String {
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    content
}

fn import(content: &str, options: &ProcessingOptions) -> ImportOutcome {
    TrialBalanceProcessor::import(content.as_bytes(), "balanta.csv", "text/csv", options)
        .expect("csv input should parse")
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("trial_balance_engine_{}_{}", std::process::id(), name))
}

fn error_kinds(report: &ValidationReport) -> BTreeSet<String> {
    report
        .errors
        .iter()
        .map(|issue| format!("{:?}", issue.kind))
        .collect()
}

#[test]
fn test_full_year_import_and_analysis() {
    let options = ProcessingOptions::default();
    let outcome = import(FULL_YEAR, &options);

    assert_eq!(outcome.metadata.delimiter, Some(';'));
    assert_eq!(outcome.metadata.header_row, 0);
    assert_eq!(outcome.metadata.data_rows, 15);
    assert_eq!(outcome.metadata.mapping_strategy, MappingStrategy::Header);
    assert!(outcome.mapping.is_complete());

    assert_eq!(outcome.normalization.processed_lines, 15);
    assert_eq!(outcome.normalization.successful_lines, 15);
    assert!(outcome.normalization.errors.is_empty());

    assert!(outcome.validation.is_valid);
    assert!(outcome.validation.errors.is_empty());
    assert!(outcome.validation.warnings.is_empty());
    assert_eq!(outcome.validation.statistics.total_checks, 16);
    assert_eq!(outcome.validation.statistics.failed_checks, 0);
    assert_eq!(outcome.validation.statistics.accounts_checked, 15);

    let chart = outcome.chart_of_accounts();
    assert!(chart.missing_classes().is_empty());
    assert_eq!(chart.total_accounts(), 15);

    let analysis =
        TrialBalanceProcessor::analyze(outcome.accounts(), &standard_kpi_definitions(), &options);
    let c = &analysis.components;

    assert_eq!(c.shareholders_equity, 70000.0);
    assert_eq!(c.fixed_assets, 95000.0);
    assert_eq!(c.inventory, 40000.0);
    assert_eq!(c.accounts_receivable, 35000.0);
    assert_eq!(c.cash_and_equivalents, 73000.0);
    assert_eq!(c.current_assets, 148000.0);
    assert_eq!(c.total_assets, 243000.0);
    assert_eq!(c.accounts_payable, 40000.0);
    assert_eq!(c.current_liabilities, 48000.0);
    assert_eq!(c.total_liabilities, 40000.0);

    assert_eq!(c.revenue, 200000.0);
    assert_eq!(c.sales_revenue, 200000.0);
    assert_eq!(c.cogs, 60000.0);
    assert_eq!(c.operating_expenses, 48000.0);
    assert_eq!(c.interest_expense, 2000.0);
    assert_eq!(c.depreciation, 15000.0);
    assert_eq!(c.operating_income, 92000.0);
    assert_eq!(c.net_income, 75000.0);
    assert_eq!(c.total_taxes, 8000.0);

    assert_eq!(c.average_total_assets, 181500.0);
    assert_eq!(c.average_inventory, 35000.0);
    assert_eq!(c.average_accounts_receivable, 30000.0);
    assert_eq!(c.average_accounts_payable, 35000.0);
    assert_eq!(c.average_shareholders_equity, 70000.0);

    let value = |code: &str| analysis.kpi(code).and_then(|k| k.value);
    assert_eq!(value("current_ratio"), Some(3.0833));
    assert_eq!(value("quick_ratio"), Some(2.25));
    assert_eq!(value("gross_margin"), Some(70.0));
    assert_eq!(value("net_margin"), Some(37.5));
    assert_eq!(value("inventory_turnover"), Some(1.7143));
    assert_eq!(value("days_sales_outstanding"), Some(54.75));
    assert_eq!(value("debt_to_equity"), Some(0.5714));
    assert_eq!(value("interest_coverage"), Some(46.0));
    assert!(analysis.kpis.iter().all(|k| k.is_ok()));

    let sheet = &analysis.statements.balance_sheet;
    let income = &analysis.statements.income_statement;
    assert_eq!(sheet.total_assets, 193000.0);
    assert_eq!(sheet.total_liabilities, 48000.0);
    assert_eq!(sheet.total_equity, 70000.0);

    // result accounts are still open, so the sheet is off by exactly the profit
    assert_eq!(sheet.balance_difference, income.net_profit);
    assert!(!sheet.is_balanced);

    assert_eq!(income.total_revenues, 200000.0);
    assert_eq!(income.total_expenses, 125000.0);
    assert_eq!(income.operating_expense, 115000.0);
    assert_eq!(income.operating_profit, 85000.0);
    assert_eq!(income.profit_before_tax, 83000.0);
    assert_eq!(income.tax_expense, 8000.0);
    assert_eq!(income.net_profit, 75000.0);
}

#[test]
fn test_three_line_ledger_is_accepted() {
    let content = csv_file(&[
        "101;Capital social;0;100000;0;0;0;100000",
        "512;Conturi la banci;100000;0;30000;30000;100000;0",
        "401;Furnizori;0;0;30000;30000;0;0",
    ]);
    let outcome = import(&content, &ProcessingOptions::default());

    assert!(outcome.validation.is_valid);
    assert_eq!(outcome.normalization.successful_lines, 3);
    assert!(outcome.normalization.errors.is_empty());
    assert!(outcome.validation.errors.is_empty());
}

#[test]
fn test_duplicate_codes_block_import_but_keep_accounts() {
    let content = csv_file(&[
        "101;Capital social;0;10000;0;0;0;10000",
        "411;Clienti interni;0;0;6000;0;6000;0",
        "411;Clienti externi;0;0;4000;0;4000;0",
        "512;Conturi la banci;10000;0;0;10000;0;0",
    ]);
    let outcome = import(&content, &ProcessingOptions::default());

    assert!(!outcome.validation.is_valid);
    assert_eq!(outcome.accounts().len(), 4);

    let duplicate = outcome
        .validation
        .errors
        .iter()
        .find(|issue| issue.kind == IssueKind::DuplicateAccounts)
        .expect("duplicate code should be reported");
    assert_eq!(duplicate.account_code.as_deref(), Some("411"));
    assert_eq!(duplicate.severity, Severity::Error);
}

#[test]
fn test_all_violations_reported_in_one_pass() {
    let content = csv_file(&[
        "101;Capital social;0;10000;0;0;0;10000",
        "411;Clienti;0;0;6000;0;6000;0",
        "411;Clienti;0;0;4000;0;4000;0",
        "512;Conturi la banci;10000;0;0;0;10000;0",
    ]);
    let outcome = import(&content, &ProcessingOptions::default());

    let kinds = error_kinds(&outcome.validation);
    assert!(kinds.contains("DuplicateAccounts"));
    assert!(kinds.contains("TurnoverImbalance"));
    assert!(kinds.contains("ClosingImbalance"));
    assert!(!kinds.contains("OpeningImbalance"));
    assert_eq!(outcome.validation.statistics.failed_checks, 3);
}

#[test]
fn test_strict_mode_rejects_off_chart_codes() {
    let content = csv_file(&[
        "101;Capital social;0;1000;0;0;0;1000",
        "9401;Cont in afara planului;0;0;0;0;0;0",
        "512.01;Banca BCR lei;1000;0;0;0;1000;0",
    ]);

    let outcome = import(&content, &ProcessingOptions::strict());

    assert_eq!(outcome.normalization.processed_lines, 3);
    assert_eq!(outcome.normalization.successful_lines, 2);
    assert_eq!(outcome.normalization.errors.len(), 1);

    let rejected = &outcome.normalization.errors[0];
    assert_eq!(rejected.kind, IssueKind::InvalidAccountCode);
    assert!(rejected.message.contains("class digit '9'"));
    assert_eq!(rejected.line_number, Some(3));

    // the analytic account has no synthetic 512 in the file
    assert!(outcome.validation.is_valid);
    assert!(outcome
        .validation
        .warnings
        .iter()
        .any(|w| w.kind == IssueKind::MissingSyntheticAccount));
}

#[test]
fn test_lines_missing_identifiers_are_dropped() {
    let content = csv_file(&[
        "101;Capital social;0;500;0;0;0;500",
        ";Fara cont;0;0;0;0;0;0",
        "512;;500;0;0;0;500;0",
        "5311;Casa in lei;0;0;0;0;0;0",
    ]);
    let outcome = import(&content, &ProcessingOptions::default());

    assert_eq!(outcome.normalization.successful_lines, 1);
    let kinds: Vec<IssueKind> = outcome.normalization.errors.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            IssueKind::MissingRequiredField,
            IssueKind::MissingRequiredField,
            IssueKind::InvalidAccountCode,
        ]
    );
}

#[test]
fn test_ignore_warnings_suppresses_advisories() {
    let content = csv_file(&[
        "101;Capital social;0;500;0;0;0;500",
        "512;Banca;500;0;0;0;500;0",
    ]);

    let outcome = import(&content, &ProcessingOptions::default());
    assert!(outcome
        .validation
        .warnings
        .iter()
        .any(|w| w.kind == IssueKind::MissingAccountClass));

    let mut options = ProcessingOptions::default();
    options.validation.ignore_warnings = true;
    let quiet = import(&content, &options);

    assert!(quiet.validation.is_valid);
    assert!(quiet.validation.warnings.is_empty());
    assert_eq!(quiet.validation.statistics.total_checks, 7);
}

#[test]
fn test_normalize_and_validate_are_idempotent() {
    let content = csv_file(&[
        "101;CAPITAL SOCIAL;0;100;0;0;0;100",
        "512;banca   transilvania;100;0;0;0;100;0",
        "ABC;Invalid;0;0;0;0;0;0",
    ]);
    let parsed = parser::parse(content.as_bytes(), "balanta.csv", "text/csv").unwrap();
    let options = ProcessingOptions::default();

    let first = normalize(&parsed.raw_lines, &parsed.mapping, &options.normalize);
    let second = normalize(&parsed.raw_lines, &parsed.mapping, &options.normalize);
    assert_eq!(first.accounts, second.accounts);

    let messages = |o: &NormalizationOutcome| -> Vec<String> {
        o.errors.iter().map(|e| e.message.clone()).collect()
    };
    assert_eq!(messages(&first), messages(&second));

    let report_a = validate(&first.accounts, &options.validation);
    let report_b = validate(&second.accounts, &options.validation);
    assert_eq!(report_a.is_valid, report_b.is_valid);
    assert_eq!(report_a.errors, report_b.errors);
    assert_eq!(report_a.warnings, report_b.warnings);
}

#[test]
fn test_european_number_formats() {
    let content = "Simbol cont;Denumirea contului;Sold initial debitor;Sold initial creditor;Rulaj debitor;Rulaj creditor;Sold final debitor;Sold final creditor\n\
        101;Capital subscris;0;1.250.000,50;0;0;0;1.250.000,50\n\
        512;Banca;1.250.000,50;0;0;0;1.250.000,50;0\n";
    let outcome = import(content, &ProcessingOptions::default());

    assert!(outcome.mapping.is_complete());
    assert!(outcome.validation.is_valid);

    let capital = &outcome.accounts()[0];
    assert_eq!(capital.account_code, "101");
    assert_eq!(capital.opening_credit, 1250000.5);
    assert_eq!(capital.closing_credit, 1250000.5);
}

#[test]
fn test_workbook_import_in_strict_mode() -> anyhow::Result<()> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/balanta.xlsx");
    let bytes = fs::read(&path)?;
    let outcome =
        TrialBalanceProcessor::import(&bytes, "balanta.xlsx", "", &ProcessingOptions::strict())?;

    assert_eq!(outcome.metadata.format, FileFormat::Excel);
    assert_eq!(outcome.metadata.sheet_name.as_deref(), Some("Balanta"));
    assert!(outcome.normalization.errors.is_empty());
    assert!(outcome.validation.is_valid);

    let codes: Vec<&str> = outcome
        .accounts()
        .iter()
        .map(|a| a.account_code.as_str())
        .collect();
    assert_eq!(codes, vec!["101", "512.10", "401.01"]);

    let bank = &outcome.accounts()[1];
    assert_eq!(bank.opening_debit, 100000.0);
    assert_eq!(bank.turnover_credit, 20000.5);
    assert_eq!(bank.closing_debit, 129999.5);

    // analytic accounts without their synthetic parent are only advisory
    assert!(outcome
        .validation
        .warnings
        .iter()
        .any(|w| w.kind == IssueKind::MissingSyntheticAccount));

    Ok(())
}

#[test]
fn test_dot_grouped_whole_amounts() {
    let content = csv_file(&[
        "101;Capital social;0;15.000;0;0;0;15.000",
        "401.01;Furnizori interni;0;0;2.500;2.500;0;0",
        "512;Banca;15.000;0;2.500;2.500;15.000;0",
    ]);
    let outcome = import(&content, &ProcessingOptions::default());

    assert!(outcome.validation.is_valid);
    let capital = &outcome.accounts()[0];
    assert_eq!(capital.opening_credit, 15000.0);
    assert_eq!(capital.closing_credit, 15000.0);

    let supplier = &outcome.accounts()[1];
    assert_eq!(supplier.account_code, "401.01");
    assert_eq!(supplier.turnover_debit, 2500.0);

    let analysis =
        TrialBalanceProcessor::analyze(outcome.accounts(), &[], &ProcessingOptions::default());
    assert_eq!(analysis.components.cash_and_equivalents, 15000.0);
    assert_eq!(analysis.components.shareholders_equity, 15000.0);
}

#[test]
fn test_kpi_definitions_from_storage_rows() -> anyhow::Result<()> {
    let rows = vec![
        KpiDefinitionRow {
            code: "working_capital".to_string(),
            name: Some("Working capital".to_string()),
            category: "liquidity".to_string(),
            unit: "currency".to_string(),
            formula_json: r#"{"formula": "current_assets - current_liabilities"}"#.to_string(),
        },
        KpiDefinitionRow {
            code: "ebit_margin".to_string(),
            name: None,
            category: "profitability".to_string(),
            unit: "percentage".to_string(),
            formula_json: r#"{"formula": "ebit / revenue * 100", "intermediate": {"ebit": "net_income + interest_expense"}}"#
                .to_string(),
        },
        KpiDefinitionRow {
            code: "broken".to_string(),
            name: None,
            category: "misc".to_string(),
            unit: "ratio".to_string(),
            formula_json: r#"{"formula": "revenue / (cogs - cogs)"}"#.to_string(),
        },
    ];
    let definitions = rows
        .into_iter()
        .map(KpiDefinition::try_from)
        .collect::<Result<Vec<_>>>()?;

    let options = ProcessingOptions::default();
    let outcome = import(FULL_YEAR, &options);
    let analysis = analyze_accounts(outcome.accounts(), &definitions, &options);

    assert_eq!(analysis.kpis.len(), 3);
    assert_eq!(analysis.kpi("working_capital").and_then(|k| k.value), Some(100000.0));

    let ebit = analysis.kpi("ebit_margin").unwrap();
    assert_eq!(ebit.value, Some(38.5));
    assert_eq!(ebit.metadata.intermediate_values.get("ebit"), Some(&77000.0));

    let broken = analysis.kpi("broken").unwrap();
    assert_eq!(broken.value, None);
    assert_eq!(broken.error.as_deref(), Some("Division by zero in formula"));

    Ok(())
}

#[test]
fn test_statement_and_chart_exports() -> anyhow::Result<()> {
    let options = ProcessingOptions::default();
    let outcome = import(FULL_YEAR, &options);
    let statements = assemble(outcome.accounts(), &options.assembly);

    let path = temp_path("statements.csv");
    fs::write(&path, statements.to_csv()?)?;
    let written = fs::read_to_string(&path)?;
    fs::remove_file(&path)?;

    // header + one line per non-zero account on either statement
    assert_eq!(written.lines().count(), 16);
    assert!(written.contains("balance_sheet,Assets,Depreciation and impairment,1,281,"));
    assert!(written.contains("income_statement,Expenses,Income tax,1,691,"));

    let markdown = statements.balance_sheet.to_markdown();
    assert!(markdown.starts_with("# Balance Sheet"));
    assert!(markdown.contains("### Share capital"));

    let chart = outcome.chart_of_accounts();
    let chart_csv = chart.to_csv()?;
    assert_eq!(chart_csv.lines().count(), 16);
    assert!(chart.to_json()?.contains("\"code\": \"707\""));

    Ok(())
}

#[test]
fn test_options_loaded_from_file() -> anyhow::Result<()> {
    let path = temp_path("options.json");
    fs::write(
        &path,
        r#"{
            "normalize": { "strict_account_format": true },
            "validation": { "balance_tolerance": 0.01, "strict_account_format": true },
            "assembly": { "balance_tolerance": 0.5 }
        }"#,
    )?;
    let options = ProcessingOptions::from_file(&path)?;
    fs::remove_file(&path)?;

    assert!(options.normalize.strict_account_format);
    assert!(options.normalize.auto_normalize_names);
    assert_eq!(options.validation.balance_tolerance, 0.01);
    assert_eq!(options.assembly.balance_tolerance, 0.5);
    assert_eq!(options.parser, ParserConfig::default());

    let content = csv_file(&[
        "101;Capital social;0;100.5;0;0;0;100.5",
        "512;Banca;100;0;0;0;100;0",
    ]);
    let outcome = import(&content, &options);
    assert!(!outcome.validation.is_valid);
    assert!(error_kinds(&outcome.validation).contains("OpeningImbalance"));

    Ok(())
}

#[test]
fn test_unsupported_and_empty_uploads() {
    let options = ProcessingOptions::default();

    let pdf = TrialBalanceProcessor::import(b"%PDF", "balanta.pdf", "application/pdf", &options);
    assert!(matches!(pdf, Err(TrialBalanceError::UnsupportedFormat { .. })));

    let empty = TrialBalanceProcessor::import(b"", "balanta.csv", "text/csv", &options);
    assert!(matches!(empty, Err(TrialBalanceError::EmptyFile(_))));

    let header_only =
        TrialBalanceProcessor::import(HEADER.as_bytes(), "balanta.csv", "text/csv", &options);
    assert!(matches!(header_only, Err(TrialBalanceError::NoDataRows(_))));
}
