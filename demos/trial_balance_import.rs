use trial_balance_engine::{
    standard_kpi_definitions, ProcessingOptions, Severity, TrialBalanceProcessor,
};

const SAMPLE: &str = "\
Cont;Denumire;SD init;SC init;RD;RC;SD final;SC final
101;Capital subscris varsat;0;50000;0;0;0;50000
213;Echipamente tehnologice;40000;0;10000;0;50000;0
371;Marfuri;15000;0;45000;40000;20000;0
401;Furnizori;0;10000;45000;50000;0;15000
411;Clienti;5000;0;95000;90000;10000;0
512;Conturi curente la banci;0;0;90000;55000;35000;0
607;Cheltuieli privind marfurile;0;0;40000;0;40000;0
641;Cheltuieli cu salariile personalului;0;0;10000;0;10000;0
707;Venituri din vanzarea marfurilor;0;0;0;100000;0;100000
";

fn main() {
    // cargo run --example trial_balance_import -- path/to/balanta.xlsx
    let (bytes, file_name) = match std::env::args().nth(1) {
        Some(path) => (
            std::fs::read(&path).expect("trial balance file should be readable"),
            path,
        ),
        None => (SAMPLE.as_bytes().to_vec(), "balanta_demo.csv".to_string()),
    };

    let options = ProcessingOptions::default();
    let import = TrialBalanceProcessor::import(&bytes, &file_name, "", &options)
        .expect("trial balance should parse");

    println!(
        "Parsed {} rows from {} (header row {}, {:?} mapping)",
        import.metadata.data_rows,
        import.metadata.file_name,
        import.metadata.header_row,
        import.metadata.mapping_strategy
    );
    println!(
        "Normalized {}/{} lines",
        import.normalization.successful_lines, import.normalization.processed_lines
    );

    for issue in import
        .normalization
        .errors
        .iter()
        .chain(&import.validation.errors)
        .chain(&import.validation.warnings)
    {
        let marker = match issue.severity {
            Severity::Error => "ERROR",
            Severity::Warning => "warn ",
        };
        println!(" {} {}", marker, issue.message);
    }

    if !import.is_acceptable() {
        println!("Trial balance rejected by validation");
        return;
    }

    let analysis =
        TrialBalanceProcessor::analyze(import.accounts(), &standard_kpi_definitions(), &options);

    println!("\nKPIs:");
    for kpi in &analysis.kpis {
        match (kpi.value, &kpi.error) {
            (Some(value), _) => println!(" - {:<28} {:>12.4} ({:?})", kpi.kpi_code, value, kpi.unit),
            (None, Some(error)) => println!(" - {:<28} {:>12} {}", kpi.kpi_code, "n/a", error),
            (None, None) => println!(" - {:<28} {:>12}", kpi.kpi_code, "n/a"),
        }
    }

    println!();
    println!("{}", analysis.statements.balance_sheet.to_markdown());
    println!("{}", analysis.statements.income_statement.to_markdown());
}
