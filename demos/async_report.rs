use ledger_report::*;
use std::error::Error;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("⚡ Async Report Demo\n");

    let bytes = create_blueprint()?;
    let table = LedgerProcessor::load(&bytes, &IngestConfig::default())?;
    let selection = vec!["aporte".to_string(), "saldo final".to_string()];

    let config = ReportConfig::from_json_str(
        r#"{
            "title": "Relatório Assíncrono",
            "format": "markdown",
            "chart": { "width": 800, "height": 400 }
        }"#,
    )?;

    println!("⏳ Building report on the blocking pool...");
    let report =
        LedgerProcessor::generate_report_async(table, selection, SvgLineChart, config).await?;

    let markdown = String::from_utf8(report)?;
    for line in markdown.lines().filter(|l| !l.contains("data:image")) {
        println!("{}", line);
    }

    Ok(())
}
