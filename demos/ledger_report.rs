use ledger_report::*;
use std::error::Error;
use std::path::PathBuf;

fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("📊 Ledger Report Demo\n");

    let mut args = std::env::args().skip(1);
    let (bytes, source) = match args.next() {
        Some(path) => (std::fs::read(&path)?, path),
        None => (create_blueprint()?, "built-in blueprint".to_string()),
    };
    let selection: Vec<String> = args.collect();

    println!("📥 Loading ledger from {}", source);
    let table = match LedgerProcessor::load(&bytes, &IngestConfig::default()) {
        Ok(table) => table,
        Err(e) => {
            println!("❌ {}", e.user_message());
            return Ok(());
        }
    };

    println!("   Rows: {}", table.row_count());
    println!("   Numeric columns: {}\n", table.numeric_columns().join(", "));

    let selection: Vec<String> = if selection.is_empty() {
        table
            .numeric_columns()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        selection
    };

    let analysis = LedgerProcessor::analyze(&table, &selection)?;
    if let Some(statistics) = &analysis.statistics {
        println!("═══════════════════════════════════════════════════════════════");
        println!("📈 Estatísticas Descritivas");
        println!("═══════════════════════════════════════════════════════════════");
        println!(
            "{:<20} {:>14} {:>14} {:>14} {:>14}",
            "Coluna", "Média", "Mediana", "Moda", "Desvio Padrão"
        );
        for summary in &statistics.columns {
            let stats = &summary.statistics;
            println!(
                "{:<20} {:>14} {:>14} {:>14} {:>14}",
                summary.column,
                utils::format_decimal(stats.mean, 4),
                utils::format_decimal(stats.median, 4),
                stats
                    .mode
                    .map(|m| utils::format_decimal(m, 4))
                    .unwrap_or_else(|| "Nenhuma".to_string()),
                utils::format_decimal(stats.std_dev, 4),
            );
        }
        println!();
    }

    for series in analysis.derived.chart_series() {
        println!("🔹 {}", series.title);
        for (label, value) in series.labels.iter().zip(&series.values) {
            println!("   {:<16} {:>14.2}", label, value);
        }
    }
    println!();

    let out_dir = PathBuf::from("target").join("ledger_report");
    std::fs::create_dir_all(&out_dir)?;

    for format in [OutputFormat::Html, OutputFormat::Markdown, OutputFormat::Json] {
        let config = ReportConfig {
            format,
            ..Default::default()
        };
        match LedgerProcessor::generate_report(&table, &selection, &SvgLineChart, &config) {
            Ok(bytes) => {
                let path = out_dir.join(format!("relatorio_analise.{}", format.file_extension()));
                std::fs::write(&path, &bytes)?;
                println!("✅ Wrote {} ({} bytes)", path.display(), bytes.len());
            }
            Err(e) => println!("❌ {}", e.user_message()),
        }
    }

    Ok(())
}
