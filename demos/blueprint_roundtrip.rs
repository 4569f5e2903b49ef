use ledger_report::blueprint::{BLUEPRINT_FILE_NAME, XLSX_MIME_TYPE};
use ledger_report::*;
use std::error::Error;
use std::path::PathBuf;

fn main() -> std::result::Result<(), Box<dyn Error>> {
    println!("📄 Blueprint Round-Trip Demo\n");

    let bytes = create_blueprint()?;
    let out_dir = PathBuf::from("target").join("ledger_report");
    std::fs::create_dir_all(&out_dir)?;
    let path = out_dir.join(BLUEPRINT_FILE_NAME);
    std::fs::write(&path, &bytes)?;
    println!(
        "✅ Wrote {} ({} bytes, {})",
        path.display(),
        bytes.len(),
        XLSX_MIME_TYPE
    );

    let raw = read_raw_table(&bytes, &IngestConfig::default())?;
    let validated = validate(&raw)?;
    println!("\n🔍 Headers found on sheet '{}':", BLUEPRINT_SHEET);
    for column in CanonicalColumn::ALL {
        if let Some(idx) = validated.index_of(column) {
            println!("   {:<16} → column {} ({})", column.id(), idx + 1, validated.headers[idx]);
        }
    }

    let table = normalize(&raw)?;
    println!("\n📋 Normalized rows:");
    for row in 0..table.row_count() {
        if let Some(cells) = table.row(row) {
            let rendered: Vec<String> = cells
                .iter()
                .map(|(name, value)| match value {
                    CellValue::Number(n) => format!("{}={}", name, n),
                    CellValue::Text(s) => format!("{}={}", name, s),
                    other => format!("{}={:?}", name, other),
                })
                .collect();
            println!("   {}", rendered.join(" | "));
        }
    }

    let derived = derive(&table);
    println!("\n💰 Cumulative contribution: {:?}", derived.cumulative_contribution);
    println!("📉 Monthly change: {:?}", derived.monthly_change);

    Ok(())
}
