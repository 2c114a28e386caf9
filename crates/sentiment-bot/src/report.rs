use anyhow::{Context, Result};
use decision_engine::FlagCandidate;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct FlagRow<'a> {
    symbol: &'a str,
    ticker_id: i64,
    flag_type: &'a str,
    entry_price: Option<f64>,
    confidence_score: f64,
    status: &'a str,
    rationale: &'a str,
}

/// Write one CSV row per flag candidate, header first.
pub fn write_flags<W: Write>(writer: W, flags: &[FlagCandidate]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    if flags.is_empty() {
        // serialize() only emits the header alongside the first row
        csv.write_record([
            "symbol",
            "ticker_id",
            "flag_type",
            "entry_price",
            "confidence_score",
            "status",
            "rationale",
        ])?;
    }

    for candidate in flags {
        let flag = &candidate.flag;
        csv.serialize(FlagRow {
            symbol: &candidate.symbol,
            ticker_id: flag.ticker_id,
            flag_type: flag.flag_type.as_str(),
            entry_price: flag.entry_price,
            confidence_score: flag.confidence_score,
            status: flag.status.as_str(),
            rationale: &flag.rationale,
        })?;
    }

    csv.flush()?;
    Ok(())
}

pub fn write_flags_to_path(path: &Path, flags: &[FlagCandidate]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create report {}", path.display()))?;
    write_flags(file, flags)?;
    tracing::info!("Wrote {} flags to {}", flags.len(), path.display());
    Ok(())
}
