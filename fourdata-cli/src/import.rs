use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use fourdata_db::rusqlite::Connection;
use std::path::Path;

use fourdata_db::db::{insert_draw_date, insert_result, upsert_probability};
use fourdata_db::models::{
    validate_number, validate_probability, NumberProbability, PrizeTier, ProbabilitySource,
    ResultEntry,
};

/// Accepts `1234,5` as well as `1234.5`; empty means absent.
pub fn parse_decimal(s: &str) -> Result<Option<f64>> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let normalized = s.replace(',', ".");
    normalized
        .parse::<f64>()
        .map(Some)
        .with_context(|| format!("Cannot parse number '{}'", s))
}

/// `YYYY-MM-DD` or `DD/MM/YYYY`.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .with_context(|| format!("Invalid date '{}'", raw))
}

fn field(record: &csv::StringRecord, idx: usize) -> Result<String> {
    record
        .get(idx)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("Missing field at index {}", idx))
}

fn parse_result_record(record: &csv::StringRecord) -> Result<ResultEntry> {
    let draw_date = parse_date(&field(record, 0)?)?;
    let number = field(record, 1)?;
    validate_number(&number)?;

    let raw_tier = field(record, 2)?;
    let code: u8 = raw_tier
        .parse()
        .with_context(|| format!("Cannot parse prize type '{}'", raw_tier))?;
    let Some(tier) = PrizeTier::from_code(code) else {
        bail!("Unknown prize type {}", code);
    };

    let total_points = parse_decimal(&field(record, 3).unwrap_or_default())?;

    Ok(ResultEntry {
        draw_date: draw_date.format("%Y-%m-%d").to_string(),
        number,
        tier,
        total_points,
    })
}

fn parse_probability_record(record: &csv::StringRecord) -> Result<NumberProbability> {
    let number = field(record, 0)?;
    validate_number(&number)?;
    let Some(prob) = parse_decimal(&field(record, 1)?)? else {
        bail!("Missing probability for {}", number);
    };
    validate_probability(prob)?;
    Ok(NumberProbability {
        number,
        prob,
        description: field(record, 2).unwrap_or_default(),
    })
}

#[derive(Debug, Default)]
pub struct ImportResult {
    pub total_records: u32,
    pub inserted: u32,
    pub skipped: u32,
    pub errors: u32,
}

/// Reads a `;`-separated file with a header row, one transaction per file.
/// `apply` returns whether the row was new.
fn import_rows(
    conn: &Connection,
    path: &Path,
    mut apply: impl FnMut(&Connection, &csv::StringRecord) -> Result<bool>,
) -> Result<ImportResult> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Cannot open {:?}", path))?;

    let tx = conn
        .unchecked_transaction()
        .context("Cannot start transaction")?;

    let mut result = ImportResult::default();

    for record_result in reader.records() {
        result.total_records += 1;
        let outcome = record_result
            .context("Unreadable line")
            .and_then(|record| apply(&*tx, &record));
        match outcome {
            Ok(true) => result.inserted += 1,
            Ok(false) => result.skipped += 1,
            Err(e) => {
                tracing::warn!(line = result.total_records, error = %format!("{:#}", e), "row rejected");
                result.errors += 1;
            }
        }
    }

    tx.commit().context("Commit failed")?;
    tracing::info!(
        path = %path.display(),
        inserted = result.inserted,
        skipped = result.skipped,
        errors = result.errors,
        "import finished"
    );
    Ok(result)
}

pub fn import_results(conn: &Connection, path: &Path) -> Result<ImportResult> {
    import_rows(conn, path, |tx, record| {
        let entry = parse_result_record(record)?;
        insert_result(tx, &entry)
    })
}

/// Probabilities are replaced, so every valid row counts as inserted.
pub fn import_probabilities(
    conn: &Connection,
    path: &Path,
    source: ProbabilitySource,
) -> Result<ImportResult> {
    import_rows(conn, path, |tx, record| {
        let prob = parse_probability_record(record)?;
        upsert_probability(tx, source, &prob)?;
        Ok(true)
    })
}

pub fn import_draw_dates(conn: &Connection, path: &Path) -> Result<ImportResult> {
    import_rows(conn, path, |tx, record| {
        let date = parse_date(&field(record, 0)?)?;
        insert_draw_date(tx, date)
    })
}
