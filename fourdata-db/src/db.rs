use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::models::{
    DrawDetails, DrawSummary, NumberProbability, Page, PrizeTier, ProbabilityFilter,
    ProbabilitySource, Profile, ResultEntry,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS results (
    draw_date     TEXT NOT NULL,
    number        TEXT NOT NULL,
    prize_type    INTEGER NOT NULL,
    total_points  REAL,
    PRIMARY KEY (draw_date, prize_type, number)
);

CREATE INDEX IF NOT EXISTS idx_results_number ON results (number);

CREATE TABLE IF NOT EXISTS next_draw_prob (
    source        TEXT NOT NULL,
    number        TEXT NOT NULL,
    prob          REAL NOT NULL,
    description   TEXT NOT NULL DEFAULT '',
    PRIMARY KEY (source, number)
);

CREATE TABLE IF NOT EXISTS lottery_dates (
    date          TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS profiles (
    id            TEXT PRIMARY KEY,
    username      TEXT NOT NULL,
    email         TEXT NOT NULL DEFAULT '',
    full_name     TEXT NOT NULL DEFAULT '',
    avatar_url    TEXT NOT NULL DEFAULT '',
    updated_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS secure_store (
    key           TEXT PRIMARY KEY,
    value         TEXT NOT NULL
);
";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("fourdata.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Cannot open database {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA).context("Migration failed")?;
    tracing::debug!("schema migrated");
    Ok(())
}

fn tier_from_row(code: u8) -> rusqlite::Result<PrizeTier> {
    PrizeTier::from_code(code).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Integer,
            format!("unknown prize type {}", code).into(),
        )
    })
}

fn result_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResultEntry> {
    Ok(ResultEntry {
        draw_date: row.get(0)?,
        number: row.get(1)?,
        tier: tier_from_row(row.get(2)?)?,
        total_points: row.get(3)?,
    })
}

pub fn insert_result(conn: &Connection, entry: &ResultEntry) -> Result<bool> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO results (draw_date, number, prize_type, total_points)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                entry.draw_date,
                entry.number,
                entry.tier.code(),
                entry.total_points,
            ],
        )
        .context("Result insert failed")?;
    Ok(changed > 0)
}

pub fn count_results(conn: &Connection) -> Result<u32> {
    let count: u32 = conn.query_row("SELECT COUNT(*) FROM results", [], |row| row.get(0))?;
    Ok(count)
}

/// Most recent draws, top three tiers only, newest first.
pub fn fetch_recent_summaries(conn: &Connection, draws: u32) -> Result<Vec<DrawSummary>> {
    let mut stmt = conn.prepare(
        "SELECT draw_date, number, prize_type, total_points
         FROM results WHERE prize_type IN (1, 2, 3)
         ORDER BY draw_date DESC, prize_type ASC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([draws.saturating_mul(3)], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut summaries: Vec<DrawSummary> = Vec::new();
    for entry in rows {
        match summaries.last_mut() {
            Some(last) if last.draw_date == entry.draw_date => last.entries.push(entry),
            _ => summaries.push(DrawSummary {
                draw_date: entry.draw_date.clone(),
                entries: vec![entry],
            }),
        }
    }
    for summary in &mut summaries {
        summary.entries.sort_by_key(|e| e.tier);
    }
    Ok(summaries)
}

pub fn fetch_draw_details(conn: &Connection, date: &str) -> Result<Option<DrawDetails>> {
    let mut stmt = conn.prepare(
        "SELECT draw_date, number, prize_type, total_points
         FROM results WHERE draw_date = ?1
         ORDER BY prize_type ASC, number ASC",
    )?;
    let rows = stmt
        .query_map([date], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Ok(None);
    }

    let mut details = DrawDetails {
        draw_date: date.to_string(),
        winners: Vec::new(),
        special: Vec::new(),
        consolation: Vec::new(),
    };
    for entry in rows {
        match entry.tier {
            PrizeTier::Special => details.special.push(entry),
            PrizeTier::Consolation => details.consolation.push(entry),
            _ => details.winners.push(entry),
        }
    }
    Ok(Some(details))
}

pub fn fetch_number_history(conn: &Connection, number: &str) -> Result<Vec<ResultEntry>> {
    let mut stmt = conn.prepare(
        "SELECT draw_date, number, prize_type, total_points
         FROM results WHERE number = ?1
         ORDER BY draw_date DESC, prize_type ASC",
    )?;
    let rows = stmt
        .query_map([number], result_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn upsert_probability(
    conn: &Connection,
    source: ProbabilitySource,
    prob: &NumberProbability,
) -> Result<()> {
    conn.execute(
        "INSERT INTO next_draw_prob (source, number, prob, description)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (source, number) DO UPDATE SET prob = excluded.prob, description = excluded.description",
        rusqlite::params![source.as_str(), prob.number, prob.prob, prob.description],
    )
    .context("Probability upsert failed")?;
    Ok(())
}

pub fn fetch_probability(
    conn: &Connection,
    source: ProbabilitySource,
    number: &str,
) -> Result<Option<NumberProbability>> {
    let prob = conn
        .query_row(
            "SELECT number, prob, description FROM next_draw_prob WHERE source = ?1 AND number = ?2",
            [source.as_str(), number],
            |row| {
                Ok(NumberProbability {
                    number: row.get(0)?,
                    prob: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(prob)
}

/// Probabilities with `lo <= prob < hi`, unordered.
pub fn fetch_probabilities_between(
    conn: &Connection,
    source: ProbabilitySource,
    lo: f64,
    hi: f64,
) -> Result<Vec<NumberProbability>> {
    let mut stmt = conn.prepare(
        "SELECT number, prob, description FROM next_draw_prob
         WHERE source = ?1 AND prob >= ?2 AND prob < ?3",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![source.as_str(), lo, hi], |row| {
            Ok(NumberProbability {
                number: row.get(0)?,
                prob: row.get(1)?,
                description: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_probability_page(
    conn: &Connection,
    source: ProbabilitySource,
    filter: ProbabilityFilter,
    page: u32,
    per_page: u32,
) -> Result<Page<NumberProbability>> {
    let page = page.max(1);
    let (lo, hi) = filter.bounds();
    let hi = hi.unwrap_or(f64::MAX);

    let total_items: u32 = conn.query_row(
        "SELECT COUNT(*) FROM next_draw_prob WHERE source = ?1 AND prob >= ?2 AND prob < ?3",
        rusqlite::params![source.as_str(), lo, hi],
        |row| row.get(0),
    )?;

    let offset = (page - 1).saturating_mul(per_page);
    let mut stmt = conn.prepare(
        "SELECT number, prob, description FROM next_draw_prob
         WHERE source = ?1 AND prob >= ?2 AND prob < ?3
         ORDER BY prob DESC, number ASC LIMIT ?4 OFFSET ?5",
    )?;
    let items = stmt
        .query_map(
            rusqlite::params![source.as_str(), lo, hi, per_page, offset],
            |row| {
                Ok(NumberProbability {
                    number: row.get(0)?,
                    prob: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Page {
        items,
        page,
        per_page,
        total_items,
    })
}

pub fn insert_draw_date(conn: &Connection, date: NaiveDate) -> Result<bool> {
    let changed = conn
        .execute(
            "INSERT OR IGNORE INTO lottery_dates (date) VALUES (?1)",
            [date.format("%Y-%m-%d").to_string()],
        )
        .context("Draw date insert failed")?;
    Ok(changed > 0)
}

/// Earliest scheduled draw on or after `from`.
pub fn next_draw_date_from(conn: &Connection, from: NaiveDate) -> Result<Option<NaiveDate>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT date FROM lottery_dates WHERE date >= ?1 ORDER BY date ASC LIMIT 1",
            [from.format("%Y-%m-%d").to_string()],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|s| {
        NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("Invalid draw date in database: '{}'", s))
    })
    .transpose()
}

pub fn get_profile(conn: &Connection, id: &str) -> Result<Option<Profile>> {
    let profile = conn
        .query_row(
            "SELECT id, username, email, full_name, avatar_url, updated_at FROM profiles WHERE id = ?1",
            [id],
            |row| {
                Ok(Profile {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                    full_name: row.get(3)?,
                    avatar_url: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(profile)
}

pub fn upsert_profile(conn: &Connection, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT INTO profiles (id, username, email, full_name, avatar_url, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT (id) DO UPDATE SET
             username = excluded.username,
             email = excluded.email,
             full_name = excluded.full_name,
             avatar_url = excluded.avatar_url,
             updated_at = excluded.updated_at",
        rusqlite::params![
            profile.id,
            profile.username,
            profile.email,
            profile.full_name,
            profile.avatar_url,
            profile.updated_at,
        ],
    )
    .context("Profile upsert failed")?;
    Ok(())
}
