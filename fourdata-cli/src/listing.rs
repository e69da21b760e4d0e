use anyhow::Result;
use fourdata_db::db::{fetch_probabilities_between, fetch_probability_page};
use fourdata_db::models::{Band, Page, ProbabilityFilter, ProbabilitySource};
use fourdata_db::rusqlite::Connection;
use rand::seq::SliceRandom;
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct NumberChip {
    /// 1-based position across the whole listing.
    pub id: u32,
    pub number: String,
    pub prob: f64,
    pub band: Band,
}

/// Probability window, how many numbers the home screen samples from it, and its colour.
struct PreviewBand {
    lo: f64,
    hi: f64,
    take: usize,
    band: Band,
}

const HOME_BANDS: [PreviewBand; 3] = [
    PreviewBand { lo: 85.0, hi: 100.0, take: 20, band: Band::Green },
    PreviewBand { lo: 75.0, hi: 85.0, take: 12, band: Band::LightGreen },
    PreviewBand { lo: 60.0, hi: 75.0, take: 3, band: Band::Yellow },
];

/// Random sample of strong numbers for the home screen, best band first.
pub fn home_preview(
    conn: &Connection,
    source: ProbabilitySource,
    limit: usize,
    rng: &mut impl Rng,
) -> Result<Vec<NumberChip>> {
    let mut chips = Vec::new();
    for preview in &HOME_BANDS {
        let mut candidates = fetch_probabilities_between(conn, source, preview.lo, preview.hi)?;
        candidates.shuffle(rng);
        candidates.truncate(preview.take);
        chips.extend(candidates.into_iter().map(|p| NumberChip {
            id: 0,
            number: p.number,
            prob: p.prob,
            band: preview.band,
        }));
    }
    chips.truncate(limit);
    for (i, chip) in chips.iter_mut().enumerate() {
        chip.id = i as u32 + 1;
    }
    Ok(chips)
}

pub fn view_all(
    conn: &Connection,
    source: ProbabilitySource,
    filter: ProbabilityFilter,
    page: u32,
    per_page: u32,
) -> Result<Page<NumberChip>> {
    let raw = fetch_probability_page(conn, source, filter, page, per_page)?;
    let offset = raw.offset();
    let items = raw
        .items
        .into_iter()
        .enumerate()
        .map(|(i, p)| NumberChip {
            id: offset.saturating_add(i as u32 + 1),
            band: Band::for_listing(p.prob),
            number: p.number,
            prob: p.prob,
        })
        .collect();
    Ok(Page {
        items,
        page: raw.page,
        per_page: raw.per_page,
        total_items: raw.total_items,
    })
}
