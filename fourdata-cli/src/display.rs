use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::auth::AuthState;
use crate::explore::NumberDetails;
use crate::import::ImportResult;
use crate::listing::NumberChip;
use crate::lucky::{DailyValue, ValueOrigin};
use crate::schedule::NextDraw;
use fourdata_db::models::{Band, DrawDetails, DrawSummary, Page, Profile, ResultEntry};

fn band_color(band: Band) -> Color {
    match band {
        Band::Green => Color::Green,
        Band::LightGreen => Color::DarkGreen,
        Band::Yellow => Color::Yellow,
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn points_cell(entry: &ResultEntry) -> Cell {
    match (entry.total_points, entry.band()) {
        (Some(points), Some(band)) => Cell::new(format!("{:.0}", points)).fg(band_color(band)),
        _ => Cell::new("—"),
    }
}

pub fn display_lucky(value: &DailyValue) {
    let note = match value.origin {
        ValueOrigin::Cached | ValueOrigin::Generated => "",
        ValueOrigin::Ephemeral => " (sign in to keep it for the day)",
    };
    println!("Today's lucky number: {:04}{}", value.value, note);
}

pub fn display_next_draw(next: NextDraw) {
    println!("Next draw: {}", next);
}

pub fn display_chips(chips: &[NumberChip]) {
    if chips.is_empty() {
        println!("No numbers to show. Import probabilities first: fourdata import-probs");
        return;
    }

    let mut table = new_table(vec!["#", "Number", "Probability", "Band"]);
    for chip in chips {
        let color = band_color(chip.band);
        table.add_row(vec![
            Cell::new(chip.id),
            Cell::new(&chip.number).fg(color),
            Cell::new(format!("{:.1}%", chip.prob)),
            Cell::new(chip.band.to_string()).fg(color),
        ]);
    }
    println!("{table}");
}

pub fn display_page(page: &Page<NumberChip>, filter_label: &str) {
    display_chips(&page.items);
    println!(
        "Filter {} · page {}/{} · {} numbers",
        filter_label,
        page.page,
        page.total_pages().max(1),
        page.total_items
    );
    if page.has_next() {
        println!("Next: --page {}", page.page + 1);
    }
}

pub fn display_summaries(summaries: &[DrawSummary]) {
    if summaries.is_empty() {
        println!("No results to show.");
        return;
    }

    let mut table = new_table(vec!["Date", "Prize", "Number", "Points"]);
    for summary in summaries {
        for entry in &summary.entries {
            table.add_row(vec![
                Cell::new(&summary.draw_date),
                Cell::new(entry.tier.to_string()),
                Cell::new(&entry.number),
                points_cell(entry),
            ]);
        }
    }
    println!("{table}");
}

fn number_list(entries: &[ResultEntry]) -> String {
    if entries.is_empty() {
        return "—".to_string();
    }
    entries
        .iter()
        .map(|e| e.number.as_str())
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn display_draw_details(details: &DrawDetails) {
    println!("\nDraw of {}\n", details.draw_date);

    let mut table = new_table(vec!["Prize", "Number", "Points"]);
    for entry in &details.winners {
        table.add_row(vec![
            Cell::new(entry.tier.to_string()),
            Cell::new(&entry.number),
            points_cell(entry),
        ]);
    }
    println!("{table}");

    println!("\n── Special ──\n{}", number_list(&details.special));
    println!("\n── Consolation ──\n{}", number_list(&details.consolation));
}

pub fn display_number_details(details: &NumberDetails) {
    match details.prob {
        Some(prob) => {
            let color = band_color(Band::for_listing(prob));
            let mut table = new_table(vec!["Number", "Probability", "Notes"]);
            table.add_row(vec![
                Cell::new(&details.number).fg(color),
                Cell::new(format!("{:.1}%", prob)).fg(color),
                Cell::new(&details.description),
            ]);
            println!("{table}");
        }
        None => println!("{}: no probability on record.", details.number),
    }

    if details.history.is_empty() {
        println!("Never drawn.");
        return;
    }

    println!("\n── History ──");
    let mut table = new_table(vec!["Date", "Prize", "Points"]);
    for entry in &details.history {
        table.add_row(vec![
            Cell::new(&entry.draw_date),
            Cell::new(entry.tier.to_string()),
            points_cell(entry),
        ]);
    }
    println!("{table}");
}

pub fn display_recent_searches(recent: &[String]) {
    if recent.is_empty() {
        println!("No recent searches.");
        return;
    }
    for (i, number) in recent.iter().enumerate() {
        println!("  [{}] {}", i, number);
    }
}

pub fn display_status(state: &AuthState, profile: Option<&Profile>, premium: bool) {
    match state.session() {
        Some(session) => {
            let mut table = new_table(vec!["User", "Username", "Email", "Plan"]);
            table.add_row(vec![
                Cell::new(&session.user_id),
                Cell::new(profile.map(|p| p.username.as_str()).unwrap_or("—")),
                Cell::new(session.email.as_deref().unwrap_or("—")),
                if premium {
                    Cell::new("premium").fg(Color::Green)
                } else {
                    Cell::new("free")
                },
            ]);
            println!("{table}");
        }
        None => match state {
            AuthState::Failed { error } => println!("Not signed in (last attempt failed: {})", error),
            other => println!("Not signed in ({})", other.name()),
        },
    }
}

pub fn display_import_summary(result: &ImportResult) {
    println!("Import finished:");
    println!("  Rows read      : {}", result.total_records);
    println!("  Inserted       : {}", result.inserted);
    println!("  Duplicates     : {}", result.skipped);
    if result.errors > 0 {
        println!("  Errors         : {}", result.errors);
    }
}
