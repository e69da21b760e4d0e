use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use fourdata_db::db::next_draw_date_from;
use fourdata_db::rusqlite::Connection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextDraw {
    Today,
    On(NaiveDate),
    NoneScheduled,
}

impl std::fmt::Display for NextDraw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextDraw::Today => write!(f, "Today"),
            NextDraw::On(date) => write!(f, "{}", date.format("%B %-d, %Y")),
            NextDraw::NoneScheduled => write!(f, "No upcoming draws"),
        }
    }
}

/// Before the cut-off hour today's draw still counts; after it the search starts tomorrow.
pub fn next_draw(conn: &Connection, now: NaiveDateTime, cutoff_hour: u32) -> Result<NextDraw> {
    let today = now.date();
    let open = now.hour() < cutoff_hour;
    let from = if open { today } else { today + Duration::days(1) };

    Ok(match next_draw_date_from(conn, from)? {
        Some(date) if date == today && open => NextDraw::Today,
        Some(date) => NextDraw::On(date),
        None => NextDraw::NoneScheduled,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourdata_db::db::{insert_draw_date, migrate};

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        insert_draw_date(&conn, date("2025-06-01")).unwrap();
        insert_draw_date(&conn, date("2025-06-04")).unwrap();
        conn
    }

    #[test]
    fn test_today_before_cutoff() {
        let conn = setup();
        assert_eq!(next_draw(&conn, at("2025-06-01 20:59"), 21).unwrap(), NextDraw::Today);
    }

    #[test]
    fn test_after_cutoff_moves_to_next_date() {
        let conn = setup();
        assert_eq!(
            next_draw(&conn, at("2025-06-01 21:00"), 21).unwrap(),
            NextDraw::On(date("2025-06-04"))
        );
    }

    #[test]
    fn test_future_and_none() {
        let conn = setup();
        assert_eq!(
            next_draw(&conn, at("2025-06-02 08:00"), 21).unwrap(),
            NextDraw::On(date("2025-06-04"))
        );
        assert_eq!(next_draw(&conn, at("2025-06-05 08:00"), 21).unwrap(), NextDraw::NoneScheduled);
    }

    #[test]
    fn test_display() {
        assert_eq!(NextDraw::On(date("2025-06-04")).to_string(), "June 4, 2025");
        assert_eq!(NextDraw::Today.to_string(), "Today");
    }
}
