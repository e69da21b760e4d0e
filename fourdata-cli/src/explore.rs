use anyhow::{Context, Result};
use fourdata_db::db::{fetch_number_history, fetch_probability};
use fourdata_db::models::{validate_number, ProbabilitySource, ResultEntry};
use fourdata_db::rusqlite::Connection;
use fourdata_db::store::SecureStore;

pub const RECENT_SEARCHES_KEY: &str = "recent_searches";
pub const MAX_RECENT: usize = 4;

/// Last few numbers looked up in the explorer, most recent first.
pub struct RecentSearches<S> {
    store: S,
}

impl<S: SecureStore> RecentSearches<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn load(&self) -> Vec<String> {
        match self.store.get(RECENT_SEARCHES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "discarding corrupt recent searches");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot load recent searches");
                Vec::new()
            }
        }
    }

    pub fn record(&self, number: &str) -> Result<Vec<String>> {
        validate_number(number)?;
        let mut recent = self.load();
        recent.retain(|n| n != number);
        recent.insert(0, number.to_string());
        recent.truncate(MAX_RECENT);
        self.save(&recent)?;
        Ok(recent)
    }

    /// Out-of-range indexes leave the list unchanged.
    pub fn remove(&self, index: usize) -> Result<Vec<String>> {
        let mut recent = self.load();
        if index < recent.len() {
            recent.remove(index);
            self.save(&recent)?;
        }
        Ok(recent)
    }

    pub fn clear(&self) -> Result<()> {
        self.store
            .delete(RECENT_SEARCHES_KEY)
            .context("Cannot clear recent searches")?;
        Ok(())
    }

    fn save(&self, recent: &[String]) -> Result<()> {
        let json = serde_json::to_string(recent)?;
        self.store
            .set(RECENT_SEARCHES_KEY, &json)
            .context("Cannot save recent searches")?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NumberDetails {
    pub number: String,
    pub prob: Option<f64>,
    pub description: String,
    pub history: Vec<ResultEntry>,
}

pub fn number_details(conn: &Connection, source: ProbabilitySource, number: &str) -> Result<NumberDetails> {
    validate_number(number)?;
    let prob = fetch_probability(conn, source, number)?;
    let history = fetch_number_history(conn, number)?;
    Ok(NumberDetails {
        number: number.to_string(),
        prob: prob.as_ref().map(|p| p.prob),
        description: prob.map(|p| p.description).unwrap_or_default(),
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourdata_db::db::{insert_result, migrate, upsert_probability};
    use fourdata_db::models::{NumberProbability, PrizeTier};
    use fourdata_db::store::MemoryStore;

    #[test]
    fn test_record_moves_to_front_and_caps() {
        let store = MemoryStore::new();
        let recent = RecentSearches::new(&store);
        for n in ["1111", "2222", "3333", "4444", "5555"] {
            recent.record(n).unwrap();
        }
        assert_eq!(recent.load(), vec!["5555", "4444", "3333", "2222"]);

        recent.record("3333").unwrap();
        assert_eq!(recent.load(), vec!["3333", "5555", "4444", "2222"]);
    }

    #[test]
    fn test_record_rejects_invalid_numbers() {
        let store = MemoryStore::new();
        let recent = RecentSearches::new(&store);
        assert!(recent.record("123").is_err());
        assert!(recent.load().is_empty());
    }

    #[test]
    fn test_remove_and_clear() {
        let store = MemoryStore::new();
        let recent = RecentSearches::new(&store);
        recent.record("1111").unwrap();
        recent.record("2222").unwrap();
        assert_eq!(recent.remove(0).unwrap(), vec!["1111"]);
        assert_eq!(recent.remove(5).unwrap(), vec!["1111"]);
        recent.clear().unwrap();
        assert!(recent.load().is_empty());
    }

    #[test]
    fn test_corrupt_list_reads_empty() {
        let store = MemoryStore::new();
        store.set(RECENT_SEARCHES_KEY, "not json").unwrap();
        assert!(RecentSearches::new(&store).load().is_empty());
    }

    #[test]
    fn test_number_details() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        upsert_probability(
            &conn,
            ProbabilitySource::Default,
            &NumberProbability {
                number: "0042".to_string(),
                prob: 88.5,
                description: "frequent in specials".to_string(),
            },
        )
        .unwrap();
        insert_result(
            &conn,
            &ResultEntry {
                draw_date: "2025-06-01".to_string(),
                number: "0042".to_string(),
                tier: PrizeTier::Special,
                total_points: None,
            },
        )
        .unwrap();

        let details = number_details(&conn, ProbabilitySource::Default, "0042").unwrap();
        assert_eq!(details.prob, Some(88.5));
        assert_eq!(details.description, "frequent in specials");
        assert_eq!(details.history.len(), 1);

        let unknown = number_details(&conn, ProbabilitySource::Magnum, "0042").unwrap();
        assert_eq!(unknown.prob, None);
        assert!(number_details(&conn, ProbabilitySource::Default, "42").is_err());
    }
}
