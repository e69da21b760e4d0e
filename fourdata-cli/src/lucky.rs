//! Daily lucky number.
//!
//! One value in `[1000, 9999]` per user per local calendar day, cached in the
//! secure store under `lucky_number_{user}_{YYYY-MM-DD}`. Storage problems never
//! surface to the caller: the worst case is a value regenerated more than once
//! a day, or a stale key left behind.

use chrono::{Local, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use fourdata_db::store::SecureStore;

use crate::identity::IdentityProvider;

pub const LUCKY_MIN: u16 = 1000;
pub const LUCKY_MAX: u16 = 9999;

/// Legacy owner key meaning "not signed in yet". Treated like no identity.
pub const FALLBACK_OWNER: &str = "default";

pub fn storage_key(owner: &str, day: NaiveDate) -> String {
    format!("lucky_number_{}_{}", owner, day.format("%Y-%m-%d"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    /// Read back from today's key.
    Cached,
    /// Freshly generated for today; persisted unless the write failed.
    Generated,
    /// No identity: generated and never stored.
    Ephemeral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailyValue {
    pub owner: Option<String>,
    pub day: NaiveDate,
    pub value: u16,
    pub origin: ValueOrigin,
}

pub struct DailyValueGenerator<S, R = StdRng> {
    store: S,
    rng: R,
}

impl<S: SecureStore> DailyValueGenerator<S, StdRng> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }
}

impl<S: SecureStore, R: Rng> DailyValueGenerator<S, R> {
    pub fn with_rng(store: S, rng: R) -> Self {
        Self { store, rng }
    }

    pub fn get_or_create_daily_value(&mut self, owner: Option<&str>, day: NaiveDate) -> u16 {
        self.resolve(owner, day).value
    }

    /// Today's value for whoever the identity provider reports.
    pub fn resolve_today(&mut self, identity: &impl IdentityProvider) -> DailyValue {
        let owner = identity.current_user_id();
        let today = Local::now().date_naive();
        self.resolve(owner.as_deref(), today)
    }

    pub fn resolve(&mut self, owner: Option<&str>, day: NaiveDate) -> DailyValue {
        let owner = match owner {
            Some(o) if !o.is_empty() && o != FALLBACK_OWNER => o,
            _ => return self.ephemeral(day),
        };

        let key = storage_key(owner, day);
        if let Some(value) = self.read_cached(&key) {
            return DailyValue {
                owner: Some(owner.to_string()),
                day,
                value,
                origin: ValueOrigin::Cached,
            };
        }

        let value = self.generate();
        match self.store.set(&key, &value.to_string()) {
            Ok(()) => self.forget_previous_day(owner, day),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "lucky number not cached");
            }
        }

        DailyValue {
            owner: Some(owner.to_string()),
            day,
            value,
            origin: ValueOrigin::Generated,
        }
    }

    fn ephemeral(&mut self, day: NaiveDate) -> DailyValue {
        DailyValue {
            owner: None,
            day,
            value: self.generate(),
            origin: ValueOrigin::Ephemeral,
        }
    }

    /// Read failures, garbage and out-of-range values all count as a miss.
    fn read_cached(&self, key: &str) -> Option<u16> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "lucky number read failed");
                return None;
            }
        };
        match raw.trim().parse::<u16>() {
            Ok(v) if (LUCKY_MIN..=LUCKY_MAX).contains(&v) => Some(v),
            _ => {
                tracing::debug!(key = %key, raw = %raw, "discarding stored lucky number");
                None
            }
        }
    }

    fn forget_previous_day(&self, owner: &str, day: NaiveDate) {
        let Some(yesterday) = day.pred_opt() else {
            return;
        };
        let key = storage_key(owner, yesterday);
        if let Err(e) = self.store.delete(&key) {
            tracing::debug!(key = %key, error = %e, "stale lucky number not removed");
        }
    }

    fn generate(&mut self) -> u16 {
        self.rng.random_range(LUCKY_MIN..=LUCKY_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use fourdata_db::store::{MemoryStore, StoreError};
    use proptest::prelude::*;

    use crate::identity::StaticIdentity;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn seeded<S: SecureStore>(store: S) -> DailyValueGenerator<S, StdRng> {
        DailyValueGenerator::with_rng(store, StdRng::seed_from_u64(7))
    }

    /// Memory store whose operations can be made to fail, counting writes and deletes.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_get: bool,
        fail_set: bool,
        fail_delete: bool,
        sets: Cell<u32>,
        deletes: Cell<u32>,
    }

    impl SecureStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            if self.fail_get {
                return Err(StoreError::Backend("keychain locked".to_string()));
            }
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.sets.set(self.sets.get() + 1);
            if self.fail_set {
                return Err(StoreError::Backend("disk full".to_string()));
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> Result<(), StoreError> {
            self.deletes.set(self.deletes.get() + 1);
            if self.fail_delete {
                return Err(StoreError::Backend("keychain locked".to_string()));
            }
            self.inner.delete(key)
        }
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(
            storage_key("user-42", day("2025-06-01")),
            "lucky_number_user-42_2025-06-01"
        );
    }

    #[test]
    fn test_first_call_persists_second_call_reads_back() {
        let store = MemoryStore::new();
        let mut generator = seeded(&store);
        let today = day("2025-06-01");

        let first = generator.resolve(Some("user-42"), today);
        assert_eq!(first.origin, ValueOrigin::Generated);
        assert!((LUCKY_MIN..=LUCKY_MAX).contains(&first.value));
        assert_eq!(
            store.entries(),
            vec![(
                "lucky_number_user-42_2025-06-01".to_string(),
                first.value.to_string()
            )]
        );

        let second = generator.resolve(Some("user-42"), today);
        assert_eq!(second.origin, ValueOrigin::Cached);
        assert_eq!(second.value, first.value);
        assert_eq!(store.entries().len(), 1);
    }

    #[test]
    fn test_email_owner_is_cached() {
        let store = MemoryStore::new();
        let mut generator = seeded(&store);
        let today = day("2025-06-01");

        let first = generator.resolve(Some("alice@example.com"), today);
        let second = generator.resolve(Some("alice@example.com"), today);
        assert_eq!(second.origin, ValueOrigin::Cached);
        assert_eq!(second.value, first.value);
        assert_eq!(
            store.get("lucky_number_alice@example.com_2025-06-01").unwrap(),
            Some(first.value.to_string())
        );

        let spaced = generator.get_or_create_daily_value(Some("first last+1"), today);
        assert_eq!(generator.get_or_create_daily_value(Some("first last+1"), today), spaced);
    }

    #[test]
    fn test_new_day_replaces_yesterday() {
        let store = MemoryStore::new();
        store.set("lucky_number_user-42_2025-05-31", "7777").unwrap();
        let mut generator = seeded(&store);

        let value = generator.get_or_create_daily_value(Some("user-42"), day("2025-06-01"));
        assert_eq!(
            store.entries(),
            vec![(
                "lucky_number_user-42_2025-06-01".to_string(),
                value.to_string()
            )]
        );
    }

    #[test]
    fn test_other_users_are_untouched() {
        let store = MemoryStore::new();
        store.set("lucky_number_user-7_2025-05-31", "1234").unwrap();
        let mut generator = seeded(&store);
        generator.resolve(Some("user-42"), day("2025-06-01"));
        assert_eq!(store.get("lucky_number_user-7_2025-05-31").unwrap().as_deref(), Some("1234"));
    }

    #[test]
    fn test_garbage_is_regenerated_and_overwritten() {
        let store = MemoryStore::new();
        store.set("lucky_number_user-42_2025-06-01", "abc").unwrap();
        let mut generator = seeded(&store);

        let result = generator.resolve(Some("user-42"), day("2025-06-01"));
        assert_eq!(result.origin, ValueOrigin::Generated);
        assert_eq!(
            store.get("lucky_number_user-42_2025-06-01").unwrap(),
            Some(result.value.to_string())
        );
    }

    #[test]
    fn test_out_of_range_is_regenerated() {
        let store = MemoryStore::new();
        store.set("lucky_number_user-42_2025-06-01", "42").unwrap();
        let mut generator = seeded(&store);
        let result = generator.resolve(Some("user-42"), day("2025-06-01"));
        assert_eq!(result.origin, ValueOrigin::Generated);
        assert!(result.value >= LUCKY_MIN);
    }

    #[test]
    fn test_no_identity_never_touches_store() {
        let store = FlakyStore::default();
        let mut generator = seeded(&store);
        for owner in [None, Some(""), Some(FALLBACK_OWNER)] {
            let result = generator.resolve(owner, day("2025-06-01"));
            assert_eq!(result.origin, ValueOrigin::Ephemeral);
            assert_eq!(result.owner, None);
            assert!((LUCKY_MIN..=LUCKY_MAX).contains(&result.value));
        }
        assert_eq!(store.sets.get(), 0);
        assert_eq!(store.deletes.get(), 0);
        assert!(store.inner.entries().is_empty());
    }

    #[test]
    fn test_write_failure_still_returns_value() {
        let store = FlakyStore {
            fail_set: true,
            ..Default::default()
        };
        let mut generator = seeded(&store);
        let result = generator.resolve(Some("user-42"), day("2025-06-01"));
        assert_eq!(result.origin, ValueOrigin::Generated);
        assert!((LUCKY_MIN..=LUCKY_MAX).contains(&result.value));
        assert_eq!(store.sets.get(), 1);
        assert_eq!(store.deletes.get(), 0);
    }

    #[test]
    fn test_read_failure_is_a_miss() {
        let store = FlakyStore {
            fail_get: true,
            ..Default::default()
        };
        let mut generator = seeded(&store);
        let result = generator.resolve(Some("user-42"), day("2025-06-01"));
        assert_eq!(result.origin, ValueOrigin::Generated);
        assert_eq!(store.sets.get(), 1);
    }

    #[test]
    fn test_delete_failure_is_ignored() {
        let store = FlakyStore {
            fail_delete: true,
            ..Default::default()
        };
        store.inner.set("lucky_number_user-42_2025-05-31", "7777").unwrap();
        let mut generator = seeded(&store);
        let result = generator.resolve(Some("user-42"), day("2025-06-01"));
        assert_eq!(result.origin, ValueOrigin::Generated);
        assert_eq!(store.deletes.get(), 1);
        assert_eq!(store.inner.entries().len(), 2);
    }

    #[test]
    fn test_resolve_today_uses_identity() {
        let store = MemoryStore::new();
        let mut generator = seeded(&store);
        let identity = StaticIdentity(Some("user-42".to_string()));
        let first = generator.resolve_today(&identity);
        let second = generator.resolve_today(&identity);
        assert_eq!(first.owner.as_deref(), Some("user-42"));
        if first.day == second.day {
            assert_eq!(first.value, second.value);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_value_in_range_and_stable_within_day(
            owner in "\\PC{1,40}",
            offset in 0i64..20_000,
            seed in any::<u64>(),
        ) {
            prop_assume!(owner != FALLBACK_OWNER);
            let store = MemoryStore::new();
            let mut generator = DailyValueGenerator::with_rng(&store, StdRng::seed_from_u64(seed));
            let today = day("2000-01-01") + chrono::Duration::days(offset);

            let first = generator.get_or_create_daily_value(Some(&owner), today);
            let second = generator.get_or_create_daily_value(Some(&owner), today);
            prop_assert!((LUCKY_MIN..=LUCKY_MAX).contains(&first));
            prop_assert_eq!(first, second);
        }
    }
}
