//! Document-store boundary for persisted transactions.
//!
//! The real store is an external document database; the server only relies
//! on the narrow surface below (append-only create plus the filtered reads
//! backing the HTTP endpoints). [`MemoryStore`] is the in-process reference
//! implementation used by the app binary and the tests.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use engine::TransactionRecord;
use uuid::Uuid;

/// A persisted transaction document.
#[derive(Clone, Debug)]
pub struct StoredTransaction {
    /// Store-generated opaque id.
    pub id: String,
    pub record: TransactionRecord,
    pub created_at: DateTime<Utc>,
}

/// External document store holding transaction records.
pub trait TransactionStore: Send + Sync {
    /// Persists a record, stamping `created_at`, and returns the generated
    /// id.
    fn create(&self, record: TransactionRecord) -> String;

    /// Transactions containing `user_id`, newest first, windowed by
    /// `offset`/`limit`.
    fn list_by_user(&self, user_id: &str, offset: usize, limit: usize) -> Vec<StoredTransaction>;

    /// Transactions containing `user_id` whose `date` falls inside
    /// `[from, to)`, oldest first.
    fn list_by_user_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<StoredTransaction>;

    /// Count aggregate over transactions containing `user_id`.
    fn count_by_user(&self, user_id: &str) -> usize;
}

/// In-memory reference store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<StoredTransaction>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read_rows(&self) -> RwLockReadGuard<'_, Vec<StoredTransaction>> {
        match self.rows.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_rows(&self) -> RwLockWriteGuard<'_, Vec<StoredTransaction>> {
        match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn involves_user(stored: &StoredTransaction, user_id: &str) -> bool {
    stored.record.user_ids.iter().any(|id| id == user_id)
}

impl TransactionStore for MemoryStore {
    fn create(&self, record: TransactionRecord) -> String {
        let id = Uuid::new_v4().to_string();
        let stored = StoredTransaction {
            id: id.clone(),
            record,
            created_at: Utc::now(),
        };
        self.write_rows().push(stored);
        tracing::debug!(%id, "transaction stored");
        id
    }

    fn list_by_user(&self, user_id: &str, offset: usize, limit: usize) -> Vec<StoredTransaction> {
        let rows = self.read_rows();
        let mut matched: Vec<&StoredTransaction> = rows
            .iter()
            .filter(|stored| involves_user(stored, user_id))
            .collect();
        // Newest first; insertion order breaks created_at ties.
        matched.reverse();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    fn list_by_user_between(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<StoredTransaction> {
        let rows = self.read_rows();
        let mut matched: Vec<StoredTransaction> = rows
            .iter()
            .filter(|stored| {
                involves_user(stored, user_id)
                    && stored.record.date >= from
                    && stored.record.date < to
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.record.date.cmp(&b.record.date));
        matched
    }

    fn count_by_user(&self, user_id: &str) -> usize {
        self.read_rows()
            .iter()
            .filter(|stored| involves_user(stored, user_id))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use engine::MoneyCents;

    fn record(name: &str, user_ids: &[&str], date: DateTime<Utc>) -> TransactionRecord {
        TransactionRecord {
            name: name.to_string(),
            date,
            merchant: "Shop".to_string(),
            users: Vec::new(),
            user_ids: user_ids.iter().map(|id| (*id).to_string()).collect(),
            fees: MoneyCents::ZERO,
            subtotal: MoneyCents::new(1000),
            total: MoneyCents::new(1000),
        }
    }

    #[test]
    fn create_assigns_unique_ids() {
        let store = MemoryStore::new();
        let a = store.create(record("a", &["u1"], Utc::now()));
        let b = store.create(record("b", &["u1"], Utc::now()));
        assert_ne!(a, b);
        assert_eq!(store.count_by_user("u1"), 2);
    }

    #[test]
    fn list_filters_by_containment_and_windows() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.create(record(&format!("t{i}"), &["u1"], Utc::now()));
        }
        store.create(record("other", &["u2"], Utc::now()));

        let page = store.list_by_user("u1", 1, 2);
        assert_eq!(page.len(), 2);
        // Newest first: t4 is skipped by the offset.
        assert_eq!(page[0].record.name, "t3");
        assert_eq!(page[1].record.name, "t2");
        assert!(store.list_by_user("u2", 0, 10).len() == 1);
    }

    #[test]
    fn monthly_range_is_half_open_and_ascending() {
        let store = MemoryStore::new();
        let in_jan = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap();
        let later_jan = Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap();
        let feb_first = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        store.create(record("late", &["u1"], later_jan));
        store.create(record("early", &["u1"], in_jan));
        store.create(record("feb", &["u1"], feb_first));

        let from = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let rows = store.list_by_user_between("u1", from, feb_first);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].record.name, "early");
        assert_eq!(rows[1].record.name, "late");
    }
}
