use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use debate_models::{DailyState, DebateKey, ProposerOpinion};

use crate::error::StoreError;
use crate::sqlite::StateStore;

/// A [`StateStore`] shared across tasks.
///
/// `rusqlite::Connection` is not `Sync`, so every call takes the mutex for
/// the duration of one statement (or one transaction, for seeding).
pub struct Ledger {
    store: Mutex<StateStore>,
}

impl Ledger {
    pub fn new(store: StateStore) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, StateStore>, StoreError> {
        self.store
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("store mutex poisoned: {e}")))
    }

    pub fn latest_state(&self, key: &DebateKey) -> Result<Option<DailyState>, StoreError> {
        self.lock()?.latest_state(key)
    }

    pub fn history(&self, key: &DebateKey) -> Result<Vec<DailyState>, StoreError> {
        self.lock()?.history(key)
    }

    pub fn insert_daily_state(&self, state: &DailyState) -> Result<i64, StoreError> {
        self.lock()?.insert_daily_state(state)
    }

    pub fn seed_genesis(&self, key: &DebateKey, date: NaiveDate) -> Result<bool, StoreError> {
        self.lock()?.seed_genesis(key, date)
    }

    pub fn insert_opinion(&self, opinion: &ProposerOpinion) -> Result<i64, StoreError> {
        self.lock()?.insert_opinion(opinion)
    }

    pub fn opinions_for(
        &self,
        date: NaiveDate,
        key: &DebateKey,
    ) -> Result<Vec<ProposerOpinion>, StoreError> {
        self.lock()?.opinions_for(date, key)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sqlite::tests::{day, key, opinion};
    use debate_models::Decision;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn concurrent_writers_get_one_row_per_agent() {
        let ledger = Arc::new(Ledger::new(StateStore::open_in_memory().unwrap()));
        ledger.seed_genesis(&key(), day(1)).unwrap();
        let state_id = ledger.latest_state(&key()).unwrap().unwrap().id.unwrap();

        // Two tasks per agent race to write the same opinion.
        let mut handles = Vec::new();
        for agent in ["A1", "A2", "A3"] {
            for _ in 0..2 {
                let ledger = Arc::clone(&ledger);
                handles.push(tokio::spawn(async move {
                    ledger.insert_opinion(&opinion(state_id, day(2), agent, Decision::Buy, dec!(5)))
                }));
            }
        }

        let mut written = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => written += 1,
                Err(StoreError::DuplicateOpinion { .. }) => duplicates += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(written, 3);
        assert_eq!(duplicates, 3);
        assert_eq!(ledger.opinions_for(day(2), &key()).unwrap().len(), 3);
    }
}
