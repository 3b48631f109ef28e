//! In-memory port implementations shared by the service tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tally_domain::error::{TallyError, TransportError};
use tally_domain::filter::TransactionFilter;
use tally_domain::id::ScheduleId;
use tally_domain::schedule::Schedule;
use tally_domain::transaction::{Transaction, TransactionBatch};

use crate::ports::{ScheduleRepository, TransactionBatchUpdate, TransactionQuery};

#[derive(Default)]
pub struct InMemoryLedger {
    pub transactions: Mutex<Vec<Transaction>>,
    pub find_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub fail_batches: AtomicBool,
}

impl InMemoryLedger {
    pub fn with(transactions: Vec<Transaction>) -> Self {
        Self {
            transactions: Mutex::new(transactions),
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.lock().unwrap().clone()
    }

    fn sorted(&self, keep: impl Fn(&Transaction) -> bool) -> Vec<Transaction> {
        let mut result: Vec<Transaction> = self
            .transactions
            .lock()
            .unwrap()
            .iter()
            .filter(|tx| keep(*tx))
            .cloned()
            .collect();
        result.sort_by_key(|tx| tx.date);
        result
    }
}

impl TransactionQuery for InMemoryLedger {
    fn find(
        &self,
        filter: &TransactionFilter,
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.sorted(|tx| filter.matches(tx));
        async { Ok(result) }
    }

    fn linked_to(
        &self,
        schedule: ScheduleId,
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send {
        let result = self.sorted(|tx| tx.is_linked_to(schedule));
        async { Ok(result) }
    }

    fn linked_to_any(
        &self,
        schedules: &[ScheduleId],
    ) -> impl Future<Output = Result<Vec<Transaction>, TallyError>> + Send {
        let result = self.sorted(|tx| tx.schedule.is_some_and(|s| schedules.contains(&s)));
        async { Ok(result) }
    }
}

impl TransactionBatchUpdate for InMemoryLedger {
    fn batch_update(
        &self,
        batch: TransactionBatch,
    ) -> impl Future<Output = Result<(), TallyError>> + Send {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let result = if self.fail_batches.load(Ordering::SeqCst) {
            Err(TransportError::Unavailable("ledger offline".to_string()).into())
        } else {
            let mut transactions = self.transactions.lock().unwrap();
            transactions.extend(batch.added);
            for link in batch.updated {
                if let Some(tx) = transactions.iter_mut().find(|tx| tx.id == link.id) {
                    tx.schedule = link.schedule;
                }
            }
            Ok(())
        };
        async { result }
    }
}

#[derive(Default)]
pub struct InMemoryScheduleRepo {
    pub store: Mutex<HashMap<ScheduleId, Schedule>>,
}

impl ScheduleRepository for InMemoryScheduleRepo {
    fn create(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, TallyError>> + Send {
        self.store
            .lock()
            .unwrap()
            .insert(schedule.id, schedule.clone());
        async { Ok(schedule) }
    }

    fn get_by_id(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<Schedule>, TallyError>> + Send {
        let result = self.store.lock().unwrap().get(&id).cloned();
        async { Ok(result) }
    }

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Schedule>, TallyError>> + Send {
        let result = self
            .store
            .lock()
            .unwrap()
            .values()
            .find(|s| s.name.as_deref() == Some(name))
            .cloned();
        async { Ok(result) }
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Schedule>, TallyError>> + Send {
        let result: Vec<Schedule> = self.store.lock().unwrap().values().cloned().collect();
        async { Ok(result) }
    }

    fn get_active(&self) -> impl Future<Output = Result<Vec<Schedule>, TallyError>> + Send {
        let result: Vec<Schedule> = self
            .store
            .lock()
            .unwrap()
            .values()
            .filter(|s| !s.completed)
            .cloned()
            .collect();
        async { Ok(result) }
    }

    fn update(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, TallyError>> + Send {
        self.store
            .lock()
            .unwrap()
            .insert(schedule.id, schedule.clone());
        async { Ok(schedule) }
    }
}
