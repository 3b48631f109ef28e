//! `SQLite` implementation of [`TransactionQuery`] and [`TransactionBatchUpdate`].
//!
//! Filters are evaluated in Rust. The filter's date window narrows the rows
//! loaded, everything else is checked per transaction.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Row, Sqlite, SqlitePool};

use tally_app::ports::{TransactionBatchUpdate, TransactionQuery};
use tally_domain::error::TallyError;
use tally_domain::filter::TransactionFilter;
use tally_domain::id::{AccountId, PayeeId, ScheduleId, TransactionId};
use tally_domain::time::{format_date, parse_date};
use tally_domain::transaction::{Transaction, TransactionBatch};

use crate::decode_error;
use crate::error::StorageError;

struct Wrapper(Transaction);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let date: String = row.try_get("date")?;
        let account: String = row.try_get("account")?;
        let payee: Option<String> = row.try_get("payee")?;
        let amount: i64 = row.try_get("amount")?;
        let notes: Option<String> = row.try_get("notes")?;
        let schedule: Option<String> = row.try_get("schedule")?;

        Ok(Self(Transaction {
            id: TransactionId::from_str(&id).map_err(decode_error)?,
            date: parse_date(&date).map_err(decode_error)?,
            account: AccountId::from_str(&account).map_err(decode_error)?,
            payee: payee
                .map(|payee| PayeeId::from_str(&payee).map_err(decode_error))
                .transpose()?,
            amount,
            notes,
            schedule: schedule
                .map(|schedule| ScheduleId::from_str(&schedule).map_err(decode_error))
                .transpose()?,
        }))
    }
}

/// `SQLite`-backed ledger transactions.
pub struct SqliteTransactionStore {
    pool: SqlitePool,
}

impl SqliteTransactionStore {
    /// Create a new store backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn fetch(
        &self,
        mut query: QueryBuilder<'_, Sqlite>,
    ) -> Result<Vec<Transaction>, StorageError> {
        query.push(" ORDER BY date, id");
        let rows: Vec<Wrapper> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}

impl TransactionQuery for SqliteTransactionStore {
    async fn find(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>, TallyError> {
        let window = filter.date_window();
        let mut query = QueryBuilder::new("SELECT * FROM transactions WHERE 1 = 1");
        if let Some(from) = window.from {
            query.push(" AND date >= ").push_bind(format_date(from));
        }
        if let Some(to) = window.to {
            query.push(" AND date <= ").push_bind(format_date(to));
        }
        let candidates = self.fetch(query).await?;
        Ok(candidates
            .into_iter()
            .filter(|tx| filter.matches(tx))
            .collect())
    }

    async fn linked_to(&self, schedule: ScheduleId) -> Result<Vec<Transaction>, TallyError> {
        let mut query = QueryBuilder::new("SELECT * FROM transactions WHERE schedule = ");
        query.push_bind(schedule.to_string());
        Ok(self.fetch(query).await?)
    }

    async fn linked_to_any(
        &self,
        schedules: &[ScheduleId],
    ) -> Result<Vec<Transaction>, TallyError> {
        if schedules.is_empty() {
            return Ok(Vec::new());
        }
        let mut query = QueryBuilder::new("SELECT * FROM transactions WHERE schedule IN (");
        let mut ids = query.separated(", ");
        for schedule in schedules {
            ids.push_bind(schedule.to_string());
        }
        ids.push_unseparated(")");
        Ok(self.fetch(query).await?)
    }
}

impl TransactionBatchUpdate for SqliteTransactionStore {
    async fn batch_update(&self, batch: TransactionBatch) -> Result<(), TallyError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;

        for added in &batch.added {
            sqlx::query(
                "INSERT INTO transactions (id, date, account, payee, amount, notes, schedule) VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(added.id.to_string())
            .bind(format_date(added.date))
            .bind(added.account.to_string())
            .bind(added.payee.map(|payee| payee.to_string()))
            .bind(added.amount)
            .bind(&added.notes)
            .bind(added.schedule.map(|schedule| schedule.to_string()))
            .execute(&mut *tx)
            .await
            .map_err(StorageError::from)?;
        }

        for link in &batch.updated {
            sqlx::query("UPDATE transactions SET schedule = ? WHERE id = ?")
                .bind(link.schedule.map(|schedule| schedule.to_string()))
                .bind(link.id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
        }

        tx.commit().await.map_err(StorageError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use tally_domain::condition::{AmountMatch, Condition, DateMatch, IdMatch};
    use tally_domain::recurrence::{DateSpec, RecurConfig};
    use tally_domain::time::Date;
    use tally_domain::transaction::ScheduleLink;

    async fn setup() -> SqliteTransactionStore {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteTransactionStore::new(db.pool().clone())
    }

    fn date(y: i32, m: u32, d: u32) -> Date {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(on: Date, account: AccountId, amount: i64) -> Transaction {
        Transaction::builder()
            .date(on)
            .account(account)
            .payee(PayeeId::new())
            .amount(amount)
            .notes("imported")
            .build()
            .unwrap()
    }

    async fn seed(store: &SqliteTransactionStore, transactions: Vec<Transaction>) {
        store
            .batch_update(TransactionBatch::additions(transactions))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn should_insert_and_find_transactions_in_date_order() {
        let store = setup().await;
        let account = AccountId::new();
        let later = tx(date(2024, 3, 2), account, -10);
        let earlier = tx(date(2024, 3, 1), account, -20);
        seed(&store, vec![later.clone(), earlier.clone()]).await;

        let all = store.find(&TransactionFilter::default()).await.unwrap();
        assert_eq!(all, vec![earlier, later]);
    }

    #[tokio::test]
    async fn should_apply_conditions_beyond_date_window() {
        let store = setup().await;
        let rent = AccountId::new();
        seed(
            &store,
            vec![
                tx(date(2024, 1, 15), rent, -1000),
                tx(date(2024, 2, 16), rent, -1040),
                tx(date(2024, 2, 20), rent, -1000),
                tx(date(2024, 2, 15), AccountId::new(), -1000),
                tx(date(2023, 12, 15), rent, -1000),
            ],
        )
        .await;
        let filter = TransactionFilter::from_conditions(&[
            Condition::Account(IdMatch::Is(rent)),
            Condition::Amount(AmountMatch::IsApprox(-1000)),
            Condition::Date(DateMatch::IsApprox(
                RecurConfig::monthly(date(2024, 1, 15)).into(),
            )),
        ]);

        let found = store.find(&filter).await.unwrap();

        let dates: Vec<Date> = found.iter().map(|t| t.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 15), date(2024, 2, 16)]);
    }

    #[tokio::test]
    async fn should_narrow_single_date_lookup() {
        let store = setup().await;
        let account = AccountId::new();
        seed(
            &store,
            vec![
                tx(date(2024, 3, 8), account, 1),
                tx(date(2024, 3, 12), account, 2),
                tx(date(2024, 3, 13), account, 3),
            ],
        )
        .await;
        let filter = TransactionFilter::from_conditions(&[Condition::Date(DateMatch::IsApprox(
            DateSpec::Date(date(2024, 3, 10)),
        ))]);

        let found = store.find(&filter).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn should_link_replace_and_unlink_transactions() {
        let store = setup().await;
        let first = tx(date(2024, 3, 1), AccountId::new(), -5);
        seed(&store, vec![first.clone()]).await;
        let a = ScheduleId::new();
        let b = ScheduleId::new();

        store
            .batch_update(TransactionBatch::links(vec![ScheduleLink::link(first.id, a)]))
            .await
            .unwrap();
        assert_eq!(store.linked_to(a).await.unwrap().len(), 1);

        store
            .batch_update(TransactionBatch::links(vec![ScheduleLink::link(first.id, b)]))
            .await
            .unwrap();
        assert!(store.linked_to(a).await.unwrap().is_empty());
        assert_eq!(store.linked_to(b).await.unwrap()[0].schedule, Some(b));

        store
            .batch_update(TransactionBatch::links(vec![ScheduleLink::unlink(first.id)]))
            .await
            .unwrap();
        assert!(store.linked_to(b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_ignore_links_for_unknown_transactions() {
        let store = setup().await;
        let result = store
            .batch_update(TransactionBatch::links(vec![ScheduleLink::link(
                TransactionId::new(),
                ScheduleId::new(),
            )]))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn should_list_transactions_linked_to_any_schedule() {
        let store = setup().await;
        let a = ScheduleId::new();
        let b = ScheduleId::new();
        let account = AccountId::new();
        let mut linked_a = tx(date(2024, 3, 1), account, 1);
        linked_a.schedule = Some(a);
        let mut linked_b = tx(date(2024, 3, 2), account, 2);
        linked_b.schedule = Some(b);
        seed(
            &store,
            vec![linked_a.clone(), linked_b.clone(), tx(date(2024, 3, 3), account, 3)],
        )
        .await;

        let found = store.linked_to_any(&[a, b]).await.unwrap();
        assert_eq!(found, vec![linked_a, linked_b]);
        assert!(store.linked_to_any(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn should_roll_back_batch_when_an_insert_fails() {
        let store = setup().await;
        let existing = tx(date(2024, 3, 1), AccountId::new(), 1);
        seed(&store, vec![existing.clone()]).await;
        let fresh = tx(date(2024, 3, 2), AccountId::new(), 2);

        let result = store
            .batch_update(TransactionBatch::additions(vec![fresh, existing]))
            .await;

        assert!(matches!(result, Err(TallyError::Storage(_))));
        assert_eq!(store.find(&TransactionFilter::default()).await.unwrap().len(), 1);
    }
}
