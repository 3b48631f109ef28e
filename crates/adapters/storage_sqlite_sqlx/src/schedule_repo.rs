//! `SQLite` implementation of [`ScheduleRepository`].

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use tally_app::ports::ScheduleRepository;
use tally_domain::condition::Condition;
use tally_domain::error::TallyError;
use tally_domain::id::{RuleId, ScheduleId};
use tally_domain::schedule::{Schedule, ScheduleAction};
use tally_domain::time::{format_date, parse_date};

use crate::decode_error;
use crate::error::StorageError;

struct Wrapper(Schedule);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Schedule> {
        value.map(|w| w.0)
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: Option<String> = row.try_get("name")?;
        let rule: Option<String> = row.try_get("rule")?;
        let conditions_json: String = row.try_get("conditions")?;
        let actions_json: String = row.try_get("actions")?;
        let posts_transaction: bool = row.try_get("posts_transaction")?;
        let completed: bool = row.try_get("completed")?;
        let next_date: Option<String> = row.try_get("next_date")?;

        let id = ScheduleId::from_str(&id).map_err(decode_error)?;
        let rule = rule
            .map(|rule| RuleId::from_str(&rule).map_err(decode_error))
            .transpose()?;
        let conditions: Vec<Condition> =
            serde_json::from_str(&conditions_json).map_err(decode_error)?;
        let actions: Vec<ScheduleAction> =
            serde_json::from_str(&actions_json).map_err(decode_error)?;
        let next_date = next_date
            .map(|date| parse_date(&date).map_err(decode_error))
            .transpose()?;

        Ok(Self(Schedule {
            id,
            name,
            rule,
            conditions,
            actions,
            posts_transaction,
            completed,
            next_date,
        }))
    }
}

struct Columns {
    id: String,
    rule: Option<String>,
    conditions: String,
    actions: String,
    next_date: Option<String>,
}

impl Columns {
    fn encode(schedule: &Schedule) -> Result<Self, StorageError> {
        Ok(Self {
            id: schedule.id.to_string(),
            rule: schedule.rule.map(|rule| rule.to_string()),
            conditions: serde_json::to_string(&schedule.conditions)?,
            actions: serde_json::to_string(&schedule.actions)?,
            next_date: schedule.next_date.map(format_date),
        })
    }
}

/// `SQLite`-backed schedule repository.
pub struct SqliteScheduleRepository {
    pool: SqlitePool,
}

impl SqliteScheduleRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ScheduleRepository for SqliteScheduleRepository {
    async fn create(&self, schedule: Schedule) -> Result<Schedule, TallyError> {
        let columns = Columns::encode(&schedule)?;

        sqlx::query(
            "INSERT INTO schedules (id, name, rule, conditions, actions, posts_transaction, completed, next_date) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&columns.id)
        .bind(&schedule.name)
        .bind(&columns.rule)
        .bind(&columns.conditions)
        .bind(&columns.actions)
        .bind(schedule.posts_transaction)
        .bind(schedule.completed)
        .bind(&columns.next_date)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(schedule)
    }

    async fn get_by_id(&self, id: ScheduleId) -> Result<Option<Schedule>, TallyError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM schedules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Schedule>, TallyError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM schedules WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Schedule>, TallyError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM schedules ORDER BY name, id")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn get_active(&self) -> Result<Vec<Schedule>, TallyError> {
        let rows: Vec<Wrapper> =
            sqlx::query_as("SELECT * FROM schedules WHERE completed = 0 ORDER BY name, id")
                .fetch_all(&self.pool)
                .await
                .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn update(&self, schedule: Schedule) -> Result<Schedule, TallyError> {
        let columns = Columns::encode(&schedule)?;

        sqlx::query(
            "UPDATE schedules SET name = ?, rule = ?, conditions = ?, actions = ?, posts_transaction = ?, completed = ?, next_date = ? WHERE id = ?",
        )
        .bind(&schedule.name)
        .bind(&columns.rule)
        .bind(&columns.conditions)
        .bind(&columns.actions)
        .bind(schedule.posts_transaction)
        .bind(schedule.completed)
        .bind(&columns.next_date)
        .bind(&columns.id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(schedule)
    }
}
