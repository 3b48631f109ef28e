//! Schedule repository port: persistence for schedules.

use std::future::Future;

use tally_domain::error::TallyError;
use tally_domain::id::ScheduleId;
use tally_domain::schedule::Schedule;

/// Repository for persisting and querying [`Schedule`]s.
pub trait ScheduleRepository {
    /// Create a new schedule in storage.
    fn create(&self, schedule: Schedule)
    -> impl Future<Output = Result<Schedule, TallyError>> + Send;

    /// Get a schedule by its unique identifier.
    fn get_by_id(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<Schedule>, TallyError>> + Send;

    /// Get the schedule carrying `name`, if any.
    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Schedule>, TallyError>> + Send;

    /// Get all schedules.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Schedule>, TallyError>> + Send;

    /// Get all schedules not marked completed.
    fn get_active(&self) -> impl Future<Output = Result<Vec<Schedule>, TallyError>> + Send;

    /// Update an existing schedule.
    fn update(&self, schedule: Schedule)
    -> impl Future<Output = Result<Schedule, TallyError>> + Send;
}

impl<T: ScheduleRepository + Send + Sync> ScheduleRepository for std::sync::Arc<T> {
    fn create(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, TallyError>> + Send {
        (**self).create(schedule)
    }

    fn get_by_id(
        &self,
        id: ScheduleId,
    ) -> impl Future<Output = Result<Option<Schedule>, TallyError>> + Send {
        (**self).get_by_id(id)
    }

    fn find_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<Schedule>, TallyError>> + Send {
        (**self).find_by_name(name)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Schedule>, TallyError>> + Send {
        (**self).get_all()
    }

    fn get_active(&self) -> impl Future<Output = Result<Vec<Schedule>, TallyError>> + Send {
        (**self).get_active()
    }

    fn update(
        &self,
        schedule: Schedule,
    ) -> impl Future<Output = Result<Schedule, TallyError>> + Send {
        (**self).update(schedule)
    }
}
