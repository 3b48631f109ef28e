//! Schedule service: save flow, status overview and the posting service.

use std::collections::HashMap;

use tally_domain::editor::ScheduleEditor;
use tally_domain::error::{NotFoundError, TallyError, ValidationError};
use tally_domain::event::LedgerEvent;
use tally_domain::id::{ScheduleId, TransactionId};
use tally_domain::recurrence::DateSpec;
use tally_domain::schedule::Schedule;
use tally_domain::status::{self, Classification};
use tally_domain::time::{Date, add_days};
use tally_domain::transaction::{PreviewTransaction, Transaction};

use crate::ports::{
    EventPublisher, ScheduleRepository, TransactionBatchUpdate, TransactionQuery, UpcomingDates,
};
use crate::services::linker::ScheduleLinker;

/// Upper bound on preview rows produced for one schedule.
const PREVIEW_LIMIT: usize = 400;

/// A schedule together with its status on a given day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOverview {
    pub schedule: Schedule,
    pub classification: Classification,
}

/// What one [`ScheduleService::advance`] run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceReport {
    /// Schedules whose next date moved forward.
    pub advanced: usize,
    /// Schedules marked completed.
    pub completed: usize,
    /// Transactions posted on a schedule's behalf.
    pub posted: usize,
}

/// Application service for schedule use-cases.
pub struct ScheduleService<R, Q, B, P, U> {
    schedules: R,
    linker: ScheduleLinker<Q, B, P>,
    upcoming: U,
}

impl<R, Q, B, P, U> ScheduleService<R, Q, B, P, U>
where
    R: ScheduleRepository,
    Q: TransactionQuery + Send + Sync + 'static,
    B: TransactionBatchUpdate,
    P: EventPublisher,
    U: UpcomingDates,
{
    /// Create a new service backed by the given ports.
    pub fn new(schedules: R, linker: ScheduleLinker<Q, B, P>, upcoming: U) -> Self {
        Self {
            schedules,
            linker,
            upcoming,
        }
    }

    /// The linker this service posts and links through.
    pub fn linker(&self) -> &ScheduleLinker<Q, B, P> {
        &self.linker
    }

    /// Create or update `schedule`.
    ///
    /// The next date is recomputed from the date condition. `links` are
    /// linked to the schedule only when it is created. Steps run one after
    /// the other and are not rolled back when a later one fails.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::DuplicateName`] if another schedule has the name
    /// - the errors of [`Schedule::validate`]
    /// - storage or transport errors from the ports
    #[tracing::instrument(skip(self, schedule, links), fields(schedule_id = %schedule.id))]
    pub async fn save(
        &self,
        mut schedule: Schedule,
        links: &[TransactionId],
        today: Date,
    ) -> Result<Schedule, TallyError> {
        if let Some(name) = schedule.name.as_deref()
            && let Some(existing) = self.schedules.find_by_name(name).await?
            && existing.id != schedule.id
        {
            return Err(ValidationError::DuplicateName(name.to_string()).into());
        }
        schedule.validate()?;
        schedule.next_date = match schedule.date() {
            Some(spec @ DateSpec::Recurring(_)) => spec.next_date(today)?,
            Some(DateSpec::Date(date)) => Some(*date),
            None => None,
        };

        let is_new = self.schedules.get_by_id(schedule.id).await?.is_none();
        let saved = if is_new {
            self.schedules.create(schedule).await?
        } else {
            self.schedules.update(schedule).await?
        };
        if is_new {
            self.linker.link(links, saved.id).await?;
        }
        self.linker
            .publish(LedgerEvent::schedules_changed(vec![saved.id]))
            .await?;
        tracing::info!(created = is_new, next_date = ?saved.next_date, "schedule saved");
        Ok(saved)
    }

    /// Save the schedule an editor describes, linking its selection when the
    /// schedule is new.
    ///
    /// # Errors
    ///
    /// Returns the editor's validation errors and those of [`save`](Self::save).
    pub async fn save_editor(
        &self,
        editor: &ScheduleEditor,
        today: Date,
    ) -> Result<Schedule, TallyError> {
        let schedule = editor.to_schedule()?;
        self.save(schedule, &editor.initial_links(), today).await
    }

    /// Get a schedule by id.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::NotFound`] if no schedule has that id.
    pub async fn get(&self, id: ScheduleId) -> Result<Schedule, TallyError> {
        self.schedules.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Schedule",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all schedules.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage layer fails.
    pub async fn list(&self) -> Result<Vec<Schedule>, TallyError> {
        self.schedules.get_all().await
    }

    /// Up to `count` occurrences of `spec` on or after `today`.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::Config`] for a malformed rule.
    pub async fn upcoming_dates(
        &self,
        spec: &DateSpec,
        today: Date,
        count: usize,
    ) -> Result<Vec<Date>, TallyError> {
        self.upcoming.upcoming_dates(spec, today, count).await
    }

    /// Classify every schedule on `today`.
    ///
    /// Schedules whose date condition is malformed are logged and left out.
    ///
    /// # Errors
    ///
    /// Returns storage or query errors.
    #[tracing::instrument(skip(self))]
    pub async fn statuses(&self, today: Date) -> Result<Vec<ScheduleOverview>, TallyError> {
        let schedules = self.schedules.get_all().await?;
        let linked = self.linked_by_schedule(&schedules).await?;
        let mut overview = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let transactions = linked.get(&schedule.id).map_or(&[][..], Vec::as_slice);
            match status::evaluate(&schedule, today, transactions) {
                Ok(classification) => overview.push(ScheduleOverview {
                    schedule,
                    classification,
                }),
                Err(err) => {
                    tracing::warn!(schedule_id = %schedule.id, error = %err, "skipping schedule with invalid date condition");
                }
            }
        }
        Ok(overview)
    }

    /// Move the next date past the current occurrence without paying it.
    ///
    /// A schedule with no later occurrence is marked completed.
    ///
    /// # Errors
    ///
    /// Returns [`TallyError::NotFound`], [`ValidationError::DateRequired`]
    /// for a schedule without a date condition, or storage errors.
    #[tracing::instrument(skip(self))]
    pub async fn skip_next_date(&self, id: ScheduleId, today: Date) -> Result<Schedule, TallyError> {
        let mut schedule = self.get(id).await?;
        let spec = schedule
            .date()
            .cloned()
            .ok_or(ValidationError::DateRequired)?;
        let current = match schedule.next_date {
            Some(current) => Some(current),
            None => spec.next_date(today)?,
        };
        let next = match current {
            Some(current) => spec.next_date(add_days(current, 1))?,
            None => None,
        };
        schedule.next_date = next;
        if next.is_none() {
            schedule.completed = true;
        }
        let saved = self.schedules.update(schedule).await?;
        self.linker
            .publish(LedgerEvent::schedules_changed(vec![saved.id]))
            .await?;
        tracing::info!(next_date = ?saved.next_date, completed = saved.completed, "skipped next date");
        Ok(saved)
    }

    /// Insert a transaction built from the schedule's primary conditions,
    /// linked to it and dated on its next date, or on `today` when `on_today`.
    ///
    /// # Errors
    ///
    /// - [`TallyError::NotFound`] for an unknown schedule
    /// - [`ValidationError::InvalidValue`] if the account condition does not
    ///   name a single account
    /// - [`ValidationError::AmountRequired`] without an amount condition
    /// - transport errors from the batch update
    #[tracing::instrument(skip(self))]
    pub async fn post_transaction(
        &self,
        id: ScheduleId,
        today: Date,
        on_today: bool,
    ) -> Result<Transaction, TallyError> {
        let schedule = self.get(id).await?;
        let date = if on_today {
            today
        } else {
            schedule.next_date.unwrap_or(today)
        };
        let tx = posted_transaction(&schedule, date)?;
        self.linker.add_transactions(vec![tx.clone()]).await?;
        tracing::info!(transaction_id = %tx.id, date = %tx.date, amount = tx.amount, "posted scheduled transaction");
        Ok(tx)
    }

    /// Move every active schedule past its paid occurrence and post the
    /// transaction of due or missed schedules that post automatically.
    ///
    /// An occurrence is paid once a linked transaction covers it. A paid
    /// recurring schedule moves to its first occurrence on or after today,
    /// so a schedule that fell behind posts once rather than once per missed
    /// period. A paid single-date schedule is completed once its date is in
    /// the past.
    ///
    /// # Errors
    ///
    /// Returns storage or transport errors. Schedules with malformed date
    /// conditions or without a postable amount are logged and skipped.
    #[tracing::instrument(skip(self))]
    pub async fn advance(&self, today: Date) -> Result<AdvanceReport, TallyError> {
        let schedules = self.schedules.get_active().await?;
        let linked = self.linked_by_schedule(&schedules).await?;
        let mut report = AdvanceReport::default();

        for mut schedule in schedules {
            let (Some(current), Some(spec)) = (schedule.next_date, schedule.date().cloned()) else {
                continue;
            };
            let transactions = linked.get(&schedule.id).map_or(&[][..], Vec::as_slice);
            let mut paid = status::is_covered(current, transactions);

            if !paid
                && current <= today
                && schedule.posts_transaction
                && schedule.posting_account().is_some()
            {
                let tx = match posted_transaction(&schedule, current) {
                    Ok(tx) => tx,
                    Err(err) => {
                        tracing::warn!(schedule_id = %schedule.id, error = %err, "skipping schedule that cannot post its transaction");
                        continue;
                    }
                };
                self.linker.add_transactions(vec![tx]).await?;
                tracing::info!(schedule_id = %schedule.id, date = %current, "posted transaction for occurrence");
                report.posted += 1;
                paid = true;
            }
            if !paid {
                continue;
            }

            match &spec {
                DateSpec::Recurring(_) => match spec.next_date(today.max(add_days(current, 1))) {
                    Ok(Some(next)) => {
                        schedule.next_date = Some(next);
                        report.advanced += 1;
                    }
                    Ok(None) => {
                        schedule.completed = true;
                        report.completed += 1;
                    }
                    Err(err) => {
                        tracing::warn!(schedule_id = %schedule.id, error = %err, "skipping schedule with invalid date condition");
                        continue;
                    }
                },
                DateSpec::Date(_) if current < today => {
                    schedule.completed = true;
                    report.completed += 1;
                }
                DateSpec::Date(_) => continue,
            }
            let saved = self.schedules.update(schedule).await?;
            tracing::info!(schedule_id = %saved.id, next_date = ?saved.next_date, completed = saved.completed, "schedule advanced");
        }

        if report != AdvanceReport::default() {
            tracing::info!(
                advanced = report.advanced,
                completed = report.completed,
                posted = report.posted,
                "advance run finished"
            );
        }
        Ok(report)
    }

    /// Transactions the active schedules are expected to produce from their
    /// next date through `upcoming_days` after `today`, ordered by date.
    /// Occurrences already covered by a linked transaction are left out.
    ///
    /// # Errors
    ///
    /// Returns storage or query errors.
    #[tracing::instrument(skip(self))]
    pub async fn preview(
        &self,
        today: Date,
        upcoming_days: u32,
    ) -> Result<Vec<PreviewTransaction>, TallyError> {
        let schedules = self.schedules.get_active().await?;
        let linked = self.linked_by_schedule(&schedules).await?;
        let until = add_days(today, i64::from(upcoming_days));
        let mut previews = Vec::new();

        for schedule in &schedules {
            let Some(spec) = schedule.date() else {
                continue;
            };
            let from = schedule.next_date.unwrap_or(today);
            let dates = match spec.next_dates(from, PREVIEW_LIMIT) {
                Ok(dates) => dates,
                Err(err) => {
                    tracing::warn!(schedule_id = %schedule.id, error = %err, "skipping schedule with invalid date condition");
                    continue;
                }
            };
            let transactions = linked.get(&schedule.id).map_or(&[][..], Vec::as_slice);
            previews.extend(
                dates
                    .into_iter()
                    .take_while(|date| *date <= until)
                    .filter(|date| !status::is_covered(*date, transactions))
                    .map(|date| PreviewTransaction {
                        id: PreviewTransaction::preview_id(schedule.id, date),
                        schedule: schedule.id,
                        date,
                        account: schedule.posting_account(),
                        payee: schedule.posting_payee(),
                        amount: schedule.scheduled_amount().unwrap_or_default(),
                    }),
            );
        }
        previews.sort_by_key(|preview| preview.date);
        Ok(previews)
    }

    async fn linked_by_schedule(
        &self,
        schedules: &[Schedule],
    ) -> Result<HashMap<ScheduleId, Vec<Transaction>>, TallyError> {
        let ids: Vec<ScheduleId> = schedules.iter().map(|s| s.id).collect();
        let mut grouped: HashMap<ScheduleId, Vec<Transaction>> = HashMap::new();
        if ids.is_empty() {
            return Ok(grouped);
        }
        for tx in self.linker.linked_to_any(&ids).await? {
            if let Some(schedule) = tx.schedule {
                grouped.entry(schedule).or_default().push(tx);
            }
        }
        Ok(grouped)
    }
}

fn posted_transaction(schedule: &Schedule, date: Date) -> Result<Transaction, TallyError> {
    let account = schedule
        .posting_account()
        .ok_or_else(|| ValidationError::InvalidValue {
            field: "account".to_string(),
            reason: "posting requires a single account".to_string(),
        })?;
    let amount = schedule
        .scheduled_amount()
        .ok_or(ValidationError::AmountRequired)?;
    let mut builder = Transaction::builder()
        .date(date)
        .account(account)
        .amount(amount)
        .schedule(schedule.id);
    if let Some(payee) = schedule.posting_payee() {
        builder = builder.payee(payee);
    }
    builder.build()
}
