//! Reminder scheduler — sends the week / 3-day / 1-day event reminders.
//!
//! A run is a sequential sweep over opted-in registrants. A flag is set only
//! after the dispatcher reports delivery, so re-running on the same day never
//! sends a reminder twice and a failed send is retried on the next run that
//! day.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{info, warn};

use crate::config::EventConfig;
use crate::error::Error;
use crate::notify::{Dispatcher, NotificationKind};
use crate::store::UserDirectory;
use crate::users::{ReminderOffset, User};

/// Counts from one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub failed: usize,
}

/// The calendar date on which `offset`'s reminder is due.
pub fn trigger_date(event_date: NaiveDate, offset: ReminderOffset) -> Option<NaiveDate> {
    event_date.checked_sub_days(Days::new(offset.days_before() as u64))
}

/// Parse a cron expression and compute its next fire time after `after`.
pub fn next_run_after(
    schedule: &str,
    after: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>, String> {
    let cron_schedule =
        cron::Schedule::from_str(schedule).map_err(|e| format!("invalid cron: {e}"))?;
    Ok(cron_schedule.after(&after).next())
}

pub struct ReminderScheduler {
    directory: Arc<dyn UserDirectory>,
    dispatcher: Arc<Dispatcher>,
    event: EventConfig,
}

impl ReminderScheduler {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        dispatcher: Arc<Dispatcher>,
        event: EventConfig,
    ) -> Self {
        Self {
            directory,
            dispatcher,
            event,
        }
    }

    /// Send every reminder whose trigger date is `today`.
    ///
    /// An unparseable event date aborts the run before anything is sent.
    pub async fn run(&self, today: NaiveDate) -> Result<RunSummary, Error> {
        let event_date = self.event.event_date()?;

        let due: Vec<ReminderOffset> = ReminderOffset::ALL
            .into_iter()
            .filter(|offset| trigger_date(event_date, *offset) == Some(today))
            .collect();

        if due.is_empty() {
            info!(%today, %event_date, "No reminders due today");
            return Ok(RunSummary::default());
        }

        let users = self.directory.list_reminder_candidates().await?;
        info!(%today, candidates = users.len(), ?due, "Running reminder sweep");

        let mut summary = RunSummary::default();
        for mut user in users {
            for &offset in &due {
                if user.reminder_sent(offset) {
                    continue;
                }
                self.deliver(&mut user, offset, &mut summary).await?;
            }
        }

        info!(sent = summary.sent, failed = summary.failed, "Reminder sweep finished");
        Ok(summary)
    }

    /// Send the 3-day reminder to everyone who registered on or before its
    /// trigger date and has not received it yet.
    ///
    /// Only runs between the 3-day trigger date and the event itself, so a
    /// missed trigger day can be made up without sending the reminder early.
    pub async fn run_catch_up(&self, today: NaiveDate) -> Result<RunSummary, Error> {
        let event_date = self.event.event_date()?;
        let Some(cutoff) = trigger_date(event_date, ReminderOffset::ThreeDays) else {
            return Ok(RunSummary::default());
        };
        if today < cutoff || today >= event_date {
            info!(%today, %cutoff, %event_date, "Outside the catch-up window");
            return Ok(RunSummary::default());
        }

        let users: Vec<User> = self
            .directory
            .list_reminder_candidates()
            .await?
            .into_iter()
            .filter(|u| !u.reminder_sent_3days && u.registration_date.date_naive() <= cutoff)
            .collect();
        info!(%cutoff, candidates = users.len(), "Running 3-day reminder catch-up");

        let mut summary = RunSummary::default();
        for mut user in users {
            self.deliver(&mut user, ReminderOffset::ThreeDays, &mut summary)
                .await?;
        }

        info!(sent = summary.sent, failed = summary.failed, "Catch-up finished");
        Ok(summary)
    }

    async fn deliver(
        &self,
        user: &mut User,
        offset: ReminderOffset,
        summary: &mut RunSummary,
    ) -> Result<(), Error> {
        let delivered = self
            .dispatcher
            .send(user, NotificationKind::EventReminder(offset))
            .await;

        if delivered {
            self.directory.mark_reminder_sent(user.id, offset).await?;
            user.set_reminder_sent(offset);
            summary.sent += 1;
        } else {
            warn!(user_id = %user.id, %offset, "Reminder not delivered; flag left unset");
            summary.failed += 1;
        }
        Ok(())
    }
}

/// Run the scheduler whenever `schedule` fires, using the local calendar date.
pub fn spawn_reminder_ticker(
    scheduler: Arc<ReminderScheduler>,
    schedule: String,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = match next_run_after(&schedule, now) {
                Ok(Some(next)) => next,
                Ok(None) => {
                    info!(schedule = %schedule, "Reminder schedule has no further runs");
                    return;
                }
                Err(e) => {
                    warn!(schedule = %schedule, "Reminder ticker stopped: {e}");
                    return;
                }
            };

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let today = chrono::Local::now().date_naive();
            match scheduler.run(today).await {
                Ok(summary) => {
                    info!(sent = summary.sent, failed = summary.failed, "Scheduled reminder run done")
                }
                Err(e) => warn!("Scheduled reminder run failed: {e}"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::AdminContacts;
    use crate::error::ConfigError;
    use crate::notify::testing::RecordingSender;
    use crate::registration::Messages;
    use crate::store::LibSqlBackend;
    use crate::users::{Channel, ContactField};

    fn event(date: &str) -> EventConfig {
        EventConfig {
            date: date.to_string(),
            ..EventConfig::default()
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup(
        event: EventConfig,
        sender: Arc<RecordingSender>,
    ) -> (ReminderScheduler, Arc<LibSqlBackend>) {
        let directory = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let messages = Messages::new(event.clone(), AdminContacts::default());
        let dispatcher =
            Dispatcher::new(messages, Duration::from_secs(1)).with_telegram(sender);
        let scheduler = ReminderScheduler::new(directory.clone(), Arc::new(dispatcher), event);
        (scheduler, directory)
    }

    async fn add_registrant(db: &LibSqlBackend, chat: &str, opted_in: bool) -> User {
        let user = db.get_or_create_user(Channel::Telegram, chat).await.unwrap();
        db.set_contact_field(user.id, ContactField::FullName, "Иван Петров")
            .await
            .unwrap();
        db.set_contact_field(user.id, ContactField::Email, "ivan@example.com")
            .await
            .unwrap();
        db.set_contact_field(user.id, ContactField::Phone, "89998221277")
            .await
            .unwrap();
        db.complete_registration(user.id).await.unwrap();
        db.set_receive_reminders(user.id, opted_in).await.unwrap();
        user
    }

    async fn reload(db: &LibSqlBackend, chat: &str) -> User {
        db.get_user(Channel::Telegram, chat).await.unwrap().unwrap()
    }

    #[test]
    fn trigger_dates_are_calendar_offsets() {
        let event_date = day(2025, 6, 17);
        assert_eq!(trigger_date(event_date, ReminderOffset::Week), Some(day(2025, 6, 10)));
        assert_eq!(trigger_date(event_date, ReminderOffset::ThreeDays), Some(day(2025, 6, 14)));
        assert_eq!(trigger_date(event_date, ReminderOffset::OneDay), Some(day(2025, 6, 16)));
        // Crosses a month boundary.
        assert_eq!(trigger_date(day(2025, 7, 2), ReminderOffset::Week), Some(day(2025, 6, 25)));
    }

    #[test]
    fn next_run_after_valid_and_invalid() {
        let now = Utc::now();
        let next = next_run_after("0 0 9 * * *", now).unwrap().unwrap();
        assert!(next > now);
        assert!(next_run_after("not a cron", now).is_err());
    }

    #[tokio::test]
    async fn three_day_reminder_is_sent_once() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 июня 2025"), sender.clone()).await;
        add_registrant(&db, "1", true).await;

        let first = scheduler.run(day(2025, 6, 14)).await.unwrap();
        assert_eq!(first, RunSummary { sent: 1, failed: 0 });
        assert!(reload(&db, "1").await.reminder_sent_3days);

        let second = scheduler.run(day(2025, 6, 14)).await.unwrap();
        assert_eq!(second, RunSummary::default());

        let sent = sender.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("осталось 3 дня"));
    }

    #[tokio::test]
    async fn non_trigger_day_sends_nothing() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 June 2025"), sender.clone()).await;
        add_registrant(&db, "1", true).await;

        for today in [day(2025, 6, 9), day(2025, 6, 13), day(2025, 6, 17), day(2025, 6, 18)] {
            assert_eq!(scheduler.run(today).await.unwrap(), RunSummary::default());
        }
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn each_offset_fires_on_its_own_day() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 June 2025"), sender.clone()).await;
        add_registrant(&db, "1", true).await;

        scheduler.run(day(2025, 6, 10)).await.unwrap();
        scheduler.run(day(2025, 6, 14)).await.unwrap();
        scheduler.run(day(2025, 6, 16)).await.unwrap();

        let user = reload(&db, "1").await;
        assert!(user.reminder_sent_week && user.reminder_sent_3days && user.reminder_sent_1day);
        let texts: Vec<String> = sender.sent().into_iter().map(|(_, t)| t).collect();
        assert!(texts[0].contains("неделя"));
        assert!(texts[1].contains("3 дня"));
        assert!(texts[2].starts_with("Последнее напоминание"));
    }

    #[tokio::test]
    async fn users_without_opt_in_are_skipped() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 June 2025"), sender.clone()).await;
        add_registrant(&db, "1", false).await;

        let summary = scheduler.run(day(2025, 6, 16)).await.unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(!reload(&db, "1").await.reminder_sent_1day);
    }

    #[tokio::test]
    async fn failed_send_leaves_flag_unset() {
        let sender = RecordingSender::failing("telegram");
        let (scheduler, db) = setup(event("17 June 2025"), sender).await;
        add_registrant(&db, "1", true).await;

        let summary = scheduler.run(day(2025, 6, 14)).await.unwrap();
        assert_eq!(summary, RunSummary { sent: 0, failed: 1 });
        assert!(!reload(&db, "1").await.reminder_sent_3days);
    }

    #[tokio::test]
    async fn bad_event_date_aborts_run() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("June the 17th"), sender.clone()).await;
        add_registrant(&db, "1", true).await;

        let err = scheduler.run(day(2025, 6, 14)).await.unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::EventDate { .. })));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn catch_up_sends_pending_three_day_reminders() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 June 2099"), sender.clone()).await;
        add_registrant(&db, "1", true).await;
        let done = add_registrant(&db, "2", true).await;
        db.mark_reminder_sent(done.id, ReminderOffset::ThreeDays)
            .await
            .unwrap();

        // Missed the 14th; made up on the 15th.
        let summary = scheduler.run_catch_up(day(2099, 6, 15)).await.unwrap();
        assert_eq!(summary, RunSummary { sent: 1, failed: 0 });
        assert_eq!(sender.sent()[0].0, "1");

        assert_eq!(
            scheduler.run_catch_up(day(2099, 6, 15)).await.unwrap(),
            RunSummary::default()
        );
    }

    #[tokio::test]
    async fn catch_up_before_trigger_date_keeps_flag_for_regular_run() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 June 2099"), sender.clone()).await;
        add_registrant(&db, "1", true).await;

        let early = scheduler.run_catch_up(day(2099, 5, 1)).await.unwrap();
        assert_eq!(early, RunSummary::default());
        assert!(!reload(&db, "1").await.reminder_sent_3days);

        let on_time = scheduler.run(day(2099, 6, 14)).await.unwrap();
        assert_eq!(on_time, RunSummary { sent: 1, failed: 0 });
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn catch_up_does_nothing_on_or_after_event_day() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 June 2099"), sender.clone()).await;
        add_registrant(&db, "1", true).await;

        for today in [day(2099, 6, 17), day(2099, 7, 1)] {
            assert_eq!(scheduler.run_catch_up(today).await.unwrap(), RunSummary::default());
        }
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn catch_up_skips_users_registered_after_cutoff() {
        let sender = RecordingSender::new("telegram");
        let (scheduler, db) = setup(event("17 June 2000"), sender.clone()).await;
        add_registrant(&db, "1", true).await;

        // Inside the window, but everyone registered "now", after the cutoff.
        assert_eq!(
            scheduler.run_catch_up(day(2000, 6, 15)).await.unwrap(),
            RunSummary::default()
        );
        assert!(sender.sent().is_empty());
    }
}
