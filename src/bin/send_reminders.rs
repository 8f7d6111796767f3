//! One-shot reminder run, meant for a daily cron job.
//!
//! Exits non-zero if the event date is invalid or the database fails.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::Parser;

use event_registrar::channels::TelegramChannel;
use event_registrar::config::Settings;
use event_registrar::notify::Dispatcher;
use event_registrar::reminders::ReminderScheduler;
use event_registrar::store::LibSqlBackend;

#[derive(Debug, Parser)]
#[command(name = "send-reminders", version, about = "Send due event reminders")]
struct Args {
    /// Make up a missed 3-day reminder (between its trigger date and the event).
    #[arg(long)]
    catch_up: bool,

    /// Treat this date (YYYY-MM-DD) as today instead of the local date.
    #[arg(long, env = "REMINDER_TODAY")]
    today: Option<NaiveDate>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let settings = Settings::from_env()?;

    let directory = Arc::new(LibSqlBackend::new_local(Path::new(&settings.db_path)).await?);
    let telegram = settings
        .telegram
        .clone()
        .map(|config| Arc::new(TelegramChannel::new(config)));
    let dispatcher = Arc::new(Dispatcher::from_settings(&settings, telegram));
    let scheduler = ReminderScheduler::new(directory, dispatcher, settings.event.clone());

    let today = args
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let summary = if args.catch_up {
        scheduler.run_catch_up(today).await?
    } else {
        scheduler.run(today).await?
    };

    tracing::info!(
        sent = summary.sent,
        failed = summary.failed,
        "Reminder run complete"
    );
    Ok(())
}
