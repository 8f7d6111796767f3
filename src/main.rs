use std::path::Path;
use std::sync::Arc;

use event_registrar::channels::TelegramChannel;
use event_registrar::config::Settings;
use event_registrar::notify::Dispatcher;
use event_registrar::registration::RegistrationEngine;
use event_registrar::reminders::{self, ReminderScheduler};
use event_registrar::server::registrar_routes;
use event_registrar::store::{LibSqlBackend, UserDirectory};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = Settings::from_env()?;

    eprintln!("📋 Event Registrar v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Event: {} ({})", settings.event.name, settings.event.date);
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook/whatsapp", settings.port);

    if let Err(e) = settings.event.event_date() {
        tracing::warn!("Reminders will not run until EVENT_DATE is fixed: {e}");
    }

    // ── Database ─────────────────────────────────────────────────────────
    let directory: Arc<dyn UserDirectory> =
        Arc::new(LibSqlBackend::new_local(Path::new(&settings.db_path)).await?);
    eprintln!("   Database: {}", settings.db_path);

    // ── Channels ─────────────────────────────────────────────────────────
    let telegram = settings
        .telegram
        .clone()
        .map(|config| Arc::new(TelegramChannel::new(config)));

    let dispatcher = Arc::new(Dispatcher::from_settings(&settings, telegram.clone()));
    let engine = Arc::new(RegistrationEngine::new(
        Arc::clone(&directory),
        Arc::clone(&dispatcher),
    ));

    let mut active_channels = vec!["whatsapp-webhook"];
    if let Some(telegram) = telegram {
        if let Err(e) = telegram.health_check().await {
            tracing::warn!("Telegram health check failed: {e}");
        }
        let _poll_handle = telegram.start(Arc::clone(&engine));
        active_channels.push("telegram");
    }
    if settings.twilio.is_some() {
        active_channels.push("whatsapp-outbound");
    }
    if settings.smtp.is_some() {
        active_channels.push("email");
    }
    eprintln!("   Channels: {}", active_channels.join(", "));

    // ── Reminders ────────────────────────────────────────────────────────
    if let Some(schedule) = settings.reminder_cron.clone() {
        let scheduler = Arc::new(ReminderScheduler::new(
            Arc::clone(&directory),
            Arc::clone(&dispatcher),
            settings.event.clone(),
        ));
        let _ticker = reminders::spawn_reminder_ticker(scheduler, schedule.clone());
        eprintln!("   Reminders: in-process ({schedule})");
    } else {
        eprintln!("   Reminders: external (send-reminders)");
    }

    // ── HTTP ─────────────────────────────────────────────────────────────
    let app = registrar_routes(engine);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", settings.port)).await?;
    tracing::info!(port = settings.port, "Webhook server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
