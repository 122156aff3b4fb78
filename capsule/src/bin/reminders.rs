//! Reminder dispatch process.
//!
//! Sends "your capsule is ready" mail for sealed capsules past their open
//! date. Runs one batch and exits, or keeps dispatching every
//! `REMINDER_INTERVAL_SECS` seconds until interrupted.

use std::time::Duration;
use time_capsule::config::{AppConfig, ReminderSchedule};
use time_capsule::providers::{ConsoleMailTransport, MailTransport};
use time_capsule::stores::PostgresCapsuleRepository;
use time_capsule::{ReminderConfig, ReminderDispatcher, SystemClock};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing .env is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "time_capsule=info,capsule_reminders=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    info!(
        max_connections = config.database.max_connections,
        smtp = config.smtp.is_some(),
        interval_secs = ?config.reminders.interval_secs,
        batch_size = config.reminders.batch_size,
        "Configuration loaded"
    );

    let repository =
        PostgresCapsuleRepository::connect(&config.database.url, config.database.max_connections).await?;
    if config.database.run_migrations {
        repository.migrate().await?;
        info!("Migrations applied");
    }

    let reminder_config = config.reminder_config();

    match &config.smtp {
        #[cfg(feature = "smtp")]
        Some(smtp) => {
            let mail = time_capsule::providers::SmtpMailTransport::from_config(smtp)?;
            run(repository, mail, reminder_config, &config.reminders).await
        }
        #[cfg(not(feature = "smtp"))]
        Some(_) => {
            warn!("SMTP configured but built without the `smtp` feature; logging mail instead");
            run(repository, ConsoleMailTransport::new(), reminder_config, &config.reminders).await
        }
        None => {
            warn!("SMTP_HOST not set; reminder mail is only logged");
            run(repository, ConsoleMailTransport::new(), reminder_config, &config.reminders).await
        }
    }
}

async fn run<M: MailTransport>(
    repository: PostgresCapsuleRepository,
    mail: M,
    config: ReminderConfig,
    schedule: &ReminderSchedule,
) -> Result<(), Box<dyn std::error::Error>> {
    let dispatcher = ReminderDispatcher::new(repository, mail, SystemClock, config);

    let Some(interval_secs) = schedule.interval_secs else {
        let report = dispatcher.dispatch().await?;
        info!(
            capsules_marked = report.capsules_marked,
            recipients = report.recipients,
            "Reminder dispatch complete"
        );
        return Ok(());
    };

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    info!(interval_secs, "Dispatching reminders periodically");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = dispatcher.dispatch().await {
                    error!(error = %e, retryable = e.is_retryable(), "Reminder dispatch failed");
                }
            }
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
        }
    }
}
