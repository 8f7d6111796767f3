//! Configuration types, built from environment variables.

use std::time::Duration;

use chrono::NaiveDate;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Event details shown to users and used for reminder scheduling.
#[derive(Debug, Clone)]
pub struct EventConfig {
    pub name: String,
    /// Calendar date in "DD Month YYYY" form, e.g. "17 июня 2025" or "17 June 2025".
    pub date: String,
    pub location: String,
    /// Registration / details link.
    pub link: String,
    pub website: String,
    /// Contact printed under the welcome message for data-privacy questions.
    pub privacy_contact: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            name: "ESG TECH Forum".to_string(),
            date: "17 июня 2025".to_string(),
            location: "Москва, Точка кипения – Коммуна, 2-й Донской проезд, д. 9, стр. 3"
                .to_string(),
            link: "https://leader-id.ru/events/553947".to_string(),
            website: "https://esgtechforum.ru/".to_string(),
            privacy_contact: "info@esgtech.pro".to_string(),
        }
    }
}

impl EventConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env_or("EVENT_NAME", defaults.name),
            date: env_or("EVENT_DATE", defaults.date),
            location: env_or("EVENT_LOCATION", defaults.location),
            link: env_or("EVENT_LINK", defaults.link),
            website: env_or("EVENT_WEBSITE", defaults.website),
            privacy_contact: env_or("PRIVACY_CONTACT", defaults.privacy_contact),
        }
    }

    /// Parse the configured event date.
    pub fn event_date(&self) -> Result<NaiveDate, ConfigError> {
        parse_event_date(&self.date)
    }
}

/// Organizer contacts handed out on support requests.
#[derive(Debug, Clone)]
pub struct AdminContacts {
    pub telegram: String,
    pub email: String,
    pub phone: String,
}

impl Default for AdminContacts {
    fn default() -> Self {
        Self {
            telegram: "@LEXARKHOVA".to_string(),
            email: "info@esgtech.pro".to_string(),
            phone: "+79998221277".to_string(),
        }
    }
}

impl AdminContacts {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            telegram: env_or("ADMIN_TELEGRAM", defaults.telegram),
            email: env_or("ADMIN_EMAIL", defaults.email),
            phone: env_or("ADMIN_PHONE", defaults.phone),
        }
    }
}

/// Telegram Bot API credentials.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
}

impl TelegramConfig {
    /// Returns `None` if `TELEGRAM_BOT_TOKEN` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())?;
        Some(Self {
            bot_token: SecretString::from(token),
        })
    }
}

/// Twilio credentials for the WhatsApp channel.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Sender number, without the `whatsapp:` prefix.
    pub phone_number: String,
}

impl TwilioConfig {
    /// Returns `None` if `TWILIO_ACCOUNT_SID` is not set (outbound WhatsApp disabled).
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID")
            .ok()
            .filter(|s| !s.is_empty())?;
        Some(Self {
            account_sid,
            auth_token: SecretString::from(std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default()),
            phone_number: std::env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
        })
    }
}

/// SMTP settings for confirmation email copies.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
}

impl SmtpConfig {
    /// Returns `None` if `EMAIL_HOST_USER` is not set (email copies disabled).
    pub fn from_env() -> Option<Self> {
        let username = std::env::var("EMAIL_HOST_USER")
            .ok()
            .filter(|s| !s.is_empty())?;

        let host = env_or("EMAIL_HOST", "smtp.gmail.com".to_string());
        let port: u16 = std::env::var("EMAIL_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(465);
        let password = SecretString::from(std::env::var("EMAIL_HOST_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("EMAIL_FROM")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            from_address,
        })
    }
}

/// Everything the binaries need, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub event: EventConfig,
    pub admin: AdminContacts,
    pub telegram: Option<TelegramConfig>,
    pub twilio: Option<TwilioConfig>,
    pub smtp: Option<SmtpConfig>,
    pub port: u16,
    pub db_path: String,
    /// Upper bound for a single outbound send.
    pub notify_timeout: Duration,
    /// Optional cron expression for the in-process reminder ticker.
    pub reminder_cron: Option<String>,
}

impl Settings {
    /// Load `.env` (if present) and read all settings from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        // A missing .env file is fine; real deployments set variables directly.
        let _ = dotenvy::dotenv();

        let port = parse_env("REGISTRAR_PORT", 8000u16)?;
        let notify_timeout_secs = parse_env("NOTIFY_TIMEOUT_SECS", 15u64)?;

        let reminder_cron = std::env::var("REMINDER_CRON")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if let Some(ref expr) = reminder_cron {
            crate::reminders::next_run_after(expr, chrono::Utc::now()).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "REMINDER_CRON".into(),
                    message: e,
                }
            })?;
        }

        Ok(Self {
            event: EventConfig::from_env(),
            admin: AdminContacts::from_env(),
            telegram: TelegramConfig::from_env(),
            twilio: TwilioConfig::from_env(),
            smtp: SmtpConfig::from_env(),
            port,
            db_path: env_or("REGISTRAR_DB_PATH", "./data/registrar.db".to_string()),
            notify_timeout: Duration::from_secs(notify_timeout_secs),
            reminder_cron,
        })
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}

/// Russian month names, nominative and genitive.
const RU_MONTHS: [(&str, &str); 12] = [
    ("январь", "января"),
    ("февраль", "февраля"),
    ("март", "марта"),
    ("апрель", "апреля"),
    ("май", "мая"),
    ("июнь", "июня"),
    ("июль", "июля"),
    ("август", "августа"),
    ("сентябрь", "сентября"),
    ("октябрь", "октября"),
    ("ноябрь", "ноября"),
    ("декабрь", "декабря"),
];

/// Parse a "DD Month YYYY" date with an English or Russian month name.
pub fn parse_event_date(value: &str) -> Result<NaiveDate, ConfigError> {
    let err = || ConfigError::EventDate {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%d %B %Y") {
        return Ok(date);
    }

    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(err());
    };

    let day: u32 = day.parse().map_err(|_| err())?;
    let year: i32 = year.parse().map_err(|_| err())?;
    let month = month.to_lowercase();
    let month = RU_MONTHS
        .iter()
        .position(|(nominative, genitive)| *nominative == month || *genitive == month)
        .ok_or_else(err)?;

    NaiveDate::from_ymd_opt(year, month as u32 + 1, day).ok_or_else(err)
}
