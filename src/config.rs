use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, anyhow};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::info;

use crate::{
    media::MediaLimits,
    schedule::{Schedule, Window},
};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub public_url: String,
    /// `memory` keeps everything in process.
    pub database_url: String,
    pub media_dir: PathBuf,
    pub client_secrets: PathBuf,
    pub schedule: Schedule,
    pub limits: MediaLimits,
    pub clock_override: Option<OffsetDateTime>,
    pub session_idle_minutes: i64,
}

impl Config {
    /// Environment first, then `.env`, then defaults.
    pub fn load() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| -> String {
            lookup(key).unwrap_or_else(|| {
                info!("{key} not set, using default: {default}");
                default.to_owned()
            })
        };

        let window = |opens: &str, opens_default: &str, closes: &str, closes_default: &str| {
            let start = parse_time(opens, &var(opens, opens_default))?;
            let end = parse_time(closes, &var(closes, closes_default))?;
            Window::new(start, end).ok_or_else(|| anyhow!("{opens} must not be after {closes}"))
        };

        let schedule = Schedule {
            upload: window("UPLOAD_OPENS", "2025-10-20T00:00:00-04:00", "UPLOAD_CLOSES", "2025-10-31T12:00:00-04:00")?,
            voting: window("VOTING_OPENS", "2025-10-31T12:00:00-04:00", "VOTING_CLOSES", "2025-10-31T23:59:59-04:00")?,
            reveal: parse_time("RESULTS_REVEAL", &var("RESULTS_REVEAL", "2025-11-01T00:00:00-04:00"))?,
        };

        let limits = MediaLimits {
            max_upload_bytes: parse("MAX_UPLOAD_BYTES", &var("MAX_UPLOAD_BYTES", "52428800"))?,
            max_image_dimension: parse("MAX_IMAGE_DIMENSION", &var("MAX_IMAGE_DIMENSION", "1280"))?,
            image_budget_bytes: parse("IMAGE_BUDGET_BYTES", &var("IMAGE_BUDGET_BYTES", "1048576"))?,
        };

        let clock_override = match lookup("CLOCK_OVERRIDE") {
            Some(at) => Some(parse_time("CLOCK_OVERRIDE", &at)?),
            None => None,
        };

        Ok(Self {
            bind_addr: var("BIND_ADDR", "0.0.0.0:8080"),
            public_url: var("PUBLIC_URL", "http://localhost:8080").trim_end_matches('/').to_owned(),
            database_url: var("DATABASE_URL", "sqlite://contest.db?mode=rwc"),
            media_dir: var("MEDIA_DIR", "media").into(),
            client_secrets: var("CLIENT_SECRETS", "client_secret.json").into(),
            schedule,
            limits,
            clock_override,
            session_idle_minutes: parse("SESSION_IDLE_MINUTES", &var("SESSION_IDLE_MINUTES", "60"))?,
        })
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value {value:?}: {e}"))
}

fn parse_time(key: &str, value: &str) -> anyhow::Result<OffsetDateTime> {
    OffsetDateTime::parse(value.trim(), &Rfc3339).with_context(|| format!("Invalid {key} timestamp {value:?}"))
}
