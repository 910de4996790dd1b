use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use chatline_core::{ClientConfig, ConversationScheme};

pub const DEFAULT_JWT_SECRET: &str = "dev-secret-change-me";
pub const DEFAULT_LOG_FILTER: &str =
    "chatline=info,chatline_core=info,chatline_db=info,chatline_auth=info";

const DEFAULT_DB_PATH: &str = "chatline.db";
const DEFAULT_SESSION_FILE: &str = ".chatline-session.json";
const DEFAULT_SESSION_TTL_HOURS: i64 = 720;

pub struct Settings {
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub session_ttl: chrono::Duration,
    pub session_file: PathBuf,
    pub client: ClientConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let ttl_hours = match var("CHATLINE_SESSION_TTL_HOURS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|hours| *hours > 0)
                .ok_or_else(|| anyhow!("expected a positive number of hours, got '{raw}'"))
                .context("Invalid CHATLINE_SESSION_TTL_HOURS")?,
            None => DEFAULT_SESSION_TTL_HOURS,
        };

        let mut client = ClientConfig::default();
        if let Some(raw) = var("CHATLINE_CONVERSATION_SCHEME") {
            client.conversation_scheme = raw
                .parse::<ConversationScheme>()
                .map_err(|e| anyhow!(e))
                .context("Invalid CHATLINE_CONVERSATION_SCHEME")?;
        }
        if let Some(raw) = var("CHATLINE_LOOKUP_CONCURRENCY") {
            client.lookup_concurrency = raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid CHATLINE_LOOKUP_CONCURRENCY '{raw}'"))?;
        }

        Ok(Self {
            db_path: var("CHATLINE_DB_PATH")
                .unwrap_or_else(|| DEFAULT_DB_PATH.into())
                .into(),
            jwt_secret: var("CHATLINE_JWT_SECRET").unwrap_or_else(|| DEFAULT_JWT_SECRET.into()),
            session_ttl: chrono::Duration::hours(ttl_hours),
            session_file: var("CHATLINE_SESSION_FILE")
                .unwrap_or_else(|| DEFAULT_SESSION_FILE.into())
                .into(),
            client,
        })
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}
