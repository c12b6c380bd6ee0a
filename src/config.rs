use serde::Deserialize;
use teloxide::types::UserId;

const DEFAULT_DATABASE_URL: &str = "sqlite://videos.db";

/// Process configuration read from the environment (and `.env`, if present).
#[derive(Clone, Deserialize)]
pub struct Config {
    /// `TG_TOKEN`
    pub tg_token: String,
    /// `ADMIN_ID`, the only user allowed to upload videos.
    pub admin_id: u64,
    /// `DATABASE_URL`
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    pub fn admin_id(&self) -> UserId {
        UserId(self.admin_id)
    }
}

// Keeps the token out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("tg_token", &"<redacted>")
            .field("admin_id", &self.admin_id)
            .field("database_url", &self.database_url)
            .finish()
    }
}
