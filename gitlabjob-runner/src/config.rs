//! Runner configuration
//!
//! Settings are gathered once, in `main`, from command-line flags, the
//! process environment and an optional env file. The resulting [`Config`]
//! is handed to every component; nothing else reads process state.

use anyhow::{Context, Result};
use gitlabjob_core::GroupId;
use gitlabjob_core::domain::job::VAR_PROD_TAG;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use crate::service::deduplicator::{DEFAULT_COOLDOWN, DEFAULT_MAX_PASSES};

/// Sender used when `SMTP_FROM` is not set
pub const DEFAULT_SENDER: &str = "gitlabjob@mail.com";

/// Subject prefix used when `SMTP_SUBJECT` is not set
pub const DEFAULT_SUBJECT_PREFIX: &str = "[GitlabJob]";

/// Pause after each played job
pub const DEFAULT_DISPATCH_SETTLE: Duration = Duration::from_secs(1);

/// Raw key/value settings, keyed by their environment variable names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: HashMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), value.into());
    }

    /// Looks a key up; blank values count as unset
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Reads `KEY=VALUE` settings in dotenv syntax
    pub fn from_env_reader<R: Read>(reader: R) -> Result<Self> {
        Self::collect(dotenvy::from_read_iter(reader))
    }

    /// Reads an env file; a missing file yields empty settings
    pub fn load_env_file(path: &Path) -> Result<Self> {
        match dotenvy::from_path_iter(path) {
            Ok(iter) => Self::collect(iter)
                .with_context(|| format!("Failed to parse env file {}", path.display())),
            Err(e) if e.not_found() => Ok(Self::new()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to read env file {}", path.display()))
            }
        }
    }

    fn collect<R: Read>(iter: dotenvy::Iter<R>) -> Result<Self> {
        let mut settings = Self::new();
        for item in iter {
            let (key, value) = item?;
            settings.set(&key, value);
        }
        Ok(settings)
    }

    /// Layers `other` on top of `self`; non-blank values of `other` win
    pub fn overlay(mut self, other: Settings) -> Self {
        for (key, value) in other.values {
            if !value.trim().is_empty() {
                self.values.insert(key, value);
            }
        }
        self
    }

    fn seconds(&self, key: &str) -> Result<Option<Duration>> {
        self.get(key)
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds, got '{}'", key, raw))
            })
            .transpose()
    }
}

/// SMTP relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    /// `host` or `host:port`
    pub server: String,
    pub user: Option<String>,
    pub pass: Option<String>,
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// GitLab base URL (e.g., "https://gitlab.example.com")
    pub base_url: String,

    /// Private token sent with every request
    pub private_token: String,

    /// Project visited when no group is configured
    pub project_id: Option<String>,

    /// Group whose projects are all visited
    pub group_id: Option<GroupId>,

    /// Operator recipient(s), comma separated
    pub notify_to: Option<String>,

    /// Notification sender
    pub notify_from: String,

    /// Prefix of every notification subject
    pub subject_prefix: String,

    /// Pipeline variable holding the required release tag
    pub production_tag_key: String,

    /// SMTP relay; notifications are only logged when unset
    pub smtp: Option<SmtpSettings>,

    /// Maximum delete-then-refetch passes of the deduplicator
    pub dedup_max_passes: u32,

    /// Wait between deduplication passes
    pub dedup_cooldown: Duration,

    /// Wait after each played job
    pub dispatch_settle: Duration,

    /// Gateway request timeout; none means wait forever
    pub request_timeout: Option<Duration>,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(base_url: String, private_token: String) -> Self {
        Self {
            base_url,
            private_token,
            project_id: None,
            group_id: None,
            notify_to: None,
            notify_from: DEFAULT_SENDER.to_string(),
            subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string(),
            production_tag_key: VAR_PROD_TAG.to_string(),
            smtp: None,
            dedup_max_passes: DEFAULT_MAX_PASSES,
            dedup_cooldown: DEFAULT_COOLDOWN,
            dispatch_settle: DEFAULT_DISPATCH_SETTLE,
            request_timeout: None,
        }
    }

    /// Builds configuration from settings
    ///
    /// Recognised keys:
    /// - PRIVATE_TOKEN, BASE_URL (required)
    /// - PROJECT_ID, GROUP_ID, PRODUCTION_TAG_KEY (default: PROD_TAG)
    /// - SMTP_TO, SMTP_FROM, SMTP_SUBJECT
    /// - SMTP_SERVER, SMTP_USER, SMTP_PASS
    /// - DEDUP_MAX_PASSES (default: 5)
    /// - DEDUP_COOLDOWN, DISPATCH_SETTLE, REQUEST_TIMEOUT (seconds)
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let private_token = settings
            .get("PRIVATE_TOKEN")
            .ok_or_else(|| anyhow::anyhow!("PRIVATE_TOKEN is not set"))?;
        let base_url = settings
            .get("BASE_URL")
            .ok_or_else(|| anyhow::anyhow!("BASE_URL is not set"))?;

        let mut config = Self::new(base_url.to_string(), private_token.to_string());

        config.project_id = settings.get("PROJECT_ID").map(str::to_string);
        config.group_id = settings
            .get("GROUP_ID")
            .map(|raw| raw.parse::<GroupId>())
            .transpose()
            .context("GROUP_ID must be a numeric group id")?;

        if let Some(key) = settings.get("PRODUCTION_TAG_KEY") {
            config.production_tag_key = key.to_string();
        }

        config.notify_to = settings.get("SMTP_TO").map(str::to_string);
        if let Some(from) = settings.get("SMTP_FROM") {
            config.notify_from = from.to_string();
        }
        if let Some(prefix) = settings.get("SMTP_SUBJECT") {
            config.subject_prefix = prefix.to_string();
        }
        config.smtp = settings.get("SMTP_SERVER").map(|server| SmtpSettings {
            server: server.to_string(),
            user: settings.get("SMTP_USER").map(str::to_string),
            pass: settings.get("SMTP_PASS").map(str::to_string),
        });

        if let Some(raw) = settings.get("DEDUP_MAX_PASSES") {
            config.dedup_max_passes = raw
                .parse()
                .with_context(|| format!("DEDUP_MAX_PASSES must be a number, got '{}'", raw))?;
        }
        if let Some(cooldown) = settings.seconds("DEDUP_COOLDOWN")? {
            config.dedup_cooldown = cooldown;
        }
        if let Some(settle) = settings.seconds("DISPATCH_SETTLE")? {
            config.dispatch_settle = settle;
        }
        config.request_timeout = settings.seconds("REQUEST_TIMEOUT")?;

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.private_token.is_empty() {
            anyhow::bail!("private_token cannot be empty");
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            anyhow::bail!("base_url must start with http:// or https://");
        }

        if self.dedup_max_passes == 0 {
            anyhow::bail!("dedup_max_passes must be greater than 0");
        }

        if self.group_id.is_none() && self.project_id.is_none() {
            anyhow::bail!("either PROJECT_ID or GROUP_ID must be set");
        }

        if let Some(smtp) = &self.smtp {
            if smtp.user.is_some() != smtp.pass.is_some() {
                anyhow::bail!("SMTP_USER and SMTP_PASS must be set together");
            }
        }

        Ok(())
    }

    /// Operator recipients, split on commas
    pub fn operator_recipients(&self) -> Vec<String> {
        split_recipients(self.notify_to.as_deref().unwrap_or_default())
    }
}

pub fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
