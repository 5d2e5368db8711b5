//! Configuration types.
//!
//! Everything comes from environment variables. `from_lookup` takes the
//! variable source as a function so tests don't touch the process env.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::llm::LlmConfig;
use crate::mail::GoogleOAuthConfig;
use crate::model::UserId;
use crate::pipeline::claims::DEFAULT_RETENTION_DAYS;
use crate::pipeline::context::DEFAULT_MAX_CONTEXT_JOBS;

/// Gmail refuses `maxResults` above this.
const GMAIL_MAX_RESULTS: u32 = 500;

/// Upper bound for claim retention (ten years).
const MAX_RETENTION_DAYS: u32 = 3650;

/// Tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Tenant whose mailbox and jobs are processed.
    pub user_id: UserId,
    pub db_path: PathBuf,
    /// Run repeatedly on this interval; `None` runs a single pass.
    pub poll_interval: Option<Duration>,
    /// Delay after each reconciled email (classifier rate limit).
    pub pace: Duration,
    pub max_results: u32,
    /// Search recency window in days.
    pub window_days: u32,
    pub claim_retention_days: i64,
    pub max_context_jobs: usize,
    /// Optional directory for daily-rolling log files.
    pub log_dir: Option<PathBuf>,
    pub llm: LlmConfig,
    pub google: GoogleOAuthConfig,
}

impl TrackerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
        };
        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let bounded = |key: &str, default: u32, min: u32, max: u32| -> Result<u32, ConfigError> {
            let Some(raw) = lookup(key) else {
                return Ok(default);
            };
            match raw.trim().parse::<u32>() {
                Ok(n) if (min..=max).contains(&n) => Ok(n),
                _ => Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: format!("must be between {min} and {max}, got {raw:?}"),
                }),
            }
        };

        let gemini_api_key = required("GEMINI_API_KEY")?;
        let client_id = required("GOOGLE_CLIENT_ID")?;
        let client_secret = required("GOOGLE_CLIENT_SECRET")?;

        let max_results = bounded("JOBTRACK_MAX_RESULTS", 10, 1, GMAIL_MAX_RESULTS)?;
        let window_days = bounded("JOBTRACK_WINDOW_DAYS", 2, 1, u32::MAX)?;
        let claim_retention_days = bounded(
            "JOBTRACK_CLAIM_RETENTION_DAYS",
            DEFAULT_RETENTION_DAYS,
            1,
            MAX_RETENTION_DAYS,
        )?;

        let poll_interval = match parsed("JOBTRACK_POLL_INTERVAL_SECS") {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    key: "JOBTRACK_POLL_INTERVAL_SECS".into(),
                    message: "must be greater than zero".into(),
                });
            }
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let mut llm = LlmConfig::new(SecretString::from(gemini_api_key));
        if let Some(model) = lookup("GEMINI_MODEL").filter(|m| !m.trim().is_empty()) {
            llm.model = model.trim().to_string();
        }

        Ok(Self {
            user_id: UserId::new(
                lookup("JOBTRACK_USER_ID").unwrap_or_else(|| "demo-user".to_string()),
            ),
            db_path: PathBuf::from(
                lookup("JOBTRACK_DB_PATH")
                    .unwrap_or_else(|| "./data/job-tracker.db".to_string()),
            ),
            poll_interval,
            pace: Duration::from_secs(parsed("JOBTRACK_PACE_SECS").unwrap_or(15)),
            max_results,
            window_days,
            claim_retention_days: i64::from(claim_retention_days),
            max_context_jobs: parsed("JOBTRACK_MAX_CONTEXT_JOBS")
                .map(|n| n as usize)
                .unwrap_or(DEFAULT_MAX_CONTEXT_JOBS),
            log_dir: lookup("JOBTRACK_LOG_DIR").map(PathBuf::from),
            llm,
            google: GoogleOAuthConfig::new(client_id, SecretString::from(client_secret)),
        })
    }
}
