use std::collections::HashSet;
use std::env;

use anyhow::{anyhow, Result};

use crate::logging::Level;
use crate::redact::default_sensitive_set;

/// Settings for the built-in manager-notification function.  The function is
/// registered only when a bot token is configured.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub api_base: String,
    pub bot_token: Option<String>,
    pub chat_ids: Vec<i64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub min_level: Level,
    pub use_json_only: bool,
    pub use_text_file_log: bool,
    pub log_json_path: String,
    pub log_file_path: String,
    pub error_log_path: String,
    /// Rotation threshold in bytes, resolved from `MAX_LOG_SIZE_MB`.  Zero
    /// disables rotation.
    pub max_log_bytes: u64,
    pub log_backup_count: usize,
    pub log_rotate_compress: bool,
    pub sensitive_fields: HashSet<String>,
    pub max_request_bytes: Option<usize>,
    pub notify: NotifyConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let min_level = match env::var("LOG_LEVEL") {
            Ok(raw) if !raw.trim().is_empty() => match Level::parse(&raw) {
                Some(level) => level,
                None => {
                    tracing::warn!(value = %raw, "unknown LOG_LEVEL, falling back to debug");
                    Level::Debug
                }
            },
            _ => Level::Debug,
        };

        let use_json_only = parse_bool_env("USE_JSON_ONLY")?.unwrap_or(true);
        let use_text_file_log = parse_bool_env("USE_TEXT_FILE_LOG")?.unwrap_or(false);

        let log_json_path =
            env::var("LOG_JSON_PATH").unwrap_or_else(|_| "logs/json_app.log".to_string());
        let log_file_path =
            env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/app.log".to_string());
        let error_log_path =
            env::var("ERROR_LOG_PATH").unwrap_or_else(|_| "logs/error.log".to_string());

        let max_log_bytes = parse_optional_u64("MAX_LOG_SIZE_MB")?.unwrap_or(5) * 1024 * 1024;
        let log_backup_count = parse_optional_u64("LOG_BACKUP_COUNT")?.unwrap_or(3) as usize;
        let log_rotate_compress = parse_bool_env("LOG_ROTATE_COMPRESS")?.unwrap_or(false);

        let sensitive_fields = env::var("SENSITIVE_FIELDS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect::<HashSet<_>>()
            })
            .filter(|set: &HashSet<String>| !set.is_empty())
            .unwrap_or_else(default_sensitive_set);

        let max_request_bytes = parse_optional_u64("MAX_REQUEST_BYTES")?.map(|v| v as usize);

        let notify = NotifyConfig {
            api_base: env::var("NOTIFY_API_BASE")
                .unwrap_or_else(|_| "https://api.telegram.org".to_string()),
            bot_token: env::var("NOTIFY_BOT_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            chat_ids: parse_chat_ids()?,
        };

        Ok(Self {
            min_level,
            use_json_only,
            use_text_file_log,
            log_json_path,
            log_file_path,
            error_log_path,
            max_log_bytes,
            log_backup_count,
            log_rotate_compress,
            sensitive_fields,
            max_request_bytes,
            notify,
        })
    }
}

fn parse_chat_ids() -> Result<Vec<i64>> {
    match env::var("NOTIFY_CHAT_IDS") {
        Ok(raw) => raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| anyhow!("NOTIFY_CHAT_IDS entry '{}' is not an integer", s))
            })
            .collect(),
        Err(env::VarError::NotPresent) => Ok(Vec::new()),
        Err(err) => Err(err.into()),
    }
}

fn parse_optional_u64(var: &str) -> Result<Option<u64>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| anyhow!("{} must be a positive integer", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool_env(var: &str) -> Result<Option<bool>> {
    match env::var(var) {
        Ok(value) if !value.trim().is_empty() => parse_bool(&value)
            .map(Some)
            .ok_or_else(|| anyhow!("{} must be a boolean (true/false/1/0)", var)),
        Ok(_) => Ok(None),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
