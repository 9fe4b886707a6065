//! Shared test support.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};

use toolgate::redact::default_sensitive_set;
use toolgate::{AppConfig, Level, NotifyConfig};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Holds the process-wide environment lock and restores every touched
/// variable on drop.  Tests that read or write environment configuration go
/// through this so they cannot race each other.
#[allow(dead_code)]
pub struct ScopedEnv {
    saved: HashMap<String, Option<String>>,
    _guard: MutexGuard<'static, ()>,
}

#[allow(dead_code)]
impl ScopedEnv {
    pub fn lock() -> Self {
        let guard = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            saved: HashMap::new(),
            _guard: guard,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.save(key);
        std::env::set_var(key, value);
    }

    pub fn unset(&mut self, key: &str) {
        self.save(key);
        std::env::remove_var(key);
    }

    fn save(&mut self, key: &str) {
        self.saved
            .entry(key.to_string())
            .or_insert_with(|| std::env::var(key).ok());
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, original) in self.saved.drain() {
            match original {
                Some(value) => std::env::set_var(&key, value),
                None => std::env::remove_var(&key),
            }
        }
    }
}

/// Configuration with all log sinks pointed into `dir` and rotation
/// disabled.  Tests adjust individual fields as needed.
#[allow(dead_code)]
pub fn test_config(dir: &Path) -> AppConfig {
    AppConfig {
        min_level: Level::Debug,
        use_json_only: true,
        use_text_file_log: false,
        log_json_path: dir.join("json_app.log").to_string_lossy().into_owned(),
        log_file_path: dir.join("app.log").to_string_lossy().into_owned(),
        error_log_path: dir.join("error.log").to_string_lossy().into_owned(),
        max_log_bytes: 0,
        log_backup_count: 3,
        log_rotate_compress: false,
        sensitive_fields: default_sensitive_set(),
        max_request_bytes: None,
        notify: NotifyConfig {
            api_base: "http://127.0.0.1:9".to_string(),
            bot_token: None,
            chat_ids: Vec::new(),
        },
    }
}
