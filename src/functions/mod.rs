//! Built-in registered functions.
//!
//! Each submodule contributes one descriptor.  `register_builtins` is the
//! single startup-time population point of the registry; nothing registers
//! after it returns.

use crate::config::AppConfig;
use crate::registry::FunctionRegistry;

pub mod echo;
pub mod notify;
pub mod pricing;

pub fn register_builtins(registry: &mut FunctionRegistry, config: &AppConfig) {
    registry.register(pricing::descriptor());
    registry.register(echo::descriptor());
    match notify::descriptor(&config.notify) {
        Some(descriptor) => registry.register(descriptor),
        None => {
            tracing::warn!("send_manager_notification disabled: NOTIFY_BOT_TOKEN not set");
        }
    }
}
