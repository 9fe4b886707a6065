//! Manager notification over a Telegram-style bot API.
//!
//! Renders a contact card from the caller-supplied fields and delivers it to
//! every configured manager chat concurrently.  The bot token and chat ids
//! come from configuration; without a token the tool is not registered.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Map, Value};

use crate::config::NotifyConfig;
use crate::registry::{FunctionDescriptor, ParamSpec, ParamType, ToolHandler};

pub struct SendManagerNotification {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_ids: Vec<i64>,
}

/// Escape text for the HTML parse mode of the chat API.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

#[async_trait::async_trait]
impl ToolHandler for SendManagerNotification {
    async fn invoke(&self, args: Map<String, Value>) -> anyhow::Result<Value> {
        let phone_number = args
            .get("phone_number")
            .and_then(Value::as_str)
            .context("phone_number missing after binding")?;
        let additional_info = args
            .get("additional_info")
            .and_then(Value::as_str)
            .context("additional_info missing after binding")?;
        let client_name = args
            .get("client_name")
            .and_then(Value::as_str)
            .context("client_name missing after binding")?;

        let message = format!(
            "📞 <b>Новый контакт:</b>\n<b>Номер:</b> {}\n<b>Имя клиента:</b> {}\n<b>Инфо:</b> {}",
            escape_html(phone_number),
            escape_html(client_name),
            escape_html(additional_info),
        );
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.bot_token
        );

        let mut sends = Vec::with_capacity(self.chat_ids.len());
        for &chat_id in &self.chat_ids {
            let client = self.client.clone();
            let url = url.clone();
            let body = json!({
                "chat_id": chat_id,
                "text": message.clone(),
                "parse_mode": "HTML",
            });
            sends.push(tokio::spawn(async move {
                match client.post(&url).json(&body).send().await {
                    Ok(resp) => json!({"chat_id": chat_id, "status": resp.status().as_u16()}),
                    Err(err) => json!({"chat_id": chat_id, "error": err.to_string()}),
                }
            }));
        }
        let mut deliveries = Vec::with_capacity(sends.len());
        for send in sends {
            deliveries.push(
                send.await
                    .unwrap_or_else(|err| json!({"error": err.to_string()})),
            );
        }
        Ok(Value::Array(deliveries))
    }
}

/// Descriptor for `send_manager_notification`, or `None` when no bot token
/// is configured.
pub fn descriptor(config: &NotifyConfig) -> Option<FunctionDescriptor> {
    let bot_token = config.bot_token.clone()?;
    Some(FunctionDescriptor::new(
        "send_manager_notification",
        vec![
            ParamSpec::required("phone_number", ParamType::String),
            ParamSpec::required("additional_info", ParamType::String),
            ParamSpec::required("client_name", ParamType::String),
        ],
        Arc::new(SendManagerNotification {
            client: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            bot_token,
            chat_ids: config.chat_ids.clone(),
        }),
    ))
}
