#[path = "common/mod.rs"]
mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::extract::{Path as AxumPath, State};
use axum::routing::post;
use axum::{Json, Router};
use common::test_config;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener as TokioTcpListener;
use toolgate::functions::notify;
use toolgate::{DispatchRequest, Dispatcher, EventLogger, FunctionRegistry, NotifyConfig};

type Seen = Arc<Mutex<Vec<(String, Value)>>>;

async fn record_send(
    AxumPath(bot): AxumPath<String>,
    State(seen): State<Seen>,
    Json(body): Json<Value>,
) -> Json<Value> {
    seen.lock().unwrap().push((bot, body));
    Json(json!({ "ok": true }))
}

/// Spawns a stub chat API compatible with `POST /bot<token>/sendMessage`.
async fn spawn_stub_api() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new()
        .route("/:bot/sendMessage", post(record_send))
        .with_state(seen.clone());
    let listener = TokioTcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

#[tokio::test]
async fn notification_reaches_every_configured_chat() {
    let tmp = tempfile::tempdir().unwrap();
    let (api_base, seen) = spawn_stub_api().await;

    let notify_config = NotifyConfig {
        api_base,
        bot_token: Some("test-token".to_string()),
        chat_ids: vec![11, 22],
    };
    let logger = Arc::new(EventLogger::from_config(&test_config(tmp.path())));
    let mut registry = FunctionRegistry::new();
    registry.register(notify::descriptor(&notify_config).unwrap());
    let dispatcher = Dispatcher::new(Arc::new(registry), logger);

    let mut args = Map::new();
    args.insert("phone_number".to_string(), json!("+7 900 000-00-00"));
    args.insert(
        "additional_info".to_string(),
        json!("wants a <script>demo</script> & pricing"),
    );
    args.insert("client_name".to_string(), json!("Alice"));
    let request = DispatchRequest {
        function_name: "send_manager_notification".to_string(),
        args,
        request_id: Some("r-1".to_string()),
    };

    let result = dispatcher.dispatch(&request).await.unwrap();
    let deliveries = result.as_array().unwrap();
    assert_eq!(deliveries.len(), 2);
    for delivery in deliveries {
        assert_eq!(delivery["status"], json!(200));
    }

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let chat_ids: HashSet<i64> = seen
        .iter()
        .map(|(_, body)| body["chat_id"].as_i64().unwrap())
        .collect();
    assert_eq!(chat_ids, HashSet::from([11, 22]));
    for (bot, body) in seen.iter() {
        assert_eq!(bot, "bottest-token");
        assert_eq!(body["parse_mode"], json!("HTML"));
        let text = body["text"].as_str().unwrap();
        assert!(text.contains("+7 900 000-00-00"));
        assert!(text.contains("Alice"));
        // Caller-supplied markup must arrive escaped.
        assert!(text.contains("&lt;script&gt;demo&lt;/script&gt; &amp; pricing"));
        assert!(!text.contains("<script>"));
    }
}

#[tokio::test]
async fn unreachable_api_is_reported_per_recipient_not_raised() {
    let tmp = tempfile::tempdir().unwrap();
    let notify_config = NotifyConfig {
        // Nothing listens here; every send fails at the transport level.
        api_base: "http://127.0.0.1:9".to_string(),
        bot_token: Some("test-token".to_string()),
        chat_ids: vec![5],
    };
    let logger = Arc::new(EventLogger::from_config(&test_config(tmp.path())));
    let mut registry = FunctionRegistry::new();
    registry.register(notify::descriptor(&notify_config).unwrap());
    let dispatcher = Dispatcher::new(Arc::new(registry), logger);

    let mut args = Map::new();
    args.insert("phone_number".to_string(), json!("+7 900 000-00-00"));
    args.insert("additional_info".to_string(), json!("info"));
    args.insert("client_name".to_string(), json!("Bob"));
    let request = DispatchRequest {
        function_name: "send_manager_notification".to_string(),
        args,
        request_id: None,
    };

    // Delivery failures are data, not faults: the handler itself succeeds.
    let result = dispatcher.dispatch(&request).await.unwrap();
    let deliveries = result.as_array().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0]["chat_id"], json!(5));
    assert!(deliveries[0]["error"].as_str().is_some());
}
