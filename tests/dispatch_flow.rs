#[path = "common/mod.rs"]
mod common;

use std::fs;
use std::path::{Path, PathBuf};

use common::test_config;
use serde_json::{json, Map, Value};
use toolgate::{build_state, DispatchError, DispatchRequest, Dispatcher};

fn request(function_name: &str, args: Value, request_id: &str) -> DispatchRequest {
    let args = match args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    DispatchRequest {
        function_name: function_name.to_string(),
        args,
        request_id: Some(request_id.to_string()),
    }
}

fn setup(dir: &Path) -> (Dispatcher, PathBuf, PathBuf) {
    let config = test_config(dir);
    let json_path = PathBuf::from(&config.log_json_path);
    let error_path = PathBuf::from(&config.error_log_path);
    let state = build_state(config).unwrap();
    (state.dispatcher, json_path, error_path)
}

fn read_records(path: &Path) -> Vec<Value> {
    let content = fs::read_to_string(path).unwrap_or_default();
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("valid JSON log line"))
        .collect()
}

#[tokio::test]
async fn not_found_produces_one_audit_event_and_no_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let (dispatcher, json_path, error_path) = setup(tmp.path());

    let result = dispatcher
        .dispatch(&request("does_not_exist", json!({}), "r-1"))
        .await;
    assert!(matches!(result, Err(DispatchError::NotFound { .. })));

    let records = read_records(&json_path);
    assert_eq!(records.len(), 1);
    let audit = &records[0];
    assert_eq!(audit["level"], json!("INFO"));
    assert_eq!(audit["action"], json!("function_dispatch_requested"));
    assert_eq!(audit["context"]["function_name"], json!("does_not_exist"));
    assert_eq!(audit["context"]["request_id"], json!("r-1"));

    // Lookup misses are caller input, not system faults.
    let errors = fs::read_to_string(&error_path).unwrap_or_default();
    assert!(errors.is_empty());
}

#[tokio::test]
async fn success_returns_value_and_leaves_audit_trail() {
    let tmp = tempfile::tempdir().unwrap();
    let (dispatcher, json_path, _) = setup(tmp.path());

    let result = dispatcher
        .dispatch(&request(
            "calculate_discounted_price",
            json!({"price": 100.0, "discount_percent": 10.0}),
            "r-2",
        ))
        .await
        .unwrap();
    assert_eq!(result, json!(90.0));

    let records = read_records(&json_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["action"], json!("function_dispatch_requested"));
    assert_eq!(
        records[0]["context"]["args"]["discount_percent"],
        json!(10.0)
    );
}

#[tokio::test]
async fn binding_failure_logs_error_with_raw_arguments() {
    let tmp = tempfile::tempdir().unwrap();
    let (dispatcher, json_path, error_path) = setup(tmp.path());

    let result = dispatcher
        .dispatch(&request(
            "calculate_discounted_price",
            json!({"price": "abc", "discount_percent": 10.0}),
            "r-3",
        ))
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidArguments { .. }));
    assert_eq!(err.kind(), "invalid_arguments");
    assert_eq!(err.client_message(), "Внутренняя ошибка при вызове функции");

    let records = read_records(&json_path);
    assert_eq!(records.len(), 2);
    let error = &records[1];
    assert_eq!(error["level"], json!("ERROR"));
    assert_eq!(error["action"], json!("function_invocation"));
    // `price` is not sensitive, so the raw value is preserved for debugging.
    assert_eq!(error["context"]["args"]["price"], json!("abc"));
    assert_eq!(error["context"]["request_id"], json!("r-3"));

    let errors = fs::read_to_string(&error_path).unwrap();
    assert!(errors.contains("[ERROR]"));
}

#[tokio::test]
async fn sensitive_arguments_are_masked_even_when_dispatch_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let (dispatcher, json_path, _) = setup(tmp.path());

    let result = dispatcher
        .dispatch(&request(
            "accept_test_values",
            json!({
                "value_one": "a",
                "value_two": "b",
                "value_three": "c",
                "tg_token": "secret-token-value"
            }),
            "r-4",
        ))
        .await;
    assert!(matches!(
        result,
        Err(DispatchError::InvalidArguments { .. })
    ));

    let raw = fs::read_to_string(&json_path).unwrap();
    assert!(!raw.contains("secret-token-value"));
    let records = read_records(&json_path);
    for record in &records {
        assert_eq!(record["context"]["args"]["tg_token"], json!("****"));
    }
}

#[tokio::test]
async fn handler_fault_is_classified_and_logged_critical() {
    let tmp = tempfile::tempdir().unwrap();
    let (dispatcher, json_path, error_path) = setup(tmp.path());

    let result = dispatcher
        .dispatch(&request(
            "calculate_discounted_price",
            json!({"price": 10.0, "discount_percent": 150.0}),
            "r-5",
        ))
        .await;
    let err = result.unwrap_err();
    assert!(matches!(err, DispatchError::Internal { .. }));
    assert_eq!(err.kind(), "internal");
    assert_eq!(err.client_message(), "Внутренняя ошибка при вызове функции");

    let records = read_records(&json_path);
    assert_eq!(records.len(), 2);
    let fault = &records[1];
    assert_eq!(fault["level"], json!("CRITICAL"));
    assert!(fault["context"]["error"]
        .as_str()
        .unwrap()
        .contains("discount_percent"));

    let errors = fs::read_to_string(&error_path).unwrap();
    assert!(errors.contains("[CRITICAL]"));
}

#[tokio::test]
async fn unknown_extra_argument_is_a_binding_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let (dispatcher, _, _) = setup(tmp.path());

    let result = dispatcher
        .dispatch(&request(
            "calculate_discounted_price",
            json!({"price": 10.0, "discount_percent": 5.0, "coupon": "YES"}),
            "r-6",
        ))
        .await;
    assert!(matches!(
        result,
        Err(DispatchError::InvalidArguments { .. })
    ));
}

#[tokio::test]
async fn concurrent_dispatches_do_not_interfere() {
    let tmp = tempfile::tempdir().unwrap();
    let (dispatcher, _, _) = setup(tmp.path());

    let ok_req = request(
        "calculate_discounted_price",
        json!({"price": 80.0, "discount_percent": 25.0}),
        "r-7",
    );
    let faulty_req = request(
        "calculate_discounted_price",
        json!({"price": -5.0, "discount_percent": 25.0}),
        "r-8",
    );
    let ok = dispatcher.dispatch(&ok_req);
    let faulty = dispatcher.dispatch(&faulty_req);
    let (ok, faulty) = tokio::join!(ok, faulty);
    assert_eq!(ok.unwrap(), json!(60.0));
    assert!(matches!(faulty, Err(DispatchError::Internal { .. })));
}
