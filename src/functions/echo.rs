//! Smoke-test tool: accepts three values and echoes them back.  Useful for
//! exercising the binding path end to end without side effects.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{json, Map, Value};

use crate::registry::{FunctionDescriptor, ParamSpec, ParamType, ToolHandler};

pub struct AcceptTestValues;

#[async_trait::async_trait]
impl ToolHandler for AcceptTestValues {
    async fn invoke(&self, args: Map<String, Value>) -> anyhow::Result<Value> {
        let value_one = args
            .get("value_one")
            .and_then(Value::as_str)
            .context("value_one missing after binding")?;
        let value_two = args
            .get("value_two")
            .and_then(Value::as_str)
            .context("value_two missing after binding")?;
        let value_three = args
            .get("value_three")
            .and_then(Value::as_str)
            .context("value_three missing after binding")?;
        Ok(json!({
            "value_one": value_one,
            "value_two": value_two,
            "value_three": value_three,
        }))
    }
}

pub fn descriptor() -> FunctionDescriptor {
    FunctionDescriptor::new(
        "accept_test_values",
        vec![
            ParamSpec::required("value_one", ParamType::String),
            ParamSpec::required("value_two", ParamType::String),
            ParamSpec::required("value_three", ParamType::String),
        ],
        Arc::new(AcceptTestValues),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_inputs() {
        let mut args = Map::new();
        args.insert("value_one".to_string(), json!("a"));
        args.insert("value_two".to_string(), json!("b"));
        args.insert("value_three".to_string(), json!("c"));
        let out = AcceptTestValues.invoke(args).await.unwrap();
        assert_eq!(
            out,
            json!({"value_one": "a", "value_two": "b", "value_three": "c"})
        );
    }
}
