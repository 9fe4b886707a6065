//! Price calculation tools.

use std::sync::Arc;

use anyhow::{bail, Context};
use serde_json::{Map, Value};

use crate::registry::{FunctionDescriptor, ParamSpec, ParamType, ToolHandler};

/// Applies a percentage discount to a price.
pub struct CalculateDiscountedPrice;

#[async_trait::async_trait]
impl ToolHandler for CalculateDiscountedPrice {
    async fn invoke(&self, args: Map<String, Value>) -> anyhow::Result<Value> {
        let price = args
            .get("price")
            .and_then(Value::as_f64)
            .context("price missing after binding")?;
        let discount_percent = args
            .get("discount_percent")
            .and_then(Value::as_f64)
            .context("discount_percent missing after binding")?;
        if price < 0.0 {
            bail!("price must be non-negative");
        }
        if !(0.0..=100.0).contains(&discount_percent) {
            bail!("discount_percent must be between 0 and 100");
        }
        let discounted = price * (1.0 - discount_percent / 100.0);
        Ok(Value::from(discounted))
    }
}

pub fn descriptor() -> FunctionDescriptor {
    FunctionDescriptor::new(
        "calculate_discounted_price",
        vec![
            ParamSpec::required("price", ParamType::Float),
            ParamSpec::required("discount_percent", ParamType::Float),
        ],
        Arc::new(CalculateDiscountedPrice),
    )
}
