//! Dispatch engine: name resolution, argument binding and fault-contained
//! invocation of registered functions.
//!
//! This module is the error boundary of the gateway.  Nothing below it (the
//! registry, the handlers) raises past it: every outcome of a dispatch is a
//! classified [`DispatchError`] or a value, and the original fault text of a
//! failed handler stays in the server log, never in the response.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::logging::{EventLogger, Level};
use crate::registry::{FunctionRegistry, ParamSpec, ParamType};

/// One inbound invocation, as decoded by the gateway.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct DispatchRequest {
    pub function_name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    #[serde(default)]
    pub request_id: Option<String>,
}

/// Classified dispatch failure.  The variant decides both the log treatment
/// and the opaque message returned to the caller.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("function '{name}' not found")]
    NotFound { name: String },
    #[error("invalid arguments: {reason}")]
    InvalidArguments { reason: String },
    #[error("internal error invoking function: {message}")]
    Internal { message: String },
}

impl DispatchError {
    /// Fixed message shown to the caller.  Binding and invocation faults are
    /// deliberately indistinguishable from the outside; the diagnostic stays
    /// in the server log.
    pub fn client_message(&self) -> String {
        match self {
            DispatchError::NotFound { name } => format!("Функция '{name}' не найдена."),
            _ => "Внутренняя ошибка при вызове функции".to_string(),
        }
    }

    /// Short machine tag used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            DispatchError::NotFound { .. } => "not_found",
            DispatchError::InvalidArguments { .. } => "invalid_arguments",
            DispatchError::Internal { .. } => "internal",
        }
    }
}

/// Validate and coerce raw caller arguments against the declared parameters.
///
/// Unknown keys and missing required parameters are rejected.  JSON numbers
/// coerce between integer and float representations when lossless; every
/// other cross-type value is a structural mismatch.  Optional parameters
/// absent from the input receive their default, if declared.
pub fn bind_arguments(
    params: &[ParamSpec],
    args: &Map<String, Value>,
) -> Result<Map<String, Value>, String> {
    for key in args.keys() {
        if !params.iter().any(|p| p.name == *key) {
            return Err(format!("unexpected argument '{key}'"));
        }
    }
    let mut bound = Map::new();
    for param in params {
        match args.get(&param.name) {
            Some(value) => {
                let coerced = coerce(value, param.ty).ok_or_else(|| {
                    format!(
                        "argument '{}' is not a valid {}",
                        param.name,
                        param.ty.label()
                    )
                })?;
                bound.insert(param.name.clone(), coerced);
            }
            None if param.required => {
                return Err(format!("missing required argument '{}'", param.name));
            }
            None => {
                if let Some(default) = &param.default {
                    bound.insert(param.name.clone(), default.clone());
                }
            }
        }
    }
    Ok(bound)
}

fn coerce(value: &Value, ty: ParamType) -> Option<Value> {
    match ty {
        ParamType::Any => Some(value.clone()),
        ParamType::String => value.is_string().then(|| value.clone()),
        ParamType::Boolean => value.is_boolean().then(|| value.clone()),
        ParamType::Object => value.is_object().then(|| value.clone()),
        ParamType::Array => value.is_array().then(|| value.clone()),
        ParamType::Float => value.is_number().then(|| value.clone()),
        ParamType::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
            Value::Number(n) => {
                let f = n.as_f64()?;
                (f.fract() == 0.0 && f.abs() <= i64::MAX as f64).then(|| Value::from(f as i64))
            }
            _ => None,
        },
    }
}

/// Drives the full lookup → bind → invoke path for one request.  Shared by
/// the HTTP gateway and tests; holds only `Arc`s and is cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<FunctionRegistry>,
    logger: Arc<EventLogger>,
}

impl Dispatcher {
    pub fn new(registry: Arc<FunctionRegistry>, logger: Arc<EventLogger>) -> Self {
        Self { registry, logger }
    }

    /// Resolve and invoke one request.  Exactly one attempt is made; the
    /// audit event is emitted before resolution so every request leaves a
    /// trace even when it never reaches a handler.
    pub async fn dispatch(&self, req: &DispatchRequest) -> Result<Value, DispatchError> {
        let request_id = req.request_id.as_deref().unwrap_or("");
        self.logger.emit(
            Level::Info,
            "function_dispatch_requested",
            "tool invocation received",
            json!({
                "function_name": req.function_name,
                "args": Value::Object(req.args.clone()),
                "request_id": request_id,
            }),
        );

        let Some(descriptor) = self.registry.lookup(&req.function_name) else {
            // Unknown names are expected caller input, not a system fault.
            return Err(DispatchError::NotFound {
                name: req.function_name.clone(),
            });
        };

        let bound = match bind_arguments(&descriptor.params, &req.args) {
            Ok(bound) => bound,
            Err(reason) => {
                self.logger.emit(
                    Level::Error,
                    "function_invocation",
                    "argument binding failed",
                    json!({
                        "function_name": req.function_name,
                        "args": Value::Object(req.args.clone()),
                        "request_id": request_id,
                        "error": reason,
                    }),
                );
                return Err(DispatchError::InvalidArguments { reason });
            }
        };

        // The handler runs in its own task so a panic is contained in the
        // JoinError instead of tearing down this dispatch path.
        let handler = descriptor.handler.clone();
        let invocation = tokio::spawn(async move { handler.invoke(bound).await });
        match invocation.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                self.logger.emit(
                    Level::Critical,
                    "function_invocation",
                    "function raised an error",
                    json!({
                        "function_name": req.function_name,
                        "args": Value::Object(req.args.clone()),
                        "request_id": request_id,
                        "error": message,
                    }),
                );
                Err(DispatchError::Internal { message })
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    "function panicked".to_string()
                } else {
                    join_err.to_string()
                };
                self.logger.emit(
                    Level::Critical,
                    "function_invocation",
                    "function aborted before completion",
                    json!({
                        "function_name": req.function_name,
                        "request_id": request_id,
                        "error": message,
                    }),
                );
                Err(DispatchError::Internal { message })
            }
        }
    }
}
