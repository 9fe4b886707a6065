//! Function registry: the process-wide table of invocable tools.
//!
//! Descriptors are registered once during startup and the whole table is
//! then frozen behind an `Arc` in `AppState`, so request-time lookups are
//! plain reads with no locking.  Re-registering a name replaces the earlier
//! descriptor (last registration wins); the replacement is logged so a
//! startup misconfiguration is visible.

use std::sync::Arc;

use ahash::AHashMap;
use serde_json::{Map, Value};

/// Expected shape of one declared parameter value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    Any,
}

impl ParamType {
    /// Human-readable tag used in binding diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Float => "number",
            ParamType::Boolean => "boolean",
            ParamType::Object => "object",
            ParamType::Array => "array",
            ParamType::Any => "any",
        }
    }
}

/// One declared parameter: name, expected type and whether the caller must
/// supply it.  Optional parameters may carry a default applied at binding.
#[derive(Clone, Debug)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, ty: ParamType, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
            default,
        }
    }
}

/// Implementation behind a registered function.  A handler may complete
/// immediately or suspend on its own I/O; the dispatcher awaits either
/// uniformly.  Arguments arrive already bound against the declared
/// parameters.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    async fn invoke(&self, args: Map<String, Value>) -> anyhow::Result<Value>;
}

/// One invocable tool: unique name, parameter schema and implementation.
#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub handler: Arc<dyn ToolHandler>,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        params: Vec<ParamSpec>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            handler,
        }
    }
}

/// Name → descriptor table.
#[derive(Default)]
pub struct FunctionRegistry {
    table: AHashMap<String, Arc<FunctionDescriptor>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor under its name.  Last registration wins.
    pub fn register(&mut self, descriptor: FunctionDescriptor) {
        let name = descriptor.name.clone();
        if self
            .table
            .insert(name.clone(), Arc::new(descriptor))
            .is_some()
        {
            tracing::warn!(function = %name, "function re-registered, previous descriptor replaced");
        }
    }

    /// Read-only lookup; safe for concurrent readers once startup is done.
    pub fn lookup(&self, name: &str) -> Option<Arc<FunctionDescriptor>> {
        self.table.get(name).cloned()
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Returns true if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Registered function names, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.table.keys().map(String::as_str).collect()
    }
}
