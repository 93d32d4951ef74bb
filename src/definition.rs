//! Tool definition types
//!
//! The in-memory shape of a tool definition as reported by an MCP server:
//! a name, an optional human-readable description, and a JSON Schema for
//! the tool's input. This is the input shape for both the scanner and the
//! fingerprint engine; how the definitions were obtained (stdio, SSE, a
//! recorded file) is the caller's concern.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single tool definition from a server's `tools/list` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Definition {
    /// Tool name, unique within its server.
    pub name: String,

    /// Human-readable description shown to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's input. `null` when the server omits it.
    #[serde(default)]
    pub schema: Value,
}

impl Definition {
    pub fn new(name: impl Into<String>, description: Option<&str>, schema: Value) -> Self {
        Self {
            name: name.into(),
            description: description.map(str::to_string),
            schema,
        }
    }

    /// Description text used for scanning and hashing; missing descriptions
    /// are treated as empty.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}
