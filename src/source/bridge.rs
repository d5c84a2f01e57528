//! MCP bridge source
//!
//! The bridge is a small Node.js program that exposes the Payday MCP tools
//! on the command line: `node scripts/mcp_bridge.js <tool> <json args>`.
//! It prints a single JSON object `{ "ok": bool, "data": ..., "error": ... }`
//! to stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::process::Command;
use tracing::debug;

use super::{PageRequest, RecordSource};
use crate::error::{Error, Result};
use crate::resources::Resource;

/// Keys under which collection tools nest their records
const NESTED_KEYS: &[&str] = &["customers", "invoices", "expenses"];

/// Envelope printed by the bridge
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeResponse {
    /// Did the tool call succeed
    #[serde(default)]
    pub ok: bool,
    /// Tool payload
    #[serde(default)]
    pub data: Value,
    /// Error message when `ok` is false
    #[serde(default)]
    pub error: Option<Value>,
}

/// Fetches records by running the MCP bridge subprocess
#[derive(Debug, Clone)]
pub struct BridgeSource {
    command: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl BridgeSource {
    /// Create a bridge source from a command line (program and leading args)
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::invalid_value("bridge_command", "must not be empty"));
        }
        Ok(Self {
            command,
            working_dir: None,
        })
    }

    /// Run the bridge from this directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Check that the bridge script named on the command line exists
    pub fn check_ready(&self) -> Result<()> {
        for arg in self.command.iter().skip(1) {
            if !is_script(arg) {
                continue;
            }
            let path = match &self.working_dir {
                Some(dir) => dir.join(arg),
                None => PathBuf::from(arg),
            };
            if !path.exists() {
                return Err(Error::FileNotFound {
                    path: path.display().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Call a bridge tool and return its `data` payload
    pub async fn call_tool(&self, tool: &str, args: &Value) -> Result<Value> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or_else(|| Error::invalid_value("bridge_command", "must not be empty"))?;

        let mut cmd = Command::new(program);
        cmd.args(leading)
            .arg(tool)
            .arg(args.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!("Calling bridge tool {} with {}", tool, args);
        let output = cmd
            .output()
            .await
            .map_err(|e| Error::bridge(tool, format!("failed to start bridge: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::bridge(
                tool,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_response(tool, &stdout)
    }
}

#[async_trait]
impl RecordSource for BridgeSource {
    fn source_tag(&self) -> &'static str {
        "payday-mcp"
    }

    fn endpoint(&self, resource: &Resource) -> Result<String> {
        resource
            .tool
            .map(str::to_string)
            .ok_or_else(|| Error::config(format!("resource '{}' has no bridge tool", resource.name)))
    }

    async fn fetch_page(&self, resource: &Resource, request: &PageRequest) -> Result<Vec<Value>> {
        let tool = self.endpoint(resource)?;
        let data = self.call_tool(&tool, &tool_args(request)).await?;
        Ok(normalize_bridge_data(data))
    }
}

/// Build the JSON argument object for a tool call
fn tool_args(request: &PageRequest) -> Value {
    let mut args = Map::new();
    if let Some(page) = request.page {
        args.insert("page".into(), json!(page));
    }
    if let Some(size) = request.page_size {
        args.insert("perpage".into(), json!(size));
    }
    if let Some(window) = request.window {
        args.insert("dateFrom".into(), json!(window.from.format("%Y-%m-%d").to_string()));
        args.insert("dateTo".into(), json!(window.to.format("%Y-%m-%d").to_string()));
    }
    Value::Object(args)
}

/// Parse bridge stdout into the tool payload
fn parse_response(tool: &str, stdout: &str) -> Result<Value> {
    let stdout = stdout.trim();
    if stdout.is_empty() {
        return Err(Error::bridge(tool, "Empty response from MCP tool"));
    }

    let response: BridgeResponse = serde_json::from_str(stdout)
        .map_err(|e| Error::bridge(tool, format!("Invalid JSON: {e}")))?;

    if !response.ok {
        let message = match response.error {
            Some(Value::String(s)) => s,
            Some(Value::Null) | None => "unknown error".to_string(),
            Some(other) => other.to_string(),
        };
        return Err(Error::bridge(tool, message));
    }

    Ok(response.data)
}

/// Normalise a bridge payload to a list of records
///
/// Arrays pass through. Objects holding a `customers`, `invoices` or
/// `expenses` array yield that array; any other object is one record.
pub fn normalize_bridge_data(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            for key in NESTED_KEYS {
                if let Some(Value::Array(_)) = map.get(*key) {
                    if let Some(Value::Array(items)) = map.remove(*key) {
                        return items;
                    }
                }
            }
            vec![Value::Object(map)]
        }
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

fn is_script(arg: &str) -> bool {
    let ext = Path::new(arg).extension().and_then(|e| e.to_str());
    matches!(ext, Some("js" | "mjs" | "cjs" | "ts"))
}
