//! Template interpolation for SQL assets
//!
//! Handles `{{ variable }}` interpolation in the Silver/Gold scripts, e.g.
//! `read_csv('{{ paths.account_groups }}')`. Nested access uses dots.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            vars: Value::Object(serde_json::Map::new()),
        }
    }

    /// Create a context from a JSON object
    pub fn with_vars(vars: Value) -> Self {
        Self { vars }
    }

    /// Set a top-level variable
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        if !self.vars.is_object() {
            self.vars = Value::Object(serde_json::Map::new());
        }
        if let Value::Object(map) = &mut self.vars {
            map.insert(key.into(), value.into());
        }
        self
    }

    /// Get a value by path (e.g., "paths.bronze_dir")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut current = &self.vars;
        for part in path.split('.') {
            match current {
                Value::Object(map) => current = map.get(part)?,
                _ => return None,
            }
        }
        Some(current)
    }
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    render_with(template, ctx, |s| s.to_string())
}

/// Render a template for embedding in SQL string literals
///
/// Substituted values have single quotes doubled.
pub fn render_sql(template: &str, ctx: &TemplateContext) -> Result<String> {
    render_with(template, ctx, |s| s.replace('\'', "''"))
}

fn render_with(
    template: &str,
    ctx: &TemplateContext,
    escape: impl Fn(&str) -> String,
) -> Result<String> {
    let mut errors = Vec::new();

    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let var_path = &cap[1];
        match ctx.get(var_path) {
            Some(value) => escape(&value_to_string(value)),
            None => {
                errors.push(var_path.to_string());
                String::new()
            }
        }
    });

    if errors.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_simple_substitution() {
        let mut ctx = TemplateContext::new();
        ctx.set("bronze_dir", "data/bronze/payday");

        let result = render("read_json_auto('{{ bronze_dir }}/*.jsonl')", &ctx).unwrap();
        assert_eq!(result, "read_json_auto('data/bronze/payday/*.jsonl')");
    }

    #[test]
    fn test_nested_value() {
        let ctx = TemplateContext::with_vars(json!({
            "paths": {"gold_dir": "out/gold"}
        }));

        let result = render("COPY x TO '{{ paths.gold_dir }}/x.parquet'", &ctx).unwrap();
        assert_eq!(result, "COPY x TO 'out/gold/x.parquet'");
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = TemplateContext::new();
        let result = render("{{ paths.missing }}", &ctx);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("paths.missing"));
    }

    #[test]
    fn test_render_sql_escapes_quotes() {
        let mut ctx = TemplateContext::new();
        ctx.set("dir", "/home/o'brien/data");

        let result = render_sql("'{{ dir }}'", &ctx).unwrap();
        assert_eq!(result, "'/home/o''brien/data'");
    }

    #[test]
    fn test_number_substitution() {
        let mut ctx = TemplateContext::new();
        ctx.set("limit", 100).set("enabled", true);

        let result = render("limit={{ limit }}&enabled={{ enabled }}", &ctx).unwrap();
        assert_eq!(result, "limit=100&enabled=true");
    }

    #[test]
    fn test_whitespace_in_template() {
        let mut ctx = TemplateContext::new();
        ctx.set("key", "value");

        assert_eq!(render("{{key}}", &ctx).unwrap(), "value");
        assert_eq!(render("{{ key }}", &ctx).unwrap(), "value");
        assert_eq!(render("{{  key  }}", &ctx).unwrap(), "value");
    }
}
