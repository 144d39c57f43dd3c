//! Terminal rendering for command results.

use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};

pub struct CliLogger {
    json: bool,
    no_color: bool,
}

impl CliLogger {
    pub fn new(json: bool, no_color: bool) -> Self {
        Self { json, no_color }
    }

    pub fn print_serialized<T: Serialize>(&self, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        if self.json {
            println!("{}", serde_json::to_string(&value)?);
            return Ok(());
        }

        let mut out = String::new();
        if let Some(headline) = self.headline(&value) {
            out.push_str(&headline);
            out.push('\n');
        }
        out.push_str(&self.render_value(&value, 0));
        println!("{}", out.trim_end());
        Ok(())
    }

    pub fn print_error(&self, msg: &str) {
        if self.json {
            let out = serde_json::json!({
                "status": "error",
                "message": msg,
            });
            println!("{out}");
            return;
        }
        eprintln!("{} {msg}", self.style("error", "31;1"));
    }

    /// One-line summary for drill-down results, keyed on their `kind` tag.
    fn headline(&self, value: &Value) -> Option<String> {
        let kind = value.get("kind")?.as_str()?;
        let text = |key: &str| value.get(key).map(plain).unwrap_or_default();
        let line = match kind {
            "function" => format!(
                "{} {}  self {}%  total {}%",
                self.style("function", "36;1"),
                self.style(&text("function"), "37;1"),
                text("selfPct"),
                text("totalPct"),
            ),
            "rows" => format!(
                "{} {}  {} of {} rows match {}",
                self.style("rows", "36;1"),
                text("template"),
                text("matchingRows"),
                text("totalRows"),
                self.style(&text("target"), "37;1"),
            ),
            "function_not_found" => format!(
                "{} no function matches {}",
                self.style("miss", "33;1"),
                self.style(&text("target"), "37;1"),
            ),
            "trace_not_found" => format!(
                "{} no stored trace {}",
                self.style("miss", "33;1"),
                self.style(&text("traceId"), "37;1"),
            ),
            _ => return None,
        };
        Some(line)
    }

    fn render_value(&self, value: &Value, indent: usize) -> String {
        match value {
            Value::Array(items) => self.render_array(items, indent),
            Value::Object(map) => self.render_object(map, indent),
            scalar => plain(scalar),
        }
    }

    fn render_array(&self, items: &[Value], indent: usize) -> String {
        if items.is_empty() {
            return "[]".to_string();
        }

        let pad = " ".repeat(indent);
        let mut out = String::new();
        for item in items {
            match item {
                Value::Object(_) | Value::Array(_) => {
                    out.push_str(&format!("{pad}-\n{}\n", self.render_value(item, indent + 2)));
                }
                _ => out.push_str(&format!("{pad}- {}\n", plain(item))),
            }
        }
        out.trim_end().to_string()
    }

    fn render_object(&self, map: &Map<String, Value>, indent: usize) -> String {
        if map.is_empty() {
            return "{}".to_string();
        }

        let pad = " ".repeat(indent);
        let mut out = String::new();
        for (key, value) in map {
            let label = self.style(key, "90");
            match value {
                Value::Object(_) | Value::Array(_) => {
                    out.push_str(&format!(
                        "{pad}{label}:\n{}\n",
                        self.render_value(value, indent + 2)
                    ));
                }
                _ if key == "hint" => {
                    out.push_str(&format!("{pad}{label}: {}\n", self.style(&plain(value), "33")));
                }
                _ => out.push_str(&format!("{pad}{label}: {}\n", plain(value))),
            }
        }
        out.trim_end().to_string()
    }

    fn style(&self, text: &str, ansi: &str) -> String {
        if self.no_color {
            return text.to_string();
        }
        format!("\x1b[{ansi}m{text}\x1b[0m")
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(v) => v.clone(),
        other => other.to_string(),
    }
}
