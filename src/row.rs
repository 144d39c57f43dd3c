//! Flat export records and the trace bundle document (.json) read/write.

use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::{DrillError, DrillResult, StructuredResult};

/// Raw values at or above this magnitude are nanoseconds, not milliseconds.
pub const NANOSECOND_THRESHOLD: f64 = 1_000_000.0;

const PLACEHOLDER_NAMES: &[&str] = &["???", "<unknown>", "<unsymbolicated>", "<redacted>", "unknown"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackFrame {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl StackFrame {
    pub fn new(name: impl Into<String>, module: Option<&str>) -> Self {
        Self {
            name: name.into(),
            module: module.map(str::to_string),
        }
    }

    /// False for raw addresses and placeholder names.
    pub fn is_symbolicated(&self) -> bool {
        let name = self.name.trim();
        if name.is_empty() || PLACEHOLDER_NAMES.contains(&name) {
            return false;
        }
        let digits = name
            .strip_prefix("0x")
            .or_else(|| name.strip_prefix("0X"))
            .unwrap_or(name);
        let looks_like_address = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
        // Bare hex like "deadbeef" counts as an address only when long enough to be one.
        !(looks_like_address && (digits.len() != name.len() || digits.len() >= 8))
    }
}

/// One flat record from the extraction adapter. CPU rows carry a leaf-first backtrace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default)]
    pub fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub backtrace: Vec<StackFrame>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WeightUnit {
    Ms,
    Occurrence,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleWeight {
    pub value: f64,
    pub unit: WeightUnit,
}

impl SampleWeight {
    pub fn ms(value: f64) -> Self {
        Self {
            value,
            unit: WeightUnit::Ms,
        }
    }

    pub fn occurrence() -> Self {
        Self {
            value: 1.0,
            unit: WeightUnit::Occurrence,
        }
    }
}

impl RawRow {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>, backtrace: Vec<StackFrame>) -> Self {
        Self { fields, backtrace }
    }

    /// Sample weight in milliseconds.
    ///
    /// Precedence: `weight_fmt` string, then a `weight` string, then a numeric
    /// `weight` (values >= 1,000,000 are nanoseconds). Rows without a usable
    /// weight count as one occurrence.
    pub fn sample_weight(&self) -> SampleWeight {
        let formatted = self
            .fields
            .get("weight_fmt")
            .and_then(|v| v.as_str())
            .and_then(parse_weight_text)
            .or_else(|| {
                self.fields
                    .get("weight")
                    .and_then(|v| v.as_str())
                    .and_then(parse_weight_text)
            });
        if let Some(ms) = formatted {
            return SampleWeight::ms(ms);
        }

        match self.fields.get("weight").and_then(|v| v.as_f64()) {
            Some(raw) if raw.is_finite() && raw >= 0.0 => SampleWeight::ms(infer_raw_weight_ms(raw)),
            _ => SampleWeight::occurrence(),
        }
    }

    /// Lowercased serialization used for free-text matching.
    pub fn search_text(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_default()
            .to_lowercase()
    }

    pub fn to_value(&self) -> serde_json::Value {
        let mut out = self.fields.clone();
        if !self.backtrace.is_empty() {
            let frames = self
                .backtrace
                .iter()
                .map(|f| serde_json::Value::String(f.name.clone()))
                .collect();
            out.insert("backtrace".to_string(), serde_json::Value::Array(frames));
        }
        serde_json::Value::Object(out)
    }
}

/// Magnitude heuristic for unitless raw weights.
pub fn infer_raw_weight_ms(raw: f64) -> f64 {
    if raw >= NANOSECOND_THRESHOLD {
        raw / 1_000_000.0
    } else {
        raw
    }
}

/// A unit makes the text authoritative; a bare number is a raw value.
fn parse_weight_text(text: &str) -> Option<f64> {
    parse_duration_ms(text).or_else(|| {
        let plain = text.trim().replace(',', "");
        plain
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(infer_raw_weight_ms)
    })
}

/// Parses a duration with an explicit unit ("5.00 ms", "1.5s", "250 µs") into milliseconds.
pub fn parse_duration_ms(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace(',', "");
    let split = cleaned
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(cleaned.len());
    let (number, unit) = cleaned.split_at(split);
    if number.is_empty() {
        return None;
    }
    let value = number.parse::<f64>().ok().filter(|v| v.is_finite())?;
    match unit.trim().to_ascii_lowercase().as_str() {
        "ns" => Some(value / 1_000_000.0),
        "us" | "µs" | "μs" => Some(value / 1_000.0),
        "ms" => Some(value),
        "s" | "sec" | "secs" => Some(value * 1_000.0),
        "min" | "mins" => Some(value * 60_000.0),
        _ => None,
    }
}

/// A stored-trace document as produced by the capture/extraction side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceBundle {
    pub source_path: String,
    pub template: String,
    #[serde(default)]
    pub rows: Vec<RawRow>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<StructuredResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl TraceBundle {
    pub fn new(source_path: impl Into<String>, template: impl Into<String>, rows: Vec<RawRow>) -> Self {
        Self {
            source_path: source_path.into(),
            template: template.into(),
            rows,
            structured: None,
            narrative: None,
        }
    }

    pub fn with_structured(mut self, structured: StructuredResult) -> Self {
        self.structured = Some(structured);
        self
    }

    pub fn with_narrative(mut self, narrative: impl Into<String>) -> Self {
        self.narrative = Some(narrative.into());
        self
    }

    pub fn write_json(&self, path: &Path) -> DrillResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> DrillResult<Self> {
        let bytes = std::fs::read(path)?;
        let bundle: TraceBundle = serde_json::from_slice(&bytes)
            .map_err(|e| DrillError::Bundle(format!("{}: {e}", path.display())))?;
        Ok(bundle)
    }
}
