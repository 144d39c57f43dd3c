//! Table-shaped drill-down results and free-text search over raw rows.

use serde::{Deserialize, Serialize};

use crate::{DrillLimits, StoredTrace, TemplateKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RowSource {
    Structured,
    RawRows,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowsDrillDown {
    pub template: TemplateKind,
    pub source: RowSource,
    pub target: String,
    /// Population size before filtering.
    pub total_rows: usize,
    /// Rows that matched, before the row cap.
    pub matching_rows: usize,
    pub rows: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl RowsDrillDown {
    /// Caps `matched` at the row limit and explains empty or truncated results.
    pub fn new(
        template: TemplateKind,
        source: RowSource,
        target: &str,
        total_rows: usize,
        mut matched: Vec<serde_json::Value>,
        limits: &DrillLimits,
    ) -> Self {
        let matching_rows = matched.len();
        matched.truncate(limits.row_limit);
        let tokens = template.reserved_tokens().join(", ");
        let hint = if matching_rows == 0 {
            Some(format!(
                "No rows match {target:?} out of {total_rows}. Try one of: {tokens}."
            ))
        } else if matching_rows > matched.len() {
            Some(format!(
                "Showing {} of {matching_rows} matching rows. Narrow the query or try one of: {tokens}.",
                matched.len()
            ))
        } else {
            None
        };
        Self {
            template,
            source,
            target: target.to_string(),
            total_rows,
            matching_rows,
            rows: matched,
            hint,
        }
    }

    pub fn prepend_hint(&mut self, note: &str) {
        self.hint = Some(match self.hint.take() {
            Some(existing) => format!("{note} {existing}"),
            None => note.to_string(),
        });
    }
}

/// Keeps every raw row whose serialization contains `target`, case-insensitively.
pub fn search_raw_rows(trace: &StoredTrace, target: &str, limits: &DrillLimits) -> RowsDrillDown {
    let needle = target.trim().to_lowercase();
    let matched = trace
        .rows()
        .iter()
        .filter(|row| row.search_text().contains(&needle))
        .map(|row| row.to_value())
        .collect();
    RowsDrillDown::new(
        trace.template(),
        RowSource::RawRows,
        target,
        trace.rows().len(),
        matched,
        limits,
    )
}
