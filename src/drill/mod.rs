//! Drill-down queries over a stored trace.
//!
//! CPU traces with usable backtraces are answered from the call graph; every
//! other trace is answered from its structured result when one was stored, or
//! by free-text search over the raw rows.

mod cpu;
mod domains;
mod rows;

pub use cpu::*;
pub use domains::*;
pub use rows::*;

use serde::{Deserialize, Serialize};

use crate::{DrillLimits, StoredTrace};

/// Outcome of a drill-down. Exactly one shape per query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrillDown {
    Function(FunctionDrillDown),
    FunctionNotFound(FunctionNotFound),
    Rows(RowsDrillDown),
    TraceNotFound(TraceNotFound),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceNotFound {
    pub trace_id: String,
    pub hint: String,
}

impl DrillDown {
    pub fn is_found(&self) -> bool {
        match self {
            Self::Function(_) => true,
            Self::Rows(rows) => rows.matching_rows > 0,
            Self::FunctionNotFound(_) | Self::TraceNotFound(_) => false,
        }
    }
}

pub fn drill_down(trace: &StoredTrace, target: &str, limits: &DrillLimits) -> DrillDown {
    if trace.template().is_cpu() {
        if let Some(graph) = trace.call_graph() {
            return resolve_function(graph, target, limits);
        }
        let mut result = search_raw_rows(trace, target, limits);
        result.prepend_hint(
            "No symbolicated CPU backtraces in this trace; searched raw rows instead.",
        );
        return DrillDown::Rows(result);
    }

    match trace.structured() {
        Some(structured) => DrillDown::Rows(resolve_structured(structured, target, limits)),
        None => DrillDown::Rows(search_raw_rows(trace, target, limits)),
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `part / whole` as a percentage rounded to one decimal; zero when `whole` is zero.
pub(crate) fn percent(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 {
        return 0.0;
    }
    round_to(part / whole * 100.0, 1)
}
