//! Domain-typed summaries produced upstream and cached alongside the raw rows.

use serde::{Deserialize, Serialize};

use crate::TemplateKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HangSeverity {
    Critical,
    Warning,
    Minor,
    Micro,
}

impl HangSeverity {
    pub fn is_severe(self) -> bool {
        matches!(self, Self::Critical | Self::Warning)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HangEvent {
    pub duration_ms: f64,
    pub severity: HangSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HangsAnalysis {
    #[serde(default)]
    pub events: Vec<HangEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRequest {
    pub url: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NetworkRequest {
    pub fn is_error(&self) -> bool {
        self.error.is_some() || self.status_code.is_some_and(|code| code >= 400)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkAnalysis {
    #[serde(default)]
    pub requests: Vec<NetworkRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakGroup {
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    pub count: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaksAnalysis {
    #[serde(default)]
    pub leaks: Vec<LeakGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationCategory {
    pub category: String,
    pub total_bytes: u64,
    pub persistent_bytes: u64,
    pub total_count: u64,
    pub persistent_count: u64,
}

impl AllocationCategory {
    /// Share of allocations still alive at the end of the recording.
    pub fn persistent_ratio(&self) -> f64 {
        if self.total_count == 0 {
            return 0.0;
        }
        self.persistent_count as f64 / self.total_count as f64
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationsAnalysis {
    #[serde(default)]
    pub categories: Vec<AllocationCategory>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewBodyStat {
    pub view_name: String,
    pub evaluation_count: u64,
    #[serde(default)]
    pub total_duration_ms: f64,
    #[serde(default)]
    pub excessive: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SwiftUiAnalysis {
    #[serde(default)]
    pub views: Vec<ViewBodyStat>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyComponent {
    pub name: String,
    pub impact: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnergyAnalysis {
    pub overall_impact: f64,
    pub thermal_state: String,
    #[serde(default)]
    pub components: Vec<EnergyComponent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchPhase {
    pub name: String,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchAnalysis {
    pub total_launch_ms: f64,
    pub launch_type: String,
    #[serde(default)]
    pub phases: Vec<LaunchPhase>,
}

/// Pre-aggregated result for one profiling domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", rename_all = "snake_case")]
pub enum StructuredResult {
    Hangs(HangsAnalysis),
    Network(NetworkAnalysis),
    Leaks(LeaksAnalysis),
    Allocations(AllocationsAnalysis),
    #[serde(rename = "swiftui")]
    SwiftUi(SwiftUiAnalysis),
    Energy(EnergyAnalysis),
    Launch(LaunchAnalysis),
}

impl StructuredResult {
    pub fn template(&self) -> TemplateKind {
        match self {
            Self::Hangs(_) => TemplateKind::Hangs,
            Self::Network(_) => TemplateKind::Network,
            Self::Leaks(_) => TemplateKind::Leaks,
            Self::Allocations(_) => TemplateKind::Allocations,
            Self::SwiftUi(_) => TemplateKind::SwiftUi,
            Self::Energy(_) => TemplateKind::Energy,
            Self::Launch(_) => TemplateKind::Launch,
        }
    }

    /// Orders event lists by cost, descending. Applied once when a trace is stored.
    pub fn normalize(&mut self) {
        match self {
            Self::Hangs(h) => h
                .events
                .sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms)),
            Self::SwiftUi(s) => s
                .views
                .sort_by(|a, b| b.total_duration_ms.total_cmp(&a.total_duration_ms)),
            Self::Launch(l) => l
                .phases
                .sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms)),
            Self::Network(_) | Self::Leaks(_) | Self::Allocations(_) | Self::Energy(_) => {}
        }
    }
}
