//! Profiling domain discriminator.

use serde::{Deserialize, Serialize};

use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    Cpu,
    Hangs,
    Network,
    Leaks,
    Allocations,
    #[serde(rename = "swiftui")]
    SwiftUi,
    Energy,
    Launch,
    Unspecified,
}

impl TemplateKind {
    /// Maps a profiler template name ("Time Profiler", "App Launch", ...) to its domain.
    pub fn from_template_name(name: &str) -> Self {
        let name = name.trim().to_ascii_lowercase();
        let has = |needle: &str| name.contains(needle);
        if has("time profiler") || has("cpu") || name == "time" {
            Self::Cpu
        } else if has("swiftui") {
            Self::SwiftUi
        } else if has("hang") || has("hitch") {
            Self::Hangs
        } else if has("network") || has("http") {
            Self::Network
        } else if has("leak") {
            Self::Leaks
        } else if has("alloc") {
            Self::Allocations
        } else if has("energy") || has("power") {
            Self::Energy
        } else if has("launch") {
            Self::Launch
        } else {
            Self::Unspecified
        }
    }

    pub fn is_cpu(self) -> bool {
        matches!(self, Self::Cpu)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Hangs => "hangs",
            Self::Network => "network",
            Self::Leaks => "leaks",
            Self::Allocations => "allocations",
            Self::SwiftUi => "swiftui",
            Self::Energy => "energy",
            Self::Launch => "launch",
            Self::Unspecified => "unspecified",
        }
    }

    /// Reserved drill-down tokens understood for this domain.
    pub fn reserved_tokens(self) -> &'static [&'static str] {
        match self {
            Self::Cpu => &["hottest", "heaviest", "<function name>"],
            Self::Hangs => &["worst", "critical", "500ms", "0"],
            Self::Network => &["errors", "slow", "slowest", "<domain>"],
            Self::Leaks => &["largest", "<type or library>"],
            Self::Allocations => &["largest", "persistent", "<category>"],
            Self::SwiftUi => &["excessive", "worst", "<view name>"],
            Self::Energy => &["worst", "thermal", "<component>"],
            Self::Launch => &["slowest", "<phase name>"],
            Self::Unspecified => &["<any text>"],
        }
    }
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
