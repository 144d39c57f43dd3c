//! Reserved-token resolvers over each domain's structured result.

use serde::Serialize;
use serde_json::{Value, json};

use super::{RowSource, RowsDrillDown, percent, round_to};
use crate::{
    AllocationsAnalysis, DrillLimits, EnergyAnalysis, HangsAnalysis, LaunchAnalysis, LeaksAnalysis,
    NetworkAnalysis, StructuredResult, SwiftUiAnalysis, parse_duration_ms,
};

const HANG_FALLBACK_EVENTS: usize = 5;
const PERSISTENT_RATIO: f64 = 0.5;

/// Rows picked by a domain resolver, before capping.
struct Selection {
    total: usize,
    rows: Vec<Value>,
    note: Option<String>,
}

impl Selection {
    fn new(total: usize, rows: Vec<Value>) -> Self {
        Self { total, rows, note: None }
    }

    fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

pub fn resolve_structured(structured: &StructuredResult, target: &str, limits: &DrillLimits) -> RowsDrillDown {
    let token = target.trim().to_lowercase();
    let selection = match structured {
        StructuredResult::Hangs(h) => hangs(h, &token),
        StructuredResult::Network(n) => network(n, &token),
        StructuredResult::Leaks(l) => leaks(l, &token),
        StructuredResult::Allocations(a) => allocations(a, &token),
        StructuredResult::SwiftUi(s) => swiftui(s, &token),
        StructuredResult::Energy(e) => energy(e, &token),
        StructuredResult::Launch(l) => launch(l, &token),
    };
    let mut result = RowsDrillDown::new(
        structured.template(),
        RowSource::Structured,
        target,
        selection.total,
        selection.rows,
        limits,
    );
    if let Some(note) = selection.note {
        result.prepend_hint(&note);
    }
    result
}

fn to_rows<'a, T: Serialize + 'a>(items: impl IntoIterator<Item = &'a T>) -> Vec<Value> {
    items
        .into_iter()
        .filter_map(|item| serde_json::to_value(item).ok())
        .collect()
}

fn annotate(mut row: Value, extra: &[(&str, Value)]) -> Value {
    if let Value::Object(map) = &mut row {
        for (key, value) in extra {
            map.insert((*key).to_string(), value.clone());
        }
    }
    row
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Accepts "500ms", ">=1.5s", "> 250us".
fn parse_duration_floor(token: &str) -> Option<f64> {
    let rest = token
        .strip_prefix(">=")
        .or_else(|| token.strip_prefix('>'))
        .unwrap_or(token);
    parse_duration_ms(rest.trim())
}

fn hangs(h: &HangsAnalysis, token: &str) -> Selection {
    let total = h.events.len();
    match token {
        "worst" | "critical" => {
            let severe: Vec<_> = h.events.iter().filter(|e| e.severity.is_severe()).collect();
            if severe.is_empty() {
                Selection::new(total, to_rows(h.events.iter().take(HANG_FALLBACK_EVENTS)))
                    .with_note("No critical or warning hangs; showing the longest events.")
            } else {
                Selection::new(total, to_rows(severe))
            }
        }
        _ => {
            if let Some(floor) = parse_duration_floor(token) {
                return Selection::new(
                    total,
                    to_rows(h.events.iter().filter(|e| e.duration_ms >= floor)),
                );
            }
            if let Ok(index) = token.parse::<usize>() {
                let rows = to_rows(h.events.get(index));
                if rows.is_empty() {
                    return Selection::new(total, rows)
                        .with_note(format!("Hang index {index} is out of range (0..{total})."));
                }
                return Selection::new(total, rows);
            }
            let rows = h
                .events
                .iter()
                .filter_map(|e| serde_json::to_value(e).ok())
                .filter(|v| v.to_string().to_lowercase().contains(token))
                .collect();
            Selection::new(total, rows)
        }
    }
}

fn network(n: &NetworkAnalysis, token: &str) -> Selection {
    let total = n.requests.len();
    match token {
        "errors" => Selection::new(total, to_rows(n.requests.iter().filter(|r| r.is_error()))),
        "slow" | "slowest" => {
            let mut sorted: Vec<_> = n.requests.iter().collect();
            sorted.sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms));
            Selection::new(total, to_rows(sorted))
        }
        _ => Selection::new(
            total,
            to_rows(n.requests.iter().filter(|r| contains(&r.domain, token))),
        ),
    }
}

fn leaks(l: &LeaksAnalysis, token: &str) -> Selection {
    let total = l.leaks.len();
    match token {
        "largest" => {
            let mut sorted: Vec<_> = l.leaks.iter().collect();
            sorted.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));
            Selection::new(total, to_rows(sorted))
        }
        _ => Selection::new(
            total,
            to_rows(l.leaks.iter().filter(|g| {
                contains(&g.type_name, token)
                    || g.library.as_deref().is_some_and(|lib| contains(lib, token))
            })),
        ),
    }
}

fn allocations(a: &AllocationsAnalysis, token: &str) -> Selection {
    let total = a.categories.len();
    match token {
        "largest" => {
            let mut sorted: Vec<_> = a.categories.iter().collect();
            sorted.sort_by(|x, y| y.total_bytes.cmp(&x.total_bytes));
            Selection::new(total, to_rows(sorted))
        }
        "persistent" => {
            let rows = a
                .categories
                .iter()
                .filter(|c| c.persistent_ratio() > PERSISTENT_RATIO)
                .filter_map(|c| {
                    let ratio = round_to(c.persistent_ratio() * 100.0, 1);
                    serde_json::to_value(c)
                        .ok()
                        .map(|v| annotate(v, &[("persistentPct", json!(ratio))]))
                })
                .collect();
            Selection::new(total, rows)
        }
        _ => Selection::new(
            total,
            to_rows(a.categories.iter().filter(|c| contains(&c.category, token))),
        ),
    }
}

fn swiftui(s: &SwiftUiAnalysis, token: &str) -> Selection {
    let total = s.views.len();
    match token {
        "excessive" | "worst" => {
            let flagged: Vec<_> = s.views.iter().filter(|v| v.excessive).collect();
            if !flagged.is_empty() {
                return Selection::new(total, to_rows(flagged));
            }
            let mut by_count: Vec<_> = s.views.iter().collect();
            by_count.sort_by(|a, b| b.evaluation_count.cmp(&a.evaluation_count));
            Selection::new(total, to_rows(by_count))
                .with_note("No views were flagged as excessive; showing the most evaluated views.")
        }
        _ => Selection::new(
            total,
            to_rows(s.views.iter().filter(|v| contains(&v.view_name, token))),
        ),
    }
}

fn energy(e: &EnergyAnalysis, token: &str) -> Selection {
    let total = e.components.len();
    match token {
        "worst" => {
            let mut sorted: Vec<_> = e.components.iter().collect();
            sorted.sort_by(|a, b| b.impact.total_cmp(&a.impact));
            let context = [
                ("overallImpact", json!(e.overall_impact)),
                ("thermalState", json!(e.thermal_state)),
            ];
            let rows = to_rows(sorted)
                .into_iter()
                .map(|row| annotate(row, &context))
                .collect();
            Selection::new(total, rows)
        }
        "thermal" => Selection::new(
            total,
            vec![json!({
                "thermalState": e.thermal_state,
                "overallImpact": e.overall_impact,
                "componentCount": total,
            })],
        ),
        _ => Selection::new(
            total,
            to_rows(e.components.iter().filter(|c| contains(&c.name, token))),
        ),
    }
}

fn launch(l: &LaunchAnalysis, token: &str) -> Selection {
    let total = l.phases.len();
    match token {
        "slowest" => {
            let rows = l
                .phases
                .iter()
                .filter_map(|p| {
                    let context = [
                        ("pctOfLaunch", json!(percent(p.duration_ms, l.total_launch_ms))),
                        ("totalLaunchMs", json!(round_to(l.total_launch_ms, 2))),
                        ("launchType", json!(l.launch_type)),
                    ];
                    serde_json::to_value(p).ok().map(|v| annotate(v, &context))
                })
                .collect();
            Selection::new(total, rows)
        }
        _ => Selection::new(
            total,
            to_rows(l.phases.iter().filter(|p| contains(&p.name, token))),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AllocationCategory, EnergyComponent, HangEvent, HangSeverity, LaunchPhase, LeakGroup,
        NetworkRequest, ViewBodyStat,
    };

    fn limits() -> DrillLimits {
        DrillLimits::default()
    }

    fn hangs_result(severities: &[(f64, HangSeverity)]) -> StructuredResult {
        let mut s = StructuredResult::Hangs(HangsAnalysis {
            events: severities
                .iter()
                .map(|&(duration_ms, severity)| HangEvent {
                    duration_ms,
                    severity,
                    start: None,
                    thread: None,
                    description: Some(format!("hang of {duration_ms}ms")),
                })
                .collect(),
        });
        s.normalize();
        s
    }

    fn scenario_hangs() -> StructuredResult {
        hangs_result(&[
            (1200.0, HangSeverity::Critical),
            (500.0, HangSeverity::Warning),
            (150.0, HangSeverity::Minor),
            (80.0, HangSeverity::Micro),
            (50.0, HangSeverity::Micro),
        ])
    }

    #[test]
    fn hangs_worst_and_critical_are_aliases() {
        let worst = resolve_structured(&scenario_hangs(), "worst", &limits());
        let critical = resolve_structured(&scenario_hangs(), "Critical", &limits());
        assert_eq!(worst.matching_rows, 2);
        assert_eq!(critical.matching_rows, 2);
        assert_eq!(worst.source, RowSource::Structured);
        assert!(worst.hint.is_none());
    }

    #[test]
    fn hangs_worst_falls_back_to_first_five() {
        let minor = hangs_result(&[
            (90.0, HangSeverity::Minor),
            (10.0, HangSeverity::Micro),
            (20.0, HangSeverity::Micro),
            (30.0, HangSeverity::Micro),
            (40.0, HangSeverity::Micro),
            (50.0, HangSeverity::Micro),
        ]);
        let result = resolve_structured(&minor, "worst", &limits());
        assert_eq!(result.matching_rows, 5);
        assert_eq!(result.rows[0]["durationMs"], 90.0);
        assert!(result.hint.as_deref().is_some_and(|h| h.contains("No critical")));
    }

    #[test]
    fn hangs_duration_floor_and_index() {
        let floor = resolve_structured(&scenario_hangs(), ">= 150ms", &limits());
        assert_eq!(floor.matching_rows, 3);
        let secs = resolve_structured(&scenario_hangs(), "1s", &limits());
        assert_eq!(secs.matching_rows, 1);

        let second = resolve_structured(&scenario_hangs(), "1", &limits());
        assert_eq!(second.matching_rows, 1);
        assert_eq!(second.rows[0]["durationMs"], 500.0);

        let out_of_range = resolve_structured(&scenario_hangs(), "9", &limits());
        assert_eq!(out_of_range.matching_rows, 0);
        assert!(out_of_range.hint.as_deref().is_some_and(|h| h.contains("out of range")));
    }

    #[test]
    fn hangs_free_text() {
        let result = resolve_structured(&scenario_hangs(), "HANG OF 80", &limits());
        assert_eq!(result.matching_rows, 1);
        assert_eq!(result.total_rows, 5);
    }

    fn request(domain: &str, status: Option<u16>, duration_ms: f64) -> NetworkRequest {
        NetworkRequest {
            url: format!("https://{domain}/v1/items"),
            domain: domain.to_string(),
            method: Some("GET".to_string()),
            status_code: status,
            duration_ms,
            error: None,
        }
    }

    #[test]
    fn network_tokens() {
        let result = StructuredResult::Network(NetworkAnalysis {
            requests: vec![
                request("api.example.com", Some(200), 40.0),
                request("cdn.example.com", Some(404), 900.0),
                request("auth.example.com", None, 120.0),
            ],
        });
        let errors = resolve_structured(&result, "errors", &limits());
        assert_eq!(errors.matching_rows, 1);
        assert_eq!(errors.rows[0]["statusCode"], 404);

        let slowest = resolve_structured(&result, "slowest", &limits());
        assert_eq!(slowest.matching_rows, 3);
        assert_eq!(slowest.rows[0]["domain"], "cdn.example.com");

        let slow = resolve_structured(&result, "Slow", &limits());
        let order: Vec<&str> = slow.rows.iter().filter_map(|r| r["domain"].as_str()).collect();
        assert_eq!(order, ["cdn.example.com", "auth.example.com", "api.example.com"]);

        let by_domain = resolve_structured(&result, "AUTH", &limits());
        assert_eq!(by_domain.matching_rows, 1);
    }

    #[test]
    fn structured_rows_are_capped_with_hint() {
        let requests = (0..30)
            .map(|i| request(&format!("host{i}.example.com"), Some(200), i as f64))
            .collect();
        let result = StructuredResult::Network(NetworkAnalysis { requests });
        let slowest = resolve_structured(&result, "slowest", &limits());
        assert_eq!(slowest.total_rows, 30);
        assert_eq!(slowest.matching_rows, 30);
        assert_eq!(slowest.rows.len(), 20);
        assert_eq!(slowest.rows[0]["durationMs"], 29.0);
        assert!(slowest.hint.as_deref().is_some_and(|h| h.contains("Showing 20 of 30")));
    }

    #[test]
    fn leaks_largest_and_library() {
        let result = StructuredResult::Leaks(LeaksAnalysis {
            leaks: vec![
                LeakGroup {
                    type_name: "NSMutableArray".to_string(),
                    library: Some("Foundation".to_string()),
                    count: 3,
                    total_bytes: 96,
                },
                LeakGroup {
                    type_name: "ImageCache".to_string(),
                    library: Some("MyApp".to_string()),
                    count: 1,
                    total_bytes: 4096,
                },
            ],
        });
        let largest = resolve_structured(&result, "largest", &limits());
        assert_eq!(largest.rows[0]["typeName"], "ImageCache");
        let by_lib = resolve_structured(&result, "foundation", &limits());
        assert_eq!(by_lib.matching_rows, 1);
        assert_eq!(by_lib.rows[0]["typeName"], "NSMutableArray");
    }

    fn category(name: &str, total_bytes: u64, total_count: u64, persistent_count: u64) -> AllocationCategory {
        AllocationCategory {
            category: name.to_string(),
            total_bytes,
            persistent_bytes: total_bytes / 2,
            total_count,
            persistent_count,
        }
    }

    #[test]
    fn allocations_persistent_ratio() {
        let result = StructuredResult::Allocations(AllocationsAnalysis {
            categories: vec![
                category("Malloc 16 Bytes", 1024, 10, 9),
                category("CFString", 8192, 10, 5),
                category("VM: ImageIO", 65536, 4, 1),
            ],
        });
        let persistent = resolve_structured(&result, "persistent", &limits());
        assert_eq!(persistent.matching_rows, 1);
        assert_eq!(persistent.rows[0]["category"], "Malloc 16 Bytes");
        assert_eq!(persistent.rows[0]["persistentPct"], 90.0);

        let largest = resolve_structured(&result, "largest", &limits());
        assert_eq!(largest.rows[0]["category"], "VM: ImageIO");

        let by_category = resolve_structured(&result, "cfstr", &limits());
        assert_eq!(by_category.matching_rows, 1);
        assert_eq!(by_category.rows[0]["category"], "CFString");
    }

    fn view(name: &str, count: u64, excessive: bool) -> ViewBodyStat {
        ViewBodyStat {
            view_name: name.to_string(),
            evaluation_count: count,
            total_duration_ms: count as f64 * 0.1,
            excessive,
        }
    }

    #[test]
    fn swiftui_excessive_with_fallback() {
        let flagged = StructuredResult::SwiftUi(SwiftUiAnalysis {
            views: vec![view("FeedRow", 400, true), view("Header", 900, false)],
        });
        let result = resolve_structured(&flagged, "excessive", &limits());
        assert_eq!(result.matching_rows, 1);
        assert_eq!(result.rows[0]["viewName"], "FeedRow");

        let calm = StructuredResult::SwiftUi(SwiftUiAnalysis {
            views: vec![view("FeedRow", 400, false), view("Header", 900, false)],
        });
        let result = resolve_structured(&calm, "worst", &limits());
        assert_eq!(result.matching_rows, 2);
        assert_eq!(result.rows[0]["viewName"], "Header");
        assert!(result.hint.is_some());

        let by_name = resolve_structured(&calm, "feed", &limits());
        assert_eq!(by_name.matching_rows, 1);
        assert_eq!(by_name.rows[0]["viewName"], "FeedRow");
    }

    #[test]
    fn energy_worst_and_thermal() {
        let result = StructuredResult::Energy(EnergyAnalysis {
            overall_impact: 7.5,
            thermal_state: "serious".to_string(),
            components: vec![
                EnergyComponent { name: "CPU".to_string(), impact: 4.0 },
                EnergyComponent { name: "Network".to_string(), impact: 6.0 },
            ],
        });
        let worst = resolve_structured(&result, "worst", &limits());
        assert_eq!(worst.rows[0]["name"], "Network");
        assert_eq!(worst.rows[0]["thermalState"], "serious");
        assert_eq!(worst.rows[1]["overallImpact"], 7.5);

        let thermal = resolve_structured(&result, "thermal", &limits());
        assert_eq!(thermal.total_rows, 2);
        assert_eq!(thermal.matching_rows, 1);
        assert_eq!(thermal.rows[0]["thermalState"], "serious");

        let by_component = resolve_structured(&result, "netw", &limits());
        assert_eq!(by_component.matching_rows, 1);
        assert_eq!(by_component.rows[0]["name"], "Network");
        assert!(by_component.rows[0].get("thermalState").is_none());
    }

    #[test]
    fn launch_slowest_is_annotated() {
        let mut result = StructuredResult::Launch(LaunchAnalysis {
            total_launch_ms: 800.0,
            launch_type: "cold".to_string(),
            phases: vec![
                LaunchPhase { name: "dyld".to_string(), duration_ms: 200.0 },
                LaunchPhase { name: "First frame".to_string(), duration_ms: 600.0 },
            ],
        });
        result.normalize();
        let slowest = resolve_structured(&result, "slowest", &limits());
        assert_eq!(slowest.rows[0]["name"], "First frame");
        assert_eq!(slowest.rows[0]["pctOfLaunch"], 75.0);
        assert_eq!(slowest.rows[0]["launchType"], "cold");
        assert_eq!(slowest.rows[0]["totalLaunchMs"], 800.0);

        let by_name = resolve_structured(&result, "dyld", &limits());
        assert_eq!(by_name.matching_rows, 1);
        let none = resolve_structured(&result, "main()", &limits());
        assert_eq!(none.matching_rows, 0);
        assert!(none.hint.as_deref().is_some_and(|h| h.contains("slowest")));
    }
}
