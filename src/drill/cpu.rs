//! Function-level drill-down over a CPU call graph.

use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashSet};

use super::{DrillDown, percent, round_to};
use crate::{CallGraph, DrillLimits, FunctionNode, WeightUnit};

const HOTTEST_TOKENS: &[&str] = &["hottest", "heaviest"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Exact,
    Substring,
    Hottest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeShare {
    pub function: String,
    pub weight: f64,
    /// Share of the resolved function's total weight.
    pub pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDrillDown {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub matched_by: MatchKind,
    pub weight_unit: WeightUnit,
    pub self_weight: f64,
    pub total_weight: f64,
    pub self_pct: f64,
    pub total_pct: f64,
    pub callers: Vec<EdgeShare>,
    pub callees: Vec<EdgeShare>,
    pub heaviest_path: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSuggestion {
    pub function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    pub self_weight: f64,
    pub self_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionNotFound {
    pub target: String,
    pub hint: String,
    pub top_functions: Vec<FunctionSuggestion>,
}

pub fn resolve_function(graph: &CallGraph, target: &str, limits: &DrillLimits) -> DrillDown {
    let Some((node, matched_by)) = find_function(graph, target) else {
        return DrillDown::FunctionNotFound(not_found(graph, target, limits));
    };

    let total = graph.total_weight();
    DrillDown::Function(FunctionDrillDown {
        function: node.name.clone(),
        module: node.module.clone(),
        matched_by,
        weight_unit: graph.weight_unit(),
        self_weight: round_to(node.self_weight, 2),
        total_weight: round_to(node.total_weight, 2),
        self_pct: percent(node.self_weight, total),
        total_pct: percent(node.total_weight, total),
        callers: top_edges(&node.callers, node.total_weight, limits.edge_limit),
        callees: top_edges(&node.callees, node.total_weight, limits.edge_limit),
        heaviest_path: heaviest_path(graph, node, limits.max_path_hops),
    })
}

/// Reserved tokens, then an exact name, then the shortest name containing
/// `target` case-insensitively (first-encountered wins ties).
pub fn find_function<'g>(graph: &'g CallGraph, target: &str) -> Option<(&'g FunctionNode, MatchKind)> {
    if HOTTEST_TOKENS.contains(&target) {
        return graph.hottest().map(|f| (f, MatchKind::Hottest));
    }
    if let Some(f) = graph.function(target) {
        return Some((f, MatchKind::Exact));
    }
    let needle = target.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }
    graph
        .functions()
        .iter()
        .filter(|f| f.name.to_lowercase().contains(&needle))
        .min_by_key(|f| f.name.chars().count())
        .map(|f| (f, MatchKind::Substring))
}

/// Greedy walk through the heaviest unvisited callee, at most `max_hops` steps.
pub fn heaviest_path(graph: &CallGraph, start: &FunctionNode, max_hops: usize) -> Vec<String> {
    let mut path = vec![start.name.clone()];
    let mut visited: HashSet<&str> = HashSet::from([start.name.as_str()]);
    let mut current = start;

    for _ in 0..max_hops {
        let next = current
            .callees
            .iter()
            .filter(|(name, _)| !visited.contains(name.as_str()))
            .fold(None, |best: Option<(&String, f64)>, (name, &weight)| match best {
                Some((_, w)) if w >= weight => best,
                _ => Some((name, weight)),
            });
        let Some(node) = next.and_then(|(name, _)| graph.function(name)) else {
            break;
        };
        visited.insert(node.name.as_str());
        path.push(node.name.clone());
        current = node;
    }
    path
}

fn top_edges(edges: &BTreeMap<String, f64>, base: f64, limit: usize) -> Vec<EdgeShare> {
    let mut sorted: Vec<(&String, &f64)> = edges.iter().collect();
    sorted.sort_by(|a, b| b.1.total_cmp(a.1));
    sorted
        .into_iter()
        .take(limit)
        .map(|(name, &weight)| EdgeShare {
            function: name.clone(),
            weight: round_to(weight, 2),
            pct: percent(weight, base),
        })
        .collect()
}

fn not_found(graph: &CallGraph, target: &str, limits: &DrillLimits) -> FunctionNotFound {
    let total = graph.total_weight();
    let top_functions = graph
        .top_by_self(limits.top_functions)
        .into_iter()
        .map(|f| FunctionSuggestion {
            function: f.name.clone(),
            module: f.module.clone(),
            self_weight: round_to(f.self_weight, 2),
            self_pct: percent(f.self_weight, total),
        })
        .collect();
    FunctionNotFound {
        target: target.to_string(),
        hint: format!(
            "No function matches {target:?}. Pick one of the top functions by self time below, \
             use part of a name, or \"hottest\"."
        ),
        top_functions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calltree::tests::{sample, sync_rows};
    use crate::{TemplateKind, build_call_graph};
    use serde_json::json;

    fn graph(rows: &[crate::RawRow]) -> CallGraph {
        build_call_graph(TemplateKind::Cpu, rows).expect("graph")
    }

    #[test]
    fn hottest_tokens_are_case_sensitive() {
        let g = graph(&sync_rows());
        assert_eq!(find_function(&g, "heaviest").map(|(f, _)| f.name.as_str()), Some("sqlite3_step"));
        assert!(find_function(&g, "Hottest").is_none());
    }

    #[test]
    fn shortest_substring_match_wins() {
        let rows = vec![
            sample(json!(1), &["NetworkManager.parseResponse", "main"]),
            sample(json!(1), &["parse", "NetworkManager.parse", "main"]),
        ];
        let g = graph(&rows);
        let (f, kind) = find_function(&g, "PARSE").expect("match");
        assert_eq!(f.name, "parse");
        assert_eq!(kind, MatchKind::Substring);

        let (f, kind) = find_function(&g, "NetworkManager.parse").expect("match");
        assert_eq!(f.name, "NetworkManager.parse");
        assert_eq!(kind, MatchKind::Exact);
    }

    #[test]
    fn substring_ties_keep_first_encountered() {
        let rows = vec![sample(json!(1), &["dbB", "main"]), sample(json!(1), &["dbA", "main"])];
        let g = graph(&rows);
        assert_eq!(find_function(&g, "db").map(|(f, _)| f.name.as_str()), Some("dbB"));
        assert!(find_function(&g, "   ").is_none());
    }

    #[test]
    fn heaviest_path_survives_cycles() {
        // a -> b -> c -> a, with the cycle edge heavier than the exit.
        let rows = vec![
            sample(json!(5), &["a", "c", "b", "a"]),
            sample(json!(1), &["exit", "c", "b", "a"]),
        ];
        let g = graph(&rows);
        let start = g.function("a").expect("a");
        let path = heaviest_path(&g, start, 10);
        assert_eq!(path, vec!["a", "b", "c", "exit"]);
        let unique: HashSet<&String> = path.iter().collect();
        assert_eq!(unique.len(), path.len());
    }

    #[test]
    fn heaviest_path_is_capped() {
        let chain: Vec<String> = (0..30).rev().map(|i| format!("f{i:02}")).collect();
        let frames: Vec<&str> = chain.iter().map(String::as_str).collect();
        let g = graph(&[sample(json!(1), &frames)]);
        let start = g.function("f00").expect("root");
        let path = heaviest_path(&g, start, 10);
        assert_eq!(path.len(), 11);
        assert_eq!(path.last().map(String::as_str), Some("f10"));
    }

    #[test]
    fn percentages_close_over_all_functions() {
        let mut rows = sync_rows();
        rows.push(sample(json!("0.333 ms"), &["tiny", "main"]));
        let g = graph(&rows);
        let limits = DrillLimits::default();
        for f in g.functions() {
            let DrillDown::Function(d) = resolve_function(&g, &f.name, &limits) else {
                panic!("{} should resolve", f.name);
            };
            assert!(d.self_pct <= d.total_pct, "{}", f.name);
            assert!((0.0..=100.0).contains(&d.self_pct));
            assert!((0.0..=100.0).contains(&d.total_pct));
            assert!(d.callers.iter().chain(&d.callees).all(|e| e.pct <= 100.0));
        }
    }

    #[test]
    fn edges_are_capped_and_sorted() {
        let rows: Vec<_> = (0..15)
            .map(|i| {
                let leaf = format!("leaf{i:02}");
                sample(json!(i + 1), &[leaf.as_str(), "dispatch"])
            })
            .collect();
        let g = graph(&rows);
        let DrillDown::Function(d) = resolve_function(&g, "dispatch", &DrillLimits::default()) else {
            panic!("dispatch should resolve");
        };
        assert_eq!(d.callees.len(), 10);
        assert_eq!(d.callees[0].function, "leaf14");
        assert!(d.callees.windows(2).all(|w| w[0].weight >= w[1].weight));
    }
}
