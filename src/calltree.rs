//! Weighted call graph reconstructed from leaf-first CPU backtrace samples.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{RawRow, StackFrame, TemplateKind, WeightUnit};

/// One distinct function across all samples.
#[derive(Debug, Clone)]
pub struct FunctionNode {
    pub name: String,
    pub module: Option<String>,
    /// Weight of samples where this function was the leaf frame.
    pub self_weight: f64,
    /// Weight of samples where this function appears anywhere on the stack.
    pub total_weight: f64,
    /// Caller name -> weight of samples where the caller sat directly above.
    pub callers: BTreeMap<String, f64>,
    /// Callee name -> weight of samples where the callee sat directly below.
    pub callees: BTreeMap<String, f64>,
}

impl FunctionNode {
    fn new(frame: &StackFrame) -> Self {
        Self {
            name: frame.name.clone(),
            module: frame.module.clone(),
            self_weight: 0.0,
            total_weight: 0.0,
            callers: BTreeMap::new(),
            callees: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CallGraph {
    total_weight: f64,
    weight_unit: WeightUnit,
    sample_count: usize,
    functions: Vec<FunctionNode>,
    index: HashMap<String, usize>,
}

impl CallGraph {
    /// Sum of contributing sample weights; the percentage denominator.
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    pub fn weight_unit(&self) -> WeightUnit {
        self.weight_unit
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionNode> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    /// Functions in first-encountered order.
    pub fn functions(&self) -> &[FunctionNode] {
        &self.functions
    }

    /// Highest self weight; ties go to the first-encountered function.
    pub fn hottest(&self) -> Option<&FunctionNode> {
        self.functions.iter().fold(None, |best: Option<&FunctionNode>, f| match best {
            Some(b) if b.self_weight >= f.self_weight => Some(b),
            _ => Some(f),
        })
    }

    pub fn top_by_self(&self, limit: usize) -> Vec<&FunctionNode> {
        let mut out: Vec<&FunctionNode> = self.functions.iter().collect();
        out.sort_by(|a, b| b.self_weight.total_cmp(&a.self_weight));
        out.truncate(limit);
        out
    }

    fn node_index(&mut self, frame: &StackFrame) -> usize {
        if let Some(&i) = self.index.get(&frame.name) {
            let node = &mut self.functions[i];
            if node.module.is_none() {
                node.module = frame.module.clone();
            }
            return i;
        }
        let i = self.functions.len();
        self.functions.push(FunctionNode::new(frame));
        self.index.insert(frame.name.clone(), i);
        i
    }
}

/// Builds the call graph for a CPU trace.
///
/// Returns `None` when the template is not CPU-shaped or no sample carried a
/// symbolicated frame, so callers can tell "no usable CPU data" apart from a
/// zero-cost trace.
pub fn build_call_graph(template: TemplateKind, rows: &[RawRow]) -> Option<CallGraph> {
    if !template.is_cpu() {
        return None;
    }

    let mut graph = CallGraph {
        total_weight: 0.0,
        weight_unit: WeightUnit::Occurrence,
        sample_count: 0,
        functions: Vec::new(),
        index: HashMap::new(),
    };
    let mut skipped = 0usize;

    for row in rows {
        let frames: Vec<&StackFrame> = row
            .backtrace
            .iter()
            .filter(|f| f.is_symbolicated())
            .collect();
        if frames.is_empty() {
            skipped += 1;
            continue;
        }

        let weight = row.sample_weight();
        if weight.unit == WeightUnit::Ms {
            graph.weight_unit = WeightUnit::Ms;
        }
        graph.total_weight += weight.value;
        graph.sample_count += 1;

        let ids: Vec<usize> = frames.iter().map(|f| graph.node_index(f)).collect();

        // Recursive frames count once per sample, for nodes and for edges.
        let mut seen_nodes = HashSet::new();
        let mut seen_edges = HashSet::new();
        for (depth, &id) in ids.iter().enumerate() {
            if seen_nodes.insert(id) {
                graph.functions[id].total_weight += weight.value;
            }
            if depth == 0 {
                graph.functions[id].self_weight += weight.value;
            }
            let Some(&caller) = ids.get(depth + 1) else {
                continue;
            };
            if !seen_edges.insert((caller, id)) {
                continue;
            }
            let caller_name = graph.functions[caller].name.clone();
            let callee_name = graph.functions[id].name.clone();
            *graph.functions[id].callers.entry(caller_name).or_insert(0.0) += weight.value;
            *graph.functions[caller].callees.entry(callee_name).or_insert(0.0) += weight.value;
        }
    }

    if graph.is_empty() {
        tracing::debug!(rows = rows.len(), skipped, "no symbolicated CPU samples");
        return None;
    }

    tracing::debug!(
        functions = graph.len(),
        samples = graph.sample_count,
        skipped,
        total_weight = graph.total_weight,
        "built call graph"
    );
    Some(graph)
}
