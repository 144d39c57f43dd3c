//! Bounded in-memory registry of stored traces.

use rand_chacha::ChaCha8Rng;
use rand_core::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use crate::{
    CallGraph, Config, DrillDown, DrillLimits, RawRow, StructuredResult, TemplateKind, TraceBundle,
    TraceNotFound, build_call_graph, drill_down,
};

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_SUFFIX_LEN: usize = 8;
const PREVIEW_MAX_CHARS: usize = 120;

/// Memoized call graph outcome for one trace.
#[derive(Debug)]
enum CallGraphState {
    Built(CallGraph),
    Unavailable,
}

/// Observable state of a trace's call graph cache.
#[derive(Debug, Clone, Copy)]
pub enum CallGraphSlot<'a> {
    Unbuilt,
    Built(&'a CallGraph),
    Unavailable,
}

#[derive(Debug)]
pub struct StoredTrace {
    id: String,
    source_path: String,
    template: TemplateKind,
    rows: Vec<RawRow>,
    structured: Option<StructuredResult>,
    narrative: Option<String>,
    stored_seq: u64,
    stored_at: OffsetDateTime,
    call_graph: OnceLock<CallGraphState>,
}

impl StoredTrace {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_path(&self) -> &str {
        &self.source_path
    }

    pub fn template(&self) -> TemplateKind {
        self.template
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    pub fn structured(&self) -> Option<&StructuredResult> {
        self.structured.as_ref()
    }

    pub fn narrative(&self) -> Option<&str> {
        self.narrative.as_deref()
    }

    pub fn stored_at(&self) -> OffsetDateTime {
        self.stored_at
    }

    /// The trace's call graph, built on first use. `None` is cached too.
    pub fn call_graph(&self) -> Option<&CallGraph> {
        self.call_graph_with(|trace| build_call_graph(trace.template, &trace.rows))
    }

    /// Like [`StoredTrace::call_graph`] with a caller-supplied builder, which
    /// runs at most once over the trace's lifetime.
    pub fn call_graph_with<F>(&self, build: F) -> Option<&CallGraph>
    where
        F: FnOnce(&StoredTrace) -> Option<CallGraph>,
    {
        let state = self.call_graph.get_or_init(|| match build(self) {
            Some(graph) => CallGraphState::Built(graph),
            None => CallGraphState::Unavailable,
        });
        match state {
            CallGraphState::Built(graph) => Some(graph),
            CallGraphState::Unavailable => None,
        }
    }

    pub fn call_graph_slot(&self) -> CallGraphSlot<'_> {
        match self.call_graph.get() {
            None => CallGraphSlot::Unbuilt,
            Some(CallGraphState::Built(graph)) => CallGraphSlot::Built(graph),
            Some(CallGraphState::Unavailable) => CallGraphSlot::Unavailable,
        }
    }

    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            id: self.id.clone(),
            template: self.template,
            source_path: self.source_path.clone(),
            stored_at: self.stored_at,
            row_count: self.rows.len(),
            has_structured_result: self.structured.is_some(),
            narrative_preview: self.narrative.as_deref().and_then(narrative_preview),
        }
    }
}

/// Listing entry; never carries raw rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSummary {
    pub id: String,
    pub template: TemplateKind,
    pub source_path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub stored_at: OffsetDateTime,
    pub row_count: usize,
    pub has_structured_result: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative_preview: Option<String>,
}

#[derive(Debug)]
struct StoreState {
    traces: HashMap<String, Arc<StoredTrace>>,
    /// Ids of evicted or cleared traces; never handed out again.
    retired: HashSet<String>,
    next_seq: u64,
    rng: ChaCha8Rng,
}

/// Holds up to `capacity` traces, evicting the oldest insertion first.
#[derive(Debug)]
pub struct TraceStore {
    capacity: usize,
    id_prefix: String,
    limits: DrillLimits,
    state: Mutex<StoreState>,
}

impl Default for TraceStore {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl TraceStore {
    pub fn new(config: &Config) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self {
            capacity: config.capacity.max(1),
            id_prefix: config.id_prefix.clone(),
            limits: config.limits(),
            state: Mutex::new(StoreState {
                traces: HashMap::new(),
                retired: HashSet::new(),
                next_seq: 0,
                rng,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn limits(&self) -> DrillLimits {
        self.limits
    }

    /// Stores a trace and returns its generated id.
    pub fn store(&self, bundle: TraceBundle) -> String {
        let TraceBundle {
            source_path,
            template,
            rows,
            structured,
            narrative,
        } = bundle;
        let declared = TemplateKind::from_template_name(&template);
        let (template, structured) = reconcile_structured(declared, &template, structured);

        let mut state = self.lock();
        while state.traces.len() >= self.capacity {
            let Some(oldest) = state
                .traces
                .values()
                .min_by_key(|t| t.stored_seq)
                .map(|t| t.id.clone())
            else {
                break;
            };
            state.traces.remove(&oldest);
            state.retired.insert(oldest.clone());
            tracing::info!(id = %oldest, capacity = self.capacity, "evicted oldest trace");
        }

        let id = loop {
            let candidate = format!("{}{}", self.id_prefix, random_suffix(&mut state.rng));
            if !state.traces.contains_key(&candidate) && !state.retired.contains(&candidate) {
                break candidate;
            }
        };
        let stored_seq = state.next_seq;
        state.next_seq += 1;

        let trace = StoredTrace {
            id: id.clone(),
            source_path,
            template,
            rows,
            structured,
            narrative,
            stored_seq,
            stored_at: OffsetDateTime::now_utc(),
            call_graph: OnceLock::new(),
        };
        tracing::debug!(id = %id, template = %template, rows = trace.rows.len(), "stored trace");
        state.traces.insert(id.clone(), Arc::new(trace));
        id
    }

    pub fn get(&self, id: &str) -> Option<Arc<StoredTrace>> {
        self.lock().traces.get(id).cloned()
    }

    /// Summaries, most recently stored first.
    pub fn list(&self) -> Vec<TraceSummary> {
        self.ordered().iter().map(|t| t.summary()).collect()
    }

    /// Ids, most recently stored first.
    pub fn ids(&self) -> Vec<String> {
        self.ordered().iter().map(|t| t.id.clone()).collect()
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        let dropped = state.traces.len();
        let ids: Vec<String> = state.traces.drain().map(|(id, _)| id).collect();
        state.retired.extend(ids);
        tracing::info!(dropped, "cleared trace store");
    }

    pub fn len(&self) -> usize {
        self.lock().traces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolves `target` against the stored trace `id`.
    pub fn drill_down(&self, id: &str, target: &str) -> DrillDown {
        // The store lock is released before any call graph work starts.
        let Some(trace) = self.get(id) else {
            let known = self.ids();
            let hint = if known.is_empty() {
                "No traces are stored; record or load a trace first.".to_string()
            } else {
                format!("Stored trace ids (most recent first): {}", known.join(", "))
            };
            return DrillDown::TraceNotFound(TraceNotFound {
                trace_id: id.to_string(),
                hint,
            });
        };
        drill_down(&trace, target, &self.limits)
    }

    fn ordered(&self) -> Vec<Arc<StoredTrace>> {
        let mut traces: Vec<Arc<StoredTrace>> = self.lock().traces.values().cloned().collect();
        traces.sort_by(|a, b| b.stored_seq.cmp(&a.stored_seq));
        traces
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn reconcile_structured(
    declared: TemplateKind,
    template_name: &str,
    structured: Option<StructuredResult>,
) -> (TemplateKind, Option<StructuredResult>) {
    let Some(mut structured) = structured else {
        return (declared, None);
    };
    let domain = structured.template();
    if declared == TemplateKind::Unspecified {
        structured.normalize();
        return (domain, Some(structured));
    }
    if domain != declared {
        tracing::warn!(
            template = template_name,
            domain = %domain,
            "structured result does not match template; falling back to raw rows"
        );
        return (declared, None);
    }
    structured.normalize();
    (declared, Some(structured))
}

fn random_suffix(rng: &mut ChaCha8Rng) -> String {
    (0..ID_SUFFIX_LEN)
        .map(|_| {
            let i = rng.next_u32() as usize % ID_ALPHABET.len();
            ID_ALPHABET[i] as char
        })
        .collect()
}

/// First substantive line of a narrative, stripped of markdown markers.
pub fn narrative_preview(narrative: &str) -> Option<String> {
    narrative.lines().find_map(|line| {
        let text = line
            .trim()
            .trim_start_matches(['#', '>'])
            .trim_start();
        let text = text
            .strip_prefix("- ")
            .or_else(|| text.strip_prefix("* "))
            .unwrap_or(text)
            .trim();
        if text.is_empty() || text.chars().all(|c| matches!(c, '-' | '=' | '*' | '_')) {
            return None;
        }
        if text.chars().count() > PREVIEW_MAX_CHARS {
            let cut: String = text.chars().take(PREVIEW_MAX_CHARS).collect();
            Some(format!("{}...", cut.trim_end()))
        } else {
            Some(text.to_string())
        }
    })
}
