//! CLI commands over a trace store (`tracedrill list|drill|session`).

use clap::Subcommand;
use serde_json::{Value, json};

use std::io::BufRead;

use crate::{Config, DrillError, DrillResult, TraceBundle, TraceStore, find_matching_files};

const SESSION_HELP: &[(&str, &str)] = &[
    ("list", "show stored traces, most recent first"),
    ("load <glob...>", "store more bundle files"),
    ("drill <id|index> <target...>", "drill into a stored trace"),
    ("clear", "drop every stored trace"),
    ("help", "show this help"),
    ("quit", "leave the session"),
];

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Store bundle files and list them.
    List {
        #[arg(required = true)]
        bundles: Vec<String>,
    },
    /// Store bundle files and drill into one of them.
    Drill {
        #[arg(required = true)]
        bundles: Vec<String>,
        #[arg(long)]
        target: String,
        /// Trace id or list index; defaults to the most recent trace.
        #[arg(long)]
        trace: Option<String>,
    },
    /// Read drill-down commands from stdin against the stored bundles.
    Session { bundles: Vec<String> },
}

/// Runs one command. Interactive responses go to `emit`; the returned value is
/// the command's final result.
pub fn session_command<R, E>(
    config: &Config,
    command: &SessionCommand,
    input: R,
    emit: impl FnMut(&Value) -> Result<(), E>,
) -> Result<Value, E>
where
    R: BufRead,
    E: From<DrillError>,
{
    let store = TraceStore::new(config);
    match command {
        SessionCommand::List { bundles } => {
            load_bundles(&store, bundles)?;
            Ok(serde_json::to_value(store.list()).map_err(DrillError::from)?)
        }
        SessionCommand::Drill {
            bundles,
            target,
            trace,
        } => {
            load_bundles(&store, bundles)?;
            let id = resolve_trace_id(&store, trace.as_deref())
                .or_else(|| trace.clone())
                .unwrap_or_default();
            Ok(serde_json::to_value(store.drill_down(&id, target)).map_err(DrillError::from)?)
        }
        SessionCommand::Session { bundles } => {
            if !bundles.is_empty() {
                load_bundles(&store, bundles)?;
            }
            let handled = run_session(&store, input, emit)?;
            Ok(json!({
                "status": "ok",
                "commands": handled,
                "stored": store.len(),
            }))
        }
    }
}

/// Reads every bundle matching `patterns` into `store`, returning the new ids
/// in insertion order.
pub fn load_bundles(store: &TraceStore, patterns: &[String]) -> DrillResult<Vec<String>> {
    let files = find_matching_files(patterns)?;
    if files.is_empty() {
        return Err(DrillError::InvalidArgument(format!(
            "no bundle files match {}",
            patterns.join(" ")
        )));
    }
    let mut ids = Vec::with_capacity(files.len());
    for path in files {
        let bundle = TraceBundle::read_json(&path)?;
        let id = store.store(bundle);
        tracing::info!(id = %id, path = %path.display(), "loaded bundle");
        ids.push(id);
    }
    Ok(ids)
}

/// Accepts a stored id or an index into the most-recent-first listing.
fn resolve_trace_id(store: &TraceStore, selector: Option<&str>) -> Option<String> {
    let ids = store.ids();
    let Some(selector) = selector else {
        return ids.first().cloned();
    };
    if store.get(selector).is_some() {
        return Some(selector.to_string());
    }
    match selector.parse::<usize>() {
        Ok(index) => ids.get(index).cloned(),
        Err(_) => Some(selector.to_string()),
    }
}

/// Line-oriented drill-down loop. Returns the number of commands handled.
pub fn run_session<R, E>(
    store: &TraceStore,
    input: R,
    mut emit: impl FnMut(&Value) -> Result<(), E>,
) -> Result<usize, E>
where
    R: BufRead,
    E: From<DrillError>,
{
    let mut handled = 0;
    for bytes in input.split(b'\n') {
        let bytes = bytes.map_err(DrillError::from)?;
        let Ok(line) = String::from_utf8(bytes) else {
            handled += 1;
            emit(&error_value("command is not valid UTF-8; try \"help\""))?;
            continue;
        };
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        handled += 1;

        let response = match command {
            "quit" | "exit" => break,
            "list" => serde_json::to_value(store.list()).map_err(DrillError::from)?,
            "help" => help_value(),
            "clear" => {
                let cleared = store.len();
                store.clear();
                json!({"status": "ok", "cleared": cleared})
            }
            "load" if !args.is_empty() => {
                let patterns: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                match load_bundles(store, &patterns) {
                    Ok(ids) => json!({"status": "ok", "stored": ids}),
                    Err(err) => error_value(&err.to_string()),
                }
            }
            "drill" if args.len() >= 2 => {
                let target = args[1..].join(" ");
                let id = resolve_trace_id(store, Some(args[0])).unwrap_or_else(|| args[0].to_string());
                serde_json::to_value(store.drill_down(&id, &target)).map_err(DrillError::from)?
            }
            "load" | "drill" => error_value(&format!("missing arguments for {command:?}; try \"help\"")),
            other => error_value(&format!("unknown command {other:?}; try \"help\"")),
        };
        emit(&response)?;
    }
    Ok(handled)
}

fn help_value() -> Value {
    let commands: Vec<Value> = SESSION_HELP
        .iter()
        .map(|(usage, about)| json!({"command": usage, "about": about}))
        .collect();
    json!({ "commands": commands })
}

fn error_value(message: &str) -> Value {
    json!({"status": "error", "message": message})
}
