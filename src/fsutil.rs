//! Locating trace bundle files on disk.

use globset::{Glob, GlobSet, GlobSetBuilder};

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{DrillError, DrillResult};

const BUNDLE_EXTENSION: &str = "json";

/// How one command-line argument picks bundle files.
#[derive(Debug)]
enum BundleSelector {
    File(PathBuf),
    /// Every `.json` bundle beneath the directory.
    Directory(PathBuf),
    /// Glob pattern, walked from the directory its literal prefix names.
    Glob { root: PathBuf },
}

impl BundleSelector {
    fn parse(arg: &str) -> Self {
        if has_glob_meta(arg) {
            return Self::Glob {
                root: glob_root(arg),
            };
        }
        let path = PathBuf::from(arg);
        if path.is_dir() {
            Self::Directory(path)
        } else {
            Self::File(path)
        }
    }
}

/// Resolves bundle files, directories and glob patterns to bundle paths,
/// sorted and deduplicated. Missing plain files are skipped.
pub fn find_matching_files(args: &[String]) -> DrillResult<Vec<PathBuf>> {
    let globs: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| has_glob_meta(a))
        .collect();
    let set = compile_globset(&globs)?;
    let cwd = std::env::current_dir()?;
    let mut out = BTreeSet::new();

    for arg in args {
        match BundleSelector::parse(arg) {
            BundleSelector::File(path) => {
                if path.is_file() {
                    out.insert(path);
                }
            }
            BundleSelector::Directory(dir) => {
                for path in walk_files(&dir)? {
                    if is_bundle_file(&path) {
                        out.insert(path);
                    }
                }
            }
            BundleSelector::Glob { root } => {
                if !root.is_dir() {
                    continue;
                }
                for path in walk_files(&root)? {
                    let rel = path.strip_prefix(".").unwrap_or(&path).to_path_buf();
                    if set.is_match(&rel) || set.is_match(cwd.join(&rel)) {
                        out.insert(rel);
                    }
                }
            }
        }
    }
    Ok(out.into_iter().collect())
}

fn walk_files(root: &Path) -> DrillResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !should_skip_dir(e.path()))
    {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            DrillError::Io(e.into_io_error().unwrap_or_else(|| std::io::Error::other(msg)))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Deepest literal directory of a glob pattern, or `.`.
fn glob_root(pattern: &str) -> PathBuf {
    let prefix = pattern
        .split(['*', '?', '[', ']', '{', '}'])
        .next()
        .unwrap_or_default();
    let literal = match prefix.rfind('/') {
        Some(0) => "/",
        Some(i) => &prefix[..i],
        None => "",
    };
    if literal.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(literal)
    }
}

fn is_bundle_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(BUNDLE_EXTENSION))
}

fn should_skip_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| matches!(name, ".git" | "target" | "node_modules" | "DerivedData"))
}

fn compile_globset(patterns: &[&str]) -> DrillResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for p in patterns {
        let glob = Glob::new(p)
            .map_err(|e| DrillError::InvalidArgument(format!("invalid glob {p:?}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| DrillError::InvalidArgument(format!("invalid globset: {e}")))
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']', '{', '}'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tracedrill-fsutil-{name}-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn absolute_file_path_is_accepted() {
        let root = temp_dir("abs-file");
        let bundle = root.join("cpu.trace.json");
        std::fs::write(&bundle, br#"{"source_path":"x","template":"Time Profiler"}"#)
            .expect("write bundle");
        let matches = find_matching_files(&[bundle.to_string_lossy().to_string()]).expect("match");
        assert_eq!(matches, vec![bundle]);
    }

    #[test]
    fn directory_collects_nested_json_bundles() {
        let root = temp_dir("dir");
        std::fs::create_dir_all(root.join("nested")).expect("mkdir");
        std::fs::write(root.join("cpu.json"), b"{}").expect("write");
        std::fs::write(root.join("nested").join("hangs.JSON"), b"{}").expect("write");
        std::fs::write(root.join("notes.txt"), b"x").expect("write");
        let matches = find_matching_files(&[root.to_string_lossy().to_string()]).expect("match");
        assert_eq!(matches.len(), 2);
        assert!(matches.contains(&root.join("cpu.json")));
        assert!(matches.contains(&root.join("nested").join("hangs.JSON")));
    }

    #[test]
    fn glob_matches_only_bundles() {
        let root = temp_dir("glob");
        std::fs::write(root.join("a.trace.json"), b"{}").expect("write");
        std::fs::write(root.join("b.trace.json"), b"{}").expect("write");
        std::fs::write(root.join("notes.txt"), b"x").expect("write");
        let pattern = format!("{}/*.trace.json", root.display());
        let matches = find_matching_files(&[pattern]).expect("match");
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|p| p.to_string_lossy().ends_with(".trace.json")));
    }

    #[test]
    fn glob_root_is_the_literal_directory() {
        assert_eq!(glob_root("traces/cpu-*.json"), PathBuf::from("traces"));
        assert_eq!(glob_root("*.json"), PathBuf::from("."));
        assert_eq!(glob_root("/tmp/run/**/*.json"), PathBuf::from("/tmp/run"));
    }

    #[test]
    fn invalid_glob_is_rejected() {
        let err = find_matching_files(&["[".to_string()]).expect_err("bad glob");
        assert!(matches!(err, DrillError::InvalidArgument(_)));
    }
}
