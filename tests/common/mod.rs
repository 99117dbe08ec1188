//! Shared test fixtures and utilities for integration tests.
//!
//! # Available Fixtures
//!
//! - `recorder`: a consumer that keeps every registry it receives
//! - `fragment_dir`: a temp directory for fragment documents on disk
//!
//! Records are built with [`rec`], and mappings with [`mapping`], so tests can
//! spell out the scenarios compactly.

use rstest::fixture;
use rustdoc_implementors::{
    ConsumerHandle, ImplementorRecord, ModuleMapping, ModuleName, Snapshot,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Build a record implementing the trait `Eq`.
#[allow(dead_code)] // Used by some integration test crates only
pub fn rec(implementor: &str) -> ImplementorRecord {
    ImplementorRecord::new("core::cmp::Eq", implementor)
}

/// Build a mapping from `(module, records)` pairs.
#[allow(dead_code)] // Used by some integration test crates only
pub fn mapping<const N: usize>(modules: [(&str, Vec<ImplementorRecord>); N]) -> ModuleMapping {
    modules
        .into_iter()
        .fold(ModuleMapping::new(), |mapping, (module, records)| {
            mapping.with_module(ModuleName::new(module).unwrap(), records)
        })
}

/// Implementor ids registered under `module`, in order.
#[allow(dead_code)] // Used by some integration test crates only
pub fn implementors(registry: &Snapshot, module: &str) -> Vec<String> {
    registry
        .get(module)
        .unwrap_or_default()
        .iter()
        .map(|record| record.implementor_id().to_string())
        .collect()
}

/// A consumer that records every delivery.
#[derive(Clone)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Snapshot>>>,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl Recorder {
    pub fn new() -> Self {
        Self {
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A handle that pushes each delivered registry into this recorder.
    pub fn handle(&self) -> ConsumerHandle {
        let seen = Arc::clone(&self.seen);
        ConsumerHandle::new(move |registry| seen.lock().unwrap().push(registry))
    }

    pub fn deliveries(&self) -> Vec<Snapshot> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[allow(dead_code)] // Used by some integration test crates only
#[fixture]
pub fn recorder() -> Recorder {
    Recorder::new()
}

/// A temporary directory holding fragment documents.
///
/// Cleaned up when dropped.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct FragmentDir {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl FragmentDir {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Writes `content` to `relative`, creating parent directories.
    ///
    /// # Panics
    /// Panics if the file cannot be written.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(relative);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent directory for '{}': {}", relative, e)
            });
        }
        std::fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", relative, e));
        full_path
    }

    /// Writes a fragment for trait `Eq` from `(module, implementor)` pairs.
    ///
    /// Pairs sharing a module keep their order within that module.
    pub fn write_fragment(&self, relative: &str, records: &[(&str, &str)]) -> PathBuf {
        let mut implementors = serde_json::Map::new();
        for (module, implementor) in records {
            let entry = implementors
                .entry((*module).to_string())
                .or_insert_with(|| serde_json::Value::Array(Vec::new()));
            if let serde_json::Value::Array(list) = entry {
                list.push(serde_json::json!({ "implementor": implementor }));
            }
        }
        let document = serde_json::json!({
            "trait": "core::cmp::Eq",
            "implementors": implementors,
        });
        self.write(relative, &document.to_string())
    }
}

#[allow(dead_code)] // Used by some integration test crates only
#[fixture]
pub fn fragment_dir() -> FragmentDir {
    FragmentDir::new()
}
