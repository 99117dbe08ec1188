//! Loading implementor fragments from disk.
//!
//! A fragment document is a JSON object with an optional default `trait` and
//! an `implementors` map from module name to record list. Records lacking a
//! trait or implementor id are skipped with a warning; one bad record never
//! discards the rest of its fragment, and one unreadable fragment never stops
//! the others from loading.

use crate::error::FragmentError;
use crate::types::{ImplementorRecord, ModuleMapping, ModuleName};
use ignore::WalkBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File extension of fragment documents.
pub const FRAGMENT_EXTENSION: &str = "json";

#[derive(Debug, Deserialize)]
struct FragmentDocument {
    /// Default trait id for records that do not name one
    #[serde(rename = "trait", default)]
    trait_id: Option<String>,
    #[serde(default)]
    implementors: BTreeMap<String, Vec<RawRecord>>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "trait", default)]
    trait_id: Option<String>,
    #[serde(default)]
    implementor: Option<String>,
    #[serde(default)]
    generics: Vec<String>,
    #[serde(default)]
    display: serde_json::Value,
}

/// A parsed fragment and what was dropped while building it.
#[derive(Debug, Clone, Default)]
pub struct Fragment {
    /// Where the fragment was loaded from, if it came from disk
    pub source: Option<PathBuf>,
    /// The usable records, keyed by module
    pub mapping: ModuleMapping,
    /// Records (or whole modules) skipped as malformed
    pub skipped: usize,
}

impl Fragment {
    /// Parse fragment JSON text.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let document: FragmentDocument = serde_json::from_str(text)?;
        Ok(build_fragment(document))
    }

    /// Read and parse a fragment file.
    pub fn load(path: &Path) -> Result<Self, FragmentError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FragmentError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                FragmentError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut fragment = Self::parse(&text).map_err(|source| FragmentError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fragment.source = Some(path.to_path_buf());

        if fragment.skipped > 0 {
            tracing::warn!(
                "Skipped {} malformed records in {}",
                fragment.skipped,
                path.display()
            );
        }
        Ok(fragment)
    }
}

fn build_fragment(document: FragmentDocument) -> Fragment {
    let FragmentDocument {
        trait_id: default_trait,
        implementors,
    } = document;

    let mut mapping = ModuleMapping::new();
    let mut skipped = 0;

    for (module, raw_records) in implementors {
        let Ok(module) = ModuleName::new(module) else {
            tracing::warn!(
                "Skipping {} records under an empty module name",
                raw_records.len()
            );
            skipped += raw_records.len();
            continue;
        };

        let mut records = Vec::with_capacity(raw_records.len());
        for (position, raw) in raw_records.into_iter().enumerate() {
            match build_record(raw, default_trait.as_deref()) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    tracing::warn!("Skipping record {} of {}: {}", position, module, reason);
                    skipped += 1;
                }
            }
        }
        mapping.extend_module(module, records);
    }

    Fragment {
        source: None,
        mapping,
        skipped,
    }
}

fn build_record(
    raw: RawRecord,
    default_trait: Option<&str>,
) -> Result<ImplementorRecord, &'static str> {
    let trait_id = raw
        .trait_id
        .as_deref()
        .or(default_trait)
        .filter(|id| !id.trim().is_empty())
        .ok_or("missing trait id")?;

    let implementor_id = raw
        .implementor
        .filter(|id| !id.trim().is_empty())
        .ok_or("missing implementor id")?;

    if raw.generics.iter().any(|param| param.trim().is_empty()) {
        return Err("empty generic parameter name");
    }

    Ok(ImplementorRecord::new(trait_id, implementor_id)
        .with_generic_parameters(raw.generics)
        .with_display_facts(raw.display))
}

/// Find every fragment document below `dir`, sorted by path.
///
/// Sorting gives a stable load order independent of directory iteration.
pub fn discover_fragments(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkBuilder::new(dir)
        .standard_filters(false)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(ignore::DirEntry::into_path)
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == FRAGMENT_EXTENSION)
        })
        .collect();

    paths.sort();
    tracing::debug!("Discovered {} fragments in {}", paths.len(), dir.display());
    paths
}

/// Load fragments in the given order, logging and skipping unreadable ones.
pub fn load_fragments<I, P>(paths: I) -> Vec<Fragment>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    paths
        .into_iter()
        .filter_map(|path| match Fragment::load(path.as_ref()) {
            Ok(fragment) => Some(fragment),
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        })
        .collect()
}
