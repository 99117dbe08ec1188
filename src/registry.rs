//! The session-wide implementor registry and its lookup views.

use crate::types::{ImplementorRecord, ModuleMapping, ModuleName};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Implementor records accumulated from every fragment seen in a session.
///
/// Each module's sequence is the concatenation, in load order, of every
/// fragment's contribution under that module. Nothing is deduplicated or
/// reordered: registering the same fragment twice yields its records twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalRegistry {
    modules: BTreeMap<ModuleName, Vec<ImplementorRecord>>,
}

impl GlobalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every module sequence of `mapping` to this registry.
    ///
    /// Returns the number of records appended.
    pub fn merge(&mut self, mapping: ModuleMapping) -> usize {
        let mut appended = 0;
        for (module, records) in mapping {
            appended += records.len();
            match self.modules.get_mut(&module) {
                Some(existing) => {
                    tracing::trace!(
                        "Appending {} records to existing module {}",
                        records.len(),
                        module
                    );
                    existing.extend(records);
                }
                None => {
                    self.modules.insert(module, records);
                }
            }
        }
        appended
    }

    /// Records registered under `module`, in load order.
    pub fn get(&self, module: &str) -> Option<&[ImplementorRecord]> {
        self.modules.get(module).map(Vec::as_slice)
    }

    pub fn contains_module(&self, module: &str) -> bool {
        self.modules.contains_key(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = (&ModuleName, &[ImplementorRecord])> {
        self.modules.iter().map(|(name, records)| (name, records.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn record_count(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }

    /// Every record implementing `trait_id`, across all modules.
    ///
    /// Results follow module order, then load order within a module.
    pub fn implementors_of<'a>(
        &'a self,
        trait_id: &'a str,
    ) -> impl Iterator<Item = (&'a ModuleName, &'a ImplementorRecord)> + 'a {
        self.modules.iter().flat_map(move |(module, records)| {
            records
                .iter()
                .filter(move |record| record.trait_id() == trait_id)
                .map(move |record| (module, record))
        })
    }

    /// Build a lookup table from trait id to its implementors.
    ///
    /// Useful when a viewer answers many trait queries against one snapshot.
    pub fn trait_index(&self) -> TraitIndex<'_> {
        let mut by_trait: AHashMap<&str, Vec<(&ModuleName, &ImplementorRecord)>> =
            AHashMap::new();
        for (module, records) in &self.modules {
            for record in records {
                by_trait
                    .entry(record.trait_id())
                    .or_default()
                    .push((module, record));
            }
        }
        TraitIndex { by_trait }
    }
}

/// Borrowed per-trait view over a [`GlobalRegistry`].
#[derive(Debug)]
pub struct TraitIndex<'a> {
    by_trait: AHashMap<&'a str, Vec<(&'a ModuleName, &'a ImplementorRecord)>>,
}

impl<'a> TraitIndex<'a> {
    pub fn implementors(&self, trait_id: &str) -> &[(&'a ModuleName, &'a ImplementorRecord)] {
        self.by_trait.get(trait_id).map_or(&[][..], Vec::as_slice)
    }

    /// Trait ids present in the index, sorted.
    pub fn traits(&self) -> Vec<&'a str> {
        let mut traits: Vec<&str> = self.by_trait.keys().copied().collect();
        traits.sort_unstable();
        traits
    }

    pub fn len(&self) -> usize {
        self.by_trait.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_trait.is_empty()
    }
}
