//! Core data types shared by the registrar, the gate and the fragment loader.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::ops::Deref;

/// Name of a documented module or crate, the key of every mapping.
///
/// Always non-empty. Ordering is lexicographic, which is also the order in
/// which a registry lists its modules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleName(String);

/// Error returned when a module name is empty or blank.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("module name must not be empty")]
pub struct InvalidModuleName;

impl ModuleName {
    /// Create a module name, rejecting empty or whitespace-only input.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidModuleName> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(InvalidModuleName);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModuleName {
    type Error = InvalidModuleName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ModuleName {
    type Error = InvalidModuleName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ModuleName> for String {
    fn from(value: ModuleName) -> Self {
        value.0
    }
}

impl Deref for ModuleName {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ModuleName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One fact: `implementor_id` implements `trait_id`.
///
/// Records are produced upstream and never interpreted beyond their
/// identifiers; `display_facts` is carried through untouched for the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplementorRecord {
    trait_id: String,
    implementor_id: String,
    generic_parameters: Vec<String>,
    display_facts: serde_json::Value,
}

impl ImplementorRecord {
    pub fn new(trait_id: impl Into<String>, implementor_id: impl Into<String>) -> Self {
        Self {
            trait_id: trait_id.into(),
            implementor_id: implementor_id.into(),
            generic_parameters: Vec::new(),
            display_facts: serde_json::Value::Null,
        }
    }

    /// Set the ordered type parameters of a generic (blanket) impl.
    pub fn with_generic_parameters<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_parameters = params.into_iter().map(Into::into).collect();
        self
    }

    /// Attach the opaque, human-facing payload (labels, links).
    pub fn with_display_facts(mut self, facts: serde_json::Value) -> Self {
        self.display_facts = facts;
        self
    }

    pub fn trait_id(&self) -> &str {
        &self.trait_id
    }

    pub fn implementor_id(&self) -> &str {
        &self.implementor_id
    }

    pub fn generic_parameters(&self) -> &[String] {
        &self.generic_parameters
    }

    pub fn display_facts(&self) -> &serde_json::Value {
        &self.display_facts
    }

    /// True when the impl applies to a family of types through a type parameter.
    pub fn is_blanket(&self) -> bool {
        !self.generic_parameters.is_empty()
    }
}

/// The records contributed by a single fragment, keyed by module.
///
/// Pushing under an existing key appends; record order within a module is
/// kept exactly as inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleMapping {
    modules: BTreeMap<ModuleName, Vec<ImplementorRecord>>,
}

impl ModuleMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record under `module`.
    pub fn push(&mut self, module: ModuleName, record: ImplementorRecord) {
        self.modules.entry(module).or_default().push(record);
    }

    /// Append a sequence of records under `module`, keeping their order.
    pub fn extend_module<I>(&mut self, module: ModuleName, records: I)
    where
        I: IntoIterator<Item = ImplementorRecord>,
    {
        self.modules.entry(module).or_default().extend(records);
    }

    /// Builder-style variant of [`Self::extend_module`].
    pub fn with_module<I>(mut self, module: ModuleName, records: I) -> Self
    where
        I: IntoIterator<Item = ImplementorRecord>,
    {
        self.extend_module(module, records);
        self
    }

    pub fn get(&self, module: &str) -> Option<&[ImplementorRecord]> {
        self.modules.get(module).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Total number of records across all modules.
    pub fn record_count(&self) -> usize {
        self.modules.values().map(Vec::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ModuleName, &[ImplementorRecord])> {
        self.modules.iter().map(|(name, records)| (name, records.as_slice()))
    }
}

impl IntoIterator for ModuleMapping {
    type Item = (ModuleName, Vec<ImplementorRecord>);
    type IntoIter = btree_map::IntoIter<ModuleName, Vec<ImplementorRecord>>;

    fn into_iter(self) -> Self::IntoIter {
        self.modules.into_iter()
    }
}

impl FromIterator<(ModuleName, ImplementorRecord)> for ModuleMapping {
    fn from_iter<T: IntoIterator<Item = (ModuleName, ImplementorRecord)>>(iter: T) -> Self {
        let mut mapping = Self::new();
        for (module, record) in iter {
            mapping.push(module, record);
        }
        mapping
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case("")]
    #[case("   ")]
    fn test_module_name_rejects_blank(#[case] input: &str) {
        check!(ModuleName::new(input) == Err(InvalidModuleName));
    }

    #[test]
    fn test_module_name_deserialize_validates() {
        let ok: Result<ModuleName, _> = serde_json::from_str("\"zkgroup\"");
        check!(ok.map(String::from).ok() == Some("zkgroup".to_string()));

        let err: Result<ModuleName, _> = serde_json::from_str("\"\"");
        check!(err.is_err());
    }

    #[test]
    fn test_push_appends_in_order() {
        let module = ModuleName::new("presage").unwrap();
        let mut mapping = ModuleMapping::new();
        mapping.push(module.clone(), ImplementorRecord::new("Eq", "Thread"));
        mapping.push(module, ImplementorRecord::new("Eq", "Contact"));

        let ids: Vec<_> = mapping
            .get("presage")
            .unwrap()
            .iter()
            .map(ImplementorRecord::implementor_id)
            .collect();
        check!(ids == ["Thread", "Contact"]);
        check!(mapping.record_count() == 2);
        check!(mapping.module_count() == 1);
    }

    #[test]
    fn test_blanket_record() {
        let plain = ImplementorRecord::new("core::fmt::Debug", "Uuid");
        let blanket =
            ImplementorRecord::new("core::fmt::Debug", "Wrapper").with_generic_parameters(["T"]);

        check!(!plain.is_blanket());
        check!(blanket.is_blanket());
        check!(blanket.generic_parameters() == ["T".to_string()]);
    }
}
