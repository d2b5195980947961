//! String-to-integer name index.
//!
//! The hot scheduling loops avoid string hashing by mapping task and
//! resource names to consecutive `u32` ids and working over plain vectors.

use rustc_hash::FxHashMap;

/// Integer id assigned to an interned name.
pub type NameId = u32;

/// Bidirectional mapping between names and consecutive integer ids.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    to_id: FxHashMap<String, NameId>,
    names: Vec<String>,
}

impl NameIndex {
    /// Build an index from an ordered iterator of names. Ids are assigned in
    /// iteration order, so a deterministic input order gives deterministic ids.
    pub fn new(names: impl Iterator<Item = String>) -> Self {
        let names: Vec<String> = names.collect();
        let to_id = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as NameId))
            .collect();
        Self { to_id, names }
    }

    #[inline]
    pub fn get_id(&self, name: &str) -> Option<NameId> {
        self.to_id.get(name).copied()
    }

    #[inline]
    pub fn name(&self, id: NameId) -> Option<&str> {
        self.names.get(id as usize).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NameId, &str)> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| (i as NameId, name.as_str()))
    }
}
