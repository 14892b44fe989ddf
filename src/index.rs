//! Name lookup.
//!
//! Built once from a finished [`Topology`] and never modified, so shared
//! readers need no locking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::BuildError;
use crate::topology::{NodeId, Topology};

/// Read-only map from node name to [`NodeId`].
#[derive(Debug, Clone, Default)]
pub struct NodeIndex {
    by_name: HashMap<Box<str>, NodeId>,
}

impl NodeIndex {
    /// Index every node of `topology` by name.
    ///
    /// # Errors
    ///
    /// [`BuildError::DuplicateName`] on the first repeated name.
    pub fn build(topology: &Topology) -> Result<Self, BuildError> {
        let mut by_name: HashMap<Box<str>, NodeId> = HashMap::with_capacity(topology.len());

        for id in topology.ids() {
            match by_name.entry(topology.name(id).into()) {
                Entry::Occupied(existing) => {
                    return Err(BuildError::DuplicateName {
                        name: topology.name(id).to_owned(),
                        first: existing.get().index(),
                        second: id.index(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(id);
                }
            }
        }

        Ok(Self { by_name })
    }

    /// Handle for `name`, if present.
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Number of indexed names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// True if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}
