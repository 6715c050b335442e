//! registry
//!
//! Arenas that index `Check` and `Context` instances by the repo and module
//! they were loaded from.
//!
//! # Architecture
//!
//! Per spec's "Registry global state" design note, there is no module-level
//! singleton here: `CheckRegistry` and `ContextRegistry` are plain values an
//! [`crate::engine::Engine`] owns and passes to every loader/runner call.
//! Both share one generic implementation, `Registry<T>`, mirroring how the
//! source's `ChecksRegistry` and `SharedContextsRegistry` are structurally
//! identical modulo the stored type.
//!
//! Instances live in a tombstoned arena (`Vec<Option<T>>`) so that ids handed
//! out once (and potentially referenced by a `Check`'s `dependencies_instances`
//! or `shared_context`) stay valid even after an earlier instance is removed.
//!
//! # Invariants
//!
//! - An instance appears in at most one `(repo, module)` bucket at a time.
//! - Iteration walks every live instance in insertion order across buckets.
//! - `remove` removes the first occurrence of the given id from its bucket
//!   and tombstones the arena slot; it never resurrects a removed id.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Canonicalized repo root, used as the outer registry bucket key.
pub type RepoId = PathBuf;

/// The file the plugin's classes were registered from, used as the inner
/// bucket key (the source's "py_module" concept, now a dynamic-library
/// file name).
pub type ModuleId = String;

/// A stable index into a [`Registry`]'s arena.
///
/// Ids are never reused: removing an entry tombstones its slot rather than
/// freeing it for reuse, so a `CheckId` captured before a removal is either
/// still valid or unambiguously gone, never silently pointing at a
/// different instance later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistryId(usize);

/// Stable id for a registered `Check`.
pub type CheckId = RegistryId;
/// Stable id for a registered `Context`.
pub type ContextId = RegistryId;

/// A generic repo → module → instances arena.
///
/// `T` is `Check` for the check registry and `Context` for the context
/// registry; both registries are otherwise identical.
pub struct Registry<T> {
    slots: Vec<Option<T>>,
    buckets: HashMap<RepoId, HashMap<ModuleId, Vec<RegistryId>>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            buckets: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the `(repo, module)` bucket with freshly built instances,
    /// taking ownership of each and handing back their new ids.
    pub fn extend(
        &mut self,
        repo: impl Into<RepoId>,
        module: impl Into<ModuleId>,
        instances: Vec<T>,
    ) -> Vec<RegistryId> {
        let repo = repo.into();
        let module = module.into();
        let ids: Vec<RegistryId> = instances
            .into_iter()
            .map(|instance| self.insert(instance))
            .collect();
        self.buckets
            .entry(repo)
            .or_default()
            .insert(module, ids.clone());
        ids
    }

    fn insert(&mut self, instance: T) -> RegistryId {
        let index = self.slots.len();
        self.slots.push(Some(instance));
        RegistryId(index)
    }

    pub fn get(&self, id: RegistryId) -> Option<&T> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: RegistryId) -> Option<&mut T> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    /// All live ids belonging to a given repo, across every module bucket,
    /// in insertion order.
    pub fn ids_by_repo(&self, repo: &Path) -> Vec<RegistryId> {
        let mut ids = Vec::new();
        if let Some(modules) = self.buckets.get(repo) {
            for module_ids in modules.values() {
                for &id in module_ids {
                    if self.slots[id.0].is_some() {
                        ids.push(id);
                    }
                }
            }
        }
        ids
    }

    /// All live ids across every repo and module, in insertion order.
    pub fn all_ids(&self) -> Vec<RegistryId> {
        (0..self.slots.len())
            .filter(|&i| self.slots[i].is_some())
            .map(RegistryId)
            .collect()
    }

    /// Removes the first occurrence of `id` from `repo`'s buckets and
    /// tombstones its slot. Returns the removed value, if any.
    pub fn remove(&mut self, id: RegistryId, repo: &Path) -> Option<T> {
        if let Some(modules) = self.buckets.get_mut(repo) {
            for module_ids in modules.values_mut() {
                if let Some(pos) = module_ids.iter().position(|&existing| existing == id) {
                    module_ids.remove(pos);
                    break;
                }
            }
        }
        self.slots.get_mut(id.0).and_then(|slot| slot.take())
    }

    /// Empties the registry entirely: every slot and every bucket.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.buckets.clear();
    }

    /// Total number of live instances.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegistryId, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (RegistryId(i), v)))
    }
}

impl<T> Registry<T>
where
    T: Named,
{
    /// Linear scan by name, optionally scoped to a single repo.
    pub fn get_by_name(&self, name: &str, repo: Option<&Path>) -> Option<RegistryId> {
        match repo {
            Some(repo) => self
                .ids_by_repo(repo)
                .into_iter()
                .find(|&id| self.get(id).map(|v| v.name() == name).unwrap_or(false)),
            None => self.iter().find(|(_, v)| v.name() == name).map(|(id, _)| id),
        }
    }
}

/// Implemented by anything a registry can look up by name.
pub trait Named {
    fn name(&self) -> &str;
}
