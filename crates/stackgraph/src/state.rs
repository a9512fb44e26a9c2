//! Per-run resource state
//!
//! The executor owns a [`StateStore`] for the duration of a run. Each
//! resource's state sits behind its own `RwLock`, so a worker recording one
//! resource's outputs never blocks readers of another resource.

use crate::types::{Reference, ResourceState, ResourceStatus};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

/// Read access to applied outputs, as needed by the value propagator
pub trait StateLookup {
    /// Status of a resource, None if it is not tracked
    fn status(&self, name: &str) -> Option<ResourceStatus>;

    /// Value of `reference`, only if its resource is applied and produced it
    fn lookup(&self, reference: &Reference) -> Option<Value>;
}

impl StateLookup for HashMap<String, ResourceState> {
    fn status(&self, name: &str) -> Option<ResourceStatus> {
        self.get(name).map(|s| s.status)
    }

    fn lookup(&self, reference: &Reference) -> Option<Value> {
        self.get(&reference.resource)?
            .output(&reference.output)
            .cloned()
    }
}

impl StateLookup for BTreeMap<String, ResourceState> {
    fn status(&self, name: &str) -> Option<ResourceStatus> {
        self.get(name).map(|s| s.status)
    }

    fn lookup(&self, reference: &Reference) -> Option<Value> {
        self.get(&reference.resource)?
            .output(&reference.output)
            .cloned()
    }
}

/// Resource states keyed by name, fixed when the run starts
#[derive(Debug, Default)]
pub struct StateStore {
    states: HashMap<String, RwLock<ResourceState>>,
}

impl StateStore {
    /// Track the given resources, all `Pending`
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            states: names
                .into_iter()
                .map(|n| (n.into(), RwLock::new(ResourceState::pending())))
                .collect(),
        }
    }

    /// Copy of a resource's current state
    pub fn get(&self, name: &str) -> Option<ResourceState> {
        self.states
            .get(name)
            .map(|lock| lock.read().unwrap_or_else(PoisonError::into_inner).clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.states.contains_key(name)
    }

    /// Replace a resource's state; untracked names are ignored
    pub(crate) fn set(&self, name: &str, state: ResourceState) {
        if let Some(lock) = self.states.get(name) {
            *lock.write().unwrap_or_else(PoisonError::into_inner) = state;
        }
    }

    pub(crate) fn mark_applying(&self, name: &str) {
        if let Some(lock) = self.states.get(name) {
            lock.write()
                .unwrap_or_else(PoisonError::into_inner)
                .status = ResourceStatus::Applying;
        }
    }

    /// Copy of every state
    pub fn snapshot(&self) -> HashMap<String, ResourceState> {
        self.states
            .iter()
            .map(|(name, lock)| {
                (
                    name.clone(),
                    lock.read().unwrap_or_else(PoisonError::into_inner).clone(),
                )
            })
            .collect()
    }
}

impl StateLookup for StateStore {
    fn status(&self, name: &str) -> Option<ResourceStatus> {
        self.states
            .get(name)
            .map(|lock| lock.read().unwrap_or_else(PoisonError::into_inner).status)
    }

    fn lookup(&self, reference: &Reference) -> Option<Value> {
        let lock = self.states.get(&reference.resource)?;
        let state = lock.read().unwrap_or_else(PoisonError::into_inner);
        state.output(&reference.output).cloned()
    }
}
