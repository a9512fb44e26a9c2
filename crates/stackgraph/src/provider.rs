//! Provisioning boundary and progress hooks
//!
//! The core never talks to a cloud API itself. Callers implement
//! [`Provisioner`] (closures work too) and optionally [`ProgressCallback`].

use crate::error::ProviderError;
use crate::graph::ResourceGraph;
use crate::propagate::ResolvedConfig;
use crate::types::{Outputs, ResourceState};
use std::collections::HashMap;
use std::fmt;

/// Applies a single resource and returns its outputs
///
/// Implementations are called from worker threads when the executor runs
/// layers in parallel, hence `Send + Sync`.
pub trait Provisioner: Send + Sync {
    /// Apply `name` with its fully resolved configuration
    fn apply(&self, name: &str, config: &ResolvedConfig) -> Result<Outputs, ProviderError>;
}

impl<F> Provisioner for F
where
    F: Fn(&str, &ResolvedConfig) -> Result<Outputs, ProviderError> + Send + Sync,
{
    fn apply(&self, name: &str, config: &ResolvedConfig) -> Result<Outputs, ProviderError> {
        self(name, config)
    }
}

/// Dispatches to a provisioner by the resource's provider identifier
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Box<dyn Provisioner>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provisioner, replacing any previous one with the same id
    pub fn register(&mut self, id: impl Into<String>, provisioner: impl Provisioner + 'static) {
        self.providers.insert(id.into(), Box::new(provisioner));
    }

    /// Builder-style [`register`](Self::register)
    pub fn with(mut self, id: impl Into<String>, provisioner: impl Provisioner + 'static) -> Self {
        self.register(id, provisioner);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// Provider ids the graph uses that have no registered provisioner
    pub fn missing_for<'g>(&self, graph: &'g ResourceGraph) -> Vec<&'g str> {
        graph
            .providers()
            .into_iter()
            .filter(|id| !self.contains(id))
            .collect()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.providers.keys().collect();
        ids.sort();
        f.debug_struct("ProviderRegistry")
            .field("providers", &ids)
            .finish()
    }
}

impl Provisioner for ProviderRegistry {
    fn apply(&self, name: &str, config: &ResolvedConfig) -> Result<Outputs, ProviderError> {
        match self.providers.get(&config.provider) {
            Some(provisioner) => provisioner.apply(name, config),
            None => Err(ProviderError::fatal(format!(
                "no provisioner registered for provider '{}'",
                config.provider
            ))),
        }
    }
}

/// Progress callback for execution
///
/// Methods take `&self` because parallel layers report from worker threads.
pub trait ProgressCallback: Send + Sync {
    /// Called before a layer is applied concurrently
    fn on_layer_start(&self, _index: usize, _count: usize) {}

    /// Called when a resource moves to `Applying`
    fn on_resource_start(&self, _name: &str) {}

    /// Called with the final state of a resource
    fn on_resource_complete(&self, _name: &str, _state: &ResourceState) {}
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceSpec;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    fn resolved(provider: &str) -> ResolvedConfig {
        ResolvedConfig {
            name: "storage".into(),
            provider: provider.into(),
            inputs: BTreeMap::new(),
            config: Value::Null,
        }
    }

    fn bucket(_name: &str, _config: &ResolvedConfig) -> Result<Outputs, ProviderError> {
        let mut outputs = Outputs::new();
        outputs.insert("bucket_arn".into(), json!("arn:aws:s3:::blog"));
        Ok(outputs)
    }

    #[test]
    fn test_registry_dispatches_by_provider() {
        let registry = ProviderRegistry::new()
            .with("aws", bucket)
            .with("cf", |_: &str, _: &ResolvedConfig| {
                Err(ProviderError::transient("rate limited"))
            });

        let outputs = registry.apply("storage", &resolved("aws")).unwrap();
        assert_eq!(outputs["bucket_arn"], "arn:aws:s3:::blog");

        let err = registry.apply("storage", &resolved("cf")).unwrap_err();
        assert!(err.retryable);
    }

    #[test]
    fn test_registry_unknown_provider_is_fatal() {
        let registry = ProviderRegistry::new();
        let err = registry.apply("storage", &resolved("gcp")).unwrap_err();
        assert!(!err.retryable);
        assert!(err.message.contains("gcp"));
    }

    #[test]
    fn test_missing_for_graph() {
        let graph = ResourceGraph::build(vec![
            ResourceSpec::new("storage", "aws"),
            ResourceSpec::new("dns", "cf"),
        ])
        .unwrap();
        let registry = ProviderRegistry::new().with("aws", bucket);
        assert_eq!(registry.missing_for(&graph), vec!["cf"]);
    }
}
