//! Resource graph - validated declarations plus dependency edges

use crate::error::{GraphError, Result};
use crate::template;
use crate::types::{Reference, ResourceSpec, is_valid_segment};
use log::debug;
use std::collections::HashMap;

/// A validated set of resource declarations
///
/// Every reference points at a declared resource and output key. Cycles are
/// not checked here; see [`crate::planner::plan`].
#[derive(Debug, Clone)]
pub struct ResourceGraph {
    specs: Vec<ResourceSpec>,
    index: HashMap<String, usize>,
    /// References per resource, inputs first then placeholders
    references: Vec<Vec<Reference>>,
    /// Dependency indices per resource, ascending and deduplicated
    deps: Vec<Vec<usize>>,
}

impl ResourceGraph {
    /// Build a graph from declarations in declaration order
    ///
    /// Fails on names that cannot be referenced, duplicate names, and
    /// references to undeclared resources or output keys. No partial graph
    /// is returned.
    pub fn build(specs: impl IntoIterator<Item = ResourceSpec>) -> Result<Self> {
        let specs: Vec<ResourceSpec> = specs.into_iter().collect();

        let mut index = HashMap::with_capacity(specs.len());
        for (i, spec) in specs.iter().enumerate() {
            if !is_valid_segment(&spec.name) {
                return Err(GraphError::InvalidName {
                    name: spec.name.clone(),
                });
            }
            if index.insert(spec.name.clone(), i).is_some() {
                return Err(GraphError::DuplicateName {
                    name: spec.name.clone(),
                });
            }
        }

        let mut references = Vec::with_capacity(specs.len());
        let mut deps = Vec::with_capacity(specs.len());
        for spec in &specs {
            let refs = template::references(spec)?;
            let mut targets = Vec::with_capacity(refs.len());
            for reference in &refs {
                let target = index
                    .get(&reference.resource)
                    .copied()
                    .filter(|&t| specs[t].outputs.contains(&reference.output))
                    .ok_or_else(|| GraphError::UnknownReference {
                        resource: spec.name.clone(),
                        reference: reference.clone(),
                    })?;
                targets.push(target);
            }
            targets.sort_unstable();
            targets.dedup();
            debug!(
                "resource {} depends on {} resource(s)",
                spec.name,
                targets.len()
            );
            references.push(refs);
            deps.push(targets);
        }

        Ok(Self {
            specs,
            index,
            references,
            deps,
        })
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if the graph has no resources
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Declarations in declaration order
    pub fn specs(&self) -> &[ResourceSpec] {
        &self.specs
    }

    /// Look up a declaration by name
    pub fn get(&self, name: &str) -> Option<&ResourceSpec> {
        self.index_of(name).map(|i| &self.specs[i])
    }

    /// Declaration index of a resource
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// All references a resource makes
    pub fn references(&self, name: &str) -> &[Reference] {
        self.index_of(name)
            .map_or(&[], |i| self.references[i].as_slice())
    }

    /// Resources this resource reads outputs from, in declaration order
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|i| {
                self.deps[i]
                    .iter()
                    .map(|&d| self.specs[d].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Resources that read this resource's outputs, in declaration order
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        let Some(target) = self.index_of(name) else {
            return Vec::new();
        };
        self.deps
            .iter()
            .enumerate()
            .filter(|(_, deps)| deps.contains(&target))
            .map(|(i, _)| self.specs[i].name.as_str())
            .collect()
    }

    /// Provider identifiers in first-use order
    pub fn providers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for spec in &self.specs {
            if !seen.contains(&spec.provider.as_str()) {
                seen.push(&spec.provider);
            }
        }
        seen
    }

    pub(crate) fn deps_at(&self, i: usize) -> &[usize] {
        &self.deps[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage() -> ResourceSpec {
        ResourceSpec::new("storage", "aws").output("bucket_arn")
    }

    fn network() -> ResourceSpec {
        ResourceSpec::new("network", "aws")
            .output("cf_arn")
            .output("cf_domain")
            .input("bucket", "storage", "bucket_arn")
    }

    #[test]
    fn test_build_derives_edges() {
        let graph = ResourceGraph::build(vec![storage(), network()]).unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(graph.dependencies("network"), vec!["storage"]);
        assert_eq!(graph.dependents("storage"), vec!["network"]);
        assert!(graph.dependencies("storage").is_empty());
    }

    #[test]
    fn test_build_rejects_duplicate_name() {
        let err = ResourceGraph::build(vec![storage(), storage()]).unwrap_err();
        assert_eq!(
            err,
            GraphError::DuplicateName {
                name: "storage".into()
            }
        );
    }

    #[test]
    fn test_build_rejects_unreferenceable_names() {
        for name in ["", "cdn.edge", "my bucket"] {
            let err = ResourceGraph::build(vec![ResourceSpec::new(name, "aws")]).unwrap_err();
            assert_eq!(err, GraphError::InvalidName { name: name.into() });
        }
    }

    #[test]
    fn test_shell_braces_escaped_in_command_args() {
        let cdn = ResourceSpec::new("cdn", "command")
            .output("domain")
            .config(json!({"command": "sh", "args": ["-c", "echo $${HOME}"]}));
        let graph = ResourceGraph::build(vec![cdn]).unwrap();
        assert!(graph.references("cdn").is_empty());

        let unescaped = ResourceSpec::new("cdn", "command")
            .config(json!({"command": "sh", "args": ["-c", "echo ${HOME}"]}));
        let err = ResourceGraph::build(vec![unescaped]).unwrap_err();
        assert!(matches!(err, GraphError::InvalidReference { .. }));
    }

    #[test]
    fn test_build_rejects_unknown_resource() {
        let ghostly = ResourceSpec::new("site", "aws").input("x", "ghost", "output");

        let err = ResourceGraph::build(vec![ghostly]).unwrap_err();
        assert_eq!(
            err,
            GraphError::UnknownReference {
                resource: "site".into(),
                reference: Reference::new("ghost", "output"),
            }
        );
    }

    #[test]
    fn test_build_rejects_missing_storage() {
        let err = ResourceGraph::build(vec![network()]).unwrap_err();
        match err {
            GraphError::UnknownReference { reference, .. } => {
                assert_eq!(reference.to_string(), "storage.bucket_arn");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_build_rejects_undeclared_output_key() {
        let reader = ResourceSpec::new("network", "aws").input("bucket", "storage", "bucket_name");

        let err = ResourceGraph::build(vec![storage(), reader]).unwrap_err();
        assert!(matches!(err, GraphError::UnknownReference { .. }));
    }

    #[test]
    fn test_placeholders_count_as_dependencies() {
        let dns = ResourceSpec::new("cloudflare", "cf")
            .output("record_id")
            .config(json!({"content": "${network.cf_domain}"}));

        let graph = ResourceGraph::build(vec![storage(), network(), dns]).unwrap();
        assert_eq!(graph.dependencies("cloudflare"), vec!["network"]);
        assert_eq!(
            graph.references("cloudflare"),
            &[Reference::new("network", "cf_domain")]
        );
    }

    #[test]
    fn test_repeated_references_make_one_edge() {
        let reader = ResourceSpec::new("site", "aws")
            .input("arn", "storage", "bucket_arn")
            .config(json!({"policy": "allow ${storage.bucket_arn}"}));

        let graph = ResourceGraph::build(vec![storage(), reader]).unwrap();
        assert_eq!(graph.dependencies("site"), vec!["storage"]);
        assert_eq!(graph.references("site").len(), 1);
    }

    #[test]
    fn test_providers_first_use_order() {
        let dns = ResourceSpec::new("cloudflare", "cf").input("d", "network", "cf_domain");
        let graph = ResourceGraph::build(vec![storage(), dns, network()]).unwrap();
        assert_eq!(graph.providers(), vec!["aws", "cf"]);
    }
}
