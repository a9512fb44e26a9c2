//! # stackgraph
//!
//! Dependency resolution and apply planning for declared infrastructure.
//!
//! A stack is a set of [`ResourceSpec`]s. Each declares the outputs it
//! produces and references other resources' outputs as inputs. This crate
//! validates those references, orders the resources so that every producer
//! is applied before its consumers, and walks the plan while substituting
//! produced values into downstream configuration.
//!
//! ## Core Concepts
//!
//! - **ResourceGraph**: validated declarations plus dependency edges
//! - **ApplyPlan**: deterministic topological order (and parallel layers)
//! - **ResolvedConfig**: a resource's payload with references substituted
//! - **Executor**: applies the plan through a [`Provisioner`], fail-fast
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use stackgraph::{
//!     execute, plan, Outputs, ProviderError, ResolvedConfig, ResourceGraph, ResourceSpec,
//! };
//!
//! let graph = ResourceGraph::build(vec![
//!     ResourceSpec::new("storage", "aws").output("bucket_arn"),
//!     ResourceSpec::new("network", "aws")
//!         .output("cf_domain")
//!         .input("origin", "storage", "bucket_arn"),
//! ])?;
//! let plan = plan(&graph)?;
//!
//! let provision = |name: &str, _config: &ResolvedConfig| -> Result<Outputs, ProviderError> {
//!     let mut outputs = Outputs::new();
//!     match name {
//!         "storage" => outputs.insert("bucket_arn".into(), json!("arn:aws:s3:::blog")),
//!         _ => outputs.insert("cf_domain".into(), json!("d111.cloudfront.net")),
//!     };
//!     Ok(outputs)
//! };
//!
//! let report = execute(&plan, &graph, &provision);
//! assert!(report.is_success());
//! # Ok::<(), stackgraph::GraphError>(())
//! ```
//!
//! ## Provider Traits
//!
//! - [`Provisioner`]: applies one resource; the only boundary to the outside
//! - [`ProviderRegistry`]: dispatches to provisioners by provider id
//! - [`ProgressCallback`]: receives progress updates
//!
//! Retries, rollback and persistence are left to the caller. The
//! [`ExecutionReport`] is serializable and can seed a later run through
//! [`Executor::resume_from`].

pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod propagate;
pub mod provider;
pub mod state;
pub mod template;
pub mod types;

// Re-export main types at crate root
pub use error::{GraphError, ProviderError, ResourceError, Result};
pub use executor::{Executor, execute};
pub use graph::ResourceGraph;
pub use planner::{ApplyPlan, plan};
pub use propagate::{ResolvedConfig, resolve_inputs};
pub use provider::{NoProgress, ProgressCallback, ProviderRegistry, Provisioner};
pub use state::{StateLookup, StateStore};
pub use types::{
    ExecuteOptions, ExecutionReport, Outputs, Reference, ReportEntry, ResourceSpec,
    ResourceState, ResourceStatus, RunStatus,
};
