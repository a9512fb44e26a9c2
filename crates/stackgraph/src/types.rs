//! Core types for declaring resources and reporting on runs

use crate::error::ResourceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Values produced by applying a resource, keyed by output name
pub type Outputs = BTreeMap<String, Value>;

/// A pointer to another resource's output, written `resource.output`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Reference {
    /// Name of the resource that produces the value
    pub resource: String,
    /// Output key on that resource
    pub output: String,
}

impl Reference {
    /// Create a reference from its two halves
    pub fn new(resource: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            output: output.into(),
        }
    }

    /// Parse `resource.output`, returning None when malformed
    pub fn parse(text: &str) -> Option<Self> {
        let (resource, output) = text.split_once('.')?;
        if !is_valid_segment(resource) || !is_valid_segment(output) {
            return None;
        }
        Some(Self::new(resource, output))
    }
}

/// Whether `part` can appear on either side of a `resource.output` reference
pub fn is_valid_segment(part: &str) -> bool {
    !part.is_empty() && !part.contains('.') && !part.chars().any(char::is_whitespace)
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.resource, self.output)
    }
}

impl FromStr for Reference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid reference '{s}', expected resource.output"))
    }
}

impl TryFrom<String> for Reference {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Reference> for String {
    fn from(reference: Reference) -> Self {
        reference.to_string()
    }
}

/// Declaration of a single resource
///
/// `inputs` maps a local input name to the output it consumes. String values
/// inside `config` may additionally embed `${resource.output}` placeholders,
/// which are treated as references too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Logical name, unique within a graph
    pub name: String,
    /// Identifier of the provisioning callback that applies this resource
    pub provider: String,
    /// Output keys this resource promises to produce
    #[serde(default)]
    pub outputs: BTreeSet<String>,
    /// Local input name -> referenced output
    #[serde(default)]
    pub inputs: BTreeMap<String, Reference>,
    /// Opaque provider-specific payload
    #[serde(default)]
    pub config: Value,
}

impl ResourceSpec {
    /// Create a declaration with no inputs, outputs or config
    pub fn new(name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            outputs: BTreeSet::new(),
            inputs: BTreeMap::new(),
            config: Value::Null,
        }
    }

    /// Declare an output key
    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.outputs.insert(key.into());
        self
    }

    /// Consume another resource's output under a local input name
    pub fn input(
        mut self,
        local: impl Into<String>,
        resource: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        self.inputs
            .insert(local.into(), Reference::new(resource, output));
        self
    }

    /// Set the provider payload
    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }
}

/// Lifecycle of a resource within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    Applying,
    Applied,
    Failed,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Applying => "applying",
            Self::Applied => "applied",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Per-resource state held by the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    pub status: ResourceStatus,
    /// Populated once the resource is applied
    #[serde(default)]
    pub outputs: Outputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResourceError>,
}

impl ResourceState {
    /// A resource that has not been touched yet
    pub fn pending() -> Self {
        Self {
            status: ResourceStatus::Pending,
            outputs: Outputs::new(),
            error: None,
        }
    }

    /// A resource applied with the given outputs
    pub fn applied(outputs: Outputs) -> Self {
        Self {
            status: ResourceStatus::Applied,
            outputs,
            error: None,
        }
    }

    /// A resource whose apply failed
    pub fn failed(error: ResourceError) -> Self {
        Self {
            status: ResourceStatus::Failed,
            outputs: Outputs::new(),
            error: Some(error),
        }
    }

    pub fn is_applied(&self) -> bool {
        self.status == ResourceStatus::Applied
    }

    /// Look up an output, only if the resource is applied
    pub fn output(&self, key: &str) -> Option<&Value> {
        if self.is_applied() {
            self.outputs.get(key)
        } else {
            None
        }
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        Self::pending()
    }
}

/// Aggregate status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

/// Outcome for one resource the run reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub status: ResourceStatus,
    #[serde(default)]
    pub outputs: Outputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResourceError>,
    /// Outputs were carried over from an earlier run instead of applied
    #[serde(default)]
    pub resumed: bool,
}

/// Result of executing a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: RunStatus,
    /// Resources reached, in plan order
    pub entries: Vec<ReportEntry>,
}

impl ExecutionReport {
    /// Find the entry for a resource
    pub fn get(&self, name: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Check if the run completed without failures
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Entries that reached `Applied`
    pub fn applied(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == ResourceStatus::Applied)
    }

    /// Entries that ended in `Failed`
    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == ResourceStatus::Failed)
    }

    /// Outputs of an applied resource
    pub fn outputs_of(&self, name: &str) -> Option<&Outputs> {
        self.get(name)
            .filter(|e| e.status == ResourceStatus::Applied)
            .map(|e| &e.outputs)
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of parallel jobs; 1 applies strictly one resource at a time
    pub jobs: usize,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self { jobs: 1 }
    }
}
