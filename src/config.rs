//! Stack file loading
//!
//! A stack file declares resources in TOML or JSON; the format is picked from
//! the file extension.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use stackgraph::{Reference, ResourceSpec};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supported stack file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a path's extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }
}

/// Problems found while validating a stack file
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StackError {
    #[error("unsupported stack file format: {} (expected .toml or .json)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("stack has no resources")]
    Empty,

    #[error("resource #{index} has an empty name")]
    EmptyName { index: usize },

    #[error("resource '{name}' has no provider")]
    MissingProvider { name: String },

    #[error("resource '{name}' uses '.' in its name")]
    DottedName { name: String },
}

// ============================================================================
// Stack File Schema
// ============================================================================

/// Top-level stack file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackFile {
    /// Stack name, used for display and the state file
    #[serde(default)]
    pub name: Option<String>,

    /// Resources in declaration order
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceDecl>,
}

/// One `[[resource]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDecl {
    pub name: String,
    pub provider: String,

    #[serde(default)]
    pub outputs: BTreeSet<String>,

    /// Local input name -> `resource.output`
    #[serde(default)]
    pub inputs: BTreeMap<String, Reference>,

    #[serde(default)]
    pub config: Option<Value>,
}

impl StackFile {
    /// Load and validate a stack file
    pub fn load(path: &Path) -> Result<Self> {
        let format = ConfigFormat::from_path(path)
            .ok_or_else(|| StackError::UnsupportedFormat(path.to_path_buf()))?;

        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read stack file: {}", path.display()))?;

        let stack = Self::parse(&content, format)
            .with_context(|| format!("Invalid stack file: {}", path.display()))?;
        stack.validate()?;
        Ok(stack)
    }

    /// Parse stack file content in the given format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let stack: Self = match format {
            ConfigFormat::Toml => toml::from_str(content).context("Invalid TOML format")?,
            ConfigFormat::Json => serde_json::from_str(content).context("Invalid JSON format")?,
        };
        Ok(stack)
    }

    /// Structural checks that the graph builder does not cover
    pub fn validate(&self) -> Result<(), StackError> {
        if self.resources.is_empty() {
            return Err(StackError::Empty);
        }
        for (index, decl) in self.resources.iter().enumerate() {
            if decl.name.trim().is_empty() {
                return Err(StackError::EmptyName { index });
            }
            if decl.name.contains('.') {
                return Err(StackError::DottedName {
                    name: decl.name.clone(),
                });
            }
            if decl.provider.trim().is_empty() {
                return Err(StackError::MissingProvider {
                    name: decl.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Name to show for this stack, falling back to the file stem
    pub fn display_name(&self, path: &Path) -> String {
        self.name.clone().unwrap_or_else(|| {
            path.file_stem()
                .map_or_else(|| "stack".to_string(), |s| s.to_string_lossy().to_string())
        })
    }

    /// Convert declarations into resource specs, preserving order
    pub fn to_specs(&self) -> Vec<ResourceSpec> {
        self.resources
            .iter()
            .map(|decl| ResourceSpec {
                name: decl.name.clone(),
                provider: decl.provider.clone(),
                outputs: decl.outputs.clone(),
                inputs: decl.inputs.clone(),
                config: decl.config.clone().unwrap_or(Value::Null),
            })
            .collect()
    }
}

/// Expand `~` in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).as_ref())
}

/// Default state file location: `<dir>/<stem>.state.json`
pub fn default_state_path(stack_path: &Path) -> PathBuf {
    let stem = stack_path
        .file_stem()
        .map_or_else(|| "stack".to_string(), |s| s.to_string_lossy().to_string());
    stack_path.with_file_name(format!("{stem}.state.json"))
}
