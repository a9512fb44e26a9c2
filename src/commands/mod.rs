pub mod apply;
pub mod graph;
pub mod plan;
pub mod validate;

use anyhow::{Context as AnyhowContext, Result};
use stackgraph::{ApplyPlan, ResourceGraph};
use std::path::{Path, PathBuf};

use crate::config::{StackFile, expand_path};

/// A stack file taken through loading, graph building and planning
#[derive(Debug)]
pub struct LoadedStack {
    pub path: PathBuf,
    pub name: String,
    pub graph: ResourceGraph,
    pub plan: ApplyPlan,
}

/// Load a stack file and compute its plan
pub fn load(file: &Path) -> Result<LoadedStack> {
    let path = expand_path(file);
    let stack = StackFile::load(&path)?;
    let name = stack.display_name(&path);

    let graph = ResourceGraph::build(stack.to_specs())
        .with_context(|| format!("Invalid dependencies in {}", path.display()))?;
    let plan = stackgraph::plan(&graph)
        .with_context(|| format!("Cannot order resources in {}", path.display()))?;

    log::debug!("{name}: planned {} resource(s)", plan.len());
    Ok(LoadedStack {
        path,
        name,
        graph,
        plan,
    })
}
