//! Execution engine - applies a plan, propagating outputs as it goes
//!
//! Runs strictly in plan order by default. With `jobs > 1` each plan layer is
//! applied concurrently on a rayon pool; a layer only starts once every
//! earlier layer has fully applied. Either way the run stops at the first
//! failure and the report keeps whatever was applied before it.

use crate::error::ResourceError;
use crate::graph::ResourceGraph;
use crate::planner::ApplyPlan;
use crate::propagate::resolve_inputs;
use crate::provider::{NoProgress, ProgressCallback, Provisioner};
use crate::state::{StateLookup, StateStore};
use crate::types::{
    ExecuteOptions, ExecutionReport, ReportEntry, ResourceState, ResourceStatus, RunStatus,
};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use std::collections::HashSet;

/// Apply every resource of `plan` in order using `provisioner`
///
/// Shorthand for [`Executor::new`] with default options.
pub fn execute<P>(plan: &ApplyPlan, graph: &ResourceGraph, provisioner: &P) -> ExecutionReport
where
    P: Provisioner + ?Sized,
{
    Executor::new(plan, graph).run(provisioner)
}

/// Configurable plan executor
pub struct Executor<'a> {
    plan: &'a ApplyPlan,
    graph: &'a ResourceGraph,
    opts: ExecuteOptions,
    progress: &'a dyn ProgressCallback,
    prior: Option<&'a ExecutionReport>,
}

impl<'a> Executor<'a> {
    pub fn new(plan: &'a ApplyPlan, graph: &'a ResourceGraph) -> Self {
        Self {
            plan,
            graph,
            opts: ExecuteOptions::default(),
            progress: &NoProgress,
            prior: None,
        }
    }

    pub fn options(mut self, opts: ExecuteOptions) -> Self {
        self.opts = opts;
        self
    }

    pub fn progress(mut self, progress: &'a dyn ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    /// Carry over resources an earlier run already applied
    ///
    /// They keep their recorded outputs and are not applied again.
    pub fn resume_from(mut self, report: &'a ExecutionReport) -> Self {
        self.prior = Some(report);
        self
    }

    /// Run the plan to completion or to the first failure
    pub fn run<P>(&self, provisioner: &P) -> ExecutionReport
    where
        P: Provisioner + ?Sized,
    {
        let store = StateStore::new(self.plan.iter());
        let resumed = self.seed(&store);

        info!(
            "applying {} resource(s), {} carried over",
            self.plan.len(),
            resumed.len()
        );

        let status = if self.opts.jobs > 1 {
            self.run_layers(&store, &resumed, provisioner)
        } else {
            self.run_sequential(&store, &resumed, provisioner)
        };

        match status {
            RunStatus::Completed => info!("run completed"),
            _ => warn!("run aborted"),
        }
        self.report(&store, &resumed, status)
    }

    fn seed(&self, store: &StateStore) -> HashSet<String> {
        let mut resumed = HashSet::new();
        let Some(prior) = self.prior else {
            return resumed;
        };
        for entry in prior.applied() {
            if store.contains(&entry.name) {
                debug!("resuming {} from earlier run", entry.name);
                store.set(&entry.name, ResourceState::applied(entry.outputs.clone()));
                resumed.insert(entry.name.clone());
            }
        }
        resumed
    }

    fn run_sequential<P>(
        &self,
        store: &StateStore,
        resumed: &HashSet<String>,
        provisioner: &P,
    ) -> RunStatus
    where
        P: Provisioner + ?Sized,
    {
        for name in self.plan.iter() {
            if resumed.contains(name) {
                continue;
            }
            if !self.apply_one(name, store, provisioner) {
                return RunStatus::Aborted;
            }
        }
        RunStatus::Completed
    }

    fn run_layers<P>(
        &self,
        store: &StateStore,
        resumed: &HashSet<String>,
        provisioner: &P,
    ) -> RunStatus
    where
        P: Provisioner + ?Sized,
    {
        let pool = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.opts.jobs)
            .build()
        {
            Ok(pool) => pool,
            Err(e) => {
                warn!("failed to create thread pool, applying sequentially: {e}");
                return self.run_sequential(store, resumed, provisioner);
            }
        };

        for (index, layer) in self.plan.layers().iter().enumerate() {
            let pending: Vec<&str> = layer
                .iter()
                .map(String::as_str)
                .filter(|name| !resumed.contains(*name))
                .collect();
            if pending.is_empty() {
                continue;
            }

            self.progress.on_layer_start(index, pending.len());
            debug!("layer {index}: {} resource(s)", pending.len());

            let results: Vec<bool> = pool.install(|| {
                pending
                    .par_iter()
                    .map(|name| self.apply_one(name, store, provisioner))
                    .collect()
            });
            if results.contains(&false) {
                return RunStatus::Aborted;
            }
        }
        RunStatus::Completed
    }

    /// Apply a single resource, returning whether it reached `Applied`
    fn apply_one<P>(&self, name: &str, store: &StateStore, provisioner: &P) -> bool
    where
        P: Provisioner + ?Sized,
    {
        store.mark_applying(name);
        self.progress.on_resource_start(name);

        let state = match self.graph.get(name) {
            None => ResourceState::failed(ResourceError::Invariant {
                message: format!("plan entry {name} is not declared in the graph"),
            }),
            Some(spec) => match resolve_inputs(spec, store) {
                Err(e) => {
                    error!("{e}");
                    ResourceState::failed(e.into())
                }
                Ok(resolved) => match provisioner.apply(name, &resolved) {
                    Ok(outputs) => {
                        let missing: Vec<&String> = spec
                            .outputs
                            .iter()
                            .filter(|k| !outputs.contains_key(*k))
                            .collect();
                        if !missing.is_empty() {
                            warn!("{name} did not produce declared output(s): {missing:?}");
                        }
                        info!("applied {name}");
                        ResourceState::applied(outputs)
                    }
                    Err(e) => {
                        warn!(
                            "failed to apply {name}: {e}{}",
                            if e.retryable { " (retryable)" } else { "" }
                        );
                        ResourceState::failed(e.into())
                    }
                },
            },
        };

        let applied = state.is_applied();
        self.progress.on_resource_complete(name, &state);
        store.set(name, state);
        applied
    }

    fn report(
        &self,
        store: &StateStore,
        resumed: &HashSet<String>,
        status: RunStatus,
    ) -> ExecutionReport {
        let entries = self
            .plan
            .iter()
            .filter_map(|name| {
                let state = store.get(name)?;
                if state.status == ResourceStatus::Pending {
                    return None;
                }
                Some(ReportEntry {
                    name: name.to_string(),
                    status: state.status,
                    outputs: state.outputs,
                    error: state.error,
                    resumed: resumed.contains(name),
                })
            })
            .collect();

        debug_assert!(
            status != RunStatus::Completed
                || self
                    .plan
                    .iter()
                    .all(|n| store.status(n) == Some(ResourceStatus::Applied))
        );

        ExecutionReport { status, entries }
    }
}
