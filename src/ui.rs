use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use stackgraph::{
    ApplyPlan, ExecutionReport, ProgressCallback, ResourceGraph, ResourceState, ResourceStatus,
};
use std::time::Duration;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    println!("  {}", msg.dimmed());
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.chars().count()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a step indicator
pub fn step(num: usize, total: usize, msg: &str) {
    println!("{} {}", format!("[{num}/{total}]").blue().bold(), msg);
}

// ============================================================================
// Plan and Report Display
// ============================================================================

/// Print resources in apply order with their dependencies
pub fn print_plan(plan: &ApplyPlan, graph: &ResourceGraph) {
    for (i, name) in plan.iter().enumerate() {
        step(i + 1, plan.len(), &describe(name, graph));
    }
}

/// Print resources grouped into concurrent layers
pub fn print_layers(plan: &ApplyPlan, graph: &ResourceGraph) {
    for (index, layer) in plan.layers().iter().enumerate() {
        section(&format!("Layer {index}"));
        for name in layer {
            println!("  {} {}", "•".cyan(), describe(name, graph));
        }
    }
}

fn describe(name: &str, graph: &ResourceGraph) -> String {
    let Some(spec) = graph.get(name) else {
        return name.to_string();
    };
    let deps = graph.dependencies(name);
    let mut line = format!("{} {}", name.bold(), format!("({})", spec.provider).dimmed());
    if !deps.is_empty() {
        line.push_str(&format!(" {} {}", "←".dimmed(), deps.join(", ")));
    }
    line
}

/// Print the outcome of every resource the run reached
pub fn print_report(report: &ExecutionReport, total: usize) {
    section("Results");
    for entry in &report.entries {
        match entry.status {
            ResourceStatus::Applied if entry.resumed => {
                println!("  {} {} {}", "↺".blue(), entry.name, "(from state)".dimmed());
            }
            ResourceStatus::Applied => {
                println!("  {} {}", "✓".green(), entry.name);
                for (key, value) in &entry.outputs {
                    println!("      {} = {}", key.dimmed(), display_value(value));
                }
            }
            ResourceStatus::Failed => {
                let reason = entry
                    .error
                    .as_ref()
                    .map_or_else(String::new, ToString::to_string);
                println!("  {} {} {}", "✗".red(), entry.name, reason.red());
            }
            ResourceStatus::Pending | ResourceStatus::Applying => {
                println!("  {} {} {}", "…".yellow(), entry.name, entry.status);
            }
        }
    }

    let skipped = total.saturating_sub(report.entries.len());
    if skipped > 0 {
        dim(&format!("{skipped} resource(s) not attempted"));
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress bar driven by executor callbacks
pub struct ApplyProgress {
    pb: ProgressBar,
}

impl ApplyProgress {
    pub fn new(total: usize, quiet: bool) -> Self {
        let pb = if quiet {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(total as u64)
        };
        if let Ok(style) =
            ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("=>-"));
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { pb }
    }

    /// Resources skipped because an earlier run applied them
    pub fn skip(&self, count: usize) {
        self.pb.inc(count as u64);
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

impl ProgressCallback for ApplyProgress {
    fn on_layer_start(&self, index: usize, count: usize) {
        self.pb.set_message(format!("layer {index} ({count} resources)"));
    }

    fn on_resource_start(&self, name: &str) {
        self.pb.set_message(name.to_string());
    }

    fn on_resource_complete(&self, name: &str, state: &ResourceState) {
        if state.status == ResourceStatus::Failed {
            let reason = state
                .error
                .as_ref()
                .map_or_else(String::new, ToString::to_string);
            self.pb
                .suspend(|| println!("  {} {} ({})", "✗".red(), name, reason));
        }
        self.pb.inc(1);
    }
}
