//! `stackplan validate` - check a stack file without applying it

use anyhow::Result;

use crate::Context;
use crate::cli::StackArgs;
use crate::commands::load;
use crate::config::ConfigFormat;
use crate::providers::builtin_registry;
use crate::ui;

pub fn run(ctx: &Context, args: StackArgs) -> Result<()> {
    let stack = load(&args.file)?;

    let missing = builtin_registry(stack.graph.specs()).missing_for(&stack.graph);
    if !missing.is_empty() {
        ui::warn(&format!(
            "No built-in provisioner for: {} (apply will fail)",
            missing.join(", ")
        ));
    }

    if ctx.quiet {
        return Ok(());
    }

    let format = ConfigFormat::from_path(&stack.path).map_or("?", ConfigFormat::extension);
    ui::success(&format!(
        "{} is valid ({} resources, {} layers, {format})",
        stack.name,
        stack.plan.len(),
        stack.plan.layers().len()
    ));
    if ctx.verbose > 0 {
        ui::kv("file", &stack.path.display().to_string());
        ui::kv("providers", &stack.graph.providers().join(", "));
    }
    Ok(())
}
