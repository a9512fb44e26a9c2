//! `stackplan plan` - show the apply order

use anyhow::Result;
use serde::Serialize;
use stackgraph::{ApplyPlan, ResourceGraph};

use crate::Context;
use crate::cli::PlanArgs;
use crate::commands::load;
use crate::ui;

#[derive(Debug, Serialize)]
struct PlanJson<'a> {
    stack: &'a str,
    order: &'a [String],
    layers: &'a [Vec<String>],
    resources: Vec<ResourceJson<'a>>,
}

#[derive(Debug, Serialize)]
struct ResourceJson<'a> {
    name: &'a str,
    provider: &'a str,
    depends_on: Vec<&'a str>,
}

fn to_json<'a>(name: &'a str, plan: &'a ApplyPlan, graph: &'a ResourceGraph) -> PlanJson<'a> {
    let resources = plan
        .iter()
        .filter_map(|n| graph.get(n))
        .map(|spec| ResourceJson {
            name: &spec.name,
            provider: &spec.provider,
            depends_on: graph.dependencies(&spec.name),
        })
        .collect();
    PlanJson {
        stack: name,
        order: plan.order(),
        layers: plan.layers(),
        resources,
    }
}

pub fn run(ctx: &Context, args: PlanArgs) -> Result<()> {
    let stack = load(&args.stack.file)?;

    if args.json {
        let json = to_json(&stack.name, &stack.plan, &stack.graph);
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    if !ctx.quiet {
        ui::header(&format!("Plan: {}", stack.name));
    }
    if args.layers {
        ui::print_layers(&stack.plan, &stack.graph);
    } else {
        ui::print_plan(&stack.plan, &stack.graph);
    }
    Ok(())
}
