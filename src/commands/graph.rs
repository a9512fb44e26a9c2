//! `stackplan graph` - dependency graph in Graphviz DOT

use anyhow::Result;
use stackgraph::ResourceGraph;
use std::collections::BTreeSet;
use std::fmt::Write;

use crate::Context;
use crate::cli::StackArgs;
use crate::commands::load;

pub fn run(_ctx: &Context, args: StackArgs) -> Result<()> {
    let stack = load(&args.file)?;
    print!("{}", to_dot(&stack.name, &stack.graph));
    Ok(())
}

/// Render edges as producer -> consumer, labelled with the outputs consumed
fn to_dot(name: &str, graph: &ResourceGraph) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "digraph {} {{", quote(name));
    let _ = writeln!(out, "    rankdir=LR;");
    for spec in graph.specs() {
        let _ = writeln!(
            out,
            "    {} [label={}];",
            quote(&spec.name),
            quote(&format!("{}\\n({})", spec.name, spec.provider))
        );
    }
    for spec in graph.specs() {
        for dep in graph.dependencies(&spec.name) {
            let outputs: BTreeSet<&str> = graph
                .references(&spec.name)
                .iter()
                .filter(|r| r.resource == dep)
                .map(|r| r.output.as_str())
                .collect();
            let label = outputs.into_iter().collect::<Vec<_>>().join(", ");
            let _ = writeln!(
                out,
                "    {} -> {} [label={}];",
                quote(dep),
                quote(&spec.name),
                quote(&label)
            );
        }
    }
    out.push_str("}\n");
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\\\""))
}
