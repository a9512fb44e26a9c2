//! `stackplan apply` - apply a stack through the built-in provisioners

use anyhow::{Result, bail};
use colored::Colorize;
use stackgraph::{ExecuteOptions, ExecutionReport, Executor, Provisioner};
use std::path::Path;

use crate::Context;
use crate::cli::ApplyArgs;
use crate::commands::{LoadedStack, load};
use crate::config::{default_state_path, expand_path};
use crate::providers::builtin_registry;
use crate::retry::{RetryConfig, Retrying};
use crate::state::StateFile;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let stack = load(&args.stack.file)?;
    let state_path = args
        .state
        .as_deref()
        .map_or_else(|| default_state_path(&stack.path), expand_path);

    if !ctx.quiet {
        ui::header(&format!("Apply: {}", stack.name));
        ui::print_plan(&stack.plan, &stack.graph);
    }

    if args.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(());
    }

    let registry = builtin_registry(stack.graph.specs());
    let missing = registry.missing_for(&stack.graph);
    if !missing.is_empty() {
        bail!("No provisioner registered for: {}", missing.join(", "));
    }

    let prior = if args.resume {
        load_prior(&stack, &state_path)?
    } else {
        None
    };

    if !args.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(());
    }

    let provisioner: Box<dyn Provisioner> = if args.retries > 1 {
        Box::new(Retrying::new(
            registry,
            RetryConfig::with_attempts(args.retries),
        ))
    } else {
        Box::new(registry)
    };

    let report = execute(ctx, &stack, &args, prior.as_ref(), provisioner.as_ref());

    StateFile::new(&stack.name, report.clone()).save(&state_path)?;
    log::info!("state written to {}", state_path.display());

    if !ctx.quiet {
        ui::print_report(&report, stack.plan.len());
        println!();
    }

    let applied = report.applied().count();
    if report.is_success() {
        ui::success(&format!("Applied {applied} resource(s)"));
        Ok(())
    } else {
        let failed: Vec<&str> = report.failures().map(|e| e.name.as_str()).collect();
        ui::dim(&format!(
            "Re-run with --resume to continue from {}",
            state_path.display()
        ));
        bail!(
            "Apply aborted after {applied} resource(s); failed: {}",
            failed.join(", ")
        )
    }
}

fn execute(
    ctx: &Context,
    stack: &LoadedStack,
    args: &ApplyArgs,
    prior: Option<&ExecutionReport>,
    provisioner: &dyn Provisioner,
) -> ExecutionReport {
    let progress = ui::ApplyProgress::new(stack.plan.len(), ctx.quiet);
    if let Some(prior) = prior {
        let carried = prior
            .applied()
            .filter(|e| stack.graph.get(&e.name).is_some())
            .count();
        progress.skip(carried);
    }

    let mut executor = Executor::new(&stack.plan, &stack.graph)
        .options(ExecuteOptions {
            jobs: args.jobs.max(1),
        })
        .progress(&progress);
    if let Some(prior) = prior {
        executor = executor.resume_from(prior);
    }

    let report = executor.run(provisioner);
    progress.finish();
    report
}

/// Previous report for this stack, if the state file has one
fn load_prior(stack: &LoadedStack, path: &Path) -> Result<Option<ExecutionReport>> {
    let Some(state) = StateFile::load(path)? else {
        ui::info("No previous state found; applying everything");
        return Ok(None);
    };
    if state.stack != stack.name {
        ui::warn(&format!(
            "State file {} belongs to stack '{}', ignoring it",
            path.display(),
            state.stack
        ));
        return Ok(None);
    }
    log::debug!(
        "resuming from state written {}",
        state.last_updated.to_rfc3339()
    );
    Ok(Some(state.report))
}

fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::StackArgs;
    use crate::commands::fixtures::{BLOG, write};
    use stackgraph::{ResourceStatus, RunStatus};
    use std::path::PathBuf;
    use tempfile::TempDir;

    const QUIET: Context = Context {
        verbose: 0,
        quiet: true,
    };

    fn args(file: PathBuf, state: PathBuf) -> ApplyArgs {
        ApplyArgs {
            stack: StackArgs { file },
            jobs: 1,
            yes: true,
            dry_run: false,
            state: Some(state),
            resume: false,
            retries: 1,
        }
    }

    #[test]
    fn test_apply_writes_state() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("blog.state.json");
        run(&QUIET, args(write(&dir, "blog.toml", BLOG), state.clone())).unwrap();

        let saved = StateFile::load(&state).unwrap().unwrap();
        assert_eq!(saved.stack, "blog");
        assert_eq!(saved.report.status, RunStatus::Completed);
        assert_eq!(
            saved.report.outputs_of("network").unwrap()["cf_domain"],
            "d111.cloudfront.net"
        );
        assert_eq!(
            saved.report.outputs_of("security").unwrap()["role_arn"],
            "security.role_arn"
        );
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("blog.state.json");
        let mut args = args(write(&dir, "blog.toml", BLOG), state.clone());
        args.dry_run = true;

        run(&QUIET, args).unwrap();
        assert!(!state.exists());
    }

    #[test]
    fn test_unknown_provider_fails_before_applying() {
        let toml = r#"
[[resource]]
name = "storage"
provider = "aws"
"#;
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("s.state.json");
        let err = run(&QUIET, args(write(&dir, "s.toml", toml), state.clone())).unwrap_err();

        assert!(err.to_string().contains("aws"));
        assert!(!state.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_abort_then_resume() {
        let failing = r#"
name = "site"

[[resource]]
name = "bucket"
provider = "echo"
outputs = ["arn"]

[[resource]]
name = "cdn"
provider = "command"
outputs = ["domain"]
[resource.inputs]
origin = "bucket.arn"
[resource.config]
command = "sh"
args = ["-c", '''exit 3''']
"#;
        let dir = TempDir::new().unwrap();
        let state = dir.path().join("site.state.json");
        let file = write(&dir, "site.toml", failing);

        let err = run(&QUIET, args(file.clone(), state.clone())).unwrap_err();
        assert!(err.to_string().contains("failed: cdn"));
        let saved = StateFile::load(&state).unwrap().unwrap();
        assert_eq!(saved.report.status, RunStatus::Aborted);
        assert_eq!(
            saved.report.get("cdn").unwrap().status,
            ResourceStatus::Failed
        );

        let fixed = failing.replace("exit 3", r#"printf '{"domain":"%s"}' "$STACKPLAN_INPUT_ORIGIN""#);
        write(&dir, "site.toml", &fixed);
        let mut resume = args(file, state.clone());
        resume.resume = true;
        run(&QUIET, resume).unwrap();

        let saved = StateFile::load(&state).unwrap().unwrap();
        assert!(saved.report.is_success());
        assert!(saved.report.get("bucket").unwrap().resumed);
        assert_eq!(
            saved.report.outputs_of("cdn").unwrap()["domain"],
            "bucket.arn"
        );
    }
}
