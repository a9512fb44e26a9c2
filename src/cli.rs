use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackplan")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Plan and apply declarative infrastructure stacks", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Check a stack file: names, references and cycles
    Validate(StackArgs),

    /// Show the order resources would be applied in
    Plan(PlanArgs),

    /// Print the dependency graph in Graphviz DOT format
    Graph(StackArgs),

    /// Apply a stack through its provisioners
    Apply(ApplyArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Parser)]
pub struct StackArgs {
    /// Stack file (.toml or .json)
    #[arg(env = "STACKPLAN_FILE", default_value = "stack.toml")]
    pub file: PathBuf,
}

#[derive(Parser)]
pub struct PlanArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Group resources into layers that can be applied concurrently
    #[arg(short, long)]
    pub layers: bool,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct ApplyArgs {
    #[command(flatten)]
    pub stack: StackArgs,

    /// Number of parallel jobs (1 applies one resource at a time)
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Show the plan without applying anything
    #[arg(short, long)]
    pub dry_run: bool,

    /// State file (defaults to <stack>.state.json next to the stack file)
    #[arg(long, env = "STACKPLAN_STATE")]
    pub state: Option<PathBuf>,

    /// Reuse outputs of resources applied by the previous run
    #[arg(long)]
    pub resume: bool,

    /// Attempts per resource for retryable provider errors
    #[arg(long, default_value = "1")]
    pub retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::parse_from([
            "stackplan", "-vv", "apply", "blog.toml", "--jobs", "4", "--yes", "--resume",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.stack.file, PathBuf::from("blog.toml"));
                assert_eq!(args.jobs, 4);
                assert!(args.yes);
                assert!(args.resume);
                assert!(!args.dry_run);
                assert_eq!(args.retries, 1);
            }
            _ => panic!("expected apply"),
        }
    }
}
