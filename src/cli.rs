use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "grantctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(
    about = "Declarative access grants for warehouse, identity roles and workspace logins",
    long_about = None
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path of grantctl.toml
    #[arg(long, global = true, env = "GRANTCTL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Command-line overrides of grantctl.toml values
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Grant specification file (TOML or JSON)
    #[arg(long, global = true)]
    pub grants: Option<PathBuf>,

    /// Local state file
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Account the identity roles and policies live in
    #[arg(long, global = true)]
    pub account_id: Option<String>,

    /// Region of the warehouse clusters
    #[arg(long, global = true)]
    pub region: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(PlanArgs),

    /// Converge the systems to the grant specification
    Apply(ApplyArgs),

    /// Print the desired models resolved from the grant specification
    Show(SystemArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct SystemArgs {
    /// Only this system
    #[arg(short, long, value_enum)]
    pub system: Option<System>,
}

#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: Format,

    #[command(flatten)]
    pub target: SystemArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ApplyArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub target: SystemArgs,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}

/// One of the external systems
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum)]
pub enum System {
    Warehouse,
    Identity,
    Login,
}

impl System {
    pub const ALL: [Self; 3] = [Self::Warehouse, Self::Identity, Self::Login];

    pub fn name(self) -> &'static str {
        match self {
            Self::Warehouse => "warehouse",
            Self::Identity => "identity",
            Self::Login => "login",
        }
    }
}

impl SystemArgs {
    /// Systems selected by `--system`, all of them by default
    pub fn selected(&self) -> Vec<System> {
        match self.system {
            Some(system) => vec![system],
            None => System::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_flags() {
        let cli = Cli::parse_from([
            "grantctl",
            "-vv",
            "--region",
            "us-east-1",
            "apply",
            "--yes",
            "--system",
            "identity",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.overrides.region.as_deref(), Some("us-east-1"));
        match cli.command {
            Command::Apply(args) => {
                assert!(args.yes);
                assert!(!args.dry_run);
                assert_eq!(args.target.selected(), vec![System::Identity]);
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_plan_defaults_to_all_systems_as_text() {
        let cli = Cli::parse_from(["grantctl", "plan"]);
        match cli.command {
            Command::Plan(args) => {
                assert_eq!(args.format, Format::Text);
                assert_eq!(args.target.selected(), System::ALL.to_vec());
            }
            _ => panic!("expected plan"),
        }
    }
}
