//! CLI command definitions and dispatch for the `mealflow` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod plan;
pub mod sessions;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Plan a meal, review its ingredients and build a grocery list.
#[derive(Parser)]
#[command(name = "mealflow", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP/SSE API server.
    Serve {
        /// Port to listen on (overrides config.toml).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config.toml).
        #[arg(long)]
        host: Option<String>,
    },

    /// Plan a meal interactively in the terminal.
    Plan(PlanArgs),

    /// Inspect and manage stored sessions.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(clap::Args)]
#[command(group(clap::ArgGroup::new("entry").required(true).args(["cuisine", "url"])))]
pub struct PlanArgs {
    /// Cuisine to search recipes for (e.g. "thai").
    #[arg(short, long)]
    pub cuisine: Option<String>,

    /// Preferred recipe site; repeat for several.
    #[arg(short, long = "source", requires = "cuisine")]
    pub sources: Vec<String>,

    /// Skip the search and use this recipe page.
    #[arg(short, long)]
    pub url: Option<String>,
}

#[derive(Subcommand)]
pub enum SessionsCommand {
    /// List recent sessions.
    #[command(alias = "ls")]
    List {
        /// Filter by status (running, interrupted, complete, failed).
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum number of sessions to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Show a session record.
    Show {
        /// Session id.
        id: String,
    },

    /// Delete a session.
    #[command(alias = "rm")]
    Delete {
        /// Session id.
        id: String,

        /// Skip the confirmation prompt.
        #[arg(short, long)]
        force: bool,
    },

    /// Remove finished sessions older than the retention window.
    Purge {
        /// Defaults to `storage.retention_days`, then 30.
        #[arg(long)]
        older_than_days: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_requires_an_entry_point() {
        assert!(Cli::try_parse_from(["mealflow", "plan"]).is_err());
        assert!(Cli::try_parse_from(["mealflow", "plan", "--cuisine", "thai", "--url", "https://x.example"]).is_err());
        assert!(Cli::try_parse_from(["mealflow", "plan", "--url", "https://x.example", "--source", "a.com"]).is_err());

        let cli = Cli::try_parse_from([
            "mealflow", "plan", "--cuisine", "thai", "--source", "a.com", "--source", "b.com",
        ])
        .unwrap();
        match cli.command {
            Commands::Plan(args) => {
                assert_eq!(args.cuisine.as_deref(), Some("thai"));
                assert_eq!(args.sources, ["a.com", "b.com"]);
            }
            _ => panic!("expected plan"),
        }
    }

    #[test]
    fn global_flags_apply_after_subcommand() {
        let cli = Cli::try_parse_from(["mealflow", "sessions", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Sessions {
                action: SessionsCommand::List { status, limit },
            } => {
                assert!(status.is_none());
                assert_eq!(limit, 20);
            }
            _ => panic!("expected sessions list"),
        }
    }

    #[test]
    fn serve_overrides_are_optional() {
        let cli = Cli::try_parse_from(["mealflow", "serve"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { port: None, host: None }));
    }
}
