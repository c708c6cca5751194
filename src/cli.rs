use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "action-updater",
    about = "Action Updater - detect and fix outdated GitHub Actions workflow syntax",
    version,
    author
)]
pub struct Cli {
    /// Enable verbose output for debugging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (defaults to .action-updater.toml in the current directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub settings_file: Option<PathBuf>,

    /// GitHub token used for API requests
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report outdated workflow syntax without modifying files
    Detect(RunArgs),

    /// Rewrite outdated workflow syntax in place
    Update(RunArgs),

    /// List the available updaters
    ListUpdaters,

    /// Read or edit the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Workflow files or directories to scan
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Run only this updater (id or slug, may be repeated)
    #[arg(short = 'u', long = "updater", value_name = "ID")]
    pub updater: Vec<String>,

    /// Comma-separated list of updaters to run
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub updaters: Vec<String>,

    /// Do not print diffs of changed files
    #[arg(long)]
    pub no_details: bool,
}

impl RunArgs {
    /// All selectors given through either flag, blanks dropped.
    pub fn selectors(&self) -> Vec<String> {
        self.updater
            .iter()
            .chain(&self.updaters)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print a value from the settings file, or the effective settings
    Get {
        /// Dotted key such as updaters.version.major_orgs
        key: Option<String>,
    },

    /// Set a value (TOML literal, or a plain string)
    Set { key: String, value: String },

    /// Append a string to a list value
    Add { key: String, value: String },

    /// Remove a key, or one element of a list value
    Remove { key: String, value: Option<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_selectors_from_both_flags() {
        let cli = Cli::try_parse_from([
            "action-updater",
            "detect",
            "-u",
            "version",
            "--updaters",
            "set-output, setenv",
            "ci.yml",
        ])
        .unwrap();

        let Commands::Detect(args) = cli.command else {
            panic!("expected detect");
        };
        assert_eq!(args.selectors(), vec!["version", "set-output", "setenv"]);
        assert_eq!(args.paths, vec![PathBuf::from("ci.yml")]);
        assert!(!args.no_details);
    }

    #[test]
    fn paths_are_required() {
        assert!(Cli::try_parse_from(["action-updater", "update"]).is_err());

        let cli = Cli::try_parse_from(["action-updater", "update", "--no-details", ".github"])
            .unwrap();
        let Commands::Update(args) = cli.command else {
            panic!("expected update");
        };
        assert_eq!(args.paths, vec![PathBuf::from(".github")]);
        assert!(args.no_details);
        assert!(args.selectors().is_empty());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["action-updater", "-v", "-q", "list-updaters"]).is_err());
    }

    #[test]
    fn parses_config_actions() {
        let cli = Cli::try_parse_from([
            "action-updater",
            "config",
            "remove",
            "updaters.version.major_orgs",
            "github",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Remove { ref key, value: Some(ref value) }
            } if key == "updaters.version.major_orgs" && value == "github"
        ));
    }
}
