use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Submit GitHub star classification jobs and watch them to completion.
#[derive(Parser, Debug)]
#[command(name = "starwatch", version)]
pub struct Cli {
    /// RON config file (default: ./starwatch.ron if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a classification job, then watch it
    Classify {
        /// GitHub token used by the service to read your starred repositories
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: String,

        /// Skip repositories with fewer stars
        #[arg(long, default_value_t = 0)]
        min_stars: u32,

        /// Keep forked repositories
        #[arg(long)]
        include_forks: bool,

        /// Keep archived repositories
        #[arg(long)]
        include_archived: bool,

        /// Print the job id and exit without watching
        #[arg(long)]
        detach: bool,
    },
    /// Watch an existing job until it finishes
    Watch { job_id: String },
    /// List past jobs
    History,
    /// Delete a job and its results
    Delete { job_id: String },
    /// Check that the service answers
    Health,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn classify_flags_parse() {
        let cli = Cli::try_parse_from([
            "starwatch",
            "classify",
            "--token",
            "ghp_test",
            "--min-stars",
            "10",
            "--include-forks",
        ])
        .expect("parse");
        match cli.command {
            Command::Classify {
                token,
                min_stars,
                include_forks,
                include_archived,
                detach,
            } => {
                assert_eq!(token, "ghp_test");
                assert_eq!(min_stars, 10);
                assert!(include_forks);
                assert!(!include_archived);
                assert!(!detach);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_flag_follows_subcommand() {
        let cli = Cli::try_parse_from(["starwatch", "watch", "job-1", "--config", "alt.ron"])
            .expect("parse");
        assert_eq!(cli.config, Some(PathBuf::from("alt.ron")));
        assert!(matches!(cli.command, Command::Watch { job_id } if job_id == "job-1"));
    }
}
