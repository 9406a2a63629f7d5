//! Command-line interface for gestura.
//!
//! This module provides the CLI structure and command handlers for the
//! `gestura` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ActorArgs, BatchCommand, BatchStatusArg, CaptureCommand, ConfigCommand, FrameInput,
    PracticeCommand, RequestsCommand, RoleArg, SamplesCommand, TemplatesCommand,
};

/// gestura - Practice and customize hand gestures
///
/// Replays hand-tracker frames against gesture templates, records
/// customization samples, and walks custom gestures through superadmin
/// approval.
#[derive(Debug, Parser)]
#[command(name = "gestura")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// JSON file with gesture templates (default: built-in library)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub templates: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Match tracker frames against a gesture template
    Practice(PracticeCommand),

    /// Record customization samples for a gesture
    Capture(CaptureCommand),

    /// List the gesture template library
    Templates(TemplatesCommand),

    /// Manage per-admin gesture request entries
    #[command(subcommand)]
    Requests(RequestsCommand),

    /// Submit and review customization batches
    #[command(subcommand)]
    Batch(BatchCommand),

    /// List an admin's approved samples
    Samples(SamplesCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli_with(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            templates: None,
            verbose,
            quiet,
            command: Command::Templates(TemplatesCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "gestura");
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(cli_with(0, true).verbosity(), crate::logging::Verbosity::Quiet);
        assert_eq!(cli_with(0, false).verbosity(), crate::logging::Verbosity::Normal);
        assert_eq!(cli_with(1, false).verbosity(), crate::logging::Verbosity::Verbose);
        assert_eq!(cli_with(2, false).verbosity(), crate::logging::Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_practice() {
        let args = vec!["gestura", "practice", "home", "--input", "frames.jsonl"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Practice(cmd) => {
                assert_eq!(cmd.gesture, "home");
                assert_eq!(cmd.frames.input, Some(PathBuf::from("frames.jsonl")));
                assert!(!cmd.frames.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_capture() {
        let args = vec!["gestura", "capture", "home", "--admin", "7", "--json"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Capture(cmd) => {
                assert_eq!(cmd.admin, "7");
                assert!(cmd.frames.json);
                assert!(cmd.frames.input.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_requests_customize() {
        let args = vec![
            "gestura", "requests", "customize", "--as", "7", "--gesture", "home",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Requests(RequestsCommand::Customize { actor, gesture, name }) => {
                assert_eq!(actor.admin_id, "7");
                assert_eq!(actor.role, RoleArg::Admin);
                assert_eq!(gesture, "home");
                assert!(name.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_requests_approve_as_superadmin() {
        let args = vec![
            "gestura",
            "requests",
            "approve",
            "--as",
            "root",
            "--role",
            "superadmin",
            "--admin",
            "7",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Requests(RequestsCommand::Approve { ref actor, ref admin })
                if actor.role == RoleArg::Superadmin && admin == "7"
        ));
    }

    #[test]
    fn test_parse_batch_submit_gestures() {
        let args = vec![
            "gestura", "batch", "submit", "--as", "7", "-g", "home", "-g", "back",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Batch(BatchCommand::Submit { gestures, .. }) => {
                assert_eq!(gestures, vec!["home", "back"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_batch_list_status() {
        let args = vec!["gestura", "batch", "list", "--as", "7", "--status", "failed"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Batch(BatchCommand::List {
                status: Some(BatchStatusArg::Failed),
                ..
            })
        ));
    }

    #[test]
    fn test_parse_batch_reject_reason() {
        let args = vec![
            "gestura", "batch", "reject", "--as", "root", "--role", "superadmin", "3", "-r",
            "blurry",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Batch(BatchCommand::Reject { id, reason, .. }) => {
                assert_eq!(id, 3);
                assert_eq!(reason.as_deref(), Some("blurry"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_actor_is_required() {
        let args = vec!["gestura", "requests", "list"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_global_flags() {
        let args = vec![
            "gestura",
            "-c",
            "/custom/config.toml",
            "-t",
            "/custom/templates.json",
            "-v",
            "templates",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.templates, Some(PathBuf::from("/custom/templates.json")));
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_parse_with_quiet() {
        let args = vec!["gestura", "-q", "config", "path"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.quiet);
    }
}
