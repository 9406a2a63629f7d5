//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::approval::BatchStatus;
use crate::lifecycle::{Actor, Role};

/// Where tracker frames come from.
#[derive(Debug, Clone, Args)]
pub struct FrameInput {
    /// JSON-lines file of tracker frames (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(short, long)]
    pub json: bool,
}

/// Practice command arguments.
#[derive(Debug, Args)]
pub struct PracticeCommand {
    /// Gesture to practice (label or display name)
    pub gesture: String,

    /// Frame source and output format
    #[command(flatten)]
    pub frames: FrameInput,
}

/// Capture command arguments.
#[derive(Debug, Args)]
pub struct CaptureCommand {
    /// Gesture to customize (label or display name)
    pub gesture: String,

    /// Admin the samples belong to
    #[arg(short, long, value_name = "ADMIN_ID")]
    pub admin: String,

    /// Frame source and output format
    #[command(flatten)]
    pub frames: FrameInput,
}

/// Templates command arguments.
#[derive(Debug, Args)]
pub struct TemplatesCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Who is calling a lifecycle or approval command.
#[derive(Debug, Clone, Args)]
pub struct ActorArgs {
    /// Caller's admin id
    #[arg(long = "as", value_name = "ADMIN_ID")]
    pub admin_id: String,

    /// Caller's role
    #[arg(long, value_enum, default_value = "admin")]
    pub role: RoleArg,
}

impl From<&ActorArgs> for Actor {
    fn from(args: &ActorArgs) -> Self {
        Self {
            admin_id: args.admin_id.clone(),
            role: args.role.into(),
        }
    }
}

/// Gesture request lifecycle commands.
#[derive(Debug, Subcommand)]
pub enum RequestsCommand {
    /// List the caller's gesture request entries
    List {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Show entries with blocking flags
    Status {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Mark a gesture as customed
    Customize {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Gesture id
        #[arg(long)]
        gesture: String,

        /// Gesture display name (default: derived from the id)
        #[arg(long)]
        name: Option<String>,
    },

    /// Block all of the caller's gestures pending approval
    Submit {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Reset customed gestures and delete the caller's pipeline folder
    DeleteCustomed {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Approve another admin's blocked gestures (superadmin)
    Approve {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Admin whose gestures are approved
        #[arg(long, value_name = "ADMIN_ID")]
        admin: String,
    },

    /// Reject another admin's blocked gestures (superadmin)
    Reject {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Admin whose gestures are rejected
        #[arg(long, value_name = "ADMIN_ID")]
        admin: String,
    },

    /// Reset every gesture to ready
    Reset {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Target admin (default: the caller)
        #[arg(long, value_name = "ADMIN_ID")]
        admin: Option<String>,
    },
}

/// Customization batch commands.
#[derive(Debug, Subcommand)]
pub enum BatchCommand {
    /// Submit the caller's recorded samples for approval
    Submit {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Gestures covered (default: every label in the recorded samples)
        #[arg(short, long = "gesture")]
        gestures: Vec<String>,
    },

    /// List batches, newest first
    List {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Only batches in this status
        #[arg(short, long, value_enum)]
        status: Option<BatchStatusArg>,
    },

    /// Show the caller's latest batch
    Status {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,
    },

    /// Approve a batch and run data preparation (superadmin)
    Approve {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Batch id
        id: i64,
    },

    /// Reject a batch (superadmin)
    Reject {
        /// Caller
        #[command(flatten)]
        actor: ActorArgs,

        /// Batch id
        id: i64,

        /// Reason shown to the admin
        #[arg(short, long)]
        reason: Option<String>,
    },
}

/// Samples command arguments.
#[derive(Debug, Args)]
pub struct SamplesCommand {
    /// Admin whose persisted samples to list
    pub admin: String,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Role argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Ordinary admin
    Admin,
    /// Superadmin
    Superadmin,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Self::Admin,
            RoleArg::Superadmin => Self::Superadmin,
        }
    }
}

/// Batch status argument for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BatchStatusArg {
    /// Waiting for a superadmin
    Pending,
    /// Preparation running
    Processing,
    /// Samples persisted
    Approved,
    /// Declined
    Rejected,
    /// Preparation failed
    Failed,
}

impl From<BatchStatusArg> for BatchStatus {
    fn from(arg: BatchStatusArg) -> Self {
        match arg {
            BatchStatusArg::Pending => Self::Pending,
            BatchStatusArg::Processing => Self::Processing,
            BatchStatusArg::Approved => Self::Approved,
            BatchStatusArg::Rejected => Self::Rejected,
            BatchStatusArg::Failed => Self::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arg_conversion() {
        assert_eq!(Role::from(RoleArg::Admin), Role::Admin);
        assert_eq!(Role::from(RoleArg::Superadmin), Role::Superadmin);
    }

    #[test]
    fn test_batch_status_arg_conversion() {
        assert_eq!(BatchStatus::from(BatchStatusArg::Pending), BatchStatus::Pending);
        assert_eq!(BatchStatus::from(BatchStatusArg::Failed), BatchStatus::Failed);
        assert_eq!(BatchStatus::from(BatchStatusArg::Approved), BatchStatus::Approved);
    }

    #[test]
    fn test_actor_from_args() {
        let args = ActorArgs {
            admin_id: "root".to_string(),
            role: RoleArg::Superadmin,
        };
        let actor = Actor::from(&args);
        assert_eq!(actor.admin_id, "root");
        assert!(actor.is_superadmin());
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
