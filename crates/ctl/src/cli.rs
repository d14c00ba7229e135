use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "taskmail-ctl",
    version,
    about = "Operator commands for the Taskmail notification pipeline",
    long_about = "Check the mail configuration, inspect the notification queue and issue API tokens"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Test email service functionality and configuration
    EmailTest {
        /// Test with a specific user ID (defaults to the oldest user)
        #[arg(long)]
        user_id: Option<Uuid>,

        /// Check the configuration only, send nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// View email queue status and pending jobs
    QueueEmails {
        /// Show only failed jobs
        #[arg(long)]
        failed: bool,

        /// Show only pending jobs
        #[arg(long)]
        pending: bool,

        /// Show only queue statistics
        #[arg(long)]
        stats: bool,
    },

    /// Sign an API token for a user
    IssueToken {
        /// User to issue the token for
        #[arg(long)]
        user_id: Uuid,
    },
}
