//! CLI command definitions for the `coach` binary.
//!
//! The CLI acts as one user, identified by `--user-id` (or
//! `STOCKCOACH_USER_ID`), against the same storage the server uses.

pub mod chat;
pub mod config;
pub mod history;
pub mod transcribe;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use stockcoach_types::user::{CurrentUser, SkillLevel};

use crate::state::AppState;

/// Chat with your AI trading coach.
#[derive(Parser)]
#[command(name = "coach", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Detailed output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(flatten)]
    pub identity: IdentityArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Who the CLI chats as.
#[derive(Args, Debug, Clone)]
pub struct IdentityArgs {
    /// User id the conversation belongs to.
    #[arg(long, global = true, env = "STOCKCOACH_USER_ID", default_value = "local")]
    pub user_id: String,

    /// Display name used in greetings.
    #[arg(long, global = true, env = "STOCKCOACH_USER_NAME", default_value = "")]
    pub name: String,

    /// Email, matched against `admin_emails`.
    #[arg(long, global = true, env = "STOCKCOACH_USER_EMAIL", default_value = "")]
    pub email: String,

    /// beginner, intermediate or advanced.
    #[arg(long, global = true, env = "STOCKCOACH_SKILL_LEVEL", default_value = "beginner")]
    pub skill_level: SkillLevel,
}

impl IdentityArgs {
    /// The CLI user, with admin status from the config.
    pub fn current_user(&self, state: &AppState) -> CurrentUser {
        state.with_admin_flag(CurrentUser {
            id: self.user_id.trim().to_string(),
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            skill_level: self.skill_level,
            experience_level: None,
            is_admin: false,
        })
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a message to today's session and print the reply.
    Send {
        /// Message text.
        #[arg(required_unless_present = "image")]
        message: Vec<String>,

        /// Attach an image (png, jpeg, gif, webp).
        #[arg(long)]
        image: Option<PathBuf>,
    },

    /// Print one session (today by default).
    Show {
        /// Session date, YYYY-MM-DD.
        date: Option<String>,
    },

    /// List past sessions, most recent first.
    #[command(alias = "ls")]
    History,

    /// Start a fresh session for today.
    #[command(name = "new-session")]
    NewSession,

    /// Transcribe an audio clip through the configured endpoint.
    Transcribe {
        /// Audio file to upload.
        file: PathBuf,
    },

    /// Show the effective configuration (token masked).
    Config,

    /// Start the REST API server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}
