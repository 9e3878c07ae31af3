use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "postsmith", version, about = "AI content generation server", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Override the config file path globally
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Enter an interactive content-generation REPL
    Chat {
        /// Session to continue; a fresh one is started when omitted
        #[arg(short, long)]
        session: Option<Uuid>,

        /// Target platform for generated content
        #[arg(short, long, default_value = "linkedin")]
        platform: String,

        /// Requested tone
        #[arg(short, long, default_value = "professional")]
        tone: String,

        /// Requested content kind: none, text, image or video
        #[arg(short, long, default_value = "text")]
        kind: String,
    },

    /// Manage stored sessions
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Subcommand)]
pub enum SessionAction {
    /// Create an empty named session
    Create {
        #[arg(short, long)]
        name: String,
    },

    /// List all sessions
    List,

    /// Delete a session
    Delete {
        id: Uuid,
    },

    /// Export a session transcript to a .txt file
    Export {
        /// The UUID of the session to export
        id: Uuid,
        /// The path to the output file (optional)
        #[arg(short, long)]
        path: Option<String>,
    },
}
