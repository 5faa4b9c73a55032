use clap::{Parser, Subcommand};

/// Meetify: a headless mesh-call client.
#[derive(Parser, Debug)]
#[command(name = "meetify", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a fresh meeting code.
    New,

    /// Join a room and stay in the call until /leave or Ctrl-C.
    Join {
        /// Room identifier or meeting code.
        room: String,

        /// Name shown to other participants.
        #[arg(short, long, default_value = "Guest")]
        name: String,

        /// Session token passed to the relay.
        #[arg(long)]
        token: Option<String>,

        /// Relay URL, overriding `[signaling] url`.
        #[arg(long)]
        relay: Option<String>,

        /// Join without a microphone.
        #[arg(long)]
        no_audio: bool,

        /// Join without a camera.
        #[arg(long)]
        no_video: bool,
    },

    /// Print the effective configuration as JSON.
    Config,
}

pub fn parse() -> Args {
    Args::parse()
}
