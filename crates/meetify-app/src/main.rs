mod cli;
mod console;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use meetify_call::{
    CallSession, MediaSource, RtcEngine, SessionConfig, SignalingConnector, SimulatedEngine,
    SyntheticMediaSource, WsConnector, WsSignalingConfig,
};
use meetify_config::MeetifyConfig;
use tracing_subscriber::EnvFilter;

use crate::cli::Command;

/// Per-join overrides taken from the command line.
#[derive(Debug, Default)]
struct JoinOptions {
    token: Option<String>,
    relay: Option<String>,
    no_audio: bool,
    no_video: bool,
}

fn init_logging(cli_level: Option<&str>, config: &MeetifyConfig) {
    let filter = match cli_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = config.logging.level.as_directive();
            EnvFilter::new(format!("meetify_call={level},meetify_app={level}"))
        }),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn session_config(config: &MeetifyConfig, options: &JoinOptions) -> SessionConfig {
    SessionConfig {
        ice_servers: config.ice.servers.clone(),
        ice_timeout: Duration::from_secs(u64::from(config.ice.connectivity_timeout_secs)),
        start_with_audio: config.media.start_with_audio && !options.no_audio,
        start_with_video: config.media.start_with_video && !options.no_video,
        chat_history: config.chat.max_messages as usize,
        event_buffer: config.session.event_buffer as usize,
        access_token: options.token.clone(),
    }
}

fn signaling_config(config: &MeetifyConfig, options: &JoinOptions) -> WsSignalingConfig {
    WsSignalingConfig {
        url: options
            .relay
            .clone()
            .unwrap_or_else(|| config.signaling.url.clone()),
        connect_timeout: Duration::from_secs(u64::from(config.signaling.connect_timeout_secs)),
        ..WsSignalingConfig::default()
    }
}

async fn join(
    config: &MeetifyConfig,
    room: &str,
    name: &str,
    options: JoinOptions,
) -> meetify_common::Result<()> {
    let signaling = signaling_config(config, &options);
    tracing::info!(url = %signaling.url, room, "Connecting to relay");

    let (session, events) = CallSession::new(
        session_config(config, &options),
        Arc::new(WsConnector::new(signaling)) as Arc<dyn SignalingConnector>,
        Arc::new(SyntheticMediaSource::new()) as Arc<dyn MediaSource>,
        Arc::new(SimulatedEngine::new()) as Arc<dyn RtcEngine>,
    );
    session.join(room, name).await?;
    println!("{}", console::HELP);
    console::run(session, events).await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    // Config first so its [logging] level can seed the filter.
    let loaded = match args.config.as_deref() {
        Some(path) => meetify_config::load_config_from(Path::new(path)),
        None => meetify_config::load_config(),
    };
    let (config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (MeetifyConfig::default(), Some(e)),
    };

    init_logging(args.log_level.as_deref(), &config);
    tracing::info!("Meetify v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        tracing::info!("Using config override: {path}");
    }
    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
    }

    match args.command {
        Command::New => {
            println!("{}", meetify_call::generate_meeting_code());
            ExitCode::SUCCESS
        }
        Command::Config => {
            println!("{}", meetify_config::config_to_json(&config));
            ExitCode::SUCCESS
        }
        Command::Join {
            room,
            name,
            token,
            relay,
            no_audio,
            no_video,
        } => {
            let options = JoinOptions {
                token,
                relay,
                no_audio,
                no_video,
            };
            match join(&config, &room, &name, options).await {
                Ok(()) => {
                    tracing::info!("Shutdown complete");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!(error = %e, "Could not join call");
                    eprintln!("meetify: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_narrow_media_and_override_relay() {
        let config = MeetifyConfig::default();
        let options = JoinOptions {
            token: Some("t0k".into()),
            relay: Some("wss://relay.example/ws".into()),
            no_video: true,
            ..JoinOptions::default()
        };

        let session = session_config(&config, &options);
        assert!(session.start_with_audio);
        assert!(!session.start_with_video);
        assert_eq!(session.access_token.as_deref(), Some("t0k"));
        assert_eq!(session.ice_timeout, Duration::from_secs(20));
        assert_eq!(session.chat_history, 500);

        let signaling = signaling_config(&config, &options);
        assert_eq!(signaling.url, "wss://relay.example/ws");
        assert_eq!(signaling.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn config_media_off_stays_off() {
        let mut config = MeetifyConfig::default();
        config.media.start_with_audio = false;
        let session = session_config(&config, &JoinOptions::default());
        assert!(!session.start_with_audio);
        assert!(session.start_with_video);
        assert_eq!(
            signaling_config(&config, &JoinOptions::default()).url,
            config.signaling.url
        );
    }
}
