//! Interactive console: stdin lines become call actions, call events are
//! printed as they arrive.

use meetify_call::{CallEvent, CallSession, LocalMediaSnapshot, PreviewSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  /mic       toggle microphone
  /cam       toggle camera
  /screen    start or stop screen sharing
  /focus     open the chat panel (clears unread)
  /unfocus   close the chat panel
  /leave     leave the call
  /help      show this help
anything else is sent as a chat message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Mic,
    Camera,
    Screen,
    Focus,
    Unfocus,
    Leave,
    Help,
    Chat(String),
}

/// Blank lines yield `Ok(None)`; unknown slash commands are an error.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let Some(word) = line.strip_prefix('/') else {
        return Ok(Some(ConsoleCommand::Chat(line.to_string())));
    };
    let command = match word.to_ascii_lowercase().as_str() {
        "mic" | "mute" => ConsoleCommand::Mic,
        "cam" | "camera" => ConsoleCommand::Camera,
        "screen" | "share" => ConsoleCommand::Screen,
        "focus" | "chat" => ConsoleCommand::Focus,
        "unfocus" => ConsoleCommand::Unfocus,
        "leave" | "quit" | "exit" => ConsoleCommand::Leave,
        "help" | "?" => ConsoleCommand::Help,
        other => return Err(format!("unknown command: /{other} (try /help)")),
    };
    Ok(Some(command))
}

pub fn describe_media(media: &LocalMediaSnapshot) -> String {
    let on_off = |on: bool| if on { "on" } else { "off" };
    let preview = match media.preview {
        PreviewSource::Camera => "camera",
        PreviewSource::Screen => "screen",
        PreviewSource::None => "none",
    };
    format!(
        "mic {}, camera {}, screen {}, preview {preview}",
        on_off(media.mic_enabled),
        on_off(media.camera_enabled),
        on_off(media.screen_sharing),
    )
}

pub fn describe_event(event: &CallEvent) -> String {
    match event {
        CallEvent::Joined(handle) => format!(
            "* joined {} as {} ({})",
            handle.room_id, handle.display_name, handle.local_id
        ),
        CallEvent::MediaUnavailable { kind, reason } => {
            format!("! {kind} unavailable: {reason}")
        }
        CallEvent::PeerJoined { remote_id } => format!("* {remote_id} joined"),
        CallEvent::PeerConnected { remote_id } => format!("* connected to {remote_id}"),
        CallEvent::PeerLeft { remote_id } => format!("* {remote_id} left"),
        CallEvent::PeerUnreachable { remote_id } => format!("! {remote_id} is unreachable"),
        CallEvent::RemoteStream { remote_id, stream } => {
            let what = if stream.presentation {
                "presentation"
            } else {
                stream.kind.as_str()
            };
            format!("* receiving {what} from {remote_id} ({})", stream.label)
        }
        CallEvent::LocalMedia(media) => format!("* {}", describe_media(media)),
        CallEvent::ChatMessage(message) => format!("<{}> {}", message.sender, message.body),
        CallEvent::UnreadChanged(count) => format!("* {count} unread"),
        CallEvent::Error(e) => format!("! {e}"),
        CallEvent::Disconnected => "! lost connection to the relay".to_string(),
        CallEvent::Left => "* left the call".to_string(),
    }
}

/// Run one command. Returns false once the user asked to leave.
async fn execute(session: &CallSession, command: ConsoleCommand) -> bool {
    let media = match command {
        ConsoleCommand::Mic => session.toggle_mic().await,
        ConsoleCommand::Camera => session.toggle_camera().await,
        ConsoleCommand::Screen => session.toggle_screen_share().await,
        ConsoleCommand::Focus => {
            session.set_chat_focused(true).await;
            return true;
        }
        ConsoleCommand::Unfocus => {
            session.set_chat_focused(false).await;
            return true;
        }
        ConsoleCommand::Leave => return false,
        ConsoleCommand::Help => {
            println!("{HELP}");
            return true;
        }
        ConsoleCommand::Chat(body) => {
            match session.send_chat(&body).await {
                Ok(message) => println!("<{}> {}", message.sender, message.body),
                Err(e) => println!("! chat not sent: {e}"),
            }
            return true;
        }
    };
    match media {
        Ok(media) => println!("* {}", describe_media(&media)),
        Err(e) => println!("! {e}"),
    }
    true
}

/// Drive the call until the user leaves, stdin closes, Ctrl-C, or the
/// relay drops us.
pub async fn run(session: CallSession, mut events: mpsc::Receiver<CallEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(command)) => {
                        if !execute(&session, command).await {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(message) => println!("! {message}"),
                },
                Ok(None) => {
                    tracing::debug!("stdin closed, staying in call until Ctrl-C");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Some(event) => {
                    println!("{}", describe_event(&event));
                    if matches!(event, CallEvent::Disconnected | CallEvent::Left) {
                        return;
                    }
                }
                None => return,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    session.leave().await;
    while let Ok(event) = events.try_recv() {
        println!("{}", describe_event(&event));
    }
}
