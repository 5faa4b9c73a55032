//! Call session: join, leave, and routing of relay and peer events.

mod handlers;
mod manager;
mod pump;
mod types;

pub use manager::CallSession;
pub use types::{CallEvent, SessionConfig, SessionHandle, SessionPhase};
