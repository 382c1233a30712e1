//! Daemon Protocol and Daemon Client: talks to the UI-framework's
//! machine-mode subprocess over stdin/stdout.

mod client;
mod protocol;

pub use client::DaemonClient;
pub use protocol::{classify_line, DaemonEvent, DaemonMessage, DaemonRequest, DaemonResponse};
