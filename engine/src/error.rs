//! Error taxonomy for the engine.
//!
//! Variants are grouped by failure domain, not one type per subsystem.
//! Locally recoverable cases (transient poll
//! failures, per-sub-capture failures inside a checkpoint) never reach this
//! type at all — they are logged as warnings and swallowed where they occur.

use thiserror::Error;

/// The engine-wide error type. Every public API returns `Result<T, EngineError>`.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An ADB subprocess failed, returned non-zero, or timed out.
    #[error("transport error: {0}")]
    Transport(String),

    /// A daemon RPC came back with an `error` payload, or the child closed
    /// before a response arrived.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// VM Inspection Client failure: no isolate, empty response, bad base64.
    #[error("vm service error: {0}")]
    VmService(String),

    /// An operation was requested while the session was not in the state
    /// that operation requires (e.g. hot-reload before `app.started`).
    #[error("session invariant violated: {0}")]
    SessionInvariant(String),

    /// A scene failed validation before any step ran.
    #[error("scene validation failed: {0}")]
    SceneValidation(String),

    /// A label- or text-based tap matched more than one candidate and no
    /// `occurrence` was given to disambiguate.
    #[error("ambiguous match: {0}")]
    Ambiguity(String),

    /// `scenectl.toml` exists but failed to parse.
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
