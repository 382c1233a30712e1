//! VM Inspection Client: a WebSocket JSON-RPC client for the running
//! framework VM service, used to pull widget/semantics trees and
//! framework-side screenshots without going through the device's
//! compositor.

mod client;

pub use client::{Isolate, VmInspectionClient};
