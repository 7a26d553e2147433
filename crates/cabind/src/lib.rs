//! cabind - cabin capability bridge daemon
//!
//! Wires the OBD, media and update components to one UI-bound queue and
//! exposes them through the synchronous [`NativeBridge`] facade.

pub mod bridge;
pub mod commands;
pub mod config;
pub mod surface;

pub use bridge::{BridgeParts, NativeBridge};
pub use commands::{Command, CommandError, Reply};
pub use config::{BridgeConfig, BridgeSettings};
pub use surface::StdoutSurface;
