//! cabin-core - Core types for the cabin capability bridge
//!
//! This crate provides the pieces shared by every bridge component:
//! the error taxonomy that boundary-facing operations collapse into,
//! the outbound event model, and the UI-bound queue that serializes
//! callback delivery to the script-driven UI surface.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  ┌───────────────┐  ┌─────────────────┐
//! │ OBD worker   │  │ Update poller │  │ ...             │
//! └──────┬───────┘  └──────┬────────┘  └──────┬──────────┘
//!        │ post()          │ post()           │ post()
//!        └────────────┬────┴──────────────────┘
//!                ┌────┴─────┐
//!                │ UiQueue  │  (FIFO per producer)
//!                └────┬─────┘
//!              ┌──────┴───────┐
//!              │ UiDispatcher │  single consumer task
//!              └──────┬───────┘
//!              ┌──────┴───────┐
//!              │  UiSurface   │  evaluate(script), never concurrent
//!              └──────────────┘
//! ```

pub mod dispatch;
pub mod error;
pub mod event;
pub mod testing;

pub use dispatch::{UiDispatcher, UiQueue, UiSurface};
pub use error::{BridgeError, BridgeResult};
pub use event::{BridgeEvent, EventChannel, EventSink};
