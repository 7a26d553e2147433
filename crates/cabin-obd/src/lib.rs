//! cabin-obd - OBD adapter streaming for the cabin bridge
//!
//! Finds an OBD adapter (paired wireless adapter first, then local serial
//! devices), frames its byte stream into text lines and forwards each line
//! to the UI as an `onOBDData` callback.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │               ObdSessionManager               │
//! │  Idle → Connecting → Streaming → Idle         │
//! │                                               │
//! │  ┌─────────────┐        ┌──────────────────┐  │
//! │  │ Discovery   │──open─▶│ Transport        │  │
//! │  │ (policy)    │        │ (RFCOMM/chardev) │  │
//! │  └─────────────┘        └────────┬─────────┘  │
//! │                                  │ read()     │
//! │                         ┌────────┴─────────┐  │
//! │                         │ LineReader       │  │
//! │                         │ (worker thread)  │  │
//! │                         └────────┬─────────┘  │
//! └──────────────────────────────────┼────────────┘
//!                                    │ BridgeEvent::ObdData
//!                                    ▼
//!                                EventSink
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod framer;
pub mod session;
pub mod transport;

pub use config::{FramingConfig, ObdConfig};
pub use discovery::{Discovered, Discovery, DiscoverySource};
pub use error::ObdError;
pub use framer::{LineFramer, LineReader};
pub use session::{ObdSessionManager, ObdStatus, SessionState};
pub use transport::{Transport, TransportError, TransportKind};
