//! # handsync engine
//!
//! Desktop-side sync session for handheld PIM devices.
//!
//! This crate provides:
//! - The session state machine ([`SyncSession`], [`SessionState`])
//! - Wrapped exchanges over the two TCP legs ([`Channel`])
//! - Session configuration ([`SessionConfig`])
//! - Wire traffic logging ([`MessageLog`], [`FileMessageLog`])
//!
//! ## Session flow
//!
//! ```text
//! Idle -> Listening -> Connected -> InfoKnown -> Authenticated -> StateKnown
//!      -> FormatKnown -> Iterating -> Done -> Disconnected
//! ```
//!
//! The desktop dials the device and announces itself on the outbound leg.
//! The device then connects back to the desktop listener, and every request
//! and reply after that travels on this inbound leg. On termination a final
//! ready message closes the outbound leg.
//!
//! ## Key invariants
//!
//! - Every message is bracketed by REQ and ACK control frames
//! - Operations run only in the states that allow them
//! - Errors are never retried; `finalize` releases everything

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod log;
mod session;
mod transport;

pub use config::{SessionConfig, DESKTOP_PORT, DEVICE_PORT};
pub use error::{SyncError, SyncResult};
pub use log::{Direction, FileMessageLog, MessageLog, NullLog};
pub use session::{AuthOutcome, PullReport, SessionState, SyncSession};
pub use transport::{accept, bind, dial, Channel, Closeable, Leg, MockStream};
