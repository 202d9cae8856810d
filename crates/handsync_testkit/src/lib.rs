//! # handsync testkit
//!
//! Test utilities for handsync.
//!
//! This crate provides:
//! - A scripted mock device that speaks both TCP legs ([`MockDevice`])
//! - Sample devices, formats and records ([`fixtures`])
//! - Property-based test generators using proptest
//! - Fuzz harnesses for the frame, message and schema decoders
//!
//! ## Usage
//!
//! ```rust,ignore
//! use handsync_testkit::prelude::*;
//!
//! let device = MockDevice::bind()?;
//! let handle = device.spawn(desktop_port, todo_device());
//! // ... drive a session against it
//! let data = handle.join().unwrap()?;
//! assert_eq!(data.request_tags()[0], "RIG");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod device;
pub mod fixtures;
pub mod fuzz;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::device::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use device::{
    Category, DeviceData, DeviceError, DeviceLink, DeviceResult, MockDevice, Reply,
};
pub use fuzz::*;
pub use generators::*;
