//! # gpsd-session
//!
//! A streaming client for GPSD (GPS Service Daemon) speaking its JSON protocol.
//!
//! GPSD monitors GPS receivers attached to a host and publishes their data on
//! TCP port 2947 as newline-delimited JSON records, each tagged with a
//! `class`. This crate keeps a session with GPSD open, enables watch mode,
//! decodes the records you subscribed to into typed reports and hands them
//! to your callbacks. A dropped connection is re-established automatically.
//!
//! ## Example
//!
//! ```ignore
//! use gpsd_session::client::Session;
//! use gpsd_session::protocol::v3::{Report, ReportClass};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = Session::connect("127.0.0.1:2947").await?;
//!
//!     session.subscribe(ReportClass::Sky, |report| {
//!         if let Report::Sky(sky) = report {
//!             println!("{} satellites in view", sky.satellites.len());
//!         }
//!     });
//!
//!     let handle = session.start();
//!     tokio::signal::ctrl_c().await?;
//!     handle.close().await?;
//!     Ok(())
//! }
//! ```

use crate::error::GpsdError;

/// Streaming session with a GPSD server
#[cfg(feature = "tokio")]
pub mod client;

/// Error types used throughout the library
pub mod error;

/// Protocol definitions and message parsing for GPSD JSON protocol
pub mod protocol;

/// Convenience type alias for Results with GpsdError
pub type Result<T> = core::result::Result<T, GpsdError>;
