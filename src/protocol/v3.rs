//! GPSD JSON Protocol Version 3 implementation
//!
//! This module implements version 3 of the GPSD JSON protocol, which is
//! the current stable protocol used by GPSD 3.x releases.
//!
//! The protocol defines a set of request commands that clients can send
//! to GPSD and report messages that GPSD sends back. All communication
//! uses newline-delimited JSON format.
//!
//! # Protocol Overview
//!
//! - Commands start with '?' and end with ';'
//! - Reports are JSON objects with a "class" field indicating message type
//! - Data can be streamed continuously (watch mode) or polled on demand
//!
//! # References
//!
//! Based on the GPSD project protocol specification:
//! - [GPSD Protocol Documentation](https://gpsd.io/gpsd_json.html)
//! - [Protocol Version History](https://gitlab.com/gpsd/gpsd)

/// Request message types and builders
pub mod request;
/// Report message types, classifier and decoder
pub mod response;
/// Common data types used in protocol messages
pub mod types;

/// Protocol version 3 major version number
///
/// Reference: [release-3.25](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/SConscript?ref_type=tags#L226)
pub const API_VERSION_MAJOR: i32 = 3;

/// Protocol version 3 minor version number
///
/// This library supports protocol version 3.15 and later
pub const API_VERSION_MINOR: i32 = 15;

/// Type alias for version 3 request messages
///
/// This is a convenience alias for `request::Message` that makes it
/// clear we're working with protocol v3 requests.
pub type RequestMessage = request::Message;

pub use response::{Report, ReportClass, classify};
