//! GPSD Protocol v3 report types
//!
//! This module defines the reports a streaming session can decode. Each
//! report corresponds to one value of the `class` field carried by every
//! JSON record GPSD emits:
//! - TPV (Time-Position-Velocity): Core GPS fix data
//! - SKY: Satellite visibility and signal strength
//! - GST: GPS pseudorange error statistics
//! - ATT: Attitude/orientation data
//! - DEVICE/DEVICES: GPS receiver information
//! - PPS: Pulse-per-second timing
//! - VERSION: GPSD daemon version information
//! - ERROR: Error notification
//!
//! Decoding is two-step: [`classify`] peeks at the `class` field only, and
//! [`Report::decode`] parses the whole record once the caller knows it wants
//! that class.
//!
//! All timestamps use the ISO 8601 format and are represented as `DateTime<Utc>`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use super::types::*;
use crate::{Result, error::GpsdError};

/// Time-Position-Velocity (TPV) report
///
/// The TPV message is the core GPS fix report, containing time, position, and velocity data.
/// This is the primary message type for navigation applications.
///
/// Reference: [json_tpv_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L34)
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tpv {
    /// Altitude in meters (deprecated, use altMSL or altHAE)
    pub alt: Option<f64>,
    /// Altitude, height above ellipsoid, in meters
    #[serde(rename = "altHAE")]
    pub alt_hae: Option<f64>,
    /// Altitude, MSL (mean sea level) in meters
    #[serde(rename = "altMSL")]
    pub alt_msl: Option<f64>,
    /// Antenna status (OK, OPEN, SHORT)
    pub ant: Option<AntennaStatus>,
    /// RTK baseline information (flattened)
    #[serde(flatten)]
    pub base: Baseline,
    /// Climb/sink rate in meters per second
    pub climb: Option<f64>,
    /// Geodetic datum (usually WGS84)
    pub datum: Option<String>,
    /// Device path that provided this data
    pub device: Option<String>,
    /// Depth below mean sea level in meters
    pub depth: Option<f64>,
    /// Age of DGPS corrections in seconds
    #[serde(rename = "dgpsAge")]
    pub dgps_age: Option<f64>,
    /// DGPS station ID
    #[serde(rename = "dgpsSta")]
    pub dgps_sta: Option<i32>,
    /// ECEF coordinates and velocities (flattened)
    #[serde(flatten)]
    pub ecef: Ecef,
    /// Estimated climb error in meters/second
    pub epc: Option<f64>,
    /// Estimated track error in degrees
    pub epd: Option<f64>,
    /// Estimated horizontal position error in meters
    pub eph: Option<f64>,
    /// Estimated speed error in meters/second
    pub eps: Option<f64>,
    /// Estimated time error in seconds
    pub ept: Option<f64>,
    /// Longitude error estimate in meters
    pub epx: Option<f64>,
    /// Latitude error estimate in meters
    pub epy: Option<f64>,
    /// Estimated vertical error in meters
    pub epv: Option<f64>,
    /// Geoid separation (height of geoid above WGS84 ellipsoid) in meters
    #[serde(rename = "geoidSep")]
    pub geoid_sep: Option<f64>,
    /// Latitude in degrees (positive = North)
    pub lat: Option<f64>,
    /// Jamming indicator
    pub jam: Option<i32>,
    /// Current leap seconds (GPS-UTC offset)
    pub leapseconds: Option<i32>,
    /// Longitude in degrees (positive = East)
    pub lon: Option<f64>,
    /// Magnetic track (course over ground relative to magnetic north)
    pub magtrack: Option<f64>,
    /// Magnetic variation in degrees
    pub magvar: Option<f64>,
    /// GPS fix mode (NoFix, 2D, 3D); `NotSeen` when absent
    #[serde(default)]
    pub mode: FixMode,
    /// NED velocity components (flattened)
    #[serde(flatten)]
    pub ned: Option<Ned>,
    /// Temperature in degrees Celsius
    pub temp: Option<f64>,
    /// GPS time of fix
    pub time: Option<DateTime<Utc>>,
    /// True track (course over ground) in degrees
    pub track: Option<f64>,
    /// Spherical error probability in meters
    pub sep: Option<f64>,
    /// Speed over ground in meters/second
    pub speed: Option<f64>,
    /// GPS fix status (standard, DGPS, RTK, etc.)
    pub status: Option<FixStatus>,
    /// Wind angle magnetic in degrees
    pub wanglem: Option<f64>,
    /// Wind angle relative in degrees
    pub wangler: Option<f64>,
    /// Wind angle true in degrees
    pub wanglet: Option<f64>,
    /// Wind speed relative in meters/second
    pub wspeedr: Option<f64>,
    /// Wind speed true in meters/second
    pub wspeedt: Option<f64>,
    /// Water temperature in degrees Celsius
    pub wtemp: Option<f64>,
    /// Reception time (when enabled by timing policy)
    #[serde(
        default,
        deserialize_with = "f64_to_datetime",
        serialize_with = "datetime_to_f64"
    )]
    pub rtime: Option<DateTime<Utc>>,
    /// PPS edge time (when enabled by timing policy)
    #[serde(
        default,
        deserialize_with = "f64_to_datetime",
        serialize_with = "datetime_to_f64"
    )]
    pub pps: Option<DateTime<Utc>>,
    /// Start of response time (when enabled by timing policy)
    #[serde(
        default,
        deserialize_with = "f64_to_datetime",
        serialize_with = "datetime_to_f64"
    )]
    pub sor: Option<DateTime<Utc>>,
    /// Character count in the sentence
    pub chars: Option<u64>,
    /// Number of satellites used in solution
    pub sats: Option<i32>,
    /// GPS week number
    pub week: Option<u16>,
    /// GPS time of week in seconds
    pub tow: Option<f64>,
    /// GPS week rollover count
    pub rollovers: Option<i32>,
    #[cfg(feature = "extra-fields")]
    /// Additional fields not explicitly defined
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// Satellite Sky View (SKY) report
///
/// The SKY message reports the satellites visible to the GPS receiver,
/// including signal strength, elevation, azimuth, and usage status.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sky {
    /// Device path that provided this data
    pub device: Option<String>,
    /// Dilution of precision values (flattened)
    #[serde(flatten)]
    pub dop: Option<Dop>,
    /// GPS time of this sky view
    pub time: Option<DateTime<Utc>>,
    /// Number of satellites visible
    #[serde(rename = "nSat")]
    pub n_sat: Option<i32>,
    /// Number of satellites used in navigation solution
    #[serde(rename = "uSat")]
    pub u_sat: Option<i32>,
    /// List of visible satellites with their properties
    #[serde(default)]
    pub satellites: Vec<Satellite>,
    #[cfg(feature = "extra-fields")]
    /// Additional fields not explicitly defined
    #[serde(flatten)]
    pub extra: std::collections::HashMap<String, serde_json::Value>,
}

/// GPS Pseudorange Error Statistics (GST)
///
/// The GST message provides GPS pseudorange noise statistics,
/// including RMS values of standard deviation ranges.
///
/// Reference: [json_noise_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L175)
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gst {
    /// Device path that provided this data
    pub device: Option<String>,
    /// GPS time of these statistics
    pub time: Option<DateTime<Utc>>,
    /// Altitude error in meters (1-sigma)
    pub alt: Option<f64>,
    /// Latitude error in meters (1-sigma)
    pub lat: Option<f64>,
    /// Longitude error in meters (1-sigma)
    pub lon: Option<f64>,
    /// Semi-major axis of error ellipse in meters
    pub major: Option<f64>,
    /// Semi-minor axis of error ellipse in meters
    pub minor: Option<f64>,
    /// Orientation of error ellipse in degrees from true north
    pub orient: Option<f64>,
    /// RMS value of standard deviation ranges
    pub rms: Option<f64>,
    /// East velocity error in meters/second (1-sigma)
    pub ve: Option<f64>,
    /// North velocity error in meters/second (1-sigma)
    pub vn: Option<f64>,
    /// Up velocity error in meters/second (1-sigma)
    pub vu: Option<f64>,
}

/// Attitude/orientation data (ATT)
///
/// Reports heading, pitch, roll and raw sensor readings from a compass,
/// gyroscope or IMU attached to the receiver. Status fields (`*_st`) carry
/// the single-character alarm codes of the originating sentence.
///
/// Reference: [json_att_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L466)
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub device: Option<String>,
    pub time: Option<DateTime<Utc>>,
    /// Heading in degrees from true north
    pub heading: Option<f64>,
    pub mag_st: Option<String>,
    /// Pitch in degrees
    pub pitch: Option<f64>,
    pub pitch_st: Option<String>,
    /// Yaw in degrees
    pub yaw: Option<f64>,
    pub yaw_st: Option<String>,
    /// Roll in degrees
    pub roll: Option<f64>,
    pub roll_st: Option<String>,
    /// Magnetic dip in degrees
    pub dip: Option<f64>,
    pub mag_len: Option<f64>,
    pub mag_x: Option<f64>,
    pub mag_y: Option<f64>,
    pub mag_z: Option<f64>,
    pub acc_len: Option<f64>,
    pub acc_x: Option<f64>,
    pub acc_y: Option<f64>,
    pub acc_z: Option<f64>,
    pub gyro_x: Option<f64>,
    pub gyro_y: Option<f64>,
    /// Water depth in meters
    pub depth: Option<f64>,
    /// Temperature in degrees Celsius
    #[serde(alias = "temperature")]
    pub temp: Option<f64>,
}

/// Pulse-Per-Second (PPS) timing report
///
/// Reports precise timing information from PPS-capable GPS receivers.
#[derive(Debug, Clone, PartialEq)]
pub struct Pps {
    /// Device path that provided this data
    pub device: Option<String>,
    /// GPS time of PPS edge
    pub real: Option<DateTime<Utc>>,
    /// System clock time of PPS edge
    pub clock: Option<DateTime<Utc>>,
    /// Clock precision in nanoseconds
    pub precision: Option<i32>,
    /// Quantization error of PPS signal
    pub q_err: Option<i32>,
}

/// PPS as it appears on the wire, times split into seconds and nanoseconds
#[skip_serializing_none]
#[derive(Serialize, Deserialize)]
struct PpsRecord {
    device: Option<String>,
    real_sec: Option<i64>,
    real_nsec: Option<i64>,
    clock_sec: Option<i64>,
    clock_nsec: Option<i64>,
    precision: Option<i32>,
    #[serde(rename = "qErr")]
    q_err: Option<i32>,
}

impl Serialize for Pps {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        PpsRecord {
            device: self.device.clone(),
            real_sec: self.real.map(|t| t.timestamp()),
            real_nsec: self.real.map(|t| i64::from(t.timestamp_subsec_nanos())),
            clock_sec: self.clock.map(|t| t.timestamp()),
            clock_nsec: self.clock.map(|t| i64::from(t.timestamp_subsec_nanos())),
            precision: self.precision,
            q_err: self.q_err,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Pps {
    fn deserialize<D>(deserializer: D) -> core::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = PpsRecord::deserialize(deserializer)?;
        Ok(Pps {
            device: raw.device,
            real: sec_nsec_to_datetime(raw.real_sec, raw.real_nsec),
            clock: sec_nsec_to_datetime(raw.clock_sec, raw.clock_nsec),
            precision: raw.precision,
            q_err: raw.q_err,
        })
    }
}

/// GPSD daemon version information
///
/// Reports version and protocol information about the GPSD server.
/// GPSD sends one of these as the banner of every new connection.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Version {
    /// GPSD release version string
    pub release: String,
    /// Git revision hash
    pub rev: String,
    /// Protocol major version number
    pub proto_major: i32,
    /// Protocol minor version number
    pub proto_minor: i32,
    /// Remote server URL (if applicable)
    pub remote: Option<String>,
}

/// List of GPS devices known to GPSD
///
/// Contains information about all GPS receivers connected to GPSD.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceList {
    /// List of available GPS devices
    pub devices: Vec<Device>,
    /// Remote server URL (if applicable)
    pub remote: Option<String>,
}

/// Error notification from GPSD
///
/// Reports errors that occur during GPSD operation.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Error {
    /// Error message text
    pub message: String,
}

/// The `class` discriminant of every report a session can decode
///
/// Classes GPSD emits that are not listed here (WATCH, TOFF, RAW, ...)
/// are never decoded and never delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportClass {
    Version,
    Tpv,
    Sky,
    Gst,
    Att,
    Devices,
    Device,
    Pps,
    Error,
}

impl ReportClass {
    /// Every decodable class, in wire-documentation order
    pub const ALL: [ReportClass; 9] = [
        ReportClass::Version,
        ReportClass::Tpv,
        ReportClass::Sky,
        ReportClass::Gst,
        ReportClass::Att,
        ReportClass::Devices,
        ReportClass::Device,
        ReportClass::Pps,
        ReportClass::Error,
    ];

    /// Returns the wire tag, e.g. `"TPV"`
    pub const fn as_str(&self) -> &'static str {
        match self {
            ReportClass::Version => "VERSION",
            ReportClass::Tpv => "TPV",
            ReportClass::Sky => "SKY",
            ReportClass::Gst => "GST",
            ReportClass::Att => "ATT",
            ReportClass::Devices => "DEVICES",
            ReportClass::Device => "DEVICE",
            ReportClass::Pps => "PPS",
            ReportClass::Error => "ERROR",
        }
    }

    /// Looks up a wire tag; `None` for tags outside the decodable set
    pub fn from_tag(tag: &str) -> Option<Self> {
        ReportClass::ALL
            .into_iter()
            .find(|class| class.as_str() == tag)
    }
}

impl core::fmt::Display for ReportClass {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded GPSD report
///
/// Closed over the classes in [`ReportClass`]; the variant always matches
/// the class the record was classified as.
/// Serializes as the bare report object, without its `class` tag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Report {
    /// GPSD version information
    Version(Version),
    /// Time-Position-Velocity report
    Tpv(Tpv),
    /// Satellite sky view report
    Sky(Sky),
    /// GPS pseudorange error statistics
    Gst(Gst),
    /// Attitude/orientation data
    Att(Attitude),
    /// List of available GPS devices
    Devices(DeviceList),
    /// Single GPS device information
    Device(Device),
    /// Pulse-per-second timing report
    Pps(Pps),
    /// Error message from GPSD
    Error(Error),
}

impl Report {
    /// Decodes a raw record as the given class
    ///
    /// Missing fields fall back to `None` or their zero value; only records
    /// that are not JSON objects or carry ill-typed fields fail.
    pub fn decode(class: ReportClass, line: &[u8]) -> Result<Self> {
        let report = match class {
            ReportClass::Version => Report::Version(from_record(line)?),
            ReportClass::Tpv => Report::Tpv(from_record(line)?),
            ReportClass::Sky => Report::Sky(from_record(line)?),
            ReportClass::Gst => Report::Gst(from_record(line)?),
            ReportClass::Att => Report::Att(from_record(line)?),
            ReportClass::Devices => Report::Devices(from_record(line)?),
            ReportClass::Device => Report::Device(from_record(line)?),
            ReportClass::Pps => Report::Pps(from_record(line)?),
            ReportClass::Error => Report::Error(from_record(line)?),
        };
        Ok(report)
    }

    /// Returns the class this report was decoded as
    pub fn class(&self) -> ReportClass {
        match self {
            Report::Version(_) => ReportClass::Version,
            Report::Tpv(_) => ReportClass::Tpv,
            Report::Sky(_) => ReportClass::Sky,
            Report::Gst(_) => ReportClass::Gst,
            Report::Att(_) => ReportClass::Att,
            Report::Devices(_) => ReportClass::Devices,
            Report::Device(_) => ReportClass::Device,
            Report::Pps(_) => ReportClass::Pps,
            Report::Error(_) => ReportClass::Error,
        }
    }
}

/// Extracts the report class of a raw record without decoding its payload
///
/// Returns `Ok(None)` when the record has no `class` field or names a
/// class outside [`ReportClass`], and an error when the record is not a
/// JSON object with a string `class` (including empty lines).
pub fn classify(line: &[u8]) -> Result<Option<ReportClass>> {
    #[derive(Deserialize)]
    struct ClassPeek {
        class: Option<String>,
    }

    let peek: ClassPeek = from_record(line)?;
    Ok(peek.class.as_deref().and_then(ReportClass::from_tag))
}

fn from_record<T: serde::de::DeserializeOwned>(line: &[u8]) -> Result<T> {
    serde_json::from_slice(line).map_err(GpsdError::SerdeError)
}

/// Helper function to deserialize floating-point Unix timestamps to DateTime
///
/// Converts a floating-point number representing seconds since Unix epoch
/// to a DateTime<Utc> object, preserving sub-second precision.
fn f64_to_datetime<'de, D>(deserializer: D) -> core::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<f64>::deserialize(deserializer)?;
    Ok(opt.and_then(|float| {
        DateTime::<Utc>::from_timestamp(float.trunc() as i64, ((float.fract()) * 1e9) as u32)
    }))
}

fn datetime_to_f64<S>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> core::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match value {
        Some(dt) => serializer
            .serialize_f64(dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9),
        None => serializer.serialize_none(),
    }
}

/// Out-of-range nanoseconds yield `None` rather than a wrapped value
fn sec_nsec_to_datetime(sec: Option<i64>, nsec: Option<i64>) -> Option<DateTime<Utc>> {
    let nsec = u32::try_from(nsec.unwrap_or(0)).ok()?;
    DateTime::<Utc>::from_timestamp(sec?, nsec)
}
