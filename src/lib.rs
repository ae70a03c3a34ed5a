//! # APC Fare Zones
//!
//! Trip segmentation and fare-zone attribution for bus AVL/APC stop records.
//!
//! This library provides:
//! - Decoding of positional stop-event rows (already split by an external CSV reader)
//! - Grouping of a day's stop events into scheduled vehicle trips
//! - Attribution of each trip's boardings to fare tiers (Minimum, Maximum,
//!   Boundary, Landmark) plus an exemption count
//!
//! ## Features
//!
//! - **`serde`** (default) - Serialisable config and outputs, JSON config loading
//!
//! ## Quick Start
//!
//! ```rust
//! use apc_fare_zones::{FareConfig, SegmentationStrategy, Snapshot};
//!
//! let config = FareConfig::default();
//! let b = config.reference_points.boundary_outbound;
//!
//! let coords = format!("{},{}", b.latitude, b.longitude);
//!
//! // Two header rows, then one row per stop
//! let mut rows: Vec<Vec<&str>> = vec![vec![""; 25], vec![""; 25]];
//! for (station, time, boarding) in [("30", "01/02/2024 06:00:00", "5"), ("31", "01/02/2024 06:10:00", "3")] {
//!     let mut row = vec![""; 25];
//!     row[0] = "6IP";
//!     row[5] = station;
//!     row[6] = coords.as_str();
//!     row[7] = time;
//!     row[9] = boarding;
//!     rows.push(row);
//! }
//!
//! let snapshot = Snapshot::load(&rows, config, SegmentationStrategy::TimeWindows);
//! assert_eq!(snapshot.segmentation().trips.len(), 1);
//! assert_eq!(snapshot.all_metrics().total(), 8);
//! ```

use std::fmt;
use std::ops::AddAssign;

pub mod geo_utils;

pub mod config;
pub use config::{ExcludedStations, FareConfig, FareTable, ReferencePoints, TripSlot};

pub mod error;
pub use error::ConfigError;

pub mod events;
pub use events::{parse_rows, LoadReport, StopEvent, DOOR_COUNT, MISSING_TEXT};

// Near-duplicate merge pass over the decoded sequence
pub mod consolidate;
pub use consolidate::consolidate;

pub mod trips;
pub use trips::{
    segment_trips, DirectionMismatch, Segmentation, SegmentationStrategy, Trip,
};

pub mod fares;
pub use fares::{
    attribute_all_trips, attribute_fares, attribute_trip, locate_cut_points,
    CutPoints, FareCategory, FareIssue, FareMetrics, TripFareReport,
};

pub mod summary;
pub use summary::{
    door_totals, reconcile, station_rankings, summarize_trips, LoadReconciliation, StationRank, StationRankings,
    TripsSummary,
};

// Diagnostics only, never consulted by the fare math
pub mod probe;
pub use probe::{ProbeHit, ReferenceProbe};

pub mod snapshot;
pub use snapshot::Snapshot;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use apc_fare_zones::GpsPoint;
/// let point = GpsPoint::new(-30.078786, -51.116670);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Direction of travel of a trip.
///
/// The source data labels these "ida" (outbound) and "volta" (inbound).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }

    /// The other leg of the route.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Outbound => Direction::Inbound,
            Direction::Inbound => Direction::Outbound,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Boarding and alighting counted at a single physical door.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DoorCounts {
    pub boarding: u32,
    pub alighting: u32,
}

impl DoorCounts {
    pub fn new(boarding: u32, alighting: u32) -> Self {
        Self { boarding, alighting }
    }

    pub fn total(&self) -> u32 {
        self.boarding + self.alighting
    }
}

impl AddAssign for DoorCounts {
    fn add_assign(&mut self, other: Self) {
        self.boarding += other.boarding;
        self.alighting += other.alighting;
    }
}

// ============================================================================
// Tests
// ============================================================================
