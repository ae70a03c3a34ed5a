//! Configuration for segmentation and fare attribution.
//!
//! Every constant the algorithms depend on lives here: the four reference
//! coordinates, the match tolerance, the trip-slot schedule, the excluded
//! station numbers and the fare table. [`FareConfig::default`] reproduces the
//! values used for the route the rules were written for.

use std::collections::{BTreeSet, HashSet};

use chrono::{NaiveTime, Timelike};

use crate::error::ConfigError;
use crate::{Direction, GpsPoint};

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

// ============================================================================
// Reference Points
// ============================================================================

/// The two fare cut points, one coordinate per direction each.
///
/// - **Boundary** ("Parada 31") separates the Minimum zone from zones farther out
/// - **Landmark** ("Parada 42") delimits the intermediate Landmark tier
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReferencePoints {
    pub boundary_outbound: GpsPoint,
    pub boundary_inbound: GpsPoint,
    pub landmark_outbound: GpsPoint,
    pub landmark_inbound: GpsPoint,
}

impl ReferencePoints {
    /// Boundary coordinate for a direction.
    pub fn boundary(&self, direction: Direction) -> GpsPoint {
        match direction {
            Direction::Outbound => self.boundary_outbound,
            Direction::Inbound => self.boundary_inbound,
        }
    }

    /// Landmark coordinate for a direction.
    pub fn landmark(&self, direction: Direction) -> GpsPoint {
        match direction {
            Direction::Outbound => self.landmark_outbound,
            Direction::Inbound => self.landmark_inbound,
        }
    }
}

impl Default for ReferencePoints {
    fn default() -> Self {
        Self {
            boundary_outbound: GpsPoint::new(-30.078786, -51.116670),
            boundary_inbound: GpsPoint::new(-30.079075, -51.116130),
            landmark_outbound: GpsPoint::new(-30.094485, -51.079701),
            landmark_inbound: GpsPoint::new(-30.094761, -51.080683),
        }
    }
}

// ============================================================================
// Trip Slots
// ============================================================================

/// One scheduled vehicle run: an identity, a direction and a time-of-day window.
///
/// The window is inclusive at both ends, in whole seconds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripSlot {
    pub id: String,
    pub name: String,
    pub expected_line: String,
    pub direction: Direction,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TripSlot {
    /// Build a slot from `HH:MM:SS` window bounds.
    ///
    /// # Example
    /// ```
    /// use apc_fare_zones::{Direction, TripSlot};
    ///
    /// let slot = TripSlot::parse("trip-1", "Morning run", "6IP", Direction::Outbound, "00:00:00", "07:59:59").unwrap();
    /// assert!(slot.contains(chrono::NaiveTime::from_hms_opt(7, 59, 59).unwrap()));
    /// ```
    pub fn parse(
        id: &str,
        name: &str,
        expected_line: &str,
        direction: Direction,
        start: &str,
        end: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            id: id.to_string(),
            name: name.to_string(),
            expected_line: expected_line.to_string(),
            direction,
            start: parse_hms(start)?,
            end: parse_hms(end)?,
        })
    }

    /// Whether a time of day falls inside this slot's window (both ends inclusive).
    #[inline]
    pub fn contains(&self, time: NaiveTime) -> bool {
        time >= self.start && time <= self.end
    }
}

fn parse_hms(text: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(text.trim(), "%H:%M:%S")
        .map_err(|_| ConfigError::InvalidTime(text.to_string()))
}

fn hms(hour: u32, minute: u32, second: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, second).unwrap_or(NaiveTime::MIN)
}

fn slot(id: &str, name: &str, line: &str, direction: Direction, start: NaiveTime, end: NaiveTime) -> TripSlot {
    TripSlot {
        id: id.to_string(),
        name: name.to_string(),
        expected_line: line.to_string(),
        direction,
        start,
        end,
    }
}

/// The operating day's four trip slots.
///
/// Slot 3 starts at 14:00:01: slot 2 already claims 14:00:00 under
/// first-match-wins, so this tiles the day exactly without moving any event.
pub fn default_schedule() -> Vec<TripSlot> {
    vec![
        slot("trip-1", "Trip 1 - Line 6IP (outbound)", "6IP", Direction::Outbound, hms(0, 0, 0), hms(7, 59, 59)),
        slot("trip-2", "Trip 2 - Line 1BCSOR (inbound)", "1BCSOR", Direction::Inbound, hms(8, 0, 0), hms(14, 0, 0)),
        slot("trip-3", "Trip 3 - Line 3 5V (outbound)", "3 5V", Direction::Outbound, hms(14, 0, 1), hms(15, 59, 59)),
        slot("trip-4", "Trip 4 - Line 4 12V (inbound)", "4 12V", Direction::Inbound, hms(16, 0, 0), hms(23, 59, 59)),
    ]
}

/// Check that slots tile the whole day with no overlap and no gap.
///
/// Slot order in `slots` does not matter here; the segmenter still resolves
/// with first-match-wins over the configured order.
pub fn validate_schedule(slots: &[TripSlot]) -> Result<(), ConfigError> {
    if slots.is_empty() {
        return Err(ConfigError::EmptySchedule);
    }

    let mut seen = HashSet::new();
    for slot in slots {
        if !seen.insert(slot.id.as_str()) {
            return Err(ConfigError::DuplicateSlotId(slot.id.clone()));
        }
        if slot.end < slot.start {
            return Err(ConfigError::InvertedWindow { id: slot.id.clone() });
        }
    }

    let mut ordered: Vec<&TripSlot> = slots.iter().collect();
    ordered.sort_by_key(|s| s.start);

    // Next uncovered second, starting at midnight
    let mut covered_until = 0u32;
    let mut previous: Option<&TripSlot> = None;

    for slot in ordered {
        let start = slot.start.num_seconds_from_midnight();
        if let Some(prev) = previous {
            if start < covered_until {
                return Err(ConfigError::OverlappingSlots {
                    first: prev.id.clone(),
                    second: slot.id.clone(),
                });
            }
        }
        if start > covered_until {
            return Err(gap(covered_until, start - 1));
        }
        covered_until = slot.end.num_seconds_from_midnight() + 1;
        previous = Some(slot);
    }

    if covered_until < SECONDS_PER_DAY {
        return Err(gap(covered_until, SECONDS_PER_DAY - 1));
    }
    Ok(())
}

fn gap(from: u32, to: u32) -> ConfigError {
    let at = |secs: u32| NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap_or(NaiveTime::MIN);
    ConfigError::ScheduleGap { from: at(from), to: at(to) }
}

// ============================================================================
// Excluded Stations
// ============================================================================

/// Station numbers known to be artifacts of the GPS log.
///
/// Members contribute nothing to any boarding, alighting or exemption sum.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ExcludedStations(BTreeSet<u32>);

impl ExcludedStations {
    pub fn new(stations: impl IntoIterator<Item = u32>) -> Self {
        Self(stations.into_iter().collect())
    }

    #[inline]
    pub fn contains(&self, station_number: u32) -> bool {
        self.0.contains(&station_number)
    }

    pub fn insert(&mut self, station_number: u32) -> bool {
        self.0.insert(station_number)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

// ============================================================================
// Fare Table
// ============================================================================

/// Ticket price per fare category, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FareTable {
    pub minimum_cents: i64,
    pub maximum_cents: i64,
    pub boundary_cents: i64,
    pub landmark_cents: i64,
    pub exempt_cents: i64,
}

impl Default for FareTable {
    fn default() -> Self {
        Self {
            minimum_cents: 480,
            maximum_cents: 1030,
            boundary_cents: 500,
            landmark_cents: 770,
            exempt_cents: 0,
        }
    }
}

// ============================================================================
// Aggregate Config
// ============================================================================

/// Configuration for segmentation and fare attribution.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FareConfig {
    /// Boundary and Landmark coordinates per direction.
    pub reference_points: ReferencePoints,

    /// A stop matches a reference point when strictly closer than this.
    /// Default: 50.0 meters
    pub match_tolerance_meters: f64,

    /// Trip slots, scanned in order (first match wins).
    pub schedule: Vec<TripSlot>,

    /// Station numbers skipped at load time and in every sum.
    pub excluded_stations: ExcludedStations,

    /// Adjacent stops on the same line closer than this are merged.
    /// Default: 1.0 meter. Zero disables consolidation.
    pub consolidation_tolerance_meters: f64,

    /// Station number at which the optional geo direction cross-check runs.
    /// Default: 31
    pub geo_check_station: u32,

    /// Station number that closes a trip under sequential segmentation.
    /// Default: 1
    pub sequential_restart_station: u32,

    /// A trip must hold more than this many stops before the restart station closes it.
    /// Default: 10
    pub sequential_min_stops: usize,

    /// Prices used for revenue estimates.
    pub fare_table: FareTable,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            reference_points: ReferencePoints::default(),
            match_tolerance_meters: 50.0,
            schedule: default_schedule(),
            excluded_stations: ExcludedStations::default(),
            consolidation_tolerance_meters: 1.0,
            geo_check_station: 31,
            sequential_restart_station: 1,
            sequential_min_stops: 10,
            fare_table: FareTable::default(),
        }
    }
}

impl FareConfig {
    /// Check tolerances and the trip schedule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.match_tolerance_meters > 0.0) {
            return Err(ConfigError::NonPositiveTolerance {
                name: "match_tolerance_meters",
                value: self.match_tolerance_meters,
            });
        }
        if self.consolidation_tolerance_meters < 0.0 || self.consolidation_tolerance_meters.is_nan() {
            return Err(ConfigError::NonPositiveTolerance {
                name: "consolidation_tolerance_meters",
                value: self.consolidation_tolerance_meters,
            });
        }
        validate_schedule(&self.schedule)
    }

    /// Slot with the given id.
    pub fn slot(&self, id: &str) -> Option<&TripSlot> {
        self.schedule.iter().find(|s| s.id == id)
    }

    /// Load a config from JSON. Missing fields take their default values.
    ///
    /// # Example
    /// ```
    /// use apc_fare_zones::FareConfig;
    ///
    /// let config = FareConfig::from_json_str(r#"{ "match_tolerance_meters": 40.0, "excluded_stations": [7, 12] }"#).unwrap();
    /// assert_eq!(config.match_tolerance_meters, 40.0);
    /// assert!(config.excluded_stations.contains(12));
    /// assert_eq!(config.schedule.len(), 4);
    /// ```
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: FareConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(FareConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_schedule_tiles_day() {
        let schedule = default_schedule();
        assert_eq!(schedule.len(), 4);
        assert!(validate_schedule(&schedule).is_ok());

        // Every second of the day hits exactly one slot
        for secs in (0..SECONDS_PER_DAY).step_by(37).chain([SECONDS_PER_DAY - 1, 50_400, 50_401]) {
            let time = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0).unwrap();
            let hits = schedule.iter().filter(|s| s.contains(time)).count();
            assert_eq!(hits, 1, "time {} hit {} slots", time, hits);
        }
    }

    #[test]
    fn test_slot_window_inclusive() {
        let slot = TripSlot::parse("x", "x", "L", Direction::Inbound, "08:00:00", "14:00:00").unwrap();
        assert!(slot.contains(t(8, 0, 0)));
        assert!(slot.contains(t(14, 0, 0)));
        assert!(!slot.contains(t(14, 0, 1)));
        assert!(!slot.contains(t(7, 59, 59)));
    }

    #[test]
    fn test_slot_parse_rejects_bad_time() {
        let err = TripSlot::parse("x", "x", "L", Direction::Inbound, "8h", "14:00:00").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTime(ref s) if s == "8h"));
    }

    #[test]
    fn test_overlap_detected() {
        let mut schedule = default_schedule();
        schedule[2].start = t(14, 0, 0);
        let err = validate_schedule(&schedule).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OverlappingSlots { ref first, ref second } if first == "trip-2" && second == "trip-3"
        ));
    }

    #[test]
    fn test_gap_detected() {
        // Slot 2 ending at 13:59:59 while slot 3 starts at 14:10:00
        let mut schedule = default_schedule();
        schedule[1].end = t(13, 59, 59);
        schedule[2].start = t(14, 10, 0);
        let err = validate_schedule(&schedule).unwrap_err();
        match err {
            ConfigError::ScheduleGap { from, to } => {
                assert_eq!(from, t(14, 0, 0));
                assert_eq!(to, t(14, 9, 59));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_gap_at_end_of_day() {
        let mut schedule = default_schedule();
        schedule[3].end = t(22, 0, 0);
        let err = validate_schedule(&schedule).unwrap_err();
        assert!(matches!(err, ConfigError::ScheduleGap { to, .. } if to == t(23, 59, 59)));
    }

    #[test]
    fn test_inverted_and_duplicate_slots() {
        let mut schedule = default_schedule();
        schedule[0].end = t(0, 0, 0);
        schedule[0].start = t(1, 0, 0);
        assert!(matches!(validate_schedule(&schedule), Err(ConfigError::InvertedWindow { .. })));

        let mut schedule = default_schedule();
        schedule[3].id = "trip-1".into();
        assert!(matches!(validate_schedule(&schedule), Err(ConfigError::DuplicateSlotId(_))));

        assert!(matches!(validate_schedule(&[]), Err(ConfigError::EmptySchedule)));
    }

    #[test]
    fn test_tolerance_validation() {
        let config = FareConfig { match_tolerance_meters: 0.0, ..FareConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::NonPositiveTolerance { .. })));

        let config = FareConfig { consolidation_tolerance_meters: 0.0, ..FareConfig::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_reference_points_by_direction() {
        let refs = ReferencePoints::default();
        assert_eq!(refs.boundary(Direction::Outbound), refs.boundary_outbound);
        assert_eq!(refs.boundary(Direction::Inbound), refs.boundary_inbound);
        assert_eq!(refs.landmark(Direction::Outbound), refs.landmark_outbound);
        assert_eq!(refs.landmark(Direction::Inbound), refs.landmark_inbound);
    }

    #[test]
    fn test_excluded_stations() {
        let mut excluded = ExcludedStations::new([3, 9]);
        assert!(excluded.contains(3));
        assert!(!excluded.contains(4));
        assert!(excluded.insert(4));
        assert_eq!(excluded.iter().collect::<Vec<_>>(), vec![3, 4, 9]);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_round_trip_keeps_schedule() {
        let config = FareConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"14:00:01\""));
        let back = FareConfig::from_json_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_json_rejects_overlapping_schedule() {
        let json = r#"{
            "schedule": [
                { "id": "a", "name": "A", "expected_line": "L", "direction": "outbound", "start": "00:00:00", "end": "12:00:00" },
                { "id": "b", "name": "B", "expected_line": "L", "direction": "inbound", "start": "12:00:00", "end": "23:59:59" }
            ]
        }"#;
        assert!(matches!(
            FareConfig::from_json_str(json),
            Err(ConfigError::OverlappingSlots { .. })
        ));
    }
}
