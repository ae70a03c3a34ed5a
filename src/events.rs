//! Stop events and row decoding.
//!
//! One [`StopEvent`] is one row of the AVL/APC export. Rows arrive already
//! split into fields by an external CSV reader; [`parse_rows`] applies the
//! positional layout, drops rows without usable coordinates and rows of
//! excluded stations, and returns the contiguous sequence the rest of the
//! crate indexes into.
//!
//! ## Row layout
//!
//! | Field | Content |
//! |-------|---------|
//! | 0-4 | line, plate, bus id, driver, direction label |
//! | 5 | station number |
//! | 6 | `"lat,lng"` (ASCII or full-width comma) |
//! | 7-8 | time1, time2 |
//! | 9-12 | boarding, alighting, carried, occupancy % |
//! | 13-24 | six (boarding, alighting) door pairs |

use chrono::NaiveTime;
use log::{debug, info};

use crate::config::ExcludedStations;
use crate::{DoorCounts, GpsPoint};

/// Number of physical doors reported per row.
pub const DOOR_COUNT: usize = 6;

/// Door whose alighting count marks exempt passengers (door 1).
pub const EXEMPT_DOOR: usize = 0;

/// Rows at the top of the export that never hold data.
pub const HEADER_ROWS: usize = 2;

/// Stand-in for text fields left blank in the export.
pub const MISSING_TEXT: &str = "N/A";

const FIELD_STATION: usize = 5;
const FIELD_COORDS: usize = 6;
const FIELD_TIME1: usize = 7;
const FIELD_TIME2: usize = 8;
const FIELD_BOARDING: usize = 9;
const FIELD_ALIGHTING: usize = 10;
const FIELD_CARRIED: usize = 11;
const FIELD_OCCUPANCY: usize = 12;
const FIELD_FIRST_DOOR: usize = 13;

/// One recorded stop of the vehicle.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopEvent {
    pub line: String,
    pub plate: String,
    pub bus_id: String,
    pub driver: String,
    /// Free-text direction label from the export, not used by the fare rules
    pub direction: String,
    pub station_number: u32,
    pub position: GpsPoint,
    pub timestamp: String,
    pub secondary_timestamp: String,
    pub boarding: u32,
    pub alighting: u32,
    pub carried: u32,
    pub occupancy_percent: u32,
    /// Alighting through the exempt door
    pub door_exempt_alighting: u32,
    pub doors: [DoorCounts; DOOR_COUNT],
}

impl StopEvent {
    /// Create an event with the fields the algorithms read; everything else is blank.
    ///
    /// # Example
    /// ```
    /// use apc_fare_zones::{GpsPoint, StopEvent};
    ///
    /// let event = StopEvent::new(31, GpsPoint::new(-30.0788, -51.1167), "01/02/2024 07:15:00", 4, 2)
    ///     .with_exempt_alighting(1);
    /// assert_eq!(event.doors[0].alighting, 1);
    /// assert_eq!(event.time_of_day().unwrap().to_string(), "07:15:00");
    /// ```
    pub fn new(
        station_number: u32,
        position: GpsPoint,
        timestamp: impl Into<String>,
        boarding: u32,
        alighting: u32,
    ) -> Self {
        Self {
            line: String::new(),
            plate: String::new(),
            bus_id: String::new(),
            driver: String::new(),
            direction: String::new(),
            station_number,
            position,
            timestamp: timestamp.into(),
            secondary_timestamp: String::new(),
            boarding,
            alighting,
            carried: 0,
            occupancy_percent: 0,
            door_exempt_alighting: 0,
            doors: [DoorCounts::default(); DOOR_COUNT],
        }
    }

    /// Set the exempt-door alighting count, keeping door 1 consistent with it.
    pub fn with_exempt_alighting(mut self, count: u32) -> Self {
        self.door_exempt_alighting = count;
        self.doors[EXEMPT_DOOR].alighting = count;
        self
    }

    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.line = line.into();
        self
    }

    pub fn with_plate(mut self, plate: impl Into<String>) -> Self {
        self.plate = plate.into();
        self
    }

    /// Time-of-day component of `timestamp`, if it parses.
    pub fn time_of_day(&self) -> Option<NaiveTime> {
        parse_time_of_day(&self.timestamp)
    }
}

// ============================================================================
// Field Decoding
// ============================================================================

/// Extract the time of day from a `date time` string.
///
/// Takes the last whitespace-separated token and accepts `HH:MM:SS` or `HH:MM`.
pub fn parse_time_of_day(timestamp: &str) -> Option<NaiveTime> {
    let token = timestamp.split_whitespace().last()?;
    NaiveTime::parse_from_str(token, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(token, "%H:%M"))
        .ok()
}

/// Parse a `"lat,lng"` coordinate field.
///
/// The separator may be an ASCII comma or a full-width comma (U+FF0C). Exactly
/// two parts are required and both must be finite in-range numbers.
pub fn parse_lat_lng(field: &str) -> Option<GpsPoint> {
    let mut parts = field.split([',', '\u{FF0C}']);
    let lat = parts.next()?.trim().parse::<f64>().ok()?;
    let lng = parts.next()?.trim().parse::<f64>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let point = GpsPoint::new(lat, lng);
    point.is_valid().then_some(point)
}

/// Lenient passenger count: leading digits only, anything else counts as zero.
pub fn parse_count(field: &str) -> u32 {
    let trimmed = field.trim();
    let end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().unwrap_or(0)
}

fn parse_station_number(field: &str) -> Option<u32> {
    match parse_count(field) {
        0 => None,
        n => Some(n),
    }
}

fn text_or(field: &str, fallback: &str) -> String {
    if field.trim().is_empty() {
        fallback.to_string()
    } else {
        field.to_string()
    }
}

// ============================================================================
// Row Decoding
// ============================================================================

/// Counts gathered while decoding one export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadReport {
    /// Data rows seen after the header block
    pub total_rows: usize,
    pub accepted: usize,
    pub skipped_coordinates: usize,
    pub skipped_excluded: usize,
}

/// Decode rows that an external CSV reader already split into fields.
///
/// - The first [`HEADER_ROWS`] rows are skipped.
/// - Rows whose coordinate field does not parse are dropped.
/// - Rows whose station number is excluded are dropped.
/// - A missing or zero station number becomes `accepted_so_far + 1`.
/// - Short rows behave as if the missing trailing fields were empty.
///
/// # Example
/// ```
/// use apc_fare_zones::{parse_rows, ExcludedStations};
///
/// let rows = vec![
///     vec!["header"],
///     vec!["header"],
///     vec!["6IP", "ABC1234", "77", "Driver", "Centro", "12", "-30.0788,-51.1167", "01/02/2024 06:01:00", "", "3", "1"],
///     vec!["6IP", "ABC1234", "77", "Driver", "Centro", "13", "not a coordinate", "01/02/2024 06:03:00", "", "2", "0"],
/// ];
///
/// let (events, report) = parse_rows(&rows, &ExcludedStations::default());
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].boarding, 3);
/// assert_eq!(report.skipped_coordinates, 1);
/// ```
pub fn parse_rows<I, R, S>(rows: I, excluded: &ExcludedStations) -> (Vec<StopEvent>, LoadReport)
where
    I: IntoIterator<Item = R>,
    R: AsRef<[S]>,
    S: AsRef<str>,
{
    let mut events = Vec::new();
    let mut report = LoadReport::default();

    for row in rows.into_iter().skip(HEADER_ROWS) {
        let fields = row.as_ref();
        let field = |i: usize| fields.get(i).map(|f| f.as_ref()).unwrap_or("");
        report.total_rows += 1;

        let Some(position) = parse_lat_lng(field(FIELD_COORDS)) else {
            report.skipped_coordinates += 1;
            continue;
        };

        let station_number = parse_station_number(field(FIELD_STATION))
            .unwrap_or(events.len() as u32 + 1);
        if excluded.contains(station_number) {
            debug!("[Load] Dropping excluded station {} at {}", station_number, field(FIELD_TIME1));
            report.skipped_excluded += 1;
            continue;
        }

        let mut doors = [DoorCounts::default(); DOOR_COUNT];
        for (door, counts) in doors.iter_mut().enumerate() {
            let base = FIELD_FIRST_DOOR + door * 2;
            *counts = DoorCounts::new(parse_count(field(base)), parse_count(field(base + 1)));
        }

        events.push(StopEvent {
            line: text_or(field(0), MISSING_TEXT),
            plate: text_or(field(1), MISSING_TEXT),
            bus_id: text_or(field(2), MISSING_TEXT),
            driver: text_or(field(3), MISSING_TEXT),
            direction: text_or(field(4), MISSING_TEXT),
            station_number,
            position,
            timestamp: text_or(field(FIELD_TIME1), MISSING_TEXT),
            secondary_timestamp: text_or(field(FIELD_TIME2), MISSING_TEXT),
            boarding: parse_count(field(FIELD_BOARDING)),
            alighting: parse_count(field(FIELD_ALIGHTING)),
            carried: parse_count(field(FIELD_CARRIED)),
            occupancy_percent: parse_count(field(FIELD_OCCUPANCY)),
            door_exempt_alighting: doors[EXEMPT_DOOR].alighting,
            doors,
        });
    }

    report.accepted = events.len();
    info!(
        "[Load] {} rows: {} accepted, {} without coordinates, {} excluded",
        report.total_rows, report.accepted, report.skipped_coordinates, report.skipped_excluded
    );

    (events, report)
}

// ============================================================================
// Tests
// ============================================================================
