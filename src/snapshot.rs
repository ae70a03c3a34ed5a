//! # Snapshot
//!
//! The result of one load: decoded events, their segmentation and the config
//! that produced them. A snapshot is never mutated; loading new data or
//! changing the config builds a new one. Fare figures are derived on demand
//! from the stored trips, so filtering by trip just re-runs attribution.
//!
//! ## Pipeline
//!
//! ```text
//! rows ─► parse_rows ─► consolidate ─► segment_trips ─► Snapshot
//!                                                        │
//!                        attribute_trip / summaries ◄────┘
//! ```

use log::info;

use crate::config::FareConfig;
use crate::consolidate::consolidate;
use crate::error::ConfigError;
use crate::events::{parse_rows, LoadReport, StopEvent};
use crate::fares::{attribute_all_trips, attribute_trip, FareMetrics, TripFareReport};
use crate::probe::ReferenceProbe;
use crate::summary::{reconcile, station_rankings, summarize_trips, LoadReconciliation, StationRankings, TripsSummary};
use crate::trips::{segment_trips, Segmentation, SegmentationStrategy, Trip};

/// Immutable view over one loaded day of stop events.
#[derive(Debug, Clone)]
pub struct Snapshot {
    config: FareConfig,
    strategy: SegmentationStrategy,
    events: Vec<StopEvent>,
    load_report: LoadReport,
    segmentation: Segmentation,
}

impl Snapshot {
    /// Decode `rows`, merge near-duplicate stops and segment the result.
    ///
    /// The config is not validated here; see [`Snapshot::try_load`].
    pub fn load<I, R, S>(rows: I, config: FareConfig, strategy: SegmentationStrategy) -> Self
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        let (events, load_report) = parse_rows(rows, &config.excluded_stations);
        Self::build(events, load_report, config, strategy)
    }

    /// Like [`Snapshot::load`], but rejects an invalid config first.
    pub fn try_load<I, R, S>(
        rows: I,
        config: FareConfig,
        strategy: SegmentationStrategy,
    ) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<[S]>,
        S: AsRef<str>,
    {
        config.validate()?;
        Ok(Self::load(rows, config, strategy))
    }

    /// Build from events that were decoded elsewhere.
    ///
    /// Events of excluded stations are kept; they still count for nothing in
    /// the fare sums.
    pub fn from_events(events: Vec<StopEvent>, config: FareConfig, strategy: SegmentationStrategy) -> Self {
        let load_report = LoadReport {
            total_rows: events.len(),
            accepted: events.len(),
            ..Default::default()
        };
        Self::build(events, load_report, config, strategy)
    }

    fn build(
        events: Vec<StopEvent>,
        load_report: LoadReport,
        config: FareConfig,
        strategy: SegmentationStrategy,
    ) -> Self {
        let events = if config.consolidation_tolerance_meters > 0.0 {
            let merged = consolidate(&events, &config);
            if merged.len() < events.len() {
                info!(
                    "[Load] Consolidated {} near-duplicate stops ({} -> {})",
                    events.len() - merged.len(),
                    events.len(),
                    merged.len()
                );
            }
            merged
        } else {
            events
        };

        let segmentation = segment_trips(&events, &config, strategy);

        Self {
            config,
            strategy,
            events,
            load_report,
            segmentation,
        }
    }

    /// Re-segment the same events with another strategy.
    pub fn with_strategy(&self, strategy: SegmentationStrategy) -> Self {
        Self {
            config: self.config.clone(),
            strategy,
            events: self.events.clone(),
            load_report: self.load_report,
            segmentation: segment_trips(&self.events, &self.config, strategy),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Events after consolidation; trip indices point into this slice.
    pub fn events(&self) -> &[StopEvent] {
        &self.events
    }

    pub fn segmentation(&self) -> &Segmentation {
        &self.segmentation
    }

    pub fn trips(&self) -> &[Trip] {
        &self.segmentation.trips
    }

    pub fn load_report(&self) -> &LoadReport {
        &self.load_report
    }

    pub fn config(&self) -> &FareConfig {
        &self.config
    }

    pub fn strategy(&self) -> SegmentationStrategy {
        self.strategy
    }

    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.segmentation.trip(id)
    }

    // ------------------------------------------------------------------------
    // Derived figures
    // ------------------------------------------------------------------------

    pub fn trip_report(&self, id: &str) -> Option<TripFareReport> {
        self.trip(id).map(|t| attribute_trip(t, &self.events, &self.config))
    }

    pub fn all_trip_reports(&self) -> Vec<TripFareReport> {
        self.trips()
            .iter()
            .map(|t| attribute_trip(t, &self.events, &self.config))
            .collect()
    }

    /// Fare metrics summed over every trip.
    pub fn all_metrics(&self) -> FareMetrics {
        attribute_all_trips(self.trips(), &self.events, &self.config)
    }

    /// Fare metrics summed over the trips whose ids are listed. Unknown ids are ignored.
    pub fn metrics_for(&self, trip_ids: &[&str]) -> FareMetrics {
        let selected: Vec<Trip> = self
            .trips()
            .iter()
            .filter(|t| trip_ids.contains(&t.id.as_str()))
            .cloned()
            .collect();
        attribute_all_trips(&selected, &self.events, &self.config)
    }

    pub fn summary(&self) -> TripsSummary {
        summarize_trips(self.trips(), &self.events)
    }

    pub fn reconciliation(&self) -> LoadReconciliation {
        reconcile(&self.events, &self.segmentation)
    }

    /// Busiest and idle stops over every trip, `n` per top list.
    pub fn station_rankings(&self, n: usize) -> StationRankings {
        station_rankings(self.trips(), &self.events, &self.config.excluded_stations, n)
    }

    /// Rankings restricted to the named trips; unknown ids are ignored.
    pub fn station_rankings_for(&self, trip_ids: &[&str], n: usize) -> StationRankings {
        let selected: Vec<Trip> = self
            .trips()
            .iter()
            .filter(|t| trip_ids.contains(&t.id.as_str()))
            .cloned()
            .collect();
        station_rankings(&selected, &self.events, &self.config.excluded_stations, n)
    }

    /// Spatial index over the loaded events, for locating reference stops by hand.
    pub fn probe(&self) -> ReferenceProbe {
        ReferenceProbe::new(&self.events)
    }
}

// ============================================================================
// Tests
// ============================================================================
