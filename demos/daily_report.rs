//! Fare report for a synthetic day of one bus.
//!
//! Run with: RUST_LOG=info cargo run --example daily_report [config.json]

use std::error::Error;

use apc_fare_zones::geo_utils::offset_meters;
use apc_fare_zones::{FareCategory, FareConfig, GpsPoint, SegmentationStrategy, Snapshot};

fn row(line: &str, station: u32, at: GpsPoint, time: &str, boarding: u32, alighting: u32, exempt: u32) -> Vec<String> {
    let mut fields = vec![String::new(); 25];
    fields[0] = line.to_string();
    fields[1] = "IXX1A23".to_string();
    fields[2] = "2104".to_string();
    fields[3] = "J. Silva".to_string();
    fields[5] = station.to_string();
    fields[6] = format!("{:.6},{:.6}", at.latitude, at.longitude);
    fields[7] = format!("01/02/2024 {time}");
    fields[9] = boarding.to_string();
    fields[10] = alighting.to_string();
    fields[13] = "0".to_string();
    fields[14] = exempt.to_string();
    fields[15] = boarding.to_string();
    fields[16] = alighting.saturating_sub(exempt).to_string();
    fields
}

/// Outbound in the morning, inbound after lunch, each passing both cut points.
fn synthetic_day(config: &FareConfig) -> Vec<Vec<String>> {
    let refs = &config.reference_points;
    let north = |p: &GpsPoint, m: f64| offset_meters(p, m, 0.0);

    let mut rows = vec![vec!["Relatorio de viagens".to_string()], vec!["Linha;Placa;...".to_string()]];

    // Outbound: terminal, landmark, boundary, beyond
    rows.push(row("6IP", 1, north(&refs.landmark_outbound, -1500.0), "06:02:00", 14, 0, 0));
    rows.push(row("6IP", 12, north(&refs.landmark_outbound, -400.0), "06:11:00", 6, 1, 0));
    rows.push(row("6IP", 42, refs.landmark_outbound, "06:20:00", 4, 3, 1));
    rows.push(row("6IP", 37, north(&refs.boundary_outbound, -600.0), "06:29:00", 3, 4, 0));
    rows.push(row("6IP", 31, north(&refs.boundary_outbound, 12.0), "06:34:00", 2, 5, 1));
    rows.push(row("6IP", 28, north(&refs.boundary_outbound, 800.0), "06:42:00", 3, 9, 2));
    // GPS logged the same stop twice
    rows.push(row("6IP", 28, north(&refs.boundary_outbound, 800.3), "06:42:06", 1, 0, 0));
    rows.push(row("6IP", 20, north(&refs.boundary_outbound, 2500.0), "06:55:00", 0, 12, 1));

    // Inbound: back past the boundary, then the landmark
    rows.push(row("1BCSOR", 20, north(&refs.boundary_inbound, 2500.0), "09:05:00", 11, 0, 0));
    rows.push(row("1BCSOR", 28, north(&refs.boundary_inbound, 800.0), "09:14:00", 5, 2, 1));
    rows.push(row("1BCSOR", 31, refs.boundary_inbound, "09:22:00", 2, 6, 2));
    rows.push(row("1BCSOR", 37, north(&refs.boundary_inbound, -600.0), "09:28:00", 3, 4, 0));
    rows.push(row("1BCSOR", 42, refs.landmark_inbound, "09:36:00", 1, 3, 1));
    rows.push(row("1BCSOR", 1, north(&refs.landmark_inbound, -1500.0), "09:50:00", 0, 7, 0));

    // Row with a broken coordinate, dropped at load
    let mut broken = row("1BCSOR", 2, refs.landmark_inbound, "09:52:00", 1, 0, 0);
    broken[6] = "-30.0947".to_string();
    rows.push(broken);

    rows
}

fn reais(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("R$ {sign}{}.{:02}", abs / 100, abs % 100)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => FareConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => FareConfig::default(),
    };

    let rows = synthetic_day(&config);
    let snapshot = Snapshot::try_load(&rows, config, SegmentationStrategy::TimeWindows)?;
    let table = snapshot.config().fare_table;

    println!("APC Fare Report\n");
    let load = snapshot.load_report();
    println!(
        "Loaded {} rows: {} accepted, {} without coordinates, {} excluded ({} stops after merging)\n",
        load.total_rows,
        load.accepted,
        load.skipped_coordinates,
        load.skipped_excluded,
        snapshot.events().len()
    );

    for report in snapshot.all_trip_reports() {
        let trip = snapshot.trip(&report.trip_id).ok_or("trip vanished from snapshot")?;
        println!("{} [{}]", report.trip_name, report.direction);
        println!(
            "   {} -> {}, {} stops, {} boarded",
            trip.actual_start_time.as_deref().unwrap_or("N/A"),
            trip.actual_end_time.as_deref().unwrap_or("N/A"),
            trip.stop_count(),
            trip.total_boarding
        );
        println!(
            "   Cut points: boundary at {:?}, landmark at {:?}",
            report.cut_points.boundary, report.cut_points.landmark
        );
        for category in FareCategory::ALL {
            println!("   {:<9} {:>4}", category.as_str(), report.metrics.get(category));
        }
        println!("   Revenue   {}", reais(report.metrics.revenue_cents(&table)));
        for issue in &report.issues {
            println!("   ! {}", issue);
        }
        println!();
    }

    let all = snapshot.all_metrics();
    println!("All trips: {} passengers, {}", all.total(), reais(all.revenue_cents(&table)));

    let summary = snapshot.summary();
    println!(
        "Plates: {}; {} stops; {} boarding per stop on average",
        summary.plates.join(", "),
        summary.total_stops,
        summary.average_boarding_per_stop
    );
    if !summary.doors_consistent() {
        println!(
            "Door counters differ from stop totals: boarding {:+}, alighting {:+}",
            summary.door_boarding_difference, summary.door_alighting_difference
        );
    }

    let rec = snapshot.reconciliation();
    println!(
        "Reconciliation: {} of {} stops in trips, boarding difference {}",
        rec.trip_stops,
        rec.dataset_stops,
        rec.boarding_difference()
    );

    let landmark = snapshot.config().reference_points.landmark_inbound;
    if let Some(hit) = snapshot.probe().nearest(&landmark) {
        println!(
            "Closest stop to the inbound landmark: station {} at {:.1}m",
            hit.station_number, hit.distance_m
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reais_keeps_sign_below_one_real() {
        assert_eq!(reais(-50), "R$ -0.50");
        assert_eq!(reais(-1234), "R$ -12.34");
        assert_eq!(reais(0), "R$ 0.00");
        assert_eq!(reais(495), "R$ 4.95");
    }
}
