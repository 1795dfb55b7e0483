//! Route/direction summaries over one loaded table snapshot.
//!
//! Two derivations share one direction-inference engine: the per-direction
//! ordered stop list of a route, and a deduplicated timetable built from one
//! representative trip per direction. Both are pure reads; nothing here
//! mutates the tables or holds state between calls.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::types::{
    DirectionId, DirectionLabel, RouteId, ScheduleTables, StopId, Trip,
};

/// Resolves a travel direction for trips and for individual stop-time rows.
///
/// The explicit `direction_id` column is authoritative when the feed has one
/// anywhere: 0 is Forward, 1 is Backward, anything else is Unknown, and trips
/// left blank in such a feed are Unknown too. Only when no trip in the whole
/// feed carries the column does classification fall back to a positional
/// guess, splitting each route's stop-time rows at the route's median
/// `stop_sequence`. That guess knows nothing about the actual route topology
/// and is approximate by construction; it exists so feeds without the column
/// still get a usable forward/backward split, not because it is ground truth.
pub struct DirectionClassifier<'t> {
    tables: &'t ScheduleTables,
    /// Median `stop_sequence` per route, populated only in positional mode
    route_medians: HashMap<RouteId, f64>,
    positional: bool,
}

impl<'t> DirectionClassifier<'t> {
    pub fn new(tables: &'t ScheduleTables) -> DirectionClassifier<'t> {
        let positional = tables.trips().all(|trip| trip.direction_id.is_none());
        let mut route_medians = HashMap::new();
        if positional {
            let mut sequences_by_route: HashMap<RouteId, Vec<u32>> = HashMap::new();
            for trip in tables.trips() {
                let sequences = sequences_by_route
                    .entry(trip.route_id.clone())
                    .or_insert_with(Vec::new);
                sequences.extend(
                    tables
                        .stop_times_of(&trip.trip_id)
                        .iter()
                        .map(|stop_time| stop_time.stop_sequence),
                );
            }
            for (route_id, mut sequences) in sequences_by_route {
                if let Some(route_median) = median(&mut sequences) {
                    route_medians.insert(route_id, route_median);
                }
            }
        }
        DirectionClassifier {
            tables,
            route_medians,
            positional,
        }
    }

    /// Label for a whole trip, used to group trips into direction buckets
    pub fn classify(&self, trip: &Trip) -> DirectionLabel {
        match trip.direction_id {
            Some(DirectionId::Outbound) => DirectionLabel::Forward,
            Some(DirectionId::Inbound) => DirectionLabel::Backward,
            Some(DirectionId::Other) => DirectionLabel::Unknown,
            None if self.positional => self.classify_trip_by_position(trip),
            None => DirectionLabel::Unknown,
        }
    }

    /// Label for a single stop-time row of the trip. With an explicit
    /// direction this agrees with `classify`; in positional mode rows of one
    /// trip may split across Forward and Backward.
    pub fn classify_row(&self, trip: &Trip, stop_sequence: u32) -> DirectionLabel {
        match trip.direction_id {
            Some(DirectionId::Outbound) => DirectionLabel::Forward,
            Some(DirectionId::Inbound) => DirectionLabel::Backward,
            Some(DirectionId::Other) => DirectionLabel::Unknown,
            None if self.positional => {
                self.split_at_route_median(&trip.route_id, f64::from(stop_sequence))
            }
            None => DirectionLabel::Unknown,
        }
    }

    fn classify_trip_by_position(&self, trip: &Trip) -> DirectionLabel {
        let mut sequences: Vec<u32> = self
            .tables
            .stop_times_of(&trip.trip_id)
            .iter()
            .map(|stop_time| stop_time.stop_sequence)
            .collect();
        match median(&mut sequences) {
            Some(trip_median) => self.split_at_route_median(&trip.route_id, trip_median),
            None => DirectionLabel::Unknown,
        }
    }

    fn split_at_route_median(&self, route_id: &RouteId, position: f64) -> DirectionLabel {
        match self.route_medians.get(route_id) {
            Some(&route_median) if position <= route_median => DirectionLabel::Forward,
            Some(_) => DirectionLabel::Backward,
            None => DirectionLabel::Unknown,
        }
    }
}

/// Median with the even-count mean convention, `None` for no values
fn median(values: &mut Vec<u32>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(f64::from(values[mid]))
    } else {
        Some((f64::from(values[mid - 1]) + f64::from(values[mid])) / 2.0)
    }
}

/// One distinct stop a route serves in one direction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStop {
    pub direction: DirectionLabel,
    pub stop_id: StopId,
    pub stop_name: String,
    pub location: Option<geo::Point<f64>>,
    /// Earliest `stop_sequence` any trip of the route reaches this stop at,
    /// in this direction; the canonical position used for ordering
    pub first_sequence: u32,
}

/// The distinct stops the route serves, one row per `(stop, direction)`,
/// ordered by direction rank and then by earliest sequence position.
///
/// Many trips contribute rows for the same stop at possibly different
/// sequence numbers; the minimum observed is kept. An unknown route is a
/// route with no observed stops and yields an empty list. Stops referenced
/// by stop_times but missing from the stops table are dropped.
pub fn resolve_stops(tables: &ScheduleTables, route_id: &RouteId) -> Vec<RouteStop> {
    let classifier = DirectionClassifier::new(tables);

    let mut earliest: HashMap<(DirectionLabel, StopId), u32> = HashMap::new();
    for trip in tables.trips_of_route(route_id) {
        for stop_time in tables.stop_times_of(&trip.trip_id) {
            let direction = classifier.classify_row(trip, stop_time.stop_sequence);
            let sequence = earliest
                .entry((direction, stop_time.stop_id.clone()))
                .or_insert(stop_time.stop_sequence);
            if stop_time.stop_sequence < *sequence {
                *sequence = stop_time.stop_sequence;
            }
        }
    }

    let mut rows: Vec<RouteStop> = earliest
        .into_iter()
        .filter_map(|((direction, stop_id), first_sequence)| {
            let stop = tables.get_stop(&stop_id)?;
            Some(RouteStop {
                direction,
                stop_name: stop.stop_name.clone(),
                location: stop.location,
                stop_id,
                first_sequence,
            })
        })
        .collect();
    // stop_id settles ties between stops first seen at the same sequence,
    // keeping repeated calls byte-identical
    rows.sort_by(|a, b| {
        (a.direction, a.first_sequence, &a.stop_id).cmp(&(b.direction, b.first_sequence, &b.stop_id))
    });
    rows
}

/// One scheduled stop call of the representative trip of a direction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimetableEntry {
    pub direction: DirectionLabel,
    pub stop_name: String,
    pub arrival_time: String,
    pub departure_time: String,
    pub stop_sequence: u32,
}

/// A deduplicated timetable for the route: within each direction group
/// exactly one representative trip is shown, the one with the smallest trip
/// id, and its stop calls are listed in visitation order.
///
/// A route usually runs many near-identical trips that differ only in
/// departure time; listing them all would repeat the same stop sequence
/// dozens of times. The smallest-id rule makes the choice deterministic, so
/// every caller agrees on "the" sample trip for a direction. A route with no
/// trips yields an empty list.
pub fn sample_timetable(tables: &ScheduleTables, route_id: &RouteId) -> Vec<TimetableEntry> {
    let classifier = DirectionClassifier::new(tables);

    let mut representatives: BTreeMap<DirectionLabel, &Trip> = BTreeMap::new();
    for trip in tables.trips_of_route(route_id) {
        match representatives.entry(classifier.classify(trip)) {
            Entry::Vacant(vacant) => {
                vacant.insert(trip);
            }
            Entry::Occupied(mut occupied) => {
                if trip.trip_id < occupied.get().trip_id {
                    occupied.insert(trip);
                }
            }
        }
    }

    let mut rows = Vec::new();
    for (direction, trip) in representatives {
        for stop_time in tables.stop_times_of(&trip.trip_id) {
            if let Some(stop) = tables.get_stop(&stop_time.stop_id) {
                rows.push(TimetableEntry {
                    direction,
                    stop_name: stop.stop_name.clone(),
                    arrival_time: stop_time.arrival_time.clone(),
                    departure_time: stop_time.departure_time.clone(),
                    stop_sequence: stop_time.stop_sequence,
                });
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Route, ScheduleTables, Stop, StopTime, TripId};

    fn route(id: &str) -> Route {
        Route {
            route_id: RouteId::new(id),
            route_short_name: id.to_string(),
            route_long_name: None,
            route_desc: None,
        }
    }

    fn stop(id: &str) -> Stop {
        Stop {
            stop_id: StopId::new(id),
            stop_name: format!("{} St", id),
            location: Some(geo::Point::new(30.2, 71.5)),
        }
    }

    fn trip(id: &str, route_id: &str, direction_id: Option<DirectionId>) -> Trip {
        Trip {
            trip_id: TripId::new(id),
            route_id: RouteId::new(route_id),
            direction_id,
        }
    }

    fn stop_time(trip: &str, stop: &str, sequence: u32) -> StopTime {
        StopTime {
            trip_id: TripId::new(trip),
            stop_id: StopId::new(stop),
            stop_sequence: sequence,
            arrival_time: format!("08:{:02}:00", sequence),
            departure_time: format!("08:{:02}:30", sequence),
        }
    }

    /// Route R1: T1 runs A -> B -> C outbound, T2 runs C -> B -> A inbound
    fn out_and_back_tables() -> ScheduleTables {
        let mut builder = ScheduleTables::builder();
        builder
            .add_route(route("R1"))
            .add_stop(stop("A"))
            .add_stop(stop("B"))
            .add_stop(stop("C"))
            .add_trip(trip("T1", "R1", Some(DirectionId::Outbound)))
            .add_trip(trip("T2", "R1", Some(DirectionId::Inbound)))
            .add_stop_time(stop_time("T1", "A", 1))
            .add_stop_time(stop_time("T1", "B", 2))
            .add_stop_time(stop_time("T1", "C", 3))
            .add_stop_time(stop_time("T2", "C", 1))
            .add_stop_time(stop_time("T2", "B", 2))
            .add_stop_time(stop_time("T2", "A", 3));
        builder.build()
    }

    #[test]
    fn resolves_stops_per_direction() {
        let tables = out_and_back_tables();
        let rows = resolve_stops(&tables, &RouteId::new("R1"));

        let summary: Vec<(DirectionLabel, &str, u32)> = rows
            .iter()
            .map(|row| (row.direction, row.stop_id.as_str(), row.first_sequence))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DirectionLabel::Forward, "A", 1),
                (DirectionLabel::Forward, "B", 2),
                (DirectionLabel::Forward, "C", 3),
                (DirectionLabel::Backward, "C", 1),
                (DirectionLabel::Backward, "B", 2),
                (DirectionLabel::Backward, "A", 3),
            ]
        );
    }

    #[test]
    fn no_duplicate_stop_direction_pairs() {
        let mut builder = ScheduleTables::builder();
        builder
            .add_route(route("R1"))
            .add_stop(stop("A"))
            .add_stop(stop("B"))
            .add_trip(trip("T1", "R1", Some(DirectionId::Outbound)))
            .add_trip(trip("T2", "R1", Some(DirectionId::Outbound)))
            // T2 reaches A later than T1 does
            .add_stop_time(stop_time("T1", "A", 1))
            .add_stop_time(stop_time("T1", "B", 2))
            .add_stop_time(stop_time("T2", "B", 1))
            .add_stop_time(stop_time("T2", "A", 5));
        let tables = builder.build();

        let rows = resolve_stops(&tables, &RouteId::new("R1"));
        let mut pairs: Vec<_> = rows
            .iter()
            .map(|row| (row.direction, row.stop_id.clone()))
            .collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), rows.len());

        // minimum observed sequence is kept for each stop
        assert_eq!(rows[0].stop_id.as_str(), "A");
        assert_eq!(rows[0].first_sequence, 1);
        assert_eq!(rows[1].stop_id.as_str(), "B");
        assert_eq!(rows[1].first_sequence, 1);
    }

    #[test]
    fn output_is_sorted_by_direction_rank_then_sequence() {
        let tables = out_and_back_tables();
        let rows = resolve_stops(&tables, &RouteId::new("R1"));
        assert!(rows
            .windows(2)
            .all(|pair| (pair[0].direction, pair[0].first_sequence)
                <= (pair[1].direction, pair[1].first_sequence)));
    }

    #[test]
    fn unknown_route_is_empty_not_an_error() {
        let tables = out_and_back_tables();
        assert!(resolve_stops(&tables, &RouteId::new("R9")).is_empty());
        assert!(sample_timetable(&tables, &RouteId::new("R9")).is_empty());
    }

    #[test]
    fn missing_coordinates_pass_through() {
        let mut builder = ScheduleTables::builder();
        let mut unplaced = stop("A");
        unplaced.location = None;
        builder
            .add_route(route("R1"))
            .add_stop(unplaced)
            .add_trip(trip("T1", "R1", Some(DirectionId::Outbound)))
            .add_stop_time(stop_time("T1", "A", 1));
        let tables = builder.build();

        let rows = resolve_stops(&tables, &RouteId::new("R1"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location, None);
    }

    #[test]
    fn samples_one_trip_per_direction() {
        let tables = out_and_back_tables();
        let rows = sample_timetable(&tables, &RouteId::new("R1"));

        let summary: Vec<(DirectionLabel, &str, u32)> = rows
            .iter()
            .map(|row| (row.direction, row.stop_name.as_str(), row.stop_sequence))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DirectionLabel::Forward, "A St", 1),
                (DirectionLabel::Forward, "B St", 2),
                (DirectionLabel::Forward, "C St", 3),
                (DirectionLabel::Backward, "C St", 1),
                (DirectionLabel::Backward, "B St", 2),
                (DirectionLabel::Backward, "A St", 3),
            ]
        );
    }

    #[test]
    fn representative_is_the_lexicographically_smallest_trip_id() {
        let mut builder = ScheduleTables::builder();
        builder
            .add_route(route("R1"))
            .add_stop(stop("A"))
            .add_trip(trip("T2", "R1", Some(DirectionId::Outbound)))
            .add_trip(trip("T10", "R1", Some(DirectionId::Outbound)))
            .add_stop_time(stop_time("T2", "A", 1))
            .add_stop_time(stop_time("T10", "A", 7));
        let tables = builder.build();

        // text ordering, as MIN(trip_id) over a text column would give
        let rows = sample_timetable(&tables, &RouteId::new("R1"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].stop_sequence, 7);
    }

    #[test]
    fn repeated_calls_agree() {
        let tables = out_and_back_tables();
        let route_id = RouteId::new("R1");
        assert_eq!(
            resolve_stops(&tables, &route_id),
            resolve_stops(&tables, &route_id)
        );
        assert_eq!(
            sample_timetable(&tables, &route_id),
            sample_timetable(&tables, &route_id)
        );
    }

    #[test]
    fn explicit_direction_is_total() {
        let tables = out_and_back_tables();
        let classifier = DirectionClassifier::new(&tables);
        assert_eq!(
            classifier.classify(&trip("T1", "R1", Some(DirectionId::Outbound))),
            DirectionLabel::Forward
        );
        assert_eq!(
            classifier.classify(&trip("T1", "R1", Some(DirectionId::Inbound))),
            DirectionLabel::Backward
        );
        assert_eq!(
            classifier.classify(&trip("T1", "R1", Some(DirectionId::Other))),
            DirectionLabel::Unknown
        );
        // blank direction does not fall back while the feed has the column
        assert_eq!(
            classifier.classify(&trip("T1", "R1", None)),
            DirectionLabel::Unknown
        );
    }

    /// Route without a direction_id column anywhere: a single out-and-back
    /// loop trip A B C C B A splits at the route median of 3.5
    fn positional_tables() -> ScheduleTables {
        let mut builder = ScheduleTables::builder();
        builder
            .add_route(route("R1"))
            .add_stop(stop("A"))
            .add_stop(stop("B"))
            .add_stop(stop("C"))
            .add_trip(trip("T1", "R1", None))
            .add_stop_time(stop_time("T1", "A", 1))
            .add_stop_time(stop_time("T1", "B", 2))
            .add_stop_time(stop_time("T1", "C", 3))
            .add_stop_time(stop_time("T1", "C", 4))
            .add_stop_time(stop_time("T1", "B", 5))
            .add_stop_time(stop_time("T1", "A", 6));
        builder.build()
    }

    #[test]
    fn positional_fallback_splits_rows_at_the_route_median() {
        let tables = positional_tables();
        let rows = resolve_stops(&tables, &RouteId::new("R1"));

        let summary: Vec<(DirectionLabel, &str, u32)> = rows
            .iter()
            .map(|row| (row.direction, row.stop_id.as_str(), row.first_sequence))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DirectionLabel::Forward, "A", 1),
                (DirectionLabel::Forward, "B", 2),
                (DirectionLabel::Forward, "C", 3),
                (DirectionLabel::Backward, "C", 4),
                (DirectionLabel::Backward, "B", 5),
                (DirectionLabel::Backward, "A", 6),
            ]
        );
    }

    #[test]
    fn positional_fallback_groups_whole_trips_for_sampling() {
        let mut builder = ScheduleTables::builder();
        builder
            .add_route(route("R1"))
            .add_stop(stop("A"))
            .add_stop(stop("B"))
            .add_stop(stop("C"))
            .add_stop(stop("D"))
            .add_trip(trip("T1", "R1", None))
            .add_trip(trip("T2", "R1", None))
            .add_stop_time(stop_time("T1", "A", 1))
            .add_stop_time(stop_time("T1", "B", 2))
            .add_stop_time(stop_time("T2", "C", 3))
            .add_stop_time(stop_time("T2", "D", 4));
        let tables = builder.build();

        // route median is 2.5: T1's own rows sit below it, T2's above
        let classifier = DirectionClassifier::new(&tables);
        assert_eq!(
            classifier.classify(&trip("T1", "R1", None)),
            DirectionLabel::Forward
        );
        assert_eq!(
            classifier.classify(&trip("T2", "R1", None)),
            DirectionLabel::Backward
        );

        let rows = sample_timetable(&tables, &RouteId::new("R1"));
        let summary: Vec<(DirectionLabel, u32)> = rows
            .iter()
            .map(|row| (row.direction, row.stop_sequence))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DirectionLabel::Forward, 1),
                (DirectionLabel::Forward, 2),
                (DirectionLabel::Backward, 3),
                (DirectionLabel::Backward, 4),
            ]
        );
    }

    #[test]
    fn positional_fallback_never_panics_and_stays_in_range() {
        let tables = positional_tables();
        let classifier = DirectionClassifier::new(&tables);
        for sequence in 0..10 {
            let label = classifier.classify_row(&trip("T1", "R1", None), sequence);
            assert!(
                label == DirectionLabel::Forward
                    || label == DirectionLabel::Backward
                    || label == DirectionLabel::Unknown
            );
        }
        // a trip with no rows at all cannot be placed
        assert_eq!(
            classifier.classify(&trip("T9", "R1", None)),
            DirectionLabel::Unknown
        );
    }

    #[test]
    fn empty_tables_classify_as_unknown() {
        let tables = ScheduleTables::builder().build();
        let classifier = DirectionClassifier::new(&tables);
        assert_eq!(
            classifier.classify(&trip("T1", "R1", None)),
            DirectionLabel::Unknown
        );
    }
}
