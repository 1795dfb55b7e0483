//! Loads the four flat tables out of a GTFS directory into one
//! `ScheduleTables` snapshot. A refresh is a whole new snapshot; nothing
//! here ever mutates a snapshot a reader may hold.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use route_summary::types::{Builder, ScheduleTables};

use crate::gtfs::{RouteRecord, StopRecord, StopTimeRecord, TripRecord};

#[derive(Debug)]
pub enum LoadError {
    /// A required file is not in the feed directory
    MissingFile(PathBuf),
    Csv(csv::Error),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::MissingFile(path) => write!(f, "missing GTFS file {}", path.display()),
            LoadError::Csv(error) => write!(f, "failed reading GTFS file: {}", error),
        }
    }
}

impl std::error::Error for LoadError {}

impl From<csv::Error> for LoadError {
    fn from(error: csv::Error) -> LoadError {
        LoadError::Csv(error)
    }
}

/// Rows dropped during a load. A row missing its key fields (or otherwise
/// undeserializable) is skipped and counted, it never aborts the load.
#[derive(Debug, Default)]
pub struct LoadStats {
    pub skipped_routes: usize,
    pub skipped_stops: usize,
    pub skipped_trips: usize,
    pub skipped_stop_times: usize,
}

impl LoadStats {
    pub fn skipped_total(&self) -> usize {
        self.skipped_routes + self.skipped_stops + self.skipped_trips + self.skipped_stop_times
    }
}

pub struct GTFSSource {
    dir_path: PathBuf,
}

impl GTFSSource {
    pub fn new(dir_path: &Path) -> GTFSSource {
        GTFSSource {
            dir_path: dir_path.to_owned(),
        }
    }

    fn open_csv(&self, filename: &str) -> Result<csv::Reader<File>, LoadError> {
        let path = self.dir_path.join(filename);
        if !path.is_file() {
            return Err(LoadError::MissingFile(path));
        }
        eprintln!("Opening {}", path.display());
        Ok(csv::Reader::from_path(path)?)
    }

    /// Reads routes.txt, stops.txt, trips.txt and stop_times.txt into one
    /// immutable snapshot, reporting how many rows had to be dropped
    pub fn load_tables(&self) -> Result<(ScheduleTables, LoadStats), LoadError> {
        let mut builder = ScheduleTables::builder();
        let mut stats = LoadStats::default();
        stats.skipped_routes = read_routes(&mut self.open_csv("routes.txt")?, &mut builder)?;
        stats.skipped_stops = read_stops(&mut self.open_csv("stops.txt")?, &mut builder)?;
        stats.skipped_trips = read_trips(&mut self.open_csv("trips.txt")?, &mut builder)?;
        stats.skipped_stop_times =
            read_stop_times(&mut self.open_csv("stop_times.txt")?, &mut builder)?;

        let tables = builder.build();
        eprintln!(
            "Loaded {} routes, {} stops, {} trips, {} stop time rows",
            tables.route_count(),
            tables.stop_count(),
            tables.trip_count(),
            tables.stop_time_count()
        );
        if stats.skipped_total() > 0 {
            eprintln!(
                "Skipped {} malformed rows ({} routes, {} stops, {} trips, {} stop times)",
                stats.skipped_total(),
                stats.skipped_routes,
                stats.skipped_stops,
                stats.skipped_trips,
                stats.skipped_stop_times
            );
        }
        Ok((tables, stats))
    }
}

// Per-row deserialize failures are counted and skipped; an I/O failure of
// the underlying reader still fails the whole load.
fn skip_or_fail(error: csv::Error, skipped: &mut usize) -> Result<(), LoadError> {
    if error.is_io_error() {
        return Err(LoadError::Csv(error));
    }
    *skipped += 1;
    Ok(())
}

fn read_routes<R: io::Read>(
    rdr: &mut csv::Reader<R>,
    builder: &mut Builder,
) -> Result<usize, LoadError> {
    let mut skipped = 0;
    for result in rdr.deserialize::<RouteRecord>() {
        match result {
            Ok(record) => {
                if record.route_id.as_str().is_empty() {
                    skipped += 1;
                    continue;
                }
                builder.add_route(record.into());
            }
            Err(error) => skip_or_fail(error, &mut skipped)?,
        }
    }
    Ok(skipped)
}

fn read_stops<R: io::Read>(
    rdr: &mut csv::Reader<R>,
    builder: &mut Builder,
) -> Result<usize, LoadError> {
    let mut skipped = 0;
    for result in rdr.deserialize::<StopRecord>() {
        match result {
            Ok(record) => {
                if record.stop_id.as_str().is_empty() {
                    skipped += 1;
                    continue;
                }
                builder.add_stop(record.into());
            }
            Err(error) => skip_or_fail(error, &mut skipped)?,
        }
    }
    Ok(skipped)
}

fn read_trips<R: io::Read>(
    rdr: &mut csv::Reader<R>,
    builder: &mut Builder,
) -> Result<usize, LoadError> {
    let mut skipped = 0;
    for result in rdr.deserialize::<TripRecord>() {
        match result {
            Ok(record) => {
                if record.trip_id.as_str().is_empty() || record.route_id.as_str().is_empty() {
                    skipped += 1;
                    continue;
                }
                builder.add_trip(record.into());
            }
            Err(error) => skip_or_fail(error, &mut skipped)?,
        }
    }
    Ok(skipped)
}

fn read_stop_times<R: io::Read>(
    rdr: &mut csv::Reader<R>,
    builder: &mut Builder,
) -> Result<usize, LoadError> {
    let mut skipped = 0;
    for result in rdr.deserialize::<StopTimeRecord>() {
        match result {
            Ok(record) => {
                if record.trip_id.as_str().is_empty() || record.stop_id.as_str().is_empty() {
                    skipped += 1;
                    continue;
                }
                builder.add_stop_time(record.into());
            }
            Err(error) => skip_or_fail(error, &mut skipped)?,
        }
    }
    Ok(skipped)
}
