//! Prints one route's per-direction stop list and its sampled timetable,
//! the same derivations the webserver serves as JSON.

use std::error::Error;
use std::path::Path;
use std::process;

use route_board::gtfs::db::GTFSSource;
use route_summary::summary::{resolve_stops, sample_timetable};
use route_summary::types::RouteId;

fn run(route_id: &str, json: bool) -> Result<(), Box<dyn Error>> {
    let gtfs_dir = std::env::var("GTFS_DIR").unwrap_or_else(|_| "gtfs".to_owned());
    let source = GTFSSource::new(Path::new(&gtfs_dir));
    let (tables, _stats) = source.load_tables()?;

    let route_id = RouteId::new(route_id);
    let stops = resolve_stops(&tables, &route_id);
    let timetable = sample_timetable(&tables, &route_id);

    if json {
        println!("{}", serde_json::to_string_pretty(&stops)?);
        println!("{}", serde_json::to_string_pretty(&timetable)?);
        return Ok(());
    }

    match tables.get_route(&route_id) {
        Some(route) => println!(
            "Route {} {}",
            route.route_short_name,
            route.route_long_name.as_deref().unwrap_or("")
        ),
        None => println!("Route {} is not in routes.txt", route_id),
    }

    println!();
    println!("Stops");
    for row in stops {
        let direction = row.direction.to_string();
        println!("{:>4}  {:<12}  {}", row.first_sequence, direction, row.stop_name);
    }

    println!();
    println!("Sample timetable");
    for row in timetable {
        let direction = row.direction.to_string();
        println!(
            "{:>4}  {:<12}  {:>8} {:>8}  {}",
            row.stop_sequence, direction, row.arrival_time, row.departure_time, row.stop_name
        );
    }
    Ok(())
}

fn main() {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let json = if let Some(position) = args.iter().position(|arg| arg == "--json") {
        args.remove(position);
        true
    } else {
        false
    };
    let route_id = match args.first() {
        Some(route_id) => route_id.clone(),
        None => {
            eprintln!("usage: route_info [--json] <route_id>   (feed dir from GTFS_DIR, default ./gtfs)");
            process::exit(2);
        }
    };
    if let Err(error) = run(&route_id, json) {
        eprintln!("{}", error);
        process::exit(1);
    }
}
