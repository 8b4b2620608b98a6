/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use hermes_sim::{
    ScheduleCatalog, SimMode, SimulationClock, VehicleRegistry,
    geo::PlanarPoint,
    gtfs::{GtfsRoute, GtfsTrip},
    registry::OFF_MAP,
    snapshot::ArrivalComparison,
    trip::{TripProgress, TripProgressEngine, locate_on_path},
};

const EPS: f64 = 1e-9;

fn route (id: &str, name: &str)->GtfsRoute {
    GtfsRoute { route_id: id.to_string(), route_short_name: name.to_string(), route_long_name: String::new(), route_type: 3 }
}

fn trip (id: &str, route_id: &str)->GtfsTrip {
    GtfsTrip { route_id: route_id.to_string(), trip_id: id.to_string(), trip_headsign: String::new(), shape_id: None, direction_id: None }
}

fn l_path ()->Vec<PlanarPoint> {
    vec![ PlanarPoint::new(0.0,0.0), PlanarPoint::new(10.0,0.0), PlanarPoint::new(10.0,10.0) ]
}

/// one route "66" with trip T1 along the L shaped path
fn catalog (mode: SimMode, start: Option<f64>, end: Option<f64>)->ScheduleCatalog {
    let mut builder = ScheduleCatalog::builder( mode, Vec::new());
    builder.add_route( &route("R1", "66"));
    builder.add_planar_trip( &trip("T1", "R1"), &l_path(), start, end);
    builder.build()
}

/// arc length of a point on the L shaped path
fn arc_length (p: &PlanarPoint)->Option<f64> {
    if p.y.abs() < EPS && p.x >= -EPS && p.x <= 10.0 + EPS {
        Some(p.x)
    } else if (p.x - 10.0).abs() < EPS && p.y >= -EPS && p.y <= 10.0 + EPS {
        Some(10.0 + p.y)
    } else {
        None
    }
}

#[test]
fn test_history_midpoint() {
    let catalog = catalog( SimMode::History, Some(100.0), Some(200.0));
    let t1 = catalog.trip("T1").unwrap();
    assert_eq!( t1.path_length, 20.0);

    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);
    let (progress, arrival) = engine.tick_trip( 0, t1, 150.0);
    println!("t=150: {progress:?}");

    match progress {
        TripProgress::Active{vp, shape_index} => {
            assert!( (vp.pos.x - 10.0).abs() < EPS && vp.pos.y.abs() < EPS);
            assert!( (vp.heading - 180.0).abs() < EPS);
            assert_eq!( shape_index, 1);
        }
        other => panic!("expected active trip, got {other:?}")
    }
    assert!( arrival.is_none());
}

#[test]
fn test_history_positions_on_path() {
    let catalog = catalog( SimMode::History, Some(100.0), Some(200.0));
    let t1 = catalog.trip("T1").unwrap();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);

    for i in 0..=40 {
        let t = 100.0 + i as f64 * 2.5;
        if let (TripProgress::Active{vp,..}, _) = engine.tick_trip( 0, t1, t) {
            let expected = (t - 100.0) / 100.0 * 20.0;
            let dist = arc_length( &vp.pos).expect("position not on path");
            assert!( (dist - expected).abs() < 1e-6, "t={t}: {dist} != {expected}");
            assert!( vp.heading >= 0.0 && vp.heading < 360.0);
        } else {
            panic!("trip not active at t={t}");
        }
    }
}

#[test]
fn test_history_outside_window() {
    let catalog = catalog( SimMode::History, Some(100.0), Some(200.0));
    let t1 = catalog.trip("T1").unwrap();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);

    let (progress, arrival) = engine.tick_trip( 0, t1, 50.0);
    assert_eq!( progress, TripProgress::Inactive);
    assert!( arrival.is_none());

    let (progress, _) = engine.tick_trip( 0, t1, 150.0);
    assert!( progress.is_active());

    let (progress, arrival) = engine.tick_trip( 0, t1, 250.0);
    println!("t=250: {progress:?}, {arrival:?}");
    assert_eq!( progress, TripProgress::Inactive);
    assert_eq!( arrival, Some( ArrivalComparison::new( "66", 250.0, 200.0)));

    let (_, arrival) = engine.tick_trip( 0, t1, 260.0);
    assert!( arrival.is_none()); // only recorded once
    assert!( engine.state(0).unwrap().ended);
}

#[test]
fn test_start_after_window() {
    let catalog = catalog( SimMode::History, Some(100.0), Some(200.0));
    let registry = VehicleRegistry::new();
    let mut arrivals = Vec::new();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);

    // the simulation starts at 07:30, long after T1 finished
    let clock = SimulationClock::new( 27000.0, 1.0);
    let stats = engine.tick( &clock, &catalog, &registry, &mut arrivals);
    println!("{stats:?} {arrivals:?}");
    assert_eq!( stats.inactive, 1);
    assert_eq!( stats.ended, 0);
    assert!( arrivals.is_empty());
    assert!( registry.is_empty());
    assert!( engine.state(0).unwrap().ended);

    engine.tick( &clock, &catalog, &registry, &mut arrivals);
    assert!( arrivals.is_empty());
}

#[test]
fn test_window_skipped_between_ticks() {
    let catalog = catalog( SimMode::History, Some(100.0), Some(200.0));
    let t1 = catalog.trip("T1").unwrap();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);

    let (_, arrival) = engine.tick_trip( 0, t1, 50.0);
    assert!( arrival.is_none());
    let (progress, arrival) = engine.tick_trip( 0, t1, 300.0); // never observed on its path
    assert_eq!( progress, TripProgress::Inactive);
    assert!( arrival.is_none());
}

#[test]
fn test_history_registry_reconciliation() {
    let catalog = catalog( SimMode::History, Some(100.0), Some(200.0));
    let registry = VehicleRegistry::new();
    let mut arrivals = Vec::new();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);

    let mut clock = SimulationClock::new( 50.0, 1.0);
    engine.tick( &clock, &catalog, &registry, &mut arrivals);
    assert!( registry.is_empty()); // no vehicle before the trip started

    clock.set_time( 150.0);
    let stats = engine.tick( &clock, &catalog, &registry, &mut arrivals);
    assert_eq!( stats.active, 1);
    let v = registry.get("T1").unwrap();
    println!("{v}");
    assert!( !v.hidden);
    assert_eq!( v.route_name.as_str(), "66");

    clock.set_time( 250.0);
    engine.tick( &clock, &catalog, &registry, &mut arrivals);
    let v = registry.get("T1").unwrap();
    println!("{v}");
    assert!( v.hidden);
    assert_eq!( v.position, *OFF_MAP);
    assert_eq!( registry.len(), 1);
    assert_eq!( arrivals.len(), 1);
    assert_eq!( arrivals[0].expected_time, 200.0);

    engine.tick( &clock, &catalog, &registry, &mut arrivals);
    assert_eq!( registry.len(), 1);
    assert_eq!( arrivals.len(), 1);
}

#[test]
fn test_day_rollover() {
    let catalog = catalog( SimMode::History, Some(100.0), Some(200.0));
    let registry = VehicleRegistry::new();
    let mut arrivals = Vec::new();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);

    let mut clock = SimulationClock::new( 150.0, 1.0);
    engine.tick( &clock, &catalog, &registry, &mut arrivals);
    clock.advance( 100.0);
    engine.tick( &clock, &catalog, &registry, &mut arrivals);
    assert_eq!( arrivals.len(), 1);

    clock.advance( 86300.0); // 150 on the next day
    assert_eq!( clock.day(), 1);
    let stats = engine.tick( &clock, &catalog, &registry, &mut arrivals);
    assert_eq!( stats.active, 1);
    assert!( !engine.state(0).unwrap().ended);

    clock.advance( 100.0);
    engine.tick( &clock, &catalog, &registry, &mut arrivals);
    assert_eq!( arrivals.len(), 2); // trip ended again on the next day
}

#[test]
fn test_service_day_past_midnight() {
    // 25:10:00 .. 25:20:00 is 01:10:00 .. 01:20:00 of the simulated day
    let next_day = catalog( SimMode::History, Some(90600.0), Some(91200.0));
    let t1 = next_day.trip("T1").unwrap();
    assert_eq!( t1.schedule_window(), Some((4200.0, 4800.0)));

    let registry = VehicleRegistry::new();
    let mut arrivals = Vec::new();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &next_day);
    let clock = SimulationClock::new( 4500.0, 1.0);
    let stats = engine.tick( &clock, &next_day, &registry, &mut arrivals);
    assert_eq!( stats.active, 1);
    assert!( registry.get("T1").unwrap().is_visible());

    // trips crossing midnight keep their window
    let overnight = catalog( SimMode::History, Some(86000.0), Some(87000.0));
    assert_eq!( overnight.trip("T1").unwrap().schedule_window(), Some((86000.0, 87000.0)));
}

#[test]
fn test_invalid_window() {
    let catalog = catalog( SimMode::History, Some(200.0), Some(100.0));
    let t1 = catalog.trip("T1").unwrap();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);

    for t in [50.0, 150.0, 250.0] {
        let (progress, arrival) = engine.tick_trip( 0, t1, t);
        assert_eq!( progress, TripProgress::Inactive);
        assert!( arrival.is_none());
    }
}

#[test]
fn test_simulated_progress() {
    let catalog = catalog( SimMode::Simulated, Some(0.0), Some(1000.0));
    let t1 = catalog.trip("T1").unwrap();
    let mut engine = TripProgressEngine::new( SimMode::Simulated, 5.0, &catalog);

    let (progress, _) = engine.tick_trip( 0, t1, 1.0);
    assert!( progress.is_active());
    assert_eq!( engine.state(0).unwrap().prev_dist, 5.0);

    let (progress, _) = engine.tick_trip( 0, t1, 3.0);
    assert_eq!( engine.state(0).unwrap().prev_dist, 15.0);
    if let TripProgress::Active{vp,..} = progress {
        println!("t=3: {}", vp.pos);
        assert!( (vp.pos.x - 10.0).abs() < EPS && (vp.pos.y - 5.0).abs() < EPS);
    } else {
        panic!("trip should be active at t=3");
    }

    // path is exhausted at 20 map units
    let (progress, arrival) = engine.tick_trip( 0, t1, 5.0);
    println!("t=5: {progress:?} {arrival:?}");
    assert_eq!( progress, TripProgress::Inactive);
    assert_eq!( arrival, Some( ArrivalComparison::new( "66", 5.0, 1000.0)));

    let (progress, arrival) = engine.tick_trip( 0, t1, 6.0);
    assert_eq!( progress, TripProgress::Inactive);
    assert!( arrival.is_none());
}

#[test]
fn test_simulated_not_started() {
    let catalog = catalog( SimMode::Simulated, Some(100.0), Some(1000.0));
    let t1 = catalog.trip("T1").unwrap();
    let mut engine = TripProgressEngine::new( SimMode::Simulated, 5.0, &catalog);

    let (progress, _) = engine.tick_trip( 0, t1, 50.0);
    assert_eq!( progress, TripProgress::Inactive);
    assert_eq!( engine.state(0).unwrap().prev_dist, 0.0);

    engine.tick_trip( 0, t1, 102.0); // distance counts from the start time
    assert_eq!( engine.state(0).unwrap().prev_dist, 10.0);
}

#[test]
fn test_malformed_trip() {
    let mut builder = ScheduleCatalog::builder( SimMode::History, Vec::new());
    builder.add_route( &route("R1", "66"));
    builder.add_planar_trip( &trip("T1", "R1"), &[PlanarPoint::new(1.0,1.0)], Some(0.0), Some(100.0));
    builder.add_planar_trip( &trip("T2", "R1"), &[PlanarPoint::new(1.0,1.0), PlanarPoint::new(1.0,1.0)], Some(0.0), Some(100.0));
    let catalog = builder.build();
    assert_eq!( catalog.malformed_trips().count(), 2);

    let registry = VehicleRegistry::new();
    let mut arrivals = Vec::new();
    let mut engine = TripProgressEngine::new( SimMode::History, 5.0, &catalog);
    let clock = SimulationClock::new( 50.0, 1.0);
    let stats = engine.tick( &clock, &catalog, &registry, &mut arrivals);

    assert_eq!( stats.active + stats.inactive + stats.stalled, 0);
    assert!( registry.is_empty());
}

#[test]
fn test_locate_on_path() {
    let path = l_path();

    let (vp, idx) = locate_on_path( &path, 0.0).unwrap();
    assert_eq!( vp.pos, PlanarPoint::new(0.0,0.0));
    assert_eq!( idx, 1);

    let (vp, idx) = locate_on_path( &path, 15.0).unwrap();
    assert_eq!( vp.pos, PlanarPoint::new(10.0,5.0));
    assert_eq!( idx, 2);
    assert!( (vp.heading - 270.0).abs() < EPS); // negated (0,10) points to -y

    assert!( locate_on_path( &path, 20.5).is_none());
    assert!( locate_on_path( &path[..1], 0.0).is_none());
}

#[test]
fn test_live_mode_is_bypassed() {
    let catalog = catalog( SimMode::Live, None, None);
    let registry = VehicleRegistry::new();
    let mut arrivals = Vec::new();
    let mut engine = TripProgressEngine::new( SimMode::Live, 5.0, &catalog);

    let stats = engine.tick( &SimulationClock::new( 150.0, 1.0), &catalog, &registry, &mut arrivals);
    assert_eq!( stats.active, 0);
    assert!( registry.is_empty());
}
