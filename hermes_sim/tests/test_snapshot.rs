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

use std::sync::{Arc, Mutex};
use hermes_sim::{
    HermesSim, InterestPoint, PublishReport, ScheduleCatalog, SimMode, SimulationClock, SimulationContext,
    SnapshotMessage, SnapshotPublisher, VehicleCategory,
    errors::{HermesError, Result},
    geo::PlanarPoint,
    gtfs::{GtfsRoute, GtfsTrip},
};

/// keeps everything it gets
#[derive(Default)]
struct CollectingPublisher {
    messages: Mutex<Vec<SnapshotMessage>>,
}

impl SnapshotPublisher for CollectingPublisher {
    fn publish (&self, msg: &SnapshotMessage)->Result<PublishReport> {
        self.messages.lock().unwrap().push( msg.clone());
        Ok( PublishReport{ delivered: 1, failed: 0 })
    }
}

struct FailingPublisher;

impl SnapshotPublisher for FailingPublisher {
    fn publish (&self, _msg: &SnapshotMessage)->Result<PublishReport> {
        Err( HermesError::PublishError("transport down".into()))
    }
}

fn catalog ()->ScheduleCatalog {
    let interest_points = vec![ InterestPoint::new( "stadium", -27.4648, 153.0095, 500.0) ];
    let mut builder = ScheduleCatalog::builder( SimMode::History, interest_points);
    builder.add_route( &GtfsRoute{ route_id: "R1".into(), route_short_name: "66".into(), route_long_name: String::new(), route_type: 3 });
    builder.add_route( &GtfsRoute{ route_id: "R2".into(), route_short_name: "BNSH".into(), route_long_name: String::new(), route_type: 2 });

    let path = [PlanarPoint::new(0.0,0.0), PlanarPoint::new(10.0,0.0), PlanarPoint::new(10.0,10.0)];
    let trip = GtfsTrip { route_id: "R1".into(), trip_id: "T1".into(), trip_headsign: String::new(), shape_id: None, direction_id: None };
    builder.add_planar_trip( &trip, &path, Some(100.0), Some(200.0));
    builder.build()
}

fn sim (publisher: Arc<dyn SnapshotPublisher>)->HermesSim {
    let ctx = SimulationContext::new( SimMode::History, SimulationClock::new( 150.0, 1.0), Arc::new( catalog()));
    HermesSim::new( ctx, 5.0, 10, publisher)
}

#[test]
fn test_snapshot_interval() {
    let publisher = Arc::new( CollectingPublisher::default());
    let mut sim = sim( publisher.clone());

    for i in 1..=25 {
        let report = sim.tick( 0.0);
        assert_eq!( report.published.is_some(), i % 10 == 0);
    }
    let messages = publisher.messages.lock().unwrap();
    assert_eq!( messages.len(), 2);

    let msg = &messages[0];
    println!("{}", msg.to_json().unwrap());
    assert_eq!( msg.sim_time, 150.0);
    assert_eq!( msg.interest_points.len(), 1);
    assert_eq!( msg.route_frequency.get("66"), Some(&1));
    assert_eq!( msg.vehicle_types.get( &VehicleCategory::Bus), Some(&1));
    assert_eq!( msg.vehicle_types.get( &VehicleCategory::Train), Some(&1));
    assert!( msg.route_expected_reals.is_empty());
}

#[test]
fn test_arrivals_are_drained() {
    let publisher = Arc::new( CollectingPublisher::default());
    let mut sim = sim( publisher.clone());

    sim.tick( 0.0); // T1 active at 150
    sim.tick( 100.0); // 250: T1 ended
    assert_eq!( sim.context().arrivals.len(), 1);
    for _ in 0..8 { sim.tick( 0.0); }

    {
        let messages = publisher.messages.lock().unwrap();
        assert_eq!( messages.len(), 1);
        let arrivals = &messages[0].route_expected_reals;
        assert_eq!( arrivals.len(), 1);
        assert_eq!( arrivals[0].route_name, "66");
        assert_eq!( arrivals[0].actual_time, 250.0);
        assert_eq!( arrivals[0].expected_time, 200.0);
        assert!( messages[0].route_frequency.is_empty()); // vehicle is hidden
    }
    assert!( sim.context().arrivals.is_empty());

    for _ in 0..10 { sim.tick( 0.0); }
    let messages = publisher.messages.lock().unwrap();
    assert_eq!( messages.len(), 2);
    assert!( messages[1].route_expected_reals.is_empty());
}

#[test]
fn test_json_format() {
    let publisher = Arc::new( CollectingPublisher::default());
    let mut sim = sim( publisher.clone());
    for _ in 0..10 { sim.tick( 0.0); }

    let json = publisher.messages.lock().unwrap()[0].to_json().unwrap();
    for key in ["\"simTime\"", "\"interestPoints\"", "\"affectedRoutes\"", "\"routeFrequency\"", "\"vehicleTypes\"", "\"routeExpectedReals\"", "\"BUS\""] {
        assert!( json.contains(key), "missing {key} in {json}");
    }

    let msg: SnapshotMessage = serde_json::from_str( &json).unwrap();
    assert_eq!( msg.route_frequency.get("66"), Some(&1));
}

#[test]
fn test_publish_failure_does_not_abort_tick() {
    let mut sim = sim( Arc::new( FailingPublisher));
    for _ in 0..20 {
        let report = sim.tick( 1.0);
        assert!( report.published.is_none());
    }
    assert_eq!( sim.n_ticks(), 20);
    assert_eq!( sim.clock().time(), 170.0);
}

#[test]
fn test_speed_control() {
    let mut sim = sim( Arc::new( CollectingPublisher::default()));
    sim.increase_speed();
    sim.tick( 1.0);
    assert_eq!( sim.clock().time(), 152.0);

    sim.decrease_speed();
    sim.decrease_speed();
    sim.tick( 2.0);
    assert_eq!( sim.clock().time(), 153.0);
}
