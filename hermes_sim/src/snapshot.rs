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

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};
use tracing::{debug, info, warn};

use crate::{
    InterestPoint, VehicleCategory,
    errors::Result,
    sim::SimulationContext,
};

/// scheduled vs. actual end of a trip, recorded once when the trip ends
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalComparison {
    pub route_name: String,
    pub actual_time: f64,   // sim seconds
    pub expected_time: f64, // scheduled end time
}

impl ArrivalComparison {
    pub fn new (route_name: impl ToString, actual_time: f64, expected_time: f64)->Self {
        ArrivalComparison { route_name: route_name.to_string(), actual_time, expected_time }
    }

    /// positive if late
    pub fn delay (&self)->f64 { self.actual_time - self.expected_time }
}

/// the periodic summary that is sent to all subscribers
#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMessage {
    pub sim_time: f64,
    pub interest_points: Vec<InterestPoint>,
    pub affected_routes: BTreeMap<String,BTreeSet<String>>,
    pub route_frequency: BTreeMap<String,usize>,
    pub vehicle_types: BTreeMap<VehicleCategory,usize>,
    pub route_expected_reals: Vec<ArrivalComparison>,
}

impl SnapshotMessage {
    pub fn to_json (&self)->Result<String> {
        Ok( serde_json::to_string( self)? )
    }
}

#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub struct PublishReport {
    pub delivered: usize,
    pub failed: usize,
}

/// the broadcast transport abstraction. Delivery is fire-and-forget per subscriber, implementations must
/// not block on slow subscribers and a failed delivery must not prevent delivery to others
pub trait SnapshotPublisher: Send + Sync {
    fn publish (&self, msg: &SnapshotMessage)->Result<PublishReport>;
}

/// publisher for headless runs that only logs
pub struct LogPublisher;

impl SnapshotPublisher for LogPublisher {
    fn publish (&self, msg: &SnapshotMessage)->Result<PublishReport> {
        info!("snapshot at {:.0}: {} routes with vehicles, {} arrivals", msg.sim_time, msg.route_frequency.len(), msg.route_expected_reals.len());
        Ok( PublishReport::default() )
    }
}

/// builds and publishes a SnapshotMessage every `interval` ticks
pub struct SnapshotAggregator {
    interval: usize,
    n_ticks: usize,
    n_published: usize,
}

impl SnapshotAggregator {
    pub fn new (interval: usize)->Self {
        SnapshotAggregator { interval: interval.max(1), n_ticks: 0, n_published: 0 }
    }

    pub fn interval (&self)->usize { self.interval }
    pub fn n_published (&self)->usize { self.n_published }

    /// count a tick and return true if this one is due for a snapshot
    pub fn count_tick (&mut self)->bool {
        self.n_ticks += 1;
        self.n_ticks % self.interval == 0
    }

    /// this drains the accumulated arrival comparisons of the context
    pub fn build (&self, ctx: &mut SimulationContext)->SnapshotMessage {
        let catalog = ctx.catalog.clone();

        SnapshotMessage {
            sim_time: ctx.clock.time(),
            interest_points: catalog.interest_points().to_vec(),
            affected_routes: catalog.affected_routes().clone(),
            route_frequency: ctx.registry.route_frequency(),
            vehicle_types: catalog.category_counts(),
            route_expected_reals: std::mem::take( &mut ctx.arrivals),
        }
    }

    /// called once per tick. Publish failures are logged, they never abort the tick
    pub fn on_tick (&mut self, ctx: &mut SimulationContext, publisher: &dyn SnapshotPublisher)->Option<PublishReport> {
        if !self.count_tick() { return None }

        let msg = self.build( ctx);
        match publisher.publish( &msg) {
            Ok(report) => {
                self.n_published += 1;
                if report.failed > 0 {
                    warn!("snapshot delivery failed for {} of {} subscribers", report.failed, report.failed + report.delivered);
                } else {
                    debug!("snapshot delivered to {} subscribers", report.delivered);
                }
                Some(report)
            }
            Err(e) => {
                warn!("snapshot publishing failed: {e}");
                None
            }
        }
    }
}
