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

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    HermesConfig, SimMode,
    catalog::ScheduleCatalog,
    clock::{SimulationClock, parse_hms},
    errors::Result,
    gtfs::GtfsFeed,
    live::{FeedSource, LiveFeedCache, LiveFeedReconciler, ReconcileStats},
    registry::VehicleRegistry,
    snapshot::{ArrivalComparison, PublishReport, SnapshotAggregator, SnapshotPublisher},
    trip::{TickStats, TripProgressEngine},
};

/// everything a simulation step operates on. There is no global state, each simulation owns its context
pub struct SimulationContext {
    pub mode: SimMode,
    pub clock: SimulationClock,
    pub catalog: Arc<ScheduleCatalog>,
    pub registry: VehicleRegistry, // cheap to clone for readers
    pub arrivals: Vec<ArrivalComparison>, // accumulated until the next snapshot
}

impl SimulationContext {
    pub fn new (mode: SimMode, clock: SimulationClock, catalog: Arc<ScheduleCatalog>)->Self {
        SimulationContext { mode, clock, catalog, registry: VehicleRegistry::new(), arrivals: Vec::new() }
    }
}

/// what happened during a single tick
#[derive(Debug,Clone,Copy,Default)]
pub struct TickReport {
    pub time: f64,
    pub trips: TickStats,
    pub live: Option<ReconcileStats>,
    pub published: Option<PublishReport>,
}

/// read the GTFS bundle and build the catalog. Errors here are fatal for the caller
pub fn load_catalog (config: &HermesConfig)->Result<ScheduleCatalog> {
    info!("loading GTFS schedule from {:?}", config.gtfs_path);
    let feed = GtfsFeed::read( &config.gtfs_path, config.mode != SimMode::Live)?;
    Ok( ScheduleCatalog::from_gtfs( feed, config.mode, config.interest_points.clone()) )
}

/// the tick driver
/// Each call of `tick` advances the clock, moves vehicles (schedule based or from live feed data) and every
/// `snapshot_interval` ticks publishes a snapshot. Nothing inside of a tick is fatal
pub struct HermesSim {
    ctx: SimulationContext,
    engine: TripProgressEngine,
    reconciler: LiveFeedReconciler,
    live_cache: Option<LiveFeedCache>,
    aggregator: SnapshotAggregator,
    publisher: Arc<dyn SnapshotPublisher>,
    n_ticks: u64,
}

impl HermesSim {
    pub fn new (ctx: SimulationContext, vehicle_speed: f64, snapshot_interval: usize, publisher: Arc<dyn SnapshotPublisher>)->Self {
        let engine = TripProgressEngine::new( ctx.mode, vehicle_speed, &ctx.catalog);
        let reconciler = LiveFeedReconciler::new();
        let aggregator = SnapshotAggregator::new( snapshot_interval);

        HermesSim { ctx, engine, reconciler, live_cache: None, aggregator, publisher, n_ticks: 0 }
    }

    pub fn from_config (config: &HermesConfig, catalog: Arc<ScheduleCatalog>, publisher: Arc<dyn SnapshotPublisher>)->Result<Self> {
        config.check()?;

        let clock = match &config.start_time {
            Some(hms) => SimulationClock::new( parse_hms( hms)? as f64, config.speed),
            None => SimulationClock::from_local_time( config.speed)
        };
        info!("starting {} simulation at {}", config.mode, clock);

        let ctx = SimulationContext::new( config.mode, clock, catalog);
        Ok( HermesSim::new( ctx, config.vehicle_speed, config.snapshot_interval, publisher) )
    }

    pub fn context (&self)->&SimulationContext { &self.ctx }
    pub fn context_mut (&mut self)->&mut SimulationContext { &mut self.ctx }
    pub fn clock (&self)->&SimulationClock { &self.ctx.clock }
    pub fn registry (&self)->&VehicleRegistry { &self.ctx.registry }
    pub fn catalog (&self)->&ScheduleCatalog { &self.ctx.catalog }
    pub fn engine (&self)->&TripProgressEngine { &self.engine }
    pub fn reconciler (&self)->&LiveFeedReconciler { &self.reconciler }
    pub fn n_ticks (&self)->u64 { self.n_ticks }

    /// LIVE mode ticks apply the most recent data of this cache (if it changed since the last tick)
    pub fn set_live_cache (&mut self, cache: LiveFeedCache) {
        self.live_cache = Some(cache);
    }

    pub fn tick (&mut self, delta: f64)->TickReport {
        let ctx = &mut self.ctx;
        ctx.clock.advance( delta);
        self.n_ticks += 1;

        let mut report = TickReport { time: ctx.clock.time(), ..TickReport::default() };

        if ctx.mode == SimMode::Live {
            if let Some(cache) = &self.live_cache {
                report.live = self.reconciler.apply_cached( cache, &ctx.catalog, &ctx.registry);
            }
        } else {
            report.trips = self.engine.tick( &ctx.clock, &ctx.catalog, &ctx.registry, &mut ctx.arrivals);
        }

        report.published = self.aggregator.on_tick( ctx, self.publisher.as_ref());
        if report.published.is_some() {
            debug!("tick {} at {}: {:?}", self.n_ticks, ctx.clock, report.trips);
        }
        report
    }

    /// poll the live feed on the calling task instead of a background connector
    pub async fn poll_live (&mut self, source: &dyn FeedSource)->Result<ReconcileStats> {
        self.reconciler.poll( source, &self.ctx.catalog, &self.ctx.registry).await
    }

    pub fn increase_speed (&mut self) {
        self.ctx.clock.increase_speed();
        info!("simulation speed now {}", self.ctx.clock.speed());
    }

    pub fn decrease_speed (&mut self) {
        self.ctx.clock.decrease_speed();
        info!("simulation speed now {}", self.ctx.clock.speed());
    }
}
