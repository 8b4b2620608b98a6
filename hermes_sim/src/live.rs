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
#![allow(unused)]

//! reconciliation of GTFS-realtime vehicle positions with the static catalog

use std::{collections::{HashMap, HashSet}, sync::{Arc, Mutex, atomic::{AtomicU64, Ordering}}, time::Duration};
use async_trait::async_trait;
use reqwest::Client;
use tokio::{task::AbortHandle, time::sleep};
use tracing::{debug, error, info, warn};

use crate::{
    LiveFeedConfig,
    catalog::ScheduleCatalog,
    errors::{Result, op_failed},
    geo::{PlanarPoint, heading_from_bearing},
    gtfs_rt::{FeedMessage, decode_feed},
    registry::{VehiclePosition, VehicleRegistry, VehicleSnapshot},
};

/// a single vehicle position report. These only live until they are reconciled
#[derive(Debug,Clone,PartialEq)]
pub struct LiveObservation {
    pub trip_id: String,
    pub route_id: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub bearing: Option<f64>, // compass degrees
}

/// the decoded messages of one successful poll
#[derive(Debug,Clone)]
pub struct FeedData {
    pub vehicle_positions: FeedMessage,
    pub trip_updates: Option<FeedMessage>,
}

/// where we get realtime feed messages from
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch (&self)->Result<FeedData>;
}

/// FeedSource that retrieves protobuf encoded feed messages via HTTP GET
pub struct HttpFeedSource {
    client: Client,
    config: Arc<LiveFeedConfig>,
}

impl HttpFeedSource {
    pub fn new (config: Arc<LiveFeedConfig>)->Result<Self> {
        let client = Client::builder().timeout( config.request_timeout).build()?;
        Ok( HttpFeedSource { client, config } )
    }

    async fn get_feed (&self, url: &str)->Result<FeedMessage> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        decode_feed( &bytes)
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch (&self)->Result<FeedData> {
        let vehicle_positions = self.get_feed( &self.config.vehicle_positions_url).await?;

        // trip updates only resolve missing route ids, we can do without them
        let trip_updates = if let Some(url) = &self.config.trip_updates_url {
            match self.get_feed( url).await {
                Ok(msg) => Some(msg),
                Err(e) => { warn!("failed to retrieve trip updates: {e}"); None }
            }
        } else { None };

        Ok( FeedData{ vehicle_positions, trip_updates } )
    }
}

#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub struct ReconcileStats {
    pub updated: usize,
    pub created: usize,
    pub discarded: usize,
    pub hidden: usize,
}

/// maps live observations onto catalog routes and updates the registry accordingly
#[derive(Debug,Default)]
pub struct LiveFeedReconciler {
    trip_routes: HashMap<String,String>, // trip_id -> route_id
    last_generation: u64,
}

impl LiveFeedReconciler {
    pub fn new ()->Self { LiveFeedReconciler::default() }

    pub fn route_of (&self, trip_id: &str)->Option<&str> {
        self.trip_routes.get( trip_id).map( |s| s.as_str())
    }

    pub fn n_indexed_trips (&self)->usize { self.trip_routes.len() }

    /// fetch and reconcile. A failed fetch leaves the registry untouched
    pub async fn poll (&mut self, source: &dyn FeedSource, catalog: &ScheduleCatalog, registry: &VehicleRegistry)->Result<ReconcileStats> {
        match source.fetch().await {
            Ok(data) => Ok( self.update( catalog, registry, &data.vehicle_positions, data.trip_updates.as_ref()) ),
            Err(e) => {
                warn!("live feed poll failed, keeping last known vehicle state: {e}");
                Err(e)
            }
        }
    }

    /// apply the latest cached feed data if we haven't seen it yet
    pub fn apply_cached (&mut self, cache: &LiveFeedCache, catalog: &ScheduleCatalog, registry: &VehicleRegistry)->Option<ReconcileStats> {
        let (generation, data) = cache.latest()?;
        if generation <= self.last_generation { return None }

        self.last_generation = generation;
        Some( self.update( catalog, registry, &data.vehicle_positions, data.trip_updates.as_ref()) )
    }

    /// reconcile decoded feed messages. Observations for routes that are not in the catalog are discarded,
    /// tracked vehicles that are not in the feed anymore are hidden
    pub fn update (&mut self, catalog: &ScheduleCatalog, registry: &VehicleRegistry,
                   vehicle_positions: &FeedMessage, trip_updates: Option<&FeedMessage>)->ReconcileStats {
        let mut stats = ReconcileStats::default();

        if let Some(trip_updates) = trip_updates {
            self.index_trip_updates( trip_updates);
        }

        let observations = self.observations( vehicle_positions);
        let mut seen: HashSet<String> = HashSet::with_capacity( observations.len());

        for obs in observations {
            let Some(route) = obs.route_id.as_deref().and_then( |rid| catalog.route( rid)) else {
                debug!("discarding live observation of trip {} with unknown route {:?}", obs.trip_id, obs.route_id);
                stats.discarded += 1;
                continue
            };

            let pos = PlanarPoint::from_lat_lon_degrees( obs.lat, obs.lon);
            if !pos.is_finite() {
                debug!("discarding live observation of trip {} with invalid position", obs.trip_id);
                stats.discarded += 1;
                continue
            }
            let heading = obs.bearing.map( heading_from_bearing);

            if registry.update( &obs.trip_id, |v| v.tick_with_bearing( pos, heading)) {
                stats.updated += 1;
            } else {
                let vp = VehiclePosition { pos, heading: heading.unwrap_or(0.0) };
                registry.insert( VehicleSnapshot::for_route( Arc::new( obs.trip_id.clone()), route, vp));
                stats.created += 1;
            }
            seen.insert( obs.trip_id);
        }

        stats.hidden = registry.hide_unless( |trip_id| seen.contains( trip_id));
        debug!("live update: {stats:?}, {} indexed trips", self.n_indexed_trips());
        stats
    }

    fn index_trip_updates (&mut self, trip_updates: &FeedMessage) {
        for e in &trip_updates.entity {
            if let Some(tu) = &e.trip_update {
                if let (Some(trip_id), Some(route_id)) = (&tu.trip.trip_id, &tu.trip.route_id) {
                    self.trip_routes.insert( trip_id.clone(), route_id.clone());
                }
            }
        }
    }

    /// extract observations and update our trip->route index from vehicle entities
    fn observations (&mut self, vehicle_positions: &FeedMessage)->Vec<LiveObservation> {
        let mut list = Vec::with_capacity( vehicle_positions.entity.len());

        for e in &vehicle_positions.entity {
            if e.is_deleted == Some(true) { continue }
            let Some(vehicle) = &e.vehicle else { continue };
            let Some(trip) = &vehicle.trip else { continue };
            let Some(trip_id) = &trip.trip_id else { continue };
            let Some(position) = &vehicle.position else { continue };

            let route_id = match &trip.route_id {
                Some(route_id) => {
                    self.trip_routes.insert( trip_id.clone(), route_id.clone());
                    Some( route_id.clone())
                }
                None => self.trip_routes.get( trip_id).cloned()
            };

            list.push( LiveObservation {
                trip_id: trip_id.clone(),
                route_id,
                lat: position.latitude as f64,
                lon: position.longitude as f64,
                bearing: position.bearing.map( |b| b as f64),
            });
        }
        list
    }
}

/// the last known good feed data, shared between the background poll task (writer) and the tick driver (reader)
#[derive(Debug,Clone,Default)]
pub struct LiveFeedCache {
    generation: Arc<AtomicU64>,
    data: Arc<Mutex<Option<Arc<FeedData>>>>,
}

impl LiveFeedCache {
    pub fn new ()->Self { LiveFeedCache::default() }

    pub fn generation (&self)->u64 { self.generation.load( Ordering::Acquire) }

    pub fn store (&self, data: FeedData)->u64 {
        let mut guard = match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner() // the Option is always in a consistent state
        };
        *guard = Some( Arc::new(data));
        self.generation.fetch_add( 1, Ordering::AcqRel) + 1
    }

    pub fn latest (&self)->Option<(u64,Arc<FeedData>)> {
        let guard = match self.data.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner()
        };
        guard.as_ref().map( |data| (self.generation.load( Ordering::Acquire), data.clone()))
    }
}

/// background task that polls a FeedSource in fixed intervals and stores successful results in a LiveFeedCache.
/// Failed polls are retried up to `max_retries` times with `retry_delay` before we fall back to the normal interval
pub struct LiveFeedConnector {
    config: Arc<LiveFeedConfig>,
    source: Arc<dyn FeedSource>,
    cache: LiveFeedCache,
    task: Option<AbortHandle>,
}

impl LiveFeedConnector {
    pub fn new (config: Arc<LiveFeedConfig>, source: Arc<dyn FeedSource>, cache: LiveFeedCache)->Self {
        LiveFeedConnector { config, source, cache, task: None }
    }

    pub fn cache (&self)->&LiveFeedCache { &self.cache }

    pub fn is_running (&self)->bool { self.task.is_some() }

    /// this has to be called from within a tokio runtime
    pub fn start (&mut self)->Result<()> {
        if self.task.is_none() {
            let rt = tokio::runtime::Handle::try_current().map_err( |e| op_failed!("no tokio runtime: {e}"))?;
            let config = self.config.clone();
            let source = self.source.clone();
            let cache = self.cache.clone();

            let jh = rt.spawn( async move {
                let mut retries = config.max_retries;

                loop {
                    let sleep_dur = match source.fetch().await {
                        Ok(data) => {
                            retries = config.max_retries;
                            let generation = cache.store( data);
                            debug!("live feed generation {generation} retrieved");
                            config.poll_interval
                        }
                        Err(e) => {
                            if retries > 0 {
                                retries -= 1;
                                warn!("live feed retrieval failed ({e}), retry in {:?}", config.retry_delay);
                                config.retry_delay
                            } else {
                                retries = config.max_retries;
                                error!("live feed retrieval failed: {e}");
                                config.poll_interval
                            }
                        }
                    };
                    sleep( sleep_dur).await;
                }
            });
            self.task = Some( jh.abort_handle());
            info!("live feed connector started for {}", self.config.vehicle_positions_url);
        }
        Ok(())
    }

    pub fn terminate (&mut self) {
        if let Some(ah) = &self.task {
            ah.abort();
            self.task = None;
        }
    }
}

impl Drop for LiveFeedConnector {
    fn drop (&mut self) { self.terminate() }
}
