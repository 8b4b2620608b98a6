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

use std::{path::PathBuf, sync::Arc};
use anyhow::Result;
use clap::Parser;
use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hermes_sim::{
    HermesConfig, HermesSim, HttpFeedSource, LiveFeedCache, LiveFeedConnector, LogPublisher, SimMode,
    SnapshotPublisher, load_catalog, load_config,
};
use hermes_server::{SnapshotServer, SnapshotServerConfig};

#[derive(Parser, Debug)]
#[command(version, about, long_about = "transit simulation with live feed fusion and websocket snapshot broadcast")]
pub struct Args {
    /// simulation config (RON)
    #[arg(short, long, default_value = "hermes_live/configs/hermes.ron")]
    pub config: PathBuf,

    /// snapshot server config (RON). Without it snapshots are only logged
    #[arg(short, long)]
    pub server_config: Option<PathBuf>,

    /// override the configured mode (HISTORY, LIVE or SIMULATED)
    #[arg(short, long)]
    pub mode: Option<SimMode>,

    /// stop after this many ticks
    #[arg(short, long)]
    pub ticks: Option<u64>,
}

#[tokio::main]
async fn main()->Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else( |_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config: HermesConfig = load_config( &args.config)?;
    if let Some(mode) = args.mode { config.mode = mode; }
    config.check()?;

    //--- everything that can fail fatally happens before the tick loop
    let catalog = Arc::new( load_catalog( &config)?);

    let mut server = match &args.server_config {
        Some(path) => {
            let server_config: SnapshotServerConfig = hermes_server::load_config( path)?;
            let mut server = SnapshotServer::new( server_config);
            server.start().await?;
            Some(server)
        }
        None => None
    };
    let publisher: Arc<dyn SnapshotPublisher> = match &server {
        Some(server) => server.publisher(),
        None => Arc::new( LogPublisher)
    };

    let mut sim = HermesSim::from_config( &config, catalog, publisher)?;

    let mut connector = None;
    if config.mode == SimMode::Live && let Some(live_config) = &config.live_feed {
        let live_config = Arc::new( live_config.clone());
        let source = Arc::new( HttpFeedSource::new( live_config.clone())?);
        let cache = LiveFeedCache::new();

        let mut c = LiveFeedConnector::new( live_config, source, cache.clone());
        c.start()?;
        sim.set_live_cache( cache);
        connector = Some(c);
    }

    //--- the tick loop
    let mut ticker = interval( config.tick_interval);
    ticker.set_missed_tick_behavior( MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last = Instant::now();
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                sim.tick( now.duration_since(last).as_secs_f64());
                last = now;

                if let Some(max_ticks) = args.ticks && sim.n_ticks() >= max_ticks {
                    info!("reached {max_ticks} ticks at {}", sim.clock());
                    break
                }
            }
            _ = &mut ctrl_c => {
                info!("terminating at {}", sim.clock());
                break
            }
        }
    }

    if let Some(mut c) = connector { c.terminate() }
    if let Some(server) = &mut server { server.terminate() }
    Ok(())
}
