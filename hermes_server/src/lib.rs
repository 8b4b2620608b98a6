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

//! websocket broadcast of simulation snapshots
//! each connected subscriber gets a bounded outbound queue that is drained by its own writer task. Publishing
//! never waits for subscribers, a full queue just counts as a failed delivery

use std::{fs, net::SocketAddr, path::Path, sync::{Arc, Mutex, atomic::{AtomicU64, Ordering}}};
use axum::{
    Router,
    extract::{State, connect_info::ConnectInfo, ws::{Message, WebSocket, WebSocketUpgrade}},
    response::Response,
    routing::get,
};
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc::{self, error::TrySendError}, task::JoinHandle};
use tracing::{debug, info, warn};

use hermes_sim::{PublishReport, SnapshotMessage, SnapshotPublisher, errors::HermesError};

pub mod errors;
use errors::{Result, op_failed};

#[derive(Deserialize,Serialize,Debug,Clone)]
pub struct SnapshotServerConfig {
    pub sock_addr: SocketAddr,

    #[serde(default="default_path")]
    pub path: String,

    #[serde(default="default_subscriber_buffer")]
    pub subscriber_buffer: usize, // max number of queued messages per subscriber
}

fn default_path()->String { "/socket".to_string() }
fn default_subscriber_buffer()->usize { 16 }

pub fn load_config<C> (path: impl AsRef<Path>)->Result<C> where C: for<'a> Deserialize<'a> {
    let data = fs::read( path.as_ref())?;
    Ok( ron::de::from_bytes( data.as_slice())? )
}

struct Subscriber {
    name: String,
    tx: mpsc::Sender<Arc<String>>,
}

struct SubscriberSetInner {
    subscribers: DashMap<u64,Subscriber>,
    next_id: AtomicU64,
    last_msg: Mutex<Option<Arc<String>>>,
    buffer: usize,
}

/// the dynamic set of connected subscribers. Connect/disconnect can happen concurrently to broadcasts
#[derive(Clone)]
pub struct SubscriberSet {
    inner: Arc<SubscriberSetInner>,
}

impl SubscriberSet {
    pub fn new (buffer: usize)->Self {
        let inner = SubscriberSetInner {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
            last_msg: Mutex::new(None),
            buffer: buffer.max(1),
        };
        SubscriberSet { inner: Arc::new(inner) }
    }

    pub fn len (&self)->usize { self.inner.subscribers.len() }
    pub fn is_empty (&self)->bool { self.inner.subscribers.is_empty() }

    fn last_msg (&self)->Option<Arc<String>> {
        match self.inner.last_msg.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone()
        }
    }

    fn set_last_msg (&self, msg: Arc<String>) {
        match self.inner.last_msg.lock() {
            Ok(mut guard) => *guard = Some(msg),
            Err(poisoned) => *poisoned.into_inner() = Some(msg)
        }
    }

    /// register a new subscriber, which immediately gets the last broadcast message (if any)
    pub fn add_subscriber (&self, name: impl ToString)->(u64, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel( self.inner.buffer);
        if let Some(msg) = self.last_msg() {
            let _ = tx.try_send( msg); // fresh queue, can't be full
        }

        let id = self.inner.next_id.fetch_add( 1, Ordering::Relaxed);
        let name = name.to_string();
        info!("subscriber {id} ({name}) connected");
        self.inner.subscribers.insert( id, Subscriber{ name, tx });
        (id, rx)
    }

    pub fn remove_subscriber (&self, id: u64) {
        if let Some((_,sub)) = self.inner.subscribers.remove( &id) {
            info!("subscriber {id} ({}) disconnected", sub.name);
        }
    }

    /// queue a message for all current subscribers without waiting.
    /// Subscribers whose queues are closed are removed
    pub fn broadcast (&self, msg: String)->PublishReport {
        let msg = Arc::new(msg);
        self.set_last_msg( msg.clone());

        // snapshot so that we don't hold shard locks while sending or removing
        let targets: Vec<(u64,mpsc::Sender<Arc<String>>)> = self.inner.subscribers.iter()
            .map( |e| (*e.key(), e.value().tx.clone()))
            .collect();

        let mut report = PublishReport::default();
        for (id, tx) in targets {
            match tx.try_send( msg.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("subscriber {id} queue full, dropping snapshot");
                    report.failed += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    warn!("subscriber {id} closed, removing");
                    self.remove_subscriber( id);
                    report.failed += 1;
                }
            }
        }
        report
    }
}

impl SnapshotPublisher for SubscriberSet {
    fn publish (&self, msg: &SnapshotMessage)->hermes_sim::errors::Result<PublishReport> {
        let json = msg.to_json()?;
        Ok( self.broadcast( json) )
    }
}

/// the websocket server. Subscribers connect to `ws://<sock_addr><path>`
pub struct SnapshotServer {
    config: SnapshotServerConfig,
    subscribers: SubscriberSet,
    server_task: Option<JoinHandle<()>>,
}

impl SnapshotServer {
    pub fn new (config: SnapshotServerConfig)->Self {
        let subscribers = SubscriberSet::new( config.subscriber_buffer);
        SnapshotServer { config, subscribers, server_task: None }
    }

    pub fn subscribers (&self)->&SubscriberSet { &self.subscribers }

    pub fn publisher (&self)->Arc<dyn SnapshotPublisher> { Arc::new( self.subscribers.clone()) }

    pub fn build_router (&self)->Router {
        Router::new()
            .route( &self.config.path, get( ws_handler))
            .with_state( self.subscribers.clone())
    }

    /// bind and serve in a background task. Returns the bound address (the configured port can be 0)
    pub async fn start (&mut self)->Result<SocketAddr> {
        if self.server_task.is_some() { return Err( op_failed("server task already running")) }

        let listener = tokio::net::TcpListener::bind( self.config.sock_addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.build_router().into_make_service_with_connect_info::<SocketAddr>();

        info!("serving snapshots on ws://{}{}", local_addr, self.config.path);
        self.server_task = Some( tokio::spawn( async move {
            if let Err(e) = axum::serve( listener, router).await {
                warn!("snapshot server terminated: {e}");
            }
        }));
        Ok(local_addr)
    }

    pub fn terminate (&mut self) {
        if let Some(jh) = &self.server_task {
            jh.abort();
            self.server_task = None;
        }
    }
}

impl SnapshotPublisher for SnapshotServer {
    fn publish (&self, msg: &SnapshotMessage)->hermes_sim::errors::Result<PublishReport> {
        if self.server_task.is_none() {
            return Err( HermesError::PublishError( format!("snapshot server for {} not running", self.config.sock_addr)))
        }
        self.subscribers.publish( msg)
    }
}

async fn ws_handler (ws: WebSocketUpgrade, ConnectInfo(remote_addr): ConnectInfo<SocketAddr>, State(subscribers): State<SubscriberSet>)->Response {
    ws.on_upgrade( move |socket| handle_connection( socket, remote_addr, subscribers))
}

async fn handle_connection (ws: WebSocket, remote_addr: SocketAddr, subscribers: SubscriberSet) {
    let (id, mut rx) = subscribers.add_subscriber( remote_addr);
    let (mut ws_sender, mut ws_receiver) = ws.split();

    let mut writer = tokio::spawn( async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = ws_sender.send( Message::Text( msg.as_str().into())).await {
                debug!("websocket send to {remote_addr} failed: {e}");
                break;
            }
        }
    });

    // we don't process incoming messages, we just need to know when the subscriber goes away
    let mut reader = tokio::spawn( async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg { break }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }
    subscribers.remove_subscriber( id);
}
