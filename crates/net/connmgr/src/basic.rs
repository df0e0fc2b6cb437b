//! Watermark-based connection manager.
//!
//! Peers accumulate weight through tags and decaying tags. When the number of
//! open connections exceeds the high water mark, the lowest-weight peers past
//! their grace period are disconnected until the low water mark is reached.
//! Protected peers are never selected. Among peers of equal weight, those
//! with the fewest open streams go first, then those idle the longest.
//!
//! Stream counts come from [`Notifiee::opened_stream`] and
//! [`Notifiee::closed_stream`]. The swarm behaviour in this crate carries no
//! streams, so the host's protocol behaviours must report them. Without those
//! reports every connection counts as idle since it was opened.
//!
//! Lock order: trim lock, then last-trim time, then protection table, then
//! decaying tag registry, then peer table. A trim releases the last-trim time
//! before selecting victims and takes it again after.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use libp2p::swarm::ConnectionId;
use libp2p::{Multiaddr, PeerId};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use web_time::Instant;

use crate::config::ConnManagerConfig;
use crate::decay::{BumpFn, DecayFn, DecayingTag, DecayingValue, TagState};
use crate::error::ConnManagerError;
use crate::metrics::ConnManagerMetrics;
use crate::traits::{ConnManager, ConnectionCloser, Decayer, Notifiee};
use crate::types::{
    ConnManagerInfo, ConnectionInfo, StreamInfo, TagInfo, TrimContext, TrimReport, TrimSkip,
};

#[derive(Debug, Clone)]
struct ConnRecord {
    opened_at: Instant,
    remote_addr: Multiaddr,
    streams: usize,
    /// Set while no stream is open.
    idle_since: Option<Instant>,
}

impl ConnRecord {
    fn new(now: Instant, remote_addr: Multiaddr) -> Self {
        Self {
            opened_at: now,
            remote_addr,
            streams: 0,
            idle_since: Some(now),
        }
    }

    fn stream_opened(&mut self) {
        self.streams += 1;
        self.idle_since = None;
    }

    fn stream_closed(&mut self, now: Instant) {
        self.streams = self.streams.saturating_sub(1);
        if self.streams == 0 && self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }
}

#[derive(Debug, Clone)]
struct PeerInfo {
    first_seen: Instant,
    /// Created by tagging before any connection was seen.
    temp: bool,
    tags: HashMap<String, i64>,
    decaying: HashMap<String, DecayingValue>,
    conns: HashMap<ConnectionId, ConnRecord>,
}

impl PeerInfo {
    fn new(now: Instant, temp: bool) -> Self {
        Self {
            first_seen: now,
            temp,
            tags: HashMap::new(),
            decaying: HashMap::new(),
            conns: HashMap::new(),
        }
    }

    fn value(&self) -> i64 {
        let tags: i64 = self.tags.values().sum();
        let decaying: i64 = self.decaying.values().map(|v| v.value).sum();
        tags.saturating_add(decaying)
    }

    fn oldest_conn(&self) -> Option<Instant> {
        self.conns.values().map(|c| c.opened_at).min()
    }

    fn open_streams(&self) -> usize {
        self.conns.values().map(|c| c.streams).sum()
    }

    /// Start of the longest idle period among the connections, or the oldest
    /// connection when none is idle.
    fn longest_idle(&self) -> Option<Instant> {
        self.conns
            .values()
            .filter_map(|c| c.idle_since)
            .min()
            .or_else(|| self.oldest_conn())
    }
}

#[derive(Debug, Default)]
struct PeerTable {
    peers: HashMap<PeerId, PeerInfo>,
    connections: usize,
}

pub(crate) struct Inner {
    config: ConnManagerConfig,
    protected: Mutex<HashMap<PeerId, HashSet<String>>>,
    decaying_tags: Mutex<HashMap<String, TagState>>,
    peers: RwLock<PeerTable>,
    last_trim: Mutex<Option<Instant>>,
    /// Serialises trims.
    trim_lock: Mutex<()>,
    closer: Box<dyn ConnectionCloser>,
    closed: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    metrics: ConnManagerMetrics,
}

/// Tag-weighted connection manager with low/high water marks.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct BasicConnManager {
    inner: Arc<Inner>,
}

impl fmt::Debug for BasicConnManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicConnManager")
            .field("config", &self.inner.config)
            .field("connections", &self.connection_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl BasicConnManager {
    /// Create a manager that closes trimmed connections through `closer`.
    pub fn new(
        config: ConnManagerConfig,
        closer: impl ConnectionCloser + 'static,
    ) -> Result<Self, ConnManagerError> {
        config.validate()?;
        let (shutdown_tx, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                protected: Mutex::new(HashMap::new()),
                decaying_tags: Mutex::new(HashMap::new()),
                peers: RwLock::new(PeerTable::default()),
                last_trim: Mutex::new(None),
                trim_lock: Mutex::new(()),
                closer: Box::new(closer),
                closed: AtomicBool::new(false),
                shutdown_tx,
                metrics: ConnManagerMetrics::default(),
            }),
        })
    }

    pub fn config(&self) -> &ConnManagerConfig {
        &self.inner.config
    }

    pub fn connection_count(&self) -> usize {
        self.inner.peers.read().connections
    }

    /// Number of tracked peers, temporary entries included.
    pub fn peer_count(&self) -> usize {
        self.inner.peers.read().peers.len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Apply every decaying tag whose next tick is due at `now`.
    pub fn tick(&self, now: Instant) {
        self.inner.tick(now);
    }

    /// Spawn a task trimming every `interval` while above the high water mark.
    ///
    /// The task stops when the manager is closed.
    pub fn spawn_background_trim(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        let period = if interval.is_zero() {
            Duration::from_secs(1)
        } else {
            interval
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => {
                        if manager.connection_count() > manager.inner.config.high_water {
                            let ctx = TrimContext::with_cancel(shutdown.clone());
                            let report = manager.trim_open_conns(&ctx);
                            trace!(?report, "background trim");
                        }
                    }
                    _ = shutdown.changed() => {}
                }
            }
            debug!("background trim stopped");
        })
    }

    /// Spawn the decayer task, ticking every decay resolution until the manager is closed.
    pub fn spawn_decayer(&self) -> JoinHandle<()> {
        let manager = self.clone();
        let mut shutdown = self.inner.shutdown_tx.subscribe();
        let resolution = self.inner.config.decay_resolution;
        let period = if resolution.is_zero() {
            Duration::from_secs(1)
        } else {
            resolution
        };

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    _ = ticker.tick() => manager.tick(Instant::now()),
                    _ = shutdown.changed() => {}
                }
            }
            debug!("decayer stopped");
        })
    }
}

impl Inner {
    fn is_protected_any(&self, peer_id: &PeerId) -> bool {
        self.protected
            .lock()
            .get(peer_id)
            .is_some_and(|tags| !tags.is_empty())
    }

    /// Pick the connections to close from a single snapshot of the peer table.
    fn select_victims(&self, now: Instant) -> Option<Vec<(PeerId, ConnectionId)>> {
        let protected = self.protected.lock();
        let mut table = self.peers.write();

        let low_water = self.config.low_water;
        if table.connections <= low_water {
            return None;
        }

        let grace = self.config.grace_period;
        table
            .peers
            .retain(|_, info| !(info.temp && now.saturating_duration_since(info.first_seen) > grace));

        let mut candidates: Vec<(&PeerId, &PeerInfo)> = table
            .peers
            .iter()
            .filter(|(peer_id, info)| {
                !info.conns.is_empty()
                    && !protected.get(*peer_id).is_some_and(|tags| !tags.is_empty())
                    && now.saturating_duration_since(info.first_seen) >= grace
            })
            .collect();

        // lowest weight first, then fewest open streams, then longest idle
        candidates
            .sort_by_key(|(_, info)| (info.value(), info.open_streams(), info.longest_idle()));

        let mut target = table.connections - low_water;
        let mut victims = Vec::new();
        for (peer_id, info) in candidates {
            if target == 0 {
                break;
            }
            let mut conns: Vec<_> = info.conns.iter().collect();
            conns.sort_by_key(|(_, record)| record.opened_at);
            for (connection_id, _) in conns {
                victims.push((*peer_id, *connection_id));
            }
            target = target.saturating_sub(info.conns.len());
        }

        Some(victims)
    }

    fn trim(&self, ctx: &TrimContext) -> TrimReport {
        if self.closed.load(Ordering::Acquire) {
            return TrimReport::Skipped(TrimSkip::Closed);
        }

        let _running = self.trim_lock.lock();
        let now = Instant::now();

        if let Some(last) = *self.last_trim.lock() {
            if now.saturating_duration_since(last) < self.config.silence_period {
                trace!("trim skipped, within silence period");
                return TrimReport::Skipped(TrimSkip::Silenced);
            }
        }

        let Some(victims) = self.select_victims(now) else {
            return TrimReport::Skipped(TrimSkip::BelowLowWater);
        };
        *self.last_trim.lock() = Some(now);
        self.metrics.trim_runs_total.increment(1);

        let selected = victims.len();
        let mut closed = 0;
        let mut cancelled = false;
        for (peer_id, connection_id) in victims {
            if ctx.is_cancelled() {
                cancelled = true;
                break;
            }
            debug!(%peer_id, ?connection_id, "closing connection due to trim");
            self.closer.close_connection(peer_id, connection_id);
            closed += 1;
        }
        self.metrics.trimmed_connections_total.increment(closed as u64);

        if cancelled {
            warn!(selected, closed, "trim cancelled");
        } else if closed > 0 {
            info!(closed, "trimmed connections");
        }

        TrimReport::Trimmed {
            selected,
            closed,
            cancelled,
        }
    }

    fn tick(&self, now: Instant) {
        let mut tags = self.decaying_tags.lock();
        let mut due: Vec<(&String, &mut TagState)> = tags
            .iter_mut()
            .filter(|(_, tag)| tag.next_tick <= now)
            .collect();
        if due.is_empty() {
            return;
        }

        let mut table = self.peers.write();
        for (name, tag) in due.iter_mut() {
            for info in table.peers.values_mut() {
                let remove = match info.decaying.get_mut(*name) {
                    Some(value) => {
                        let (after, remove) = (tag.decay)(&*value, now);
                        value.value = after;
                        remove
                    }
                    None => false,
                };
                if remove {
                    info.decaying.remove(*name);
                }
            }

            tag.next_tick += tag.interval;
            if tag.next_tick <= now {
                tag.next_tick = now + tag.interval;
            }
            trace!(tag = %name, "decayed tag");
        }
    }

    pub(crate) fn bump_decaying(
        &self,
        name: &str,
        peer_id: &PeerId,
        delta: i64,
    ) -> Result<(), ConnManagerError> {
        let tags = self.decaying_tags.lock();
        let Some(tag) = tags.get(name) else {
            return Err(ConnManagerError::TagClosed {
                name: name.to_string(),
            });
        };

        let now = Instant::now();
        let mut table = self.peers.write();
        let info = table
            .peers
            .entry(*peer_id)
            .or_insert_with(|| PeerInfo::new(now, true));
        let value = info
            .decaying
            .entry(name.to_string())
            .or_insert_with(|| DecayingValue {
                tag: name.to_string(),
                peer_id: *peer_id,
                added: now,
                last_visit: now,
                value: 0,
            });
        let next = (tag.bump)(&*value, delta);
        value.value = next;
        value.last_visit = now;
        Ok(())
    }

    pub(crate) fn remove_decaying(
        &self,
        name: &str,
        peer_id: &PeerId,
    ) -> Result<(), ConnManagerError> {
        let tags = self.decaying_tags.lock();
        if !tags.contains_key(name) {
            return Err(ConnManagerError::TagClosed {
                name: name.to_string(),
            });
        }
        if let Some(info) = self.peers.write().peers.get_mut(peer_id) {
            info.decaying.remove(name);
        }
        Ok(())
    }

    pub(crate) fn close_decaying_tag(&self, name: &str) {
        let mut tags = self.decaying_tags.lock();
        tags.remove(name);
        for info in self.peers.write().peers.values_mut() {
            info.decaying.remove(name);
        }
        debug!(tag = %name, "decaying tag closed");
    }
}

impl ConnManager for BasicConnManager {
    fn tag_peer(&self, peer_id: &PeerId, tag: &str, weight: i64) {
        let now = Instant::now();
        let mut table = self.inner.peers.write();
        table
            .peers
            .entry(*peer_id)
            .or_insert_with(|| PeerInfo::new(now, true))
            .tags
            .insert(tag.to_string(), weight);
    }

    fn untag_peer(&self, peer_id: &PeerId, tag: &str) {
        let mut table = self.inner.peers.write();
        match table.peers.get_mut(peer_id) {
            Some(info) => {
                info.tags.remove(tag);
            }
            None => trace!(%peer_id, tag, "untag of unknown peer"),
        }
    }

    fn upsert_tag(&self, peer_id: &PeerId, tag: &str, upsert: &dyn Fn(i64) -> i64) {
        let now = Instant::now();
        let mut table = self.inner.peers.write();
        let info = table
            .peers
            .entry(*peer_id)
            .or_insert_with(|| PeerInfo::new(now, true));
        let current = info.tags.get(tag).copied().unwrap_or_default();
        info.tags.insert(tag.to_string(), upsert(current));
    }

    fn tag_info(&self, peer_id: &PeerId) -> Option<TagInfo> {
        let table = self.inner.peers.read();
        let info = table.peers.get(peer_id)?;

        let mut tags = info.tags.clone();
        for (name, value) in &info.decaying {
            tags.insert(name.clone(), value.value);
        }

        Some(TagInfo {
            first_seen: info.first_seen,
            value: info.value(),
            tags,
            conns: info
                .conns
                .values()
                .map(|record| (record.remote_addr.clone(), record.opened_at))
                .collect(),
        })
    }

    fn trim_open_conns(&self, ctx: &TrimContext) -> TrimReport {
        self.inner.trim(ctx)
    }

    fn protect(&self, peer_id: &PeerId, tag: &str) {
        self.inner
            .protected
            .lock()
            .entry(*peer_id)
            .or_default()
            .insert(tag.to_string());
    }

    fn unprotect(&self, peer_id: &PeerId, tag: &str) -> bool {
        let mut protected = self.inner.protected.lock();
        let Some(tags) = protected.get_mut(peer_id) else {
            return false;
        };
        let was_protected = tags.remove(tag);
        if tags.is_empty() {
            protected.remove(peer_id);
        }
        was_protected
    }

    fn is_protected(&self, peer_id: &PeerId, tag: &str) -> bool {
        self.inner
            .protected
            .lock()
            .get(peer_id)
            .is_some_and(|tags| tags.contains(tag))
    }

    fn is_protected_any(&self, peer_id: &PeerId) -> bool {
        self.inner.is_protected_any(peer_id)
    }

    fn get_info(&self) -> ConnManagerInfo {
        let table = self.inner.peers.read();
        ConnManagerInfo {
            low_water: self.inner.config.low_water,
            high_water: self.inner.config.high_water,
            grace_period: self.inner.config.grace_period,
            silence_period: self.inner.config.silence_period,
            last_trim: *self.inner.last_trim.lock(),
            connections: table.connections,
            peers: table.peers.len(),
        }
    }

    fn close(&self) -> Result<(), ConnManagerError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(ConnManagerError::AlreadyClosed);
        }
        self.inner.shutdown_tx.send_replace(true);
        self.inner.decaying_tags.lock().clear();
        info!("connection manager closed");
        Ok(())
    }
}

impl Decayer for BasicConnManager {
    fn register_decaying_tag(
        &self,
        name: &str,
        interval: Duration,
        decay: DecayFn,
        bump: BumpFn,
    ) -> Result<DecayingTag, ConnManagerError> {
        if self.is_closed() {
            return Err(ConnManagerError::Closed);
        }

        let resolution = self.inner.config.decay_resolution;
        let mut interval = interval;
        if interval < resolution {
            warn!(
                tag = name,
                ?interval,
                ?resolution,
                "decay interval below resolution, raising to resolution"
            );
            interval = resolution;
        }
        if !resolution.is_zero() && interval.as_nanos() % resolution.as_nanos() != 0 {
            warn!(
                tag = name,
                ?interval,
                ?resolution,
                "decay interval is not a multiple of the resolution, decay will be imprecise"
            );
        }

        let mut tags = self.inner.decaying_tags.lock();
        if tags.contains_key(name) {
            return Err(ConnManagerError::DuplicateDecayingTag {
                name: name.to_string(),
            });
        }
        tags.insert(
            name.to_string(),
            TagState {
                interval,
                next_tick: Instant::now() + interval,
                decay,
                bump,
            },
        );
        debug!(tag = name, ?interval, "registered decaying tag");

        Ok(DecayingTag::new(
            name.to_string(),
            interval,
            Arc::clone(&self.inner),
        ))
    }
}

impl Notifiee for BasicConnManager {
    fn listen(&self, addr: &Multiaddr) {
        debug!(%addr, "listening");
    }

    fn listen_close(&self, addr: &Multiaddr) {
        debug!(%addr, "stopped listening");
    }

    fn connected(&self, conn: &ConnectionInfo) {
        let now = Instant::now();
        let connections = {
            let mut guard = self.inner.peers.write();
            let table = &mut *guard;
            let info = table
                .peers
                .entry(conn.peer_id)
                .or_insert_with(|| PeerInfo::new(now, false));
            if info.temp {
                info.temp = false;
                info.first_seen = now;
            }
            let record = ConnRecord::new(now, conn.remote_addr.clone());
            if info.conns.insert(conn.connection_id, record).is_none() {
                table.connections += 1;
            }
            table.connections
        };
        self.inner.metrics.connected_total.increment(1);
        trace!(peer_id = %conn.peer_id, connections, "connection registered");

        if connections > self.inner.config.high_water {
            debug!(
                connections,
                high_water = self.inner.config.high_water,
                "above high water mark, trimming"
            );
            self.trim_open_conns(&TrimContext::background());
        }
    }

    fn disconnected(&self, conn: &ConnectionInfo) {
        let mut guard = self.inner.peers.write();
        let table = &mut *guard;
        let Some(info) = table.peers.get_mut(&conn.peer_id) else {
            trace!(peer_id = %conn.peer_id, "disconnect of unknown peer");
            return;
        };
        if info.conns.remove(&conn.connection_id).is_none() {
            trace!(peer_id = %conn.peer_id, "disconnect of unknown connection");
            return;
        }
        table.connections = table.connections.saturating_sub(1);
        if info.conns.is_empty() {
            table.peers.remove(&conn.peer_id);
        }
        self.inner.metrics.disconnected_total.increment(1);
    }

    fn opened_stream(&self, stream: &StreamInfo) {
        if let Some(record) = self
            .inner
            .peers
            .write()
            .peers
            .get_mut(&stream.peer_id)
            .and_then(|info| info.conns.get_mut(&stream.connection_id))
        {
            record.stream_opened();
        }
    }

    fn closed_stream(&self, stream: &StreamInfo) {
        let now = Instant::now();
        if let Some(record) = self
            .inner
            .peers
            .write()
            .peers
            .get_mut(&stream.peer_id)
            .and_then(|info| info.conns.get_mut(&stream.connection_id))
        {
            record.stream_closed(now);
        }
    }
}
