// src/sync/manager.rs

//! Session state synchronizer.
//!
//! Submits sources to the engine, waits for metadata, then keeps one timer
//! per session that folds the engine's live counters into a `SessionState`
//! and reports it to the observer. Pause/resume are simulated through the
//! engine-wide caps (see `throttle`).

use std::collections::HashSet;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::config::SyncConfig;
use crate::engine::{AddOptions, Added, Engine, EngineEvent, Source, TorrentHandle};
use crate::error::SessionError;
use crate::trackers::magnet::validate_magnet;
use crate::trackers::TrackerCache;

use super::activity::{self, TrackerSplit};
use super::messages::{send_session_event, EventSender, SessionEvent};
use super::registry::{SessionRecord, SessionRegistry};
use super::scheduler::TimerScheduler;
use super::status::{LifecycleStatus, PauseMode};
use super::throttle::{Caps, ThrottleState};
use super::tick::{apply_tick, read_metrics, TickOutcome};
use super::types::{SessionFile, SessionState};

type Result<T> = std::result::Result<T, SessionError>;

struct Inner {
    engine: Arc<dyn Engine>,
    trackers: Arc<TrackerCache>,
    registry: SessionRegistry,
    scheduler: TimerScheduler,
    // Lock order: throttle before registry
    throttle: Mutex<ThrottleState>,
    events: EventSender,
    config: SyncConfig,
    pending: AtomicUsize,
    shut_down: AtomicBool,
}

/// Cheap to clone; all clones drive the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl<'a> PendingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SessionManager {
    /// Applies the configured caps to the engine straight away.
    pub fn new(
        engine: Arc<dyn Engine>,
        trackers: Arc<TrackerCache>,
        config: SyncConfig,
        events: EventSender,
    ) -> Self {
        let configured = Caps {
            download: config.download_limit(),
            upload: config.upload_limit(),
        };
        let mut throttle = ThrottleState::new(configured);
        throttle.set_configured(engine.as_ref(), configured);

        Self {
            inner: Arc::new(Inner {
                engine,
                trackers,
                registry: SessionRegistry::new(),
                scheduler: TimerScheduler::new(),
                throttle: Mutex::new(throttle),
                events,
                config,
                pending: AtomicUsize::new(0),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    /// Submit a source and wait (bounded) for its metadata.
    ///
    /// On success the session is Active, ticking, and its id is returned.
    /// Any failure is reported once to the observer and nothing is kept.
    pub async fn submit(&self, source: Source, boost_enabled: bool) -> Result<String> {
        let _pending = PendingGuard::enter(&self.inner.pending);
        match self.try_submit(source, boost_enabled).await {
            Ok(id) => Ok(id),
            Err(err) => {
                log::error!("Sync: submission failed: {}", err);
                send_session_event(
                    &self.inner.events,
                    SessionEvent::Error {
                        id: None,
                        error: err.clone(),
                    },
                );
                Err(err)
            }
        }
    }

    async fn try_submit(&self, source: Source, boost_enabled: bool) -> Result<String> {
        let inner = &self.inner;
        inner.ensure_running()?;

        let source = match source {
            Source::Magnet(locator) => {
                validate_magnet(&locator)?;
                Source::Magnet(
                    inner
                        .trackers
                        .append_to_identifier(locator.trim(), boost_enabled)
                        .await,
                )
            }
            other => other,
        };
        let announce = inner.trackers.flatten(boost_enabled).await;
        let directory: HashSet<String> = announce.iter().cloned().collect();

        log::info!(
            "Sync: adding source with {} trackers (boost: {})",
            announce.len(),
            boost_enabled
        );
        let Added { handle, mut events } = inner
            .engine
            .add(
                source,
                AddOptions {
                    announce,
                    strategy: inner.config.strategy,
                },
            )
            .map_err(SessionError::Engine)?;

        let timeout = inner.config.metadata_timeout();
        let waited = tokio::time::timeout(timeout, wait_for_metadata(&mut events)).await;
        let failure = match waited {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(_) => Some(SessionError::MetadataTimeout(timeout)),
        };
        if let Some(err) = failure {
            inner.engine.remove(handle.as_ref());
            return Err(err);
        }

        let id = self.activate(handle, &directory, boost_enabled)?;
        self.spawn_event_watch(id.clone(), events);
        Ok(id)
    }

    /// Pending -> Active: store the record and start its timer.
    fn activate(
        &self,
        handle: Arc<dyn TorrentHandle>,
        directory: &HashSet<String>,
        boost_enabled: bool,
    ) -> Result<String> {
        let inner = &self.inner;
        if let Err(err) = inner.ensure_running() {
            inner.engine.remove(handle.as_ref());
            return Err(err);
        }
        let id = handle.info_hash();
        if inner.registry.contains(&id) {
            // The engine hands back the already-running transfer; leave it be
            return Err(SessionError::Engine(format!("session {} is already active", id)));
        }

        let length = handle.length();
        let split = TrackerSplit::from_announce(&handle.announce(), directory);
        let metrics = read_metrics(handle.as_ref(), length, false);
        let state = SessionState {
            id: id.clone(),
            name: handle.name(),
            length,
            files: handle.files().into_iter().map(SessionFile::from).collect(),
            tracker_activity: activity::estimate(&split, metrics.num_peers),
            metrics,
            status: LifecycleStatus::Active,
            boost_enabled,
            pause_mode: None,
        };
        log::info!(
            "Sync: metadata for {} ({}), {} files, {} external / {} internal trackers",
            state.name,
            id,
            state.files.len(),
            split.external.len(),
            split.internal.len()
        );

        inner.registry.insert(SessionRecord {
            state,
            handle: handle.clone(),
            split,
        });

        let weak = Arc::downgrade(inner);
        let tick_id = id.clone();
        let registered = inner
            .scheduler
            .register(&id, inner.config.tick_interval(), move || {
                match weak.upgrade() {
                    Some(inner) => inner.tick(&tick_id),
                    None => ControlFlow::Break(()),
                }
            });
        let timer = match registered {
            Ok(timer) => timer,
            Err(err) => {
                inner.registry.remove(&id);
                inner.engine.remove(handle.as_ref());
                return Err(err.into());
            }
        };
        // Shutdown may have drained everything while we were registering
        if inner.shut_down.load(Ordering::SeqCst) {
            inner.scheduler.cancel(timer.id());
            inner.registry.remove(&id);
            inner.engine.remove(handle.as_ref());
            return Err(SessionError::ShutDown);
        }
        log::debug!("Sync: {} ticking (timer generation {})", timer.id(), timer.generation());
        Ok(id)
    }

    fn spawn_event_watch(&self, id: String, mut events: mpsc::UnboundedReceiver<EngineEvent>) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                match event {
                    EngineEvent::Error(message) => {
                        log::error!("Sync: engine error for {}: {}", id, message);
                        inner.teardown_session(&id, Some(SessionError::EngineFatal(message)));
                        return;
                    }
                    EngineEvent::Warning(message) => {
                        log::warn!("Sync: engine warning for {}: {}", id, message)
                    }
                    EngineEvent::Ready => log::info!("Sync: {} is ready", id),
                    EngineEvent::Done => log::info!("Sync: {} finished downloading", id),
                    EngineEvent::Peer(addr) => log::debug!("Sync: {} connected to peer {}", id, addr),
                    EngineEvent::NoPeers(via) => log::debug!("Sync: {} found no peers via {}", id, via),
                    EngineEvent::Metadata => {}
                }
                if !inner.registry.contains(&id) {
                    return;
                }
            }
        });
    }

    /// Active -> Paused. Pausing an already paused session is a no-op.
    pub fn pause(&self, id: &str) -> Result<()> {
        let inner = &self.inner;
        let mut throttle = inner.throttle.lock();
        match inner.status_of(id)? {
            LifecycleStatus::Active => {}
            LifecycleStatus::Paused => return Ok(()),
            status => return Err(invalid(id, "pause", status)),
        }
        throttle.pause(inner.engine.as_ref(), id);
        let snapshot = inner.registry.with_record(id, |record| {
            record.state.status = LifecycleStatus::Paused;
            record.state.pause_mode = Some(PauseMode::GlobalThrottle);
            record.state.metrics.time_remaining = f64::INFINITY;
            record.state.clone()
        });
        drop(throttle);
        log::info!("Sync: paused {} (engine-wide throttle)", id);
        if let Some(snapshot) = snapshot {
            send_session_event(&inner.events, SessionEvent::Snapshot(snapshot));
        }
        Ok(())
    }

    /// Paused -> Active. Resuming an active session is a no-op.
    pub fn resume(&self, id: &str) -> Result<()> {
        let inner = &self.inner;
        let mut throttle = inner.throttle.lock();
        match inner.status_of(id)? {
            LifecycleStatus::Paused => {}
            LifecycleStatus::Active => return Ok(()),
            status => return Err(invalid(id, "resume", status)),
        }
        let caps = throttle.release(inner.engine.as_ref(), id);
        let snapshot = inner.registry.with_record(id, |record| {
            record.state.status = LifecycleStatus::Active;
            record.state.pause_mode = None;
            record.state.clone()
        });
        drop(throttle);
        log::info!(
            "Sync: resumed {} (download {}, upload {})",
            id,
            caps.download,
            caps.upload
        );
        if let Some(snapshot) = snapshot {
            send_session_event(&inner.events, SessionEvent::Snapshot(snapshot));
        }
        Ok(())
    }

    /// Remove a session: stop its timer, drop it from the engine, forget any
    /// saved caps.
    pub fn delete(&self, id: &str) -> Result<()> {
        if !self.inner.teardown_session(id, None) {
            return Err(SessionError::UnknownSession(id.to_string()));
        }
        Ok(())
    }

    /// Add directory trackers to a live session. Returns how many were new.
    pub async fn add_trackers(&self, id: &str, include_unsafe: bool) -> Result<usize> {
        let inner = &self.inner;
        let action = if include_unsafe { "boost" } else { "add trackers" };
        let status = inner.status_of(id)?;
        if status.is_terminal() {
            return Err(invalid(id, action, status));
        }
        let handle = inner
            .registry
            .handle(id)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))?;
        let added = inner.trackers.inject_into(handle.as_ref(), include_unsafe).await;
        let directory: HashSet<String> = inner.trackers.flatten(include_unsafe).await.into_iter().collect();
        let announce = handle.announce();
        inner.registry.with_record(id, |record| {
            let mut split = TrackerSplit::from_announce(&announce, &directory);
            // Keep endpoints counted as external before, even if the
            // directory has since been refreshed without them
            let previous: HashSet<&String> = record.split.external.iter().collect();
            let (kept, internal): (Vec<String>, Vec<String>) = split
                .internal
                .into_iter()
                .partition(|endpoint| previous.contains(endpoint));
            split.external.extend(kept);
            split.internal = internal;
            record.split = split;
            if include_unsafe {
                record.state.boost_enabled = true;
            }
        });
        Ok(added)
    }

    /// Turn on boost for a live session: inject the unsafe tiers too.
    pub async fn boost(&self, id: &str) -> Result<usize> {
        let added = self.add_trackers(id, true).await?;
        log::info!("Sync: boost enabled for {} ({} trackers added)", id, added);
        Ok(added)
    }

    /// Change the user-configured caps. Applied now unless a session is
    /// paused, in which case they take effect once the last paused session
    /// is resumed, completes or goes away.
    pub fn update_limits(&self, caps: Caps) {
        let inner = &self.inner;
        inner.throttle.lock().set_configured(inner.engine.as_ref(), caps);
    }

    pub fn current_caps(&self) -> Caps {
        self.inner.throttle.lock().current()
    }

    pub fn session(&self, id: &str) -> Option<SessionState> {
        self.inner.registry.snapshot(id)
    }

    pub fn sessions(&self) -> Vec<SessionState> {
        self.inner.registry.snapshots()
    }

    pub fn is_ticking(&self, id: &str) -> bool {
        self.inner.scheduler.is_registered(id)
    }

    /// Submissions still waiting for metadata.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Stop every timer, release the engine and the tracker cache.
    /// Submissions still waiting for metadata fail with `ShutDown`.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        inner.shut_down.store(true, Ordering::SeqCst);
        inner.scheduler.cancel_all();
        let records = inner.registry.drain();
        log::info!(
            "Sync: shutting down with {} sessions ({} pending)",
            records.len(),
            inner.pending.load(Ordering::SeqCst)
        );
        inner.throttle.lock().clear();
        inner.engine.destroy();
        inner.trackers.teardown().await;
    }
}

impl Inner {
    fn ensure_running(&self) -> Result<()> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(SessionError::ShutDown);
        }
        Ok(())
    }

    fn status_of(&self, id: &str) -> Result<LifecycleStatus> {
        self.registry
            .with_record(id, |record| record.state.status)
            .ok_or_else(|| SessionError::UnknownSession(id.to_string()))
    }

    fn tick(&self, id: &str) -> ControlFlow<()> {
        // Same lock order as pause/resume, so a tick never races a transition
        let mut throttle = self.throttle.lock();
        let ticked = self.registry.with_record(id, |record| {
            let outcome = apply_tick(record);
            (outcome, record.state.clone())
        });
        if let Some((TickOutcome::Completed, _)) = &ticked {
            // A session finishing while paused must not keep the engine clamped
            throttle.release(self.engine.as_ref(), id);
        }
        drop(throttle);
        match ticked {
            None => ControlFlow::Break(()),
            Some((TickOutcome::Continue, snapshot)) => {
                send_session_event(&self.events, SessionEvent::Snapshot(snapshot));
                ControlFlow::Continue(())
            }
            Some((TickOutcome::Completed, snapshot)) => {
                log::info!("Sync: {} completed", snapshot.name);
                send_session_event(&self.events, SessionEvent::Snapshot(snapshot.clone()));
                send_session_event(&self.events, SessionEvent::Completed(snapshot));
                ControlFlow::Break(())
            }
        }
    }

    /// Shared exit path for delete and mid-flight errors. Returns `false` if
    /// the session was not known.
    fn teardown_session(&self, id: &str, error: Option<SessionError>) -> bool {
        self.scheduler.cancel(id);
        let mut throttle = self.throttle.lock();
        let Some(record) = self.registry.remove(id) else {
            return false;
        };
        self.engine.remove(record.handle.as_ref());
        throttle.release(self.engine.as_ref(), id);
        drop(throttle);

        let event = match error {
            Some(error) => SessionEvent::Error {
                id: Some(id.to_string()),
                error,
            },
            None => {
                log::info!("Sync: removed {}", id);
                SessionEvent::Removed { id: id.to_string() }
            }
        };
        send_session_event(&self.events, event);
        true
    }
}

fn invalid(id: &str, action: &'static str, status: LifecycleStatus) -> SessionError {
    SessionError::InvalidTransition {
        id: id.to_string(),
        action,
        status,
    }
}

async fn wait_for_metadata(events: &mut mpsc::UnboundedReceiver<EngineEvent>) -> Result<()> {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Metadata => return Ok(()),
            EngineEvent::Error(message) => return Err(SessionError::EngineFatal(message)),
            EngineEvent::Warning(message) => log::warn!("Sync: engine warning: {}", message),
            EngineEvent::Peer(addr) => log::debug!("Sync: connected to peer {}", addr),
            EngineEvent::NoPeers(via) => log::debug!("Sync: no peers found via {}", via),
            EngineEvent::Ready | EngineEvent::Done => {}
        }
    }
    Err(SessionError::EngineFatal(
        "engine closed the event stream before metadata".to_string(),
    ))
}
