//! # Connection Manager
//!
//! Tracks the streaming connections of web clients and drives the telemetry ticks of each one.
//!
//! A connection moves through `Connecting -> Open -> Closed`. Opening a connection starts its own
//! tick task, which sends a [`TelemetrySnapshot`](comms_if::telem::TelemetrySnapshot) to that
//! connection's outbound queue every tick period. Ticks of different connections are independent
//! of one another, a failure to deliver to one client only ever closes that client.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use log::{debug, error, info, warn};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{params::StreamParams, snapshot::SnapshotBuilder, telem_store::TelemetryStore};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Identifier of a connection, unique for the life of the manager.
pub type ConnId = u64;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle to the connection manager. Clones share the same set of connections.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    builder: SnapshotBuilder,
    params: StreamParams,
    conns: Mutex<HashMap<ConnId, ConnEntry>>,
    next_id: AtomicU64,

    /// Parent of every connection's cancellation token
    shutdown: CancellationToken,
}

struct ConnEntry {
    state: ConnState,
    cancel: CancellationToken,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConnState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConnError {
    #[error("Connection {0} does not exist or has been closed")]
    UnknownConnection(ConnId),

    #[error("Connection {0} is already open")]
    AlreadyOpen(ConnId),

    #[error("The connection manager has been shut down")]
    ShutDown,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ConnectionManager {
    pub fn new(store: Arc<TelemetryStore>, params: StreamParams) -> Self {
        Self {
            inner: Arc::new(Inner {
                builder: SnapshotBuilder::new(store, params.fan_out_cap),
                params,
                conns: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Register a new connection in the `Connecting` state.
    pub fn connect(&self) -> Result<ConnId, ConnError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(ConnError::ShutDown);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);

        self.inner.conns().insert(
            id,
            ConnEntry {
                state: ConnState::Connecting,
                cancel: self.inner.shutdown.child_token(),
            },
        );

        debug!("Connection {} registered", id);

        Ok(id)
    }

    /// Open a connection and start its ticks.
    ///
    /// The first snapshot is sent one tick period after opening. Returns the receiving end of the
    /// connection's outbound queue. Dropping the receiver closes the connection at its next tick.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self, id: ConnId) -> Result<mpsc::Receiver<String>, ConnError> {
        let mut conns = self.inner.conns();

        // Checked under the lock, so shutdown either sees this connection or we see it cancelled
        if self.inner.shutdown.is_cancelled() {
            return Err(ConnError::ShutDown);
        }

        let entry = conns
            .get_mut(&id)
            .ok_or(ConnError::UnknownConnection(id))?;
        if entry.state != ConnState::Connecting {
            return Err(ConnError::AlreadyOpen(id));
        }
        entry.state = ConnState::Open;

        let (tx, rx) = mpsc::channel(self.inner.params.queue_capacity.max(1));
        tokio::spawn(tick_loop(
            self.inner.clone(),
            id,
            entry.cancel.clone(),
            tx,
        ));

        let num_open = count_open(&conns);
        drop(conns);
        info!("Connection {} opened ({} open)", id, num_open);

        Ok(rx)
    }

    /// Close a connection.
    ///
    /// Once this returns the connection's tick task has been cancelled and the connection is
    /// forgotten.
    pub fn close(&self, id: ConnId) -> Result<(), ConnError> {
        let entry = self
            .inner
            .conns()
            .remove(&id)
            .ok_or(ConnError::UnknownConnection(id))?;

        entry.cancel.cancel();

        info!("Connection {} closed ({} open)", id, self.num_open());

        Ok(())
    }

    /// Get the state of a connection. Connections which have been closed, or never existed, are
    /// `Closed`.
    pub fn state(&self, id: ConnId) -> ConnState {
        self.inner
            .conns()
            .get(&id)
            .map(|e| e.state)
            .unwrap_or(ConnState::Closed)
    }

    /// Number of connections currently open.
    pub fn num_open(&self) -> usize {
        count_open(&self.inner.conns())
    }

    /// Close all connections and refuse new ones.
    pub fn shutdown(&self) {
        let mut conns = self.inner.conns();

        self.inner.shutdown.cancel();
        let num = conns.len();
        conns.clear();

        info!("Connection manager shut down, {} connections closed", num);
    }
}

impl Inner {
    fn conns(&self) -> MutexGuard<'_, HashMap<ConnId, ConnEntry>> {
        self.conns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn count_open(conns: &HashMap<ConnId, ConnEntry>) -> usize {
    conns
        .values()
        .filter(|e| e.state == ConnState::Open)
        .count()
}

/// Tick task of a single connection.
///
/// Runs until the connection is cancelled or delivery to it fails. On a delivery failure the
/// connection is removed from the manager.
async fn tick_loop(
    inner: Arc<Inner>,
    id: ConnId,
    cancel: CancellationToken,
    tx: mpsc::Sender<String>,
) {
    let period = inner.params.tick_period();
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut consec_dropped = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = interval.tick() => (),
        }

        let snapshot = inner.builder.build();
        let msg = match serde_json::to_string(&snapshot) {
            Ok(m) => m,
            Err(e) => {
                error!("Could not serialize snapshot for connection {}: {}", id, e);
                continue;
            }
        };

        // close() may have run while the snapshot was being built
        if cancel.is_cancelled() {
            return;
        }

        match tx.try_send(msg) {
            Ok(()) => consec_dropped = 0,
            Err(TrySendError::Full(_)) => {
                consec_dropped += 1;
                warn!(
                    "Connection {} is not keeping up, tick dropped ({} in a row)",
                    id, consec_dropped
                );

                if consec_dropped >= inner.params.max_consec_dropped_ticks {
                    warn!("Closing connection {}: too many dropped ticks", id);
                    break;
                }
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Connection {} receiver dropped", id);
                break;
            }
        }
    }

    if inner.conns().remove(&id).is_some() {
        info!("Connection {} torn down after delivery failure", id);
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
