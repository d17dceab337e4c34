//! # Telemetry Client
//!
//! Subscribes to the telemetry channels of the navigation stack and keeps the
//! [`TelemetryStore`] up to date.
//!
//! Each channel has its own socket and background thread, so a slow or silent channel never holds
//! up another. Messages which cannot be parsed are logged and dropped, leaving the previous value
//! in the store.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    telem::{TelemMsg, TelemParseError, TelemTopic},
};
use log::{debug, error, info, warn};

use crate::telem_store::TelemetryStore;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct TelemClient {
    bg_jhs: Vec<(TelemTopic, JoinHandle<()>)>,
    bg_run: Arc<AtomicBool>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TelemClientError {
    #[error("Socket error on the {0} channel: {1}")]
    SocketError(TelemTopic, MonitoredSocketError),

    #[error("Could not parse the message: {0}")]
    ParseError(TelemParseError),

    #[error("Received a {received} message on the {expected} channel")]
    WrongTopic {
        expected: TelemTopic,
        received: TelemTopic,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemClient {
    /// Subscribe to all telemetry channels and start the receiving threads.
    ///
    /// This function does not wait for the publishers to connect.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        store: Arc<TelemetryStore>,
    ) -> Result<Self, TelemClientError> {
        // Built up front so that threads started before a failure are stopped when it is dropped
        let mut client = Self {
            bg_jhs: Vec::with_capacity(TelemTopic::ALL.len()),
            bg_run: Arc::new(AtomicBool::new(true)),
        };

        for &topic in TelemTopic::ALL.iter() {
            let socket = MonitoredSocket::new(
                ctx,
                zmq::SUB,
                SocketOptions::subscriber(),
                endpoint(params, topic),
            )
            .map_err(|e| TelemClientError::SocketError(topic, e))?;
            socket
                .subscribe(topic)
                .map_err(|e| TelemClientError::SocketError(topic, e))?;

            let bg_run_clone = client.bg_run.clone();
            let store_clone = store.clone();

            client.bg_jhs.push((
                topic,
                thread::spawn(move || bg_thread(socket, topic, bg_run_clone, store_clone)),
            ));

            info!(
                "Subscribed to {} telemetry on {}",
                topic,
                endpoint(params, topic)
            );
        }

        Ok(client)
    }

    /// Stop and join all receiving threads.
    pub fn stop(mut self) {
        self.join_all();
    }

    fn join_all(&mut self) {
        self.bg_run.store(false, Ordering::Relaxed);

        for (topic, jh) in self.bg_jhs.drain(..) {
            if jh.join().is_err() {
                error!("The {} telemetry thread panicked", topic);
            }
        }
    }
}

impl Drop for TelemClient {
    fn drop(&mut self) {
        self.join_all();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a message received on the `expected` channel and store it.
pub fn handle_message(
    store: &TelemetryStore,
    expected: TelemTopic,
    msg: &str,
) -> Result<(), TelemClientError> {
    let telem = TelemMsg::from_wire(msg).map_err(TelemClientError::ParseError)?;

    if telem.topic() != expected {
        return Err(TelemClientError::WrongTopic {
            expected,
            received: telem.topic(),
        });
    }

    store.apply(telem);

    Ok(())
}

fn endpoint(params: &NetParams, topic: TelemTopic) -> &str {
    match topic {
        TelemTopic::Pose => &params.pose_endpoint,
        TelemTopic::Map => &params.map_endpoint,
        TelemTopic::PointCloud => &params.point_cloud_endpoint,
    }
}

/// Background thread, updates the store when the publisher sends something new.
fn bg_thread(
    socket: MonitoredSocket,
    topic: TelemTopic,
    run: Arc<AtomicBool>,
    store: Arc<TelemetryStore>,
) {
    while run.load(Ordering::Relaxed) {
        let msg = match socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                warn!("Non UTF-8 message on the {} channel", topic);
                continue;
            }
            Err(zmq::Error::EAGAIN) => continue,
            Err(e) => {
                error!("Error receiving message on the {} channel: {:?}", topic, e);
                break;
            }
        };

        if let Err(e) = handle_message(&store, topic, &msg) {
            warn!("Dropping {} telemetry: {}", topic, e);
        }
    }

    debug!("{} telemetry thread stopped", topic);
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
