//! # Bridge Executable Parameters
//!
//! This module provides parameters for the bridge executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::point_cloud::DEFAULT_FAN_OUT_CAP;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeExecParams {
    /// Address the HTTP and WebSocket server binds to
    pub http_bind: SocketAddr,

    /// Directory holding the web client, served at `/`. No static files are served if not set.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,

    /// Reference frame attached to navigation goals
    pub goal_frame_id: String,

    /// Telemetry streaming parameters
    #[serde(default)]
    pub stream: StreamParams,
}

/// Parameters of the telemetry stream sent to each client.
#[derive(Debug, Copy, Clone, Deserialize)]
#[serde(default)]
pub struct StreamParams {
    /// Period between two snapshots sent to the same client
    pub tick_period_ms: u64,

    /// Maximum number of point cloud points included in one snapshot
    pub fan_out_cap: usize,

    /// Number of snapshots which may be queued for a client before ticks are dropped
    pub queue_capacity: usize,

    /// Number of consecutive dropped ticks after which a client is disconnected
    pub max_consec_dropped_ticks: u32,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("stream.tick_period_ms must be greater than zero")]
    ZeroTickPeriod,

    #[error("stream.queue_capacity must be greater than zero")]
    ZeroQueueCapacity,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BridgeExecParams {
    /// Check the parameters are usable, to be called once after loading.
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.stream.validate()
    }
}

impl StreamParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.tick_period_ms == 0 {
            return Err(ParamsError::ZeroTickPeriod);
        }
        if self.queue_capacity == 0 {
            return Err(ParamsError::ZeroQueueCapacity);
        }

        Ok(())
    }

    /// Period between ticks, never shorter than 1 ms.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms.max(1))
    }
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            tick_period_ms: 2000,
            fan_out_cap: DEFAULT_FAN_OUT_CAP,
            queue_capacity: 8,
            max_consec_dropped_ticks: 5,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
