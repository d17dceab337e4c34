//! # Goal Client
//!
//! Publishes navigation goals to the motion planner over zmq. Each message is `goal ` followed by
//! the JSON encoded [`NavGoal`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Mutex, PoisonError};

use comms_if::{
    nav::NavGoal,
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
};
use log::warn;

use crate::goal_dispatcher::{GoalPublishError, GoalPublisher};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Topic prefix of goal messages.
pub const GOAL_TOPIC: &str = "goal";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Goal publisher
pub struct GoalClient {
    // zmq sockets are not `Sync`, so the socket is shared between HTTP handlers through a mutex
    socket: Mutex<MonitoredSocket>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum GoalClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the goal: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the goal: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalClient {
    /// Create a new goal client bound to the goal endpoint.
    ///
    /// This function does not wait for the planner to connect.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, GoalClientError> {
        let socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions::publisher(),
            &params.goal_endpoint,
        )
        .map_err(GoalClientError::SocketError)?;

        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Send a goal to the planner.
    pub fn send(&self, goal: &NavGoal) -> Result<(), GoalClientError> {
        let goal_str = serde_json::to_string(goal).map_err(GoalClientError::SerializationError)?;

        let socket = self.socket.lock().unwrap_or_else(PoisonError::into_inner);

        if !socket.connected() {
            warn!(
                "No planner connected, goal {} will likely be lost",
                goal.goal_id
            );
        }

        socket
            .send(&format!("{} {}", GOAL_TOPIC, goal_str), 0)
            .map_err(GoalClientError::SendError)
    }
}

impl GoalPublisher for GoalClient {
    fn publish(&self, goal: &NavGoal) -> Result<(), GoalPublishError> {
        self.send(goal)
            .map_err(|e| GoalPublishError(e.to_string()))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
