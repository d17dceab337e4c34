//! # Goal Dispatcher
//!
//! Turns an operator's choice of route and waypoint index into a [`NavGoal`] and hands it to the
//! motion planner through a [`GoalPublisher`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use chrono::Utc;
use comms_if::nav::{NavGoal, Waypoint};
use log::{info, warn};

use crate::route_catalog::RouteCatalog;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Transport used to submit goals to the motion planner.
///
/// Publishing is fire-and-forget, an `Ok` only means the goal was handed to the transport.
pub trait GoalPublisher: Send + Sync {
    fn publish(&self, goal: &NavGoal) -> Result<(), GoalPublishError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Failure of the goal transport.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct GoalPublishError(pub String);

pub struct GoalDispatcher {
    catalog: Arc<RouteCatalog>,
    publisher: Arc<dyn GoalPublisher>,
    frame_id: String,
    goal_counter: AtomicU64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Route \"{0}\" does not exist")]
    UnknownRoute(String),

    #[error("Waypoint index {index} is out of range for route \"{route}\" ({len} waypoints)")]
    IndexOutOfRange { route: String, index: i64, len: usize },

    #[error("Could not publish the goal: {0}")]
    PublishFailed(GoalPublishError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl GoalDispatcher {
    pub fn new(
        catalog: Arc<RouteCatalog>,
        publisher: Arc<dyn GoalPublisher>,
        frame_id: &str,
    ) -> Self {
        Self {
            catalog,
            publisher,
            frame_id: String::from(frame_id),
            goal_counter: AtomicU64::new(0),
        }
    }

    /// Submit the waypoint at `index` in `route_name` as a navigation goal.
    ///
    /// Nothing is published if the route or index is invalid. On success the selected waypoint is
    /// returned.
    pub fn submit_goal(&self, route_name: &str, index: i64) -> Result<Waypoint, DispatchError> {
        let (len, waypoint) = self
            .catalog
            .lookup(route_name, index)
            .ok_or_else(|| DispatchError::UnknownRoute(String::from(route_name)))?;

        let waypoint = waypoint.ok_or_else(|| DispatchError::IndexOutOfRange {
            route: String::from(route_name),
            index,
            len,
        })?;

        let goal = self.build_goal(&waypoint);

        match self.publisher.publish(&goal) {
            Ok(()) => {
                info!(
                    "Goal {} sent: route \"{}\" waypoint {} at ({}, {}, {})",
                    goal.goal_id, route_name, index, waypoint.x, waypoint.y, waypoint.z
                );
                Ok(waypoint)
            }
            Err(e) => {
                warn!("Goal {} could not be published: {}", goal.goal_id, e);
                Err(DispatchError::PublishFailed(e))
            }
        }
    }

    fn build_goal(&self, waypoint: &Waypoint) -> NavGoal {
        let stamp = Utc::now();
        let count = self.goal_counter.fetch_add(1, Ordering::Relaxed);

        NavGoal {
            goal_id: format!("goal_{}_{}", stamp.timestamp_millis(), count),
            stamp,
            frame_id: self.frame_id.clone(),
            pose: waypoint.pose(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
