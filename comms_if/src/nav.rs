//! # Navigation messages
//!
//! Geometry and goal definitions shared with the navigation stack. Field names follow the
//! navigation stack's own message layout so that they can be forwarded without renaming.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A position in free space, in meters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// An orientation in free space in quaternion form.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

/// Position and orientation of the robot, as reported by localisation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Point,
    pub orientation: Quaternion,
}

/// A single navigable target within a route.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub x: f64,
    pub y: f64,

    #[serde(default)]
    pub z: f64,

    /// Target heading at the waypoint. Identity if not given.
    #[serde(default)]
    pub orientation: Quaternion,
}

/// A navigation goal submitted to the motion planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavGoal {
    /// Unique identifier of this goal, never reused within a process.
    pub goal_id: String,

    /// UTC time at which the goal was created
    #[serde(with = "ts_milliseconds")]
    pub stamp: DateTime<Utc>,

    /// Reference frame the pose is expressed in, for example `"map"`.
    pub frame_id: String,

    /// Target pose
    pub pose: Pose,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl Quaternion {
    /// The identity rotation.
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

impl Waypoint {
    /// Build the target pose for this waypoint.
    pub fn pose(&self) -> Pose {
        Pose {
            position: Point {
                x: self.x,
                y: self.y,
                z: self.z,
            },
            orientation: self.orientation,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
