//! # Telemetry messages
//!
//! Telemetry arrives from the navigation stack on three independent topics (`pose`, `map` and
//! `point_cloud`). Each message on the wire is the topic name, a single space, and the JSON
//! encoded payload, for example `pose {"position": ..., "orientation": ...}`.
//!
//! The bridge combines the latest value of each topic into a [`TelemetrySnapshot`] which is
//! streamed to web clients.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{convert::TryFrom, fmt, str::FromStr, sync::Arc};

use base64::DecodeError;
use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::nav::Pose;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A 2D occupancy grid map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// Width of the map in cells
    pub width: u32,

    /// Height of the map in cells
    pub height: u32,

    /// Map resolution in meters/cell
    pub resolution: f32,

    /// Real-world pose of cell (0, 0)
    pub origin: Pose,

    /// Occupancy values in row-major order starting at (0, 0). Values are in the range [0, 100],
    /// unknown is -1.
    pub data: Vec<i8>,
}

/// Header metadata of a point cloud.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudHeader {
    /// Number of points in a row
    pub width: u32,

    /// Number of rows, 1 for unordered clouds
    pub height: u32,

    /// Length of a single point in bytes
    pub point_step: u32,

    /// Length of a row in bytes
    pub row_step: u32,

    /// Acquisition time of the cloud
    #[serde(with = "ts_milliseconds")]
    pub stamp: DateTime<Utc>,

    /// Sensor frame the points are expressed in
    pub frame_id: String,
}

/// A point cloud as published by the navigation stack.
///
/// The packed point data is encoded in base64. Each point is `point_step` bytes long and starts
/// with the x, y and z coordinates as little-endian 32 bit floats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudMsg {
    #[serde(flatten)]
    pub header: PointCloudHeader,

    /// Packed point data, encoded in base64
    pub b64_data: String,
}

/// A point cloud whose data has been decoded from base64, but whose points have not yet been
/// unpacked.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPointCloud {
    pub header: PointCloudHeader,

    /// Packed point data
    pub data: Vec<u8>,
}

/// A single point in a point cloud. Coordinates are always finite, points without a valid return
/// are dropped when decoding.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A point cloud with unpacked points, as streamed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointCloudFrame {
    #[serde(flatten)]
    pub header: PointCloudHeader,

    /// The unpacked points. This may be fewer than `header.width` points, as clouds are truncated
    /// before streaming and non-finite points are skipped.
    pub points: Vec<Point3D>,
}

/// A motion sample.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdomSample {
    pub x: f64,
    pub y: f64,

    /// Heading in radians, in the range [0, 2pi)
    pub theta: f64,
}

/// The message streamed to web clients on every tick.
///
/// Fields for which no data has been received yet are `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub odom: OdomSample,

    pub pose: Option<Pose>,

    pub point_cloud: Option<Arc<PointCloudFrame>>,

    pub map: Option<Arc<OccupancyGrid>>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Telemetry topics published by the navigation stack.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TelemTopic {
    Pose,
    Map,
    PointCloud,
}

/// A telemetry message with its decoded payload.
#[derive(Debug, Clone)]
pub enum TelemMsg {
    Pose(Pose),
    Map(OccupancyGrid),
    PointCloud(RawPointCloud),
}

#[derive(Debug, thiserror::Error)]
pub enum TelemParseError {
    #[error("The message has no topic prefix")]
    MissingTopic,

    #[error("Unrecognised topic \"{0}\"")]
    UnknownTopic(String),

    #[error("Could not deserialize the {0} payload: {1}")]
    DeserializeError(TelemTopic, serde_json::Error),

    #[error("Could not decode the point cloud data from base64: {0}")]
    PointCloudDecodeError(DecodeError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemTopic {
    /// All telemetry topics
    pub const ALL: [TelemTopic; 3] = [TelemTopic::Pose, TelemTopic::Map, TelemTopic::PointCloud];

    /// The topic name used as the message prefix on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemTopic::Pose => "pose",
            TelemTopic::Map => "map",
            TelemTopic::PointCloud => "point_cloud",
        }
    }
}

impl fmt::Display for TelemTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TelemTopic {
    type Err = TelemParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pose" => Ok(TelemTopic::Pose),
            "map" => Ok(TelemTopic::Map),
            "point_cloud" => Ok(TelemTopic::PointCloud),
            _ => Err(TelemParseError::UnknownTopic(String::from(s))),
        }
    }
}

impl TelemMsg {
    /// Parse a `"<topic> <json>"` wire message.
    pub fn from_wire(msg: &str) -> Result<Self, TelemParseError> {
        let (topic_str, payload) = match msg.find(' ') {
            Some(i) => (&msg[..i], &msg[i + 1..]),
            None => return Err(TelemParseError::MissingTopic),
        };

        let topic: TelemTopic = topic_str.parse()?;

        let de_err = |e| TelemParseError::DeserializeError(topic, e);

        match topic {
            TelemTopic::Pose => Ok(TelemMsg::Pose(serde_json::from_str(payload).map_err(de_err)?)),
            TelemTopic::Map => Ok(TelemMsg::Map(serde_json::from_str(payload).map_err(de_err)?)),
            TelemTopic::PointCloud => {
                let msg: PointCloudMsg = serde_json::from_str(payload).map_err(de_err)?;
                Ok(TelemMsg::PointCloud(RawPointCloud::try_from(msg)?))
            }
        }
    }

    /// The topic this message was published on.
    pub fn topic(&self) -> TelemTopic {
        match self {
            TelemMsg::Pose(_) => TelemTopic::Pose,
            TelemMsg::Map(_) => TelemTopic::Map,
            TelemMsg::PointCloud(_) => TelemTopic::PointCloud,
        }
    }
}

impl TryFrom<PointCloudMsg> for RawPointCloud {
    type Error = TelemParseError;

    fn try_from(msg: PointCloudMsg) -> Result<Self, Self::Error> {
        let data = base64::decode(&msg.b64_data).map_err(TelemParseError::PointCloudDecodeError)?;

        Ok(Self {
            header: msg.header,
            data,
        })
    }
}

impl From<&RawPointCloud> for PointCloudMsg {
    fn from(raw: &RawPointCloud) -> Self {
        Self {
            header: raw.header.clone(),
            b64_data: base64::encode(&raw.data),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::TimeZone;

    fn header(width: u32) -> PointCloudHeader {
        PointCloudHeader {
            width,
            height: 1,
            point_step: 16,
            row_step: 16 * width,
            stamp: Utc.timestamp_millis_opt(42).unwrap(),
            frame_id: String::from("lidar"),
        }
    }

    #[test]
    fn test_parse_pose() {
        let msg = TelemMsg::from_wire(
            r#"pose {"position": {"x": 1.0, "y": 2.0, "z": 0.0}, "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}}"#,
        )
        .unwrap();

        match msg {
            TelemMsg::Pose(p) => assert_eq!(p.position.y, 2.0),
            m => panic!("Expected pose, got {:?}", m),
        }
    }

    #[test]
    fn test_parse_point_cloud() {
        let raw = RawPointCloud {
            header: header(1),
            data: vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16],
        };
        let wire = format!(
            "point_cloud {}",
            serde_json::to_string(&PointCloudMsg::from(&raw)).unwrap()
        );

        match TelemMsg::from_wire(&wire).unwrap() {
            TelemMsg::PointCloud(r) => assert_eq!(r, raw),
            m => panic!("Expected point cloud, got {:?}", m),
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            TelemMsg::from_wire("pose"),
            Err(TelemParseError::MissingTopic)
        ));
        assert!(matches!(
            TelemMsg::from_wire("odom {}"),
            Err(TelemParseError::UnknownTopic(_))
        ));
        assert!(matches!(
            TelemMsg::from_wire("map {\"width\": 1}"),
            Err(TelemParseError::DeserializeError(TelemTopic::Map, _))
        ));

        let bad_b64 = serde_json::json!({
            "width": 1, "height": 1, "point_step": 12, "row_step": 12,
            "stamp": 0, "frame_id": "lidar", "b64_data": "not base64!"
        });
        assert!(matches!(
            TelemMsg::from_wire(&format!("point_cloud {}", bad_b64)),
            Err(TelemParseError::PointCloudDecodeError(_))
        ));
    }

    #[test]
    fn test_snapshot_nulls() {
        let snapshot = TelemetrySnapshot {
            odom: OdomSample {
                x: 1.0,
                y: 2.0,
                theta: 3.0,
            },
            pose: None,
            point_cloud: Some(Arc::new(PointCloudFrame {
                header: header(4),
                points: vec![Point3D {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                }],
            })),
            map: None,
        };

        let val = serde_json::to_value(&snapshot).unwrap();
        assert!(val["pose"].is_null());
        assert!(val["map"].is_null());
        assert_eq!(val["odom"]["theta"], 3.0);
        assert_eq!(val["point_cloud"]["width"], 4);
        assert_eq!(val["point_cloud"]["points"][0]["z"], 3.0);
    }
}
