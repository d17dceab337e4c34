//! # Telemetry Store
//!
//! Holds the latest value received on each telemetry channel. The store is written by the
//! [`TelemClient`](crate::telem_client::TelemClient) threads and read by the streaming and HTTP
//! sides. Values are kept behind [`Arc`]s so readers only ever copy pointers while the lock is
//! held.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use comms_if::{
    nav::Pose,
    telem::{OccupancyGrid, RawPointCloud, TelemMsg},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Default)]
pub struct TelemetryStore {
    latest: Mutex<Latest>,
}

#[derive(Default)]
struct Latest {
    pose: Option<Pose>,
    map: Option<Arc<OccupancyGrid>>,
    raw_point_cloud: Option<RawFrameRef>,

    /// Number of point clouds received so far
    cloud_seq: u64,
}

/// A raw point cloud along with the sequence number it was stored under.
///
/// The sequence number identifies a frame, two references with the same `seq` point to the same
/// data.
#[derive(Debug, Clone)]
pub struct RawFrameRef {
    pub seq: u64,
    pub frame: Arc<RawPointCloud>,
}

/// A copy of the store contents at one instant.
#[derive(Debug, Clone, Default)]
pub struct TelemState {
    pub pose: Option<Pose>,
    pub map: Option<Arc<OccupancyGrid>>,
    pub raw_point_cloud: Option<RawFrameRef>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest pose.
    pub fn update_pose(&self, pose: Pose) {
        self.lock().pose = Some(pose);
    }

    /// Replace the latest map.
    pub fn update_map(&self, map: OccupancyGrid) {
        let map = Arc::new(map);
        self.lock().map = Some(map);
    }

    /// Replace the latest point cloud, returning the sequence number it was stored under.
    pub fn update_raw_point_cloud(&self, cloud: RawPointCloud) -> u64 {
        let frame = Arc::new(cloud);

        let mut latest = self.lock();
        latest.cloud_seq += 1;
        let seq = latest.cloud_seq;
        latest.raw_point_cloud = Some(RawFrameRef { seq, frame });

        seq
    }

    /// Store a telemetry message in the matching field.
    pub fn apply(&self, msg: TelemMsg) {
        match msg {
            TelemMsg::Pose(p) => self.update_pose(p),
            TelemMsg::Map(m) => self.update_map(m),
            TelemMsg::PointCloud(c) => {
                self.update_raw_point_cloud(c);
            }
        }
    }

    /// Get the latest value of every field.
    pub fn snapshot(&self) -> TelemState {
        let latest = self.lock();

        TelemState {
            pose: latest.pose,
            map: latest.map.clone(),
            raw_point_cloud: latest.raw_point_cloud.clone(),
        }
    }

    pub fn pose(&self) -> Option<Pose> {
        self.lock().pose
    }

    pub fn map(&self) -> Option<Arc<OccupancyGrid>> {
        self.lock().map.clone()
    }

    /// Writers never leave `Latest` half updated, so a poisoned lock still holds valid data.
    fn lock(&self) -> MutexGuard<'_, Latest> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use comms_if::{
        nav::{Point, Quaternion},
        telem::PointCloudHeader,
    };

    fn pose(x: f64) -> Pose {
        Pose {
            position: Point { x, y: 2.0, z: 0.0 },
            orientation: Quaternion::identity(),
        }
    }

    fn cloud(width: u32) -> RawPointCloud {
        RawPointCloud {
            header: PointCloudHeader {
                width,
                height: 1,
                point_step: 12,
                row_step: 12 * width,
                stamp: Utc::now(),
                frame_id: String::from("lidar"),
            },
            data: vec![0u8; 12 * width as usize],
        }
    }

    #[test]
    fn test_empty_store() {
        let store = TelemetryStore::new();
        let state = store.snapshot();

        assert!(state.pose.is_none());
        assert!(state.map.is_none());
        assert!(state.raw_point_cloud.is_none());
        assert!(store.map().is_none());
    }

    #[test]
    fn test_latest_value_retained() {
        let store = TelemetryStore::new();

        store.update_pose(pose(1.0));
        store.update_pose(pose(5.0));

        // Reads do not consume the value
        for _ in 0..3 {
            assert_eq!(store.snapshot().pose, Some(pose(5.0)));
        }
        assert_eq!(store.pose(), Some(pose(5.0)));
    }

    #[test]
    fn test_point_cloud_seq() {
        let store = TelemetryStore::new();

        assert_eq!(store.update_raw_point_cloud(cloud(1)), 1);
        store.apply(TelemMsg::PointCloud(cloud(3)));

        let frame = store.snapshot().raw_point_cloud.unwrap();
        assert_eq!(frame.seq, 2);
        assert_eq!(frame.frame.header.width, 3);

        // Snapshots taken before an update keep their own frame
        store.update_raw_point_cloud(cloud(7));
        assert_eq!(frame.frame.header.width, 3);
        assert_eq!(store.snapshot().raw_point_cloud.unwrap().seq, 3);
    }
}
