//! # Snapshot Builder
//!
//! Assembles the [`TelemetrySnapshot`] sent to clients on each tick. Point clouds are decoded at
//! most once per received frame, however many clients are connected.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{Arc, Mutex, PoisonError};

use comms_if::telem::{PointCloudFrame, TelemetrySnapshot};
use log::warn;

use crate::{
    odom_sim::synthetic_odom,
    point_cloud::decode_frame,
    telem_store::{RawFrameRef, TelemetryStore},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct SnapshotBuilder {
    store: Arc<TelemetryStore>,
    fan_out_cap: usize,

    cache: Mutex<DecodeCache>,
}

#[derive(Default)]
struct DecodeCache {
    /// Store sequence number of the last cloud a decode was attempted for, so that a failed
    /// decode is only reported once
    seq: Option<u64>,

    /// Last cloud which decoded successfully
    last_good: Option<Arc<PointCloudFrame>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SnapshotBuilder {
    pub fn new(store: Arc<TelemetryStore>, fan_out_cap: usize) -> Self {
        Self {
            store,
            fan_out_cap,
            cache: Mutex::new(DecodeCache::default()),
        }
    }

    /// Build a snapshot from the latest telemetry and a fresh odometry sample.
    pub fn build(&self) -> TelemetrySnapshot {
        let state = self.store.snapshot();

        TelemetrySnapshot {
            odom: synthetic_odom(&mut rand::thread_rng()),
            pose: state.pose,
            point_cloud: state.raw_point_cloud.and_then(|r| self.decoded(r)),
            map: state.map,
        }
    }

    /// Decode a raw cloud, or return the last good cloud if it cannot be decoded.
    fn decoded(&self, raw: RawFrameRef) -> Option<Arc<PointCloudFrame>> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        if cache.seq != Some(raw.seq) {
            cache.seq = Some(raw.seq);

            match decode_frame(&raw.frame, self.fan_out_cap) {
                Ok(f) => cache.last_good = Some(Arc::new(f)),
                Err(e) => warn!(
                    "Point cloud {} could not be decoded, keeping the previous cloud: {}",
                    raw.seq, e
                ),
            }
        }

        cache.last_good.clone()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Utc;
    use comms_if::telem::{PointCloudHeader, RawPointCloud};

    fn cloud(width: u32, data_len: usize) -> RawPointCloud {
        RawPointCloud {
            header: PointCloudHeader {
                width,
                height: 1,
                point_step: 12,
                row_step: 12 * width,
                stamp: Utc::now(),
                frame_id: String::from("lidar"),
            },
            data: vec![0u8; data_len],
        }
    }

    #[test]
    fn test_empty_snapshot() {
        let builder = SnapshotBuilder::new(Arc::new(TelemetryStore::new()), 200);
        let snapshot = builder.build();

        assert!(snapshot.pose.is_none());
        assert!(snapshot.point_cloud.is_none());
        assert!(snapshot.map.is_none());
    }

    #[test]
    fn test_cloud_decoded_once() {
        let store = Arc::new(TelemetryStore::new());
        let builder = SnapshotBuilder::new(store.clone(), 200);

        store.update_raw_point_cloud(cloud(300, 300 * 12));

        let a = builder.build().point_cloud.unwrap();
        let b = builder.build().point_cloud.unwrap();
        assert_eq!(a.points.len(), 200);
        assert_eq!(a.header.width, 300);
        assert!(Arc::ptr_eq(&a, &b));

        // A new frame is decoded again
        store.update_raw_point_cloud(cloud(2, 24));
        assert_eq!(builder.build().point_cloud.unwrap().points.len(), 2);
    }

    #[test]
    fn test_bad_cloud_absent() {
        let store = Arc::new(TelemetryStore::new());
        let builder = SnapshotBuilder::new(store.clone(), 200);

        store.update_raw_point_cloud(cloud(10, 12));

        assert!(builder.build().point_cloud.is_none());
        assert!(builder.build().point_cloud.is_none());
    }

    #[test]
    fn test_bad_cloud_keeps_last_good() {
        let store = Arc::new(TelemetryStore::new());
        let builder = SnapshotBuilder::new(store.clone(), 200);

        store.update_raw_point_cloud(cloud(2, 24));
        let good = builder.build().point_cloud.unwrap();
        assert_eq!(good.points.len(), 2);

        // Buffer too short for the header
        store.update_raw_point_cloud(cloud(10, 12));
        for _ in 0..2 {
            let streamed = builder.build().point_cloud.unwrap();
            assert!(Arc::ptr_eq(&streamed, &good));
        }

        // The next good cloud replaces it
        store.update_raw_point_cloud(cloud(3, 36));
        assert_eq!(builder.build().point_cloud.unwrap().points.len(), 3);
    }
}
