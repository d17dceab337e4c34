//! # Point Cloud Decoder
//!
//! Unpacks the binary point data of a [`RawPointCloud`] into [`Point3D`]s.
//!
//! Each point occupies `point_step` bytes and starts with the x, y and z coordinates as
//! little-endian 32 bit floats at byte offsets 0, 4 and 8. Any further fields (intensity, ring,
//! ...) are skipped.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use byteorder::{ByteOrder, LittleEndian};
use comms_if::telem::{Point3D, PointCloudFrame, RawPointCloud};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default maximum number of points sent to clients in a single snapshot.
pub const DEFAULT_FAN_OUT_CAP: usize = 200;

const X_OFFSET: usize = 0;
const Y_OFFSET: usize = 4;
const Z_OFFSET: usize = 8;

/// Smallest point step able to hold the x, y and z fields.
const MIN_POINT_STEP: usize = 12;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised when a cloud's data does not match its header. These indicate a fault in the
/// publisher of the cloud.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("A point step of {0} bytes cannot hold the x, y and z fields")]
    PointStepTooShort(usize),

    #[error("The header declares {expected} bytes of point data but the buffer holds {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("The declared cloud size overflows")]
    SizeOverflow,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Decode at most `max_points` of the first `width` points of a packed point buffer.
///
/// Points with a non-finite coordinate are skipped and do not count towards `max_points`.
///
/// The buffer must hold at least `width * point_step` bytes, otherwise the whole cloud is
/// rejected even if the points to be decoded would fit.
pub fn decode_points(
    buffer: &[u8],
    width: usize,
    point_step: usize,
    max_points: usize,
) -> Result<Vec<Point3D>, DecodeError> {
    if width == 0 {
        return Ok(Vec::new());
    }

    if point_step < MIN_POINT_STEP {
        return Err(DecodeError::PointStepTooShort(point_step));
    }

    let expected = width
        .checked_mul(point_step)
        .ok_or(DecodeError::SizeOverflow)?;
    if buffer.len() < expected {
        return Err(DecodeError::BufferTooShort {
            expected,
            actual: buffer.len(),
        });
    }

    Ok(buffer
        .chunks_exact(point_step)
        .take(width)
        .map(|p| Point3D {
            x: LittleEndian::read_f32(&p[X_OFFSET..]),
            y: LittleEndian::read_f32(&p[Y_OFFSET..]),
            z: LittleEndian::read_f32(&p[Z_OFFSET..]),
        })
        // Sensors report NaN for beams with no return, which JSON cannot carry
        .filter(|p| p.x.is_finite() && p.y.is_finite() && p.z.is_finite())
        .take(max_points)
        .collect())
}

/// Decode a raw cloud into a frame of at most `max_points` points, keeping its header.
pub fn decode_frame(raw: &RawPointCloud, max_points: usize) -> Result<PointCloudFrame, DecodeError> {
    let points = decode_points(
        &raw.data,
        raw.header.width as usize,
        raw.header.point_step as usize,
        max_points,
    )?;

    Ok(PointCloudFrame {
        header: raw.header.clone(),
        points,
    })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
