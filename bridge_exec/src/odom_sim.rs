//! # Odometry Simulator
//!
//! Generates synthetic odometry samples for the telemetry stream until a real odometry feed is
//! wired in.

use std::f64::consts::TAU;

use comms_if::telem::OdomSample;
use rand::Rng;

/// Largest x and y value of a synthetic sample, in meters.
const MAX_POSITION_M: f64 = 10.0;

/// Generate a random sample with `x` and `y` in `[0, 10]` and `theta` in `[0, 2pi)`, each
/// rounded to two decimal places.
pub fn synthetic_odom<R: Rng + ?Sized>(rng: &mut R) -> OdomSample {
    OdomSample {
        x: round_2dp(rng.gen_range(0.0..MAX_POSITION_M)),
        y: round_2dp(rng.gen_range(0.0..MAX_POSITION_M)),
        // 2pi rounds down to 6.28, so the upper bound stays exclusive
        theta: round_2dp(rng.gen_range(0.0..TAU)),
    }
}

fn round_2dp(val: f64) -> f64 {
    (val * 100.0).round() / 100.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_odom_ranges() {
        let mut rng = rand::thread_rng();

        for _ in 0..1000 {
            let s = synthetic_odom(&mut rng);

            assert!((0.0..=MAX_POSITION_M).contains(&s.x));
            assert!((0.0..=MAX_POSITION_M).contains(&s.y));
            assert!((0.0..TAU).contains(&s.theta));
            assert_eq!(s.x, round_2dp(s.x));
        }
    }
}
