//! Green-phase timing derived from a vehicle count.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Parameters of the linear, clamped green-time policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingPolicy {
    pub base_time: u32,
    pub time_per_vehicle: u32,
    pub max_green_time: u32,
}

/// Vehicle count of a frame and the green time it earns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TimingResult {
    pub vehicle_count: usize,
    pub green_seconds: u32,
}

impl TimingPolicy {
    pub fn new(
        base_time: u32,
        time_per_vehicle: u32,
        max_green_time: u32,
    ) -> Result<Self, ConfigError> {
        let policy = Self {
            base_time,
            time_per_vehicle,
            max_green_time,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Still images: 10 s base, 2 s per vehicle, 80 s cap.
    pub const fn image_default() -> Self {
        Self {
            base_time: 10,
            time_per_vehicle: 2,
            max_green_time: 80,
        }
    }

    /// Video frames: 10 s base, 5 s per vehicle, 80 s cap.
    pub const fn video_default() -> Self {
        Self {
            base_time: 10,
            time_per_vehicle: 5,
            max_green_time: 80,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_time == 0 || self.time_per_vehicle == 0 || self.max_green_time == 0 {
            return Err(ConfigError::InvalidTiming(format!(
                "timing parameters must be positive: {self:?}"
            )));
        }
        if self.base_time > self.max_green_time {
            return Err(ConfigError::InvalidTiming(format!(
                "base_time {} exceeds max_green_time {}",
                self.base_time, self.max_green_time
            )));
        }
        Ok(())
    }

    /// `clamp(max(base, count * per_vehicle), base, max)`.
    pub fn compute_green_time(&self, vehicle_count: usize) -> u32 {
        let scaled = (vehicle_count as u64).saturating_mul(self.time_per_vehicle as u64);
        let bounded = scaled
            .max(self.base_time as u64)
            .min(self.max_green_time as u64);
        bounded as u32
    }

    pub fn evaluate(&self, vehicle_count: usize) -> TimingResult {
        TimingResult {
            vehicle_count,
            green_seconds: self.compute_green_time(vehicle_count),
        }
    }
}

pub fn compute_green_time(vehicle_count: usize, policy: &TimingPolicy) -> u32 {
    policy.compute_green_time(vehicle_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(base: u32, per: u32, max: u32) -> TimingPolicy {
        TimingPolicy::new(base, per, max).expect("valid policy")
    }

    #[test]
    fn zero_vehicles_yields_base_time() {
        for p in [
            policy(10, 2, 80),
            policy(10, 5, 80),
            policy(1, 1, 1),
            policy(30, 7, 45),
        ] {
            assert_eq!(compute_green_time(0, &p), p.base_time);
        }
    }

    #[test]
    fn known_scenarios() {
        let p = policy(10, 2, 80);
        assert_eq!(compute_green_time(3, &p), 10);
        assert_eq!(compute_green_time(10, &p), 20);
        assert_eq!(compute_green_time(100, &p), 80);
    }

    #[test]
    fn bounded_and_monotonic() {
        let p = TimingPolicy::video_default();
        let mut previous = 0;
        for count in 0..200 {
            let green = p.compute_green_time(count);
            assert!(green >= p.base_time);
            assert!(green <= p.max_green_time);
            assert!(green >= previous);
            previous = green;
        }
        assert_eq!(p.compute_green_time(16), 80);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let p = policy(10, u32::MAX, 80);
        assert_eq!(p.compute_green_time(usize::MAX), 80);
    }

    #[test]
    fn image_and_video_policies_diverge() {
        let image = TimingPolicy::image_default();
        let video = TimingPolicy::video_default();
        assert_eq!(image.compute_green_time(8), 16);
        assert_eq!(video.compute_green_time(8), 40);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(TimingPolicy::new(0, 2, 80).is_err());
        assert!(TimingPolicy::new(10, 0, 80).is_err());
        assert!(TimingPolicy::new(90, 2, 80).is_err());
    }

    #[test]
    fn evaluate_carries_count() {
        let result = TimingPolicy::image_default().evaluate(12);
        assert_eq!(
            result,
            TimingResult {
                vehicle_count: 12,
                green_seconds: 24
            }
        );
    }
}
