use crate::latency::MAX_DELAY;
use crate::ring::DEFAULT_POSE_HISTORY;
use crate::{Result, RiftlagError};
use std::str::FromStr;

pub const ENV_RING_CAPACITY: &str = "RIFTLAG_RING_CAPACITY";
pub const ENV_LAG: &str = "RIFTLAG_LAG";
pub const ENV_DELAY: &str = "RIFTLAG_DELAY";
pub const ENV_SWAP_INTERVAL: &str = "RIFTLAG_SWAP_INTERVAL";
pub const ENV_PIXEL_DENSITY: &str = "RIFTLAG_PIXEL_DENSITY";
pub const ENV_COMMAND_QUEUE: &str = "RIFTLAG_COMMAND_QUEUE";

/// Startup knobs for the compositor and the latency experiments.
#[derive(Debug, Clone, PartialEq)]
pub struct LabConfig {
    /// Pose history length; lags at or beyond this wrap around.
    pub ring_capacity: usize,
    pub initial_lag: u32,
    /// Clamped to `[0, MAX_DELAY]` by [`LabConfig::validate`].
    pub initial_delay: u32,
    /// Mirror window swap interval. 0 disables v-sync.
    pub swap_interval: i32,
    pub pixels_per_display_pixel: f32,
    pub command_queue_capacity: usize,
}

impl Default for LabConfig {
    fn default() -> Self {
        Self {
            ring_capacity: DEFAULT_POSE_HISTORY,
            initial_lag: 0,
            initial_delay: 0,
            swap_interval: 0,
            pixels_per_display_pixel: 1.0,
            command_queue_capacity: 64,
        }
    }
}

impl LabConfig {
    /// Defaults overridden by `RIFTLAG_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`LabConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            ring_capacity: read_var(&lookup, ENV_RING_CAPACITY, defaults.ring_capacity),
            initial_lag: read_var(&lookup, ENV_LAG, defaults.initial_lag),
            initial_delay: read_var(&lookup, ENV_DELAY, defaults.initial_delay),
            swap_interval: read_var(&lookup, ENV_SWAP_INTERVAL, defaults.swap_interval),
            pixels_per_display_pixel: read_var(
                &lookup,
                ENV_PIXEL_DENSITY,
                defaults.pixels_per_display_pixel,
            ),
            command_queue_capacity: read_var(
                &lookup,
                ENV_COMMAND_QUEUE,
                defaults.command_queue_capacity,
            ),
        };
        config.validate()
    }

    /// Reject unusable values and clamp the delay.
    pub fn validate(mut self) -> Result<Self> {
        if self.ring_capacity == 0 {
            return Err(RiftlagError::InvalidCapacity);
        }
        if self.initial_delay > MAX_DELAY {
            log::warn!(
                "Initial delay {} above maximum, clamping to {}",
                self.initial_delay,
                MAX_DELAY
            );
            self.initial_delay = MAX_DELAY;
        }
        if self.initial_lag as usize >= self.ring_capacity {
            log::warn!(
                "Initial lag {} reaches past the pose history ({} frames); reads will wrap",
                self.initial_lag,
                self.ring_capacity
            );
        }
        self.command_queue_capacity = self.command_queue_capacity.max(1);
        Ok(self)
    }
}

fn read_var<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(name) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Ignoring {}='{}', using {:?}", name, raw, default);
                default
            }
        },
    }
}
