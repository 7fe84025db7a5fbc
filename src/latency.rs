/// Upper bound for the rendering delay, in frames.
pub const MAX_DELAY: u32 = 10;

/// Tracking lag and rendering delay counters.
///
/// `lag` selects how many frames back poses are read from. `delay` makes the compositor
/// skip `delay` frames out of every `delay + 1`; it is a periodic frame drop, not a
/// variable presentation latency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyController {
    lag: u32,
    delay: u32,
    current_delay: u32,
}

impl LatencyController {
    pub fn new(lag: u32, delay: u32) -> Self {
        Self {
            lag,
            delay: delay.min(MAX_DELAY),
            current_delay: 0,
        }
    }

    pub fn lag(&self) -> u32 {
        self.lag
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }

    /// Frames skipped since the last rendered one.
    pub fn current_delay(&self) -> u32 {
        self.current_delay
    }

    /// No upper bound: lags at or past the pose history capacity read stale data.
    pub fn increase_lag(&mut self) {
        self.lag = self.lag.saturating_add(1);
        log::debug!("Tracking lag: {} frames", self.lag);
    }

    pub fn decrease_lag(&mut self) {
        self.lag = self.lag.saturating_sub(1);
        log::debug!("Tracking lag: {} frames", self.lag);
    }

    pub fn reset_lag(&mut self) {
        self.lag = 0;
        log::debug!("Tracking lag reset");
    }

    pub fn increase_delay(&mut self) {
        self.delay = (self.delay + 1).min(MAX_DELAY);
        log::debug!("Rendering delay: {} frames", self.delay);
    }

    pub fn decrease_delay(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        log::debug!("Rendering delay: {} frames", self.delay);
    }

    /// Advance the delay counter for this frame and report whether it should be drawn.
    pub fn should_render(&mut self) -> bool {
        if self.delay == 0 {
            self.current_delay = 0;
            return true;
        }

        if self.current_delay < self.delay {
            self.current_delay += 1;
            false
        } else {
            self.current_delay = 0;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lag_floor_at_zero() {
        let mut latency = LatencyController::default();
        latency.decrease_lag();
        assert_eq!(latency.lag(), 0);

        latency.increase_lag();
        latency.increase_lag();
        latency.decrease_lag();
        assert_eq!(latency.lag(), 1);

        latency.reset_lag();
        assert_eq!(latency.lag(), 0);
    }

    #[test]
    fn test_lag_has_no_upper_clamp() {
        let mut latency = LatencyController::default();
        for _ in 0..100 {
            latency.increase_lag();
        }
        assert_eq!(latency.lag(), 100);
    }

    #[test]
    fn test_delay_clamped_at_bounds() {
        let mut latency = LatencyController::new(0, MAX_DELAY);
        latency.increase_delay();
        assert_eq!(latency.delay(), 10);

        let mut latency = LatencyController::default();
        latency.decrease_delay();
        assert_eq!(latency.delay(), 0);

        assert_eq!(LatencyController::new(0, 42).delay(), MAX_DELAY);
    }

    #[test]
    fn test_delay_two_pattern() {
        let mut latency = LatencyController::new(0, 2);
        let flags: Vec<bool> = (0..9).map(|_| latency.should_render()).collect();
        assert_eq!(
            flags,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn test_one_render_per_delay_plus_one_frames() {
        for delay in 1..=MAX_DELAY {
            let mut latency = LatencyController::new(0, delay);
            let period = (delay + 1) as usize;
            let flags: Vec<bool> = (0..period * 4).map(|_| latency.should_render()).collect();
            for window in flags.chunks(period) {
                assert_eq!(window.iter().filter(|f| **f).count(), 1);
                assert_eq!(window.last(), Some(&true));
            }
        }
    }

    #[test]
    fn test_zero_delay_resets_counter() {
        let mut latency = LatencyController::new(0, 3);
        assert!(!latency.should_render());
        assert!(!latency.should_render());
        assert_eq!(latency.current_delay(), 2);

        latency.decrease_delay();
        latency.decrease_delay();
        latency.decrease_delay();
        assert!(latency.should_render());
        assert_eq!(latency.current_delay(), 0);
        assert!(latency.should_render());
    }
}
