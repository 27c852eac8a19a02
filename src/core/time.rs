//! Simulation clock

/// Tracks simulated time for the AI system.
///
/// All gated-action deadlines and path latencies are absolute values on this
/// clock, so nothing ever waits on wall time.
#[derive(Debug, Clone, Default)]
pub struct Time {
    /// Seconds elapsed since the clock was created
    elapsed: f64,
    /// Duration of the last step
    delta: f32,
    /// Number of steps taken
    frame: u64,
}

impl Time {
    /// Create a clock at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `dt` seconds
    pub fn advance(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.delta = dt;
        self.elapsed += f64::from(dt);
        self.frame += 1;
    }

    /// Seconds since creation
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Duration of the last step in seconds
    #[must_use]
    pub fn delta_seconds(&self) -> f32 {
        self.delta
    }

    /// Number of steps taken
    #[must_use]
    pub fn frame(&self) -> u64 {
        self.frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_accumulates() {
        let mut time = Time::new();
        time.advance(0.25);
        time.advance(0.5);

        assert!((time.elapsed() - 0.75).abs() < 1e-9);
        assert!((time.delta_seconds() - 0.5).abs() < f32::EPSILON);
        assert_eq!(time.frame(), 2);
    }

    #[test]
    fn test_negative_delta_clamped() {
        let mut time = Time::new();
        time.advance(-1.0);
        assert!(time.elapsed().abs() < 1e-9);
    }
}
