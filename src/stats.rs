//! Running statistics for combined points
//!
//! Welford's update keeps mean and squared deviations numerically stable while
//! samples arrive one member at a time.

/// Streaming mean / variance accumulator
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample in O(1)
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Running mean, or `None` before the first sample
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    /// Sample variance with Bessel's correction (n - 1 denominator)
    pub fn sample_variance(&self) -> Option<f64> {
        (self.count > 1).then(|| self.m2 / (self.count - 1) as f64)
    }

    pub fn sample_std_dev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }

    /// Standard error of the mean; zero when fewer than two samples exist
    pub fn standard_error(&self) -> f64 {
        match self.sample_std_dev() {
            Some(sd) => sd / (self.count as f64).sqrt(),
            None => 0.0,
        }
    }

    /// `(mean - stderr, mean + stderr)`, collapsing to the mean for one sample
    pub fn error_band(&self) -> Option<(f64, f64)> {
        let mean = self.mean()?;
        let err = self.standard_error();
        Some((mean - err, mean + err))
    }
}

impl Extend<f64> for RunningStats {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        stats.extend(iter);
        stats
    }
}
