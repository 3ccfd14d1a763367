//! Sampling uncertainty from a stationary block bootstrap.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::statistics::{ScoreQuantile, Scores};

/// Bootstrap settings for one pool.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    samples: usize,
    mean_block_length: Option<f64>,
    quantiles: Vec<f64>,
    seed: u64,
}

impl BootstrapConfig {
    /// Creates a bootstrap of `samples` resamples.
    ///
    /// Defaults:
    /// - mean block length: `sqrt(n)` of each sample, at least 1
    /// - quantiles: 0.05 and 0.95
    /// - seed: 0
    pub fn new(samples: usize) -> Self {
        Self {
            samples,
            mean_block_length: None,
            quantiles: vec![0.05, 0.95],
            seed: 0,
        }
    }

    pub fn with_mean_block_length(mut self, length: Option<f64>) -> Self {
        self.mean_block_length = length;
        self
    }

    pub fn with_quantiles(mut self, quantiles: Vec<f64>) -> Self {
        self.quantiles = quantiles;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    // --- Accessors ---

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn quantiles(&self) -> &[f64] {
        &self.quantiles
    }

    /// Validates the settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(b) = self.mean_block_length.filter(|b| !(*b >= 1.0)) {
            anyhow::bail!("mean block length must be >= 1, got {b}");
        }
        if let Some(p) = self.quantiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            anyhow::bail!("bootstrap quantiles must lie in [0, 1], got {p}");
        }
        Ok(())
    }

    /// Estimates quantiles of the scores of `pairs`.
    ///
    /// The seed is combined with `stream` so that every pool draws its own
    /// reproducible sequence. Returns no quantiles when there are no
    /// resamples or no usable pairs.
    pub fn score_quantiles(&self, pairs: &[(f64, f64)], stream: u64) -> Vec<ScoreQuantile> {
        if self.samples == 0 || pairs.is_empty() {
            return Vec::new();
        }
        let block = self
            .mean_block_length
            .unwrap_or_else(|| (pairs.len() as f64).sqrt().max(1.0));
        let mut rng = StdRng::seed_from_u64(self.seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15));

        let resampled: Vec<Scores> = (0..self.samples)
            .filter_map(|_| Scores::from_pairs(&stationary_resample(pairs, block, &mut rng)))
            .collect();
        if resampled.is_empty() {
            return Vec::new();
        }

        let mut sample_sizes: Vec<f64> = resampled.iter().map(|s| s.sample_size as f64).collect();
        let mut mean_errors: Vec<f64> = resampled.iter().map(|s| s.mean_error).collect();
        let mut absolute: Vec<f64> = resampled.iter().map(|s| s.mean_absolute_error).collect();
        let mut rmse: Vec<f64> = resampled.iter().map(|s| s.root_mean_square_error).collect();
        for v in [&mut sample_sizes, &mut mean_errors, &mut absolute, &mut rmse] {
            v.sort_by(f64::total_cmp);
        }

        self.quantiles
            .iter()
            .map(|&p| ScoreQuantile {
                probability: p,
                scores: Scores {
                    sample_size: quantile_type7(&sample_sizes, p).round() as usize,
                    mean_error: quantile_type7(&mean_errors, p),
                    mean_absolute_error: quantile_type7(&absolute, p),
                    root_mean_square_error: quantile_type7(&rmse, p),
                },
            })
            .collect()
    }
}

/// Draws one stationary-bootstrap resample of `x`, the same length as `x`.
///
/// Blocks start at uniform positions and have geometric lengths with mean
/// `mean_block_length`, wrapping around the end of the data.
pub fn stationary_resample<T: Copy>(x: &[T], mean_block_length: f64, rng: &mut impl Rng) -> Vec<T> {
    let n = x.len();
    if n == 0 {
        return Vec::new();
    }
    let p = 1.0 / mean_block_length.max(1.0);
    let mut out = Vec::with_capacity(n);
    let mut i = rng.random_range(0..n);
    while out.len() < n {
        out.push(x[i]);
        i = if rng.random::<f64>() < p {
            rng.random_range(0..n)
        } else {
            (i + 1) % n
        };
    }
    out
}

/// Quantile of sorted data by linear interpolation (type 7).
fn quantile_type7(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let h = (n - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - h.floor()) * (sorted[hi] - sorted[lo])
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn pairs() -> Vec<(f64, f64)> {
        (0..40).map(|i| (i as f64, i as f64 + (i % 5) as f64)).collect()
    }

    #[test]
    fn resample_keeps_length_and_values() {
        let x: Vec<u32> = (0..25).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let r = stationary_resample(&x, 4.0, &mut rng);
        assert_eq!(r.len(), 25);
        assert!(r.iter().all(|v| x.contains(v)));
    }

    #[test]
    fn block_length_one_still_draws_full_sample() {
        let x = [1.0, 2.0, 3.0];
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(stationary_resample(&x, 1.0, &mut rng).len(), 3);
        assert!(stationary_resample::<f64>(&[], 2.0, &mut rng).is_empty());
    }

    #[test]
    fn quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile_type7(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile_type7(&sorted, 0.5), 2.5);
        assert_relative_eq!(quantile_type7(&sorted, 1.0), 4.0);
    }

    #[test]
    fn quantiles_bracket_nominal() {
        let config = BootstrapConfig::new(200).with_seed(7);
        let nominal = Scores::from_pairs(&pairs()).unwrap();
        let q = config.score_quantiles(&pairs(), 1);
        assert_eq!(q.len(), 2);
        assert!(q[0].scores.mean_error <= nominal.mean_error);
        assert!(q[1].scores.mean_error >= nominal.mean_error);
        assert_eq!(q[0].scores.sample_size, 40);
    }

    #[test]
    fn reproducible_per_stream() {
        let config = BootstrapConfig::new(50).with_seed(3);
        assert_eq!(config.score_quantiles(&pairs(), 9), config.score_quantiles(&pairs(), 9));
    }

    #[test]
    fn disabled_without_samples() {
        assert!(BootstrapConfig::new(0).score_quantiles(&pairs(), 0).is_empty());
    }

    #[test]
    fn invalid_settings_rejected() {
        assert!(BootstrapConfig::new(10).with_mean_block_length(Some(0.5)).validate().is_err());
        assert!(BootstrapConfig::new(10).with_quantiles(vec![1.5]).validate().is_err());
        assert!(BootstrapConfig::new(10).validate().is_ok());
    }
}
