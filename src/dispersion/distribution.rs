use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

use crate::stats::{incomplete_beta, ln_factorial, ln_gamma};

/// Relative size below which further Poisson tail terms are ignored.
const TAIL_TOLERANCE: f64 = 1e-17;

/// Discrete distribution of observed cleavage counts at a given expectation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountDistribution {
    /// Poisson with the given mean.
    Poisson {
        /// Mean (and variance).
        mean: f64,
    },
    /// Gamma–Poisson mixture with mean `mean` and size `size`; the variance
    /// is `mean + mean² / size`.
    NegativeBinomial {
        /// Mean.
        mean: f64,
        /// Size (inverse overdispersion).
        size: f64,
    },
}

impl CountDistribution {
    /// Negative binomial when `size` is given, Poisson otherwise.
    pub fn new(mean: f64, size: Option<f64>) -> Self {
        match size {
            Some(size) => CountDistribution::NegativeBinomial { mean, size },
            None => CountDistribution::Poisson { mean },
        }
    }

    /// Distribution mean.
    pub fn mean(&self) -> f64 {
        match *self {
            CountDistribution::Poisson { mean } | CountDistribution::NegativeBinomial { mean, .. } => mean,
        }
    }

    /// Distribution variance.
    pub fn variance(&self) -> f64 {
        match *self {
            CountDistribution::Poisson { mean } => mean,
            CountDistribution::NegativeBinomial { mean, size } => mean + mean * mean / size,
        }
    }

    /// Log probability of observing exactly `k`.
    pub fn ln_pmf(&self, k: u64) -> f64 {
        if self.mean() <= 0.0 {
            return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
        }
        let kf = k as f64;
        match *self {
            CountDistribution::Poisson { mean } => kf * mean.ln() - mean - ln_factorial(k),
            CountDistribution::NegativeBinomial { mean, size } => {
                ln_gamma(kf + size) - ln_gamma(size) - ln_factorial(k)
                    + size * (size / (size + mean)).ln()
                    + kf * (mean / (size + mean)).ln()
            }
        }
    }

    /// Probability of observing exactly `k`.
    pub fn pmf(&self, k: u64) -> f64 {
        self.ln_pmf(k).exp()
    }

    /// Lower tail `P(X ≤ k)`.
    ///
    /// The negative binomial tails use the regularized incomplete beta
    /// function, `P(X ≤ k) = I_p(size, k + 1)` with `p = size / (size + mean)`.
    pub fn cdf(&self, k: u64) -> f64 {
        if self.mean() <= 0.0 {
            return 1.0;
        }
        match *self {
            CountDistribution::NegativeBinomial { mean, size } => {
                let (p, q) = nb_probabilities(mean, size);
                incomplete_beta(size, k as f64 + 1.0, p, q)
            }
            CountDistribution::Poisson { mean } if k as f64 <= mean => self.sum_down(k).min(1.0),
            CountDistribution::Poisson { .. } => (1.0 - self.sum_up(k + 1)).clamp(0.0, 1.0),
        }
    }

    /// Upper tail `P(X ≥ k)`.
    pub fn sf(&self, k: u64) -> f64 {
        if k == 0 {
            return 1.0;
        }
        if self.mean() <= 0.0 {
            return 0.0;
        }
        match *self {
            CountDistribution::NegativeBinomial { mean, size } => {
                let (p, q) = nb_probabilities(mean, size);
                incomplete_beta(k as f64, size, q, p)
            }
            CountDistribution::Poisson { mean } if k as f64 > mean => self.sum_up(k).min(1.0),
            CountDistribution::Poisson { .. } => (1.0 - self.sum_down(k - 1)).clamp(0.0, 1.0),
        }
    }

    /// Draw one count.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let lambda = match *self {
            CountDistribution::Poisson { mean } => mean,
            CountDistribution::NegativeBinomial { mean, size } => match Gamma::new(size, mean / size) {
                Ok(gamma) => gamma.sample(rng),
                Err(_) => mean,
            },
        };
        if !(lambda.is_finite() && lambda > 0.0) {
            return 0;
        }
        match Poisson::new(lambda) {
            Ok(poisson) => poisson.sample(rng) as u64,
            Err(_) => 0,
        }
    }

    /// `Σ_{j ≤ k} pmf(j)` for the Poisson, summed from `k` downwards.
    fn sum_down(&self, k: u64) -> f64 {
        let mean = self.mean();
        let mut term = self.pmf(k);
        let mut total = term;
        let mut j = k;
        while j > 0 {
            term *= j as f64 / mean;
            j -= 1;
            total += term;
            if term < total * TAIL_TOLERANCE || term == 0.0 {
                break;
            }
        }
        total
    }

    /// `Σ_{j ≥ k} pmf(j)` for the Poisson, summed from `k` upwards.
    ///
    /// Only called with `k > mean`, where the terms shrink geometrically.
    fn sum_up(&self, k: u64) -> f64 {
        let mean = self.mean();
        let mut term = self.pmf(k);
        let mut total = term;
        let mut j = k;
        loop {
            j += 1;
            term *= mean / j as f64;
            total += term;
            if term < total * TAIL_TOLERANCE || term == 0.0 {
                break;
            }
        }
        total
    }
}

/// `(size / (size + mean), mean / (size + mean))`, each computed directly.
fn nb_probabilities(mean: f64, size: f64) -> (f64, f64) {
    let total = size + mean;
    (size / total, mean / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn poisson_tails_match_closed_form() {
        let d = CountDistribution::Poisson { mean: 2.0 };
        let p0 = (-2.0f64).exp();
        assert!((d.cdf(0) - p0).abs() < 1e-14);
        assert!((d.cdf(1) - 3.0 * p0).abs() < 1e-14);
        assert!((d.sf(2) - (1.0 - 3.0 * p0)).abs() < 1e-14);
        assert_eq!(d.sf(0), 1.0);
    }

    #[test]
    fn tails_are_complementary() {
        let dists = [
            CountDistribution::Poisson { mean: 7.5 },
            CountDistribution::NegativeBinomial { mean: 7.5, size: 1.3 },
            CountDistribution::NegativeBinomial { mean: 120.0, size: 8.0 },
        ];
        for d in dists {
            for k in [0u64, 1, 5, 7, 8, 20, 150, 400] {
                let total = d.cdf(k) + d.sf(k + 1);
                assert!((total - 1.0).abs() < 1e-12, "{d:?} k={k} total={total}");
            }
        }
    }

    #[test]
    fn negative_binomial_is_wider_than_poisson() {
        let p = CountDistribution::new(10.0, None);
        let nb = CountDistribution::new(10.0, Some(2.0));
        assert!(nb.variance() > p.variance());
        assert!(nb.sf(30) > p.sf(30));
        assert!(nb.cdf(1) > p.cdf(1));
    }

    #[test]
    fn heavy_negative_binomial_tail_uses_closed_form() {
        let d = CountDistribution::NegativeBinomial { mean: 100.0, size: 1e-4 };
        let start = std::time::Instant::now();
        let sf = d.sf(200);
        assert!(start.elapsed() < std::time::Duration::from_millis(20));
        assert!((sf - 7.939_608_033_881_027e-4).abs() < 1e-12, "sf = {sf}");
        assert!((d.cdf(199) + sf - 1.0).abs() < 1e-12);
    }

    #[test]
    fn negative_binomial_tails_match_summed_pmf() {
        let d = CountDistribution::NegativeBinomial { mean: 7.5, size: 1.3 };
        let summed: f64 = (0..=12).map(|k| d.pmf(k)).sum();
        assert!((d.cdf(12) - summed).abs() < 1e-13);
        assert!((d.sf(13) - (1.0 - summed)).abs() < 1e-13);
        assert_eq!(d.sf(0), 1.0);
        assert!((d.cdf(0) - d.pmf(0)).abs() < 1e-15);
    }

    #[test]
    fn far_upper_tail_stays_positive() {
        let d = CountDistribution::Poisson { mean: 1.0 };
        let p = d.sf(60);
        assert!(p > 0.0 && p < 1e-60);
    }

    #[test]
    fn sampling_matches_mean() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = CountDistribution::new(4.0, Some(3.0));
        let n = 20_000;
        let total: u64 = (0..n).map(|_| d.sample(&mut rng)).sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 4.0).abs() < 0.15, "mean {mean}");
        assert_eq!(CountDistribution::new(0.0, None).sample(&mut rng), 0);
    }
}
