//! Per-position statistics used when turning p-value tracks into footprint
//! calls: windowed p-value combination, empirical false discovery rates and
//! threshold segmentation.

mod special;

pub use special::{digamma, ln_beta, ln_factorial, ln_gamma, normal_cdf, normal_quantile, regularized_beta};
pub(crate) use special::incomplete_beta;

/// Smallest p-value fed to the normal quantile; keeps z finite.
const MIN_PVALUE: f64 = 1e-300;
/// Largest p-value fed to the normal quantile.
const MAX_PVALUE: f64 = 1.0 - 1e-16;

/// Combine p-values over a sliding window with Stouffer's method.
///
/// Position `i` combines `pvalues[i - half_width ..= i + half_width]`
/// (clipped at the ends) as `Φ(Σ Φ⁻¹(p) / √n)`. Lower-tail p-values stay
/// lower-tail: a run of small p-values yields a smaller combined p-value.
pub fn stouffers_z(pvalues: &[f64], half_width: usize) -> Vec<f64> {
    let z: Vec<f64> = pvalues
        .iter()
        .map(|&p| normal_quantile(p.clamp(MIN_PVALUE, MAX_PVALUE)))
        .collect();

    // prefix sums make each window O(1)
    let mut prefix = Vec::with_capacity(z.len() + 1);
    prefix.push(0.0);
    let mut acc = 0.0;
    for &value in &z {
        acc += value;
        prefix.push(acc);
    }

    (0..z.len())
        .map(|i| {
            let lo = i.saturating_sub(half_width);
            let hi = (i + half_width + 1).min(z.len());
            let n = (hi - lo) as f64;
            normal_cdf((prefix[hi] - prefix[lo]) / n.sqrt())
        })
        .collect()
}

/// Empirical false discovery rate of each observed p-value against a set of
/// null tracks.
///
/// For an observed value `p` the rate is the fraction of null values `≤ p`
/// divided by the fraction of observed values `≤ p`, capped at 1. With no
/// null values every rate is 1.
pub fn empirical_fdr<T: AsRef<[f64]>>(null: &[T], observed: &[f64]) -> Vec<f64> {
    let mut null_sorted: Vec<f64> = null
        .iter()
        .flat_map(|track| track.as_ref().iter().copied())
        .filter(|p| !p.is_nan())
        .collect();
    if null_sorted.is_empty() {
        return vec![1.0; observed.len()];
    }
    null_sorted.sort_by(f64::total_cmp);

    let mut observed_sorted: Vec<f64> = observed.iter().copied().filter(|p| !p.is_nan()).collect();
    observed_sorted.sort_by(f64::total_cmp);

    let null_total = null_sorted.len() as f64;
    let observed_total = observed_sorted.len() as f64;
    observed
        .iter()
        .map(|&p| {
            if p.is_nan() {
                return 1.0;
            }
            let null_le = null_sorted.partition_point(|&x| x <= p) as f64;
            let observed_le = observed_sorted.partition_point(|&x| x <= p) as f64;
            ((null_le / null_total) / (observed_le / observed_total)).min(1.0)
        })
        .collect()
}

/// Half-open index ranges where `values[i] >= threshold`.
///
/// Runs separated by a gap of at most `max_gap` positions are merged into a
/// single segment.
pub fn segment(values: &[f64], threshold: f64, max_gap: usize) -> Vec<(usize, usize)> {
    let mut segments: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < values.len() {
        if values[i] < threshold || values[i].is_nan() {
            i += 1;
            continue;
        }
        let start = i;
        while i < values.len() && values[i] >= threshold {
            i += 1;
        }
        match segments.last_mut() {
            Some(last) if start - last.1 <= max_gap => last.1 = i,
            _ => segments.push((start, i)),
        }
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stouffer_of_uniform_half_is_half() {
        let combined = stouffers_z(&[0.5; 9], 3);
        assert!(combined.iter().all(|p| (p - 0.5).abs() < 1e-12));
    }

    #[test]
    fn stouffer_strengthens_runs_of_small_pvalues() {
        let mut p = vec![0.5; 11];
        for value in &mut p[4..7] {
            *value = 0.01;
        }
        let combined = stouffers_z(&p, 1);
        assert!(combined[5] < 0.01);
        assert!(combined[0] > 0.49);
        assert_eq!(combined.len(), p.len());
    }

    #[test]
    fn stouffer_handles_extreme_inputs() {
        let combined = stouffers_z(&[0.0, 1.0, 0.0], 0);
        assert!(combined.iter().all(|p| p.is_finite()));
        assert!(combined[0] < 1e-200);
        assert!(stouffers_z(&[], 3).is_empty());
    }

    #[test]
    fn empirical_fdr_ratio_of_fractions() {
        let null = vec![vec![0.1, 0.5, 0.9, 0.9]];
        let observed = [0.05, 0.1, 0.6, 0.95];
        let fdr = empirical_fdr(&null, &observed);
        assert_eq!(fdr[0], 0.0);
        // null 1/4 ≤ 0.1, observed 2/4 ≤ 0.1
        assert!((fdr[1] - 0.5).abs() < 1e-12);
        // null 2/4, observed 3/4
        assert!((fdr[2] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(fdr[3], 1.0);
    }

    #[test]
    fn empirical_fdr_without_null_is_one() {
        let null: Vec<Vec<f64>> = Vec::new();
        assert_eq!(empirical_fdr(&null, &[0.1, 0.2]), vec![1.0, 1.0]);
    }

    #[test]
    fn segment_finds_and_merges_runs() {
        let values = [0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        assert_eq!(segment(&values, 0.5, 0), vec![(1, 3), (5, 6), (10, 11)]);
        assert_eq!(segment(&values, 0.5, 2), vec![(1, 6), (10, 11)]);
        assert_eq!(segment(&values, 0.5, 4), vec![(1, 11)]);
        assert!(segment(&values, 2.0, 3).is_empty());
    }
}
