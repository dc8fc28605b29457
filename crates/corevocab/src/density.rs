/// Finds the densest value of a one-dimensional sample.
pub trait ModeEstimator {
    /// `None` for an empty sample.
    fn mode(&self, sample: &[f64]) -> Option<f64>;
}

/// Kernels further than this many bandwidths away contribute nothing.
const KERNEL_CUTOFF: f64 = 8.0;

/// Gaussian kernel density estimate with Scott's bandwidth, evaluated at the
/// sample points themselves. The mode is the sample value with the highest
/// density; on ties the value appearing first in the sample wins.
#[derive(Clone, Copy, Debug, Default)]
pub struct GaussianKde;

impl GaussianKde {
    /// Scott's rule: sample standard deviation times `n^(-1/5)`.
    pub fn bandwidth(sample: &[f64]) -> Option<f64> {
        let n = sample.len();
        if n < 2 {
            return None;
        }
        let mean = sample.iter().sum::<f64>() / n as f64;
        let var = sample.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let h = var.sqrt() * (n as f64).powf(-0.2);
        (h.is_finite() && h > 0.0).then_some(h)
    }

    /// Unnormalised density at `x`; `sorted` must be ascending.
    fn density_at(x: f64, sorted: &[f64], h: f64) -> f64 {
        let lo = sorted.partition_point(|v| *v < x - KERNEL_CUTOFF * h);
        let hi = sorted.partition_point(|v| *v <= x + KERNEL_CUTOFF * h);
        sorted[lo..hi]
            .iter()
            .map(|v| {
                let z = (x - v) / h;
                (-0.5 * z * z).exp()
            })
            .sum()
    }
}

impl ModeEstimator for GaussianKde {
    fn mode(&self, sample: &[f64]) -> Option<f64> {
        let first = *sample.first()?;
        let Some(h) = Self::bandwidth(sample) else {
            return Some(first);
        };

        let mut sorted = sample.to_vec();
        sorted.sort_by(f64::total_cmp);
        let mut distinct = sorted.clone();
        distinct.dedup();
        let densities: Vec<f64> = distinct
            .iter()
            .map(|&x| Self::density_at(x, &sorted, h))
            .collect();
        let peak = densities.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        sample.iter().copied().find(|v| {
            distinct
                .binary_search_by(|d| d.total_cmp(v))
                .is_ok_and(|idx| densities[idx] == peak)
        })
    }
}
