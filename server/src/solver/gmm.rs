//! Gaussian mixture colour models

/// RGB colour as floating point
pub(super) type Color = [f64; 3];

/// Added to the covariance diagonal so degenerate (flat) clusters stay invertible
const COVARIANCE_RIDGE: f64 = 0.01;
const KMEANS_ROUNDS: usize = 10;

#[derive(Debug, Clone)]
struct Component {
    mean: Color,
    inv_cov: [[f64; 3]; 3],
    /// weight / sqrt(det(cov))
    scale: f64,
}

/// Mixture of full-covariance Gaussians over RGB
#[derive(Debug, Clone)]
pub(super) struct ColorModel {
    components: Vec<Component>,
}

impl ColorModel {
    /// Fit up to `max_components` Gaussians; `None` when there are no samples
    pub fn fit(samples: &[Color], max_components: usize) -> Option<Self> {
        if samples.is_empty() || max_components == 0 {
            return None;
        }
        let k = max_components.min(samples.len());
        let assignments = kmeans(samples, k);

        let mut counts = vec![0usize; k];
        let mut sums = vec![[0.0; 3]; k];
        for (sample, &cluster) in samples.iter().zip(&assignments) {
            counts[cluster] += 1;
            for c in 0..3 {
                sums[cluster][c] += sample[c];
            }
        }
        let means: Vec<Color> = sums
            .iter()
            .zip(&counts)
            .map(|(sum, &n)| {
                let n = n.max(1) as f64;
                [sum[0] / n, sum[1] / n, sum[2] / n]
            })
            .collect();

        let mut covs = vec![[[0.0; 3]; 3]; k];
        for (sample, &cluster) in samples.iter().zip(&assignments) {
            let d = sub(*sample, means[cluster]);
            for r in 0..3 {
                for c in 0..3 {
                    covs[cluster][r][c] += d[r] * d[c];
                }
            }
        }

        let total = samples.len() as f64;
        let components = (0..k)
            .filter(|&i| counts[i] > 0)
            .filter_map(|i| {
                let n = counts[i] as f64;
                let mut cov = covs[i];
                for (r, row) in cov.iter_mut().enumerate() {
                    for value in row.iter_mut() {
                        *value /= n;
                    }
                    row[r] += COVARIANCE_RIDGE;
                }
                let det = det3(&cov);
                if !(det.is_finite() && det > 0.0) {
                    return None;
                }
                Some(Component {
                    mean: means[i],
                    inv_cov: inv3(&cov, det),
                    scale: (n / total) / det.sqrt(),
                })
            })
            .collect::<Vec<_>>();

        (!components.is_empty()).then_some(Self { components })
    }

    /// Mixture density at `z` (up to a constant shared by all models)
    pub fn density(&self, z: Color) -> f64 {
        self.components
            .iter()
            .map(|comp| {
                let d = sub(z, comp.mean);
                let mut m = 0.0;
                for r in 0..3 {
                    for c in 0..3 {
                        m += d[r] * comp.inv_cov[r][c] * d[c];
                    }
                }
                comp.scale * (-0.5 * m).exp()
            })
            .sum()
    }

    /// Data cost of assigning colour `z` to this model
    pub fn cost(&self, z: Color) -> f64 {
        -self.density(z).max(f64::MIN_POSITIVE).ln()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.components.len()
    }
}

/// Deterministic k-means; seeds are luminance quantiles
fn kmeans(samples: &[Color], k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..samples.len()).collect();
    order.sort_by(|&a, &b| luminance(samples[a]).total_cmp(&luminance(samples[b])));
    let mut centers: Vec<Color> = (0..k)
        .map(|i| samples[order[(2 * i + 1) * samples.len() / (2 * k)]])
        .collect();

    let mut assignments = vec![usize::MAX; samples.len()];
    for _ in 0..KMEANS_ROUNDS {
        let mut changed = false;
        for (sample, slot) in samples.iter().zip(assignments.iter_mut()) {
            let nearest = nearest_center(&centers, *sample);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![[0.0; 3]; k];
        let mut counts = vec![0usize; k];
        for (sample, &cluster) in samples.iter().zip(&assignments) {
            counts[cluster] += 1;
            for c in 0..3 {
                sums[cluster][c] += sample[c];
            }
        }
        for ((center, sum), &n) in centers.iter_mut().zip(&sums).zip(&counts) {
            // empty clusters keep their previous centre
            if n > 0 {
                let n = n as f64;
                *center = [sum[0] / n, sum[1] / n, sum[2] / n];
            }
        }
    }
    assignments
}

fn nearest_center(centers: &[Color], z: Color) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, center) in centers.iter().enumerate() {
        let d = sub(z, *center);
        let dist = d[0] * d[0] + d[1] * d[1] + d[2] * d[2];
        if dist < best_dist {
            best = i;
            best_dist = dist;
        }
    }
    best
}

fn luminance(z: Color) -> f64 {
    0.299 * z[0] + 0.587 * z[1] + 0.114 * z[2]
}

fn sub(a: Color, b: Color) -> Color {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn det3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

fn inv3(m: &[[f64; 3]; 3], det: f64) -> [[f64; 3]; 3] {
    let inv_det = 1.0 / det;
    [
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse() {
        let m = [[4.0, 1.0, 0.5], [1.0, 3.0, 0.2], [0.5, 0.2, 2.0]];
        let inv = inv3(&m, det3(&m));
        for r in 0..3 {
            for c in 0..3 {
                let value: f64 = (0..3).map(|k| m[r][k] * inv[k][c]).sum();
                let expected = if r == c { 1.0 } else { 0.0 };
                assert!((value - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_empty_samples() {
        assert!(ColorModel::fit(&[], 5).is_none());
    }

    #[test]
    fn test_flat_samples_are_regularised() {
        let samples = vec![[10.0, 20.0, 30.0]; 50];
        let model = ColorModel::fit(&samples, 5).unwrap();
        assert_eq!(model.len(), 1);
        assert!(model.cost([10.0, 20.0, 30.0]).is_finite());
        assert!(model.cost([10.0, 20.0, 30.0]) < model.cost([200.0, 20.0, 30.0]));
    }

    #[test]
    fn test_two_clusters_separate() {
        let mut samples = vec![[20.0, 20.0, 20.0]; 100];
        samples.extend(vec![[230.0, 230.0, 230.0]; 100]);
        let model = ColorModel::fit(&samples, 2).unwrap();
        assert_eq!(model.len(), 2);

        let dark_only = ColorModel::fit(&vec![[20.0, 20.0, 20.0]; 100], 2).unwrap();
        assert!(model.cost([230.0, 230.0, 230.0]) < dark_only.cost([230.0, 230.0, 230.0]));
    }
}
