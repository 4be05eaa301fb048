//! GrabCut-style solver
//!
//! Each iteration fits a foreground and a background colour model from the
//! current labels, then relabels every non-fixed pixel by minimising a data
//! term plus a contrast-sensitive smoothness term with iterated conditional
//! modes. Definite labels are never changed.

use super::gmm::{Color, ColorModel};
use super::{SegmentationSolver, SolverError};
use crate::geometry::Rect;
use crate::mask::{Label, Mask};
use image::RgbImage;
use tracing::debug;

/// Tuning knobs for [`GrabCutSolver`]
#[derive(Debug, Clone, Copy)]
pub struct GrabCutSettings {
    /// Model-fit / relabel rounds per call
    pub iterations: usize,
    /// Gaussian components per colour model
    pub components: usize,
    /// Smoothness weight
    pub gamma: f64,
    /// Upper bound on ICM sweeps per iteration
    pub sweeps: usize,
}

impl Default for GrabCutSettings {
    fn default() -> Self {
        Self {
            iterations: 1,
            components: 5,
            gamma: 50.0,
            sweeps: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GrabCutSolver {
    settings: GrabCutSettings,
}

impl GrabCutSolver {
    pub fn new(settings: GrabCutSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GrabCutSettings {
        &self.settings
    }

    fn segment(&self, image: &RgbImage, mut labels: Vec<Label>) -> Result<Mask, SolverError> {
        let (width, height) = image.dimensions();
        let colors: Vec<Color> = image
            .pixels()
            .map(|p| [p[0] as f64, p[1] as f64, p[2] as f64])
            .collect();
        let edges = EdgeWeights::new(&colors, width as usize, height as usize, self.settings.gamma);

        for iteration in 0..self.settings.iterations.max(1) {
            let (fg_samples, bg_samples): (Vec<_>, Vec<_>) = colors
                .iter()
                .zip(&labels)
                .partition(|(_, label)| label.is_foreground());
            let fg_samples: Vec<Color> = fg_samples.into_iter().map(|(c, _)| *c).collect();
            let bg_samples: Vec<Color> = bg_samples.into_iter().map(|(c, _)| *c).collect();

            let fg_model = ColorModel::fit(&fg_samples, self.settings.components)
                .ok_or(SolverError::EmptyModel("foreground"))?;
            let bg_model = ColorModel::fit(&bg_samples, self.settings.components)
                .ok_or(SolverError::EmptyModel("background"))?;

            let fg_cost: Vec<f64> = colors.iter().map(|&z| fg_model.cost(z)).collect();
            let bg_cost: Vec<f64> = colors.iter().map(|&z| bg_model.cost(z)).collect();

            let mut is_fg: Vec<bool> = labels
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    if label.is_fixed() {
                        label.is_foreground()
                    } else {
                        fg_cost[i] < bg_cost[i]
                    }
                })
                .collect();

            let mut sweeps = 0;
            while sweeps < self.settings.sweeps {
                sweeps += 1;
                let mut changed = 0usize;
                for i in 0..labels.len() {
                    if labels[i].is_fixed() {
                        continue;
                    }
                    // Penalty paid by each choice for disagreeing with neighbours
                    let (mut fg_penalty, mut bg_penalty) = (0.0, 0.0);
                    edges.for_each_neighbor(i, |j, weight| {
                        if is_fg[j] {
                            bg_penalty += weight;
                        } else {
                            fg_penalty += weight;
                        }
                    });
                    let want_fg = fg_cost[i] + fg_penalty < bg_cost[i] + bg_penalty;
                    if want_fg != is_fg[i] {
                        is_fg[i] = want_fg;
                        changed += 1;
                    }
                }
                if changed == 0 {
                    break;
                }
            }

            for (label, &fg) in labels.iter_mut().zip(&is_fg) {
                if !label.is_fixed() {
                    *label = if fg {
                        Label::ProbableForeground
                    } else {
                        Label::ProbableBackground
                    };
                }
            }

            debug!(
                "GrabCut iteration {}: {} fg / {} bg samples, {} ICM sweeps",
                iteration,
                fg_samples.len(),
                bg_samples.len(),
                sweeps
            );
        }

        Mask::from_labels(width, height, labels).ok_or(SolverError::ShapeMismatch {
            image_width: width,
            image_height: height,
            mask_width: width,
            mask_height: height,
        })
    }
}

impl SegmentationSolver for GrabCutSolver {
    fn init_with_rect(&self, image: &RgbImage, rect: Rect) -> Result<Mask, SolverError> {
        let (width, height) = image.dimensions();
        let rect = rect.clip_to(width, height);
        let mut mask = Mask::filled(width, height, Label::Background);
        for y in rect.top..rect.top + rect.height {
            for x in rect.left..rect.left + rect.width {
                mask.set(x, y, Label::ProbableForeground);
            }
        }
        self.segment(image, mask.labels().to_vec())
    }

    fn refine_with_mask(&self, image: &RgbImage, mask: &Mask) -> Result<Mask, SolverError> {
        SolverError::check_shape(image, mask)?;
        self.segment(image, mask.labels().to_vec())
    }

    fn name(&self) -> &'static str {
        "grabcut"
    }
}

/// Contrast-sensitive 4-neighbourhood weights
struct EdgeWeights {
    width: usize,
    height: usize,
    /// Weight between pixel i and i + 1
    right: Vec<f64>,
    /// Weight between pixel i and i + width
    down: Vec<f64>,
}

impl EdgeWeights {
    fn new(colors: &[Color], width: usize, height: usize, gamma: f64) -> Self {
        let sq_dist = |a: Color, b: Color| {
            (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
        };

        let mut total = 0.0;
        let mut pairs = 0usize;
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if x + 1 < width {
                    total += sq_dist(colors[i], colors[i + 1]);
                    pairs += 1;
                }
                if y + 1 < height {
                    total += sq_dist(colors[i], colors[i + width]);
                    pairs += 1;
                }
            }
        }
        let beta = if total > 0.0 {
            pairs as f64 / (2.0 * total)
        } else {
            0.0
        };

        let mut right = vec![0.0; colors.len()];
        let mut down = vec![0.0; colors.len()];
        for y in 0..height {
            for x in 0..width {
                let i = y * width + x;
                if x + 1 < width {
                    right[i] = gamma * (-beta * sq_dist(colors[i], colors[i + 1])).exp();
                }
                if y + 1 < height {
                    down[i] = gamma * (-beta * sq_dist(colors[i], colors[i + width])).exp();
                }
            }
        }

        Self {
            width,
            height,
            right,
            down,
        }
    }

    fn for_each_neighbor(&self, i: usize, mut f: impl FnMut(usize, f64)) {
        let (x, y) = (i % self.width, i / self.width);
        if x > 0 {
            f(i - 1, self.right[i - 1]);
        }
        if x + 1 < self.width {
            f(i + 1, self.right[i]);
        }
        if y > 0 {
            f(i - self.width, self.down[i - self.width]);
        }
        if y + 1 < self.height {
            f(i + self.width, self.down[i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Dark image with a bright square at [25, 45)
    fn square_image() -> RgbImage {
        RgbImage::from_fn(100, 100, |x, y| {
            if (25..45).contains(&x) && (25..45).contains(&y) {
                Rgb([240, 240, 240])
            } else {
                Rgb([20, 20, 20])
            }
        })
    }

    #[test]
    fn test_rect_init_finds_square() {
        let solver = GrabCutSolver::default();
        let image = square_image();
        let mask = solver
            .init_with_rect(&image, Rect::new(10, 10, 50, 50))
            .unwrap();

        assert_eq!(mask.dimensions(), (100, 100));
        assert_eq!(mask.get(35, 35), Label::ProbableForeground);
        assert_eq!(mask.get(15, 15), Label::ProbableBackground);
        assert_eq!(mask.get(0, 0), Label::Background);
        assert_eq!(mask.get(90, 90), Label::Background);
        assert_eq!(mask.count(Label::Foreground), 0);
    }

    #[test]
    fn test_outside_rect_stays_fixed_background() {
        let solver = GrabCutSolver::default();
        let rect = Rect::new(10, 20, 30, 40);
        let mask = solver.init_with_rect(&square_image(), rect).unwrap();
        for y in 0..100 {
            for x in 0..100 {
                if !rect.contains(x, y) {
                    assert_eq!(mask.get(x, y), Label::Background);
                }
            }
        }
    }

    #[test]
    fn test_rect_is_clipped_to_image() {
        let solver = GrabCutSolver::default();
        let mask = solver
            .init_with_rect(&square_image(), Rect::new(20, 20, 500, 500))
            .unwrap();
        assert_eq!(mask.dimensions(), (100, 100));
        assert_eq!(mask.get(5, 5), Label::Background);
    }

    #[test]
    fn test_whole_image_rect_has_no_background_model() {
        let solver = GrabCutSolver::default();
        let result = solver.init_with_rect(&square_image(), Rect::new(0, 0, 100, 100));
        assert!(matches!(result, Err(SolverError::EmptyModel("background"))));
    }

    #[test]
    fn test_refine_keeps_fixed_labels() {
        let solver = GrabCutSolver::default();
        let image = square_image();
        let mut mask = solver
            .init_with_rect(&image, Rect::new(10, 10, 50, 50))
            .unwrap();
        for y in 5..25 {
            for x in 5..25 {
                mask.set(x, y, Label::Foreground);
            }
        }

        let refined = solver.refine_with_mask(&image, &mask).unwrap();
        for y in 0..100 {
            for x in 0..100 {
                if mask.get(x, y).is_fixed() {
                    assert_eq!(refined.get(x, y), mask.get(x, y));
                } else {
                    assert!(!refined.get(x, y).is_fixed());
                }
            }
        }
        assert!(refined.get(35, 35).is_foreground());
    }

    #[test]
    fn test_refine_rejects_mismatched_mask() {
        let solver = GrabCutSolver::default();
        let mask = Mask::filled(10, 10, Label::ProbableForeground);
        let result = solver.refine_with_mask(&square_image(), &mask);
        assert!(matches!(result, Err(SolverError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_deterministic() {
        let solver = GrabCutSolver::new(GrabCutSettings {
            iterations: 3,
            ..GrabCutSettings::default()
        });
        let image = square_image();
        let a = solver.init_with_rect(&image, Rect::new(10, 10, 50, 50)).unwrap();
        let b = solver.init_with_rect(&image, Rect::new(10, 10, 50, 50)).unwrap();
        assert_eq!(a, b);
    }
}
