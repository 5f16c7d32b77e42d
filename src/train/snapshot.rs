use ndarray::{Array1, Array2, Axis};

use crate::nn::mlp::Gradients;

/// Copy of everything a renderer reads after a frame of training.
///
/// The engine overwrites its cache on the next forward call, so a consumer
/// keeps these values instead of borrowing from the network.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub frame: usize,
    /// Steps completed before this frame started.
    pub step: usize,
    /// MSE of the last forward pass in this frame, before its update.
    pub loss: f64,
    /// Hidden activations `a1` of the last forward pass.
    pub hidden: Array2<f64>,
    pub w1: Array2<f64>,
    pub b1: Array2<f64>,
    pub w2: Array2<f64>,
    pub b2: Array2<f64>,
    pub gradients: Gradients<f64>,
}

impl FrameSnapshot {
    /// Height of the output layer's zero plane over hidden coordinates
    /// `(h1, h2)`: `-(W2[0,0] h1 + W2[1,0] h2 + B2[0]) / W2[2,0]`.
    ///
    /// `None` unless the network has at least three hidden units and a single
    /// output.
    pub fn hidden_plane(&self, h1: f64, h2: f64) -> Option<f64> {
        if self.w2.nrows() < 3 || self.w2.ncols() != 1 {
            return None;
        }
        Some(-(self.w2[[0, 0]] * h1 + self.w2[[1, 0]] * h2 + self.b2[[0, 0]]) / self.w2[[2, 0]])
    }

    /// Per hidden unit `(min - margin, max + margin)` of the activations.
    pub fn hidden_extent(&self, margin: f64) -> Vec<(f64, f64)> {
        self.hidden
            .axis_iter(Axis(1))
            .map(|col| {
                let (lo, hi) = col
                    .iter()
                    .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                        (lo.min(v), hi.max(v))
                    });
                (lo - margin, hi + margin)
            })
            .collect()
    }

    /// `|dW1| * scale`, one entry per input-to-hidden edge.
    pub fn edge_thickness(&self, scale: f64) -> Array2<f64> {
        self.gradients.d_w1.mapv(|g| g.abs() * scale)
    }
}

/// Network output sampled on a regular grid of the input plane.
#[derive(Debug, Clone)]
pub struct DecisionGrid {
    pub xs: Array1<f64>,
    pub ys: Array1<f64>,
    /// `values[[i, j]]` is the output at `(xs[j], ys[i])`.
    pub values: Array2<f64>,
}

impl DecisionGrid {
    /// Fraction of grid cells whose output is positive.
    pub fn positive_fraction(&self) -> f64 {
        let positive = self.values.iter().filter(|&&v| v > 0.0).count();
        positive as f64 / self.values.len().max(1) as f64
    }
}
