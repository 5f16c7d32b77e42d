use log::{debug, info, warn};
use ndarray::{Array1, Array2};

use super::{
    config::{TrainConfig, INPUT_DIM, OUTPUT_DIM},
    snapshot::{DecisionGrid, FrameSnapshot},
};
use crate::dataset::{self, Dataset};
use crate::error::{NnError, Result};
use crate::nn::{loss::mse, mlp::Mlp};

/// Drives full-batch training on the circle dataset and hands a
/// [`FrameSnapshot`] to the caller every `steps_per_frame` steps.
pub struct Trainer {
    config: TrainConfig,
    data: Dataset,
    mlp: Mlp<f64>,
    steps_done: usize,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Result<Self> {
        config.validate()?;
        if config.step_num % config.steps_per_frame != 0 {
            warn!(
                "step_num {} is not a multiple of {}, the last {} steps will not run",
                config.step_num,
                config.steps_per_frame,
                config.step_num % config.steps_per_frame
            );
        }

        let data = dataset::generate(config.n_samples)?;
        let mlp = Mlp::with_activation_name(
            INPUT_DIM,
            config.hidden_dim,
            OUTPUT_DIM,
            config.learning_rate,
            &config.activation,
        )?;

        Ok(Trainer {
            config,
            data,
            mlp,
            steps_done: 0,
        })
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    pub fn dataset(&self) -> &Dataset {
        &self.data
    }

    pub fn network(&self) -> &Mlp<f64> {
        &self.mlp
    }

    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    /// One forward and backward pass over the whole dataset. Returns the MSE
    /// measured before the update.
    pub fn step(&mut self) -> Result<f64> {
        let out = self.mlp.forward(&self.data.x)?;
        let loss = mse(&out, &self.data.y);
        self.mlp.backward(&self.data.x, &self.data.y)?;
        self.steps_done += 1;
        Ok(loss)
    }

    /// Runs `steps_per_frame` steps. The snapshot is labelled with the number
    /// of steps completed before the frame started.
    pub fn run_frame(&mut self) -> Result<FrameSnapshot> {
        let step = self.steps_done;
        let frame = step / self.config.steps_per_frame;
        let mut loss = f64::NAN;
        for _ in 0..self.config.steps_per_frame {
            loss = self.step()?;
        }

        let missing =
            || NnError::PreconditionViolation("frame finished without a training step".into());
        let hidden = self.mlp.hidden_activations().ok_or_else(missing)?.clone();
        let gradients = self.mlp.gradients().ok_or_else(missing)?.clone();

        debug!("frame {frame} (step {step}): loss {loss:.6}");

        Ok(FrameSnapshot {
            frame,
            step,
            loss,
            hidden,
            w1: self.mlp.w1().clone(),
            b1: self.mlp.b1().clone(),
            w2: self.mlp.w2().clone(),
            b2: self.mlp.b2().clone(),
            gradients,
        })
    }

    /// Runs every frame of the configured schedule, calling `on_frame` after
    /// each one. Returns the loss of the final frame, if any ran.
    pub fn run<F>(&mut self, mut on_frame: F) -> Result<Option<f64>>
    where
        F: FnMut(&Trainer, &FrameSnapshot),
    {
        let frames = self.config.frames();
        info!(
            "training {} activation, lr {}, hidden {}, {} frames of {} steps",
            self.mlp.activation(),
            self.config.learning_rate,
            self.config.hidden_dim,
            frames,
            self.config.steps_per_frame
        );

        let mut last = None;
        for _ in 0..frames {
            let snapshot = self.run_frame()?;
            last = Some(snapshot.loss);
            on_frame(self, &snapshot);
        }

        if let Some(loss) = last {
            info!("finished after {} steps, loss {loss:.6}", self.steps_done);
        }
        Ok(last)
    }

    /// `resolution` points on the diagonal of the data's bounding box,
    /// mapped into hidden space with the current first layer.
    pub fn hidden_path(&self, resolution: usize) -> Result<Array2<f64>> {
        if resolution == 0 {
            return Err(NnError::InvalidArgument("resolution must be positive".into()));
        }
        let bounds = self.data.bounds();
        let columns: Vec<Array1<f64>> = bounds
            .iter()
            .map(|&(lo, hi)| Array1::linspace(lo, hi, resolution))
            .collect();
        let points = Array2::from_shape_fn((resolution, columns.len()), |(i, j)| columns[j][i]);
        self.mlp.project_hidden(&points)
    }

    /// Network output on a `resolution x resolution` grid covering the data
    /// bounds widened by `margin`. Does not disturb the forward cache.
    pub fn decision_grid(&self, resolution: usize, margin: f64) -> Result<DecisionGrid> {
        if resolution == 0 {
            return Err(NnError::InvalidArgument("resolution must be positive".into()));
        }
        let bounds = self.data.bounds();
        let (x_lo, x_hi) = bounds[0];
        let (y_lo, y_hi) = bounds[1];
        let xs = Array1::linspace(x_lo - margin, x_hi + margin, resolution);
        let ys = Array1::linspace(y_lo - margin, y_hi + margin, resolution);

        let points = Array2::from_shape_fn((resolution * resolution, 2), |(k, c)| {
            if c == 0 {
                xs[k % resolution]
            } else {
                ys[k / resolution]
            }
        });
        let values = self
            .mlp
            .predict(&points)?
            .into_shape_with_order((resolution, resolution))
            .map_err(|e| NnError::Computation(e.to_string()))?;

        Ok(DecisionGrid { xs, ys, values })
    }
}
