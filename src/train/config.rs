use crate::dataset::DEFAULT_SAMPLES;
use crate::error::{NnError, Result};

/// Hyperparameters of a training run.
///
/// The input and output widths are fixed by the task (2-D points, one
/// regression output), only the hidden width is configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// `relu`, `tanh` or `sigmoid`; anything else trains as sigmoid.
    pub activation: String,
    pub learning_rate: f64,
    /// Total forward/backward steps.
    pub step_num: usize,
    pub hidden_dim: usize,
    pub n_samples: usize,
    /// Steps between two consumer snapshots.
    pub steps_per_frame: usize,
}

pub const INPUT_DIM: usize = 2;
pub const OUTPUT_DIM: usize = 1;

impl Default for TrainConfig {
    fn default() -> Self {
        TrainConfig {
            activation: "tanh".to_string(),
            learning_rate: 0.1,
            step_num: 1000,
            hidden_dim: 3,
            n_samples: DEFAULT_SAMPLES,
            steps_per_frame: 10,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) || !self.learning_rate.is_finite() {
            return Err(NnError::InvalidArgument(format!(
                "learning rate must be positive and finite, got {}",
                self.learning_rate
            )));
        }
        if self.hidden_dim == 0 {
            return Err(NnError::InvalidArgument("hidden_dim must be positive".into()));
        }
        if self.n_samples == 0 {
            return Err(NnError::InvalidArgument("n_samples must be positive".into()));
        }
        if self.steps_per_frame == 0 {
            return Err(NnError::InvalidArgument(
                "steps_per_frame must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Number of snapshots a full run produces; trailing steps that do not
    /// fill a frame are dropped.
    pub fn frames(&self) -> usize {
        self.step_num / self.steps_per_frame.max(1)
    }
}
