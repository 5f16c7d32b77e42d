use anyhow::{Context, Result};
use circle_mlp::{TrainConfig, Trainer};
use log::info;

/// Usage: `circle_mlp [activation] [learning_rate] [step_num]`
fn config_from_args<I>(mut args: I) -> Result<TrainConfig>
where
    I: Iterator<Item = String>,
{
    let mut config = TrainConfig::default();
    if let Some(activation) = args.next() {
        config.activation = activation;
    }
    if let Some(lr) = args.next() {
        config.learning_rate = lr
            .parse()
            .with_context(|| format!("learning rate `{lr}` is not a number"))?;
    }
    if let Some(steps) = args.next() {
        config.step_num = steps
            .parse()
            .with_context(|| format!("step count `{steps}` is not a non-negative integer"))?;
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = config_from_args(std::env::args().skip(1))?;
    let mut trainer = Trainer::new(config).context("invalid training configuration")?;

    trainer.run(|trainer, snap| {
        if snap.frame % 10 != 0 {
            return;
        }
        let positive = trainer
            .decision_grid(100, 1.0)
            .map(|grid| grid.positive_fraction())
            .unwrap_or(f64::NAN);
        let edges = snap.edge_thickness(100.0);
        info!(
            "step {:>5}  loss {:.6}  positive area {:.3}  edge x1-h1 {:.3}  edge x2-h1 {:.3}",
            snap.step,
            snap.loss,
            positive,
            edges[[0, 0]],
            edges[[1, 0]]
        );
    })?;

    Ok(())
}
