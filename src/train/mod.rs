pub mod config;
pub mod snapshot;
pub mod trainer;

pub use config::TrainConfig;
pub use snapshot::{DecisionGrid, FrameSnapshot};
pub use trainer::Trainer;
