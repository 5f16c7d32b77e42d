pub mod activation;
pub mod loss;
pub mod mlp;

pub use activation::{Activation, ActivationTypes};
pub use mlp::{ForwardCache, Gradients, Mlp};
