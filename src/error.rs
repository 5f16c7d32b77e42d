use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum NnError {
    /// Non-positive sample count, dimension or learning rate.
    InvalidArgument(String),
    /// `backward` called without a matching `forward`, or with mismatched batches.
    PreconditionViolation(String),
    /// Activation name outside {relu, tanh, sigmoid}.
    UnrecognizedActivation(String),
    /// Shape errors from external input and non-finite results.
    Computation(String),
}

impl fmt::Display for NnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NnError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            NnError::PreconditionViolation(msg) => write!(f, "precondition violated: {msg}"),
            NnError::UnrecognizedActivation(name) => {
                write!(f, "unrecognized activation `{name}`")
            }
            NnError::Computation(msg) => write!(f, "computation error: {msg}"),
        }
    }
}

impl Error for NnError {}

pub type Result<T> = std::result::Result<T, NnError>;
