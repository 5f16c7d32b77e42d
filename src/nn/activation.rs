use std::fmt::{self, Display};

use log::warn;
use num_traits::Float;

use crate::error::{NnError, Result};

pub fn sigmoid<T>(z: T) -> T
where
    T: Float + From<f64>,
{
    let exp_neg_z = (-z).exp();
    T::one() / (T::one() + exp_neg_z)
}

/// Takes the sigmoid output `a`, not the pre-activation.
pub fn d_sigmoid<T>(a: T) -> T
where
    T: Float + From<f64>,
{
    a * (T::one() - a)
}

pub fn relu<T>(z: T) -> T
where
    T: Float + From<f64>,
{
    z.max(T::zero())
}

pub fn d_relu<T>(a: T) -> T
where
    T: Float + From<f64>,
{
    if a > T::zero() {
        T::one()
    } else {
        T::zero()
    }
}

pub fn tanh<T>(z: T) -> T
where
    T: Float + From<f64>,
{
    z.tanh()
}

/// `1 - tanh(a)^2` evaluated on the activation output `a`.
///
/// This squashes `a` through tanh a second time, so it is not the exact
/// derivative of `tanh(z)`. Backprop relies on this exact form.
pub fn d_tanh<T>(a: T) -> T
where
    T: Float + From<f64>,
{
    let t = a.tanh();
    T::one() - t * t
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationTypes {
    Relu,
    Sigmoid,
    Tanh,
}

impl ActivationTypes {
    /// Strict lookup by lowercase name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "relu" => Ok(ActivationTypes::Relu),
            "tanh" => Ok(ActivationTypes::Tanh),
            "sigmoid" => Ok(ActivationTypes::Sigmoid),
            other => Err(NnError::UnrecognizedActivation(other.to_string())),
        }
    }

    /// Like [`from_name`](Self::from_name), but any unknown name resolves to
    /// sigmoid. The fallback is reported with a warning.
    pub fn from_name_or_sigmoid(name: &str) -> Self {
        match Self::from_name(name) {
            Ok(kind) => kind,
            Err(err) => {
                warn!("{err}, falling back to sigmoid");
                ActivationTypes::Sigmoid
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationTypes::Relu => "relu",
            ActivationTypes::Sigmoid => "sigmoid",
            ActivationTypes::Tanh => "tanh",
        }
    }
}

impl Display for ActivationTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<T> Activation<T> for ActivationTypes
where
    T: Float + From<f64>,
{
    fn call(&self, x: T) -> T {
        match self {
            ActivationTypes::Relu => relu::<T>(x),
            ActivationTypes::Sigmoid => sigmoid::<T>(x),
            ActivationTypes::Tanh => tanh::<T>(x),
        }
    }

    fn call_derivative(&self, a: T) -> T {
        match self {
            ActivationTypes::Relu => d_relu::<T>(a),
            ActivationTypes::Sigmoid => d_sigmoid::<T>(a),
            ActivationTypes::Tanh => d_tanh::<T>(a),
        }
    }
}

/// Elementwise nonlinearity whose derivative is expressed in terms of its
/// own output.
pub trait Activation<T: Float + From<f64>> {
    fn call(&self, x: T) -> T;
    fn call_derivative(&self, a: T) -> T;
}
