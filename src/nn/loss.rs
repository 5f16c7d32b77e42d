use ndarray::{Array2, ScalarOperand};
use num_traits::Float;

/// Mean squared error over every entry, `mean((y_hat - y)^2)`.
pub fn mse<T>(y_hat: &Array2<T>, y: &Array2<T>) -> T
where
    T: Float + From<f64> + 'static,
{
    let n: T = (y.len() as f64).into();
    (y_hat - y).mapv(|v| v * v).sum() / n
}

/// Gradient of [`mse`] with respect to `y_hat` for a single-output network,
/// averaged over the `m` rows: `2 (y_hat - y) / m`.
pub fn d_mse<T>(y_hat: &Array2<T>, y: &Array2<T>) -> Array2<T>
where
    T: Float + From<f64> + 'static + ScalarOperand,
{
    let m: T = (y.nrows() as f64).into();
    let two: T = 2.0_f64.into();
    (y_hat - y).mapv(|v| two * v / m)
}
