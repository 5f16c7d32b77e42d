use ndarray::{Array2, Axis, ScalarOperand};
use num_traits::Float;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use super::{
    activation::{Activation, ActivationTypes},
    loss::{d_mse, mse},
};
use crate::error::{NnError, Result};

/// Seed of the generator used for weight initialization.
pub const INIT_SEED: u64 = 0;

/// Intermediate values of the most recent forward pass.
///
/// Overwritten by every call to [`Mlp::forward`]; anything a caller wants to
/// keep across steps has to be cloned out before the next forward call.
#[derive(Debug, Clone)]
pub struct ForwardCache<T> {
    pub z1: Array2<T>,  // (m, hidden_dim)
    pub a1: Array2<T>,  // (m, hidden_dim)
    pub z2: Array2<T>,  // (m, output_dim)
    pub out: Array2<T>, // (m, output_dim), identity output activation
}

/// Gradients produced by one call to [`Mlp::backward`].
#[derive(Debug, Clone)]
pub struct Gradients<T> {
    pub d_w1: Array2<T>, // (input_dim, hidden_dim)
    pub d_b1: Array2<T>, // (1, hidden_dim)
    pub d_w2: Array2<T>, // (hidden_dim, output_dim)
    pub d_b2: Array2<T>, // (1, output_dim)
}

impl<T: Float> Gradients<T> {
    pub fn is_finite(&self) -> bool {
        [&self.d_w1, &self.d_b1, &self.d_w2, &self.d_b2]
            .iter()
            .all(|g| g.iter().all(|v| v.is_finite()))
    }
}

/// Two-layer perceptron trained with full-batch gradient descent on MSE.
#[derive(Debug, Clone)]
pub struct Mlp<T = f64>
where
    T: Float + From<f64>,
{
    w1: Array2<T>, // (input_dim, hidden_dim)
    b1: Array2<T>, // (1, hidden_dim)
    w2: Array2<T>, // (hidden_dim, output_dim)
    b2: Array2<T>, // (1, output_dim)
    lr: T,
    activation: ActivationTypes,
    cache: Option<ForwardCache<T>>,
    // true between a forward call and the backward call that consumes it
    cache_pending: bool,
    gradients: Option<Gradients<T>>,
}

fn randn_scaled<T, R>(rng: &mut R, rows: usize, cols: usize, fan_in: usize) -> Array2<T>
where
    T: Float + From<f64>,
    R: Rng,
{
    let scale = (fan_in as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| {
        let v: f64 = StandardNormal.sample(rng);
        (v / scale).into()
    })
}

impl<T> Mlp<T>
where
    T: Float + From<f64> + 'static + ScalarOperand,
{
    pub fn new(
        input_dim: usize,
        hidden_dim: usize,
        output_dim: usize,
        lr: T,
        activation: ActivationTypes,
    ) -> Result<Self> {
        if input_dim == 0 || hidden_dim == 0 || output_dim == 0 {
            return Err(NnError::InvalidArgument(format!(
                "layer sizes must be positive, got {input_dim}x{hidden_dim}x{output_dim}"
            )));
        }
        if !(lr > T::zero()) || !lr.is_finite() {
            return Err(NnError::InvalidArgument(
                "learning rate must be positive and finite".to_string(),
            ));
        }

        let mut rng = StdRng::seed_from_u64(INIT_SEED);
        let w1 = randn_scaled(&mut rng, input_dim, hidden_dim, input_dim);
        let w2 = randn_scaled(&mut rng, hidden_dim, output_dim, hidden_dim);

        Ok(Mlp {
            w1,
            b1: Array2::zeros((1, hidden_dim)),
            w2,
            b2: Array2::zeros((1, output_dim)),
            lr,
            activation,
            cache: None,
            cache_pending: false,
            gradients: None,
        })
    }

    /// Builds the network from an activation name; unknown names behave as
    /// sigmoid.
    pub fn with_activation_name(
        input_dim: usize,
        hidden_dim: usize,
        output_dim: usize,
        lr: T,
        activation: &str,
    ) -> Result<Self> {
        let kind = ActivationTypes::from_name_or_sigmoid(activation);
        Self::new(input_dim, hidden_dim, output_dim, lr, kind)
    }

    pub fn input_dim(&self) -> usize {
        self.w1.nrows()
    }

    pub fn hidden_dim(&self) -> usize {
        self.w1.ncols()
    }

    pub fn output_dim(&self) -> usize {
        self.w2.ncols()
    }

    pub fn learning_rate(&self) -> T {
        self.lr
    }

    pub fn activation(&self) -> ActivationTypes {
        self.activation
    }

    pub fn w1(&self) -> &Array2<T> {
        &self.w1
    }

    pub fn b1(&self) -> &Array2<T> {
        &self.b1
    }

    pub fn w2(&self) -> &Array2<T> {
        &self.w2
    }

    pub fn b2(&self) -> &Array2<T> {
        &self.b2
    }

    pub fn cache(&self) -> Option<&ForwardCache<T>> {
        self.cache.as_ref()
    }

    /// Hidden activations `a1` from the last forward pass.
    pub fn hidden_activations(&self) -> Option<&Array2<T>> {
        self.cache.as_ref().map(|c| &c.a1)
    }

    /// Gradients from the last backward pass.
    pub fn gradients(&self) -> Option<&Gradients<T>> {
        self.gradients.as_ref()
    }

    fn check_input(&self, x: &Array2<T>) -> Result<()> {
        if x.ncols() != self.input_dim() {
            return Err(NnError::Computation(format!(
                "input has {} columns, network expects {}",
                x.ncols(),
                self.input_dim()
            )));
        }
        Ok(())
    }

    fn hidden(&self, x: &Array2<T>) -> Result<(Array2<T>, Array2<T>)> {
        self.check_input(x)?;
        let z1 = x.dot(&self.w1) + &self.b1;
        let a1 = z1.mapv(|v| self.activation.call(v));
        Ok((z1, a1))
    }

    fn propagate(&self, x: &Array2<T>) -> Result<ForwardCache<T>> {
        let (z1, a1) = self.hidden(x)?;
        let z2 = a1.dot(&self.w2) + &self.b2;
        let out = z2.clone();
        Ok(ForwardCache { z1, a1, z2, out })
    }

    /// Runs the network on `x` (shape `(m, input_dim)`) and stores the
    /// intermediate values for the next [`backward`](Self::backward).
    pub fn forward(&mut self, x: &Array2<T>) -> Result<Array2<T>> {
        self.cache = None;
        self.cache_pending = false;

        let cache = self.propagate(x)?;
        if cache.out.iter().any(|v| !v.is_finite()) {
            return Err(NnError::Computation(
                "forward pass produced a non-finite output".to_string(),
            ));
        }
        let out = cache.out.clone();
        self.cache = Some(cache);
        self.cache_pending = true;
        Ok(out)
    }

    /// Network output for `x` without touching the forward cache.
    pub fn predict(&self, x: &Array2<T>) -> Result<Array2<T>> {
        Ok(self.propagate(x)?.out)
    }

    /// Maps input points into hidden space, `activate(x W1 + B1)`, without
    /// touching the forward cache.
    pub fn project_hidden(&self, x: &Array2<T>) -> Result<Array2<T>> {
        Ok(self.hidden(x)?.1)
    }

    /// MSE of the current parameters on `(x, y)`.
    pub fn loss(&self, x: &Array2<T>, y: &Array2<T>) -> Result<T> {
        let y_hat = self.predict(x)?;
        if y_hat.dim() != y.dim() {
            return Err(NnError::Computation(format!(
                "target shape {:?} does not match output shape {:?}",
                y.dim(),
                y_hat.dim()
            )));
        }
        Ok(mse(&y_hat, y))
    }

    /// Backpropagates the MSE between the cached output and `y`, then applies
    /// one gradient-descent step to all four parameters.
    ///
    /// Must follow a [`forward`](Self::forward) call on the same `x`. The
    /// bias gradients are batch sums; `d_w1` is additionally divided by the
    /// batch size.
    pub fn backward(&mut self, x: &Array2<T>, y: &Array2<T>) -> Result<&Gradients<T>> {
        let cache = match (&self.cache, self.cache_pending) {
            (Some(cache), true) => cache,
            _ => {
                return Err(NnError::PreconditionViolation(
                    "backward requires a forward call since the last update".to_string(),
                ))
            }
        };
        if x.nrows() != y.nrows() {
            return Err(NnError::PreconditionViolation(format!(
                "x has {} rows but y has {}",
                x.nrows(),
                y.nrows()
            )));
        }
        if x.nrows() != cache.a1.nrows() {
            return Err(NnError::PreconditionViolation(format!(
                "batch of {} rows does not match the cached forward pass of {}",
                x.nrows(),
                cache.a1.nrows()
            )));
        }
        if y.ncols() != self.output_dim() {
            return Err(NnError::PreconditionViolation(format!(
                "y has {} columns, network outputs {}",
                y.ncols(),
                self.output_dim()
            )));
        }
        self.check_input(x)?;

        let m: T = (y.nrows() as f64).into();

        let dz2 = d_mse(&cache.out, y);
        let d_w2 = cache.a1.t().dot(&dz2);
        let d_b2 = dz2.sum_axis(Axis(0)).insert_axis(Axis(0));

        let d_act = cache.a1.mapv(|v| self.activation.call_derivative(v));
        let dz1 = dz2.dot(&self.w2.t()) * &d_act;
        let d_w1 = x.t().dot(&dz1).mapv(|v| v / m);
        let d_b1 = dz1.sum_axis(Axis(0)).insert_axis(Axis(0));

        let grads = Gradients {
            d_w1,
            d_b1,
            d_w2,
            d_b2,
        };
        if !grads.is_finite() {
            return Err(NnError::Computation(
                "backward pass produced non-finite gradients".to_string(),
            ));
        }

        self.w1 = &self.w1 - &(&grads.d_w1 * self.lr);
        self.b1 = &self.b1 - &(&grads.d_b1 * self.lr);
        self.w2 = &self.w2 - &(&grads.d_w2 * self.lr);
        self.b2 = &self.b2 - &(&grads.d_b2 * self.lr);
        self.cache_pending = false;

        Ok(&*self.gradients.insert(grads))
    }
}

#[cfg(test)]
mod tests {
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use ndarray::array;

    use super::*;

    fn sample_batch() -> (Array2<f64>, Array2<f64>) {
        let x = array![
            [0.3, -1.2],
            [1.5, 0.4],
            [-0.7, -0.2],
            [0.1, 0.9],
            [-1.1, 1.3]
        ];
        let y = array![[1.0], [1.0], [-1.0], [-1.0], [1.0]];
        (x, y)
    }

    #[test]
    fn parameter_shapes_after_construction() {
        let mlp = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Tanh).unwrap();
        assert_eq!(mlp.w1().dim(), (2, 3));
        assert_eq!(mlp.b1().dim(), (1, 3));
        assert_eq!(mlp.w2().dim(), (3, 1));
        assert_eq!(mlp.b2().dim(), (1, 1));
        assert!(mlp.b1().iter().all(|&v| v == 0.0));
        assert!(mlp.b2().iter().all(|&v| v == 0.0));
        assert!(mlp.cache().is_none());
        assert!(mlp.gradients().is_none());
    }

    #[test]
    fn weights_are_seeded_normals_scaled_by_fan_in() {
        let mlp = Mlp::new(2, 4, 1, 0.1, ActivationTypes::Relu).unwrap();

        let mut rng = StdRng::seed_from_u64(INIT_SEED);
        let w1: Vec<f64> = (0..8)
            .map(|_| {
                let v: f64 = StandardNormal.sample(&mut rng);
                v / 2.0_f64.sqrt()
            })
            .collect();
        let w2: Vec<f64> = (0..4)
            .map(|_| {
                let v: f64 = StandardNormal.sample(&mut rng);
                v / 2.0
            })
            .collect();

        assert_eq!(mlp.w1(), &Array2::from_shape_vec((2, 4), w1).unwrap());
        assert_eq!(mlp.w2(), &Array2::from_shape_vec((4, 1), w2).unwrap());
    }

    #[test]
    fn construction_is_deterministic() {
        let a = Mlp::new(2, 5, 1, 0.1, ActivationTypes::Tanh).unwrap();
        let b = Mlp::new(2, 5, 1, 0.5, ActivationTypes::Relu).unwrap();
        assert_eq!(a.w1(), b.w1());
        assert_eq!(a.w2(), b.w2());
    }

    #[test]
    fn rejects_invalid_arguments() {
        for (i, h, o) in [(0, 3, 1), (2, 0, 1), (2, 3, 0)] {
            assert!(matches!(
                Mlp::new(i, h, o, 0.1, ActivationTypes::Tanh),
                Err(NnError::InvalidArgument(_))
            ));
        }
        for lr in [0.0, -0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Mlp::new(2, 3, 1, lr, ActivationTypes::Tanh),
                Err(NnError::InvalidArgument(_))
            ));
        }
    }

    #[test]
    fn forward_shapes_and_leaves_parameters_alone() {
        let (x, _) = sample_batch();
        let mut mlp = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Tanh).unwrap();
        let before = mlp.clone();

        let out = mlp.forward(&x).unwrap();
        assert_eq!(out.dim(), (5, 1));

        let cache = mlp.cache().unwrap();
        assert_eq!(cache.z1.dim(), (5, 3));
        assert_eq!(cache.a1.dim(), (5, 3));
        assert_eq!(cache.z2, cache.out);
        assert_eq!(cache.out, out);
        assert_eq!(mlp.w1(), before.w1());
        assert_eq!(mlp.w2(), before.w2());
    }

    #[test]
    fn forward_rejects_wrong_input_width() {
        let mut mlp = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Tanh).unwrap();
        let x = Array2::<f64>::zeros((4, 3));
        assert!(matches!(mlp.forward(&x), Err(NnError::Computation(_))));
        assert!(mlp.cache().is_none());
    }

    #[test]
    fn backward_requires_forward() {
        let (x, y) = sample_batch();
        let mut mlp = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Sigmoid).unwrap();
        assert!(matches!(
            mlp.backward(&x, &y),
            Err(NnError::PreconditionViolation(_))
        ));

        mlp.forward(&x).unwrap();
        mlp.backward(&x, &y).unwrap();
        // the cache stays readable but cannot feed a second update
        assert!(mlp.hidden_activations().is_some());
        assert!(matches!(
            mlp.backward(&x, &y),
            Err(NnError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn backward_rejects_mismatched_batches() {
        let (x, y) = sample_batch();
        let mut mlp = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Sigmoid).unwrap();
        mlp.forward(&x).unwrap();

        let short_y = y.slice(ndarray::s![..3, ..]).to_owned();
        assert!(matches!(
            mlp.backward(&x, &short_y),
            Err(NnError::PreconditionViolation(_))
        ));

        let short_x = x.slice(ndarray::s![..3, ..]).to_owned();
        assert!(matches!(
            mlp.backward(&short_x, &short_y),
            Err(NnError::PreconditionViolation(_))
        ));

        // a well-formed call still succeeds afterwards
        assert!(mlp.backward(&x, &y).is_ok());
    }

    #[test]
    fn gradients_match_parameter_shapes_and_update_is_plain_descent() {
        let (x, y) = sample_batch();
        let mut mlp = Mlp::new(2, 4, 1, 0.05, ActivationTypes::Tanh).unwrap();
        let before = mlp.clone();

        mlp.forward(&x).unwrap();
        let grads = mlp.backward(&x, &y).unwrap().clone();

        assert_eq!(grads.d_w1.dim(), before.w1().dim());
        assert_eq!(grads.d_b1.dim(), before.b1().dim());
        assert_eq!(grads.d_w2.dim(), before.w2().dim());
        assert_eq!(grads.d_b2.dim(), before.b2().dim());

        assert_abs_diff_eq!(mlp.w1(), &(before.w1() - &(&grads.d_w1 * 0.05)), epsilon = 1e-15);
        assert_abs_diff_eq!(mlp.b1(), &(before.b1() - &(&grads.d_b1 * 0.05)), epsilon = 1e-15);
        assert_abs_diff_eq!(mlp.w2(), &(before.w2() - &(&grads.d_w2 * 0.05)), epsilon = 1e-15);
        assert_abs_diff_eq!(mlp.b2(), &(before.b2() - &(&grads.d_b2 * 0.05)), epsilon = 1e-15);
    }

    #[test]
    fn fixed_parameters_step_on_both_labels() {
        let x = array![
            [0.5, -0.25],
            [1.5, 0.75],
            [-0.2, 0.6],
            [-1.1, -0.9],
            [0.05, 0.1]
        ];
        let y = x.map_axis(Axis(1), |r| crate::dataset::circle_label(r[0], r[1]));
        let y = y.insert_axis(Axis(1));
        assert_eq!(y, array![[-1.0], [1.0], [-1.0], [1.0], [-1.0]]);

        let mut mlp = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Tanh).unwrap();
        mlp.w1 = array![[0.4, -0.7, 0.25], [-0.3, 0.2, 0.9]];
        mlp.b1 = array![[0.1, -0.05, 0.0]];
        mlp.w2 = array![[0.6], [-0.8], [0.35]];
        mlp.b2 = array![[0.2]];

        let out = mlp.forward(&x).unwrap();
        assert_abs_diff_eq!(
            out,
            array![
                [0.7176498450917435],
                [1.33079687980971],
                [0.09821344907672927],
                [-0.5145879841192487],
                [0.34153144958314546]
            ],
            epsilon = 1e-12
        );

        let grads = mlp.backward(&x, &y).unwrap().clone();
        assert_abs_diff_eq!(
            grads.d_w1,
            array![
                [0.12855062000441123, -0.14062834592473678, 0.05483822413044428],
                [0.09402193284163449, -0.1044967800727598, 0.03238050770763277]
            ],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            grads.d_b1,
            array![[0.6439085655915666, -0.9069738505635476, 0.4570930641061983]],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            grads.d_w2,
            array![[0.3255409005689277], [-0.6303399554504725], [0.7709781713413616]],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(grads.d_b2, array![[1.1894414557768318]], epsilon = 1e-12);

        assert_abs_diff_eq!(
            mlp.w1(),
            &array![
                [0.3871449379995589, -0.6859371654075263, 0.24451617758695557],
                [-0.30940219328416346, 0.210449678007276, 0.8967619492292368]
            ],
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(mlp.b2(), &array![[0.08105585442231683]], epsilon = 1e-12);
    }

    fn numeric_grad<F>(mlp: &Mlp<f64>, x: &Array2<f64>, y: &Array2<f64>, perturb: F) -> f64
    where
        F: Fn(&mut Mlp<f64>, f64),
    {
        let eps = 1e-6;
        let mut plus = mlp.clone();
        perturb(&mut plus, eps);
        let mut minus = mlp.clone();
        perturb(&mut minus, -eps);
        (plus.loss(x, y).unwrap() - minus.loss(x, y).unwrap()) / (2.0 * eps)
    }

    #[test]
    fn analytic_gradients_agree_with_finite_differences() {
        let (x, y) = sample_batch();
        let m = x.nrows() as f64;
        let reference = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Sigmoid).unwrap();

        let mut trained = reference.clone();
        trained.forward(&x).unwrap();
        let grads = trained.backward(&x, &y).unwrap().clone();

        for i in 0..3 {
            let fd = numeric_grad(&reference, &x, &y, |n, e| n.w2[[i, 0]] += e);
            assert_relative_eq!(grads.d_w2[[i, 0]], fd, epsilon = 1e-7, max_relative = 1e-5);

            let fd = numeric_grad(&reference, &x, &y, |n, e| n.b1[[0, i]] += e);
            assert_relative_eq!(grads.d_b1[[0, i]], fd, epsilon = 1e-7, max_relative = 1e-5);

            for r in 0..2 {
                // d_w1 carries an extra 1/m
                let fd = numeric_grad(&reference, &x, &y, |n, e| n.w1[[r, i]] += e);
                assert_relative_eq!(grads.d_w1[[r, i]] * m, fd, epsilon = 1e-7, max_relative = 1e-5);
            }
        }

        let fd = numeric_grad(&reference, &x, &y, |n, e| n.b2[[0, 0]] += e);
        assert_relative_eq!(grads.d_b2[[0, 0]], fd, epsilon = 1e-7, max_relative = 1e-5);
    }

    #[test]
    fn output_layer_gradients_hold_for_tanh() {
        let (x, y) = sample_batch();
        let reference = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Tanh).unwrap();
        let mut trained = reference.clone();
        trained.forward(&x).unwrap();
        let grads = trained.backward(&x, &y).unwrap().clone();

        for i in 0..3 {
            let fd = numeric_grad(&reference, &x, &y, |n, e| n.w2[[i, 0]] += e);
            assert_relative_eq!(grads.d_w2[[i, 0]], fd, epsilon = 1e-7, max_relative = 1e-5);
        }
    }

    #[test]
    fn unknown_activation_matches_sigmoid() {
        let (x, y) = sample_batch();
        let mut fallback = Mlp::with_activation_name(2, 3, 1, 0.1, "swish").unwrap();
        let mut sigmoid = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Sigmoid).unwrap();
        assert_eq!(fallback.activation(), ActivationTypes::Sigmoid);

        for _ in 0..5 {
            assert_eq!(fallback.forward(&x).unwrap(), sigmoid.forward(&x).unwrap());
            let a = fallback.backward(&x, &y).unwrap().clone();
            let b = sigmoid.backward(&x, &y).unwrap().clone();
            assert_eq!(a.d_w1, b.d_w1);
            assert_eq!(a.d_b2, b.d_b2);
        }
    }

    #[test]
    fn predict_and_project_leave_cache_untouched() {
        let (x, _) = sample_batch();
        let mut mlp = Mlp::new(2, 3, 1, 0.1, ActivationTypes::Relu).unwrap();
        let out = mlp.forward(&x).unwrap();

        let grid = array![[0.0, 0.0], [2.0, -2.0]];
        let pred = mlp.predict(&grid).unwrap();
        let hidden = mlp.project_hidden(&grid).unwrap();

        assert_eq!(pred.dim(), (2, 1));
        assert_eq!(hidden.dim(), (2, 3));
        assert_eq!(mlp.cache().unwrap().out, out);
        assert_eq!(mlp.predict(&x).unwrap(), out);
    }

    #[test]
    fn loss_decreases_with_small_steps() {
        let (x, y) = sample_batch();
        for kind in [ActivationTypes::Sigmoid, ActivationTypes::Relu] {
            let mut mlp = Mlp::new(2, 3, 1, 0.01, kind).unwrap();
            let mut losses = Vec::new();
            for _ in 0..100 {
                let out = mlp.forward(&x).unwrap();
                losses.push(mse(&out, &y));
                mlp.backward(&x, &y).unwrap();
            }
            let head: f64 = losses[..10].iter().sum::<f64>() / 10.0;
            let tail: f64 = losses[90..].iter().sum::<f64>() / 10.0;
            assert!(tail < head, "{kind}: {tail} >= {head}");
        }
    }
}
