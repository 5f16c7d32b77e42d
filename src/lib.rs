pub mod dataset;
pub mod error;
pub mod nn;
pub mod train;

pub use dataset::{generate, Dataset};
pub use error::NnError;
pub use nn::{ActivationTypes, Mlp};
pub use train::{TrainConfig, Trainer};

#[test]
fn circle_scenario_matches_scalar_reference() {
    use approx::assert_abs_diff_eq;

    let data = generate(4).unwrap();
    assert_eq!(data, generate(4).unwrap());

    // pinned draw of the seeded generators
    let golden_x = ndarray::array![
        [0.7128130103834549, 0.8583314468179001],
        [-2.4362438894664367, 0.1633442588933682],
        [-1.2750102039848832, 1.2871709906391997],
        [-1.4814075521794101, 0.6125948159598311]
    ];
    assert_eq!(data.x, golden_x);
    assert_eq!(data.y, ndarray::array![[1.0], [1.0], [1.0], [1.0]]);
    for i in 0..4 {
        let r2 = data.x[[i, 0]].powi(2) + data.x[[i, 1]].powi(2);
        assert_eq!(data.y[[i, 0]], if r2 > 1.0 { 1.0 } else { -1.0 });
    }

    let lr = 0.1;
    let mut mlp = Mlp::new(2, 3, 1, lr, ActivationTypes::Tanh).unwrap();
    let w1 = mlp.w1().clone();
    let w2 = mlp.w2().clone();

    let out = mlp.forward(&data.x).unwrap();
    assert_abs_diff_eq!(
        out,
        ndarray::array![
            [-0.6324797011512309],
            [0.7446185378122175],
            [0.40782053612679237],
            [0.5420364978560588]
        ],
        epsilon = 1e-12
    );

    // same computation, one scalar at a time (biases start at zero)
    let m = 4;
    let mut a1 = [[0.0_f64; 3]; 4];
    let mut expected_out = [0.0_f64; 4];
    for i in 0..m {
        for h in 0..3 {
            let z = data.x[[i, 0]] * w1[[0, h]] + data.x[[i, 1]] * w1[[1, h]];
            a1[i][h] = z.tanh();
            expected_out[i] += a1[i][h] * w2[[h, 0]];
        }
        assert_abs_diff_eq!(out[[i, 0]], expected_out[i], epsilon = 1e-12);
    }

    let grads = mlp.backward(&data.x, &data.y).unwrap().clone();
    assert_abs_diff_eq!(
        grads.d_w1,
        ndarray::array![
            [-0.04950288126014883, -0.0037604061253532607, -0.00511006299920181],
            [0.2158560283262828, -0.07770531334129162, -0.07305646142700406]
        ],
        epsilon = 1e-12
    );

    let dz2: Vec<f64> = (0..m)
        .map(|i| 2.0 * (expected_out[i] - data.y[[i, 0]]) / m as f64)
        .collect();
    assert_abs_diff_eq!(grads.d_b2[[0, 0]], dz2.iter().sum::<f64>(), epsilon = 1e-12);

    for h in 0..3 {
        let d_w2: f64 = (0..m).map(|i| a1[i][h] * dz2[i]).sum();
        assert_abs_diff_eq!(grads.d_w2[[h, 0]], d_w2, epsilon = 1e-12);

        let dz1: Vec<f64> = (0..m)
            .map(|i| dz2[i] * w2[[h, 0]] * (1.0 - a1[i][h].tanh().powi(2)))
            .collect();
        assert_abs_diff_eq!(grads.d_b1[[0, h]], dz1.iter().sum::<f64>(), epsilon = 1e-12);

        for r in 0..2 {
            let d_w1: f64 = (0..m).map(|i| data.x[[i, r]] * dz1[i]).sum::<f64>() / m as f64;
            assert_abs_diff_eq!(grads.d_w1[[r, h]], d_w1, epsilon = 1e-12);
            assert_abs_diff_eq!(mlp.w1()[[r, h]], w1[[r, h]] - lr * d_w1, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(mlp.w2()[[h, 0]], w2[[h, 0]] - lr * grads.d_w2[[h, 0]], epsilon = 1e-12);
    }
}
