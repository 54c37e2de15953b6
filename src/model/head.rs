use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;

use super::layers::{Activation, Dense, Dropout};
use crate::config::NetworkConfig;
use crate::error::{PortfolioError, Result};

/// Dense stack ending in a softmax, so every output row is a simplex vector.
///
/// No cash slot exists: the whole portfolio is spread over the tracked assets.
#[derive(Debug, Clone)]
pub struct AllocationHead {
    dense1: Dense,
    dense2: Dense,
    output: Dense,
    dropout: Dropout,
    l2_reg: f32,
}

impl AllocationHead {
    pub fn new(input_dim: usize, num_assets: usize, config: &NetworkConfig, rng: &mut StdRng) -> Self {
        Self {
            dense1: Dense::new(input_dim, config.dense_units1, Activation::Relu, rng),
            dense2: Dense::new(config.dense_units1, config.dense_units2, Activation::Relu, rng),
            output: Dense::new(config.dense_units2, num_assets, Activation::Softmax, rng),
            dropout: Dropout::new(config.head_dropout),
            l2_reg: config.l2_reg,
        }
    }

    pub fn input_dim(&self) -> usize {
        self.dense1.weight.nrows()
    }

    pub fn num_assets(&self) -> usize {
        self.output.output_dim()
    }

    /// (batch, context_dim) -> (batch, assets)
    pub fn forward(&self, x: ArrayView2<f32>, train: bool) -> Result<Array2<f32>> {
        if x.ncols() != self.input_dim() {
            return Err(PortfolioError::ShapeMismatch {
                context: "allocation head input",
                expected: vec![x.nrows(), self.input_dim()],
                actual: vec![x.nrows(), x.ncols()],
            });
        }
        let x = self.dropout.apply(self.dense1.forward(x), train);
        let x = self.dropout.apply(self.dense2.forward(x.view()), train);
        Ok(self.output.forward(x.view()))
    }

    /// Weight-decay term over the hidden kernels, for an optimizer to add to
    /// its loss.
    pub fn l2_penalty(&self) -> f32 {
        self.l2_reg * (self.dense1.squared_norm() + self.dense2.squared_norm())
    }

    pub fn param_count(&self) -> usize {
        self.dense1.param_count() + self.dense2.param_count() + self.output.param_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn head(input_dim: usize, num_assets: usize) -> AllocationHead {
        let mut rng = StdRng::seed_from_u64(21);
        let config = NetworkConfig {
            dense_units1: 16,
            dense_units2: 8,
            ..Default::default()
        };
        AllocationHead::new(input_dim, num_assets, &config, &mut rng)
    }

    #[test]
    fn outputs_are_simplex_vectors() {
        let head = head(6, 4);
        let x = Array2::from_shape_fn((5, 6), |(i, j)| ((i * 7 + j) as f32).sin() * 3.0);
        for train in [false, true] {
            let weights = head.forward(x.view(), train).unwrap();
            assert_eq!(weights.dim(), (5, 4));
            for row in weights.rows() {
                assert!((row.sum() - 1.0).abs() <= 1e-5);
                assert!(row.iter().all(|&w| (0.0..=1.0).contains(&w)));
            }
        }
    }

    #[test]
    fn l2_penalty_scales_with_coefficient() {
        let head = head(6, 4);
        let expected = 0.0001 * (head.dense1.squared_norm() + head.dense2.squared_norm());
        assert!((head.l2_penalty() - expected).abs() < 1e-9);
        assert!(head.l2_penalty() > 0.0);
    }

    #[test]
    fn wrong_context_width_rejected() {
        let head = head(6, 4);
        let x = Array2::<f32>::zeros((1, 5));
        assert!(head.forward(x.view(), false).is_err());
    }
}
