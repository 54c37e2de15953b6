use ndarray::{Array2, ArrayView2, ArrayView3};
use rand::rngs::StdRng;

use super::layers::{Conv1d, Dropout, LayerNorm, Lstm};
use crate::config::{MarketConfig, NetworkConfig};
use crate::error::{PortfolioError, Result};

/// Per-asset temporal encoder: two same-length convolutions, then two LSTMs,
/// the second collapsing the window to its final hidden state.
///
/// One instance is shared by every asset, so assets are encoded with the same
/// weights.
#[derive(Debug, Clone)]
pub struct AssetFeatureEncoder {
    conv1: Conv1d,
    conv2: Conv1d,
    lstm1: Lstm,
    lstm2: Lstm,
    dropout: Dropout,
    norm: LayerNorm,
    window_size: usize,
    features: usize,
}

impl AssetFeatureEncoder {
    pub fn new(market: &MarketConfig, config: &NetworkConfig, rng: &mut StdRng) -> Self {
        let features = market.features_per_asset;
        Self {
            conv1: Conv1d::new(features, config.cnn_filters1, config.cnn_kernel_size, rng),
            conv2: Conv1d::new(
                config.cnn_filters1,
                config.cnn_filters2,
                config.cnn_kernel_size,
                rng,
            ),
            lstm1: Lstm::new(config.cnn_filters2, config.lstm_units1, rng),
            lstm2: Lstm::new(config.lstm_units1, config.lstm_units2, rng),
            dropout: Dropout::new(config.encoder_dropout),
            norm: LayerNorm::new(config.lstm_units2),
            window_size: market.window_size,
            features,
        }
    }

    pub fn latent_dim(&self) -> usize {
        self.lstm2.units()
    }

    /// (batch, window, features) -> (batch, latent)
    pub fn forward(&self, x: ArrayView3<f32>, train: bool) -> Result<Array2<f32>> {
        let (batch, window, features) = x.dim();
        if window != self.window_size || features != self.features {
            return Err(PortfolioError::ShapeMismatch {
                context: "asset encoder input",
                expected: vec![batch, self.window_size, self.features],
                actual: vec![batch, window, features],
            });
        }

        let mut latents = Array2::zeros((batch, self.latent_dim()));
        for (mut out, sample) in latents.rows_mut().into_iter().zip(x.outer_iter()) {
            out.assign(&self.encode_window(sample, train));
        }
        Ok(latents)
    }

    fn encode_window(&self, x: ArrayView2<f32>, train: bool) -> ndarray::Array1<f32> {
        let x = self.dropout.apply(self.conv1.forward(x), train);
        let x = self.dropout.apply(self.conv2.forward(x.view()), train);
        let x = self.dropout.apply(self.lstm1.forward_sequence(x.view()), train);
        let x = self.dropout.apply(self.lstm2.forward_last(x.view()), train);
        self.norm.forward(x.view())
    }

    pub fn param_count(&self) -> usize {
        self.conv1.param_count()
            + self.conv2.param_count()
            + self.lstm1.param_count()
            + self.lstm2.param_count()
            + self.norm.param_count()
    }
}
