use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::rngs::StdRng;

use super::layers::{softmax_row, Activation, Dense, Dropout, LayerNorm};
use crate::config::{FusionMode, NetworkConfig};
use crate::error::{PortfolioError, Result};

/// Multi-head self-attention over a set of vectors, query = key = value.
#[derive(Debug, Clone)]
pub struct MultiHeadSelfAttention {
    query: Dense,
    key: Dense,
    value: Dense,
    output: Dense,
    heads: usize,
    key_dim: usize,
    dropout: Dropout,
}

impl MultiHeadSelfAttention {
    pub fn new(model_dim: usize, heads: usize, key_dim: usize, dropout: f32, rng: &mut StdRng) -> Self {
        let inner = heads * key_dim;
        Self {
            query: Dense::new(model_dim, inner, Activation::Linear, rng),
            key: Dense::new(model_dim, inner, Activation::Linear, rng),
            value: Dense::new(model_dim, inner, Activation::Linear, rng),
            output: Dense::new(inner, model_dim, Activation::Linear, rng),
            heads,
            key_dim,
            dropout: Dropout::new(dropout),
        }
    }

    pub fn key_dim(&self) -> usize {
        self.key_dim
    }

    pub fn heads(&self) -> usize {
        self.heads
    }

    /// (items, model_dim) -> ((items, model_dim), (heads, items, items))
    pub fn forward(&self, x: ArrayView2<f32>, train: bool) -> (Array2<f32>, Array3<f32>) {
        let items = x.nrows();
        let q = self.query.forward(x);
        let k = self.key.forward(x);
        let v = self.value.forward(x);
        let scale = 1.0 / (self.key_dim as f32).sqrt();

        let mut context = Array2::zeros((items, self.heads * self.key_dim));
        let mut weights = Array3::zeros((self.heads, items, items));
        for head in 0..self.heads {
            let (lo, hi) = (head * self.key_dim, (head + 1) * self.key_dim);
            let mut scores = q.slice(s![.., lo..hi]).dot(&k.slice(s![.., lo..hi]).t()) * scale;
            for row in scores.rows_mut() {
                softmax_row(row);
            }
            weights.index_axis_mut(Axis(0), head).assign(&scores);

            let scores = self.dropout.apply(scores, train);
            context
                .slice_mut(s![.., lo..hi])
                .assign(&scores.dot(&v.slice(s![.., lo..hi])));
        }

        (self.output.forward(context.view()), weights)
    }

    pub fn param_count(&self) -> usize {
        self.query.param_count()
            + self.key.param_count()
            + self.value.param_count()
            + self.output.param_count()
    }
}

/// Lets every asset's latent vector be revised by every other asset's before
/// the allocation decision, then reduces the set to one context vector.
#[derive(Debug, Clone)]
pub struct CrossAssetAttentionFusion {
    attention: MultiHeadSelfAttention,
    norm: LayerNorm,
    mode: FusionMode,
    num_assets: usize,
    latent_dim: usize,
}

/// Context vectors plus the attention maps that produced them.
#[derive(Debug, Clone)]
pub struct FusionOutput {
    /// (batch, context_dim)
    pub context: Array2<f32>,
    /// One (heads, assets, assets) map per batch element
    pub attention: Vec<Array3<f32>>,
}

impl CrossAssetAttentionFusion {
    pub fn new(num_assets: usize, config: &NetworkConfig, rng: &mut StdRng) -> Self {
        let latent_dim = config.latent_dim();
        let key_dim = config.resolve_key_dim();
        Self {
            attention: MultiHeadSelfAttention::new(
                latent_dim,
                config.attention_heads,
                key_dim,
                config.attention_dropout,
                rng,
            ),
            norm: LayerNorm::new(latent_dim),
            mode: config.fusion,
            num_assets,
            latent_dim,
        }
    }

    pub fn key_dim(&self) -> usize {
        self.attention.key_dim()
    }

    pub fn context_dim(&self) -> usize {
        match self.mode {
            FusionMode::MeanPool => self.latent_dim,
            FusionMode::Concat => self.num_assets * self.latent_dim,
        }
    }

    /// (batch, assets, latent) -> (batch, context_dim)
    pub fn forward(&self, x: ArrayView3<f32>, train: bool) -> Result<Array2<f32>> {
        Ok(self.forward_with_attention(x, train)?.context)
    }

    pub fn forward_with_attention(&self, x: ArrayView3<f32>, train: bool) -> Result<FusionOutput> {
        let (batch, assets, latent) = x.dim();
        if assets != self.num_assets || latent != self.latent_dim {
            return Err(PortfolioError::ShapeMismatch {
                context: "attention fusion input",
                expected: vec![batch, self.num_assets, self.latent_dim],
                actual: vec![batch, assets, latent],
            });
        }

        let mut context = Array2::zeros((batch, self.context_dim()));
        let mut attention = Vec::with_capacity(batch);
        for (mut out, sample) in context.rows_mut().into_iter().zip(x.outer_iter()) {
            let (attended, weights) = self.attention.forward(sample, train);
            let mut fused = &sample + &attended;
            self.norm.forward_rows(&mut fused);

            match self.mode {
                FusionMode::MeanPool => {
                    if let Some(pooled) = fused.mean_axis(Axis(0)) {
                        out.assign(&pooled);
                    }
                }
                FusionMode::Concat => {
                    out.assign(&fused.into_shape_with_order(assets * latent).map_err(|err| {
                        PortfolioError::data(format!("unable to flatten fused assets: {err}"))
                    })?);
                }
            }
            attention.push(weights);
        }

        Ok(FusionOutput { context, attention })
    }

    pub fn param_count(&self) -> usize {
        self.attention.param_count() + self.norm.param_count()
    }
}
