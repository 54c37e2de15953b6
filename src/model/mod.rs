pub mod attention;
pub mod encoder;
pub mod head;
pub mod layers;

use ndarray::{s, stack, Array2, Array3, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::debug;

use self::attention::CrossAssetAttentionFusion;
use self::encoder::AssetFeatureEncoder;
use self::head::AllocationHead;
use crate::config::{MarketConfig, NetworkConfig};
use crate::error::{PortfolioError, Result};
use crate::types::{MarketWindowView, PortfolioWeights};

/// Encoder -> cross-asset attention -> allocation head.
///
/// Input is the flattened feature table window, (batch, window, assets * features),
/// with each asset's columns contiguous. Output rows sum to 1.
#[derive(Debug, Clone)]
pub struct PortfolioNetwork {
    market: MarketConfig,
    encoder: AssetFeatureEncoder,
    fusion: CrossAssetAttentionFusion,
    head: AllocationHead,
}

#[derive(Debug, Clone)]
pub struct NetworkOutput {
    /// (batch, assets)
    pub weights: Array2<f32>,
    /// (batch, context_dim)
    pub context: Array2<f32>,
    /// One (heads, assets, assets) map per batch element
    pub attention: Vec<Array3<f32>>,
}

impl PortfolioNetwork {
    pub fn new(market: &MarketConfig, config: &NetworkConfig) -> Result<Self> {
        market.validate()?;
        config.validate()?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let encoder = AssetFeatureEncoder::new(market, config, &mut rng);
        let fusion = CrossAssetAttentionFusion::new(market.num_assets, config, &mut rng);
        let head = AllocationHead::new(fusion.context_dim(), market.num_assets, config, &mut rng);

        let network = Self {
            market: *market,
            encoder,
            fusion,
            head,
        };
        debug!(
            params = network.param_count(),
            key_dim = network.fusion.key_dim(),
            "built portfolio network"
        );
        Ok(network)
    }

    pub fn market(&self) -> &MarketConfig {
        &self.market
    }

    /// Portfolio weights, (batch, assets)
    pub fn forward(&self, input: ArrayView3<f32>, train: bool) -> Result<Array2<f32>> {
        let context = self.forward_latent(input, train)?;
        self.head.forward(context.view(), train)
    }

    /// Context vector fed to the allocation head, (batch, context_dim)
    pub fn forward_latent(&self, input: ArrayView3<f32>, train: bool) -> Result<Array2<f32>> {
        let latents = self.encode_assets(input, train)?;
        self.fusion.forward(latents.view(), train)
    }

    pub fn forward_detailed(&self, input: ArrayView3<f32>, train: bool) -> Result<NetworkOutput> {
        let latents = self.encode_assets(input, train)?;
        let fused = self.fusion.forward_with_attention(latents.view(), train)?;
        let weights = self.head.forward(fused.context.view(), train)?;
        Ok(NetworkOutput {
            weights,
            context: fused.context,
            attention: fused.attention,
        })
    }

    /// Inference on a single (window, assets * features) observation
    pub fn allocate(&self, window: MarketWindowView) -> Result<PortfolioWeights> {
        let weights = self.forward(window.insert_axis(Axis(0)), false)?;
        Ok(weights.row(0).iter().map(|&w| w as f64).collect())
    }

    /// Runs the shared encoder once per asset, (batch, assets, latent)
    fn encode_assets(&self, input: ArrayView3<f32>, train: bool) -> Result<Array3<f32>> {
        let (batch, window, width) = input.dim();
        if window != self.market.window_size || width != self.market.input_width() {
            return Err(PortfolioError::ShapeMismatch {
                context: "network input",
                expected: vec![batch, self.market.window_size, self.market.input_width()],
                actual: vec![batch, window, width],
            });
        }

        let features = self.market.features_per_asset;
        let encode = |asset: usize| {
            let columns = asset * features..(asset + 1) * features;
            self.encoder.forward(input.slice(s![.., .., columns]), train)
        };

        #[cfg(feature = "parallel")]
        let latents = (0..self.market.num_assets)
            .into_par_iter()
            .map(encode)
            .collect::<Result<Vec<_>>>()?;
        #[cfg(not(feature = "parallel"))]
        let latents = (0..self.market.num_assets)
            .map(encode)
            .collect::<Result<Vec<_>>>()?;

        let views: Vec<_> = latents.iter().map(|latent| latent.view()).collect();
        stack(Axis(1), &views)
            .map_err(|err| PortfolioError::data(format!("unable to stack asset latents: {err}")))
    }

    /// Weight-decay term for an external optimizer
    pub fn regularization_loss(&self) -> f32 {
        self.head.l2_penalty()
    }

    pub fn key_dim(&self) -> usize {
        self.fusion.key_dim()
    }

    pub fn latent_dim(&self) -> usize {
        self.encoder.latent_dim()
    }

    pub fn context_dim(&self) -> usize {
        self.fusion.context_dim()
    }

    pub fn param_count(&self) -> usize {
        self.encoder.param_count() + self.fusion.param_count() + self.head.param_count()
    }
}
