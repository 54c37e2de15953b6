use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::MarketData;
use crate::config::MarketConfig;
use crate::error::{PortfolioError, Result};

/// Seeded random-walk market. Each asset's features are its most recent
/// log returns, newest first, zero where history is not yet available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticMarket {
    pub steps: usize,
    pub start_price: f64,
    /// Per-step drift of the log price
    pub drift: f64,
    /// Per-step standard deviation of the log price
    pub volatility: f64,
    pub seed: u64,
}

impl Default for SyntheticMarket {
    fn default() -> Self {
        Self {
            steps: 500,
            start_price: 100.0,
            drift: 0.0002,
            volatility: 0.01,
            seed: 7,
        }
    }
}

impl SyntheticMarket {
    pub fn generate(&self, market: &MarketConfig) -> Result<MarketData> {
        if self.steps == 0 || self.start_price <= 0.0 || self.volatility < 0.0 {
            return Err(PortfolioError::config(format!(
                "synthetic market needs steps > 0, start_price > 0 and volatility >= 0, got {self:?}"
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        // Uniform noise on [-a, a] has standard deviation a / sqrt(3)
        let amplitude = self.volatility * 3f64.sqrt();

        let assets = market.num_assets;
        let features = market.features_per_asset;
        let mut log_returns = Array2::<f64>::zeros((self.steps, assets));
        let mut prices = Array2::<f64>::zeros((self.steps, assets));

        for asset in 0..assets {
            // Spread starting prices so assets are distinguishable on a chart
            let mut price = self.start_price * (1.0 + asset as f64 * 0.25);
            prices[[0, asset]] = price;
            for t in 1..self.steps {
                let noise = if amplitude > 0.0 {
                    rng.gen_range(-amplitude..=amplitude)
                } else {
                    0.0
                };
                let log_return = self.drift + noise;
                price *= log_return.exp();
                log_returns[[t, asset]] = log_return;
                prices[[t, asset]] = price;
            }
        }

        let table = Array2::from_shape_fn((self.steps, market.input_width()), |(t, column)| {
            let (asset, lag) = (column / features, column % features);
            match t.checked_sub(lag) {
                Some(row) => log_returns[[row, asset]] as f32,
                None => 0.0,
            }
        });

        MarketData::new(market, table, prices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_contract_shapes() {
        let market = MarketConfig::new(3, 10, 4);
        let generator = SyntheticMarket {
            steps: 50,
            ..Default::default()
        };
        let data = generator.generate(&market).unwrap();
        assert_eq!(data.len(), 50);
        assert_eq!(data.features().dim(), (50, 12));
        assert_eq!(data.prices().dim(), (50, 3));
        assert!(data.prices().iter().all(|p| *p > 0.0));
    }

    #[test]
    fn same_seed_same_market() {
        let market = MarketConfig::new(2, 5, 3);
        let generator = SyntheticMarket::default();
        assert_eq!(
            generator.generate(&market).unwrap(),
            generator.generate(&market).unwrap()
        );
    }

    #[test]
    fn features_are_lagged_returns() {
        let market = MarketConfig::new(1, 5, 3);
        let data = SyntheticMarket {
            steps: 10,
            ..Default::default()
        }
        .generate(&market)
        .unwrap();
        let features = data.features();
        let prices = data.prices();

        let newest = (prices[[6, 0]] / prices[[5, 0]]).ln() as f32;
        assert!((features[[6, 0]] - newest).abs() < 1e-6);
        // lag 1 at row 6 is the newest return at row 5
        assert_eq!(features[[6, 1]], features[[5, 0]]);
        assert_eq!(features[[1, 2]], 0.0);
    }

    #[test]
    fn zero_volatility_is_pure_drift() {
        let market = MarketConfig::new(1, 2, 1);
        let data = SyntheticMarket {
            steps: 3,
            drift: 0.0,
            volatility: 0.0,
            ..Default::default()
        }
        .generate(&market)
        .unwrap();
        assert!(data.prices().iter().all(|p| (*p - 100.0).abs() < 1e-12));
    }
}
