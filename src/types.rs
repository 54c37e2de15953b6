use ndarray::{Array2, ArrayView2};

/// One entry per asset, non-negative and summing to 1
pub type PortfolioWeights = Vec<f64>;

/// `window_size` rows of `num_assets * features_per_asset` columns, oldest first
pub type MarketWindow = Array2<f32>;

pub type MarketWindowView<'a> = ArrayView2<'a, f32>;

/// A list of values, where the last index is the most recent
pub type Data = Vec<f64>;
