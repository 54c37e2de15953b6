pub mod synthetic;

use ndarray::{s, Array2, ArrayView1, ArrayView2};

use crate::config::MarketConfig;
use crate::error::{PortfolioError, Result};

/// Precomputed inputs for one episode: the feature table the network reads and
/// the close prices the simulator settles against, row-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketData {
    /// (T, assets * features), each asset's columns contiguous
    features: Array2<f32>,
    /// (T, assets)
    prices: Array2<f64>,
}

impl MarketData {
    pub fn new(market: &MarketConfig, features: Array2<f32>, prices: Array2<f64>) -> Result<Self> {
        market.validate()?;

        if features.nrows() != prices.nrows() {
            return Err(PortfolioError::data(format!(
                "feature table has {} rows but price table has {}",
                features.nrows(),
                prices.nrows()
            )));
        }
        if features.ncols() != market.input_width() {
            return Err(PortfolioError::ShapeMismatch {
                context: "feature table",
                expected: vec![features.nrows(), market.input_width()],
                actual: vec![features.nrows(), features.ncols()],
            });
        }
        if prices.ncols() != market.num_assets {
            return Err(PortfolioError::ShapeMismatch {
                context: "price table",
                expected: vec![prices.nrows(), market.num_assets],
                actual: vec![prices.nrows(), prices.ncols()],
            });
        }
        if let Some(((row, col), value)) = features.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PortfolioError::data(format!(
                "feature at row {row}, column {col} is not finite ({value})"
            )));
        }
        if let Some(((row, asset), value)) = prices
            .indexed_iter()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(PortfolioError::data(format!(
                "price for asset {asset} at row {row} must be finite and non-negative, got {value}"
            )));
        }

        Ok(Self { features, prices })
    }

    /// Builds the tables from one close-price series per asset.
    pub fn from_price_series(
        market: &MarketConfig,
        features: Array2<f32>,
        series: &[Vec<f64>],
    ) -> Result<Self> {
        let steps = series.first().map_or(0, Vec::len);
        if let Some(asset) = series.iter().position(|s| s.len() != steps) {
            return Err(PortfolioError::data(format!(
                "price series for asset {asset} has {} rows, expected {steps}",
                series[asset].len()
            )));
        }
        let prices = Array2::from_shape_fn((steps, series.len()), |(t, asset)| series[asset][t]);
        Self::new(market, features, prices)
    }

    pub fn len(&self) -> usize {
        self.prices.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_assets(&self) -> usize {
        self.prices.ncols()
    }

    pub fn features(&self) -> ArrayView2<f32> {
        self.features.view()
    }

    pub fn prices(&self) -> ArrayView2<f64> {
        self.prices.view()
    }

    /// Feature rows `start..start + size`
    pub fn window(&self, start: usize, size: usize) -> ArrayView2<f32> {
        self.features.slice(s![start..start + size, ..])
    }

    pub fn price_row(&self, row: usize) -> ArrayView1<f64> {
        self.prices.row(row)
    }

    /// Close prices of one asset over the whole table
    pub fn asset_prices(&self, asset: usize) -> ArrayView1<f64> {
        self.prices.column(asset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn accepts_aligned_tables() {
        let market = MarketConfig::new(2, 2, 1);
        let data = MarketData::new(
            &market,
            Array2::zeros((3, 2)),
            array![[1.0, 2.0], [1.5, 2.5], [1.2, 2.2]],
        )
        .unwrap();
        assert_eq!(data.len(), 3);
        assert_eq!(data.num_assets(), 2);
        assert_eq!(data.window(1, 2).dim(), (2, 2));
        assert_eq!(data.asset_prices(1).to_vec(), vec![2.0, 2.5, 2.2]);
    }

    #[test]
    fn rejects_misaligned_rows() {
        let market = MarketConfig::new(2, 2, 1);
        let err = MarketData::new(&market, Array2::zeros((3, 2)), Array2::ones((4, 2))).unwrap_err();
        assert!(matches!(err, PortfolioError::InvalidData { .. }));
    }

    #[test]
    fn rejects_wrong_feature_width() {
        let market = MarketConfig::new(2, 2, 3);
        let err = MarketData::new(&market, Array2::zeros((3, 5)), Array2::ones((3, 2))).unwrap_err();
        assert!(matches!(err, PortfolioError::ShapeMismatch { .. }));
    }

    #[test]
    fn rejects_missing_values() {
        let market = MarketConfig::new(1, 2, 1);
        let mut features = Array2::zeros((3, 1));
        features[[1, 0]] = f32::NAN;
        assert!(MarketData::new(&market, features, Array2::ones((3, 1))).is_err());

        let prices = array![[1.0], [f64::INFINITY], [1.0]];
        assert!(MarketData::new(&market, Array2::zeros((3, 1)), prices).is_err());
    }

    #[test]
    fn price_series_are_transposed() {
        let market = MarketConfig::new(2, 2, 1);
        let data = MarketData::from_price_series(
            &market,
            Array2::zeros((4, 2)),
            &[vec![100.0, 101.0, 99.0, 102.0], vec![50.0, 50.0, 51.0, 50.0]],
        )
        .unwrap();
        assert_eq!(data.price_row(2).to_vec(), vec![99.0, 51.0]);
    }

    #[test]
    fn ragged_price_series_rejected() {
        let market = MarketConfig::new(2, 2, 1);
        assert!(MarketData::from_price_series(
            &market,
            Array2::zeros((3, 2)),
            &[vec![1.0, 2.0, 3.0], vec![1.0, 2.0]],
        )
        .is_err());
    }
}
