use ndarray::{ArrayView3, Axis};

use super::env::PortfolioEnv;
use crate::types::MarketWindow;

/// What the policy sees after each reset and step.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// (window, assets * features)
    pub market: MarketWindow,
    /// Reserved sentiment channel
    pub news: [f32; 1],
}

impl Observation {
    /// The market window as a batch of one, ready for the network
    pub fn as_batch(&self) -> ArrayView3<f32> {
        self.market.view().insert_axis(Axis(0))
    }
}

impl PortfolioEnv {
    pub(super) fn observation(&self) -> Observation {
        let step = self.portfolio.step;
        Observation {
            market: self.data.window(step, self.market.window_size).to_owned(),
            news: [self.sentiment.news_signal(step)],
        }
    }
}
