use ndarray::ArrayView2;
use serde::Serialize;

use crate::constants::env::EPSILON;
use crate::utils::{annualized_sharpe, max_drawdown, mean};

/// Per-step record of one episode. `values[0]` is the starting value, so it
/// holds one more entry than the other series.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EpisodeHistory {
    pub values: Vec<f64>,
    pub rewards: Vec<f64>,
    pub step_returns: Vec<f64>,
    pub weights: Vec<Vec<f64>>,
    pub costs: Vec<f64>,
    pub total_costs: f64,
}

impl EpisodeHistory {
    pub fn new(initial_value: f64) -> Self {
        Self {
            values: vec![initial_value],
            ..Default::default()
        }
    }

    pub fn clear(&mut self, initial_value: f64) {
        *self = Self::new(initial_value);
    }

    pub fn record(&mut self, value: f64, reward: f64, step_return: f64, weights: &[f64], cost: f64) {
        self.values.push(value);
        self.rewards.push(reward);
        self.step_returns.push(step_return);
        self.weights.push(weights.to_vec());
        self.costs.push(cost);
        self.total_costs += cost;
    }

    /// Completed steps
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn summary(&self, benchmark: &[f64], risk_free_per_step: f64, annualization: f64) -> EpisodeSummary {
        let initial_value = self.values.first().copied().unwrap_or(0.0);
        let final_value = self.values.last().copied().unwrap_or(0.0);
        let total_return = growth(initial_value, final_value);
        let benchmark_return = match (benchmark.first(), benchmark.last()) {
            (Some(start), Some(end)) => growth(*start, *end),
            _ => 0.0,
        };

        EpisodeSummary {
            steps: self.len(),
            initial_value,
            final_value,
            total_return,
            benchmark_return,
            outperformance: total_return - benchmark_return,
            total_costs: self.total_costs,
            cumulative_reward: self.rewards.iter().sum(),
            mean_reward: mean(&self.rewards),
            max_drawdown: max_drawdown(&self.values),
            sharpe: annualized_sharpe(&self.step_returns, risk_free_per_step, annualization),
        }
    }
}

fn growth(start: f64, end: f64) -> f64 {
    end / (start + EPSILON) - 1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub steps: usize,
    pub initial_value: f64,
    pub final_value: f64,
    /// Fractional, 0.05 is +5%
    pub total_return: f64,
    pub benchmark_return: f64,
    pub outperformance: f64,
    pub total_costs: f64,
    pub cumulative_reward: f64,
    pub mean_reward: f64,
    pub max_drawdown: f64,
    /// Annualized over the whole episode
    pub sharpe: f64,
}

/// Value of an equal-weight buy-and-hold position opened at `start_row` and
/// marked at each of the following `steps` rows. The first entry is
/// `initial_value`.
pub fn equal_weight_benchmark(
    prices: ArrayView2<f64>,
    start_row: usize,
    steps: usize,
    initial_value: f64,
) -> Vec<f64> {
    let assets = prices.ncols();
    let last_row = (start_row + steps).min(prices.nrows().saturating_sub(1));
    if assets == 0 || start_row > last_row {
        return vec![initial_value];
    }

    let start = prices.row(start_row);
    (start_row..=last_row)
        .map(|row| {
            let growth = prices
                .row(row)
                .iter()
                .zip(start.iter())
                .map(|(price, entry)| price / (entry + EPSILON))
                .sum::<f64>()
                / assets as f64;
            initial_value * growth
        })
        .collect()
}
