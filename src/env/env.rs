use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::history::ReturnHistory;
use super::obs::Observation;
use super::reward::RewardModel;
use crate::config::{EnvConfig, MarketConfig};
use crate::constants::env::EPSILON;
use crate::data::MarketData;
use crate::error::{PortfolioError, Result};
use crate::history::{equal_weight_benchmark, EpisodeHistory, EpisodeSummary};
use crate::sentiment::{NeutralSentiment, SentimentProvider};
use crate::types::PortfolioWeights;
use crate::utils::{normalize_weights, uniform_weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EnvState {
    Uninitialized,
    /// Reset, no step taken yet
    Ready,
    Running,
    /// Step budget exhausted, only `reset` is accepted
    Terminated,
}

/// Mutable portfolio book for one episode.
#[derive(Debug, Clone)]
pub struct PortfolioState {
    pub step: usize,
    pub portfolio_value: f64,
    pub weights: PortfolioWeights,
    pub returns: ReturnHistory,
    pub initial_balance: f64,
}

impl PortfolioState {
    fn new(num_assets: usize, config: &EnvConfig) -> Self {
        Self {
            step: 0,
            portfolio_value: config.initial_balance,
            weights: uniform_weights(num_assets),
            returns: ReturnHistory::new(config.reward_window_size),
            initial_balance: config.initial_balance,
        }
    }

    fn reset(&mut self) {
        self.step = 0;
        self.portfolio_value = self.initial_balance;
        self.weights = uniform_weights(self.weights.len());
        self.returns.clear();
    }
}

/// Monitoring record returned alongside every observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepInfo {
    pub step: usize,
    pub portfolio_value: f64,
    pub weights: PortfolioWeights,
    pub last_step_return: f64,
    pub transaction_cost: f64,
    pub sharpe_ratio_window: f64,
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    /// Always false, episodes only end when the data runs out
    pub truncated: bool,
    pub info: StepInfo,
}

/// Step-wise simulator that settles an allocation against realized close
/// prices, charging proportional transaction costs on every rebalance.
///
/// After the step index advances to `t`, the step's asset returns are taken
/// from price rows `t` and `t + 1`, and the next observation is feature rows
/// `t..t + window`.
pub struct PortfolioEnv {
    pub(super) market: MarketConfig,
    config: EnvConfig,
    pub(super) data: Arc<MarketData>,
    pub(super) sentiment: Arc<dyn SentimentProvider>,
    pub(super) portfolio: PortfolioState,
    reward_model: RewardModel,
    state: EnvState,
    total_steps: usize,
    last_cost: f64,
    pub episode: usize,
    pub episode_history: EpisodeHistory,
}

impl PortfolioEnv {
    pub fn new(market: &MarketConfig, config: EnvConfig, data: Arc<MarketData>) -> Result<Self> {
        config.validate(market)?;
        if data.num_assets() != market.num_assets || data.features().ncols() != market.input_width() {
            return Err(PortfolioError::ShapeMismatch {
                context: "environment market data",
                expected: vec![market.num_assets, market.input_width()],
                actual: vec![data.num_assets(), data.features().ncols()],
            });
        }

        let required = market.window_size + config.lookahead_margin + 1;
        if data.len() < required {
            return Err(PortfolioError::InsufficientData {
                required,
                available: data.len(),
            });
        }
        let total_steps = data.len() - market.window_size - config.lookahead_margin;

        Ok(Self {
            market: *market,
            reward_model: RewardModel::new(&config),
            portfolio: PortfolioState::new(market.num_assets, &config),
            episode_history: EpisodeHistory::new(config.initial_balance),
            config,
            data,
            sentiment: Arc::new(NeutralSentiment),
            state: EnvState::Uninitialized,
            total_steps,
            last_cost: 0.0,
            episode: 0,
        })
    }

    pub fn with_sentiment(mut self, sentiment: Arc<dyn SentimentProvider>) -> Self {
        self.sentiment = sentiment;
        self
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn portfolio(&self) -> &PortfolioState {
        &self.portfolio
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    /// Steps in one episode
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn num_assets(&self) -> usize {
        self.market.num_assets
    }

    pub fn reset(&mut self) -> (Observation, StepInfo) {
        if self.state != EnvState::Uninitialized {
            self.episode += 1;
        }
        self.portfolio.reset();
        self.episode_history.clear(self.config.initial_balance);
        self.last_cost = 0.0;
        self.state = EnvState::Ready;

        (self.observation(), self.info())
    }

    pub fn step(&mut self, action: &[f64]) -> Result<StepResult> {
        self.check_step(action)?;

        let weights = normalize_weights(action);
        let value_before = self.portfolio.portfolio_value;
        let traded: f64 = weights
            .iter()
            .zip(&self.portfolio.weights)
            .map(|(target, current)| (target - current).abs() * value_before)
            .sum();
        let cost = traded * self.config.transaction_cost_pct;
        let value_after_cost = (value_before - cost).max(0.0);
        self.portfolio.weights = weights;

        self.portfolio.step += 1;
        let step_return = self.step_return(self.portfolio.step);
        self.portfolio.portfolio_value = (value_after_cost * (1.0 + step_return)).max(0.0);
        self.portfolio.returns.push(step_return);
        self.last_cost = cost;

        let reward = self.reward_model.reward(&self.portfolio.returns, step_return);
        let terminated = self.portfolio.step >= self.total_steps;
        self.state = if terminated {
            EnvState::Terminated
        } else {
            EnvState::Running
        };

        self.episode_history.record(
            self.portfolio.portfolio_value,
            reward,
            step_return,
            &self.portfolio.weights,
            cost,
        );
        debug!(
            step = self.portfolio.step,
            value = self.portfolio.portfolio_value,
            step_return,
            cost,
            reward,
            "env step"
        );

        if terminated {
            let summary = self.summary();
            info!(
                episode = self.episode,
                steps = summary.steps,
                final_value = summary.final_value,
                total_return = summary.total_return,
                benchmark_return = summary.benchmark_return,
                total_costs = summary.total_costs,
                "episode finished"
            );
        }

        Ok(StepResult {
            observation: self.observation(),
            reward,
            terminated,
            truncated: false,
            info: self.info(),
        })
    }

    /// Everything `step` rejects, checked without touching the episode
    pub(super) fn check_step(&self, action: &[f64]) -> Result<()> {
        match self.state {
            EnvState::Uninitialized => return Err(PortfolioError::NotReset),
            EnvState::Terminated => {
                return Err(PortfolioError::EpisodeTerminated {
                    step: self.portfolio.step,
                })
            }
            EnvState::Ready | EnvState::Running => {}
        }
        self.validate_action(action)
    }

    fn validate_action(&self, action: &[f64]) -> Result<()> {
        if action.len() != self.market.num_assets {
            return Err(PortfolioError::ActionLength {
                expected: self.market.num_assets,
                actual: action.len(),
            });
        }
        if let Some((index, value)) = action.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(PortfolioError::NonFiniteAction {
                index,
                value: *value,
            });
        }
        Ok(())
    }

    /// Weighted simple return of the held assets between price rows `t` and `t + 1`
    fn step_return(&self, t: usize) -> f64 {
        let current = self.data.price_row(t);
        let next = self.data.price_row(t + 1);
        self.portfolio
            .weights
            .iter()
            .zip(current.iter().zip(next.iter()))
            .map(|(weight, (price, next_price))| weight * (next_price - price) / (price + EPSILON))
            .sum()
    }

    fn info(&self) -> StepInfo {
        StepInfo {
            step: self.portfolio.step,
            portfolio_value: self.portfolio.portfolio_value,
            weights: self.portfolio.weights.clone(),
            last_step_return: self.portfolio.returns.last().unwrap_or(0.0),
            transaction_cost: self.last_cost,
            sharpe_ratio_window: self.reward_model.windowed_sharpe(&self.portfolio.returns),
        }
    }

    /// Equal-weight buy-and-hold over the steps taken so far, on the same price
    /// alignment as the portfolio. The first entry is the initial balance.
    pub fn equal_weight_benchmark(&self) -> Vec<f64> {
        if self.portfolio.step == 0 {
            return vec![self.config.initial_balance];
        }
        equal_weight_benchmark(
            self.data.prices(),
            1,
            self.portfolio.step,
            self.config.initial_balance,
        )
    }

    pub fn summary(&self) -> EpisodeSummary {
        self.episode_history.summary(
            &self.equal_weight_benchmark(),
            self.config.risk_free_rate_per_step(),
            self.config.annualization_factor(),
        )
    }
}
