use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::env::{PortfolioEnv, StepInfo, StepResult};
use super::obs::Observation;
use crate::config::{EnvConfig, MarketConfig};
use crate::data::MarketData;
use crate::error::{PortfolioError, Result};

/// Independent environments stepped in lockstep. Market data is shared
/// read-only; every portfolio book and return history is per instance.
pub struct VecEnv {
    pub envs: Vec<PortfolioEnv>,
}

impl VecEnv {
    pub fn new(
        market: &MarketConfig,
        config: &EnvConfig,
        datasets: Vec<Arc<MarketData>>,
    ) -> Result<Self> {
        if datasets.is_empty() {
            return Err(PortfolioError::config("a vectorized environment needs at least one dataset"));
        }
        let envs = datasets
            .into_iter()
            .map(|data| PortfolioEnv::new(market, config.clone(), data))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { envs })
    }

    /// `count` environments over the same data
    pub fn replicated(
        market: &MarketConfig,
        config: &EnvConfig,
        data: Arc<MarketData>,
        count: usize,
    ) -> Result<Self> {
        Self::new(market, config, vec![data; count])
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn reset(&mut self) -> Vec<(Observation, StepInfo)> {
        self.envs.iter_mut().map(PortfolioEnv::reset).collect()
    }

    /// One action per environment, in order. Every action is checked before
    /// any instance advances, so a rejected batch leaves all of them in lockstep.
    pub fn step(&mut self, actions: &[Vec<f64>]) -> Result<Vec<StepResult>> {
        if actions.len() != self.envs.len() {
            return Err(PortfolioError::ActionLength {
                expected: self.envs.len(),
                actual: actions.len(),
            });
        }
        for (env, action) in self.envs.iter().zip(actions) {
            env.check_step(action)?;
        }

        #[cfg(feature = "parallel")]
        let steps = self
            .envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .map(|(env, action)| env.step(action))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let steps = self
            .envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| env.step(action))
            .collect();

        steps
    }

    /// Shortest episode among the instances
    pub fn total_steps(&self) -> usize {
        self.envs.iter().map(PortfolioEnv::total_steps).min().unwrap_or(0)
    }

    pub fn primary(&self) -> Option<&PortfolioEnv> {
        self.envs.first()
    }
}
