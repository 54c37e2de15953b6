use tracing::debug;

use super::history::ReturnHistory;
use crate::config::EnvConfig;
use crate::constants::env::SHARPE_CLIP;
use crate::utils::annualized_sharpe;

/// Sharpe-based reward with a small sign-only signal while the return
/// window is still filling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardModel {
    window: usize,
    risk_free_per_step: f64,
    annualization: f64,
    scale: f64,
    warmup_reward: f64,
}

impl RewardModel {
    pub fn new(config: &EnvConfig) -> Self {
        Self {
            window: config.reward_window_size,
            risk_free_per_step: config.risk_free_rate_per_step(),
            annualization: config.annualization_factor(),
            scale: config.reward_scale,
            warmup_reward: config.warmup_reward,
        }
    }

    /// Largest magnitude a steady-state reward can take
    pub fn max_reward(&self) -> f64 {
        SHARPE_CLIP * self.scale.abs()
    }

    pub fn reward(&self, history: &ReturnHistory, step_return: f64) -> f64 {
        if history.len() < self.window {
            return if step_return > 0.0 {
                self.warmup_reward
            } else if step_return < 0.0 {
                -self.warmup_reward
            } else {
                0.0
            };
        }

        let sharpe = self.sharpe(history);
        let reward = sharpe.clamp(-SHARPE_CLIP, SHARPE_CLIP) * self.scale;
        debug!(sharpe, reward, "steady-state reward");
        reward
    }

    /// Annualized Sharpe of the whole history
    pub fn sharpe(&self, history: &ReturnHistory) -> f64 {
        annualized_sharpe(&history.to_vec(), self.risk_free_per_step, self.annualization)
    }

    /// Sharpe for monitoring. Zero until at least half the window (and more
    /// than one return) has been observed.
    pub fn windowed_sharpe(&self, history: &ReturnHistory) -> f64 {
        let len = history.len();
        if len <= 1 || 2 * len < self.window {
            return 0.0;
        }
        self.sharpe(history)
    }
}
