use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::constants::{env, market, network, time};
use crate::error::{PortfolioError, Result};

/// Shape of the feature table agreed with whoever engineers the features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MarketConfig {
    pub num_assets: usize,
    pub window_size: usize,
    pub features_per_asset: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            num_assets: market::NUM_ASSETS,
            window_size: market::WINDOW_SIZE,
            features_per_asset: market::FEATURES_PER_ASSET,
        }
    }
}

impl MarketConfig {
    pub fn new(num_assets: usize, window_size: usize, features_per_asset: usize) -> Self {
        Self {
            num_assets,
            window_size,
            features_per_asset,
        }
    }

    /// Columns per timestep in the flattened feature table
    pub fn input_width(&self) -> usize {
        self.num_assets * self.features_per_asset
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("num_assets", self.num_assets)?;
        ensure_positive("window_size", self.window_size)?;
        ensure_positive("features_per_asset", self.features_per_asset)
    }
}

/// How post-attention asset vectors reach the allocation head.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Average over assets, context width = latent width
    #[default]
    MeanPool,
    /// Asset vectors concatenated in asset order, context width = assets * latent width
    Concat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub cnn_filters1: usize,
    pub cnn_filters2: usize,
    pub cnn_kernel_size: usize,
    pub lstm_units1: usize,
    pub lstm_units2: usize,
    pub encoder_dropout: f32,
    pub attention_heads: usize,
    pub key_dim_divisor: usize,
    pub attention_dropout: f32,
    pub dense_units1: usize,
    pub dense_units2: usize,
    pub head_dropout: f32,
    pub l2_reg: f32,
    pub fusion: FusionMode,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cnn_filters1: network::CNN_FILTERS1,
            cnn_filters2: network::CNN_FILTERS2,
            cnn_kernel_size: network::CNN_KERNEL_SIZE,
            lstm_units1: network::LSTM_UNITS1,
            lstm_units2: network::LSTM_UNITS2,
            encoder_dropout: network::ENCODER_DROPOUT,
            attention_heads: network::ATTENTION_HEADS,
            key_dim_divisor: network::KEY_DIM_DIVISOR,
            attention_dropout: network::ATTENTION_DROPOUT,
            dense_units1: network::DENSE_UNITS1,
            dense_units2: network::DENSE_UNITS2,
            head_dropout: network::HEAD_DROPOUT,
            l2_reg: network::L2_REG,
            fusion: FusionMode::default(),
            seed: network::SEED,
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("cnn_filters1", self.cnn_filters1)?;
        ensure_positive("cnn_filters2", self.cnn_filters2)?;
        ensure_positive("cnn_kernel_size", self.cnn_kernel_size)?;
        ensure_positive("lstm_units1", self.lstm_units1)?;
        ensure_positive("lstm_units2", self.lstm_units2)?;
        ensure_positive("attention_heads", self.attention_heads)?;
        ensure_positive("key_dim_divisor", self.key_dim_divisor)?;
        ensure_positive("dense_units1", self.dense_units1)?;
        ensure_positive("dense_units2", self.dense_units2)?;
        ensure_rate("encoder_dropout", self.encoder_dropout)?;
        ensure_rate("attention_dropout", self.attention_dropout)?;
        ensure_rate("head_dropout", self.head_dropout)?;
        if !self.l2_reg.is_finite() || self.l2_reg < 0.0 {
            return Err(PortfolioError::config(format!(
                "l2_reg must be a non-negative finite number, got {}",
                self.l2_reg
            )));
        }
        Ok(())
    }

    /// Latent width produced by the asset encoder
    pub fn latent_dim(&self) -> usize {
        self.lstm_units2
    }

    /// Per-head key width. Falls back to the full latent width when the
    /// divisor would floor it to zero.
    pub fn resolve_key_dim(&self) -> usize {
        let latent_dim = self.latent_dim();
        let key_dim = latent_dim / self.key_dim_divisor.max(1);
        if key_dim == 0 {
            warn!(
                latent_dim,
                key_dim_divisor = self.key_dim_divisor,
                "attention key dim floors to zero, using the latent width instead"
            );
            latent_dim
        } else {
            key_dim
        }
    }
}

/// Bar size of the underlying data, used to annualize per-step statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BarInterval {
    Minute,
    #[default]
    Hour,
    Day,
}

impl BarInterval {
    pub fn steps_per_year(&self) -> f64 {
        match self {
            BarInterval::Minute => {
                time::TRADING_DAYS_PER_YEAR * time::HOURS_PER_TRADING_DAY * time::MINUTES_PER_HOUR
            }
            BarInterval::Hour => time::TRADING_DAYS_PER_YEAR * time::HOURS_PER_TRADING_DAY,
            BarInterval::Day => time::TRADING_DAYS_PER_YEAR,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EnvConfig {
    pub initial_balance: f64,
    pub transaction_cost_pct: f64,
    pub reward_window_size: usize,
    pub risk_free_rate_annual: f64,
    pub bar_interval: BarInterval,
    /// Rows kept back at the end of the data so `t + 1` prices always exist
    pub lookahead_margin: usize,
    pub reward_scale: f64,
    pub warmup_reward: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            initial_balance: env::INITIAL_BALANCE,
            transaction_cost_pct: env::TRANSACTION_COST_PCT,
            reward_window_size: env::REWARD_WINDOW_SIZE,
            risk_free_rate_annual: env::RISK_FREE_RATE_ANNUAL,
            bar_interval: BarInterval::default(),
            lookahead_margin: env::LOOKAHEAD_MARGIN,
            reward_scale: env::REWARD_SCALE,
            warmup_reward: env::WARMUP_REWARD,
        }
    }
}

impl EnvConfig {
    pub fn validate(&self, market: &MarketConfig) -> Result<()> {
        market.validate()?;
        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            return Err(PortfolioError::config(format!(
                "initial_balance must be positive, got {}",
                self.initial_balance
            )));
        }
        if !(0.0..1.0).contains(&self.transaction_cost_pct) {
            return Err(PortfolioError::config(format!(
                "transaction_cost_pct must be in [0, 1), got {}",
                self.transaction_cost_pct
            )));
        }
        ensure_positive("reward_window_size", self.reward_window_size)?;
        if !self.risk_free_rate_annual.is_finite() {
            return Err(PortfolioError::config("risk_free_rate_annual must be finite"));
        }
        if !self.reward_scale.is_finite() || !self.warmup_reward.is_finite() {
            return Err(PortfolioError::config(
                "reward_scale and warmup_reward must be finite",
            ));
        }
        if market.window_size + self.lookahead_margin < 2 {
            return Err(PortfolioError::config(format!(
                "window_size + lookahead_margin must be at least 2, got {}",
                market.window_size + self.lookahead_margin
            )));
        }
        Ok(())
    }

    pub fn risk_free_rate_per_step(&self) -> f64 {
        self.risk_free_rate_annual / self.bar_interval.steps_per_year()
    }

    pub fn annualization_factor(&self) -> f64 {
        self.bar_interval.steps_per_year().sqrt()
    }
}

/// Everything a run needs, loadable from one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub market: MarketConfig,
    pub network: NetworkConfig,
    pub env: EnvConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)
            .map_err(|err| PortfolioError::config(format!("unable to parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.market.validate()?;
        self.network.validate()?;
        self.env.validate(&self.market)
    }
}

fn ensure_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(PortfolioError::config(format!("{name} must be positive")));
    }
    Ok(())
}

fn ensure_rate(name: &str, value: f32) -> Result<()> {
    if !(0.0..1.0).contains(&value) {
        return Err(PortfolioError::config(format!(
            "{name} must be in [0, 1), got {value}"
        )));
    }
    Ok(())
}
