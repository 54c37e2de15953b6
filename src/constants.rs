pub mod market {
    pub const NUM_ASSETS: usize = 4;
    pub const WINDOW_SIZE: usize = 30;
    pub const FEATURES_PER_ASSET: usize = 20;
}

pub mod network {
    pub const CNN_FILTERS1: usize = 32;
    pub const CNN_FILTERS2: usize = 64;
    pub const CNN_KERNEL_SIZE: usize = 3;
    pub const LSTM_UNITS1: usize = 64;
    pub const LSTM_UNITS2: usize = 32;
    pub const ENCODER_DROPOUT: f32 = 0.2;

    pub const ATTENTION_HEADS: usize = 4;
    /// Per-head key width is the latent width divided by this
    pub const KEY_DIM_DIVISOR: usize = 2;
    pub const ATTENTION_DROPOUT: f32 = 0.1;

    pub const DENSE_UNITS1: usize = 128;
    pub const DENSE_UNITS2: usize = LSTM_UNITS2;
    pub const HEAD_DROPOUT: f32 = 0.3;
    pub const L2_REG: f32 = 0.0001;

    pub const LAYER_NORM_EPS: f32 = 1e-6;
    pub const SEED: u64 = 42;
}

pub mod env {
    pub const INITIAL_BALANCE: f64 = 100_000.0;
    pub const TRANSACTION_COST_PCT: f64 = 0.001;
    /// Returns kept for the Sharpe reward, e.g. 240 hourly steps
    pub const REWARD_WINDOW_SIZE: usize = 240;
    pub const RISK_FREE_RATE_ANNUAL: f64 = 0.02;
    pub const LOOKAHEAD_MARGIN: usize = 2;

    pub const REWARD_SCALE: f64 = 0.1;
    pub const WARMUP_REWARD: f64 = 0.01;
    pub const SHARPE_CLIP: f64 = 5.0;

    pub const EPSILON: f64 = 1e-9;
    pub const STD_EPSILON: f64 = 1e-9;
    pub const SUM_ATOL: f64 = 1e-8;
    pub const SUM_RTOL: f64 = 1e-5;

    pub const NEUTRAL_SENTIMENT: f32 = 0.0;
}

pub mod time {
    pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
    pub const HOURS_PER_TRADING_DAY: f64 = 24.0;
    pub const MINUTES_PER_HOUR: f64 = 60.0;
}

pub mod files {
    pub const CHART_IMAGE_FORMAT: &str = "png";
}
