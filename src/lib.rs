pub mod charts;
pub mod config;
pub mod constants;
pub mod data;
pub mod env;
pub mod error;
pub mod history;
pub mod model;
pub mod sentiment;
pub mod types;
pub mod utils;

pub use config::{BarInterval, Config, EnvConfig, FusionMode, MarketConfig, NetworkConfig};
pub use error::{PortfolioError, Result};
pub use model::PortfolioNetwork;
