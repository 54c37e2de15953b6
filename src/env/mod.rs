mod env;
mod history;
mod obs;
mod reward;
mod vec_env;

#[cfg(test)]
mod env_tests;

pub use env::{EnvState, PortfolioEnv, PortfolioState, StepInfo, StepResult};
pub use history::ReturnHistory;
pub use obs::Observation;
pub use reward::RewardModel;
pub use vec_env::VecEnv;
