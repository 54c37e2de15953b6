use std::sync::Arc;

use ndarray::Array2;

use super::*;
use crate::config::{EnvConfig, MarketConfig};
use crate::data::synthetic::SyntheticMarket;
use crate::data::MarketData;
use crate::error::PortfolioError;
use crate::sentiment::SentimentSeries;

const BALANCE: f64 = 100_000.0;

fn no_cost_config() -> EnvConfig {
    EnvConfig {
        initial_balance: BALANCE,
        transaction_cost_pct: 0.0,
        lookahead_margin: 0,
        ..Default::default()
    }
}

/// Two assets, window 3, prices BTC = [100, 101, 99, 102] and ETH = [50, 50, 51, 50]
fn btc_eth_env(config: EnvConfig) -> PortfolioEnv {
    let market = MarketConfig::new(2, 3, 1);
    let features = Array2::from_shape_fn((4, 2), |(t, c)| (t * 2 + c) as f32);
    let data = MarketData::from_price_series(
        &market,
        features,
        &[vec![100.0, 101.0, 99.0, 102.0], vec![50.0, 50.0, 51.0, 50.0]],
    )
    .unwrap();
    PortfolioEnv::new(&market, config, Arc::new(data)).unwrap()
}

fn flat_env(num_assets: usize, steps: usize, config: EnvConfig) -> PortfolioEnv {
    let market = MarketConfig::new(num_assets, 2, 1);
    let data = MarketData::new(
        &market,
        Array2::zeros((steps, num_assets)),
        Array2::from_elem((steps, num_assets), 10.0),
    )
    .unwrap();
    PortfolioEnv::new(&market, config, Arc::new(data)).unwrap()
}

fn synthetic_env(config: EnvConfig, seed: u64) -> PortfolioEnv {
    let market = MarketConfig::new(3, 5, 2);
    let data = SyntheticMarket {
        steps: 80,
        volatility: 0.02,
        seed,
        ..Default::default()
    }
    .generate(&market)
    .unwrap();
    PortfolioEnv::new(&market, config, Arc::new(data)).unwrap()
}

#[test]
fn btc_eth_step_settles_against_next_prices() {
    let mut env = btc_eth_env(no_cost_config());
    assert_eq!(env.total_steps(), 1);
    env.reset();

    let result = env.step(&[0.6, 0.4]).unwrap();
    let btc = (99.0 - 101.0) / 101.0;
    let eth = (51.0 - 50.0) / 50.0;
    let expected_return = 0.6 * btc + 0.4 * eth;

    assert!((result.info.last_step_return - expected_return).abs() < 1e-9);
    assert!((result.info.portfolio_value - BALANCE * (1.0 + expected_return)).abs() < 1e-4);
    assert!((result.info.portfolio_value / BALANCE - 0.9961).abs() < 1e-4);
    assert!(result.terminated);
    assert!(!result.truncated);
    assert_eq!(result.info.transaction_cost, 0.0);
}

#[test]
fn btc_eth_benchmark_uses_same_alignment() {
    let mut env = btc_eth_env(no_cost_config());
    env.reset();
    env.step(&[0.5, 0.5]).unwrap();

    let benchmark = env.equal_weight_benchmark();
    assert_eq!(benchmark.len(), 2);
    let expected = BALANCE * (99.0 / 101.0 + 51.0 / 50.0) / 2.0;
    assert!((benchmark[1] - expected).abs() < 1e-3);

    // Uniform weights without costs track the benchmark for one step
    let summary = env.summary();
    assert!(summary.outperformance.abs() < 1e-6);
}

#[test]
fn normalized_action_passes_through() {
    let mut env = flat_env(3, 6, no_cost_config());
    env.reset();
    let result = env.step(&[0.5, 0.3, 0.2]).unwrap();
    for (w, expected) in result.info.weights.iter().zip([0.5, 0.3, 0.2]) {
        assert!((w - expected).abs() < 1e-9);
    }
}

#[test]
fn unnormalized_action_is_rescaled() {
    let mut env = flat_env(2, 6, no_cost_config());
    env.reset();
    let result = env.step(&[2.0, 2.0]).unwrap();
    for w in &result.info.weights {
        assert!((w - 0.5).abs() < 1e-9);
    }
}

#[test]
fn value_conserved_without_costs_or_moves() {
    let mut env = flat_env(3, 10, no_cost_config());
    env.reset();
    for action in [[1.0, 0.0, 0.0], [0.1, 0.1, 0.8], [0.0, 0.0, 5.0]] {
        let result = env.step(&action).unwrap();
        assert_eq!(result.info.portfolio_value, BALANCE);
        assert_eq!(result.info.last_step_return, 0.0);
    }
}

#[test]
fn transaction_cost_on_traded_value() {
    let config = EnvConfig {
        transaction_cost_pct: 0.001,
        ..no_cost_config()
    };
    let mut env = flat_env(2, 6, config);
    env.reset();
    // From [0.5, 0.5] to [1, 0] trades the whole book once
    let result = env.step(&[1.0, 0.0]).unwrap();
    assert!((result.info.transaction_cost - 100.0).abs() < 1e-9);
    assert!((result.info.portfolio_value - (BALANCE - 100.0)).abs() < 1e-9);

    // Holding the same weights costs nothing
    let result = env.step(&[1.0, 0.0]).unwrap();
    assert_eq!(result.info.transaction_cost, 0.0);
}

#[test]
fn higher_cost_never_raises_value() {
    let value_after = |cost: f64| {
        let mut env = synthetic_env(
            EnvConfig {
                transaction_cost_pct: cost,
                ..no_cost_config()
            },
            3,
        );
        env.reset();
        env.step(&[0.9, 0.05, 0.05]).unwrap().info.portfolio_value
    };
    let cheap = value_after(0.0);
    let mid = value_after(0.001);
    let dear = value_after(0.01);
    assert!(mid < cheap);
    assert!(dear < mid);
}

#[test]
fn rewards_stay_bounded() {
    let config = EnvConfig {
        reward_window_size: 6,
        transaction_cost_pct: 0.001,
        ..Default::default()
    };
    let mut env = synthetic_env(config.clone(), 11);
    let model = RewardModel::new(&config);
    env.reset();

    let mut steps = 0;
    loop {
        let action = match steps % 3 {
            0 => [0.8, 0.1, 0.1],
            1 => [0.1, 0.8, 0.1],
            _ => [0.2, 0.3, 0.5],
        };
        let result = env.step(&action).unwrap();
        steps += 1;
        if steps < config.reward_window_size {
            assert!([-0.01, 0.0, 0.01].contains(&result.reward));
        } else {
            assert!(result.reward.abs() <= model.max_reward() + 1e-12);
        }
        if result.terminated {
            break;
        }
    }
    assert_eq!(steps, env.total_steps());
}

#[test]
fn terminates_exactly_at_budget() {
    let mut env = flat_env(2, 9, EnvConfig::default());
    // 9 rows, window 2, default lookahead margin 2
    assert_eq!(env.total_steps(), 5);
    env.reset();
    for step in 1..=env.total_steps() {
        let result = env.step(&[0.5, 0.5]).unwrap();
        assert_eq!(result.terminated, step == env.total_steps());
        assert_eq!(result.info.step, step);
    }
    assert_eq!(env.state(), EnvState::Terminated);
    assert!(matches!(
        env.step(&[0.5, 0.5]),
        Err(PortfolioError::EpisodeTerminated { step: 5 })
    ));
}

#[test]
fn reset_starts_a_new_episode() {
    let mut env = btc_eth_env(no_cost_config());
    env.reset();
    env.step(&[1.0, 0.0]).unwrap();
    assert_eq!(env.state(), EnvState::Terminated);

    let (_, info) = env.reset();
    assert_eq!(env.state(), EnvState::Ready);
    assert_eq!(env.episode, 1);
    assert_eq!(info.step, 0);
    assert_eq!(info.portfolio_value, BALANCE);
    assert_eq!(info.weights, vec![0.5, 0.5]);
    assert_eq!(info.last_step_return, 0.0);
    assert!(env.portfolio().returns.is_empty());
    assert!(env.episode_history.is_empty());
}

#[test]
fn step_before_reset_rejected() {
    let mut env = btc_eth_env(no_cost_config());
    assert_eq!(env.state(), EnvState::Uninitialized);
    assert!(matches!(env.step(&[0.5, 0.5]), Err(PortfolioError::NotReset)));
}

#[test]
fn malformed_actions_rejected() {
    let mut env = flat_env(2, 6, no_cost_config());
    env.reset();
    assert!(matches!(
        env.step(&[1.0]),
        Err(PortfolioError::ActionLength {
            expected: 2,
            actual: 1
        })
    ));
    assert!(matches!(
        env.step(&[0.5, f64::NAN]),
        Err(PortfolioError::NonFiniteAction { index: 1, .. })
    ));
    // A rejected action leaves the episode untouched
    assert_eq!(env.state(), EnvState::Ready);
    assert_eq!(env.portfolio().step, 0);
}

#[test]
fn short_data_rejected_at_construction() {
    let market = MarketConfig::new(1, 3, 1);
    let data = MarketData::new(&market, Array2::zeros((3, 1)), Array2::ones((3, 1))).unwrap();
    let err = PortfolioEnv::new(&market, no_cost_config(), Arc::new(data)).err();
    assert_eq!(
        err,
        Some(PortfolioError::InsufficientData {
            required: 4,
            available: 3
        })
    );
}

#[test]
fn observation_slides_with_step() {
    let mut env = btc_eth_env(no_cost_config());
    let (obs, _) = env.reset();
    assert_eq!(obs.market.dim(), (3, 2));
    assert_eq!(obs.market[[0, 0]], 0.0);
    assert_eq!(obs.news, [0.0]);
    assert_eq!(obs.as_batch().dim(), (1, 3, 2));

    let result = env.step(&[0.5, 0.5]).unwrap();
    assert_eq!(result.observation.market[[0, 0]], 2.0);
    assert_eq!(result.observation.market[[2, 1]], 7.0);
}

#[test]
fn sentiment_fills_news_channel() {
    let mut env = btc_eth_env(no_cost_config())
        .with_sentiment(Arc::new(SentimentSeries::new(vec![0.25, -0.5])));
    let (obs, _) = env.reset();
    assert_eq!(obs.news, [0.25]);
    let result = env.step(&[0.5, 0.5]).unwrap();
    assert_eq!(result.observation.news, [-0.5]);
}

#[test]
fn windowed_sharpe_reported_after_half_window() {
    let config = EnvConfig {
        reward_window_size: 4,
        ..no_cost_config()
    };
    let mut env = synthetic_env(config, 5);
    env.reset();
    let first = env.step(&[0.4, 0.3, 0.3]).unwrap();
    assert_eq!(first.info.sharpe_ratio_window, 0.0);
    env.step(&[0.4, 0.3, 0.3]).unwrap();
    let third = env.step(&[0.4, 0.3, 0.3]).unwrap();
    assert_ne!(third.info.sharpe_ratio_window, 0.0);
}

#[test]
fn vectorized_instances_are_independent() {
    let market = MarketConfig::new(3, 5, 2);
    let data = Arc::new(
        SyntheticMarket {
            steps: 40,
            volatility: 0.02,
            ..Default::default()
        }
        .generate(&market)
        .unwrap(),
    );
    let config = EnvConfig {
        reward_window_size: 4,
        ..Default::default()
    };
    let mut vec_env = VecEnv::replicated(&market, &config, data.clone(), 2).unwrap();
    let mut solo = PortfolioEnv::new(&market, config, data).unwrap();

    vec_env.reset();
    solo.reset();
    let actions = vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]];
    for _ in 0..5 {
        let results = vec_env.step(&actions).unwrap();
        let solo_result = solo.step(&actions[0]).unwrap();
        assert_eq!(results[0].info, solo_result.info);
        assert_eq!(results[0].reward, solo_result.reward);
        assert_ne!(results[0].info.portfolio_value, results[1].info.portfolio_value);
    }
    assert_eq!(vec_env.envs[1].portfolio().returns.len(), 4);

    assert!(matches!(
        vec_env.step(&actions[..1]),
        Err(PortfolioError::ActionLength { .. })
    ));
}

#[test]
fn rejected_batch_keeps_instances_in_lockstep() {
    let market = MarketConfig::new(2, 2, 1);
    let data = Arc::new(
        MarketData::new(
            &market,
            Array2::zeros((8, 2)),
            Array2::from_elem((8, 2), 10.0),
        )
        .unwrap(),
    );
    let mut vec_env = VecEnv::replicated(&market, &no_cost_config(), data, 2).unwrap();
    vec_env.reset();

    assert!(matches!(
        vec_env.step(&[vec![0.5, 0.5], vec![0.5, f64::NAN]]),
        Err(PortfolioError::NonFiniteAction { index: 1, .. })
    ));
    let steps: Vec<usize> = vec_env.envs.iter().map(|env| env.portfolio().step).collect();
    assert_eq!(steps, vec![0, 0]);
    assert!(vec_env.envs.iter().all(|env| env.state() == EnvState::Ready));

    let results = vec_env.step(&[vec![0.5, 0.5], vec![0.5, 0.5]]).unwrap();
    assert_eq!(results.len(), 2);
    assert!(vec_env.envs.iter().all(|env| env.portfolio().step == 1));
}

#[test]
fn huge_finite_action_still_sums_to_one() {
    let mut env = flat_env(2, 6, no_cost_config());
    env.reset();
    let result = env.step(&[f64::MAX, f64::MAX]).unwrap();
    let sum: f64 = result.info.weights.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(result.info.weights.iter().all(|w| (0.0..=1.0).contains(w)));
    assert!((result.info.portfolio_value - BALANCE).abs() < 1e-6);
}
