use std::fs;

use crate::constants::env::{EPSILON, STD_EPSILON, SUM_ATOL, SUM_RTOL};

pub fn create_folder_if_not_exists(dir: &str) -> std::io::Result<()> {
    fs::create_dir_all(dir)
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Annualized Sharpe ratio of per-step returns. Zero when volatility is below
/// `STD_EPSILON`.
pub fn annualized_sharpe(returns: &[f64], risk_free_per_step: f64, annualization: f64) -> f64 {
    let std = std_dev(returns);
    if std < STD_EPSILON {
        return 0.0;
    }
    (mean(returns) - risk_free_per_step) / std * annualization
}

/// Largest peak-to-trough decline as a fraction of the peak
pub fn max_drawdown(values: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst: f64 = 0.0;
    for &value in values {
        peak = peak.max(value);
        if peak > 0.0 {
            worst = worst.max((peak - value) / peak);
        }
    }
    worst
}

/// Numerically stable softmax, in place
pub fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

pub fn sums_to_one(sum: f64) -> bool {
    (sum - 1.0).abs() <= SUM_ATOL + SUM_RTOL
}

/// Turns a raw action into portfolio weights: rescale when the sum is off,
/// clip to [0, 1], rescale once more if clipping moved the sum.
pub fn normalize_weights(action: &[f64]) -> Vec<f64> {
    let mut weights = action.to_vec();
    let mut sum: f64 = weights.iter().sum();
    if !sum.is_finite() {
        // Finite entries whose sum overflows
        let largest = weights.iter().fold(0.0f64, |acc, w| acc.max(w.abs()));
        weights.iter_mut().for_each(|w| *w /= largest);
        sum = weights.iter().sum();
    }
    if !sums_to_one(sum) {
        if sum > EPSILON {
            weights.iter_mut().for_each(|w| *w /= sum + EPSILON);
        } else {
            softmax_in_place(&mut weights);
        }
    }
    weights.iter_mut().for_each(|w| *w = w.clamp(0.0, 1.0));

    let clipped_sum: f64 = weights.iter().sum();
    if clipped_sum <= EPSILON {
        return uniform_weights(weights.len());
    }
    if !sums_to_one(clipped_sum) {
        weights.iter_mut().for_each(|w| *w /= clipped_sum);
    }
    weights
}

pub fn uniform_weights(num_assets: usize) -> Vec<f64> {
    vec![1.0 / num_assets as f64; num_assets]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_is_population() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((std_dev(&values) - 1.25f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn flat_returns_have_zero_sharpe() {
        assert_eq!(annualized_sharpe(&[0.01; 10], 0.0, 10.0), 0.0);
    }

    #[test]
    fn sharpe_is_annualized() {
        let returns = [0.01, -0.01, 0.02, 0.0];
        let expected = (mean(&returns) - 0.001) / std_dev(&returns) * 4.0;
        assert!((annualized_sharpe(&returns, 0.001, 4.0) - expected).abs() < 1e-12);
    }

    #[test]
    fn drawdown_of_peak_and_trough() {
        assert!((max_drawdown(&[100.0, 120.0, 90.0, 130.0]) - 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn softmax_handles_large_logits() {
        let mut values = [1000.0, 1000.0, 1000.0, 1000.0];
        softmax_in_place(&mut values);
        for v in values {
            assert!((v - 0.25).abs() < 1e-6);
        }
    }

    #[test]
    fn normalized_weights_pass_through() {
        let weights = normalize_weights(&[0.5, 0.3, 0.2]);
        for (w, expected) in weights.iter().zip([0.5, 0.3, 0.2]) {
            assert!((w - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn normalized_weights_rescale() {
        let weights = normalize_weights(&[2.0, 2.0]);
        assert!((weights[0] - 0.5).abs() < 1e-9);
        assert!((weights[1] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn all_zero_action_becomes_uniform() {
        let weights = normalize_weights(&[0.0, 0.0, 0.0, 0.0]);
        for w in weights {
            assert!((w - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn negative_entries_clipped_and_rescaled() {
        let weights = normalize_weights(&[0.8, 0.8, -0.6]);
        assert_eq!(weights[2], 0.0);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(weights.iter().all(|w| (0.0..=1.0).contains(w)));
    }

    #[test]
    fn overflowing_sum_still_normalizes() {
        let weights = normalize_weights(&[f64::MAX, f64::MAX]);
        for w in &weights {
            assert!((w - 0.5).abs() < 1e-6);
        }

        let weights = normalize_weights(&[f64::MAX, f64::MAX / 2.0, 0.0]);
        assert!((weights.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((weights[0] - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(weights[2], 0.0);
    }
}
