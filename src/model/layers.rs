use ndarray::{s, Array, Array1, Array2, Array3, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Dimension};
use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::Rng;

use crate::constants::network::LAYER_NORM_EPS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Linear,
    Relu,
    /// Row-wise softmax over the last axis
    Softmax,
}

impl Activation {
    pub fn apply_rows(&self, x: &mut Array2<f32>) {
        match self {
            Activation::Linear => {}
            Activation::Relu => x.mapv_inplace(|v| v.max(0.0)),
            Activation::Softmax => {
                for row in x.rows_mut() {
                    softmax_row(row);
                }
            }
        }
    }
}

pub fn softmax_row(mut row: ArrayViewMut1<f32>) {
    let max = row.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    row.mapv_inplace(|v| v / sum);
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn glorot_limit(fan_in: usize, fan_out: usize) -> f32 {
    (6.0 / (fan_in + fan_out) as f32).sqrt()
}

pub fn glorot_uniform(rows: usize, cols: usize, rng: &mut StdRng) -> Array2<f32> {
    let limit = glorot_limit(rows, cols);
    let dist = Uniform::new_inclusive(-limit, limit);
    Array2::from_shape_simple_fn((rows, cols), || rng.sample(&dist))
}

/// Fully connected layer, `y = act(x W + b)` with `W` shaped (in, out).
#[derive(Debug, Clone)]
pub struct Dense {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
    pub activation: Activation,
}

impl Dense {
    pub fn new(input: usize, output: usize, activation: Activation, rng: &mut StdRng) -> Self {
        Self {
            weight: glorot_uniform(input, output, rng),
            bias: Array1::zeros(output),
            activation,
        }
    }

    pub fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let mut y = x.dot(&self.weight) + &self.bias;
        self.activation.apply_rows(&mut y);
        y
    }

    pub fn output_dim(&self) -> usize {
        self.bias.len()
    }

    /// Sum of squared kernel entries
    pub fn squared_norm(&self) -> f32 {
        self.weight.iter().map(|w| w * w).sum()
    }

    pub fn param_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Temporal convolution with "same" padding and ReLU, mapping (T, in) to
/// (T, out).
#[derive(Debug, Clone)]
pub struct Conv1d {
    /// (kernel, in, out)
    pub weight: Array3<f32>,
    pub bias: Array1<f32>,
}

impl Conv1d {
    pub fn new(input: usize, filters: usize, kernel_size: usize, rng: &mut StdRng) -> Self {
        let limit = glorot_limit(kernel_size * input, kernel_size * filters);
        let dist = Uniform::new_inclusive(-limit, limit);
        Self {
            weight: Array3::from_shape_simple_fn((kernel_size, input, filters), || rng.sample(&dist)),
            bias: Array1::zeros(filters),
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.weight.len_of(Axis(0))
    }

    pub fn filters(&self) -> usize {
        self.bias.len()
    }

    pub fn forward(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let steps = x.nrows();
        let kernel_size = self.kernel_size();
        let pad_left = (kernel_size - 1) / 2;

        let mut y = Array2::zeros((steps, self.filters()));
        for t in 0..steps {
            let mut out = y.row_mut(t);
            for k in 0..kernel_size {
                let src = t + k;
                if src < pad_left || src - pad_left >= steps {
                    continue;
                }
                let tap = self.weight.index_axis(Axis(0), k);
                out += &x.row(src - pad_left).dot(&tap);
            }
            out += &self.bias;
        }
        y.mapv_inplace(|v| v.max(0.0));
        y
    }

    pub fn param_count(&self) -> usize {
        self.weight.len() + self.bias.len()
    }
}

/// Single LSTM layer with gate order input, forget, cell, output.
#[derive(Debug, Clone)]
pub struct Lstm {
    /// (in, 4 * units)
    pub kernel: Array2<f32>,
    /// (units, 4 * units)
    pub recurrent: Array2<f32>,
    pub bias: Array1<f32>,
    units: usize,
}

impl Lstm {
    pub fn new(input: usize, units: usize, rng: &mut StdRng) -> Self {
        let mut bias = Array1::zeros(4 * units);
        bias.slice_mut(s![units..2 * units]).fill(1.0);
        Self {
            kernel: glorot_uniform(input, 4 * units, rng),
            recurrent: glorot_uniform(units, 4 * units, rng),
            bias,
            units,
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Hidden state at every step, (T, units)
    pub fn forward_sequence(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = Array2::zeros((x.nrows(), self.units));
        self.run(x, |t, h| outputs.row_mut(t).assign(h));
        outputs
    }

    /// Hidden state after the last step, (units,)
    pub fn forward_last(&self, x: ArrayView2<f32>) -> Array1<f32> {
        self.run(x, |_, _| {})
    }

    fn run(&self, x: ArrayView2<f32>, mut on_step: impl FnMut(usize, &Array1<f32>)) -> Array1<f32> {
        let units = self.units;
        let mut h = Array1::<f32>::zeros(units);
        let mut c = Array1::<f32>::zeros(units);

        for (t, x_t) in x.rows().into_iter().enumerate() {
            let z = x_t.dot(&self.kernel) + h.dot(&self.recurrent) + &self.bias;
            let gate = |i: usize| z.slice(s![i * units..(i + 1) * units]);

            let input_gate = gate(0).mapv(sigmoid);
            let forget_gate = gate(1).mapv(sigmoid);
            let candidate = gate(2).mapv(f32::tanh);
            let output_gate = gate(3).mapv(sigmoid);

            c = &forget_gate * &c + &input_gate * &candidate;
            h = &output_gate * &c.mapv(f32::tanh);
            on_step(t, &h);
        }
        h
    }

    pub fn param_count(&self) -> usize {
        self.kernel.len() + self.recurrent.len() + self.bias.len()
    }
}

/// Normalizes over the last axis, then scales and shifts.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    pub gamma: Array1<f32>,
    pub beta: Array1<f32>,
    eps: f32,
}

impl LayerNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            gamma: Array1::ones(dim),
            beta: Array1::zeros(dim),
            eps: LAYER_NORM_EPS,
        }
    }

    pub fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
        let n = x.len() as f32;
        let mean = x.sum() / n;
        let variance = x.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
        let inv_std = 1.0 / (variance + self.eps).sqrt();
        x.mapv(|v| (v - mean) * inv_std) * &self.gamma + &self.beta
    }

    pub fn forward_rows(&self, x: &mut Array2<f32>) {
        for mut row in x.rows_mut() {
            let normed = self.forward(row.view());
            row.assign(&normed);
        }
    }

    pub fn param_count(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }
}

/// Inverted dropout, only active while training.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    pub rate: f32,
}

impl Dropout {
    pub fn new(rate: f32) -> Self {
        Self { rate }
    }

    pub fn apply<D: Dimension>(&self, x: Array<f32, D>, train: bool) -> Array<f32, D> {
        if !train || self.rate <= 0.0 {
            return x;
        }
        let keep = 1.0 - self.rate;
        let mut rng = rand::thread_rng();
        x.mapv_into(|v| if rng.gen::<f32>() < keep { v / keep } else { 0.0 })
    }
}
