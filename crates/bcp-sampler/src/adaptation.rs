// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Warmup adaptation for the HMC kernel: dual-averaging step size control
//! and windowed estimation of a diagonal inverse metric.

use bcp_model::{CONTINUOUS_DIM, Theta};

const DEFAULT_GAMMA: f64 = 0.05;
const DEFAULT_T0: f64 = 10.0;
const DEFAULT_KAPPA: f64 = 0.75;

const MIN_STEP_SIZE: f64 = 1e-8;
const MAX_STEP_SIZE: f64 = 1e3;

const INIT_BUFFER: usize = 75;
const TERM_BUFFER: usize = 50;
const BASE_WINDOW: usize = 25;
/// Below this many tuning steps only the step size is adapted.
const MIN_METRIC_TUNE: usize = 20;

/// Weight (in pseudo-draws) pulling a window's variance estimate toward the
/// previous metric.
const METRIC_SHRINKAGE: f64 = 5.0;

pub(crate) fn clamp_step_size(step_size: f64) -> f64 {
    if step_size.is_finite() {
        step_size.clamp(MIN_STEP_SIZE, MAX_STEP_SIZE)
    } else {
        MIN_STEP_SIZE
    }
}

/// Nesterov dual averaging of `log(step_size)` toward a target mean
/// acceptance probability.
#[derive(Clone, Debug)]
pub struct DualAveraging {
    target_accept: f64,
    gamma: f64,
    t0: f64,
    kappa: f64,
    mu: f64,
    counter: f64,
    h_bar: f64,
    log_step: f64,
    log_step_bar: f64,
}

impl DualAveraging {
    pub fn new(step_size: f64, target_accept: f64) -> Self {
        let mut out = Self {
            target_accept,
            gamma: DEFAULT_GAMMA,
            t0: DEFAULT_T0,
            kappa: DEFAULT_KAPPA,
            mu: 0.0,
            counter: 0.0,
            h_bar: 0.0,
            log_step: 0.0,
            log_step_bar: 0.0,
        };
        out.restart(step_size);
        out
    }

    /// Forgets accumulated statistics and re-centres on `step_size`.
    pub fn restart(&mut self, step_size: f64) {
        let step_size = clamp_step_size(step_size);
        self.mu = (10.0 * step_size).ln();
        self.counter = 0.0;
        self.h_bar = 0.0;
        self.log_step = step_size.ln();
        self.log_step_bar = 0.0;
    }

    /// Feeds one transition's acceptance probability and returns the step
    /// size to use next.
    pub fn update(&mut self, accept_prob: f64) -> f64 {
        let accept = if accept_prob.is_nan() {
            0.0
        } else {
            accept_prob.clamp(0.0, 1.0)
        };

        self.counter += 1.0;
        let eta = 1.0 / (self.counter + self.t0);
        self.h_bar = (1.0 - eta) * self.h_bar + eta * (self.target_accept - accept);
        self.log_step = clamp_step_size(
            (self.mu - self.counter.sqrt() / self.gamma * self.h_bar).exp(),
        )
        .ln();
        let weight = self.counter.powf(-self.kappa);
        self.log_step_bar = weight * self.log_step + (1.0 - weight) * self.log_step_bar;

        self.log_step.exp()
    }

    /// Averaged step size, used once warmup ends.
    pub fn final_step_size(&self) -> f64 {
        if self.counter == 0.0 {
            return self.log_step.exp();
        }
        clamp_step_size(self.log_step_bar.exp())
    }
}

/// Streaming per-coordinate mean and variance.
#[derive(Clone, Debug, Default)]
pub struct WelfordVariance {
    count: usize,
    mean: Theta,
    m2: Theta,
}

impl WelfordVariance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn add(&mut self, theta: &Theta) {
        self.count += 1;
        let n = self.count as f64;
        for k in 0..CONTINUOUS_DIM {
            let delta = theta[k] - self.mean[k];
            self.mean[k] += delta / n;
            self.m2[k] += delta * (theta[k] - self.mean[k]);
        }
    }

    /// Sample variance (ddof 1); `None` with fewer than two draws.
    pub fn variance(&self) -> Option<Theta> {
        if self.count < 2 {
            return None;
        }
        let denom = (self.count - 1) as f64;
        let mut out = [0.0; CONTINUOUS_DIM];
        for (slot, m2) in out.iter_mut().zip(self.m2.iter()) {
            *slot = m2 / denom;
        }
        Some(out)
    }

    /// Variance shrunk toward `previous`, falling back to `previous` for
    /// coordinates whose estimate is unusable.
    pub fn regularized(&self, previous: &Theta) -> Theta {
        let Some(variance) = self.variance() else {
            return *previous;
        };
        let n = self.count as f64;
        let weight = n / (n + METRIC_SHRINKAGE);
        let mut out = *previous;
        for k in 0..CONTINUOUS_DIM {
            let blended = weight * variance[k] + (1.0 - weight) * previous[k];
            if blended.is_finite() && blended > 0.0 {
                out[k] = blended;
            }
        }
        out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Stan-style warmup layout: a fast initial buffer, a series of doubling
/// slow windows where the metric is estimated, and a fast terminal buffer.
#[derive(Clone, Debug)]
pub struct WarmupSchedule {
    tune: usize,
    init_buffer: usize,
    term_buffer: usize,
    window_size: usize,
    next_window_end: usize,
    adapt_metric: bool,
}

impl WarmupSchedule {
    pub fn new(tune: usize) -> Self {
        if tune < MIN_METRIC_TUNE {
            return Self {
                tune,
                init_buffer: tune,
                term_buffer: 0,
                window_size: 0,
                next_window_end: usize::MAX,
                adapt_metric: false,
            };
        }

        let (mut init_buffer, mut term_buffer, mut window_size) =
            (INIT_BUFFER, TERM_BUFFER, BASE_WINDOW);
        if init_buffer + term_buffer + window_size > tune {
            init_buffer = (0.15 * tune as f64) as usize;
            term_buffer = (0.1 * tune as f64) as usize;
            window_size = tune - init_buffer - term_buffer;
        }

        Self {
            tune,
            init_buffer,
            term_buffer,
            window_size,
            next_window_end: init_buffer + window_size - 1,
            adapt_metric: true,
        }
    }

    pub fn adapts_metric(&self) -> bool {
        self.adapt_metric
    }

    fn last_window_end(&self) -> usize {
        self.tune - self.term_buffer - 1
    }

    /// Whether draw `iteration` feeds the metric estimate.
    pub fn in_window(&self, iteration: usize) -> bool {
        self.adapt_metric
            && iteration >= self.init_buffer
            && iteration < self.tune - self.term_buffer
    }

    /// Whether the metric is updated after draw `iteration`.
    pub fn is_window_end(&self, iteration: usize) -> bool {
        self.adapt_metric && iteration == self.next_window_end
    }

    /// Moves to the next slow window after the one ending at `iteration`.
    /// A window that would leave too little room for its successor absorbs
    /// the remainder of the slow phase.
    pub fn advance(&mut self, iteration: usize) {
        let last = self.last_window_end();
        if self.next_window_end >= last {
            self.next_window_end = usize::MAX;
            return;
        }

        self.window_size *= 2;
        self.next_window_end = iteration + self.window_size;
        let boundary = self.next_window_end + 2 * self.window_size;
        if self.next_window_end > last || boundary >= self.tune - self.term_buffer {
            self.next_window_end = last;
        }
    }
}
