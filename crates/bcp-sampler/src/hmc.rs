// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::adaptation::{DualAveraging, WarmupSchedule, WelfordVariance, clamp_step_size};
use bcp_core::BcpError;
use bcp_model::{CONTINUOUS_DIM, ChangePointTarget, Theta};
use rand::Rng;
use rand_distr::StandardNormal;

/// Tag recorded in run diagnostics for the continuous update.
pub const GRADIENT_BASED_TAG: &str = "gradient-based";

const DEFAULT_LEAPFROG_STEPS: usize = 10;
const DEFAULT_TARGET_ACCEPT: f64 = 0.8;
const DEFAULT_MAX_ENERGY_ERROR: f64 = 1000.0;
const STEP_SEARCH_MAX_ROUNDS: usize = 100;

/// Position of a transition within a chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Warmup { iteration: usize },
    Sampling,
}

/// Post-warmup statistics of a continuous kernel.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ContinuousStats {
    pub transitions: usize,
    pub mean_accept_prob: f64,
    pub divergences: usize,
    pub step_size: f64,
    pub inverse_metric: Theta,
}

/// Update of the continuous block conditioned on the change index.
pub trait ContinuousKernel {
    fn tag(&self) -> &'static str;

    /// Prepares the kernel at the chain's starting state.
    fn initialize<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        rng: &mut R,
    ) -> Result<(), BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized;

    fn step<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        phase: Phase,
        rng: &mut R,
    ) -> Result<Theta, BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized;

    /// Freezes adaptation; called once between warmup and sampling.
    fn end_warmup(&mut self);

    fn stats(&self) -> ContinuousStats;

    fn reset_stats(&mut self);
}

/// Configuration for [`Hmc`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct HmcConfig {
    pub leapfrog_steps: usize,
    /// Mean acceptance probability targeted by step size adaptation.
    pub target_accept: f64,
    /// Fixed starting step size; `None` searches for one at the initial state.
    pub initial_step_size: Option<f64>,
    /// Energy error beyond which a trajectory is treated as divergent.
    pub max_energy_error: f64,
}

impl Default for HmcConfig {
    fn default() -> Self {
        Self {
            leapfrog_steps: DEFAULT_LEAPFROG_STEPS,
            target_accept: DEFAULT_TARGET_ACCEPT,
            initial_step_size: None,
            max_energy_error: DEFAULT_MAX_ENERGY_ERROR,
        }
    }
}

impl HmcConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if self.leapfrog_steps == 0 {
            return Err(BcpError::configuration(
                "HmcConfig.leapfrog_steps must be >= 1; got 0",
            ));
        }
        if !self.target_accept.is_finite() || self.target_accept <= 0.0 || self.target_accept >= 1.0
        {
            return Err(BcpError::configuration(format!(
                "HmcConfig.target_accept must be in (0, 1); got {}",
                self.target_accept
            )));
        }
        if let Some(step) = self.initial_step_size
            && (!step.is_finite() || step <= 0.0)
        {
            return Err(BcpError::configuration(format!(
                "HmcConfig.initial_step_size must be finite and > 0 when provided; got {step}"
            )));
        }
        if !self.max_energy_error.is_finite() || self.max_energy_error <= 0.0 {
            return Err(BcpError::configuration(format!(
                "HmcConfig.max_energy_error must be finite and > 0; got {}",
                self.max_energy_error
            )));
        }
        Ok(())
    }
}

/// Static-trajectory Hamiltonian Monte Carlo with a diagonal metric.
#[derive(Clone, Debug)]
pub struct Hmc {
    config: HmcConfig,
    step_size: f64,
    inverse_metric: Theta,
    dual: DualAveraging,
    schedule: WarmupSchedule,
    window: WelfordVariance,
    transitions: usize,
    accept_sum: f64,
    divergences: usize,
}

struct Trajectory {
    theta: Theta,
    log_density: f64,
    momentum: Theta,
}

impl Hmc {
    pub fn new(config: HmcConfig, inverse_metric: Theta, tune: usize) -> Result<Self, BcpError> {
        config.validate()?;
        if inverse_metric.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(BcpError::numerical(format!(
                "initial inverse metric must be finite and positive; got {inverse_metric:?}"
            )));
        }
        let step_size = config.initial_step_size.unwrap_or(1.0);
        Ok(Self {
            dual: DualAveraging::new(step_size, config.target_accept),
            schedule: WarmupSchedule::new(tune),
            config,
            step_size,
            inverse_metric,
            window: WelfordVariance::new(),
            transitions: 0,
            accept_sum: 0.0,
            divergences: 0,
        })
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn inverse_metric(&self) -> &Theta {
        &self.inverse_metric
    }

    fn draw_momentum<R: Rng + ?Sized>(&self, rng: &mut R) -> Theta {
        let mut p = [0.0; CONTINUOUS_DIM];
        for (slot, inv) in p.iter_mut().zip(self.inverse_metric.iter()) {
            let z: f64 = rng.sample(StandardNormal);
            *slot = z / inv.sqrt();
        }
        p
    }

    fn kinetic(&self, momentum: &Theta) -> f64 {
        momentum
            .iter()
            .zip(self.inverse_metric.iter())
            .map(|(p, inv)| 0.5 * inv * p * p)
            .sum()
    }

    /// Integrates `steps` leapfrog steps; `None` once any state is non-finite.
    #[allow(clippy::too_many_arguments)]
    fn leapfrog<T: ChangePointTarget + ?Sized>(
        &self,
        target: &T,
        tau: usize,
        theta: &Theta,
        grad: &Theta,
        momentum: &Theta,
        step_size: f64,
        steps: usize,
    ) -> Option<Trajectory> {
        let mut q = *theta;
        let mut p = *momentum;
        let mut g = *grad;
        let mut log_density = f64::NAN;

        for _ in 0..steps {
            for k in 0..CONTINUOUS_DIM {
                p[k] += 0.5 * step_size * g[k];
                q[k] += step_size * self.inverse_metric[k] * p[k];
            }
            log_density = target.log_density_and_gradient(tau, &q, &mut g);
            if !log_density.is_finite() || g.iter().any(|v| !v.is_finite()) {
                return None;
            }
            for k in 0..CONTINUOUS_DIM {
                p[k] += 0.5 * step_size * g[k];
            }
        }

        if p.iter().chain(q.iter()).any(|v| !v.is_finite()) {
            return None;
        }
        Some(Trajectory {
            theta: q,
            log_density,
            momentum: p,
        })
    }

    fn current_density<T: ChangePointTarget + ?Sized>(
        target: &T,
        tau: usize,
        theta: &Theta,
    ) -> Result<(f64, Theta), BcpError> {
        let mut grad = [0.0; CONTINUOUS_DIM];
        let log_density = target.log_density_and_gradient(tau, theta, &mut grad);
        if !log_density.is_finite() || grad.iter().any(|v| !v.is_finite()) {
            return Err(BcpError::numerical(format!(
                "non-finite log density or gradient at tau={tau}, theta={theta:?}"
            )));
        }
        Ok((log_density, grad))
    }

    /// Doubles or halves the step size until a single leapfrog step crosses
    /// an acceptance probability of 0.8.
    fn search_step_size<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        rng: &mut R,
    ) -> Result<(), BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized,
    {
        let (log_density, grad) = Self::current_density(target, tau, theta)?;
        let threshold = 0.8f64.ln();
        let mut step_size = clamp_step_size(self.step_size);
        let mut direction = 0i8;

        for _ in 0..STEP_SEARCH_MAX_ROUNDS {
            let momentum = self.draw_momentum(rng);
            let h0 = -log_density + self.kinetic(&momentum);
            let delta = match self.leapfrog(target, tau, theta, &grad, &momentum, step_size, 1) {
                Some(end) => {
                    let h1 = -end.log_density + self.kinetic(&end.momentum);
                    let delta = h0 - h1;
                    if delta.is_finite() { delta } else { f64::NEG_INFINITY }
                }
                None => f64::NEG_INFINITY,
            };

            if direction == 0 {
                direction = if delta > threshold { 1 } else { -1 };
            }
            let keep_going = if direction == 1 {
                delta > threshold
            } else {
                delta < threshold
            };
            if !keep_going {
                break;
            }

            let next = if direction == 1 {
                step_size * 2.0
            } else {
                step_size * 0.5
            };
            if clamp_step_size(next) != next {
                break;
            }
            step_size = next;
        }

        self.step_size = step_size;
        self.dual.restart(step_size);
        Ok(())
    }

    fn adapt<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        iteration: usize,
        accept_prob: f64,
        rng: &mut R,
    ) -> Result<(), BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized,
    {
        self.step_size = self.dual.update(accept_prob);

        if self.schedule.in_window(iteration) {
            self.window.add(theta);
        }
        if self.schedule.is_window_end(iteration) {
            self.inverse_metric = self.window.regularized(&self.inverse_metric);
            self.window.reset();
            self.schedule.advance(iteration);
            self.search_step_size(target, tau, theta, rng)?;
        }
        Ok(())
    }
}

impl ContinuousKernel for Hmc {
    fn tag(&self) -> &'static str {
        GRADIENT_BASED_TAG
    }

    fn initialize<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        rng: &mut R,
    ) -> Result<(), BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized,
    {
        if self.config.initial_step_size.is_some() {
            Self::current_density(target, tau, theta)?;
            return Ok(());
        }
        self.search_step_size(target, tau, theta, rng)
    }

    fn step<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        phase: Phase,
        rng: &mut R,
    ) -> Result<Theta, BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized,
    {
        let (log_density, grad) = Self::current_density(target, tau, theta)?;
        let momentum = self.draw_momentum(rng);
        let h0 = -log_density + self.kinetic(&momentum);

        let proposal = self.leapfrog(
            target,
            tau,
            theta,
            &grad,
            &momentum,
            self.step_size,
            self.config.leapfrog_steps,
        );

        let (next, accept_prob, divergent) = match proposal {
            Some(end) => {
                let h1 = -end.log_density + self.kinetic(&end.momentum);
                let energy_error = h1 - h0;
                if !energy_error.is_finite() || energy_error > self.config.max_energy_error {
                    (*theta, 0.0, true)
                } else {
                    let accept_prob = (-energy_error).exp().min(1.0);
                    let u: f64 = rng.random();
                    if u < accept_prob {
                        (end.theta, accept_prob, false)
                    } else {
                        (*theta, accept_prob, false)
                    }
                }
            }
            None => (*theta, 0.0, true),
        };

        if next.iter().any(|v| !v.is_finite()) {
            return Err(BcpError::numerical(format!(
                "continuous update produced a non-finite state: {next:?}"
            )));
        }

        self.transitions += 1;
        self.accept_sum += accept_prob;
        if divergent {
            self.divergences += 1;
        }

        if let Phase::Warmup { iteration } = phase {
            self.adapt(target, tau, &next, iteration, accept_prob, rng)?;
        }

        Ok(next)
    }

    fn end_warmup(&mut self) {
        self.step_size = self.dual.final_step_size();
    }

    fn stats(&self) -> ContinuousStats {
        let mean_accept_prob = if self.transitions == 0 {
            0.0
        } else {
            self.accept_sum / self.transitions as f64
        };
        ContinuousStats {
            transitions: self.transitions,
            mean_accept_prob,
            divergences: self.divergences,
            step_size: self.step_size,
            inverse_metric: self.inverse_metric,
        }
    }

    fn reset_stats(&mut self) {
        self.transitions = 0;
        self.accept_sum = 0.0;
        self.divergences = 0;
    }
}
