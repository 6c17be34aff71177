// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;
use bcp_model::{ChangePointTarget, Theta};
use rand::Rng;

/// Tag recorded in run diagnostics for the discrete update.
pub const METROPOLIS_INTEGER_TAG: &str = "Metropolis-integer";

const DEFAULT_GLOBAL_FRACTION: f64 = 0.1;
const DEFAULT_PROPOSALS_PER_STEP: usize = 4;
const DEFAULT_WIDTH_DIVISOR: usize = 20;

/// Update of the change index conditioned on the continuous block.
pub trait TauKernel {
    fn tag(&self) -> &'static str;

    fn step<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        rng: &mut R,
    ) -> Result<usize, BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized;

    /// Fraction of accepted proposals since the last [`Self::reset_stats`].
    fn acceptance_rate(&self) -> f64;

    fn reset_stats(&mut self);
}

/// Configuration for [`MetropolisInteger`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct TauProposalConfig {
    /// Maximum random-walk step. `None` uses `max(1, n / 20)`.
    pub width: Option<usize>,
    /// Probability of an independent uniform proposal over `[0, n-1]`
    /// instead of a random-walk move.
    pub global_fraction: f64,
    /// Metropolis proposals per sampler step.
    pub proposals_per_step: usize,
}

impl Default for TauProposalConfig {
    fn default() -> Self {
        Self {
            width: None,
            global_fraction: DEFAULT_GLOBAL_FRACTION,
            proposals_per_step: DEFAULT_PROPOSALS_PER_STEP,
        }
    }
}

impl TauProposalConfig {
    pub fn validate(&self) -> Result<(), BcpError> {
        if matches!(self.width, Some(0)) {
            return Err(BcpError::configuration(
                "TauProposalConfig.width must be >= 1 when provided; got 0",
            ));
        }
        if !self.global_fraction.is_finite() || !(0.0..=1.0).contains(&self.global_fraction) {
            return Err(BcpError::configuration(format!(
                "TauProposalConfig.global_fraction must be in [0, 1]; got {}",
                self.global_fraction
            )));
        }
        if self.proposals_per_step == 0 {
            return Err(BcpError::configuration(
                "TauProposalConfig.proposals_per_step must be >= 1; got 0",
            ));
        }
        Ok(())
    }

    fn resolved_width(&self, n: usize) -> usize {
        let upper = n.saturating_sub(1).max(1);
        self.width
            .unwrap_or((n / DEFAULT_WIDTH_DIVISOR).max(1))
            .clamp(1, upper)
    }
}

/// Random-walk Metropolis over integers in `[0, n-1]`, reflecting at the
/// boundaries, mixed with independent uniform proposals.
///
/// Both proposal components are symmetric, so acceptance uses the likelihood
/// ratio alone (the change-index prior is uniform).
#[derive(Clone, Debug)]
pub struct MetropolisInteger {
    n: usize,
    width: usize,
    global_fraction: f64,
    proposals_per_step: usize,
    proposed: u64,
    accepted: u64,
}

impl MetropolisInteger {
    pub fn new(config: &TauProposalConfig, n: usize) -> Result<Self, BcpError> {
        config.validate()?;
        if n < 2 {
            return Err(BcpError::precondition(format!(
                "Metropolis-integer proposals need at least 2 change indices; got n={n}"
            )));
        }
        Ok(Self {
            n,
            width: config.resolved_width(n),
            global_fraction: config.global_fraction,
            proposals_per_step: config.proposals_per_step,
            proposed: 0,
            accepted: 0,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Draws a candidate change index; always in `[0, n-1]`.
    pub fn propose<R: Rng + ?Sized>(&self, tau: usize, rng: &mut R) -> usize {
        if self.global_fraction > 0.0 && rng.random::<f64>() < self.global_fraction {
            return rng.random_range(0..self.n);
        }
        let step = rng.random_range(1..=self.width) as i64;
        let signed = if rng.random_bool(0.5) { step } else { -step };
        reflect(tau as i64 + signed, (self.n - 1) as i64) as usize
    }
}

/// Mirrors `x` back into `[0, upper]`; valid while `|x - clamp(x)| <= upper`.
fn reflect(x: i64, upper: i64) -> i64 {
    if x < 0 {
        -x
    } else if x > upper {
        2 * upper - x
    } else {
        x
    }
}

impl TauKernel for MetropolisInteger {
    fn tag(&self) -> &'static str {
        METROPOLIS_INTEGER_TAG
    }

    fn step<T, R>(
        &mut self,
        target: &T,
        tau: usize,
        theta: &Theta,
        rng: &mut R,
    ) -> Result<usize, BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized,
    {
        let mut current = tau;
        let mut current_ll = target.log_likelihood(current, theta);
        if !current_ll.is_finite() {
            return Err(BcpError::numerical(format!(
                "non-finite log likelihood at tau={current}: {current_ll}"
            )));
        }

        for _ in 0..self.proposals_per_step {
            let candidate = self.propose(current, rng);
            self.proposed += 1;
            if candidate == current {
                self.accepted += 1;
                continue;
            }

            let candidate_ll = target.log_likelihood(candidate, theta);
            let log_ratio = candidate_ll - current_ll;
            if log_ratio.is_nan() {
                continue;
            }
            let u: f64 = rng.random();
            if log_ratio >= 0.0 || u.ln() < log_ratio {
                current = candidate;
                current_ll = candidate_ll;
                self.accepted += 1;
            }
        }

        Ok(current)
    }

    fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            return 0.0;
        }
        self.accepted as f64 / self.proposed as f64
    }

    fn reset_stats(&mut self) {
        self.proposed = 0;
        self.accepted = 0;
    }
}
