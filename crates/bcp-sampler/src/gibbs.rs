// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::hmc::{ContinuousKernel, ContinuousStats, Phase};
use crate::metropolis::TauKernel;
use bcp_core::BcpError;
use bcp_model::{ChangePointTarget, Theta};
use rand::Rng;

/// Current position of one chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ChainState {
    pub tau: usize,
    pub theta: Theta,
}

/// Alternates a discrete change-index update with a continuous-block update,
/// each conditioned on the other's latest value.
#[derive(Clone, Debug)]
pub struct BlockedGibbs<D, C> {
    discrete: D,
    continuous: C,
}

impl<D, C> BlockedGibbs<D, C>
where
    D: TauKernel,
    C: ContinuousKernel,
{
    pub fn new(discrete: D, continuous: C) -> Self {
        Self {
            discrete,
            continuous,
        }
    }

    pub fn discrete(&self) -> &D {
        &self.discrete
    }

    pub fn continuous(&self) -> &C {
        &self.continuous
    }

    pub fn initialize<T, R>(
        &mut self,
        target: &T,
        state: &ChainState,
        rng: &mut R,
    ) -> Result<(), BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized,
    {
        if state.tau >= target.n() {
            return Err(BcpError::precondition(format!(
                "initial tau={} out of range for n={}",
                state.tau,
                target.n()
            )));
        }
        self.continuous
            .initialize(target, state.tau, &state.theta, rng)
    }

    pub fn step<T, R>(
        &mut self,
        target: &T,
        state: &mut ChainState,
        phase: Phase,
        rng: &mut R,
    ) -> Result<(), BcpError>
    where
        T: ChangePointTarget + ?Sized,
        R: Rng + ?Sized,
    {
        state.tau = self.discrete.step(target, state.tau, &state.theta, rng)?;
        state.theta = self
            .continuous
            .step(target, state.tau, &state.theta, phase, rng)?;
        Ok(())
    }

    pub fn end_warmup(&mut self) {
        self.continuous.end_warmup();
        self.discrete.reset_stats();
        self.continuous.reset_stats();
    }

    pub fn tau_acceptance_rate(&self) -> f64 {
        self.discrete.acceptance_rate()
    }

    pub fn continuous_stats(&self) -> ContinuousStats {
        self.continuous.stats()
    }
}
