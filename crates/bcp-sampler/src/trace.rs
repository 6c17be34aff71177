// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, Diagnostics};
use bcp_model::{ModelVariant, PosteriorSample, Theta};

/// Per-chain sampler statistics over the retained draws.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ChainStats {
    pub chain: usize,
    pub seed: u64,
    pub tau_acceptance_rate: f64,
    pub mean_accept_prob: f64,
    pub step_size: f64,
    pub divergences: usize,
    pub inverse_metric: Theta,
}

/// Retained posterior draws, `chains x draws`, plus run metadata.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Trace {
    variant: ModelVariant,
    series_len: usize,
    chains: Vec<Vec<PosteriorSample>>,
    chain_stats: Vec<ChainStats>,
    diagnostics: Diagnostics,
}

impl Trace {
    /// Builds a trace from completed chains.
    ///
    /// Every chain must hold the same non-zero number of draws of `variant`
    /// with change indices below `series_len`.
    pub fn new(
        variant: ModelVariant,
        series_len: usize,
        chains: Vec<Vec<PosteriorSample>>,
        chain_stats: Vec<ChainStats>,
        diagnostics: Diagnostics,
    ) -> Result<Self, BcpError> {
        let Some(first) = chains.first() else {
            return Err(BcpError::precondition("trace requires at least one chain"));
        };
        let draws = first.len();
        if draws == 0 {
            return Err(BcpError::precondition("trace chains must hold at least one draw"));
        }
        if chain_stats.len() != chains.len() {
            return Err(BcpError::precondition(format!(
                "trace has {} chains but {} chain stat entries",
                chains.len(),
                chain_stats.len()
            )));
        }
        for (chain, samples) in chains.iter().enumerate() {
            if samples.len() != draws {
                return Err(BcpError::precondition(format!(
                    "chain {chain} has {} draws; expected {draws}",
                    samples.len()
                )));
            }
            if let Some(bad) = samples
                .iter()
                .find(|s| s.params.variant() != variant || s.tau >= series_len)
            {
                return Err(BcpError::precondition(format!(
                    "chain {chain} holds a draw inconsistent with {variant} on n={series_len}: tau={}, variant={}",
                    bad.tau,
                    bad.params.variant()
                )));
            }
        }

        Ok(Self {
            variant,
            series_len,
            chains,
            chain_stats,
            diagnostics,
        })
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Length of the series the trace was sampled on.
    pub fn series_len(&self) -> usize {
        self.series_len
    }

    pub fn num_chains(&self) -> usize {
        self.chains.len()
    }

    pub fn num_draws(&self) -> usize {
        self.chains.first().map_or(0, Vec::len)
    }

    pub fn total_draws(&self) -> usize {
        self.num_chains() * self.num_draws()
    }

    pub fn chains(&self) -> &[Vec<PosteriorSample>] {
        &self.chains
    }

    pub fn chain(&self, chain: usize) -> Option<&[PosteriorSample]> {
        self.chains.get(chain).map(Vec::as_slice)
    }

    pub fn sample(&self, chain: usize, draw: usize) -> Option<&PosteriorSample> {
        self.chains.get(chain)?.get(draw)
    }

    /// Value of parameter `name` at `(chain, draw)`.
    pub fn value(&self, name: &str, chain: usize, draw: usize) -> Option<f64> {
        self.sample(chain, draw)?.value(name)
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        self.variant.parameter_names()
    }

    pub fn has_parameter(&self, name: &str) -> bool {
        self.variant.has_parameter(name)
    }

    /// Per-chain draws of one parameter.
    pub fn parameter_chains(&self, name: &str) -> Result<Vec<Vec<f64>>, BcpError> {
        if !self.has_parameter(name) {
            return Err(BcpError::configuration(format!(
                "unknown parameter '{name}' for {} model; expected one of {:?}",
                self.variant,
                self.parameter_names()
            )));
        }
        Ok(self
            .chains
            .iter()
            .map(|chain| {
                chain
                    .iter()
                    .map(|s| s.value(name).unwrap_or(f64::NAN))
                    .collect()
            })
            .collect())
    }

    pub fn chain_stats(&self) -> &[ChainStats] {
        &self.chain_stats
    }

    pub fn divergences(&self) -> usize {
        self.chain_stats.iter().map(|s| s.divergences).sum()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }
}
