// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::{BcpError, ExecutionContext, mean, population_std};
use bcp_sampler::Trace;
use tracing::{debug, warn};

/// Chains count as converged when every parameter's `r_hat` is below this.
pub const DEFAULT_R_HAT_THRESHOLD: f64 = 1.1;

/// Below this many draws per chain autocorrelations are not estimated.
const MIN_ESS_DRAWS: usize = 4;

/// Convergence summary of one parameter.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ParameterConvergence {
    pub name: String,
    pub r_hat: f64,
    pub ess: f64,
    pub mean: f64,
    pub sd: f64,
}

/// Convergence summary over every parameter of a trace.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceReport {
    pub parameters: Vec<ParameterConvergence>,
    pub converged: bool,
    pub r_hat_max: f64,
    pub r_hat_min: f64,
    pub min_ess: f64,
}

impl ConvergenceReport {
    pub fn parameter(&self, name: &str) -> Option<&ParameterConvergence> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// Gelman-Rubin and effective-sample-size checks over a multi-chain trace.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ConvergenceDiagnostics {
    pub r_hat_threshold: f64,
}

impl Default for ConvergenceDiagnostics {
    fn default() -> Self {
        Self {
            r_hat_threshold: DEFAULT_R_HAT_THRESHOLD,
        }
    }
}

impl ConvergenceDiagnostics {
    pub fn validate(&self) -> Result<(), BcpError> {
        if !self.r_hat_threshold.is_finite() || self.r_hat_threshold <= 1.0 {
            return Err(BcpError::configuration(format!(
                "ConvergenceDiagnostics.r_hat_threshold must be finite and > 1.0; got {}",
                self.r_hat_threshold
            )));
        }
        Ok(())
    }

    pub fn compute(&self, trace: &Trace) -> Result<ConvergenceReport, BcpError> {
        self.compute_with_context(trace, &ExecutionContext::new())
    }

    pub fn compute_with_context(
        &self,
        trace: &Trace,
        ctx: &ExecutionContext<'_>,
    ) -> Result<ConvergenceReport, BcpError> {
        self.validate()?;
        let mut parameters = Vec::with_capacity(trace.parameter_names().len());
        for &name in trace.parameter_names() {
            let chains = trace.parameter_chains(name)?;
            let r_hat = gelman_rubin(&chains)?;
            let ess = effective_sample_size(&chains)?;
            let flat: Vec<f64> = chains.concat();
            let mean = mean(&flat).unwrap_or(f64::NAN);
            let sd = population_std(&flat).unwrap_or(f64::NAN);
            parameters.push(ParameterConvergence {
                name: name.to_string(),
                r_hat,
                ess,
                mean,
                sd,
            });
        }

        let converged = parameters.iter().all(|p| p.r_hat < self.r_hat_threshold);
        let r_hat_max = parameters
            .iter()
            .map(|p| p.r_hat)
            .fold(f64::NEG_INFINITY, f64::max);
        let r_hat_min = parameters
            .iter()
            .map(|p| p.r_hat)
            .fold(f64::INFINITY, f64::min);
        let min_ess = parameters
            .iter()
            .map(|p| p.ess)
            .fold(f64::INFINITY, f64::min);

        debug!(converged, r_hat_max, r_hat_min, min_ess, "convergence diagnostics computed");
        if !converged && ctx.warnings_enabled() {
            let offenders: Vec<&str> = parameters
                .iter()
                .filter(|p| p.r_hat.is_nan() || p.r_hat >= self.r_hat_threshold)
                .map(|p| p.name.as_str())
                .collect();
            warn!(
                r_hat_max,
                threshold = self.r_hat_threshold,
                parameters = ?offenders,
                "chains have not converged"
            );
        }
        ctx.record_scalar("diagnostics.r_hat_max", r_hat_max);
        ctx.record_scalar("diagnostics.min_ess", min_ess);

        Ok(ConvergenceReport {
            parameters,
            converged,
            r_hat_max,
            r_hat_min,
            min_ess,
        })
    }
}

/// Convergence report with the default threshold.
pub fn check_convergence(trace: &Trace) -> Result<ConvergenceReport, BcpError> {
    ConvergenceDiagnostics::default().compute(trace)
}

fn validate_chains(chains: &[Vec<f64>]) -> Result<usize, BcpError> {
    if chains.len() < 2 {
        return Err(BcpError::precondition(format!(
            "convergence diagnostics need at least 2 chains; got {}",
            chains.len()
        )));
    }
    let draws = chains[0].len();
    if draws < 2 {
        return Err(BcpError::precondition(format!(
            "convergence diagnostics need at least 2 draws per chain; got {draws}"
        )));
    }
    if let Some((chain, bad)) = chains.iter().enumerate().find(|(_, c)| c.len() != draws) {
        return Err(BcpError::precondition(format!(
            "chain {chain} has {} draws; expected {draws}",
            bad.len()
        )));
    }
    Ok(draws)
}

fn sample_variance(values: &[f64], center: f64) -> f64 {
    let ss: f64 = values.iter().map(|v| (v - center).powi(2)).sum();
    ss / (values.len() - 1) as f64
}

/// Classic potential scale reduction factor `sqrt(var_plus / W)`.
///
/// A parameter that never varies reports 1.0; one that is constant within
/// each chain but differs between chains reports `+inf`.
pub fn gelman_rubin(chains: &[Vec<f64>]) -> Result<f64, BcpError> {
    let draws = validate_chains(chains)?;
    let n = draws as f64;

    let chain_means: Vec<f64> = chains
        .iter()
        .map(|c| mean(c).unwrap_or(f64::NAN))
        .collect();
    let within = chains
        .iter()
        .zip(chain_means.iter())
        .map(|(c, &m)| sample_variance(c, m))
        .sum::<f64>()
        / chains.len() as f64;
    let grand_mean = mean(&chain_means).unwrap_or(f64::NAN);
    let between = n * sample_variance(&chain_means, grand_mean);

    if within == 0.0 {
        return Ok(if between == 0.0 { 1.0 } else { f64::INFINITY });
    }
    let var_plus = (n - 1.0) / n * within + between / n;
    Ok((var_plus / within).sqrt())
}

/// Multi-chain effective sample size from within-chain autocorrelations,
/// truncated and smoothed with Geyer's initial monotone sequence.
///
/// Degenerate parameters (no variance at all) and chains too short to
/// estimate autocorrelation report the total draw count.
pub fn effective_sample_size(chains: &[Vec<f64>]) -> Result<f64, BcpError> {
    let draws = validate_chains(chains)?;
    let m = chains.len() as f64;
    let n = draws as f64;
    let total = m * n;
    if draws < MIN_ESS_DRAWS {
        return Ok(total);
    }

    let chain_means: Vec<f64> = chains
        .iter()
        .map(|c| mean(c).unwrap_or(f64::NAN))
        .collect();
    // Mean over chains of the biased autocovariance at `lag`.
    let autocov = |lag: usize| -> f64 {
        chains
            .iter()
            .zip(chain_means.iter())
            .map(|(c, &mu)| {
                c[..draws - lag]
                    .iter()
                    .zip(c[lag..].iter())
                    .map(|(a, b)| (a - mu) * (b - mu))
                    .sum::<f64>()
                    / n
            })
            .sum::<f64>()
            / m
    };

    let mean_var = autocov(0) * n / (n - 1.0);
    let grand_mean = mean(&chain_means).unwrap_or(f64::NAN);
    let var_plus = mean_var * (n - 1.0) / n + sample_variance(&chain_means, grand_mean);
    if var_plus == 0.0 {
        return Ok(total);
    }
    if !var_plus.is_finite() {
        return Ok(f64::NAN);
    }

    let rho = |lag: usize| 1.0 - (mean_var - autocov(lag)) / var_plus;

    let mut rho_hat = vec![0.0; draws];
    rho_hat[0] = 1.0;
    let mut rho_even = 1.0;
    let mut rho_odd = rho(1);
    rho_hat[1] = rho_odd;

    let mut t = 1;
    while t + 3 < draws && rho_even + rho_odd > 0.0 {
        rho_even = rho(t + 1);
        rho_odd = rho(t + 2);
        if rho_even + rho_odd >= 0.0 {
            rho_hat[t + 1] = rho_even;
            rho_hat[t + 2] = rho_odd;
        }
        t += 2;
    }

    let tau_floor = 1.0 / total.log10();
    if t < 3 {
        // No lag pair was examined; only the lag-1 term contributes.
        let tau_hat = (1.0 + 2.0 * rho_hat[1]).max(tau_floor);
        return Ok(total / tau_hat);
    }

    let max_t = t - 2;
    if rho_even > 0.0 && max_t + 1 < draws {
        rho_hat[max_t + 1] = rho_even;
    }

    let mut t = 1;
    while t + 2 <= max_t {
        let pair = rho_hat[t + 1] + rho_hat[t + 2];
        let previous = rho_hat[t - 1] + rho_hat[t];
        if pair > previous {
            rho_hat[t + 1] = previous / 2.0;
            rho_hat[t + 2] = rho_hat[t + 1];
        }
        t += 2;
    }

    let head: f64 = rho_hat[..=max_t].iter().sum();
    let tail = rho_hat.get(max_t + 1).copied().unwrap_or(0.0);
    let tau_hat = (-1.0 + 2.0 * head + tail).max(tau_floor);
    Ok(total / tau_hat)
}
