// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::params::{PosteriorSample, RegimeParams, Theta};
use crate::priors::HALF_LOG_2PI;
use crate::spec::ModelSpec;
use crate::variant::ModelVariant;

/// Joint log density over a discrete change index and a continuous block.
///
/// Sampler kernels are written against this contract, so each kernel can be
/// exercised against small synthetic targets in isolation.
pub trait ChangePointTarget: Send + Sync {
    fn variant(&self) -> ModelVariant;

    /// Series length; valid change indices are `0..n`.
    fn n(&self) -> usize;

    /// `ln p(x | tau, theta)`.
    fn log_likelihood(&self, tau: usize, theta: &Theta) -> f64;

    /// Prior terms on the unconstrained scale, including Jacobians and the
    /// uniform prior of the change index.
    fn log_prior(&self, theta: &Theta) -> f64;

    /// Writes `d/dtheta ln p(tau, theta | x)` into `grad` and returns the log density.
    fn log_density_and_gradient(&self, tau: usize, theta: &Theta, grad: &mut Theta) -> f64;

    fn log_density(&self, tau: usize, theta: &Theta) -> f64 {
        self.log_prior(theta) + self.log_likelihood(tau, theta)
    }

    /// Data-informed starting point for the continuous block.
    fn initial_theta(&self) -> Theta;

    /// Rough posterior variances of the continuous block, used to seed the
    /// HMC mass matrix before warmup adaptation refines it.
    fn initial_inverse_metric(&self) -> Theta;

    fn to_sample(&self, tau: usize, theta: &Theta) -> PosteriorSample {
        PosteriorSample {
            tau,
            params: RegimeParams::from_theta(self.variant(), theta),
        }
    }
}

impl ChangePointTarget for ModelSpec {
    fn variant(&self) -> ModelVariant {
        ModelSpec::variant(self)
    }

    fn n(&self) -> usize {
        ModelSpec::n(self)
    }

    fn log_likelihood(&self, tau: usize, theta: &Theta) -> f64 {
        let n = ModelSpec::n(self) as f64;
        let (left, right) = self.stats().regimes(tau);
        match ModelSpec::variant(self) {
            ModelVariant::MeanShift => {
                let eta = theta[2];
                let var = (2.0 * eta).exp();
                -n * HALF_LOG_2PI
                    - n * eta
                    - (left.sse(theta[0]) + right.sse(theta[1])) / (2.0 * var)
            }
            ModelVariant::VolatilityShift => {
                let (eta_1, eta_2) = (theta[1], theta[2]);
                let var_1 = (2.0 * eta_1).exp();
                let var_2 = (2.0 * eta_2).exp();
                -n * HALF_LOG_2PI
                    - left.count as f64 * eta_1
                    - right.count as f64 * eta_2
                    - left.sse(theta[0]) / (2.0 * var_1)
                    - right.sse(theta[0]) / (2.0 * var_2)
            }
        }
    }

    fn log_prior(&self, theta: &Theta) -> f64 {
        let priors = self.priors();
        let tau_prior = -(ModelSpec::n(self) as f64).ln();
        let continuous = match ModelSpec::variant(self) {
            ModelVariant::MeanShift => {
                priors.location.log_density(theta[0])
                    + priors.location.log_density(theta[1])
                    + priors.scale.log_density_log_scale(theta[2])
            }
            ModelVariant::VolatilityShift => {
                priors.location.log_density(theta[0])
                    + priors.scale.log_density_log_scale(theta[1])
                    + priors.scale.log_density_log_scale(theta[2])
            }
        };
        tau_prior + continuous
    }

    fn log_density_and_gradient(&self, tau: usize, theta: &Theta, grad: &mut Theta) -> f64 {
        let priors = self.priors();
        let (left, right) = self.stats().regimes(tau);
        match ModelSpec::variant(self) {
            ModelVariant::MeanShift => {
                let (mu_1, mu_2, eta) = (theta[0], theta[1], theta[2]);
                let var = (2.0 * eta).exp();
                let sse = left.sse(mu_1) + right.sse(mu_2);
                let n = ModelSpec::n(self) as f64;

                grad[0] = priors.location.d_log_density(mu_1) - left.d_sse(mu_1) / (2.0 * var);
                grad[1] = priors.location.d_log_density(mu_2) - right.d_sse(mu_2) / (2.0 * var);
                grad[2] = priors.scale.d_log_density_log_scale(eta) - n + sse / var;
            }
            ModelVariant::VolatilityShift => {
                let (mu, eta_1, eta_2) = (theta[0], theta[1], theta[2]);
                let var_1 = (2.0 * eta_1).exp();
                let var_2 = (2.0 * eta_2).exp();

                grad[0] = priors.location.d_log_density(mu)
                    - left.d_sse(mu) / (2.0 * var_1)
                    - right.d_sse(mu) / (2.0 * var_2);
                grad[1] = priors.scale.d_log_density_log_scale(eta_1) - left.count as f64
                    + left.sse(mu) / var_1;
                grad[2] = priors.scale.d_log_density_log_scale(eta_2) - right.count as f64
                    + right.sse(mu) / var_2;
            }
        }
        self.log_density(tau, theta)
    }

    fn initial_theta(&self) -> Theta {
        let center = self.stats().center();
        let log_scale = self.data_std().ln();
        match ModelSpec::variant(self) {
            ModelVariant::MeanShift => [center, center, log_scale],
            ModelVariant::VolatilityShift => [center, log_scale, log_scale],
        }
    }

    fn initial_inverse_metric(&self) -> Theta {
        let n = ModelSpec::n(self) as f64;
        let var = self.data_std() * self.data_std();
        match ModelSpec::variant(self) {
            ModelVariant::MeanShift => [2.0 * var / n, 2.0 * var / n, 1.0 / (2.0 * n)],
            ModelVariant::VolatilityShift => [var / n, 1.0 / n, 1.0 / n],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChangePointTarget;
    use crate::params::Theta;
    use crate::{ModelVariant, build};
    use approx::assert_relative_eq;
    use bcp_core::ObservationSeries;

    const HALF_LOG_2PI: f64 = 0.918_938_533_204_672_8;

    fn step_series() -> ObservationSeries {
        ObservationSeries::from_slice(&[0.2, -0.1, 0.4, 0.0, 3.1, 2.8, 3.3, 2.9])
            .expect("test series should be valid")
    }

    fn normal_ln_pdf(x: f64, mu: f64, sigma: f64) -> f64 {
        let z = (x - mu) / sigma;
        -0.5 * z * z - sigma.ln() - HALF_LOG_2PI
    }

    #[test]
    fn mean_shift_likelihood_matches_pointwise_sum() {
        let data = step_series();
        let spec = build(&data, ModelVariant::MeanShift).expect("build");
        let theta: Theta = [0.1, 3.0, 0.25f64.ln()];
        let tau = 3;

        let expected: f64 = data
            .values()
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let mu = if tau >= i { theta[0] } else { theta[1] };
                normal_ln_pdf(x, mu, 0.25)
            })
            .sum();
        assert_relative_eq!(spec.log_likelihood(tau, &theta), expected, epsilon = 1e-9);
    }

    #[test]
    fn volatility_shift_likelihood_matches_pointwise_sum() {
        let data = step_series();
        let spec = build(&data, ModelVariant::VolatilityShift).expect("build");
        let theta: Theta = [1.5, 0.5f64.ln(), 2.0f64.ln()];
        let tau = 5;

        let expected: f64 = data
            .values()
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let sigma = if tau >= i { 0.5 } else { 2.0 };
                normal_ln_pdf(x, theta[0], sigma)
            })
            .sum();
        assert_relative_eq!(spec.log_likelihood(tau, &theta), expected, epsilon = 1e-9);
    }

    #[test]
    fn likelihood_prefers_true_boundary() {
        let spec = build(&step_series(), ModelVariant::MeanShift).expect("build");
        let theta: Theta = [0.1, 3.0, 0.25f64.ln()];
        let at_truth = spec.log_likelihood(3, &theta);
        for tau in [0, 1, 2, 4, 5, 6, 7] {
            assert!(spec.log_likelihood(tau, &theta) < at_truth, "tau={tau}");
        }
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let data = step_series();
        for variant in ModelVariant::ALL {
            let spec = build(&data, variant).expect("build");
            let theta: Theta = [0.7, -0.2, 0.3];
            for tau in [0, 3, 7] {
                let mut grad = [0.0; 3];
                let logp = spec.log_density_and_gradient(tau, &theta, &mut grad);
                assert_relative_eq!(logp, spec.log_density(tau, &theta), epsilon = 1e-12);

                for k in 0..3 {
                    let h = 1e-6;
                    let mut plus = theta;
                    let mut minus = theta;
                    plus[k] += h;
                    minus[k] -= h;
                    let numeric =
                        (spec.log_density(tau, &plus) - spec.log_density(tau, &minus)) / (2.0 * h);
                    assert_relative_eq!(grad[k], numeric, epsilon = 1e-4, max_relative = 1e-6);
                }
            }
        }
    }

    #[test]
    fn initial_state_is_finite_and_positive_metric() {
        let spec = build(&step_series(), ModelVariant::VolatilityShift).expect("build");
        let theta = spec.initial_theta();
        assert!(theta.iter().all(|v| v.is_finite()));
        assert!(spec.log_density(0, &theta).is_finite());
        assert!(spec.initial_inverse_metric().iter().all(|v| *v > 0.0));
    }

    #[test]
    fn to_sample_constrains_scales() {
        let spec = build(&step_series(), ModelVariant::MeanShift).expect("build");
        let sample = spec.to_sample(2, &[1.0, 2.0, 0.0]);
        assert_eq!(sample.tau, 2);
        assert_eq!(sample.value("sigma"), Some(1.0));
    }
}
