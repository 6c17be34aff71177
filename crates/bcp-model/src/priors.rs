// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;

pub(crate) const HALF_LOG_2PI: f64 = 0.918_938_533_204_672_8;
const LN_2: f64 = std::f64::consts::LN_2;

/// `Normal(mu, sigma)` prior for location parameters.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalPrior {
    pub mu: f64,
    pub sigma: f64,
}

impl NormalPrior {
    pub fn log_density(&self, x: f64) -> f64 {
        let z = (x - self.mu) / self.sigma;
        -0.5 * z * z - self.sigma.ln() - HALF_LOG_2PI
    }

    /// Derivative of [`Self::log_density`] with respect to `x`.
    pub fn d_log_density(&self, x: f64) -> f64 {
        -(x - self.mu) / (self.sigma * self.sigma)
    }

    fn validate(&self, name: &str) -> Result<(), BcpError> {
        if !self.mu.is_finite() {
            return Err(BcpError::configuration(format!(
                "{name} prior mu must be finite; got {}",
                self.mu
            )));
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(BcpError::configuration(format!(
                "{name} prior sigma must be finite and > 0; got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

/// `HalfNormal(sigma)` prior for scale parameters, supported on `(0, inf)`.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfNormalPrior {
    pub sigma: f64,
}

impl HalfNormalPrior {
    pub fn log_density(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return f64::NEG_INFINITY;
        }
        let z = x / self.sigma;
        LN_2 - HALF_LOG_2PI - self.sigma.ln() - 0.5 * z * z
    }

    /// Log density of `eta = ln(x)`, including the Jacobian `exp(eta)`.
    pub fn log_density_log_scale(&self, eta: f64) -> f64 {
        let x = eta.exp();
        let z = x / self.sigma;
        LN_2 - HALF_LOG_2PI - self.sigma.ln() - 0.5 * z * z + eta
    }

    /// Derivative of [`Self::log_density_log_scale`] with respect to `eta`.
    pub fn d_log_density_log_scale(&self, eta: f64) -> f64 {
        let x = eta.exp();
        1.0 - x * x / (self.sigma * self.sigma)
    }

    fn validate(&self, name: &str) -> Result<(), BcpError> {
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(BcpError::configuration(format!(
                "{name} prior sigma must be finite and > 0; got {}",
                self.sigma
            )));
        }
        Ok(())
    }
}

/// Prior hyperparameters shared by both model variants.
///
/// The change index always has a `DiscreteUniform(0, n-1)` prior, which
/// contributes `-ln(n)` and is not configurable.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Priors {
    pub location: NormalPrior,
    pub scale: HalfNormalPrior,
}

impl Priors {
    /// `Normal(0, 10)` locations and `HalfNormal(1)` scales.
    pub const fn standard() -> Self {
        Self {
            location: NormalPrior {
                mu: 0.0,
                sigma: 10.0,
            },
            scale: HalfNormalPrior { sigma: 1.0 },
        }
    }

    pub(crate) fn validate(&self) -> Result<(), BcpError> {
        self.location.validate("location")?;
        self.scale.validate("scale")
    }
}

impl Default for Priors {
    fn default() -> Self {
        Self::standard()
    }
}
