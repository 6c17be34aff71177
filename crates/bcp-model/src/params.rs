// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::variant::{MU, MU_1, MU_2, ModelVariant, SIGMA, SIGMA_1, SIGMA_2, TAU};
use bcp_core::BcpError;

/// Number of continuous parameters in either model variant.
pub const CONTINUOUS_DIM: usize = 3;

/// Continuous parameters on the unconstrained scale.
///
/// Locations are unchanged; scales are stored as `ln(sigma)`. The order
/// follows [`ModelVariant::continuous_names`].
pub type Theta = [f64; CONTINUOUS_DIM];

/// Continuous parameters on their natural scale.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "variant", rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RegimeParams {
    MeanShift { mu_1: f64, mu_2: f64, sigma: f64 },
    VolatilityShift { mu: f64, sigma_1: f64, sigma_2: f64 },
}

impl RegimeParams {
    pub fn variant(&self) -> ModelVariant {
        match self {
            Self::MeanShift { .. } => ModelVariant::MeanShift,
            Self::VolatilityShift { .. } => ModelVariant::VolatilityShift,
        }
    }

    pub fn from_theta(variant: ModelVariant, theta: &Theta) -> Self {
        match variant {
            ModelVariant::MeanShift => Self::MeanShift {
                mu_1: theta[0],
                mu_2: theta[1],
                sigma: theta[2].exp(),
            },
            ModelVariant::VolatilityShift => Self::VolatilityShift {
                mu: theta[0],
                sigma_1: theta[1].exp(),
                sigma_2: theta[2].exp(),
            },
        }
    }

    pub fn to_theta(&self) -> Result<Theta, BcpError> {
        let theta = match *self {
            Self::MeanShift { mu_1, mu_2, sigma } => {
                [mu_1, mu_2, positive_log("sigma", sigma)?]
            }
            Self::VolatilityShift {
                mu,
                sigma_1,
                sigma_2,
            } => [
                mu,
                positive_log("sigma_1", sigma_1)?,
                positive_log("sigma_2", sigma_2)?,
            ],
        };
        if let Some(bad) = theta.iter().find(|v| !v.is_finite()) {
            return Err(BcpError::numerical(format!(
                "regime parameters must be finite; got {bad}"
            )));
        }
        Ok(theta)
    }

    /// Value of a continuous parameter by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        match (*self, name) {
            (Self::MeanShift { mu_1, .. }, MU_1) => Some(mu_1),
            (Self::MeanShift { mu_2, .. }, MU_2) => Some(mu_2),
            (Self::MeanShift { sigma, .. }, SIGMA) => Some(sigma),
            (Self::VolatilityShift { mu, .. }, MU) => Some(mu),
            (Self::VolatilityShift { sigma_1, .. }, SIGMA_1) => Some(sigma_1),
            (Self::VolatilityShift { sigma_2, .. }, SIGMA_2) => Some(sigma_2),
            _ => None,
        }
    }

    pub fn is_finite(&self) -> bool {
        match *self {
            Self::MeanShift { mu_1, mu_2, sigma } => {
                mu_1.is_finite() && mu_2.is_finite() && sigma.is_finite()
            }
            Self::VolatilityShift {
                mu,
                sigma_1,
                sigma_2,
            } => mu.is_finite() && sigma_1.is_finite() && sigma_2.is_finite(),
        }
    }
}

fn positive_log(name: &str, value: f64) -> Result<f64, BcpError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(BcpError::numerical(format!(
            "{name} must be finite and > 0; got {value}"
        )));
    }
    Ok(value.ln())
}

/// One posterior draw: the change index plus the continuous block.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PosteriorSample {
    pub tau: usize,
    pub params: RegimeParams,
}

impl PosteriorSample {
    /// Value of any model parameter by name; `tau` is returned as `f64`.
    pub fn value(&self, name: &str) -> Option<f64> {
        if name == TAU {
            return Some(self.tau as f64);
        }
        self.params.get(name)
    }
}
