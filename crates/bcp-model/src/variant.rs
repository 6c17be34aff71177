// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use bcp_core::BcpError;
use std::fmt;
use std::str::FromStr;

pub const TAU: &str = "tau";
pub const MU_1: &str = "mu_1";
pub const MU_2: &str = "mu_2";
pub const SIGMA: &str = "sigma";
pub const MU: &str = "mu";
pub const SIGMA_1: &str = "sigma_1";
pub const SIGMA_2: &str = "sigma_2";

const MEAN_SHIFT_PARAMETERS: [&str; 4] = [TAU, MU_1, MU_2, SIGMA];
const VOLATILITY_SHIFT_PARAMETERS: [&str; 4] = [TAU, MU, SIGMA_1, SIGMA_2];

/// Supported change-point model shapes.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Two regime means, one shared scale.
    #[default]
    MeanShift,
    /// One shared mean, two regime scales.
    VolatilityShift,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::MeanShift, ModelVariant::VolatilityShift];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MeanShift => "mean_shift",
            Self::VolatilityShift => "volatility_shift",
        }
    }

    /// Parameter names in trace order: `tau` first, then the continuous block.
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            Self::MeanShift => &MEAN_SHIFT_PARAMETERS,
            Self::VolatilityShift => &VOLATILITY_SHIFT_PARAMETERS,
        }
    }

    /// Names of the continuous parameters, in `Theta` order.
    pub fn continuous_names(self) -> &'static [&'static str] {
        &self.parameter_names()[1..]
    }

    pub fn has_parameter(self, name: &str) -> bool {
        self.parameter_names().contains(&name)
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = BcpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean_shift" => Ok(Self::MeanShift),
            "volatility_shift" => Ok(Self::VolatilityShift),
            other => Err(BcpError::configuration(format!(
                "model variant must be 'mean_shift' or 'volatility_shift'; got '{other}'"
            ))),
        }
    }
}
