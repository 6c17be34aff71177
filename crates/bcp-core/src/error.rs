// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use thiserror::Error;

/// Error taxonomy shared by every bcp-rs crate.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum BcpError {
    /// Unrecognized model variant, unknown parameter name, or an invalid
    /// configuration value.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Operation invoked out of order or on inputs that do not belong together.
    #[error("precondition failed: {0}")]
    Precondition(String),
    /// Degenerate input or a computation that produced a non-finite value.
    #[error("numerical error: {0}")]
    Numerical(String),
}

impl BcpError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical(message.into())
    }

    /// Short stable label for the error kind, used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Precondition(_) => "precondition",
            Self::Numerical(_) => "numerical",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BcpError;

    #[test]
    fn display_prefixes_match_kind() {
        assert_eq!(
            BcpError::configuration("unknown variant 'x'").to_string(),
            "configuration error: unknown variant 'x'"
        );
        assert_eq!(
            BcpError::precondition("model not built").to_string(),
            "precondition failed: model not built"
        );
        assert_eq!(
            BcpError::numerical("zero variance").to_string(),
            "numerical error: zero variance"
        );
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(BcpError::configuration("").kind(), "configuration");
        assert_eq!(BcpError::precondition("").kind(), "precondition");
        assert_eq!(BcpError::numerical("").kind(), "numerical");
    }
}
