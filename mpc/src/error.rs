//! Error taxonomy of the SPDZ engine.
//!
//! Every error aborts the run for the party that observes it. [`SpdzError::category`]
//! tells a peer that provably cheated apart from an unreachable peer or a local
//! misconfiguration.

use thiserror::Error;

use crate::config::ConfigError;
use crate::preprocessing::PreprocessingError;
use crate::serializer::SerializationError;
use crate::transport::TransportError;

/// Coarse classification of fatal errors, one per remediation path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A peer deviated from the protocol in a way that is cryptographically detectable.
    Cheating,
    /// A peer could not be reached.
    Unreachable,
    /// A message or call did not fit the protocol's shape.
    ProtocolViolation,
    /// Correlated randomness could not be produced.
    Preprocessing,
    /// The local party was set up incorrectly.
    Misconfiguration,
}

#[derive(Debug, Error)]
pub enum SpdzError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Preprocessing(#[from] PreprocessingError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("MAC check failed, opened values were tampered with")]
    MacCheckFailed,

    #[error("broadcast digests did not match")]
    BroadcastInconsistency,

    #[error("opening of party {party} does not match its commitment")]
    CommitmentMismatch { party: usize },

    #[error("malformed message from party {party}: {reason}")]
    MalformedMessage {
        party: usize,
        reason: SerializationError,
    },

    #[error("{protocol} has no round {round}")]
    InvalidRound {
        protocol: &'static str,
        round: usize,
    },

    #[error("{protocol} reported completion without an output")]
    Unfinished { protocol: &'static str },

    #[error("party {party} provides this input but no value was given")]
    MissingInput { party: usize },

    #[error("expected exponentiation pipe of length {expected}, supplier gave {actual}")]
    ExpPipeLength { expected: usize, actual: usize },

    #[error("evaluation was aborted by an earlier error: {cause}")]
    Aborted {
        category: ErrorCategory,
        cause: String,
    },
}

impl SpdzError {
    /// Remediation class of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Transport(_) => ErrorCategory::Unreachable,
            Self::Preprocessing(_) => ErrorCategory::Preprocessing,
            Self::Config(_) | Self::MissingInput { .. } | Self::ExpPipeLength { .. } => {
                ErrorCategory::Misconfiguration
            }
            Self::MacCheckFailed
            | Self::BroadcastInconsistency
            | Self::CommitmentMismatch { .. } => ErrorCategory::Cheating,
            Self::MalformedMessage { .. } | Self::InvalidRound { .. } | Self::Unfinished { .. } => {
                ErrorCategory::ProtocolViolation
            }
            Self::Aborted { category, .. } => *category,
        }
    }

    pub(crate) fn malformed(party: usize, reason: SerializationError) -> Self {
        Self::MalformedMessage { party, reason }
    }

    pub(crate) fn invalid_round(protocol: &'static str, round: usize) -> Self {
        Self::InvalidRound { protocol, round }
    }
}

pub type Result<T, E = SpdzError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            SpdzError::MacCheckFailed.category(),
            ErrorCategory::Cheating
        );
        assert_eq!(
            SpdzError::from(TransportError::Recv(2)).category(),
            ErrorCategory::Unreachable
        );
        assert_eq!(
            SpdzError::from(ConfigError::ZeroBatchSize).category(),
            ErrorCategory::Misconfiguration
        );
        assert_eq!(
            SpdzError::invalid_round("InputProtocol", 7).category(),
            ErrorCategory::ProtocolViolation
        );
        assert_eq!(
            SpdzError::Aborted {
                category: ErrorCategory::Cheating,
                cause: SpdzError::BroadcastInconsistency.to_string(),
            }
            .category(),
            ErrorCategory::Cheating
        );
    }
}
