use crate::state_provider::StateProviderError;
use std::fmt;
use types::{ArithError, BeaconStateError};

/// The source of a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The client's connection context was cancelled.
    Connection,
    /// The service is shutting down.
    Service,
    /// The transport stopped accepting messages (the receiving half was dropped).
    Transport,
    /// A computation produced a structurally impossible result; nothing derived from the
    /// snapshot can be trusted.
    UntrustedState,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CancelReason::Connection => write!(f, "connection context canceled"),
            CancelReason::Service => write!(f, "service context canceled"),
            CancelReason::Transport => write!(f, "stream transport canceled"),
            CancelReason::UntrustedState => write!(f, "untrusted state"),
        }
    }
}

/// The terminal status of a request or stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The request was malformed or asked for something that cannot be known yet.
    InvalidRequest(String),
    NotFound(String),
    ComputationFailure(String),
    /// The transport failed mid-stream.
    Unavailable(String),
    Canceled(CancelReason),
    /// An event subscription closed unexpectedly.
    Aborted(String),
}

impl ApiError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        ApiError::InvalidRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn computation_failure(msg: impl Into<String>) -> Self {
        ApiError::ComputationFailure(msg.into())
    }

    /// Returns `true` if the error ends a stream rather than a single epoch of it.
    pub fn is_terminal_for_stream(&self) -> bool {
        matches!(
            self,
            ApiError::Unavailable(_) | ApiError::Canceled(_) | ApiError::Aborted(_)
        )
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "not found: {}", msg),
            ApiError::ComputationFailure(msg) => write!(f, "computation failure: {}", msg),
            ApiError::Unavailable(msg) => write!(f, "unavailable: {}", msg),
            ApiError::Canceled(reason) => write!(f, "canceled: {}", reason),
            ApiError::Aborted(msg) => write!(f, "aborted: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<validator_duties::Error> for ApiError {
    fn from(e: validator_duties::Error) -> ApiError {
        ApiError::ComputationFailure(format!("{:?}", e))
    }
}

impl From<StateProviderError> for ApiError {
    fn from(e: StateProviderError) -> ApiError {
        match e {
            StateProviderError::StateNotFound(_) | StateProviderError::FinalizedStateNotFound => {
                ApiError::NotFound(format!("{:?}", e))
            }
            StateProviderError::BeaconStateError(_) => {
                ApiError::ComputationFailure(format!("{:?}", e))
            }
            StateProviderError::Unavailable(msg) => ApiError::Unavailable(msg),
        }
    }
}

impl From<BeaconStateError> for ApiError {
    fn from(e: BeaconStateError) -> ApiError {
        ApiError::ComputationFailure(format!("{:?}", e))
    }
}

impl From<ArithError> for ApiError {
    fn from(e: ArithError) -> ApiError {
        ApiError::ComputationFailure(format!("arithmetic error: {:?}", e))
    }
}

/// A failure while computing the duties of a single epoch.
#[derive(Debug, Clone, PartialEq)]
pub enum DutyError {
    /// The request itself could not be served (e.g. the slot clock is unreadable).
    Api(ApiError),
    StateProvider(StateProviderError),
    Duties(validator_duties::Error),
}

impl DutyError {
    /// Returns `true` if nothing derived from the underlying state can be trusted.
    pub fn is_structural(&self) -> bool {
        matches!(self, DutyError::Duties(e) if e.is_structural())
    }
}

impl From<StateProviderError> for DutyError {
    fn from(e: StateProviderError) -> DutyError {
        DutyError::StateProvider(e)
    }
}

impl From<ApiError> for DutyError {
    fn from(e: ApiError) -> DutyError {
        DutyError::Api(e)
    }
}

impl From<BeaconStateError> for DutyError {
    fn from(e: BeaconStateError) -> DutyError {
        DutyError::Duties(e.into())
    }
}

impl From<validator_duties::Error> for DutyError {
    fn from(e: validator_duties::Error) -> DutyError {
        DutyError::Duties(e)
    }
}

impl From<DutyError> for ApiError {
    fn from(e: DutyError) -> ApiError {
        match e {
            DutyError::Api(e) => e,
            DutyError::StateProvider(e) => e.into(),
            DutyError::Duties(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::{Epoch, Slot};

    #[test]
    fn only_malformed_computations_are_structural() {
        let mismatch = DutyError::from(validator_duties::Error::ProposerCountMismatch {
            epoch: Epoch::new(1),
            expected: 8,
            found: 7,
        });
        assert!(mismatch.is_structural());

        let outside_registry = DutyError::from(validator_duties::Error::UnknownValidator(64));
        assert!(outside_registry.is_structural());

        let missing = DutyError::from(StateProviderError::StateNotFound(Slot::new(8)));
        assert!(!missing.is_structural());

        let empty = DutyError::from(validator_duties::Error::EmptyActiveSet {
            epoch: Epoch::new(1),
        });
        assert!(!empty.is_structural());
    }

    #[test]
    fn stream_terminal_errors() {
        assert!(ApiError::Canceled(CancelReason::Connection).is_terminal_for_stream());
        assert!(ApiError::Aborted("closed".to_string()).is_terminal_for_stream());
        assert!(!ApiError::not_found("state").is_terminal_for_stream());
    }
}
