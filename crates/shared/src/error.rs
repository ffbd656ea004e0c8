use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::DeliveryOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ConfigInvalid,
    LinkUnavailable,
    DeliveryRejected,
    TransportFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error("network link unavailable")]
    LinkUnavailable,
    #[error("remote endpoint rejected detection with status {0}")]
    DeliveryRejected(u16),
    #[error("transport failed: {0}")]
    TransportFailed(String),
}

impl ControllerError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigInvalid(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            ControllerError::ConfigInvalid(_) => ErrorCode::ConfigInvalid,
            ControllerError::LinkUnavailable => ErrorCode::LinkUnavailable,
            ControllerError::DeliveryRejected(_) => ErrorCode::DeliveryRejected,
            ControllerError::TransportFailed(_) => ErrorCode::TransportFailed,
        }
    }
}

impl DeliveryOutcome {
    pub fn into_result(self) -> Result<(), ControllerError> {
        match self {
            DeliveryOutcome::Delivered => Ok(()),
            DeliveryOutcome::Rejected(code) => Err(ControllerError::DeliveryRejected(code)),
            DeliveryOutcome::TransportFailed(reason) => {
                Err(ControllerError::TransportFailed(reason))
            }
        }
    }
}
