//! Broker error taxonomy and the numeric result codes returned to callers.

use serde::{Deserialize, Serialize};

use crate::types::{NetType, RequestId, SupplierId, Uid};

/// Every failure a broker operation can report.
///
/// Operations validate before mutating, so an `Err` always means no state
/// was changed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("unknown supplier {0}")]
    UnknownSupplier(SupplierId),

    #[error("unknown request {0}")]
    UnknownRequest(RequestId),

    #[error("supplier {net_type}/{identity} already registered as {existing}")]
    DuplicateSupplier {
        net_type: NetType,
        identity: String,
        existing: SupplierId,
    },

    #[error("invalid specifier: {0}")]
    InvalidSpecifier(String),

    #[error("uid {0} is not permitted to perform this operation")]
    PermissionDenied(Uid),

    #[error("listener unreachable")]
    TransportFailure,

    #[error("broker not initialized")]
    Uninitialized,
}

impl BrokerError {
    pub fn code(&self) -> ResultCode {
        match self {
            Self::UnknownSupplier(_) => ResultCode::UnknownSupplier,
            Self::UnknownRequest(_) => ResultCode::UnknownRequest,
            Self::DuplicateSupplier { .. } => ResultCode::DuplicateSupplier,
            Self::InvalidSpecifier(_) => ResultCode::InvalidSpecifier,
            Self::PermissionDenied(_) => ResultCode::PermissionDenied,
            Self::TransportFailure => ResultCode::TransportFailure,
            Self::Uninitialized => ResultCode::Uninitialized,
        }
    }
}

/// Fixed result-code taxonomy of the call surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum ResultCode {
    Ok = 0,
    UnknownSupplier = 1,
    UnknownRequest = 2,
    DuplicateSupplier = 3,
    InvalidSpecifier = 4,
    PermissionDenied = 5,
    TransportFailure = 6,
    Uninitialized = 7,
    /// The call did not carry the expected interface token.
    InvalidInterface = 8,
}

impl From<ResultCode> for u8 {
    fn from(code: ResultCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for ResultCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::UnknownSupplier),
            2 => Ok(Self::UnknownRequest),
            3 => Ok(Self::DuplicateSupplier),
            4 => Ok(Self::InvalidSpecifier),
            5 => Ok(Self::PermissionDenied),
            6 => Ok(Self::TransportFailure),
            7 => Ok(Self::Uninitialized),
            8 => Ok(Self::InvalidInterface),
            other => Err(format!("unknown result code {other}")),
        }
    }
}

pub type BrokerResult<T> = Result<T, BrokerError>;
