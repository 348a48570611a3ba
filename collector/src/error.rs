use nxapi_client::NxApiError;
use std::time::Duration;

/// The device could not be talked to at all.
#[derive(thiserror::Error, Debug, Clone)]
pub enum SessionError {
    #[error("device {device} is unreachable: {reason}")]
    Unreachable { device: String, reason: String },
    #[error("device {device} rejected the credentials")]
    Rejected { device: String },
    #[error("endpoint {device} is missing a {expected} credential")]
    Credential { device: String, expected: &'static str },
}

/// One query failed; other queries and devices are unaffected.
#[derive(thiserror::Error, Debug, Clone)]
pub enum FetchError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no answer within {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

impl FetchError {
    pub fn is_session(&self) -> bool {
        matches!(self, FetchError::Session(_))
    }

    pub(crate) fn from_nxapi(device: &str, err: NxApiError) -> Self {
        match err {
            NxApiError::Unauthorized { .. } => SessionError::Rejected {
                device: device.to_string(),
            }
            .into(),
            NxApiError::Unreachable { .. } | NxApiError::Address(_) => SessionError::Unreachable {
                device: device.to_string(),
                reason: err.to_string(),
            }
            .into(),
            NxApiError::Transport { .. } | NxApiError::Status { .. } => FetchError::Transport(err.to_string()),
            NxApiError::Malformed(_) | NxApiError::MissingOutput(_) => FetchError::Malformed(err.to_string()),
            NxApiError::Command { .. } => FetchError::CommandFailed(err.to_string()),
        }
    }
}

/// A value of an unrecognized wire type. Never fails a fetch, see [`crate::Value::Undecoded`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("cannot decode {wire_type} value")]
pub struct DecodeError {
    pub wire_type: String,
}

/// The whole device produced nothing this cycle.
#[derive(thiserror::Error, Debug)]
pub enum DeviceError {
    #[error("device {device} unreachable: {source}")]
    Unreachable {
        device: String,
        #[source]
        source: SessionError,
    },
}
