#[derive(thiserror::Error, Debug)]
pub enum NxApiError {
    #[error("invalid device address {0:?}")]
    Address(String),
    #[error("device {address} is unreachable: {source}")]
    Unreachable {
        address: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("device {address} rejected the credentials")]
    Unauthorized { address: String },
    #[error("request to {address} failed: {source}")]
    Transport {
        address: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("device {address} answered with HTTP {status}")]
    Status { address: String, status: u16 },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response carries no output for command {0:?}")]
    MissingOutput(String),
    #[error("command {input:?} failed with code {code}: {msg}")]
    Command { input: String, code: String, msg: String },
}

impl NxApiError {
    /// Errors raised before any command could run on the device.
    pub fn is_session(&self) -> bool {
        matches!(
            self,
            NxApiError::Address(_) | NxApiError::Unreachable { .. } | NxApiError::Unauthorized { .. }
        )
    }
}
