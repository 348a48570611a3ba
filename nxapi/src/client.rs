use crate::{
    envelope::{
        InsApiRequest,
        InsApiResponse,
        Output,
    },
    NxApiError,
};
use reqwest::{
    header::CONTENT_TYPE,
    StatusCode,
};
use url::Url;

/// Where and as whom to send a request.
#[derive(Debug, Clone, Copy)]
pub struct Target<'a> {
    pub address: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Default)]
pub struct NxApiClient {
    http: reqwest::Client,
}

impl NxApiClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// `http://<address>/ins`, unless the address already names a scheme.
    pub fn endpoint_url(address: &str) -> Result<Url, NxApiError> {
        let base = if address.starts_with("http://") || address.starts_with("https://") {
            address.trim_end_matches('/').to_string()
        } else {
            format!("http://{address}")
        };
        Url::parse(&format!("{base}/ins")).map_err(|_| NxApiError::Address(address.to_string()))
    }

    /// Run `commands` in one request and return every output the device sent back.
    #[instrument(level = "debug", skip(self, target), fields(address = target.address))]
    pub async fn show(&self, target: &Target<'_>, commands: &[&str]) -> Result<Vec<Output>, NxApiError> {
        let url = Self::endpoint_url(target.address)?;
        let request = InsApiRequest::cli_show(commands);
        let address = target.address.to_string();

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .basic_auth(target.username, Some(target.password))
            .json(&request)
            .send()
            .await
            .map_err(|source| {
                if source.is_connect() {
                    NxApiError::Unreachable {
                        address: address.clone(),
                        source,
                    }
                } else {
                    NxApiError::Transport {
                        address: address.clone(),
                        source,
                    }
                }
            })?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(NxApiError::Unauthorized { address }),
            status if !status.is_success() => {
                return Err(NxApiError::Status {
                    address,
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|source| NxApiError::Transport { address, source })?;
        let envelope: InsApiResponse =
            serde_json::from_str(&body).map_err(|err| NxApiError::Malformed(err.to_string()))?;
        let outputs = envelope.into_outputs();
        debug!(input = request.input(), outputs = outputs.len(), "nxapi response");
        Ok(outputs)
    }

    /// Run a single command and return its successful output.
    pub async fn show_one(&self, target: &Target<'_>, command: &str) -> Result<Output, NxApiError> {
        let output = self
            .show(target, &[command])
            .await?
            .into_iter()
            .find(|output| output.answers(command))
            .ok_or_else(|| NxApiError::MissingOutput(command.to_string()))?;

        if !output.is_success() {
            return Err(NxApiError::Command {
                input: output.input,
                code: output.code,
                msg: output.msg,
            });
        }
        Ok(output)
    }
}
