use super::{
    once_stream,
    MetricFetcher,
    SampleStream,
};
use crate::{
    DecodeError,
    FetchError,
    MetricSample,
    SessionError,
    Value,
};
use dashmap::DashMap;
use futures::{
    future::{
        BoxFuture,
        Shared,
    },
    FutureExt as _,
};
use nxapi_client::{
    Field,
    NxApiClient,
    Rows,
    Target,
};
use std::{
    fmt,
    sync::Arc,
};
use stickypipe_config::{
    Endpoint,
    Query,
};

/// Device address and command.
type RequestKey = (String, String);
type SharedRows = Shared<BoxFuture<'static, Result<Arc<Rows>, FetchError>>>;

/// Runs NX-API `show` commands. Queries naming the same command on the same device while a
/// request is on the wire wait for that request instead of sending their own.
#[derive(Clone, Default)]
pub struct NxApiFetcher {
    client: NxApiClient,
    in_flight: Arc<DashMap<RequestKey, SharedRows>>,
}

impl fmt::Debug for NxApiFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NxApiFetcher")
            .field("client", &self.client)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl NxApiFetcher {
    pub fn new(client: NxApiClient) -> Self {
        Self {
            client,
            in_flight: Arc::default(),
        }
    }

    async fn rows(&self, endpoint: &Endpoint, username: &str, password: &str, command: &str) -> Result<Arc<Rows>, FetchError> {
        let key = (endpoint.address.clone(), command.to_string());
        let shared = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| {
                let client = self.client.clone();
                let device = endpoint.name.clone();
                let address = endpoint.address.clone();
                let username = username.to_string();
                let password = password.to_string();
                let command = command.to_string();
                async move {
                    let target = Target {
                        address: &address,
                        username: &username,
                        password: &password,
                    };
                    let output = client
                        .show_one(&target, &command)
                        .await
                        .map_err(|err| FetchError::from_nxapi(&device, err))?;
                    let rows = nxapi_client::rows(&output.body).map_err(|err| FetchError::from_nxapi(&device, err))?;
                    Ok(Arc::new(rows))
                }
                .boxed()
                .shared()
            })
            .value()
            .clone();

        let request = InFlight {
            requests: &self.in_flight,
            key,
            shared,
        };
        request.shared.clone().await
    }
}

/// Forgets a finished request so the next cycle asks the device again.
struct InFlight<'a> {
    requests: &'a DashMap<RequestKey, SharedRows>,
    key: RequestKey,
    shared: SharedRows,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.requests
            .remove_if(&self.key, |_, current| current.ptr_eq(&self.shared));
    }
}

fn decode_field(field: Field) -> Result<Value, DecodeError> {
    match field {
        Field::Text(text) => Ok(Value::Text(text)),
        Field::Number(number) => Ok(Value::Text(number.to_string())),
        Field::Flag(flag) => Ok(Value::Text(flag.to_string())),
        Field::Unsupported(wire_type) => Err(DecodeError {
            wire_type: wire_type.to_string(),
        }),
    }
}

impl MetricFetcher for NxApiFetcher {
    fn fetch<'a>(&'a self, endpoint: &'a Endpoint, query: &'a Query) -> SampleStream<'a> {
        once_stream(async move {
            let device = endpoint.name.as_str();
            let (username, password) = endpoint.credential.basic().ok_or_else(|| SessionError::Credential {
                device: device.to_string(),
                expected: "username:password",
            })?;
            let column = query
                .field
                .as_deref()
                .ok_or_else(|| FetchError::Malformed(format!("query {:?} names no field", query.identifier)))?;

            let rows = self.rows(endpoint, username, password, &query.identifier).await?;

            // Rows are already folded by interface, so each sub-key yields at most one sample.
            Ok(rows
                .iter()
                .filter_map(|(sub_key, row)| {
                    let field = row.get(column)?.clone();
                    let value = decode_field(field).unwrap_or_else(|err| {
                        debug!(device, label = %query.label, sub_key, %err, "storing undecoded marker");
                        Value::Undecoded
                    });
                    Some(MetricSample::new(sub_key.clone(), query.label.clone(), value))
                })
                .collect())
        })
    }
}
