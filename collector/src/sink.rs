use crate::CycleResult;
use eyre::{
    Context as _,
    Result,
};
use std::{
    future::Future,
    io::Write as _,
    pin::Pin,
    time::Duration,
};
use stickypipe_config::SinkConfig;
use url::Url;

const CONSUMER_ID_HEADER: &str = "x-consumer-id";
const CONSUMER_SECRET_HEADER: &str = "x-consumer-secret";

/// Receives finished results, one device at a time.
pub trait Sink: Send + Sync {
    fn deliver<'a>(&'a self, result: &'a CycleResult) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Pick the sink the configuration asks for.
pub fn from_config(config: &SinkConfig) -> Box<dyn Sink> {
    match &config.url {
        Some(url) => Box::new(HttpSink::new(
            url.clone(),
            config.consumer_id.clone(),
            config.consumer_secret.clone(),
            config.timeout,
        )),
        None => Box::new(StdoutSink),
    }
}

/// One JSON line per interface on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn deliver<'a>(&'a self, result: &'a CycleResult) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut out = std::io::stdout().lock();
            for message in result.messages() {
                serde_json::to_writer(&mut out, &message)?;
                writeln!(out)?;
            }
            out.flush()?;
            Ok(())
        })
    }
}

/// POSTs the messages of a result as one JSON array.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: Url,
    consumer_id: Option<String>,
    consumer_secret: Option<String>,
    /// Covers connecting, sending and reading the response.
    timeout: Duration,
}

impl HttpSink {
    pub fn new(url: Url, consumer_id: Option<String>, consumer_secret: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            consumer_id,
            consumer_secret,
            timeout,
        }
    }
}

impl Sink for HttpSink {
    fn deliver<'a>(&'a self, result: &'a CycleResult) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut request = self
                .client
                .post(self.url.clone())
                .timeout(self.timeout)
                .json(&result.messages());
            if let Some(id) = &self.consumer_id {
                request = request.header(CONSUMER_ID_HEADER, id);
            }
            if let Some(secret) = &self.consumer_secret {
                request = request.header(CONSUMER_SECRET_HEADER, secret);
            }

            request
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .wrap_err_with(|| format!("Failed to deliver {} to {}", result.device_name, self.url))?;
            trace!(device = %result.endpoint, interfaces = result.interfaces.len(), "delivered");
            Ok(())
        })
    }
}
