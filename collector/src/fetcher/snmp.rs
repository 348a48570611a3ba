use super::{
    once_stream,
    MetricFetcher,
    SampleStream,
    UdpWalker,
};
use crate::{
    DecodeError,
    FetchError,
    MetricSample,
    SessionError,
    Value,
};
use std::{
    future::Future,
    pin::Pin,
    time::Duration,
};
use stickypipe_config::{
    parse_oid,
    Endpoint,
    Query,
    SnmpVersion,
};

/// Everything a walk needs to reach one agent.
#[derive(Debug, Clone)]
pub struct WalkTarget {
    pub device: String,
    /// `host:port`
    pub address: String,
    pub community: String,
    pub version: SnmpVersion,
    pub timeout: Duration,
}

impl WalkTarget {
    pub fn from_endpoint(endpoint: &Endpoint, timeout: Duration) -> Result<Self, SessionError> {
        let community = endpoint.credential.community().ok_or_else(|| SessionError::Credential {
            device: endpoint.name.clone(),
            expected: "community",
        })?;
        Ok(Self {
            device: endpoint.name.clone(),
            address: endpoint.socket_address(),
            community: community.to_string(),
            version: endpoint.snmp_version,
            timeout,
        })
    }
}

/// Wire value of one varbind, detached from the PDU buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    OctetString(Vec<u8>),
    Integer(i64),
    Counter32(u32),
    Gauge32(u32),
    Counter64(u64),
    /// Any other type, described for logging.
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: Vec<u32>,
    pub value: WireValue,
}

impl Varbind {
    pub fn new(oid: &[u32], value: WireValue) -> Self {
        Self {
            oid: oid.to_vec(),
            value,
        }
    }
}

/// Subtree walk over some SNMP transport.
pub trait WalkTransport: Send + Sync {
    /// Every varbind strictly below `root`, in agent order.
    fn walk<'a>(
        &'a self,
        target: &'a WalkTarget,
        root: &'a [u32],
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Varbind>, FetchError>> + Send + 'a>>;
}

impl WireValue {
    pub fn decode(self) -> Result<Value, DecodeError> {
        match self {
            // Invalid sequences become U+FFFD rather than failing the value.
            WireValue::OctetString(bytes) => Ok(Value::Text(match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            })),
            WireValue::Integer(n) => Ok(Value::Text(n.to_string())),
            WireValue::Counter32(n) | WireValue::Gauge32(n) => Ok(Value::Text(n.to_string())),
            WireValue::Counter64(n) => Ok(Value::Text(n.to_string())),
            WireValue::Other(wire_type) => Err(DecodeError { wire_type }),
        }
    }
}

/// Key the varbind by its last OID arc (the ifIndex for interface tables).
pub fn decode_varbind(device: &str, label: &str, varbind: Varbind) -> Option<MetricSample> {
    let Some(sub_key) = varbind.oid.last().map(u32::to_string) else {
        debug!(device, label, "skipping varbind without OID");
        return None;
    };
    let value = varbind.value.decode().unwrap_or_else(|err| {
        debug!(device, label, sub_key, %err, "storing undecoded marker");
        Value::Undecoded
    });
    Some(MetricSample::new(sub_key, label, value))
}

#[derive(Debug, Clone)]
pub struct SnmpFetcher<T = UdpWalker> {
    transport: T,
    timeout: Duration,
}

impl SnmpFetcher {
    pub fn udp(timeout: Duration) -> Self {
        Self::new(UdpWalker::default(), timeout)
    }
}

impl<T: WalkTransport> SnmpFetcher<T> {
    /// `timeout` bounds every single request of a walk.
    pub fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }
}

impl<T: WalkTransport> MetricFetcher for SnmpFetcher<T> {
    fn fetch<'a>(&'a self, endpoint: &'a Endpoint, query: &'a Query) -> SampleStream<'a> {
        once_stream(async move {
            let root = parse_oid(&query.identifier)
                .ok_or_else(|| FetchError::Malformed(format!("{} is not a numeric OID", query.identifier)))?;
            let target = WalkTarget::from_endpoint(endpoint, self.timeout)?;
            let varbinds = self.transport.walk(&target, &root).await?;
            trace!(device = %endpoint.name, query = %query.identifier, varbinds = varbinds.len(), "walk done");

            Ok(varbinds
                .into_iter()
                .filter_map(|varbind| decode_varbind(&endpoint.name, &query.label, varbind))
                .collect())
        })
    }
}
