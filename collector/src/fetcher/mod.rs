//! # Fetchers
//!
//! A fetcher runs one [`Query`] against one [`Endpoint`] and yields the decoded samples.
//!
//! - **`SnmpFetcher`**: walks the subtree under the query's OID, keying samples by the last OID arc
//! - **`NxApiFetcher`**: runs the query's command over NX-API and reads one column of the row table
//!
//! Both yield nothing (rather than failing) when the device has no matching rows.

use crate::{
    FetchError,
    MetricSample,
};
use futures::{
    stream::{
        self,
        BoxStream,
    },
    Future,
    StreamExt as _,
    TryStreamExt as _,
};
use stickypipe_config::{
    Endpoint,
    Query,
};

mod nxapi;
mod snmp;
mod udp;

pub use self::{
    nxapi::NxApiFetcher,
    snmp::{
        decode_varbind,
        SnmpFetcher,
        Varbind,
        WalkTarget,
        WalkTransport,
        WireValue,
    },
    udp::UdpWalker,
};
#[cfg(test)]
pub(crate) use self::snmp::tests::{
    oid,
    ScriptedWalker,
};

pub type SampleStream<'a> = BoxStream<'a, Result<MetricSample, FetchError>>;

pub trait MetricFetcher: Send + Sync {
    /// Lazily run `query` against `endpoint`. Nothing is sent before the stream is first polled.
    fn fetch<'a>(&'a self, endpoint: &'a Endpoint, query: &'a Query) -> SampleStream<'a>;
}

/// Turn one request/response round trip into a sample stream.
pub(crate) fn once_stream<'a, F>(round_trip: F) -> SampleStream<'a>
where
    F: Future<Output = Result<Vec<MetricSample>, FetchError>> + Send + 'a,
{
    stream::once(round_trip)
        .map_ok(|samples| stream::iter(samples.into_iter().map(Ok::<_, FetchError>)))
        .try_flatten()
        .boxed()
}
