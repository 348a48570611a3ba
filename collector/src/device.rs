use crate::{
    fetcher::MetricFetcher,
    CycleResult,
    DeviceError,
    DeviceRecordSet,
    FetchError,
    RecordAggregator,
    ResultFinisher,
};
use chrono::{
    DateTime,
    Utc,
};
use futures::{
    future::join_all,
    TryStreamExt as _,
};
use std::{
    sync::Arc,
    time::Duration,
};
use stickypipe_config::{
    Endpoint,
    Query,
};

/// What one query contributed to a device's records.
#[derive(Debug, Default)]
struct QueryOutcome {
    samples: usize,
    error: Option<FetchError>,
}

/// One device, one cycle: every query runs concurrently into a fresh aggregator.
#[derive(Clone)]
pub struct DeviceCollector {
    fetcher: Arc<dyn MetricFetcher>,
    queries: Arc<[Query]>,
    finisher: ResultFinisher,
    fetch_timeout: Duration,
}

impl std::fmt::Debug for DeviceCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceCollector")
            .field("queries", &self.queries.len())
            .field("finisher", &self.finisher)
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl DeviceCollector {
    pub fn new(
        fetcher: Arc<dyn MetricFetcher>,
        queries: impl Into<Arc<[Query]>>,
        finisher: ResultFinisher,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            queries: queries.into(),
            finisher,
            fetch_timeout,
        }
    }

    /// Collect and finish. `Ok(None)` means the device answered but no record was complete.
    #[instrument(skip_all, fields(device = %endpoint.name))]
    pub async fn collect(&self, endpoint: &Endpoint, at: DateTime<Utc>) -> Result<Option<CycleResult>, DeviceError> {
        let records = self.collect_records(endpoint).await?;
        Ok(self.finisher.finish(endpoint, records, at))
    }

    /// Run every query and wait for all of them, finished or abandoned.
    pub async fn collect_records(&self, endpoint: &Endpoint) -> Result<DeviceRecordSet, DeviceError> {
        let aggregator = RecordAggregator::new();

        let outcomes = join_all(
            self.queries
                .iter()
                .map(|query| self.run_query(endpoint, query, &aggregator)),
        )
        .await;

        let samples = outcomes.iter().map(|o| o.samples).sum::<usize>();
        let mut session_failure = None;
        let mut all_session_failures = !outcomes.is_empty();
        for outcome in outcomes {
            match outcome.error {
                Some(FetchError::Session(err)) => {
                    session_failure.get_or_insert(err);
                }
                _ => all_session_failures = false,
            }
        }

        if samples == 0 && all_session_failures {
            if let Some(source) = session_failure {
                return Err(DeviceError::Unreachable {
                    device: endpoint.name.clone(),
                    source,
                });
            }
        }

        debug!(samples, sub_keys = aggregator.len(), "device barrier reached");
        Ok(aggregator.into_record_set())
    }

    #[instrument(level = "debug", skip_all, fields(query = %query.identifier, label = %query.label))]
    async fn run_query(&self, endpoint: &Endpoint, query: &Query, aggregator: &RecordAggregator) -> QueryOutcome {
        let mut samples = 0;
        let drain = async {
            let mut stream = self.fetcher.fetch(endpoint, query);
            while let Some(sample) = stream.try_next().await? {
                aggregator.merge_sample(sample);
                samples += 1;
            }
            Ok::<_, FetchError>(())
        };

        let error = match tokio::time::timeout(self.fetch_timeout, drain).await {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err),
            Err(_) => Some(FetchError::Timeout(self.fetch_timeout)),
        };
        if let Some(err) = &error {
            // Whatever was merged before the failure stays in the record set.
            warn!(device = %endpoint.name, samples, %err, "query failed");
        }
        QueryOutcome { samples, error }
    }
}
