use crate::{
    fetcher::{
        NxApiFetcher,
        SnmpFetcher,
    },
    DeviceCollector,
    ResultFinisher,
    Sink,
};
use chrono::{
    DateTime,
    Utc,
};
use futures::future::join_all;
use std::{
    collections::HashMap,
    sync::Arc,
    time::Duration,
};
use stickypipe_config::{
    Config,
    Endpoint,
    TransportKind,
};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// How a device fared in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceOutcome {
    Delivered,
    /// Answered, but nothing was complete enough to emit.
    Discarded,
    Failed,
}

/// Tally of one fleet cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub delivered: usize,
    pub discarded: usize,
    pub failed: usize,
}

/// Polls the whole fleet, cycle after cycle, until cancelled.
pub struct FleetScheduler {
    endpoints: Vec<Endpoint>,
    collectors: HashMap<TransportKind, DeviceCollector>,
    sink: Arc<dyn Sink>,
    interval: Duration,
    once: bool,
}

impl FleetScheduler {
    pub fn new(endpoints: Vec<Endpoint>, sink: Arc<dyn Sink>, interval: Duration) -> Self {
        Self {
            endpoints,
            collectors: HashMap::new(),
            sink,
            interval,
            once: false,
        }
    }

    /// One collector per transport kind, wired from the loaded configuration.
    pub fn from_config(config: &Config, sink: Arc<dyn Sink>) -> Self {
        let finisher = |transport| {
            ResultFinisher::new(
                config.completeness.identity_label.clone(),
                config.completeness.mandatory(transport).iter().cloned(),
            )
        };
        let snmp = DeviceCollector::new(
            Arc::new(SnmpFetcher::udp(config.snmp_request_timeout)),
            config.queries.for_transport(TransportKind::Snmp).to_vec(),
            finisher(TransportKind::Snmp),
            config.fetch_timeout,
        );
        let nxapi = DeviceCollector::new(
            Arc::new(NxApiFetcher::default()),
            config.queries.for_transport(TransportKind::NxApi).to_vec(),
            finisher(TransportKind::NxApi),
            config.fetch_timeout,
        );

        Self::new(config.endpoints.clone(), sink, config.interval)
            .with_collector(TransportKind::Snmp, snmp)
            .with_collector(TransportKind::NxApi, nxapi)
            .once(config.once)
    }

    pub fn with_collector(mut self, transport: TransportKind, collector: DeviceCollector) -> Self {
        self.collectors.insert(transport, collector);
        self
    }

    /// Stop after the first cycle.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Run cycles until `cancel` fires. A cycle that has started always runs to its barrier.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            endpoints = self.endpoints.len(),
            interval = ?self.interval,
            "Starting fleet scheduler"
        );

        let mut cycle = 0_u64;
        while !cancel.is_cancelled() {
            cycle += 1;
            let report = self.run_cycle(cycle).await;
            info!(
                cycle,
                delivered = report.delivered,
                discarded = report.discarded,
                failed = report.failed,
                "Cycle finished"
            );

            if self.once {
                break;
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }
        info!(cycles = cycle, "Fleet scheduler stopped");
    }

    /// Collect every endpoint concurrently and wait for all of them.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self, cycle: u64) -> CycleReport {
        let at = Utc::now();
        let outcomes = join_all(self.endpoints.iter().map(|endpoint| self.poll_device(endpoint, at))).await;

        outcomes.into_iter().fold(CycleReport::default(), |mut report, outcome| {
            match outcome {
                DeviceOutcome::Delivered => report.delivered += 1,
                DeviceOutcome::Discarded => report.discarded += 1,
                DeviceOutcome::Failed => report.failed += 1,
            }
            report
        })
    }

    async fn poll_device(&self, endpoint: &Endpoint, at: DateTime<Utc>) -> DeviceOutcome {
        let Some(collector) = self.collectors.get(&endpoint.transport) else {
            error!(device = %endpoint.name, transport = %endpoint.transport, "no collector for transport");
            return DeviceOutcome::Failed;
        };

        let result = match collector.collect(endpoint, at).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                debug!(device = %endpoint.name, "no complete records this cycle");
                return DeviceOutcome::Discarded;
            }
            Err(err) => {
                warn!(device = %endpoint.name, "{err}");
                return DeviceOutcome::Failed;
            }
        };

        match self.sink.deliver(&result).await {
            Ok(()) => DeviceOutcome::Delivered,
            Err(err) => {
                error!(device = %endpoint.name, "Failed to deliver results: {err:?}");
                DeviceOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        fetcher::{
            oid,
            MetricFetcher,
            SampleStream,
            ScriptedWalker,
            Varbind,
            WalkTarget,
            WalkTransport,
            WireValue,
        },
        sink::tests::CollectingSink,
        FetchError,
        SessionError,
    };
    use futures::{
        stream,
        StreamExt as _,
    };
    use pretty_assertions::assert_eq;
    use std::{
        future::Future,
        pin::Pin,
    };
    use stickypipe_config::Query;

    const IF_DESCR: &str = ".1.3.6.1.2.1.2.2.1.2";
    const IF_IN: &str = ".1.3.6.1.2.1.2.2.1.10";

    /// Answers for a fixed set of devices; everything else is unreachable.
    #[derive(Default)]
    struct Fleet {
        devices: HashMap<String, ScriptedWalker>,
    }

    impl Fleet {
        fn with_device(mut self, name: &str) -> Self {
            let walker = ScriptedWalker::default()
                .with(
                    IF_DESCR,
                    vec![Varbind::new(
                        &oid(".1.3.6.1.2.1.2.2.1.2.10001"),
                        WireValue::OctetString(b"Gi0/1".to_vec()),
                    )],
                )
                .with(
                    IF_IN,
                    vec![Varbind::new(&oid(".1.3.6.1.2.1.2.2.1.10.10001"), WireValue::Counter32(42))],
                );
            self.devices.insert(name.to_string(), walker);
            self
        }
    }

    impl WalkTransport for Fleet {
        fn walk<'a>(
            &'a self,
            target: &'a WalkTarget,
            root: &'a [u32],
        ) -> Pin<Box<dyn Future<Output = Result<Vec<Varbind>, FetchError>> + Send + 'a>> {
            match self.devices.get(&target.device) {
                Some(walker) => walker.walk(target, root),
                None => Box::pin(async move {
                    Err(SessionError::Unreachable {
                        device: target.device.clone(),
                        reason: "no response".to_string(),
                    }
                    .into())
                }),
            }
        }
    }

    /// Waits before every fetch.
    struct Slow<F> {
        inner: F,
        delay: Duration,
    }

    impl<F: MetricFetcher> MetricFetcher for Slow<F> {
        fn fetch<'a>(&'a self, endpoint: &'a Endpoint, query: &'a Query) -> SampleStream<'a> {
            stream::once(sleep(self.delay))
                .flat_map(move |()| self.inner.fetch(endpoint, query))
                .boxed()
        }
    }

    fn snmp_collector(fetcher: impl MetricFetcher + 'static) -> DeviceCollector {
        DeviceCollector::new(
            Arc::new(fetcher),
            vec![Query::new(IF_DESCR, "name"), Query::new(IF_IN, "ifInOctets")],
            ResultFinisher::new("sysName", ["name", "ifInOctets"]),
            Duration::from_secs(5),
        )
    }

    fn endpoints(names: &[&str]) -> Vec<Endpoint> {
        names.iter().map(|name| Endpoint::snmp(*name, "public")).collect()
    }

    #[tokio::test]
    async fn unreachable_device_does_not_block_the_fleet() {
        let fleet = Fleet::default().with_device("sw1").with_device("sw3");
        let sink = Arc::new(CollectingSink::default());
        let scheduler = FleetScheduler::new(endpoints(&["sw1", "sw2", "sw3"]), sink.clone(), Duration::from_secs(60))
            .with_collector(TransportKind::Snmp, snmp_collector(SnmpFetcher::new(fleet, Duration::from_secs(5))));

        let report = scheduler.run_cycle(1).await;
        assert_eq!(
            report,
            CycleReport {
                delivered: 2,
                discarded: 0,
                failed: 1,
            }
        );
        assert_eq!(sink.devices(), ["sw1", "sw3"]);

        let results = sink.results.lock().unwrap();
        let interface = &results[0].interfaces[0];
        assert_eq!(interface.field("name"), Some("Gi0/1"));
        assert_eq!(interface.field("ifInOctets"), Some("42"));
    }

    #[tokio::test]
    async fn missing_collector_fails_only_that_device() {
        let sink = Arc::new(CollectingSink::default());
        let mut fleet = endpoints(&["sw1"]);
        fleet.push(Endpoint::nxapi("n9k", stickypipe_config::Credential::parse_basic("a:b").unwrap()));
        let scheduler = FleetScheduler::new(fleet, sink.clone(), Duration::from_secs(60)).with_collector(
            TransportKind::Snmp,
            snmp_collector(SnmpFetcher::new(Fleet::default().with_device("sw1"), Duration::from_secs(5))),
        );

        let report = scheduler.run_cycle(1).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_lets_the_running_cycle_finish() {
        let fetcher = Slow {
            inner: SnmpFetcher::new(Fleet::default().with_device("sw1"), Duration::from_secs(5)),
            delay: Duration::from_secs(2),
        };
        let sink = Arc::new(CollectingSink::default());
        let scheduler = FleetScheduler::new(endpoints(&["sw1"]), sink.clone(), Duration::from_secs(60))
            .with_collector(TransportKind::Snmp, snmp_collector(fetcher));

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(scheduler.run(cancel.clone()));

        // Cycle 1 runs 0s..2s, cycle 2 starts at 62s; cancel while it is in flight.
        sleep(Duration::from_secs(63)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(sink.results.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn once_runs_a_single_cycle() {
        let sink = Arc::new(CollectingSink::default());
        let scheduler = FleetScheduler::new(endpoints(&["sw1"]), sink.clone(), Duration::from_secs(60))
            .with_collector(
                TransportKind::Snmp,
                snmp_collector(SnmpFetcher::new(Fleet::default().with_device("sw1"), Duration::from_secs(5))),
            )
            .once(true);

        scheduler.run(CancellationToken::new()).await;
        assert_eq!(sink.devices(), ["sw1"]);
    }

    #[tokio::test]
    async fn cancelled_before_start_runs_nothing() {
        let sink = Arc::new(CollectingSink::default());
        let scheduler = FleetScheduler::new(endpoints(&["sw1"]), sink.clone(), Duration::from_secs(60));
        let cancel = CancellationToken::new();
        cancel.cancel();

        scheduler.run(cancel).await;
        assert!(sink.results.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn silent_snmp_device_fails_within_the_fetch_timeout() {
        // Bound but never read, so every request goes unanswered.
        let silent = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let address = silent.local_addr().unwrap();

        let mut config = Config::default();
        config.endpoints = vec![Endpoint::snmp(address.to_string(), "public").with_name("sw-silent")];
        config.fetch_timeout = Duration::from_secs(2);
        config.snmp_request_timeout = Duration::from_millis(200);
        config.validate().unwrap();

        let sink = Arc::new(CollectingSink::default());
        let report = FleetScheduler::from_config(&config, sink.clone()).run_cycle(1).await;
        assert_eq!(
            report,
            CycleReport {
                delivered: 0,
                discarded: 0,
                failed: 1,
            }
        );
        assert!(sink.results.lock().unwrap().is_empty());
        drop(silent);
    }
}
