//! Collection core of the stickypipe agent.
//!
//! A [`FleetScheduler`] runs one [`DeviceCollector`] per endpoint and cycle. Each collector fans
//! its queries out to a [`fetcher::MetricFetcher`], merges the samples into a per-cycle
//! [`RecordAggregator`] and, once every query has finished or timed out, hands the frozen
//! [`DeviceRecordSet`] to the [`ResultFinisher`]. Complete results go to a [`Sink`].

#[macro_use]
extern crate tracing;

mod aggregator;
mod device;
mod error;
pub mod fetcher;
mod finisher;
mod sample;
mod scheduler;
pub mod sink;

pub use aggregator::{
    DeviceRecordSet,
    Record,
    RecordAggregator,
};
pub use device::DeviceCollector;
pub use error::{
    DecodeError,
    DeviceError,
    FetchError,
    SessionError,
};
pub use finisher::{
    labels,
    CycleResult,
    InterfaceMessage,
    InterfaceRecord,
    ResultFinisher,
};
pub use sample::{
    MetricSample,
    Value,
    UNDECODED,
};
pub use scheduler::{
    CycleReport,
    FleetScheduler,
};
pub use sink::{
    HttpSink,
    Sink,
    StdoutSink,
};
