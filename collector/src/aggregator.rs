use crate::{
    MetricSample,
    Value,
};
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Fields of one sub-entity, by label.
pub type Record = BTreeMap<String, Value>;

/// Concurrent store for one device and one cycle.
///
/// Records live in a sharded map: creating a sub-key and updating one of its fields happen under
/// the lock of that sub-key's shard only, so fetchers writing to different interfaces rarely meet.
#[derive(Debug, Default)]
pub struct RecordAggregator {
    records: DashMap<String, Record>,
}

impl RecordAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update `label` for `sub_key`, creating the record on first use.
    pub fn merge(&self, sub_key: impl Into<String>, label: impl Into<String>, value: Value) {
        self.records
            .entry(sub_key.into())
            .or_default()
            .insert(label.into(), value);
    }

    pub fn merge_sample(&self, sample: MetricSample) {
        self.merge(sample.sub_key, sample.label, sample.value);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Freeze the store. Taking `self` by value means no writer can still hold it.
    pub fn into_record_set(self) -> DeviceRecordSet {
        DeviceRecordSet {
            records: self.records.into_iter().collect(),
        }
    }
}

/// The read-only outcome of one device's cycle, ordered by sub-key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRecordSet {
    records: BTreeMap<String, Record>,
}

impl DeviceRecordSet {
    pub fn get(&self, sub_key: &str) -> Option<&Record> {
        self.records.get(sub_key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Record)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First present value of `label`, looking at every record.
    pub fn find_label(&self, label: &str) -> Option<&Value> {
        self.records
            .values()
            .filter_map(|record| record.get(label))
            .find(|value| value.is_present())
    }
}

impl FromIterator<(String, Record)> for DeviceRecordSet {
    fn from_iter<T: IntoIterator<Item = (String, Record)>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for DeviceRecordSet {
    type Item = (String, Record);
    type IntoIter = std::collections::btree_map::IntoIter<String, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn text(value: &str) -> Value {
        Value::text(value)
    }

    #[test]
    fn fields_from_different_queries_merge() {
        let aggregator = RecordAggregator::new();
        aggregator.merge("10001", "A", text("1"));
        aggregator.merge("10001", "B", text("2"));
        aggregator.merge("10001", "C", text("3"));
        aggregator.merge("10002", "A", text("4"));

        let records = aggregator.into_record_set();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records.get("10001"),
            Some(&Record::from([
                ("A".to_string(), text("1")),
                ("B".to_string(), text("2")),
                ("C".to_string(), text("3")),
            ]))
        );
        assert_eq!(records.get("10002").map(Record::len), Some(1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_merges_lose_nothing() {
        const WRITERS: usize = 8;
        const SUB_KEYS: usize = 200;

        let aggregator = Arc::new(RecordAggregator::new());
        let mut handles = Vec::new();
        for writer in 0..WRITERS {
            let aggregator = aggregator.clone();
            handles.push(tokio::spawn(async move {
                // Each writer owns one label and walks the sub-keys in its own order, so every
                // sub-key is created by whichever writer gets there first.
                for i in 0..SUB_KEYS {
                    let sub_key = (i * (writer + 1)) % SUB_KEYS;
                    aggregator.merge(sub_key.to_string(), format!("label-{writer}"), Value::text(format!("{sub_key}")));
                    if i % 16 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let records = Arc::try_unwrap(aggregator).unwrap().into_record_set();

        let mut expected = BTreeMap::<String, Record>::new();
        for writer in 0..WRITERS {
            for i in 0..SUB_KEYS {
                let sub_key = (i * (writer + 1)) % SUB_KEYS;
                expected
                    .entry(sub_key.to_string())
                    .or_default()
                    .insert(format!("label-{writer}"), Value::text(format!("{sub_key}")));
            }
        }
        assert_eq!(records, expected.into_iter().collect::<DeviceRecordSet>());
    }

    #[test]
    fn identity_lookup_skips_blank_values() {
        let aggregator = RecordAggregator::new();
        aggregator.merge("0", "sysName", Value::Undecoded);
        aggregator.merge("1", "sysName", text("c2960g"));
        let records = aggregator.into_record_set();
        assert_eq!(records.find_label("sysName"), Some(&text("c2960g")));
        assert_eq!(records.find_label("missing"), None);
    }
}
