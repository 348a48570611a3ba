use crate::{
    DeviceRecordSet,
    Record,
    Value,
};
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;
use std::collections::BTreeMap;
use stickypipe_config::Endpoint;

pub mod labels {
    pub const SYS_NAME: &str = "sysName";
    pub const NAME: &str = "name";
    pub const IN_OCTETS: &str = "ifInOctets";
    pub const HC_IN_OCTETS: &str = "ifHCInOctets";
    pub const OUT_OCTETS: &str = "ifOutOctets";
    pub const HC_OUT_OCTETS: &str = "ifHCOutOctets";
    pub const HIGH_SPEED: &str = "ifHighSpeed";

    /// Labels an interface record needs before it is emitted.
    pub const MANDATORY: [&str; 6] = [NAME, IN_OCTETS, HC_IN_OCTETS, OUT_OCTETS, HC_OUT_OCTETS, HIGH_SPEED];
}

/// One emitted interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRecord {
    pub sub_key: String,
    pub fields: Record,
}

impl InterfaceRecord {
    pub fn field(&self, label: &str) -> Option<&str> {
        self.fields.get(label).filter(|v| v.is_present()).map(Value::as_str)
    }
}

/// Validated output of one device for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleResult {
    /// Configured endpoint name.
    pub endpoint: String,
    /// Name the device reports for itself.
    pub device_name: String,
    pub timestamp: DateTime<Utc>,
    pub interfaces: Vec<InterfaceRecord>,
}

/// Flat per-interface message as consumed by the stickypipe collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct InterfaceMessage<'a> {
    pub name: &'a str,
    pub interface_id: &'a str,
    pub interface_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_in: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interface_out: Option<&'a str>,
    pub timestamp: i64,
    pub fields: &'a BTreeMap<String, Value>,
}

impl CycleResult {
    /// One message per interface, preferring the 64-bit counters.
    pub fn messages(&self) -> Vec<InterfaceMessage<'_>> {
        self.interfaces
            .iter()
            .map(|interface| InterfaceMessage {
                name: &self.device_name,
                interface_id: &interface.sub_key,
                interface_name: interface.field(labels::NAME).unwrap_or(&interface.sub_key),
                interface_in: interface
                    .field(labels::HC_IN_OCTETS)
                    .or_else(|| interface.field(labels::IN_OCTETS)),
                interface_out: interface
                    .field(labels::HC_OUT_OCTETS)
                    .or_else(|| interface.field(labels::OUT_OCTETS)),
                timestamp: self.timestamp.timestamp(),
                fields: &interface.fields,
            })
            .collect()
    }
}

/// Filters a finished record set down to the interfaces worth emitting.
#[derive(Debug, Clone)]
pub struct ResultFinisher {
    identity_label: String,
    mandatory: Vec<String>,
}

impl Default for ResultFinisher {
    fn default() -> Self {
        Self::new(labels::SYS_NAME, labels::MANDATORY)
    }
}

impl ResultFinisher {
    pub fn new<I, S>(identity_label: impl Into<String>, mandatory: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identity_label: identity_label.into(),
            mandatory: mandatory.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_complete(&self, record: &Record) -> bool {
        self.mandatory
            .iter()
            .all(|label| record.get(label).is_some_and(Value::is_present))
    }

    /// `None` when no interface of the device passed the completeness check.
    pub fn finish(
        &self,
        endpoint: &Endpoint,
        records: DeviceRecordSet,
        timestamp: DateTime<Utc>,
    ) -> Option<CycleResult> {
        let device_name = match records.find_label(&self.identity_label) {
            Some(value) => value.as_str().to_string(),
            None => {
                debug!(device = %endpoint.name, label = %self.identity_label, "no identity reported, using endpoint name");
                endpoint.name.clone()
            }
        };

        let total = records.len();
        let interfaces = records
            .into_iter()
            .filter(|(sub_key, record)| {
                // Admin-down and non-ethernet ports routinely lack counters.
                let complete = self.is_complete(record);
                if !complete {
                    trace!(device = %endpoint.name, sub_key, "dropping incomplete record");
                }
                complete
            })
            .map(|(sub_key, fields)| InterfaceRecord { sub_key, fields })
            .collect::<Vec<_>>();

        debug!(device = %endpoint.name, total, complete = interfaces.len(), "finished records");
        if interfaces.is_empty() {
            return None;
        }

        Some(CycleResult {
            endpoint: endpoint.name.clone(),
            device_name,
            timestamp,
            interfaces,
        })
    }
}
