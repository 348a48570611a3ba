//! Row extraction for NX-API `cli_show` bodies.
//!
//! Tabular answers come as `TABLE_<name>: { ROW_<name>: [ {...}, ... ] }`, where each row carries its
//! interface in a field named `interface` or `interface_<suffix>` (`interface_rx`, `interface_tx`).
//! Some platforms (n9k) split one interface across several rows of the same table, so rows are
//! folded by interface, field by field, last seen wins. Scalars outside any table (`show version`)
//! land in the [`DEVICE_ROW`].

use crate::NxApiError;
use serde_json::{
    Map,
    Value,
};
use std::collections::BTreeMap;

/// Row key used for fields that describe the device rather than one interface.
pub const DEVICE_ROW: &str = "0";

const TABLE_PREFIX: &str = "TABLE_";
const ROW_PREFIX: &str = "ROW_";

/// One typed cell of a row.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Number(serde_json::Number),
    Flag(bool),
    /// Null or a nested structure that does not belong to a table.
    Unsupported(&'static str),
}

impl From<&Value> for Field {
    fn from(value: &Value) -> Self {
        match value {
            Value::String(text) => Field::Text(text.clone()),
            Value::Number(number) => Field::Number(number.clone()),
            Value::Bool(flag) => Field::Flag(*flag),
            Value::Null => Field::Unsupported("null"),
            Value::Array(_) => Field::Unsupported("array"),
            Value::Object(_) => Field::Unsupported("object"),
        }
    }
}

pub type Row = BTreeMap<String, Field>;
pub type Rows = BTreeMap<String, Row>;

/// Fold every table of `body` into rows keyed by interface.
///
/// An empty body (the device has nothing to report) yields no rows.
pub fn rows(body: &Value) -> Result<Rows, NxApiError> {
    let map = match body {
        Value::Object(map) => map,
        Value::Null => return Ok(Rows::new()),
        Value::String(text) if text.trim().is_empty() => return Ok(Rows::new()),
        other => return Err(NxApiError::Malformed(format!("unexpected body: {other}"))),
    };

    let mut rows = Rows::new();
    let mut device = Row::new();
    for (key, value) in map {
        if key.starts_with(TABLE_PREFIX) {
            collect_table(key, value, &mut rows);
        } else if !value.is_object() && !value.is_array() {
            device.insert(key.clone(), Field::from(value));
        }
    }

    if !device.is_empty() {
        rows.entry(DEVICE_ROW.to_string()).or_default().extend(device);
    }
    Ok(rows)
}

fn collect_table(name: &str, table: &Value, rows: &mut Rows) {
    let Value::Object(table) = table else {
        debug!(table = name, "skipping table that is not an object");
        return;
    };

    for (key, value) in table.iter().filter(|(key, _)| key.starts_with(ROW_PREFIX)) {
        match value {
            Value::Object(row) => fold_row(key, row, rows),
            Value::Array(items) => {
                for item in items {
                    match item {
                        Value::Object(row) => fold_row(key, row, rows),
                        _ => debug!(table = name, "skipping row that is not an object"),
                    }
                }
            }
            _ => debug!(table = name, "skipping rows that are neither object nor list"),
        }
    }
}

fn fold_row(name: &str, row: &Map<String, Value>, rows: &mut Rows) {
    let Some(interface) = row_key(row) else {
        debug!(row = name, "skipping row without interface");
        return;
    };

    for (field, value) in row {
        if field.starts_with(TABLE_PREFIX) {
            collect_table(field, value, rows);
        } else {
            rows.entry(interface.clone())
                .or_default()
                .insert(field.clone(), Field::from(value));
        }
    }
}

fn row_key(row: &Map<String, Value>) -> Option<String> {
    row.iter()
        .find(|(field, _)| *field == "interface" || field.starts_with("interface_"))
        .and_then(|(_, value)| value.as_str())
        .map(str::to_string)
}
