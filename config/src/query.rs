use serde::{
    Deserialize,
    Serialize,
};

/// One metric to retrieve and the label it populates.
///
/// For SNMP the identifier is the subtree root OID. For NX-API it is the command text and `field`
/// names the row column to read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Query {
    pub identifier: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Query {
    pub fn new(identifier: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            label: label.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

/// Dotted numeric OID, with or without the leading dot.
pub fn parse_oid(identifier: &str) -> Option<Vec<u32>> {
    let trimmed = identifier.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    trimmed.split('.').map(|part| part.parse::<u32>().ok()).collect()
}

/// Queries per transport kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuerySets {
    #[serde(default)]
    pub snmp: Vec<Query>,
    #[serde(default)]
    pub nxapi: Vec<Query>,
}
