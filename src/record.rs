//! AGV rows and the snapshots that carry them.
//!
//! Field names on the wire are the store's column names, so a snapshot read
//! from the store serializes straight into the `agvData` event payload. The
//! binary columns stay undecoded here; see [`crate::decode`].

use crate::error::StoreError;
use serde::{Deserialize, Serialize, Serializer};

/// Key of one vehicle row, unique within a [`Snapshot`].
pub type CommunicationId = u32;

/// One vehicle row as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgvRecord {
    #[serde(rename = "Communication.ID")]
    pub communication_id: CommunicationId,
    #[serde(rename = "ID_AGV", default)]
    pub agv_id: Option<u32>,
    #[serde(rename = "AGVEnable", default)]
    pub enable_raw: Option<i64>,
    #[serde(rename = "Communication.Status", default)]
    pub comm_status: Option<i64>,

    #[serde(rename = "LayoutPosition.Route", default, with = "binary")]
    pub route: Option<Vec<u8>>,
    #[serde(rename = "LayoutPosition.Point", default, with = "binary")]
    pub point: Option<Vec<u8>>,
    #[serde(rename = "Traffic.ZoneA.Request", default, with = "binary")]
    pub zone_a_request: Option<Vec<u8>>,
    #[serde(rename = "Traffic.ZoneA.Busy", default, with = "binary")]
    pub zone_a_busy: Option<Vec<u8>>,
    #[serde(rename = "Traffic.ZoneB.Request", default, with = "binary")]
    pub zone_b_request: Option<Vec<u8>>,
    #[serde(rename = "Traffic.ZoneB.Busy", default, with = "binary")]
    pub zone_b_busy: Option<Vec<u8>>,
    #[serde(rename = "Battery.Percentage", default, with = "binary")]
    pub battery_raw: Option<Vec<u8>>,
    #[serde(rename = "ScreenInfo", default, with = "binary")]
    pub screen_info_raw: Option<Vec<u8>>,

    #[serde(rename = "TIME", default)]
    pub timestamp: Option<String>,
}

impl AgvRecord {
    /// A row with only its key set.
    pub fn new(communication_id: CommunicationId) -> Self {
        Self {
            communication_id,
            ..Self::default()
        }
    }
}

/// An immutable, complete set of rows captured by one poll.
///
/// Rows keep the order the store returned them in. Content comparison goes
/// through [`Snapshot::same_content`], which ignores that order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "Vec<AgvRecord>")]
pub struct Snapshot {
    records: Vec<AgvRecord>,
}

impl Snapshot {
    /// Build a snapshot, rejecting duplicate communication ids.
    pub fn new(records: Vec<AgvRecord>) -> Result<Self, StoreError> {
        let mut ids: Vec<CommunicationId> = records.iter().map(|r| r.communication_id).collect();
        ids.sort_unstable();
        if let Some(pair) = ids.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(StoreError::DuplicateCommunicationId(pair[0]));
        }
        Ok(Self { records })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[AgvRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First row with the given key.
    pub fn find(&self, id: CommunicationId) -> Option<&AgvRecord> {
        self.records.iter().find(|r| r.communication_id == id)
    }

    /// Rows ordered by communication id.
    pub fn canonical(&self) -> Vec<&AgvRecord> {
        let mut rows: Vec<&AgvRecord> = self.records.iter().collect();
        rows.sort_by_key(|r| r.communication_id);
        rows
    }

    /// True when both snapshots hold the same rows, field for field,
    /// regardless of row order.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.records.len() == other.records.len() && self.canonical() == other.canonical()
    }
}

impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        self.same_content(other)
    }
}

impl Eq for Snapshot {}

// Serializes as the bare row list.
impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

impl TryFrom<Vec<AgvRecord>> for Snapshot {
    type Error = StoreError;

    fn try_from(records: Vec<AgvRecord>) -> Result<Self, Self::Error> {
        Snapshot::new(records)
    }
}

/// Serde adapter for the binary columns.
///
/// Writes bytes (a JSON array of numbers). Reads a byte array, the
/// `{"type":"Buffer","data":[..]}` shape Node emits for buffers, or null.
/// Any other value is read as absent so it decodes to the sentinel.
pub mod binary {
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_bytes::serialize(value, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.as_ref().and_then(bytes_from_value))
    }

    pub(crate) fn bytes_from_value(value: &Value) -> Option<Vec<u8>> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect(),
            Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("Buffer") => {
                map.get("data").and_then(bytes_from_value)
            }
            _ => None,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use serde_json::json;

        #[test]
        fn test_plain_byte_array() {
            assert_eq!(bytes_from_value(&json!([0, 50])), Some(vec![0x00, 0x32]));
        }

        #[test]
        fn test_node_buffer_shape() {
            let value = json!({ "type": "Buffer", "data": [1, 2] });
            assert_eq!(bytes_from_value(&value), Some(vec![1, 2]));
        }

        #[test]
        fn test_non_binary_values_are_absent() {
            assert_eq!(bytes_from_value(&json!(75)), None);
            assert_eq!(bytes_from_value(&json!("0032")), None);
            assert_eq!(bytes_from_value(&json!([1, 256])), None);
            assert_eq!(bytes_from_value(&json!({ "data": [1] })), None);
        }
    }
}
