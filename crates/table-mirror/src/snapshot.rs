use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Name of one dataset on the remote source (e.g., a table).
/// The set of names a mirror syncs is fixed by configuration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CollectionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CollectionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// One row of a collection, kept as an opaque field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(serde_json::Map<String, serde_json::Value>);

impl Record {
    pub fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn get(&self, field: &str) -> Option<&serde_json::Value> {
        self.0.get(field)
    }

    pub fn into_fields(self) -> serde_json::Map<String, serde_json::Value> {
        self.0
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Record {
    fn from(fields: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(fields)
    }
}

/// Every collection fetched in one sync cycle, plus when the cycle assembled them.
///
/// The persisted document contains only the collections; the assembly time
/// travels out of band (a file store reports it as the file's mtime).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    collections: BTreeMap<CollectionName, Vec<Record>>,
    assembled_at: SystemTime,
}

impl Snapshot {
    pub fn new(collections: BTreeMap<CollectionName, Vec<Record>>, assembled_at: SystemTime) -> Self {
        Self {
            collections,
            assembled_at,
        }
    }

    /// Stamp a freshly fetched set of collections with the current time.
    pub fn assemble(collections: BTreeMap<CollectionName, Vec<Record>>) -> Self {
        Self::new(collections, SystemTime::now())
    }

    pub fn collections(&self) -> &BTreeMap<CollectionName, Vec<Record>> {
        &self.collections
    }

    pub fn get(&self, collection: &str) -> Option<&[Record]> {
        self.collections.get(collection).map(Vec::as_slice)
    }

    pub fn assembled_at(&self) -> SystemTime {
        self.assembled_at
    }

    /// Total records across all collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    /// Canonical on-disk form: a pretty-printed JSON object keyed by
    /// collection name in sorted order.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.collections)
    }

    pub fn from_json_slice(bytes: &[u8], assembled_at: SystemTime) -> Result<Self, serde_json::Error> {
        let collections = serde_json::from_slice(bytes)?;
        Ok(Self::new(collections, assembled_at))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: serde_json::Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn serializes_as_object_keyed_by_collection() {
        let mut collections = BTreeMap::new();
        collections.insert(CollectionName::new("b"), vec![record(json!({"id": 2}))]);
        collections.insert(CollectionName::new("a"), vec![record(json!({"id": 1}))]);
        let snapshot = Snapshot::assemble(collections);

        let bytes = snapshot.to_json_bytes().unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(value, json!({"a": [{"id": 1}], "b": [{"id": 2}]}));
        // Keys come out sorted so identical snapshots produce identical bytes.
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.find("\"a\"").unwrap() < text.find("\"b\"").unwrap());
    }

    #[test]
    fn preserves_record_order_within_a_collection() {
        let mut collections = BTreeMap::new();
        collections.insert(
            CollectionName::new("logs"),
            vec![record(json!({"id": 3})), record(json!({"id": 1})), record(json!({"id": 2}))],
        );
        let snapshot = Snapshot::assemble(collections);

        let parsed = Snapshot::from_json_slice(&snapshot.to_json_bytes().unwrap(), SystemTime::UNIX_EPOCH)
            .unwrap();
        let ids: Vec<_> = parsed.get("logs").unwrap().iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!(3)), Some(json!(1)), Some(json!(2))]);
    }

    #[test]
    fn nested_values_pass_through_untouched() {
        let raw = json!({"id": 7, "meta": {"tags": ["x", "y"], "score": 1.5}, "deleted": null});
        let mut collections = BTreeMap::new();
        collections.insert(CollectionName::new("memory"), vec![record(raw.clone())]);

        let snapshot = Snapshot::assemble(collections);
        let parsed = Snapshot::from_json_slice(&snapshot.to_json_bytes().unwrap(), SystemTime::now()).unwrap();

        assert_eq!(serde_json::to_value(&parsed.get("memory").unwrap()[0]).unwrap(), raw);
    }

    #[test]
    fn rejects_non_object_records() {
        let result = Snapshot::from_json_slice(br#"{"a": [1, 2]}"#, SystemTime::now());
        assert!(result.is_err());
    }

    #[test]
    fn record_count_sums_all_collections() {
        let mut collections = BTreeMap::new();
        collections.insert(CollectionName::new("a"), vec![record(json!({})), record(json!({}))]);
        collections.insert(CollectionName::new("b"), vec![]);
        collections.insert(CollectionName::new("c"), vec![record(json!({}))]);

        assert_eq!(Snapshot::assemble(collections).record_count(), 3);
    }

    #[test]
    fn get_returns_none_for_unknown_collection() {
        let snapshot = Snapshot::assemble(BTreeMap::new());
        assert!(snapshot.get("missing").is_none());
    }
}
