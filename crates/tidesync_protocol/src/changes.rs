//! Change sets exchanged during sync.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

/// A record exchanged during sync.
///
/// Records are opaque JSON documents owned by the local store and the remote
/// service. The protocol layer reads exactly one field: `id`.
pub type Record = serde_json::Value;

/// Identifier of a record within a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Errors produced while validating change sets.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChangeSetError {
    /// A record is missing its `id` field.
    #[error("record in collection '{collection}' has no 'id' field")]
    MissingRecordId {
        /// Collection the record belongs to.
        collection: String,
    },

    /// A record ID appears in more than one bucket of one collection.
    #[error("record '{record_id}' appears in multiple buckets of collection '{collection}'")]
    DuplicateRecordId {
        /// Collection the record belongs to.
        collection: String,
        /// The offending record ID.
        record_id: RecordId,
    },
}

/// Created/updated/deleted records for one collection in one sync round.
///
/// # Invariant
///
/// A record ID appears in at most one of the three buckets. [`ChangeSet::merge`]
/// preserves this; batches received from outside are checked with
/// [`ChangeBatch::validate`] before being applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Records created since the cursor.
    #[serde(default)]
    pub created: Vec<Record>,
    /// Records updated since the cursor.
    #[serde(default)]
    pub updated: Vec<Record>,
    /// IDs of records deleted since the cursor.
    #[serde(default)]
    pub deleted: Vec<RecordId>,
}

/// Extracts the `id` field from a record.
fn record_id(record: &Record) -> Option<RecordId> {
    record
        .get("id")
        .and_then(|v| v.as_str())
        .map(RecordId::new)
}

impl ChangeSet {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if all three buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Returns the total number of changed records.
    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Returns the IDs referenced by any bucket, in bucket order.
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.created
            .iter()
            .chain(self.updated.iter())
            .filter_map(record_id)
            .chain(self.deleted.iter().cloned())
            .collect()
    }

    /// Checks the bucket-exclusivity invariant for this collection.
    pub fn validate(&self, collection: &str) -> Result<(), ChangeSetError> {
        let mut seen = BTreeSet::new();

        for record in self.created.iter().chain(self.updated.iter()) {
            let id = record_id(record).ok_or_else(|| ChangeSetError::MissingRecordId {
                collection: collection.to_string(),
            })?;
            if !seen.insert(id.clone()) {
                return Err(ChangeSetError::DuplicateRecordId {
                    collection: collection.to_string(),
                    record_id: id,
                });
            }
        }

        for id in &self.deleted {
            if !seen.insert(id.clone()) {
                return Err(ChangeSetError::DuplicateRecordId {
                    collection: collection.to_string(),
                    record_id: id.clone(),
                });
            }
        }

        Ok(())
    }

    /// Folds a newer change set into this one, coalescing per record.
    ///
    /// Last writer wins per record:
    /// - a record already `created` that is updated again stays `created`
    ///   with the newer payload
    /// - an update over an update keeps the newer payload
    /// - a deletion removes the record from `created`/`updated` and lands
    ///   in `deleted`
    pub fn merge(&mut self, newer: ChangeSet) {
        for record in newer.created {
            let id = record_id(&record);
            self.remove_id(id.as_ref());
            self.created.push(record);
        }

        for record in newer.updated {
            match record_id(&record) {
                // An update over a pending create stays a create.
                Some(ref id) if self.bucket_of(id) == Some(Bucket::Created) => {
                    self.remove_id(Some(id));
                    self.created.push(record);
                }
                id => {
                    self.remove_id(id.as_ref());
                    self.updated.push(record);
                }
            }
        }

        for id in newer.deleted {
            self.remove_id(Some(&id));
            self.deleted.push(id);
        }
    }

    fn bucket_of(&self, id: &RecordId) -> Option<Bucket> {
        let has = |records: &[Record]| records.iter().any(|r| record_id(r).as_ref() == Some(id));
        if has(&self.created) {
            Some(Bucket::Created)
        } else if has(&self.updated) {
            Some(Bucket::Updated)
        } else if self.deleted.contains(id) {
            Some(Bucket::Deleted)
        } else {
            None
        }
    }

    fn remove_id(&mut self, id: Option<&RecordId>) {
        let Some(id) = id else { return };
        self.created.retain(|r| record_id(r).as_ref() != Some(id));
        self.updated.retain(|r| record_id(r).as_ref() != Some(id));
        self.deleted.retain(|d| d != id);
    }
}

#[derive(PartialEq)]
enum Bucket {
    Created,
    Updated,
    Deleted,
}

/// Per-collection change sets for one sync round.
///
/// Keyed by collection name. A `BTreeMap` keeps the wire encoding and all
/// iteration deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeBatch(BTreeMap<String, ChangeSet>);

impl ChangeBatch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates collections and their change sets.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ChangeSet)> {
        self.0.iter()
    }

    /// Returns true if the batch has no changes at all.
    pub fn is_empty(&self) -> bool {
        self.0.values().all(ChangeSet::is_empty)
    }

    /// Returns the total number of changed records across collections.
    pub fn total_len(&self) -> usize {
        self.0.values().map(ChangeSet::len).sum()
    }

    /// Returns the change set for a collection, inserting an empty one.
    pub fn collection_mut(&mut self, collection: impl Into<String>) -> &mut ChangeSet {
        self.0.entry(collection.into()).or_default()
    }

    /// Returns the change set for a collection if present.
    pub fn collection(&self, collection: &str) -> Option<&ChangeSet> {
        self.0.get(collection)
    }

    /// Checks the bucket-exclusivity invariant for every collection.
    pub fn validate(&self) -> Result<(), ChangeSetError> {
        for (collection, set) in &self.0 {
            set.validate(collection)?;
        }
        Ok(())
    }

    /// Folds a newer batch into this one, collection by collection.
    pub fn merge(&mut self, newer: ChangeBatch) {
        for (collection, set) in newer.0 {
            self.collection_mut(collection).merge(set);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, rev: u64) -> Record {
        json!({ "id": id, "rev": rev })
    }

    #[test]
    fn empty_change_set() {
        let set = ChangeSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(set.validate("tasks").is_ok());
    }

    #[test]
    fn validate_accepts_disjoint_buckets() {
        let set = ChangeSet {
            created: vec![record("a", 1)],
            updated: vec![record("b", 2)],
            deleted: vec![RecordId::new("c")],
        };
        assert!(set.validate("tasks").is_ok());
    }

    #[test]
    fn validate_rejects_id_in_two_buckets() {
        let set = ChangeSet {
            created: vec![record("a", 1)],
            updated: vec![record("a", 2)],
            deleted: vec![],
        };
        let err = set.validate("tasks").unwrap_err();
        assert_eq!(
            err,
            ChangeSetError::DuplicateRecordId {
                collection: "tasks".into(),
                record_id: RecordId::new("a"),
            }
        );
    }

    #[test]
    fn validate_rejects_missing_id() {
        let set = ChangeSet {
            created: vec![json!({ "name": "no id here" })],
            updated: vec![],
            deleted: vec![],
        };
        assert!(matches!(
            set.validate("tasks"),
            Err(ChangeSetError::MissingRecordId { .. })
        ));
    }

    #[test]
    fn merge_update_over_create_stays_created() {
        let mut older = ChangeSet {
            created: vec![record("a", 1)],
            ..ChangeSet::default()
        };
        let newer = ChangeSet {
            updated: vec![record("a", 2)],
            ..ChangeSet::default()
        };

        older.merge(newer);

        assert_eq!(older.created.len(), 1);
        assert!(older.updated.is_empty());
        assert_eq!(older.created[0]["rev"], 2);
        assert!(older.validate("tasks").is_ok());
    }

    #[test]
    fn merge_delete_wins() {
        let mut older = ChangeSet {
            created: vec![record("a", 1)],
            updated: vec![record("b", 1)],
            ..ChangeSet::default()
        };
        let newer = ChangeSet {
            deleted: vec![RecordId::new("a"), RecordId::new("b")],
            ..ChangeSet::default()
        };

        older.merge(newer);

        assert!(older.created.is_empty());
        assert!(older.updated.is_empty());
        assert_eq!(older.deleted.len(), 2);
    }

    #[test]
    fn merge_update_over_update_keeps_newer_payload() {
        let mut older = ChangeSet {
            updated: vec![record("a", 1)],
            ..ChangeSet::default()
        };
        let newer = ChangeSet {
            updated: vec![record("a", 9)],
            ..ChangeSet::default()
        };

        older.merge(newer);

        assert_eq!(older.updated.len(), 1);
        assert_eq!(older.updated[0]["rev"], 9);
    }

    #[test]
    fn batch_merge_and_totals() {
        let mut batch = ChangeBatch::new();
        batch.collection_mut("tasks").created.push(record("a", 1));

        let mut newer = ChangeBatch::new();
        newer.collection_mut("tasks").updated.push(record("a", 2));
        newer.collection_mut("notes").created.push(record("n", 1));

        batch.merge(newer);

        assert_eq!(batch.total_len(), 2);
        assert_eq!(batch.collection("tasks").unwrap().created[0]["rev"], 2);
        assert!(batch.collection("notes").is_some());
        assert!(batch.validate().is_ok());
    }

    #[test]
    fn batch_is_empty_ignores_empty_collections() {
        let mut batch = ChangeBatch::new();
        batch.collection_mut("tasks");
        assert!(batch.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_change_set() -> impl Strategy<Value = ChangeSet> {
            // Disjoint ID pools per bucket keep generated sets valid.
            (0usize..5, 0usize..5, 0usize..5).prop_map(|(c, u, d)| ChangeSet {
                created: (0..c).map(|i| record(&format!("c{i}"), 1)).collect(),
                updated: (0..u).map(|i| record(&format!("u{i}"), 1)).collect(),
                deleted: (0..d).map(|i| RecordId::new(format!("d{i}"))).collect(),
            })
        }

        proptest! {
            #[test]
            fn merge_preserves_bucket_exclusivity(
                mut older in arb_change_set(),
                newer in arb_change_set(),
            ) {
                older.merge(newer);
                prop_assert!(older.validate("tasks").is_ok());
            }

            #[test]
            fn merge_never_loses_deletions(
                mut older in arb_change_set(),
                newer in arb_change_set(),
            ) {
                let expected: BTreeSet<_> = newer.deleted.iter().cloned().collect();
                older.merge(newer);
                let after: BTreeSet<_> = older.deleted.iter().cloned().collect();
                prop_assert!(expected.is_subset(&after));
            }
        }
    }
}
