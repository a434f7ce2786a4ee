//! Key-value store abstraction the session repository is built on.
//!
//! The shape follows DynamoDB: items are attribute maps addressed by a
//! partition key and a sort key, with one secondary index (`GSI1`) re-keyed
//! by a second partition/sort pair. Queries return pages; a filter is applied
//! after the page limit, so a page may hold fewer matches than requested even
//! when more remain.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::{Deserialize, Serialize};
use tutorcall_core::session::Result;

/// A stored item: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const GSI1PK: &str = "GSI1PK";
pub const GSI1SK: &str = "GSI1SK";
pub const GSI1_INDEX: &str = "GSI1";

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub pk: String,
    pub sk: String,
}

impl ItemKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Reads the primary key attributes of an item or a last-evaluated key.
    pub fn from_item(item: &Item) -> Option<Self> {
        let pk = item.get(PK)?.as_s().ok()?;
        let sk = item.get(SK)?.as_s().ok()?;
        Some(Self::new(pk, sk))
    }

    pub fn to_attributes(&self) -> Item {
        HashMap::from([
            (PK.to_string(), AttributeValue::S(self.pk.clone())),
            (SK.to_string(), AttributeValue::S(self.sk.clone())),
        ])
    }
}

/// Which key pair a query addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpace {
    /// The table's primary key (`PK`, `SK`).
    Table,
    /// The secondary index (`GSI1PK`, `GSI1SK`).
    Gsi1,
}

impl KeySpace {
    pub fn partition_attribute(&self) -> &'static str {
        match self {
            KeySpace::Table => PK,
            KeySpace::Gsi1 => GSI1PK,
        }
    }

    pub fn sort_attribute(&self) -> &'static str {
        match self {
            KeySpace::Table => SK,
            KeySpace::Gsi1 => GSI1SK,
        }
    }

    pub fn index_name(&self) -> Option<&'static str> {
        match self {
            KeySpace::Table => None,
            KeySpace::Gsi1 => Some(GSI1_INDEX),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    Any,
    BeginsWith(String),
    Equals(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortKeyCondition::Any => true,
            SortKeyCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            SortKeyCondition::Equals(value) => sort_key == value,
        }
    }
}

/// String equality filter evaluated after the page is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub attribute: &'static str,
    pub value: String,
}

impl AttributeFilter {
    pub fn matches(&self, item: &Item) -> bool {
        item.get(self.attribute)
            .and_then(|v| v.as_s().ok())
            .is_some_and(|v| *v == self.value)
    }
}

/// A range query over one partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub key_space: KeySpace,
    pub partition: String,
    pub sort_key: SortKeyCondition,
    pub filter: Option<AttributeFilter>,
    pub descending: bool,
    /// Items to evaluate before the filter runs.
    pub limit: Option<i32>,
    /// Exclusive start key from a previous page.
    pub start_key: Option<Item>,
}

impl Query {
    pub fn table(partition: impl Into<String>) -> Self {
        Self::new(KeySpace::Table, partition)
    }

    pub fn gsi1(partition: impl Into<String>) -> Self {
        Self::new(KeySpace::Gsi1, partition)
    }

    fn new(key_space: KeySpace, partition: impl Into<String>) -> Self {
        Self {
            key_space,
            partition: partition.into(),
            sort_key: SortKeyCondition::Any,
            filter: None,
            descending: false,
            limit: None,
            start_key: None,
        }
    }

    pub fn sort_key_begins_with(mut self, prefix: impl Into<String>) -> Self {
        self.sort_key = SortKeyCondition::BeginsWith(prefix.into());
        self
    }

    pub fn sort_key_equals(mut self, value: impl Into<String>) -> Self {
        self.sort_key = SortKeyCondition::Equals(value.into());
        self
    }

    pub fn filter_eq(mut self, attribute: &'static str, value: impl Into<String>) -> Self {
        self.filter = Some(AttributeFilter {
            attribute,
            value: value.into(),
        });
        self
    }

    pub fn descending(mut self) -> Self {
        self.descending = true;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(i32::try_from(limit).unwrap_or(i32::MAX));
        self
    }

    pub fn start_key(mut self, start_key: Option<Item>) -> Self {
        self.start_key = start_key;
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Present when the store stopped before the end of the partition.
    pub last_evaluated_key: Option<Item>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutCondition {
    /// Overwrite whatever is stored under the key.
    Always,
    /// Fail with `AlreadyExists` if the key is taken.
    IfAbsent,
}

/// Storage operations used by the session repository.
///
/// `entity_type` and `id` only label errors.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Item>>;

    async fn put_item(
        &self,
        item: Item,
        condition: PutCondition,
        entity_type: &'static str,
        id: &str,
    ) -> Result<()>;

    /// Sets the given attributes on an existing item.
    ///
    /// Fails with `NotFound` if no item is stored under `key`.
    async fn update_item(
        &self,
        key: &ItemKey,
        updates: Item,
        entity_type: &'static str,
        id: &str,
    ) -> Result<()>;

    async fn query(&self, query: &Query) -> Result<QueryPage>;

    /// Deletes the given items and returns the keys that were not deleted.
    ///
    /// Not atomic. Unprocessed keys are reported, never retried.
    async fn batch_delete(&self, keys: &[ItemKey]) -> Result<Vec<ItemKey>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_key_round_trips_through_attributes() {
        let key = ItemKey::new("DEVICE#d1", "SETTINGS");
        let attributes = key.to_attributes();

        assert_eq!(attributes.len(), 2);
        assert_eq!(ItemKey::from_item(&attributes), Some(key));
    }

    #[test]
    fn test_item_key_from_item_requires_both_keys() {
        let mut item = Item::new();
        item.insert(PK.to_string(), AttributeValue::S("DEVICE#d1".to_string()));
        assert_eq!(ItemKey::from_item(&item), None);

        item.insert(SK.to_string(), AttributeValue::N("1".to_string()));
        assert_eq!(ItemKey::from_item(&item), None);
    }

    #[test]
    fn test_sort_key_condition_matches() {
        assert!(SortKeyCondition::Any.matches("anything"));
        assert!(SortKeyCondition::BeginsWith("SESSION#".to_string()).matches("SESSION#1"));
        assert!(!SortKeyCondition::BeginsWith("SESSION#".to_string()).matches("SETTINGS"));
        assert!(SortKeyCondition::Equals("META".to_string()).matches("META"));
        assert!(!SortKeyCondition::Equals("META".to_string()).matches("META#"));
    }

    #[test]
    fn test_attribute_filter_matches_string_values_only() {
        let filter = AttributeFilter {
            attribute: "entityType",
            value: "SESSION".to_string(),
        };
        let mut item = Item::new();
        assert!(!filter.matches(&item));

        item.insert(
            "entityType".to_string(),
            AttributeValue::S("SESSION".to_string()),
        );
        assert!(filter.matches(&item));

        item.insert(
            "entityType".to_string(),
            AttributeValue::S("MESSAGE".to_string()),
        );
        assert!(!filter.matches(&item));
    }

    #[test]
    fn test_query_builder() {
        let query = Query::table("DEVICE#d1")
            .sort_key_begins_with("SESSION#")
            .filter_eq("entityType", "SESSION")
            .descending()
            .limit(10);

        assert_eq!(query.key_space, KeySpace::Table);
        assert_eq!(
            query.sort_key,
            SortKeyCondition::BeginsWith("SESSION#".to_string())
        );
        assert!(query.descending);
        assert_eq!(query.limit, Some(10));
        assert!(query.start_key.is_none());
        assert_eq!(KeySpace::Gsi1.index_name(), Some("GSI1"));
        assert_eq!(KeySpace::Table.index_name(), None);
    }
}
