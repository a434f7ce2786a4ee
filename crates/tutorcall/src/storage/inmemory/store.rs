//! In-memory key-value store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tutorcall_core::session::{RepositoryError, Result};

use crate::storage::store::{
    Item, ItemKey, KeySpace, KeyValueStore, PutCondition, Query, QueryPage, GSI1PK, GSI1SK, PK,
    SK,
};

/// In-memory store for tests and local development.
///
/// Reproduces the paging behavior the repository depends on: the limit caps
/// the items evaluated, the filter runs afterwards, and a last-evaluated key
/// is returned while more items remain. Index queries order by the index
/// sort key, then the primary key.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    items: Arc<RwLock<BTreeMap<ItemKey, Item>>>,
    failing_deletes: Arc<RwLock<HashSet<ItemKey>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    #[cfg(test)]
    pub async fn item_count(&self) -> usize {
        self.items.read().await.len()
    }

    /// Makes every later `batch_delete` leave `key` in place and report it
    /// as unprocessed.
    #[cfg(test)]
    pub async fn fail_deletes_of(&self, key: ItemKey) {
        self.failing_deletes.write().await.insert(key);
    }
}

/// Ordering of an item within the queried key space.
fn position(key_space: KeySpace, item: &Item) -> Vec<String> {
    let attributes: &[&str] = match key_space {
        KeySpace::Table => &[SK],
        KeySpace::Gsi1 => &[GSI1SK, PK, SK],
    };
    attributes
        .iter()
        .map(|name| string_attribute(item, name).unwrap_or_default())
        .collect()
}

fn string_attribute(item: &Item, name: &str) -> Option<String> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

/// The attributes a last-evaluated key carries for the key space.
fn last_evaluated_key(key_space: KeySpace, item: &Item) -> Item {
    let attributes: &[&str] = match key_space {
        KeySpace::Table => &[PK, SK],
        KeySpace::Gsi1 => &[PK, SK, GSI1PK, GSI1SK],
    };
    attributes
        .iter()
        .filter_map(|name| {
            item.get(*name)
                .map(|value| (name.to_string(), value.clone()))
        })
        .collect()
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Item>> {
        let items = self.items.read().await;
        Ok(items.get(key).cloned())
    }

    async fn put_item(
        &self,
        item: Item,
        condition: PutCondition,
        entity_type: &'static str,
        id: &str,
    ) -> Result<()> {
        let key = ItemKey::from_item(&item).ok_or_else(|| {
            RepositoryError::InvalidData(format!("{entity_type} {id} has no primary key"))
        })?;

        let mut items = self.items.write().await;
        if condition == PutCondition::IfAbsent && items.contains_key(&key) {
            return Err(RepositoryError::AlreadyExists {
                entity_type,
                id: id.to_string(),
            });
        }
        items.insert(key, item);
        Ok(())
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        updates: Item,
        entity_type: &'static str,
        id: &str,
    ) -> Result<()> {
        let mut items = self.items.write().await;
        let item = items.get_mut(key).ok_or_else(|| RepositoryError::NotFound {
            entity_type,
            id: id.to_string(),
        })?;
        item.extend(updates);
        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        let items = self.items.read().await;
        let partition_attribute = query.key_space.partition_attribute();
        let sort_attribute = query.key_space.sort_attribute();

        let mut candidates: Vec<(Vec<String>, &Item)> = items
            .values()
            .filter(|item| {
                item.get(partition_attribute)
                    .and_then(|v| v.as_s().ok())
                    .is_some_and(|pk| *pk == query.partition)
            })
            .filter(|item| {
                string_attribute(item, sort_attribute)
                    .is_some_and(|sk| query.sort_key.matches(&sk))
            })
            .map(|item| (position(query.key_space, item), item))
            .collect();

        candidates.sort_by(|a, b| a.0.cmp(&b.0));
        if query.descending {
            candidates.reverse();
        }

        if let Some(start_key) = &query.start_key {
            let start = position(query.key_space, start_key);
            candidates.retain(|(pos, _)| {
                if query.descending {
                    *pos < start
                } else {
                    *pos > start
                }
            });
        }

        let limit = query
            .limit
            .and_then(|l| usize::try_from(l).ok())
            .unwrap_or(usize::MAX);
        let has_more = candidates.len() > limit;
        candidates.truncate(limit);

        let last_evaluated_key = if has_more {
            candidates
                .last()
                .map(|(_, item)| last_evaluated_key(query.key_space, item))
        } else {
            None
        };

        let items = candidates
            .into_iter()
            .map(|(_, item)| item)
            .filter(|item| query.filter.as_ref().is_none_or(|f| f.matches(item)))
            .cloned()
            .collect();

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    async fn batch_delete(&self, keys: &[ItemKey]) -> Result<Vec<ItemKey>> {
        let failing = self.failing_deletes.read().await;
        let mut items = self.items.write().await;

        let mut unprocessed = Vec::new();
        for key in keys {
            if failing.contains(key) {
                unprocessed.push(key.clone());
            } else {
                items.remove(key);
            }
        }
        Ok(unprocessed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_dynamodb::types::AttributeValue;

    fn item(pk: &str, sk: &str, kind: &str) -> Item {
        let mut item = ItemKey::new(pk, sk).to_attributes();
        item.insert("entityType".to_string(), AttributeValue::S(kind.to_string()));
        item
    }

    fn indexed(pk: &str, sk: &str, gsi_pk: &str, gsi_sk: &str) -> Item {
        let mut item = item(pk, sk, "MESSAGE");
        item.insert(GSI1PK.to_string(), AttributeValue::S(gsi_pk.to_string()));
        item.insert(GSI1SK.to_string(), AttributeValue::S(gsi_sk.to_string()));
        item
    }

    async fn seeded(items: Vec<Item>) -> InMemoryStore {
        let store = InMemoryStore::new();
        for item in items {
            store
                .put_item(item, PutCondition::Always, "Item", "test")
                .await
                .unwrap();
        }
        store
    }

    fn sort_keys(page: &QueryPage) -> Vec<String> {
        page.items
            .iter()
            .map(|item| string_attribute(item, SK).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_put_if_absent_rejects_existing_key() {
        let store = seeded(vec![item("P", "A", "X")]).await;

        let result = store
            .put_item(item("P", "A", "Y"), PutCondition::IfAbsent, "Item", "A")
            .await;

        assert!(matches!(result, Err(RepositoryError::AlreadyExists { .. })));
        let stored = store.get_item(&ItemKey::new("P", "A")).await.unwrap().unwrap();
        assert_eq!(string_attribute(&stored, "entityType").as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_put_requires_primary_key() {
        let store = InMemoryStore::new();
        let result = store
            .put_item(Item::new(), PutCondition::Always, "Item", "none")
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
    }

    #[tokio::test]
    async fn test_update_merges_attributes() {
        let store = seeded(vec![item("P", "A", "X")]).await;
        let key = ItemKey::new("P", "A");

        let updates = Item::from([("status".to_string(), AttributeValue::S("done".to_string()))]);
        store.update_item(&key, updates, "Item", "A").await.unwrap();

        let stored = store.get_item(&key).await.unwrap().unwrap();
        assert_eq!(string_attribute(&stored, "status").as_deref(), Some("done"));
        assert_eq!(string_attribute(&stored, "entityType").as_deref(), Some("X"));
    }

    #[tokio::test]
    async fn test_update_missing_item_is_not_found() {
        let store = InMemoryStore::new();
        let result = store
            .update_item(&ItemKey::new("P", "A"), Item::new(), "Item", "A")
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_query_prefix_and_order() {
        let store = seeded(vec![
            item("P", "A#1", "X"),
            item("P", "A#3", "X"),
            item("P", "B#1", "X"),
            item("P", "A#2", "X"),
            item("Q", "A#9", "X"),
        ])
        .await;

        let page = store
            .query(&Query::table("P").sort_key_begins_with("A#"))
            .await
            .unwrap();
        assert_eq!(sort_keys(&page), vec!["A#1", "A#2", "A#3"]);
        assert!(page.last_evaluated_key.is_none());

        let page = store
            .query(&Query::table("P").sort_key_begins_with("A#").descending())
            .await
            .unwrap();
        assert_eq!(sort_keys(&page), vec!["A#3", "A#2", "A#1"]);
    }

    #[tokio::test]
    async fn test_query_filters_after_limit() {
        let store = seeded(vec![
            item("P", "1", "MESSAGE"),
            item("P", "2", "SESSION"),
            item("P", "3", "MESSAGE"),
            item("P", "4", "SESSION"),
        ])
        .await;

        let query = Query::table("P").filter_eq("entityType", "SESSION").limit(2);
        let first = store.query(&query).await.unwrap();
        assert_eq!(sort_keys(&first), vec!["2"]);
        let lek = first.last_evaluated_key.clone().unwrap();
        assert_eq!(ItemKey::from_item(&lek), Some(ItemKey::new("P", "2")));

        let second = store
            .query(&query.clone().start_key(Some(lek)))
            .await
            .unwrap();
        assert_eq!(sort_keys(&second), vec!["4"]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_descending_resumes_below_start_key() {
        let store = seeded(vec![
            item("P", "1", "X"),
            item("P", "2", "X"),
            item("P", "3", "X"),
        ])
        .await;

        let page = store
            .query(
                &Query::table("P")
                    .descending()
                    .start_key(Some(ItemKey::new("P", "3").to_attributes())),
            )
            .await
            .unwrap();
        assert_eq!(sort_keys(&page), vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_query_index() {
        let store = seeded(vec![
            indexed("DEVICE#a", "S1#MSG#2", "SESSION#s1", "MSG#2"),
            indexed("DEVICE#a", "S1#META", "SESSION#s1", "META"),
            indexed("DEVICE#a", "S1#MSG#1", "SESSION#s1", "MSG#1"),
            indexed("DEVICE#b", "S2#META", "SESSION#s2", "META"),
        ])
        .await;

        let page = store.query(&Query::gsi1("SESSION#s1")).await.unwrap();
        assert_eq!(sort_keys(&page), vec!["S1#META", "S1#MSG#1", "S1#MSG#2"]);

        let page = store
            .query(&Query::gsi1("SESSION#s1").sort_key_equals("META"))
            .await
            .unwrap();
        assert_eq!(sort_keys(&page), vec!["S1#META"]);

        let first = store
            .query(&Query::gsi1("SESSION#s1").limit(1))
            .await
            .unwrap();
        let lek = first.last_evaluated_key.unwrap();
        assert!(lek.contains_key(GSI1SK));
        let rest = store
            .query(&Query::gsi1("SESSION#s1").start_key(Some(lek)))
            .await
            .unwrap();
        assert_eq!(sort_keys(&rest), vec!["S1#MSG#1", "S1#MSG#2"]);
    }

    #[tokio::test]
    async fn test_batch_delete_reports_failures() {
        let store = seeded(vec![item("P", "1", "X"), item("P", "2", "X")]).await;
        store.fail_deletes_of(ItemKey::new("P", "2")).await;

        let unprocessed = store
            .batch_delete(&[ItemKey::new("P", "1"), ItemKey::new("P", "2")])
            .await
            .unwrap();

        assert_eq!(unprocessed, vec![ItemKey::new("P", "2")]);
        assert_eq!(store.item_count().await, 1);
    }
}
