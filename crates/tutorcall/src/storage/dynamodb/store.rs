//! DynamoDB-backed key-value store.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::types::{AttributeValue, DeleteRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use tutorcall_core::session::{RepositoryError, Result};

use super::error::{
    map_batch_write_error, map_get_item_error, map_put_item_error, map_query_error,
    map_update_item_error,
};
use crate::storage::store::{
    Item, ItemKey, KeyValueStore, PutCondition, Query, QueryPage, SortKeyCondition,
};

/// Most requests a single BatchWriteItem call accepts.
pub const BATCH_WRITE_LIMIT: usize = 25;

/// Key-value store over a single DynamoDB table.
pub struct DynamoDbStore {
    client: Client,
    table_name: String,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client and table name.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a store from a loaded SDK configuration.
    pub fn from_sdk_config(config: &SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(Client::new(config), table_name)
    }

    /// Get the table name.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// Expression strings and placeholders for a query.
#[derive(Debug, PartialEq)]
struct QueryExpression {
    key_condition: String,
    filter: Option<String>,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

fn query_expression(query: &Query) -> QueryExpression {
    let mut names = HashMap::from([(
        "#pk".to_string(),
        query.key_space.partition_attribute().to_string(),
    )]);
    let mut values = HashMap::from([(
        ":pk".to_string(),
        AttributeValue::S(query.partition.clone()),
    )]);

    let mut key_condition = "#pk = :pk".to_string();
    let sort_key = match &query.sort_key {
        SortKeyCondition::Any => None,
        SortKeyCondition::BeginsWith(prefix) => Some(("begins_with(#sk, :sk)", prefix)),
        SortKeyCondition::Equals(value) => Some(("#sk = :sk", value)),
    };
    if let Some((condition, value)) = sort_key {
        key_condition.push_str(" AND ");
        key_condition.push_str(condition);
        names.insert(
            "#sk".to_string(),
            query.key_space.sort_attribute().to_string(),
        );
        values.insert(":sk".to_string(), AttributeValue::S(value.clone()));
    }

    let filter = query.filter.as_ref().map(|filter| {
        names.insert("#filter".to_string(), filter.attribute.to_string());
        values.insert(
            ":filter".to_string(),
            AttributeValue::S(filter.value.clone()),
        );
        "#filter = :filter".to_string()
    });

    QueryExpression {
        key_condition,
        filter,
        names,
        values,
    }
}

/// Builds a `SET` expression assigning every attribute in `updates`.
fn update_expression(
    updates: Item,
) -> (
    String,
    HashMap<String, String>,
    HashMap<String, AttributeValue>,
) {
    let mut updates: Vec<(String, AttributeValue)> = updates.into_iter().collect();
    updates.sort_by(|a, b| a.0.cmp(&b.0));

    let mut assignments = Vec::with_capacity(updates.len());
    let mut names = HashMap::new();
    let mut values = HashMap::new();
    for (i, (name, value)) in updates.into_iter().enumerate() {
        assignments.push(format!("#f{i} = :v{i}"));
        names.insert(format!("#f{i}"), name);
        values.insert(format!(":v{i}"), value);
    }

    (format!("SET {}", assignments.join(", ")), names, values)
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<Item>> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_attributes()))
            .send()
            .await
            .map_err(map_get_item_error)?;

        Ok(result.item)
    }

    async fn put_item(
        &self,
        item: Item,
        condition: PutCondition,
        entity_type: &'static str,
        id: &str,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item));
        if condition == PutCondition::IfAbsent {
            request = request.condition_expression("attribute_not_exists(PK)");
        }

        request
            .send()
            .await
            .map_err(|e| map_put_item_error(e, entity_type, id))?;

        Ok(())
    }

    async fn update_item(
        &self,
        key: &ItemKey,
        updates: Item,
        entity_type: &'static str,
        id: &str,
    ) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let (expression, names, values) = update_expression(updates);

        self.client
            .update_item()
            .table_name(&self.table_name)
            .set_key(Some(key.to_attributes()))
            .condition_expression("attribute_exists(PK)")
            .update_expression(expression)
            .set_expression_attribute_names(Some(names))
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(|e| map_update_item_error(e, entity_type, id))?;

        Ok(())
    }

    async fn query(&self, query: &Query) -> Result<QueryPage> {
        let expression = query_expression(query);

        let result = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(query.key_space.index_name().map(str::to_string))
            .key_condition_expression(expression.key_condition)
            .set_filter_expression(expression.filter)
            .set_expression_attribute_names(Some(expression.names))
            .set_expression_attribute_values(Some(expression.values))
            .scan_index_forward(!query.descending)
            .set_limit(query.limit)
            .set_exclusive_start_key(query.start_key.clone())
            .send()
            .await
            .map_err(map_query_error)?;

        Ok(QueryPage {
            items: result.items.unwrap_or_default(),
            last_evaluated_key: result.last_evaluated_key.filter(|key| !key.is_empty()),
        })
    }

    async fn batch_delete(&self, keys: &[ItemKey]) -> Result<Vec<ItemKey>> {
        let mut unprocessed = Vec::new();

        for chunk in keys.chunks(BATCH_WRITE_LIMIT) {
            let requests = chunk
                .iter()
                .map(|key| {
                    let delete = DeleteRequest::builder()
                        .set_key(Some(key.to_attributes()))
                        .build()
                        .map_err(|e| RepositoryError::InvalidData(e.to_string()))?;
                    Ok(WriteRequest::builder().delete_request(delete).build())
                })
                .collect::<Result<Vec<_>>>()?;

            let output = match self
                .client
                .batch_write_item()
                .request_items(&self.table_name, requests)
                .send()
                .await
            {
                Ok(output) => output,
                Err(err) => {
                    let err = map_batch_write_error(err);
                    tracing::error!(error = %err, items = chunk.len(), "Batch delete request failed");
                    unprocessed.extend_from_slice(chunk);
                    continue;
                }
            };

            let pending = output
                .unprocessed_items
                .and_then(|mut tables| tables.remove(&self.table_name))
                .unwrap_or_default();
            unprocessed.extend(
                pending
                    .iter()
                    .filter_map(|request| request.delete_request())
                    .filter_map(|delete| ItemKey::from_item(delete.key())),
            );
        }

        Ok(unprocessed)
    }
}
